use reqwest::StatusCode;
use rust_decimal::Decimal;

pub const GENERIC_FAILURE: &str = "Unable to initialize payment";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Please enter a valid amount")]
    InvalidAmount,
    #[error("Repayment amount cannot exceed due amount of ₹{due}")]
    ExceedsDue { due: Decimal },
    #[error("Only {expected} payments are supported")]
    UnsupportedCurrency { expected: String },

    #[error("No response from server")]
    NoResponse,
    #[error("{0}")]
    OrderRejected(String),
    #[error("{0}")]
    Rejected(String),
    #[error("Invalid payment order response - missing payment_session_id")]
    MalformedOrderResponse,
    #[error("Failed to load payment system")]
    SdkLoad,
    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("Backend answered {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Backend {
        status: StatusCode,
        code: Option<String>,
        message: Option<String>,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("Unreadable backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PaymentError {
    /// Text shown to the member in the toast for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Backend { code, message, .. } => match code.as_deref() {
                Some("payment_session_id_invalid") => {
                    "Payment session is invalid or expired. Please try again.".to_string()
                }
                Some("order_meta.return_url_invalid") => {
                    "Return URL configuration error. Please contact support.".to_string()
                }
                _ => message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            },
            Self::Transport(_) | Self::Decode(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }

    /// Contract violations between portal and backend, as opposed to rejections.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::MalformedOrderResponse | Self::Decode(_))
    }
}
