use std::{collections::BTreeMap, fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ORDER_ID_PARAM: &str = "order_id";
pub const PAYMENT_STATUS_PARAM: &str = "payment_status";
pub const MEMBER_ID_PARAM: &str = "member_id";

pub const PAYMENT_PARAMS: [&str; 3] = [ORDER_ID_PARAM, PAYMENT_STATUS_PARAM, MEMBER_ID_PARAM];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Customer {
    #[serde(rename = "customer_id")]
    pub id: String,
    #[serde(rename = "customer_email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "customer_phone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "customer_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Customer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            phone: None,
            name: None,
        }
    }
}

/// Free-form order notes. The backend reads domain intent from well-known keys.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct OrderNotes(BTreeMap<String, Value>);

impl OrderNotes {
    pub fn loan_repayment() -> Self {
        Self::default().with("isLoanRepayment", true)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_loan_repayment(&self) -> bool {
        self.0.get("isLoanRepayment") == Some(&Value::Bool(true))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OrderRequest {
    pub amount: Decimal,
    pub currency: String,
    pub customer: Customer,
    #[serde(skip_serializing_if = "OrderNotes::is_empty")]
    pub notes: OrderNotes,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct LoanDetails {
    pub current_due_amount: Decimal,
    pub repayment_amount: Decimal,
    pub new_due_amount: Decimal,
    pub original_loan_id: Option<String>,
}

/// Body of `POST /payments/create-order` exactly as the backend sends it.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct CreateOrderReply {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub order_id: Option<String>,
    pub payment_session_id: Option<String>,
    pub order_amount: Option<Decimal>,
    pub order_currency: Option<String>,
    pub is_loan_repayment: Option<bool>,
    pub member_id: Option<String>,
    pub member_name: Option<String>,
    pub loan_details: Option<LoanDetails>,
}

/// A created order whose session handle is known to be usable.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct OrderResponse {
    pub order_id: Option<String>,
    pub payment_session_id: String,
    pub order_amount: Option<Decimal>,
    pub order_currency: Option<String>,
    pub is_loan_repayment: bool,
    pub member_id: Option<String>,
    pub member_name: Option<String>,
    pub loan_details: Option<LoanDetails>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Failed,
    UserDropped,
    Pending,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::UserDropped => "USER_DROPPED",
            Self::Pending => "PENDING",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownPaymentStatus(pub String);

impl FromStr for PaymentStatus {
    type Err = UnknownPaymentStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            "USER_DROPPED" => Ok(Self::UserDropped),
            "PENDING" => Ok(Self::Pending),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(UnknownPaymentStatus(s.to_string())),
        }
    }
}

/// Outcome parameters the hosted checkout appends to the return URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRedirectParams {
    pub order_id: String,
    pub payment_status: PaymentStatus,
    pub member_id: Option<String>,
}

impl PaymentRedirectParams {
    /// Returns `None` unless both a non-empty order id and a known status are present.
    pub fn from_query(query: &str) -> Option<Self> {
        let mut order_id = None;
        let mut payment_status = None;
        let mut member_id = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match &*key {
                ORDER_ID_PARAM if !value.is_empty() => order_id = Some(value.into_owned()),
                PAYMENT_STATUS_PARAM => payment_status = value.parse::<PaymentStatus>().ok(),
                MEMBER_ID_PARAM if !value.is_empty() => member_id = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(Self {
            order_id: order_id?,
            payment_status: payment_status?,
            member_id,
        })
    }
}

/// True when any of the checkout return parameters is present, well-formed or not.
pub fn has_payment_params(query: &str) -> bool {
    url::form_urlencoded::parse(query.as_bytes())
        .any(|(key, _)| PAYMENT_PARAMS.contains(&&*key))
}

/// Removes the checkout return parameters and keeps everything else in order.
pub fn strip_payment_params(query: &str) -> String {
    let mut kept = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if !PAYMENT_PARAMS.contains(&&*key) {
            kept.append_pair(&key, &value);
        }
    }
    kept.finish()
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    pub payment_status: Option<PaymentStatus>,
    pub order_id: Option<String>,
    pub amount: Option<Decimal>,
    pub payment_time: Option<String>,
}

/// What the backend answers after a webhook or settlement call.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SettlementAck {
    pub success: Option<bool>,
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use rust_decimal::prelude::FromPrimitive;
    use serde_json::json;

    use super::*;

    #[test]
    fn every_status_parses() {
        for status in [
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::UserDropped,
            PaymentStatus::Pending,
            PaymentStatus::Cancelled,
        ] {
            let query = format!("order_id=O9&payment_status={status}");
            let params = PaymentRedirectParams::from_query(&query).unwrap();
            assert_eq!(params.payment_status, status);
            assert_eq!(params.member_id, None);
        }
    }

    #[test]
    fn encoded_member_id_is_decoded() {
        let params =
            PaymentRedirectParams::from_query("order_id=O1&payment_status=user_dropped&member_id=M+001%26x")
                .unwrap();
        assert_eq!(params.payment_status, PaymentStatus::UserDropped);
        assert_eq!(params.member_id.as_deref(), Some("M 001&x"));
    }

    #[test]
    fn missing_or_unknown_pieces_are_not_detected() {
        assert_eq!(PaymentRedirectParams::from_query(""), None);
        assert_eq!(PaymentRedirectParams::from_query("tab=loans"), None);
        assert_eq!(PaymentRedirectParams::from_query("order_id=O1"), None);
        assert_eq!(PaymentRedirectParams::from_query("payment_status=PAID"), None);
        assert_eq!(
            PaymentRedirectParams::from_query("order_id=&payment_status=PAID"),
            None
        );
        assert_eq!(
            PaymentRedirectParams::from_query("order_id=O1&payment_status=REFUNDED"),
            None
        );
    }

    #[test]
    fn strip_keeps_unrelated_params() {
        let query = "tab=loans&order_id=O1&payment_status=PAID&member_id=M001&page=2";
        assert!(has_payment_params(query));
        let stripped = strip_payment_params(query);
        assert_eq!(stripped, "tab=loans&page=2");
        assert!(!has_payment_params(&stripped));
        assert_eq!(strip_payment_params("order_id=O1&payment_status=PAID"), "");
    }

    #[test]
    fn order_request_wire_shape() {
        let request = OrderRequest {
            amount: Decimal::from_f64(500.5).unwrap(),
            currency: "INR".to_string(),
            customer: Customer {
                email: Some("m@example.org".to_string()),
                ..Customer::new("M001")
            },
            notes: OrderNotes::loan_repayment(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "amount": 500.5,
                "currency": "INR",
                "customer": {"customer_id": "M001", "customer_email": "m@example.org"},
                "notes": {"isLoanRepayment": true}
            })
        );
    }

    #[test]
    fn empty_notes_are_omitted() {
        let request = OrderRequest {
            amount: Decimal::ONE,
            currency: "INR".to_string(),
            customer: Customer::new("M001"),
            notes: OrderNotes::default(),
        };
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("notes").is_none());
    }

    #[test]
    fn verify_response_tolerates_sparse_bodies() {
        let reply: VerifyPaymentResponse =
            serde_json::from_value(json!({"success": true, "payment_status": "PAID"})).unwrap();
        assert!(reply.success);
        assert_eq!(reply.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(reply.message, "");
    }
}
