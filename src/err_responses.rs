use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;

use crate::{components, payments::error::PaymentError};

pub enum ErrorResponse {
    InternalServerError,
    StatusCode(StatusCode),
    Toast,
}

pub trait MapErrorResponse<T> {
    fn map_err_response(self, mapper: ErrorResponse) -> Result<T, Response>;
}

impl<T, E: ToString> MapErrorResponse<T> for Result<T, E> {
    fn map_err_response(self, mapper: ErrorResponse) -> Result<T, Response> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(mapper.transform(err)),
        }
    }
}

/// Like `map_err_response`, but shows the member the toast-safe wording of a payment failure.
pub trait MapPaymentError<T> {
    fn map_payment_err(self, mapper: ErrorResponse) -> Result<T, Response>;
}

impl<T> MapPaymentError<T> for Result<T, PaymentError> {
    fn map_payment_err(self, mapper: ErrorResponse) -> Result<T, Response> {
        self.map_err(|err| mapper.transform(err.user_message()))
    }
}

impl ErrorResponse {
    pub fn transform<E: ToString>(&self, err: E) -> Response {
        match self {
            Self::InternalServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
            Self::StatusCode(code) => (*code, err.to_string()).into_response(),
            Self::Toast => components::ToastAlert::Error(&err.to_string()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn payment_errors_toast_the_user_message() {
        let result: Result<(), PaymentError> = Err(PaymentError::Backend {
            status: StatusCode::BAD_REQUEST,
            code: Some("payment_session_id_invalid".to_string()),
            message: Some("raw backend text".to_string()),
        });
        let response = result.map_payment_err(ErrorResponse::Toast).unwrap_err();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_of(response).await;
        assert!(body.contains("Payment session is invalid or expired. Please try again."));
        assert!(!body.contains("raw backend text"));
    }

    #[tokio::test]
    async fn status_code_mapper_keeps_the_text() {
        let result: Result<(), &str> = Err("nope");
        let response = result
            .map_err_response(ErrorResponse::StatusCode(StatusCode::UNAUTHORIZED))
            .unwrap_err();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await, "nope");
    }
}
