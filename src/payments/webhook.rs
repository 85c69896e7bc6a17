use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::types::SettlementAck;
use crate::{
    cache::SettlementSignal,
    components::ToastAlert,
    err_responses::{ErrorResponse, MapErrorResponse},
    AppState,
};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

#[derive(Clone)]
pub struct VerifySigState {
    pub hmac_secret: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, Response> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| (StatusCode::UNAUTHORIZED, format!("{name} header missing")).into_response())
}

/// Rejects events whose signature over `timestamp ‖ body` does not match.
pub async fn ver_sig(
    State(state): State<VerifySigState>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let (parts, body) = req.into_parts();

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err_response(ErrorResponse::InternalServerError)?;

    let timestamp = header_str(&parts.headers, TIMESTAMP_HEADER)?;
    let signature = STANDARD
        .decode(header_str(&parts.headers, SIGNATURE_HEADER)?)
        .map_err_response(ErrorResponse::StatusCode(StatusCode::UNAUTHORIZED))?;

    let mut hmac = Hmac::<Sha256>::new_from_slice(state.hmac_secret.as_bytes())
        .map_err_response(ErrorResponse::InternalServerError)?;
    hmac.update(timestamp.as_bytes());
    hmac.update(body_bytes.as_ref());
    hmac.verify_slice(&signature).map_err(|err| {
        tracing::warn!(%timestamp, "webhook signature mismatch");
        ErrorResponse::StatusCode(StatusCode::UNAUTHORIZED).transform(err)
    })?;

    Ok(next
        .run(Request::from_parts(parts, Body::from(body_bytes)))
        .await)
}

fn toast_for(ack: &SettlementAck) -> ToastAlert<'static> {
    match ack.kind.as_deref() {
        Some("payment_success") => {
            ToastAlert::Success("Payment successful! Loan repayment processed.")
        }
        Some("payment_failed") => ToastAlert::Error("Payment failed. Please try again."),
        _ => ToastAlert::Success("Payment status updated."),
    }
}

/// Forwards a gateway event to the backend untouched and reports what it made of it.
pub async fn passthrough(State(state): State<AppState>, body: Bytes) -> Result<Response, Response> {
    let ack = state
        .backend
        .forward_webhook(body.to_vec())
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "backend did not accept webhook");
            ErrorResponse::StatusCode(StatusCode::BAD_GATEWAY).transform(err.user_message())
        })?;

    state.cache.invalidate(&SettlementSignal::WebhookProcessed);
    tracing::info!(kind = ack.kind.as_deref().unwrap_or("unknown"), "webhook settled");

    Ok(toast_for(&ack).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::tests::{app_for, body_string};

    const SECRET: &str = "whsec_test";

    fn sign(timestamp: &str, body: &[u8]) -> String {
        let mut hmac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        hmac.update(timestamp.as_bytes());
        hmac.update(body);
        STANDARD.encode(hmac.finalize().into_bytes())
    }

    fn event() -> serde_json::Value {
        json!({"type": "PAYMENT_SUCCESS_WEBHOOK", "data": {"order": {"order_id": "O1"}}})
    }

    async fn backend_acking(kind: &str, expected_calls: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/payments/webhook"))
            .and(body_json(event()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "type": kind
            })))
            .expect(expected_calls)
            .mount(&server)
            .await;
        server
    }

    fn webhook_request(headers: &[(&str, String)], body: &[u8]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/payments/webhook")
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder.body(Body::from(body.to_vec())).unwrap()
    }

    #[test]
    fn toast_follows_reply_type() {
        let ack = |kind: Option<&str>| SettlementAck {
            kind: kind.map(str::to_string),
            ..Default::default()
        };
        assert!(matches!(
            toast_for(&ack(Some("payment_success"))),
            ToastAlert::Success("Payment successful! Loan repayment processed.")
        ));
        assert!(matches!(
            toast_for(&ack(Some("payment_failed"))),
            ToastAlert::Error("Payment failed. Please try again.")
        ));
        assert!(matches!(
            toast_for(&ack(None)),
            ToastAlert::Success("Payment status updated.")
        ));
    }

    #[tokio::test]
    async fn unsigned_webhook_is_forwarded_verbatim_without_secret() {
        let server = backend_acking("payment_success", 1).await;
        let body = serde_json::to_vec(&event()).unwrap();

        let response = app_for(&server, None)
            .oneshot(webhook_request(&[], &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains("Payment successful! Loan repayment processed."));
    }

    #[tokio::test]
    async fn signed_webhook_passes_and_bad_signature_is_401() {
        let server = backend_acking("payment_failed", 1).await;
        let body = serde_json::to_vec(&event()).unwrap();
        let timestamp = "1718000000".to_string();

        let forged = app_for(&server, Some(SECRET))
            .oneshot(webhook_request(
                &[
                    (TIMESTAMP_HEADER, timestamp.clone()),
                    (SIGNATURE_HEADER, sign("1718000001", &body)),
                ],
                &body,
            ))
            .await
            .unwrap();
        assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

        let missing = app_for(&server, Some(SECRET))
            .oneshot(webhook_request(&[], &body))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let signed = app_for(&server, Some(SECRET))
            .oneshot(webhook_request(
                &[
                    (TIMESTAMP_HEADER, timestamp.clone()),
                    (SIGNATURE_HEADER, sign(&timestamp, &body)),
                ],
                &body,
            ))
            .await
            .unwrap();
        assert_eq!(signed.status(), StatusCode::OK);
        assert!(body_string(signed)
            .await
            .contains("Payment failed. Please try again."));
    }

    #[tokio::test]
    async fn backend_rejection_is_a_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/payments/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Unknown order"
            })))
            .mount(&server)
            .await;

        let response = app_for(&server, None)
            .oneshot(webhook_request(&[], b"{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_string(response).await, "Unknown order");
    }

    #[tokio::test]
    async fn wrapped_ack_still_picks_the_toast_by_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/payments/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "type": "payment_failed",
                "data": {"order_id": "O1", "payment_status": "FAILED"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = app_for(&server, None)
            .oneshot(webhook_request(&[], b"{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response)
            .await
            .contains("Payment failed. Please try again."));
    }
}
