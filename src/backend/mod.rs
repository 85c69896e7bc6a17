use reqwest::{Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::payments::{
    error::PaymentError,
    types::{CreateOrderReply, OrderRequest, SettlementAck, VerifyPaymentResponse},
};

pub mod views;

/// Thin JSON client for the cooperative's REST backend.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FailureBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SettlementRequest<'a> {
    member_id: &'a str,
    transaction_id: &'a str,
}

/// Envelope fields that describe the reply itself rather than the nested object.
const ENVELOPE_FIELDS: [&str; 3] = ["success", "message", "type"];

/// The backend sometimes nests the useful object under `data`. The envelope's own
/// fields are kept unless the nested object sets them. Rejections stay as sent.
pub fn payload(body: Value) -> Value {
    match body {
        Value::Object(mut map)
            if map.get("data").is_some_and(Value::is_object)
                && map.get("success") != Some(&Value::Bool(false)) =>
        {
            match map.remove("data") {
                Some(Value::Object(mut data)) => {
                    for field in ENVELOPE_FIELDS {
                        if let Some(value) = map.remove(field) {
                            data.entry(field).or_insert(value);
                        }
                    }
                    Value::Object(data)
                }
                other => other.unwrap_or_default(),
            }
        }
        other => other,
    }
}

/// `success:false` anywhere in the payload is a declared rejection.
fn rejection(body: &Value, fallback: &str) -> Option<PaymentError> {
    if body.get("success") == Some(&Value::Bool(false)) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);
        Some(PaymentError::Rejected(message.to_string()))
    } else {
        None
    }
}

impl BackendClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        Ok(Self {
            http,
            base_url,
            token: None,
        })
    }

    /// Same client, acting for the member whose backend token this is.
    pub fn authorized(&self, token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..self.clone()
        }
    }

    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(segments));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and returns the decoded body, or the matching failure.
    async fn send(&self, builder: RequestBuilder) -> Result<Value, PaymentError> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let failure = serde_json::from_slice::<FailureBody>(&bytes).unwrap_or_default();
            return Err(PaymentError::Backend {
                status,
                code: failure.code,
                message: failure.message,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(PaymentError::NoResponse);
        }
        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Null => Err(PaymentError::NoResponse),
            body => Ok(body),
        }
    }

    async fn send_payload<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<T, PaymentError> {
        let body = payload(self.send(builder).await?);
        if let Some(err) = rejection(&body, fallback) {
            return Err(err);
        }
        Ok(serde_json::from_value(body)?)
    }

    /// `POST /payments/create-order`. Declared rejections are left for the caller to judge.
    pub async fn create_order(&self, order: &OrderRequest) -> Result<CreateOrderReply, PaymentError> {
        let body = self
            .send(self.request(Method::POST, &["payments", "create-order"]).json(order))
            .await?;
        Ok(serde_json::from_value(payload(body))?)
    }

    pub async fn verify_payment(&self, order_id: &str) -> Result<VerifyPaymentResponse, PaymentError> {
        let body = self
            .send(self.request(Method::GET, &["payments", "verify", order_id]))
            .await?;
        Ok(serde_json::from_value(payload(body))?)
    }

    /// Hands a gateway event to the backend byte for byte.
    pub async fn forward_webhook(&self, raw_event: Vec<u8>) -> Result<SettlementAck, PaymentError> {
        self.send_payload(
            self.request(Method::POST, &["payments", "webhook"])
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(raw_event),
            "Webhook processing failed",
        )
        .await
    }

    pub async fn process_successful_payment(
        &self,
        member_id: &str,
        transaction_id: &str,
    ) -> Result<SettlementAck, PaymentError> {
        self.send_payload(
            self.request(Method::POST, &["payments", "process-successful-payment"])
                .json(&SettlementRequest {
                    member_id,
                    transaction_id,
                }),
            "Failed to process loan repayment",
        )
        .await
    }

    pub async fn process_failed_payment(
        &self,
        member_id: &str,
        transaction_id: &str,
    ) -> Result<SettlementAck, PaymentError> {
        self.send_payload(
            self.request(Method::POST, &["payments", "process-failed-payment"])
                .json(&SettlementRequest {
                    member_id,
                    transaction_id,
                }),
            "Failed to revert loan repayment",
        )
        .await
    }
}
