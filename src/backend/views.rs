use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BackendClient;
use crate::payments::{error::PaymentError, types::SettlementAck};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
}

impl WithdrawalStatus {
    fn path_segment(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Pending => "Pending Withdrawals",
            Self::Completed => "Approved Withdrawals",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithdrawRequest<'a> {
    member_id: &'a str,
    amount: Decimal,
}

/// Reads `data` out of a `{success, data, message}` reply, failing on `success:false`.
fn data_of(body: Value, fallback: &str) -> Result<Value, PaymentError> {
    if body.get("success") == Some(&Value::Bool(false)) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
            .to_string();
        return Err(PaymentError::Rejected(message));
    }
    Ok(match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    })
}

impl BackendClient {
    pub async fn wallet_overview(&self, member_id: &str) -> Result<Value, PaymentError> {
        let body = self
            .send(self.request(Method::GET, &["user", "overview", member_id]))
            .await?;
        data_of(body, "Failed to fetch wallet overview")
    }

    pub async fn member_details(&self, member_id: &str) -> Result<Value, PaymentError> {
        let body = self
            .send(self.request(Method::GET, &["user", "member", member_id]))
            .await?;
        data_of(body, "Failed to fetch member details")
    }

    /// The whole reply is kept: besides `data` it carries the repayment flags.
    pub async fn transactions(&self, status: &str) -> Result<Value, PaymentError> {
        let body = self
            .send(
                self.request(Method::GET, &["user", "transactions"])
                    .query(&[("status", status)]),
            )
            .await?;
        data_of(body.clone(), "Failed to fetch transactions")?;
        Ok(body)
    }

    pub async fn withdrawals(&self, status: WithdrawalStatus) -> Result<Value, PaymentError> {
        let body = self
            .send(self.request(Method::GET, &["user", "trasactions", status.path_segment()]))
            .await?;
        data_of(body, "Failed to fetch withdrawals")
    }

    pub async fn request_withdrawal(
        &self,
        member_id: &str,
        amount: Decimal,
    ) -> Result<SettlementAck, PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount);
        }
        self.send_payload(
            self.request(Method::POST, &["user", "withdraw", member_id])
                .json(&WithdrawRequest { member_id, amount }),
            "Withdrawal failed",
        )
        .await
    }
}
