use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;

use crate::{
    cache::SettlementSignal, components::ToastAlert, session::MemberSession, AppState,
};

pub const REVERT_FAILED: &str = "Failed to revert loan repayment - contact support";

#[derive(Deserialize)]
pub struct SettlementForm {
    transaction_id: String,
}

pub async fn confirm(
    State(state): State<AppState>,
    session: MemberSession,
    Form(form): Form<SettlementForm>,
) -> Response {
    let result = session
        .backend(&state.backend)
        .process_successful_payment(session.member_id(), &form.transaction_id)
        .await;

    match result {
        Ok(ack) => {
            state.cache.invalidate(&SettlementSignal::RepaymentConfirmed {
                member_id: session.member_id().to_string(),
            });
            tracing::info!(
                member_id = session.member_id(),
                transaction_id = %form.transaction_id,
                "loan repayment confirmed"
            );
            let message = ack
                .message
                .unwrap_or_else(|| "Loan repayment processed successfully".to_string());
            ToastAlert::Success(&message).into_response()
        }
        Err(err) => {
            tracing::warn!(
                member_id = session.member_id(),
                transaction_id = %form.transaction_id,
                error = %err,
                "loan repayment not confirmed"
            );
            ToastAlert::Error(&err.user_message()).into_response()
        }
    }
}

/// Compensates a repayment whose payment failed. Never retried here.
pub async fn revert(
    State(state): State<AppState>,
    session: MemberSession,
    Form(form): Form<SettlementForm>,
) -> Response {
    let result = session
        .backend(&state.backend)
        .process_failed_payment(session.member_id(), &form.transaction_id)
        .await;

    match result {
        Ok(_) => {
            state.cache.invalidate(&SettlementSignal::RepaymentReverted {
                member_id: session.member_id().to_string(),
            });
            tracing::info!(
                member_id = session.member_id(),
                transaction_id = %form.transaction_id,
                "loan repayment reverted"
            );
            ToastAlert::Success("Loan repayment reverted").into_response()
        }
        Err(err) => {
            tracing::error!(
                member_id = session.member_id(),
                transaction_id = %form.transaction_id,
                error = %err,
                "loan repayment revert failed, manual intervention required"
            );
            ToastAlert::Error(REVERT_FAILED).into_response()
        }
    }
}
