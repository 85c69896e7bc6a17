use std::str::FromStr;

use axum::{
    extract::State,
    middleware::from_fn_with_state,
    response::Response,
    routing::post,
    Form, Router,
};
use maud::{Markup, Render};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    err_responses::{ErrorResponse, MapPaymentError},
    session::MemberSession,
    AppState,
};

pub mod checkout;
pub mod error;
pub mod order;
pub mod reconcile;
mod repayment;
pub mod types;
mod webhook;

use self::{
    error::PaymentError,
    types::{OrderNotes, OrderRequest},
    webhook::VerifySigState,
};

pub fn router(state: AppState) -> Router {
    let mut webhook_routes = Router::new().route("/webhook", post(webhook::passthrough));
    if let Some(hmac_secret) = state.config.webhook_secret.clone() {
        webhook_routes = webhook_routes.route_layer(from_fn_with_state(
            VerifySigState { hmac_secret },
            webhook::ver_sig,
        ));
    }

    Router::new()
        .route("/checkout", post(pay_now))
        .route("/checkout/failure", post(checkout::report_failure))
        .route("/repayment/confirm", post(repayment::confirm))
        .route("/repayment/revert", post(repayment::revert))
        .merge(webhook_routes)
        .with_state(state)
}

/// Amounts arrive as form text; anything that is not a plain decimal is invalid.
pub fn parse_amount(raw: &str) -> Result<Decimal, PaymentError> {
    Decimal::from_str(raw.trim()).map_err(|_| PaymentError::InvalidAmount)
}

/// Order Requester followed by the Checkout Bridge. The fragment hands the page to the gateway.
pub async fn start_checkout(
    state: &AppState,
    session: &MemberSession,
    order: OrderRequest,
) -> Result<Markup, Response> {
    let created = order::request_order(
        &session.backend(&state.backend),
        &order,
        &state.config.currency,
    )
    .await
    .map_payment_err(ErrorResponse::Toast)?;

    let handoff = state
        .checkout
        .handoff(&created)
        .map_payment_err(ErrorResponse::Toast)?;
    Ok(handoff.render())
}

#[derive(Deserialize)]
struct PayNowForm {
    amount: String,
    #[serde(default)]
    note: Option<String>,
}

async fn pay_now(
    State(state): State<AppState>,
    session: MemberSession,
    Form(form): Form<PayNowForm>,
) -> Result<Markup, Response> {
    let notes = match form.note.as_deref().map(str::trim) {
        Some(note) if !note.is_empty() => OrderNotes::default().with("note", note),
        _ => OrderNotes::default(),
    };
    let order = parse_amount(&form.amount)
        .and_then(|amount| {
            OrderRequest::new(amount, &state.config.currency, session.customer(), notes)
        })
        .map_payment_err(ErrorResponse::Toast)?;

    start_checkout(&state, &session, order).await
}
