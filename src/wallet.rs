use std::str::FromStr;

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use maud::{html, Markup};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::{
    backend::views::WithdrawalStatus,
    cache::{QueryKey, SettlementSignal},
    components::{self, ToastAlert},
    err_responses::{ErrorResponse, MapPaymentError},
    payments::{self, error::PaymentError, types::OrderRequest},
    session::MemberSession,
    AppState,
};

const MIN_WITHDRAWAL: Decimal = Decimal::from_parts(500, 0, 0, false, 0);
const MAX_WITHDRAWAL: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);
/// Share of a withdrawal held back as TDS.
const TDS_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 2);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/loans/repay", get(repay_form).post(repay))
        .route("/wallet", get(wallet_page))
        .route("/wallet/withdraw", post(withdraw))
        .route("/wallet/withdrawals/{status}", get(withdrawals))
        .with_state(state)
}

fn decimal_of(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(text) => Decimal::from_str(text.trim()).ok(),
        Value::Number(number) => Decimal::from_str(&number.to_string()).ok(),
        _ => None,
    }
}

/// Where the member stands on their loan, read off the `status=all` transaction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoanPosition {
    pub has_loan: bool,
    pub loan_amount: Decimal,
    pub due: Decimal,
    pub repay_enabled: bool,
    pub repaid_today: bool,
}

impl LoanPosition {
    pub fn from_transactions(reply: &Value) -> Self {
        let records = reply["data"].as_array().map(Vec::as_slice).unwrap_or_default();

        let approved_loan = records.iter().find(|record| {
            record["status"]
                .as_str()
                .is_some_and(|status| status.eq_ignore_ascii_case("approved"))
                && (record["transaction_type"]
                    .as_str()
                    .is_some_and(|kind| kind.contains("Loan"))
                    || record["benefit_type"] == "loan")
        });

        // Transaction dates are ISO-8601, so string order is time order.
        let last_repayment = records
            .iter()
            .filter(|record| {
                record["is_loan_repayment"] == true && record["repayment_status"] == "Completed"
            })
            .max_by(|a, b| {
                a["transaction_date"]
                    .as_str()
                    .unwrap_or_default()
                    .cmp(b["transaction_date"].as_str().unwrap_or_default())
            });

        let loan_amount = approved_loan
            .and_then(|loan| decimal_of(&loan["ew_credit"]))
            .unwrap_or_default();
        let due = last_repayment
            .and_then(|repayment| decimal_of(&repayment["repayment_context"]["new_due_amount"]))
            .or_else(|| approved_loan.and_then(|loan| decimal_of(&loan["net_amount"])))
            .unwrap_or(loan_amount);

        Self {
            has_loan: approved_loan.is_some(),
            loan_amount,
            due,
            repay_enabled: reply["isRepayEnabled"] == true,
            repaid_today: reply["alreadyRepaidToday"] == true,
        }
    }

    /// Why a repayment cannot be started right now, if it cannot.
    pub fn blocked_reason(&self) -> Option<&'static str> {
        if !self.has_loan {
            Some("You have no approved loan to repay.")
        } else if self.due <= Decimal::ZERO {
            Some("Your loan is fully repaid.")
        } else if self.repaid_today {
            Some("You have already made a repayment today. Only one repayment allowed per Saturday.")
        } else if !self.repay_enabled {
            Some("Repayment is only available on Saturdays.")
        } else {
            None
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WithdrawalError {
    #[error("Please select withdrawal amount")]
    NoAmount,
    #[error("Insufficient balance. Available: ₹{available:.2}")]
    Insufficient { available: Decimal },
    #[error("Minimum withdrawal amount is ₹500")]
    BelowMinimum,
    #[error("Maximum withdrawal amount is ₹1000")]
    AboveMaximum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawalQuote {
    pub amount: Decimal,
    pub deduction: Decimal,
    pub net: Decimal,
}

impl WithdrawalQuote {
    pub fn new(amount: Decimal, balance: Decimal) -> Result<Self, WithdrawalError> {
        if amount <= Decimal::ZERO {
            return Err(WithdrawalError::NoAmount);
        }
        if amount > balance {
            return Err(WithdrawalError::Insufficient { available: balance });
        }
        if amount < MIN_WITHDRAWAL {
            return Err(WithdrawalError::BelowMinimum);
        }
        if amount > MAX_WITHDRAWAL {
            return Err(WithdrawalError::AboveMaximum);
        }
        let deduction = (amount * TDS_RATE).round_dp(2);
        Ok(Self {
            amount,
            deduction,
            net: amount - deduction,
        })
    }
}

pub async fn transactions_for(
    state: &AppState,
    session: &MemberSession,
    status: &str,
) -> Result<Value, PaymentError> {
    let backend = session.backend(&state.backend);
    state
        .cache
        .get_or_fetch(
            QueryKey::TransactionList {
                member_id: session.member_id().to_string(),
                status: status.to_string(),
            },
            || backend.transactions(status),
        )
        .await
}

pub async fn loan_position(state: &AppState, session: &MemberSession) -> Result<LoanPosition, PaymentError> {
    Ok(LoanPosition::from_transactions(
        &transactions_for(state, session, "all").await?,
    ))
}

pub async fn wallet_overview(state: &AppState, session: &MemberSession) -> Result<Value, PaymentError> {
    let backend = session.backend(&state.backend);
    state
        .cache
        .get_or_fetch(
            QueryKey::WalletOverview {
                member_id: session.member_id().to_string(),
            },
            || backend.wallet_overview(session.member_id()),
        )
        .await
}

fn repay_form_fragment(position: &LoanPosition) -> Markup {
    html! {
        #"repay_loan" ."card"."bg-base-200"."w-full"."max-w-md"."mx-auto" { ."card-body" {
            ."card-title" {"Repay Loan"}
            ."stats"."stats-vertical" {
                ."stat" { ."stat-title" {"Loan Amount"} ."stat-value"."text-lg" {"₹"(position.loan_amount.round_dp(2))} }
                ."stat" { ."stat-title" {"Due Amount"} ."stat-value"."text-lg" {"₹"(position.due.round_dp(2))} }
            }
            @match position.blocked_reason() {
                Some(reason) => ."alert"."alert-warning" { span {(reason)} },
                None => form hx-post="/loans/repay" hx-target="#checkout_slot" {
                    label ."form-control" {
                        ."label" { span ."label-text" {"Amount"} }
                        input ."input"."input-bordered" type="number" name="amount" min="1" step="0.01"
                            max=(position.due) value=(position.due) required;
                    }
                    button ."btn"."btn-primary"."mt-4" type="submit" {"Pay Now"}
                },
            }
        }}
        #"checkout_slot" {}
    }
}

async fn repay_form(State(state): State<AppState>, session: MemberSession) -> Response {
    let content = match loan_position(&state, &session).await {
        Ok(position) => repay_form_fragment(&position),
        Err(err) => components::error_alert(&err.user_message()),
    };
    components::member_page(session.display_name(), content, None).into_response()
}

#[derive(Deserialize)]
struct AmountForm {
    amount: String,
}

async fn repay(
    State(state): State<AppState>,
    session: MemberSession,
    Form(form): Form<AmountForm>,
) -> Result<Markup, Response> {
    let position = loan_position(&state, &session)
        .await
        .map_payment_err(ErrorResponse::Toast)?;
    if let Some(reason) = position.blocked_reason() {
        return Err(ToastAlert::Error(reason).into_response());
    }

    let order = payments::parse_amount(&form.amount)
        .and_then(|amount| {
            OrderRequest::loan_repayment(
                amount,
                position.due,
                &state.config.currency,
                session.customer(),
            )
        })
        .map_payment_err(ErrorResponse::Toast)?;

    payments::start_checkout(&state, &session, order).await
}

async fn wallet_page(State(state): State<AppState>, session: MemberSession) -> Response {
    let content = match wallet_overview(&state, &session).await {
        Ok(overview) => html! {
            (components::details_list("Wallet", &overview))
            form ."card"."bg-base-200"."w-full"."max-w-md"."my-2" hx-post="/wallet/withdraw" hx-swap="none" {
                ."card-body" {
                    ."card-title" {"Withdraw"}
                    p ."text-sm"."opacity-70" {"Between ₹500 and ₹1000. 15% TDS is deducted."}
                    input ."input"."input-bordered" type="number" name="amount" min="500" max="1000" step="1" required;
                    button ."btn"."btn-primary" type="submit" {"Request Withdrawal"}
                }
            }
            ."join" {
                a ."btn"."join-item" href="/wallet/withdrawals/pending" {(WithdrawalStatus::Pending.title())}
                a ."btn"."join-item" href="/wallet/withdrawals/completed" {(WithdrawalStatus::Completed.title())}
            }
        },
        Err(err) => components::error_alert(&err.user_message()),
    };
    components::member_page(session.display_name(), content, None).into_response()
}

async fn withdraw(
    State(state): State<AppState>,
    session: MemberSession,
    Form(form): Form<AmountForm>,
) -> Result<Response, Response> {
    let amount = payments::parse_amount(&form.amount).map_payment_err(ErrorResponse::Toast)?;
    let overview = wallet_overview(&state, &session)
        .await
        .map_payment_err(ErrorResponse::Toast)?;
    let balance = decimal_of(&overview["balance"]).unwrap_or_default();
    let quote = WithdrawalQuote::new(amount, balance).map_err(|err| {
        ToastAlert::Error(&err.to_string()).into_response()
    })?;

    let ack = session
        .backend(&state.backend)
        .request_withdrawal(session.member_id(), quote.amount)
        .await
        .map_payment_err(ErrorResponse::Toast)?;

    state.cache.invalidate(&SettlementSignal::WithdrawalRequested {
        member_id: session.member_id().to_string(),
    });
    tracing::info!(
        member_id = session.member_id(),
        amount = %quote.amount,
        net = %quote.net,
        "withdrawal requested"
    );

    let message = ack
        .message
        .unwrap_or_else(|| format!("Withdrawal requested. You will receive ₹{}.", quote.net));
    Ok(ToastAlert::Success(&message).into_response())
}

async fn withdrawals(
    State(state): State<AppState>,
    session: MemberSession,
    Path(status): Path<WithdrawalStatus>,
) -> Response {
    let backend = session.backend(&state.backend);
    let list = state
        .cache
        .get_or_fetch(
            QueryKey::Withdrawals {
                member_id: session.member_id().to_string(),
                status,
            },
            || backend.withdrawals(status),
        )
        .await;

    let content = match list {
        Ok(records) => components::records_table(status.title(), &records),
        Err(err) => components::error_alert(&err.user_message()),
    };
    components::member_page(session.display_name(), content, None).into_response()
}
