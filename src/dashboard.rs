use axum::{
    extract::{OriginalUri, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{cookie::Cookie, CookieJar};
use maud::{html, Markup};
use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use serde_json::Value;

use crate::{
    cache::QueryKey,
    components::{self, Flash, FLASH_COOKIE},
    payments::{
        error::PaymentError,
        reconcile::ReconcileState,
        types::{has_payment_params, strip_payment_params},
    },
    session::MemberSession,
    wallet::{self, LoanPosition},
    AppState,
};

const STATUS_FILTERS: [&str; 4] = ["all", "Completed", "Pending", "Failed"];

#[serde_inline_default]
#[derive(Deserialize)]
pub struct TransactionFilter {
    #[serde_inline_default("all".to_string())]
    status: String,
}

impl TransactionFilter {
    /// Unknown statuses list everything.
    fn status(&self) -> &'static str {
        STATUS_FILTERS
            .into_iter()
            .find(|status| *status == self.status)
            .unwrap_or("all")
    }
}

/// Verifies a checkout return at most once, then sends the browser back without the payment params.
async fn settle_redirect(
    state: &AppState,
    session: &MemberSession,
    path: &str,
    query: &str,
    jar: CookieJar,
) -> Response {
    let outcome = state
        .reconciler
        .reconcile(query, &session.backend(&state.backend), &state.cache)
        .await;

    let flash = match &outcome {
        ReconcileState::ParamsCleared(outcome) => outcome.flash(),
        _ => None,
    };
    let jar = match flash {
        Some(flash) => jar.add(
            Cookie::build((FLASH_COOKIE, flash.encode()))
                .path("/")
                .http_only(true)
                .max_age(time::Duration::minutes(5)),
        ),
        None => jar,
    };

    let remaining = strip_payment_params(query);
    let location = if remaining.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{remaining}")
    };
    (jar, Redirect::to(&location)).into_response()
}

fn view_or_alert(result: &Result<Value, PaymentError>, render: impl FnOnce(&Value) -> Markup) -> Markup {
    match result {
        Ok(value) => render(value),
        Err(err) => components::error_alert(&err.user_message()),
    }
}

fn loan_card(position: &LoanPosition) -> Markup {
    html! {
        ."card"."bg-base-200"."w-full"."my-2" { ."card-body" {
            ."card-title" {"Loan"}
            @if position.has_loan {
                p { "Due Amount: ₹" (position.due.round_dp(2)) }
            }
            @match position.blocked_reason() {
                Some(reason) => p ."opacity-70" {(reason)},
                None => ."card-actions" { a ."btn"."btn-primary" href="/loans/repay" {"Repay Loan"} },
            }
        }}
    }
}

fn pay_now_form() -> Markup {
    html! {
        form ."card"."bg-base-200"."w-full"."my-2" hx-post="/payments/checkout" hx-target="#checkout_slot" {
            ."card-body" {
                ."card-title" {"Make a Payment"}
                input ."input"."input-bordered" type="number" name="amount" min="1" step="0.01" placeholder="Amount" required;
                input ."input"."input-bordered" type="text" name="note" placeholder="Note (optional)";
                ."card-actions" { button ."btn"."btn-primary" type="submit" {"Pay Now"} }
            }
        }
        #"checkout_slot" {}
    }
}

fn status_tabs(current: &str) -> Markup {
    html! {
        ."tabs"."tabs-boxed"."w-fit" role="tablist" {
            @for status in STATUS_FILTERS {
                a ."tab"."tab-active"[status == current] role="tab" href={"/dashboard?status="(status)} {(status)}
            }
        }
    }
}

pub async fn dashboard(
    State(state): State<AppState>,
    session: MemberSession,
    OriginalUri(uri): OriginalUri,
    Query(filter): Query<TransactionFilter>,
    jar: CookieJar,
) -> Response {
    let query = uri.query().unwrap_or_default();
    if has_payment_params(query) {
        return settle_redirect(&state, &session, uri.path(), query, jar).await;
    }

    let flash = jar.get(FLASH_COOKIE).and_then(|cookie| Flash::decode(cookie.value()));
    let jar = match flash {
        Some(_) => jar.remove(Cookie::build(FLASH_COOKIE).path("/")),
        None => jar,
    };

    let backend = session.backend(&state.backend);
    let member_id = session.member_id();
    let (overview, details, all_transactions) = tokio::join!(
        wallet::wallet_overview(&state, &session),
        state.cache.get_or_fetch(
            QueryKey::MemberDetails {
                member_id: member_id.to_string(),
            },
            || backend.member_details(member_id),
        ),
        wallet::transactions_for(&state, &session, "all"),
    );
    let status = filter.status();
    let listed = if status == "all" {
        all_transactions
    } else {
        wallet::transactions_for(&state, &session, status).await
    };
    let position = wallet::loan_position(&state, &session).await;

    let content = html! {
        ."grid"."lg:grid-cols-2"."gap-4" {
            (view_or_alert(&overview, |value| components::details_list("Wallet", value)))
            (view_or_alert(&details, |value| components::details_list("Member Details", value)))
        }
        @match &position {
            Ok(position) => (loan_card(position)),
            Err(err) => (components::error_alert(&err.user_message())),
        }
        (pay_now_form())
        (status_tabs(status))
        (view_or_alert(&listed, |reply| components::records_table("Transactions", &reply["data"])))
    };

    let toast = flash.as_ref().map(Flash::toast);
    (
        jar,
        components::member_page(session.display_name(), content, toast),
    )
        .into_response()
}
