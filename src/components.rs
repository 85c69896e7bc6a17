use axum::response::IntoResponse;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use maud::{html, Markup, PreEscaped, Render, DOCTYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::icons;

pub const FLASH_COOKIE: &str = "payment_flash";

pub fn layout(navbar_options: Markup, main_content: Option<Markup>, alerts: Option<Markup>) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                meta http-equiv="X-UA-Compatible" content="ie=edge";
                title {"Cooperative Member Portal"}
                link rel="stylesheet" href="/assets/styles.css";
            }
            body {
                header ."navbar"."bg-base-300"."lg:rounded-box"."lg:m-3"."lg:w-auto" {
                    (navbar_options)
                }
                main #"main_content" ."my-2"."lg:mx-4" { @if let Some(content) = main_content { (content) } }
                #"alerts"."toast"."*:w-fit"."items-end" { @if let Some(alerts) = alerts { (alerts) } }
                script src="https://unpkg.com/htmx.org@2.0.1" {}
                script src="https://code.jquery.com/jquery-3.7.1.slim.min.js" {}
            }
        }
    }
}

pub fn member_navbar(member_name: &str) -> Markup {
    html! {
        ."flex-1" { a ."btn"."btn-ghost"."text-xl" href="/dashboard" {"Member Portal"} }
        ."flex-none"."gap-2" {
            a ."btn"."btn-ghost" href="/loans/repay" {"Repay Loan"}
            a ."btn"."btn-ghost" href="/wallet" {(icons::wallet()) "Wallet"}
            span ."badge"."badge-outline" {(member_name)}
        }
    }
}

/// Page for a signed-in member, with an optional toast already in place.
pub fn member_page(member_name: &str, content: Markup, toast: Option<ToastAlert<'_>>) -> Markup {
    layout(
        member_navbar(member_name),
        Some(content),
        toast.map(|toast| toast.render()),
    )
}

pub enum ToastAlert<'a> {
    Success(&'a str),
    Error(&'a str),
}

impl Render for ToastAlert<'_> {
    fn render(&self) -> Markup {
        let toastid = uuid::Uuid::new_v4().simple();
        let classname = match self {
            Self::Success(_) => "alert-success",
            Self::Error(_) => "alert-error",
        };

        html! {div hx-swap-oob="afterbegin:#alerts" {
            #{"toast_"(toastid)}."alert"."transition-opacity"."duration-300".(classname) role="alert" {
                @match self {
                    Self::Success(text) => { (icons::success()) span {(text)} }
                    Self::Error(text) => { (icons::error()) span {(text)} }
                }
                script {(PreEscaped(format!("
                    setTimeout(() => {{
                        const toastElem = $('#toast_{}');
                        toastElem.on('transitionend', (event) => {{event.target.remove();}});
                        toastElem.css('opacity', 0);
                    }}, 4000);
                ", toastid)))}
            }
        }}
    }
}

impl IntoResponse for ToastAlert<'_> {
    fn into_response(self) -> axum::response::Response {
        self.render().into_response()
    }
}

pub fn error_alert(message: &str) -> Markup {
    html! { ."alert"."alert-error" {(icons::error()) span {(message)}} }
}

/// A toast that has to survive one redirect, carried in a cookie.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Flash {
    success: bool,
    message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(self).unwrap_or_default())
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn toast(&self) -> ToastAlert<'_> {
        if self.success {
            ToastAlert::Success(&self.message)
        } else {
            ToastAlert::Error(&self.message)
        }
    }
}

fn cell(value: &Value) -> Markup {
    match value {
        Value::Null => html! { span ."opacity-50" {"-"} },
        Value::String(text) => html! { (text) },
        Value::Bool(flag) => html! { @if *flag { "Yes" } @else { "No" } },
        Value::Number(number) => html! { (number) },
        other => html! { code {(other)} },
    }
}

/// Two-column listing of whatever fields the backend sent for a view.
pub fn details_list(title: &str, value: &Value) -> Markup {
    html! {
        ."card"."bg-base-200"."w-full"."my-2" { ."card-body" {
            ."card-title" {(title)}
            @if let Value::Object(fields) = value {
                table ."table"."table-sm" { tbody {
                    @for (key, field) in fields {
                        tr { th {(key)} td {(cell(field))} }
                    }
                }}
            } @else {
                p {(cell(value))}
            }
        }}
    }
}

/// Table of backend records; columns come from the first record.
pub fn records_table(title: &str, records: &Value) -> Markup {
    let rows = records.as_array().map(Vec::as_slice).unwrap_or_default();
    let columns: Vec<&String> = rows
        .first()
        .and_then(Value::as_object)
        .map(|first| first.keys().collect())
        .unwrap_or_default();

    html! {
        ."divider" {(title)}
        @if rows.is_empty() {
            p ."text-center"."opacity-70" {"Nothing to show yet"}
        } @else {
            ."overflow-x-auto" { table ."table"."table-zebra"."table-auto"."[&_td]:whitespace-nowrap" {
                thead { tr { @for column in &columns { th {(column)} } } }
                @for row in rows {
                    tr { @for column in &columns { td {(cell(row.get(column.as_str()).unwrap_or(&Value::Null)))} } }
                }
            }}
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn flash_survives_cookie_encoding() {
        let flash = Flash::error("Payment failed; try again, please");
        let encoded = flash.encode();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(Flash::decode(&encoded), Some(flash));
        assert_eq!(Flash::decode("not base64!"), None);
    }

    #[test]
    fn toast_is_out_of_band() {
        let markup = ToastAlert::Error("No response from server").render().into_string();
        assert!(markup.contains(r#"hx-swap-oob="afterbegin:#alerts""#));
        assert!(markup.contains("alert-error"));
        assert!(markup.contains("No response from server"));
    }

    #[test]
    fn records_table_uses_first_record_columns() {
        let markup = records_table(
            "Transactions",
            &json!([{"amount": 10, "status": "Completed"}, {"amount": 5}]),
        )
        .into_string();
        assert!(markup.contains("<th>amount</th>"));
        assert!(markup.contains("<th>status</th>"));
        assert!(markup.contains("Completed"));

        let empty = records_table("Transactions", &json!({"not": "a list"})).into_string();
        assert!(empty.contains("Nothing to show yet"));
    }
}
