use axum::{
    response::{IntoResponse, Response},
    Form,
};
use maud::{html, Markup, PreEscaped, Render};
use serde::Deserialize;
use serde_json::Value;

use super::{error::PaymentError, types::OrderResponse};
use crate::{components::ToastAlert, config::PortalConfig};

pub const FAILURE_REPORT_PATH: &str = "/payments/checkout/failure";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckoutMode {
    Production,
    Sandbox,
}

impl CheckoutMode {
    /// Pure function of its inputs. A marked session id wins over the environment.
    pub fn select(payment_session_id: &str, api_base: &str) -> Self {
        let session = payment_session_id.to_ascii_lowercase();
        if session.contains("sandbox") || session.contains("test") {
            return Self::Sandbox;
        }
        if api_base.to_ascii_lowercase().contains("sandbox") {
            Self::Sandbox
        } else {
            Self::Production
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }
}

/// Checkout SDK location and the configured gateway API base.
#[derive(Clone, Debug)]
pub struct CheckoutContext {
    pub sdk_url: String,
    pub api_base: String,
}

impl CheckoutContext {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            sdk_url: config.cashfree_sdk_url.clone(),
            api_base: config.cashfree_api_base.clone(),
        }
    }

    pub fn handoff(&self, order: &OrderResponse) -> Result<CheckoutHandoff, PaymentError> {
        if order.payment_session_id.trim().is_empty() {
            return Err(PaymentError::MalformedOrderResponse);
        }
        let mode = CheckoutMode::select(&order.payment_session_id, &self.api_base);
        tracing::info!(
            order_id = order.order_id.as_deref().unwrap_or_default(),
            mode = mode.as_str(),
            "handing off to hosted checkout"
        );
        Ok(CheckoutHandoff {
            mode,
            payment_session_id: order.payment_session_id.clone(),
            sdk_url: self.sdk_url.clone(),
        })
    }
}

/// Markup that loads the checkout SDK at most once per page and redirects the whole page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutHandoff {
    pub mode: CheckoutMode,
    pub payment_session_id: String,
    pub sdk_url: String,
}

fn js_string(value: &str) -> String {
    Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}

impl CheckoutHandoff {
    pub fn script(&self) -> String {
        format!(
            r#"(function () {{
    const sessionId = {session};
    const mode = {mode};
    const report = (stage, message) => htmx.ajax('POST', {report_path}, {{
        values: {{ stage: stage, message: String(message || '') }},
        swap: 'none'
    }});
    const start = () => {{
        const cashfree = Cashfree({{ mode: mode }});
        cashfree.checkout({{ paymentSessionId: sessionId, redirectTarget: '_self' }})
            .then((result) => {{ if (result && result.error) report('checkout', result.error.message); }})
            .catch((err) => report('checkout', err && err.message));
    }};
    if (window.Cashfree) {{ start(); return; }}
    const script = document.createElement('script');
    script.src = {sdk_url};
    script.onload = start;
    script.onerror = () => report('load', '');
    document.head.appendChild(script);
}})();"#,
            session = js_string(&self.payment_session_id),
            mode = js_string(self.mode.as_str()),
            report_path = js_string(FAILURE_REPORT_PATH),
            sdk_url = js_string(&self.sdk_url),
        )
    }
}

impl Render for CheckoutHandoff {
    fn render(&self) -> Markup {
        html! {
            #"checkout_handoff" ."card"."bg-base-200"."w-full"."max-w-md"."mx-auto" data-mode=(self.mode.as_str()) {
                ."card-body"."items-center" {
                    ."card-title" {"Redirecting to payment gateway..."}
                    progress ."progress"."progress-primary"."w-56" {}
                }
            }
            (ToastAlert::Success("Redirecting to payment gateway..."))
            script {(PreEscaped(self.script()))}
        }
    }
}

/// Turns a raw SDK failure message into guidance the member can act on.
pub fn classify_failure(message: &str) -> String {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("network") {
        "Network error. Please check your connection and try again.".to_string()
    } else if message.contains("400") {
        "Invalid payment session. Please try again.".to_string()
    } else if message.trim().is_empty() {
        "Payment initialization failed".to_string()
    } else {
        message.to_string()
    }
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Load,
    #[default]
    Checkout,
}

#[derive(Deserialize, Debug)]
pub struct CheckoutFailureReport {
    #[serde(default)]
    stage: FailureStage,
    #[serde(default)]
    message: String,
}

pub async fn report_failure(Form(report): Form<CheckoutFailureReport>) -> Response {
    let message = match report.stage {
        FailureStage::Load => PaymentError::SdkLoad.user_message(),
        FailureStage::Checkout => classify_failure(&report.message),
    };
    tracing::warn!(stage = ?report.stage, raw = %report.message, "hosted checkout failed");
    ToastAlert::Error(&message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(session: &str) -> OrderResponse {
        OrderResponse {
            order_id: Some("O1".to_string()),
            payment_session_id: session.to_string(),
            order_amount: None,
            order_currency: None,
            is_loan_repayment: true,
            member_id: None,
            member_name: None,
            loan_details: None,
        }
    }

    fn context(api_base: &str) -> CheckoutContext {
        CheckoutContext {
            sdk_url: crate::config::DEFAULT_SDK_URL.to_string(),
            api_base: api_base.to_string(),
        }
    }

    #[test]
    fn marked_sessions_are_always_sandbox() {
        for session in ["sandbox_abc123", "session_TEST_9", "xSandBoxy", "test"] {
            for env in ["", "https://api.cashfree.com/pg", "https://sandbox.cashfree.com/pg"] {
                assert_eq!(CheckoutMode::select(session, env), CheckoutMode::Sandbox);
            }
        }
    }

    #[test]
    fn unmarked_sessions_follow_the_environment() {
        assert_eq!(
            CheckoutMode::select("session_abc", "https://sandbox.cashfree.com/pg"),
            CheckoutMode::Sandbox
        );
        assert_eq!(
            CheckoutMode::select("session_abc", "https://api.cashfree.com/pg"),
            CheckoutMode::Production
        );
        assert_eq!(CheckoutMode::select("", ""), CheckoutMode::Production);
    }

    #[test]
    fn selection_is_deterministic() {
        let inputs = [("session_abc", ""), ("sandbox_1", "prod"), ("x", "SANDBOX")];
        for (session, env) in inputs {
            let first = CheckoutMode::select(session, env);
            assert!((0..5).all(|_| CheckoutMode::select(session, env) == first));
        }
    }

    #[test]
    fn handoff_for_sandbox_session() {
        let handoff = context("").handoff(&order("sandbox_abc123")).unwrap();
        assert_eq!(handoff.mode, CheckoutMode::Sandbox);
        assert_eq!(handoff.payment_session_id, "sandbox_abc123");

        let script = handoff.script();
        assert!(script.contains(r#"const sessionId = "sandbox_abc123";"#));
        assert!(script.contains(r#"const mode = "sandbox";"#));
        assert!(script.contains("redirectTarget: '_self'"));
        assert!(script.contains("if (window.Cashfree)"));
    }

    #[test]
    fn handoff_refuses_blank_sessions() {
        assert!(matches!(
            context("").handoff(&order(" ")),
            Err(PaymentError::MalformedOrderResponse)
        ));
    }

    #[test]
    fn session_ids_cannot_break_out_of_the_script() {
        let handoff = context("").handoff(&order("a\"</script><b>")).unwrap();
        let script = handoff.script();
        assert!(!script.contains("</script>"));
        assert!(script.contains(r#""a\"<\/script><b>""#));
    }

    #[test]
    fn failures_are_classified_by_message() {
        assert_eq!(
            classify_failure("TypeError: network request failed"),
            "Network error. Please check your connection and try again."
        );
        assert_eq!(
            classify_failure("Request failed with status code 400"),
            "Invalid payment session. Please try again."
        );
        assert_eq!(classify_failure("popup blocked"), "popup blocked");
        assert_eq!(classify_failure(""), "Payment initialization failed");
    }
}
