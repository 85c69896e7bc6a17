use std::sync::Arc;

use axum::{
    extract::FromRef,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_extra::extract::CookieJar;
use maud::html;
use shuttle_runtime::{CustomError, SecretStore};
use tower_http::{services::ServeDir, trace::TraceLayer};

mod backend;
mod cache;
mod components;
mod config;
mod dashboard;
mod err_responses;
mod icons;
mod payments;
mod session;
mod wallet;

use self::{
    backend::BackendClient,
    cache::ViewCache,
    config::PortalConfig,
    payments::{checkout::CheckoutContext, reconcile::RedirectReconciler},
    session::{SessionKey, SESSION_COOKIE},
};

#[derive(Clone)]
struct AppState {
    config: Arc<PortalConfig>,
    backend: BackendClient,
    cache: ViewCache,
    reconciler: RedirectReconciler,
    checkout: CheckoutContext,
    session_key: SessionKey,
}

impl AppState {
    fn new(config: PortalConfig, http_client: reqwest::Client) -> Result<Self, url::ParseError> {
        Ok(Self {
            backend: BackendClient::new(http_client, &config.backend_url)?,
            cache: ViewCache::new(config.view_cache_ttl),
            reconciler: RedirectReconciler::new(config.reconcile_retention),
            checkout: CheckoutContext::from_config(&config),
            session_key: SessionKey::new(&config.session_jwt_secret),
            config: Arc::new(config),
        })
    }
}

impl FromRef<AppState> for SessionKey {
    fn from_ref(state: &AppState) -> Self {
        state.session_key.clone()
    }
}

async fn home(cookies: CookieJar) -> Response {
    match cookies.get(SESSION_COOKIE) {
        None => components::layout(
            html! {
                ."flex-1" { span ."text-xl"."px-4" {"Member Portal"} }
            },
            Some(html! {
                ."hero"."min-h-64" { ."hero-content"."text-center" {
                    p {"Sign in through the cooperative app to open your dashboard."}
                }}
            }),
            None,
        )
        .into_response(),
        Some(_) => Redirect::to("/dashboard").into_response(),
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/dashboard", get(dashboard::dashboard))
        .with_state(state.clone())
        .merge(wallet::router(state.clone()))
        .nest("/payments", payments::router(state))
        .nest_service("/assets", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
}

#[shuttle_runtime::main]
async fn main(#[shuttle_runtime::Secrets] secret_store: SecretStore) -> shuttle_axum::ShuttleAxum {
    let config = PortalConfig::from_secrets(&secret_store).map_err(CustomError::new)?;
    let state = AppState::new(config, reqwest::Client::new()).map_err(CustomError::new)?;

    tracing::info!(
        backend = %state.config.backend_url,
        currency = %state.config.currency,
        webhook_signatures = state.config.webhook_secret.is_some(),
        "member portal configured"
    );

    Ok(app(state).into())
}
