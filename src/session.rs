use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::Response,
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    backend::BackendClient,
    err_responses::{ErrorResponse, MapErrorResponse},
    payments::types::Customer,
};

pub const SESSION_COOKIE: &str = "token";

#[derive(Clone)]
pub struct SessionKey(Arc<DecodingKey>);

impl SessionKey {
    pub fn new(secret: &str) -> Self {
        Self(Arc::new(DecodingKey::from_secret(secret.as_bytes())))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MemberClaims {
    pub member_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(with = "time::serde::timestamp")]
    pub exp: OffsetDateTime,
}

/// A signed-in member. The cookie token doubles as the backend bearer token.
#[derive(Clone, Debug)]
pub struct MemberSession {
    pub claims: MemberClaims,
    token: String,
}

impl MemberSession {
    pub fn decode(token: &str, key: &SessionKey) -> Result<Self, jsonwebtoken::errors::Error> {
        let claims =
            jsonwebtoken::decode::<MemberClaims>(token, &key.0, &Validation::new(Algorithm::HS256))?
                .claims;
        Ok(Self {
            claims,
            token: token.to_string(),
        })
    }

    pub fn member_id(&self) -> &str {
        &self.claims.member_id
    }

    pub fn display_name(&self) -> &str {
        self.claims.name.as_deref().unwrap_or(&self.claims.member_id)
    }

    pub fn customer(&self) -> Customer {
        Customer {
            email: self.claims.email.clone(),
            phone: self.claims.phone.clone(),
            name: self.claims.name.clone(),
            ..Customer::new(self.claims.member_id.clone())
        }
    }

    /// The shared backend client, acting as this member.
    pub fn backend(&self, backend: &BackendClient) -> BackendClient {
        backend.authorized(&self.token)
    }
}

impl<S> FromRequestParts<S> for MemberSession
where
    SessionKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let key = SessionKey::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or("Please sign in to continue")
            .map_err_response(ErrorResponse::StatusCode(StatusCode::UNAUTHORIZED))?;

        MemberSession::decode(&token, &key).map_err(|err| {
            tracing::debug!(error = %err, "rejected session token");
            ErrorResponse::StatusCode(StatusCode::UNAUTHORIZED).transform("Your session has expired, please sign in again")
        })
    }
}
