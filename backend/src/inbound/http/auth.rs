//! Bearer credential extraction for HTTP handlers.
//!
//! Handlers take [`BearerAuth`] to obtain the raw token; verification is the
//! record service's job. A missing or non-bearer `Authorization` header is
//! rejected here with `401 unauthorized`.

use actix_web::http::header::AUTHORIZATION;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};
use serde_json::json;

use crate::domain::{BearerToken, Error};

const BEARER_SCHEME: &str = "bearer";

/// Bearer token taken from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerAuth(BearerToken);

impl BearerAuth {
    /// Token to hand to the domain.
    #[must_use]
    pub fn into_token(self) -> BearerToken {
        self.0
    }
}

fn missing_token(message: &str) -> Error {
    Error::unauthorized(message).with_details(json!({ "code": "missing_token" }))
}

/// Parse `Bearer <token>`; the scheme is case-insensitive.
fn parse_authorization(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn extract(req: &HttpRequest) -> Result<BearerAuth, Error> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| missing_token("authorization header is missing"))?;
    let value = header
        .to_str()
        .map_err(|_| missing_token("authorization header is not valid text"))?;
    parse_authorization(value)
        .map(|token| BearerAuth(BearerToken::new(token)))
        .ok_or_else(|| missing_token("authorization header must use the Bearer scheme"))
}

impl FromRequest for BearerAuth {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract(req))
    }
}
