//! Request extractors for the authenticated principal and origin address.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use berth_common::error::BerthError;
use berth_control::RequestContext;

use crate::error::ApiError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// The verified caller of a request.
///
/// Rejects with 401 when the `Authorization: Bearer` header is missing or
/// the identity provider does not accept the token.
#[derive(Debug, Clone)]
pub struct Authenticated(pub RequestContext);

/// Origin address of a request: the first `X-Forwarded-For` entry when
/// present, otherwise the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAddr(pub Option<String>);

/// Extracts the bearer token from request headers.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn source_address(parts: &Parts) -> Option<String> {
    let forwarded = parts
        .headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(first) = forwarded {
        return Some(first.to_string());
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

impl<S: Send + Sync> FromRequestParts<S> for SourceAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(source_address(parts)))
    }
}

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| BerthError::unauthorized("missing bearer token"))?
            .to_string();
        let principal = state.identity.verify(&token).await?;
        Ok(Self(RequestContext {
            principal,
            source: source_address(parts),
        }))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderValue, Request};

    use super::*;

    fn parts_with(headers: &[(&'static str, &'static str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, HeaderValue::from_static(value));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let parts = parts_with(&[("authorization", "bearer abc")]);
        assert_eq!(bearer_token(&parts.headers), Some("abc"));
        let parts = parts_with(&[("authorization", "Basic abc")]);
        assert_eq!(bearer_token(&parts.headers), None);
        let parts = parts_with(&[("authorization", "Bearer ")]);
        assert_eq!(bearer_token(&parts.headers), None);
    }

    #[test]
    fn forwarded_for_wins_over_peer() {
        let mut parts = parts_with(&[("x-forwarded-for", "203.0.113.9, 10.0.0.1")]);
        let _ = parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(source_address(&parts).as_deref(), Some("203.0.113.9"));
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let mut parts = parts_with(&[]);
        assert_eq!(source_address(&parts), None);
        let _ = parts
            .extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 5], 4000))));
        assert_eq!(source_address(&parts).as_deref(), Some("192.168.1.5"));
    }
}
