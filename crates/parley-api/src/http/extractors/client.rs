//! Client identity extractor.
//!
//! The quota is keyed by the caller's IP address. By default this is the
//! connection's peer address; behind a reverse proxy, set
//! `server.trust_forwarded_for` to use the first `X-Forwarded-For` hop.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::http::error::AppError;
use crate::state::AppState;

/// Quota key for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity(pub String);

impl FromRequestParts<AppState> for ClientIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.config.server.trust_forwarded_for {
            if let Some(hop) = first_forwarded_hop(parts) {
                return Ok(ClientIdentity(hop));
            }
        }

        let ConnectInfo(addr) = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .copied()
            .ok_or_else(|| {
                AppError::BadRequest("Could not determine client address".to_string())
            })?;

        Ok(ClientIdentity(addr.ip().to_string()))
    }
}

/// First entry of `X-Forwarded-For`, if present and non-empty.
fn first_forwarded_hop(parts: &Parts) -> Option<String> {
    let header = parts.headers.get("x-forwarded-for")?.to_str().ok()?;
    let hop = header.split(',').next()?.trim();
    if hop.is_empty() {
        None
    } else {
        Some(hop.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use parley_types::config::GlobalConfig;

    fn state(trust_forwarded_for: bool) -> AppState {
        let mut config = GlobalConfig::default();
        config.server.trust_forwarded_for = trust_forwarded_for;
        AppState::new(std::env::temp_dir(), config)
    }

    fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/check-usage");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            parts.extensions.insert(ConnectInfo(addr));
        }
        parts
    }

    #[tokio::test]
    async fn peer_ip_without_port() {
        let mut p = parts(None, Some("10.0.0.7:51234"));
        let id = ClientIdentity::from_request_parts(&mut p, &state(false))
            .await
            .unwrap();
        assert_eq!(id, ClientIdentity("10.0.0.7".to_string()));
    }

    #[tokio::test]
    async fn forwarded_header_ignored_unless_trusted() {
        let mut p = parts(Some("203.0.113.9"), Some("10.0.0.7:51234"));
        let id = ClientIdentity::from_request_parts(&mut p, &state(false))
            .await
            .unwrap();
        assert_eq!(id.0, "10.0.0.7");
    }

    #[tokio::test]
    async fn first_forwarded_hop_when_trusted() {
        let mut p = parts(Some(" 203.0.113.9 , 10.0.0.1"), Some("10.0.0.7:51234"));
        let id = ClientIdentity::from_request_parts(&mut p, &state(true))
            .await
            .unwrap();
        assert_eq!(id.0, "203.0.113.9");
    }

    #[tokio::test]
    async fn missing_connect_info_is_rejected() {
        let mut p = parts(None, None);
        let err = ClientIdentity::from_request_parts(&mut p, &state(false))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
