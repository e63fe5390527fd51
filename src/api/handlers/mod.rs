//! Route handlers and the request plumbing they share.

pub mod auth;
pub mod documents;
pub mod health;

use axum::{
    extract::ConnectInfo,
    http::{header::USER_AGENT, HeaderMap},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::state::ApiConfig;
use crate::gate::{ClientInfo, GateError};

/// First address from `x-forwarded-for`, else `x-real-ip`.
pub(crate) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Forwarded headers are only honored behind a trusted proxy; otherwise the
/// peer address is used.
pub(crate) fn client_info(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    config: &ApiConfig,
) -> ClientInfo {
    let forwarded = if config.trust_forwarded_headers() {
        extract_client_ip(headers)
    } else {
        None
    };
    let addr = forwarded.or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()));
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientInfo { addr, user_agent }
}

/// Fallback for unknown paths.
pub async fn not_found() -> Response {
    GateError::NotFound.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;

    #[test]
    fn extract_client_ip_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("1.2.3.4".to_string()));
    }

    #[test]
    fn extract_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(extract_client_ip(&headers), Some("9.9.9.9".to_string()));
    }

    #[test]
    fn forwarded_headers_ignored_unless_trusted() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.5"));
        let peer = ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 41000)));

        let config = ApiConfig::new("https://localhost")?;
        let client = client_info(&headers, Some(&peer), &config);
        assert_eq!(client.addr.as_deref(), Some("10.0.0.7"));
        assert_eq!(client.user_agent.as_deref(), Some("curl/8.5"));

        let trusted = config.with_trust_forwarded_headers(true);
        let client = client_info(&headers, Some(&peer), &trusted);
        assert_eq!(client.addr.as_deref(), Some("1.2.3.4"));
        Ok(())
    }

    #[test]
    fn no_peer_and_no_headers_means_no_address() -> Result<()> {
        let config = ApiConfig::new("https://localhost")?;
        assert!(client_info(&HeaderMap::new(), None, &config).addr.is_none());
        Ok(())
    }
}
