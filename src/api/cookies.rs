//! Caller-session and auth-token cookies.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use chrono::{DateTime, Utc};

use super::state::ApiConfig;
use crate::gate::{session::SessionToken, store::CallerSession};

pub const CALLER_COOKIE_NAME: &str = "docgate_sid";
pub const AUTH_COOKIE_NAME: &str = "docgate_auth";

fn with_attributes(mut cookie: String, config: &ApiConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    cookie.push_str("; Path=/; HttpOnly; SameSite=Strict");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Browser-session cookie identifying the caller session.
pub(crate) fn caller_cookie(
    config: &ApiConfig,
    caller: &CallerSession,
) -> Result<HeaderValue, InvalidHeaderValue> {
    with_attributes(format!("{CALLER_COOKIE_NAME}={}", caller.as_str()), config)
}

/// Auth cookie carrying the session token, expiring with the session.
pub(crate) fn auth_cookie(
    config: &ApiConfig,
    token: &SessionToken,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = (expires_at - now).num_seconds().max(0);
    let expires = expires_at.format("%a, %d %b %Y %H:%M:%S GMT");
    with_attributes(
        format!(
            "{AUTH_COOKIE_NAME}={}; Max-Age={max_age}; Expires={expires}",
            token.as_str()
        ),
        config,
    )
}

pub(crate) fn clear_auth_cookie(config: &ApiConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    with_attributes(
        format!("{AUTH_COOKIE_NAME}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT"),
        config,
    )
}

/// First value for `name` across all `Cookie` headers.
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let key = parts.next()?.trim();
            let val = parts.next()?.trim();
            (key == name && !val.is_empty()).then(|| val.to_string())
        })
}

pub(crate) fn caller_session(headers: &HeaderMap) -> Option<CallerSession> {
    cookie_value(headers, CALLER_COOKIE_NAME).and_then(|value| CallerSession::parse(&value))
}
