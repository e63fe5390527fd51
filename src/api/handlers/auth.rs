//! Login and logout endpoints.

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Extension},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, sync::Arc};
use tracing::error;
use utoipa::ToSchema;

use super::client_info;
use crate::{
    api::{
        cookies::{auth_cookie, caller_cookie, caller_session, clear_auth_cookie},
        error::{ErrorResponse, INVALID_REQUEST_FORMAT},
        state::ApiConfig,
    },
    gate::{store::CallerSession, AccessGate, GateError},
};

#[derive(ToSchema, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub access_key: String,
}

impl fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRequest")
            .field("agent_id", &self.agent_id)
            .field("access_key", &"[redacted]")
            .finish()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub role: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub agent: AgentSummary,
    /// RFC 3339 timestamp after which the session is no longer accepted.
    pub expires_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/auth",
    request_body = AuthRequest,
    responses(
        (status = 200, description = "Authenticated, session cookie set", body = AuthResponse),
        (status = 400, description = "Malformed body or missing fields", body = ErrorResponse),
        (status = 401, description = "Invalid Agent ID or Access Key", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse),
    ),
    tag = "auth"
)]
pub async fn authenticate(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    gate: Extension<Arc<AccessGate>>,
    config: Extension<ApiConfig>,
    body: Bytes,
) -> Response {
    let Ok(request) = serde_json::from_slice::<AuthRequest>(&body) else {
        return GateError::InvalidInput(INVALID_REQUEST_FORMAT).into_response();
    };

    // Callers without a caller-session cookie get one here, on success or failure,
    // so their failed attempts keep counting against the same key.
    let mut response_headers = HeaderMap::new();
    let caller = match caller_session(&headers) {
        Some(caller) => caller,
        None => match CallerSession::generate() {
            Ok(caller) => {
                match caller_cookie(&config, &caller) {
                    Ok(cookie) => {
                        response_headers.append(SET_COOKIE, cookie);
                    }
                    Err(err) => error!("Failed to build caller cookie: {err}"),
                }
                caller
            }
            Err(err) => return GateError::Internal(err).into_response(),
        },
    };

    let client = client_info(&headers, peer.as_ref(), &config);
    let now = Utc::now();

    let authenticated = match gate
        .authenticate(
            &caller,
            &request.agent_id,
            &request.access_key,
            &client,
            now,
        )
        .await
    {
        Ok(authenticated) => authenticated,
        Err(err) => return (response_headers, err).into_response(),
    };

    match auth_cookie(
        &config,
        &authenticated.token,
        authenticated.expires_at,
        now,
    )
    .context("Failed to build auth cookie")
    {
        Ok(cookie) => {
            response_headers.append(SET_COOKIE, cookie);
        }
        Err(err) => return (response_headers, GateError::Internal(err)).into_response(),
    }

    let response = AuthResponse {
        success: true,
        message: "Authentication successful".to_string(),
        agent: AgentSummary {
            id: authenticated.agent_id,
            name: authenticated.display_name,
            role: authenticated.role,
        },
        expires_at: authenticated.expires_at.to_rfc3339(),
    };

    (StatusCode::OK, response_headers, Json(response)).into_response()
}

#[utoipa::path(
    delete,
    path = "/api/auth",
    responses(
        (status = 200, description = "Session ended, auth cookie cleared", body = LogoutResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    gate: Extension<Arc<AccessGate>>,
    config: Extension<ApiConfig>,
) -> Response {
    if let Some(caller) = caller_session(&headers) {
        gate.deauthenticate(&caller).await;
    }

    // Always clear the cookie, even if there was no session.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_auth_cookie(&config) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let response = LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    };

    (StatusCode::OK, response_headers, Json(response)).into_response()
}

#[utoipa::path(
    delete,
    path = "/api/logout",
    responses(
        (status = 200, description = "Session ended, auth cookie cleared", body = LogoutResponse)
    ),
    tag = "auth"
)]
/// Same as `DELETE /api/auth`.
pub async fn logout_by_path(
    headers: HeaderMap,
    gate: Extension<Arc<AccessGate>>,
    config: Extension<ApiConfig>,
) -> Response {
    logout(headers, gate, config).await
}
