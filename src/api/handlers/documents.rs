use axum::{
    extract::{ConnectInfo, Extension, Path, Query},
    http::{
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, EXPIRES, PRAGMA},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use utoipa::IntoParams;

use super::client_info;
use crate::{
    api::{
        cookies::{caller_session, cookie_value, AUTH_COOKIE_NAME},
        error::ErrorResponse,
        state::ApiConfig,
    },
    gate::{documents::Document, AccessGate},
};

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct DocumentQuery {
    /// Document name, one of `openapi.yaml` or `openapi-v2.yaml`.
    #[serde(default)]
    pub file: String,
}

#[utoipa::path(
    get,
    path = "/api/spec",
    params(DocumentQuery),
    responses(
        (status = 200, description = "Document contents", content_type = "application/x-yaml", body = String),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    tag = "documents"
)]
pub async fn fetch_document(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    query: Option<Query<DocumentQuery>>,
    gate: Extension<Arc<AccessGate>>,
    config: Extension<ApiConfig>,
) -> Response {
    let requested = query.map(|Query(query)| query.file).unwrap_or_default();
    serve_document(&headers, peer.as_ref(), &requested, &gate, &config).await
}

#[utoipa::path(
    get,
    path = "/api/spec/{file}",
    params(
        ("file" = String, Path, description = "Document name, one of `openapi.yaml` or `openapi-v2.yaml`")
    ),
    responses(
        (status = 200, description = "Document contents", content_type = "application/x-yaml", body = String),
        (status = 401, description = "Authentication required", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
    ),
    tag = "documents"
)]
/// Same as `GET /api/spec?file=`, with the name as a path segment.
pub async fn fetch_document_by_path(
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    Path(file): Path<String>,
    gate: Extension<Arc<AccessGate>>,
    config: Extension<ApiConfig>,
) -> Response {
    serve_document(&headers, peer.as_ref(), &file, &gate, &config).await
}

async fn serve_document(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    requested: &str,
    gate: &AccessGate,
    config: &ApiConfig,
) -> Response {
    let caller = caller_session(headers);
    let token = cookie_value(headers, AUTH_COOKIE_NAME);
    let client = client_info(headers, peer, config);

    match gate
        .authorize_and_fetch(
            caller.as_ref(),
            token.as_deref(),
            requested,
            &client,
            Utc::now(),
        )
        .await
    {
        Ok(document) => {
            let headers = document_headers(&document);
            (StatusCode::OK, headers, document.bytes).into_response()
        }
        Err(err) => err.into_response(),
    }
}

fn document_headers(document: &Document) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(document.content_type));
    if let Ok(disposition) =
        HeaderValue::from_str(&format!("inline; filename=\"{}\"", document.name))
    {
        headers.insert(CONTENT_DISPOSITION, disposition);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}
