use crate::gate::{AccessGate, GateError};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{ALLOW, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION},
        HeaderName, HeaderValue, Request, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    Extension, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod cookies;
pub mod error;
pub mod handlers;
mod openapi;
pub mod state;


pub use openapi::openapi;
pub use state::ApiConfig;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the full application: documented routes, fallbacks and layers.
pub fn app(gate: Arc<AccessGate>, config: ApiConfig) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router
        .fallback(handlers::not_found)
        .layer(middleware::map_response(method_not_allowed_as_json))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::overriding(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    X_XSS_PROTECTION,
                    HeaderValue::from_static("1; mode=block"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    REFERRER_POLICY,
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                .layer(Extension(gate))
                .layer(Extension(config)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, gate: Arc<AccessGate>, config: ApiConfig) -> Result<()> {
    let public_url = config.public_url().to_string();
    let app = app(gate, config);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}, public URL {}", port, public_url);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
            std::future::pending::<()>().await;
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

/// Axum answers unsupported methods with an empty 405; give it the JSON error body.
async fn method_not_allowed_as_json(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(ALLOW).cloned();
    let mut json = GateError::MethodNotSupported.into_response();
    if let Some(allow) = allow {
        json.headers_mut().insert(ALLOW, allow);
    }
    json
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
