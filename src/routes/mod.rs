mod auth;
mod ingest;
mod latest;
mod monitor;
mod patients;

use crate::middlewares::trace_id::{TraceId, TraceIdLayer};
use crate::state::AppState;
use axum::body::Body;
use axum::http::{HeaderName, Request, header};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};
use std::path::Path;
use std::time::Duration;
use tracing::Span;

pub fn build(public_dir: &Path) -> Router<AppState> {
    let static_files_service = tower_http::services::ServeDir::new(public_dir)
        .append_index_html_on_directories(true)
        .fallback(tower_http::services::ServeFile::new(
            public_dir.join("index.html"),
        ));
    Router::new()
        .route("/api/health", get(|| async { axum::http::StatusCode::OK }))
        .route(
            "/api/version",
            get(|| async { format!("vitalink_{}", env!("CARGO_PKG_VERSION")) }),
        )
        .route("/api/home", get(monitor::home))
        // ======== devices ========
        .route("/api/ingest", post(ingest::ingest))
        .route("/api/latest/{public_code}", get(latest::by_public_code))
        .route("/api/latest/d/{device_id}", get(latest::by_device_id))
        .route("/api/latest/p/{patient_id}", get(latest::by_patient_id))
        .route("/api/monitor/{public_code}", get(monitor::monitor))
        // ======== doctors ========
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        .route("/api/patients", post(patients::create).get(patients::list))
        .route("/api/patients/{id}", get(patients::detail))
        .route("/api/patients/{id}/archive", post(patients::archive))
        .route("/api/patients/{id}/restore", post(patients::restore))
        .route("/api/devices/{device_id}/claim", post(patients::claim_device))
        .fallback_service(static_files_service)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    match request.extensions().get::<TraceId>() {
                        Some(trace_id) => tracing::debug_span!("request", trace_id = %trace_id),
                        None => tracing::debug_span!("request"),
                    }
                })
                .on_request(|req: &Request<Body>, _span: &Span| {
                    tracing::trace!(
                        method = %req.method(),
                        uri = %req.uri(),
                        "started processing request"
                    );
                })
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::trace!(
                        status = res.status().as_u16(),
                        latency = %format!("{}ms", latency.as_millis()),
                        "finished processing request"
                    );
                }),
        )
        .layer(TraceIdLayer)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .expose_headers(tower_http::cors::Any)
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-api-key"),
                    HeaderName::from_static("x-public-code"),
                ]),
        )
}
