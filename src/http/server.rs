//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the scan, page and health handlers
//! - Wire up middleware (request ID, tracing, CORS, timeout, body limit)
//! - Serve on a bound listener until shutdown is signalled
//!
//! # Design Decisions
//! - The scan pipeline enforces `timeouts.request_secs` itself; the outer
//!   `TimeoutLayer` gets a grace period on top and only catches stragglers
//! - Rejections produced by middleware (408, 413) are rewritten into the same
//!   JSON error body the pipeline uses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ScanConfig;
use crate::http::cors::cors_layer;
use crate::http::request::{request_id_of, MakeScanRequestId, X_REQUEST_ID};
use crate::scan::{multipart, ScanError, Scanner};

/// Extra time the outer request timeout allows beyond the pipeline's own budget.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub scanner: Arc<Scanner>,
    pub index_page: Option<Bytes>,
}

/// HTTP server for the scan gateway.
pub struct HttpServer {
    router: Router,
    config: ScanConfig,
    scanner: Arc<Scanner>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ScanConfig) -> Self {
        let scanner = Arc::new(Scanner::new(&config));
        Self::with_scanner(config, scanner)
    }

    /// Create a server around an already built scanner.
    pub fn with_scanner(config: ScanConfig, scanner: Arc<Scanner>) -> Self {
        let state = AppState {
            scanner: scanner.clone(),
            index_page: load_index_page(&config.ui.index_path),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            scanner,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ScanConfig, state: AppState) -> Router {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);

        Router::new()
            .route("/", get(index_handler).options(preflight_handler))
            .route(
                "/scan",
                axum::routing::post(scan_handler).options(preflight_handler),
            )
            .route("/health", get(health_handler).options(preflight_handler))
            .fallback(fallback_handler)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(TimeoutLayer::new(request_timeout + TIMEOUT_GRACE))
            .layer(middleware::map_response(
                move |response: Response| structured_rejection(response, request_timeout),
            ))
            .layer(cors_layer(&config.cors))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id_of(request),
                    )
                }),
            )
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeScanRequestId))
    }

    /// Run the server until a shutdown signal arrives.
    ///
    /// In-flight requests are allowed to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_concurrent_scans = self.scanner.limiter().capacity(),
            engine = %self.scanner.engine_label(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// A clone of the router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The shared scanner.
    pub fn scanner(&self) -> Arc<Scanner> {
        self.scanner.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

fn load_index_page(path: &str) -> Option<Bytes> {
    match std::fs::read(path) {
        Ok(page) => Some(Bytes::from(page)),
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Index page unavailable, `/` will return 404");
            None
        }
    }
}

async fn index_handler(State(state): State<AppState>) -> Response {
    match state.index_page {
        Some(page) => ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], page).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Scan the `file` part of a multipart upload.
async fn scan_handler(State(state): State<AppState>, headers: HeaderMap, body: Body) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let boundary = match multipart::boundary_from_content_type(content_type) {
        Ok(boundary) => boundary,
        Err(e) => {
            tracing::warn!(content_type = %content_type, error = %e, "Rejected scan request");
            return e.into_response();
        }
    };

    match state
        .scanner
        .scan_multipart(body.into_data_stream(), boundary)
        .await
    {
        Ok(result) => {
            let body = state.scanner.render(&result);
            ([(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn health_handler(State(state): State<AppState>) -> Response {
    let limiter = state.scanner.limiter();
    Json(serde_json::json!({
        "status": "ok",
        "engine": state.scanner.engine_label(),
        "max_concurrent_scans": limiter.capacity(),
        "available_slots": limiter.available(),
        "in_flight": limiter.outstanding(),
    }))
    .into_response()
}

async fn preflight_handler() -> StatusCode {
    StatusCode::OK
}

/// OPTIONS is answered on every path; anything else unrouted is 404.
async fn fallback_handler(method: Method) -> StatusCode {
    if method == Method::OPTIONS {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Give bare 408/413 responses from the middleware stack a JSON error body.
async fn structured_rejection(response: Response, request_timeout: Duration) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let error = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ScanError::PayloadTooLarge,
        StatusCode::REQUEST_TIMEOUT => ScanError::RequestTimeout(request_timeout),
        _ => return response,
    };
    tracing::warn!(status = %response.status(), kind = error.kind().as_str(), "Request rejected by middleware");

    let mut rewritten = error.into_response();
    for (name, value) in response.headers() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rewritten.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rewritten
}
