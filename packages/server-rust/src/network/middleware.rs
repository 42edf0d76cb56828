//! Transport-level Tower layers wrapped around every dispatch route.
//!
//! Layers are listed outermost first: the first one sees the request first
//! and the response last.

use axum::http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

type HttpTrace = TraceLayer<SharedClassifier<ServerErrorsAsFailures>>;

/// Composed layer stack returned by [`build_http_layers`].
type HttpLayers = Stack<
    PropagateRequestIdLayer,
    Stack<
        TimeoutLayer,
        Stack<
            CorsLayer,
            Stack<
                CompressionLayer,
                Stack<HttpTrace, Stack<SetRequestIdLayer<MakeRequestUuid>, Identity>>,
            >,
        >,
    >,
>;

/// Builds the middleware stack for the dispatch API:
///
/// 1. `SetRequestId` assigns a UUID `x-request-id` unless the caller sent one
/// 2. `Trace` opens a span per request, so handler logs carry method and path
/// 3. `Compression` gzips list responses
/// 4. `CORS` from `config.cors_origins`
/// 5. `Timeout` answers 408 once `config.request_timeout` elapses
/// 6. `PropagateRequestId` echoes the id on the response
///
/// The timeout bounds only the HTTP exchange. Assignment runs on the pool
/// under its own deadline, so a slow assignment never holds a request open.
#[must_use]
pub fn build_http_layers(config: &NetworkConfig) -> HttpLayers {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(request_id))
        .into_inner()
}

/// `"*"` anywhere in the list allows every origin; otherwise unparsable
/// entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}
