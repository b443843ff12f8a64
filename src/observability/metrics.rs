//! Metrics collection and Prometheus export module.
//!
//! This module provides:
//! - Authentication for the metrics endpoint
//! - Prometheus metrics server setup
//! - Recording functions for the extraction pipeline

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;

use crate::observability_config::ObservabilityConfig;

/// Check authentication token from Authorization header
///
/// No token is required when `METRICS_AUTH_TOKEN` is unset or empty.
pub fn check_auth<B>(req: &hyper::Request<B>, expected_token: Option<&str>) -> bool {
    let Some(expected) = expected_token.filter(|t| !t.is_empty()) else {
        return true;
    };

    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected)
}

/// Initialize metrics collection with Prometheus exporter
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(handle)
}

fn metrics_bind_addr(config: &ObservabilityConfig) -> SocketAddr {
    if config.metrics_bind_all {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), config.metrics_port)
    } else {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), config.metrics_port)
    }
}

fn text_response(status: hyper::StatusCode, body: &str) -> hyper::Response<String> {
    let mut response = hyper::Response::new(body.to_string());
    *response.status_mut() = status;
    response
}

/// Route one metrics-server request
fn handle_metrics_request<B>(
    req: &hyper::Request<B>,
    metrics_handle: &PrometheusHandle,
    auth_token: Option<&str>,
) -> hyper::Response<String> {
    if !check_auth(req, auth_token) {
        let mut response = text_response(hyper::StatusCode::UNAUTHORIZED, "Unauthorized");
        response.headers_mut().insert(
            hyper::header::WWW_AUTHENTICATE,
            hyper::header::HeaderValue::from_static("Bearer"),
        );
        return response;
    }

    match (req.method(), req.uri().path()) {
        (&hyper::Method::GET, "/metrics") => {
            let mut response = hyper::Response::new(metrics_handle.render());
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
            );
            response
        }
        (&hyper::Method::GET, "/health/live") => text_response(hyper::StatusCode::OK, "OK"),
        _ => text_response(hyper::StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Start the metrics server (`/metrics`, `/health/live`) on a background task
pub async fn start_metrics_server(
    metrics_handle: PrometheusHandle,
    config: &ObservabilityConfig,
) -> Result<SocketAddr> {
    let addr = metrics_bind_addr(config);
    let auth_token = std::env::var("METRICS_AUTH_TOKEN").ok();

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        "Metrics server listening on {} (bind_all: {})",
        local_addr,
        config.metrics_bind_all
    );

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let metrics_handle = metrics_handle.clone();
                    let auth_token = auth_token.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let response = handle_metrics_request(
                                    &req,
                                    &metrics_handle,
                                    auth_token.as_deref(),
                                );
                                async move { Ok::<_, std::convert::Infallible>(response) }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::warn!(
                                peer = %peer_addr,
                                error = %err,
                                "Error serving metrics connection"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error accepting metrics connection");
                }
            }
        }
    });

    Ok(local_addr)
}

/// Record OCR operation metrics for one document
pub fn record_ocr_metrics(success: bool, duration: Duration, document_size: u64, pages: usize) {
    metrics::counter!("ocr_operations_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("ocr_duration_seconds").record(duration.as_secs_f64());
    metrics::histogram!("ocr_document_size_bytes").record(document_size as f64);
    if success {
        metrics::histogram!("ocr_pages_per_document").record(pages as f64);
    }
}

/// Record database operation metrics
pub fn record_db_metrics(operation: &str, duration: Duration) {
    let operation = operation.to_string();
    metrics::counter!("db_operations_total", "operation" => operation.clone()).increment(1);
    metrics::histogram!("db_operation_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

/// Record the outcome of one upload (`accepted`, `stored`, `rejected`, `failed`)
pub fn record_upload_metrics(outcome: &str, mode: &str) {
    let outcome = outcome.to_string();
    let mode = mode.to_string();
    metrics::counter!("uploads_total", "outcome" => outcome, "mode" => mode).increment(1);
}

/// Count a labeled field that extraction could not find
pub fn record_field_not_found(field: &str) {
    let field = field.to_string();
    metrics::counter!("extraction_field_not_found_total", "field" => field).increment(1);
}

/// Record end-to-end pipeline duration for one document
pub fn record_pipeline_metrics(success: bool, duration: Duration) {
    metrics::counter!("pipeline_runs_total", "result" => if success { "success" } else { "failure" }).increment(1);
    metrics::histogram!("pipeline_duration_seconds").record(duration.as_secs_f64());
}

/// Record error rate metrics
pub fn record_error_metrics(error_type: &str, component: &str) {
    let error_type = error_type.to_string();
    let component = component.to_string();
    metrics::counter!("errors_total", "type" => error_type, "component" => component).increment(1);
}

/// Record queue/depth metrics for async operations
pub fn record_queue_metrics(queue_name: &str, depth: usize, capacity: usize) {
    let queue_name = queue_name.to_string();
    metrics::gauge!("queue_depth", "queue" => queue_name.clone()).set(depth as f64);
    metrics::gauge!("queue_capacity", "queue" => queue_name).set(capacity as f64);
}

/// Record application startup metrics
pub fn record_startup_metrics(duration: Duration) {
    metrics::histogram!("application_startup_duration_seconds").record(duration.as_secs_f64());
    metrics::counter!("application_starts_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str, auth: Option<&str>) -> hyper::Request<()> {
        let mut builder = hyper::Request::builder().method("GET").uri(path);
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_check_auth() {
        assert!(check_auth(&request("/metrics", None), None));
        assert!(check_auth(&request("/metrics", None), Some("")));
        assert!(!check_auth(&request("/metrics", None), Some("secret")));
        assert!(!check_auth(&request("/metrics", Some("Bearer nope")), Some("secret")));
        assert!(check_auth(&request("/metrics", Some("Bearer secret")), Some("secret")));
    }

    #[test]
    fn test_metrics_routes() {
        let handle = PrometheusBuilder::new().build_recorder().handle();

        let live = handle_metrics_request(&request("/health/live", None), &handle, None);
        assert_eq!(live.status(), hyper::StatusCode::OK);
        assert_eq!(live.body(), "OK");

        let metrics = handle_metrics_request(&request("/metrics", None), &handle, None);
        assert_eq!(metrics.status(), hyper::StatusCode::OK);

        let missing = handle_metrics_request(&request("/nope", None), &handle, None);
        assert_eq!(missing.status(), hyper::StatusCode::NOT_FOUND);

        let denied = handle_metrics_request(&request("/metrics", None), &handle, Some("t"));
        assert_eq!(denied.status(), hyper::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_bind_addr() {
        let mut config = ObservabilityConfig::default();
        assert!(metrics_bind_addr(&config).ip().is_loopback());
        config.metrics_bind_all = true;
        assert!(metrics_bind_addr(&config).ip().is_unspecified());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_upload_metrics("stored", "sync");
        record_field_not_found("email");
        record_queue_metrics("extraction_jobs", 1, 32);
        record_ocr_metrics(true, Duration::from_millis(5), 10, 1);
    }
}
