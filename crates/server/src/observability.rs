use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("visit_counter_requests_total", "Total increment requests received")
        .expect("register requests_total")
});

pub static INCREMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("visit_counter_increments_total", "Total successful increments")
        .expect("register increments_total")
});

pub static FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "visit_counter_failures_total",
        "Failed increments by error kind",
        &["kind"]
    )
    .expect("register failures_total")
});

pub static REQUEST_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "visit_counter_request_duration_seconds",
        "Increment duration in seconds, including conflict retries",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("register request_duration")
});

/// Touch every metric so they show up before the first request.
pub fn init_metrics() {
    Lazy::force(&REQUESTS_TOTAL);
    Lazy::force(&INCREMENTS_TOTAL);
    Lazy::force(&FAILURES_TOTAL);
    Lazy::force(&REQUEST_DURATION);
}

pub fn render_metrics() -> Result<String, prometheus::Error> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub async fn metrics() -> Response {
    match render_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
