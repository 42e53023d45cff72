use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use common::types::{CounterResponse, Health};
use models::counter::CounterId;
use service::CounterService;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::errors::ApiError;
use crate::observability::{self, INCREMENTS_TOTAL, REQUESTS_TOTAL, REQUEST_DURATION};

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub counter: Arc<CounterService>,
    pub counter_id: CounterId,
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// `GET|POST /incrementCounter`
pub async fn increment_counter(State(state): State<AppState>) -> Result<Json<CounterResponse>, ApiError> {
    REQUESTS_TOTAL.inc();
    info!(counter_id = %state.counter_id, "increment request received");

    let timer = REQUEST_DURATION.start_timer();
    let result = state.counter.increment(&state.counter_id).await;
    timer.observe_duration();

    let snapshot = result?;
    INCREMENTS_TOTAL.inc();
    Ok(Json(CounterResponse { id: snapshot.id, count: snapshot.count }))
}

/// Build the application router.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(observability::metrics))
        .route("/incrementCounter", get(increment_counter).post(increment_counter))
        // path used by the function host
        .route("/api/incrementCounter", get(increment_counter).post(increment_counter))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
