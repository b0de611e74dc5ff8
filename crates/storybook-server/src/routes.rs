use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use storybook_core::{EVENT_STREAM_CONTENT_TYPE, RecordEncoder, StoryRequest};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::engine::{RunOpts, ToolEngine};
use crate::pump::spawn_run;

/// Shared state of the HTTP layer.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<dyn ToolEngine>,
    script: String,
    stream_capacity: usize,
    encoder: RecordEncoder,
}

impl AppState {
    pub fn new(engine: Arc<dyn ToolEngine>, config: &ServerConfig) -> Self {
        Self {
            engine,
            script: config.script.clone(),
            stream_capacity: config.stream_capacity,
            encoder: RecordEncoder::default(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/run-script", post(run_script))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

async fn run_script(
    State(state): State<AppState>,
    payload: Result<Json<StoryRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting unreadable story request");
            return bad_request(rejection.body_text());
        }
    };
    if let Err(err) = request.validate() {
        warn!(error = %err, "rejecting story request");
        return bad_request(err.to_string());
    }
    info!(pages = request.pages, path = %request.path, "story requested");

    let records = spawn_run(
        state.engine.clone(),
        state.script.clone(),
        RunOpts::for_story(&request),
        state.encoder.clone(),
        state.stream_capacity,
    );
    (
        [
            (header::CONTENT_TYPE, EVENT_STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(records),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
