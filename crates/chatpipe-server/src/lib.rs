use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chatpipe_core::{Error, FetchBackend, ToolRequest, ToolResponse};
use chatpipe_local::{dispatch, stream};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn FetchBackend>,
}

pub fn build_router(backend: Arc<dyn FetchBackend>) -> Router {
    Router::new()
        .route("/hello/:name", get(hello))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .with_state(AppState { backend })
}

/// Core error taxonomy mapped onto HTTP: caller mistakes are 422, upstream
/// failures are 502. The detail message embeds the proximate cause, never a
/// stack trace.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            Error::Validation(_) | Error::InvalidUrl(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Fetch(_) | Error::Search(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(serde_json::json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

/// Range/shape constraints the routing layer owns. The dispatcher only
/// re-checks the url-required-when-fetch rule.
fn validate(req: &ToolRequest) -> Result<(), ApiError> {
    if req.message.trim().is_empty() {
        return Err(Error::Validation("field 'message' must be non-empty".to_string()).into());
    }
    if !(1..=10).contains(&req.max_results) {
        return Err(
            Error::Validation("field 'max_results' must be within [1, 10]".to_string()).into(),
        );
    }
    Ok(())
}

async fn hello(Path(name): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": format!("Hello, World {name}") }))
}

async fn run_dispatch(state: &AppState, req: &ToolRequest) -> Result<ToolResponse, ApiError> {
    let (response, trail) = dispatch::dispatch(state.backend.as_ref(), req).await?;
    if let Ok(trail_json) = serde_json::to_string(&trail) {
        tracing::debug!(audit_trail = %trail_json, "request dispatched");
    }
    tracing::info!(
        used_tool = response.used_tool,
        tool = response.tool.map(|t| t.as_str()).unwrap_or("none"),
        "chat reply built"
    );
    Ok(response)
}

async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ToolRequest>,
) -> Result<Json<ToolResponse>, ApiError> {
    validate(&req)?;
    let response = run_dispatch(&state, &req).await?;
    Ok(Json(response))
}

/// Same dispatch as `/chat`, replayed as SSE frames: one `token` event per
/// word chunk, then a single `message` event with the full response. The
/// tools finish before the first frame, so failures surface as plain HTTP
/// errors, never a broken stream. A disconnecting consumer just drops the
/// stream.
async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ToolRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate(&req)?;
    let response = run_dispatch(&state, &req).await?;
    let frames = stream::stream_events(response).map(|ev| {
        Ok(Event::default().data(serde_json::to_string(&ev).unwrap_or_default()))
    });
    Ok(Sse::new(futures::stream::iter(frames)))
}
