//! HTTP control surface
//!
//! Thin axum handlers over the [`Dispatcher`]: each one extracts its inputs,
//! makes a single dispatcher call and maps the result to JSON. Everything
//! under `/game` passes the [`Authenticator`] first.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tower_http::trace::TraceLayer;
use tracing::warn;

use gamehost_core::room::RoomError;
use gamehost_core::{DispatchError, Dispatcher, GameState, InitAck, RoomSummary};

use crate::auth::{bearer_token, AuthError, Authenticator};
use crate::metrics::{Metrics, OUTCOME_CLIENT_ERROR, OUTCOME_OK, OUTCOME_SERVER_ERROR};

/// Shared state handed to every handler
pub struct AppState {
    dispatcher: Dispatcher,
    metrics: Metrics,
    auth: Box<dyn Authenticator>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, metrics: Metrics, auth: Box<dyn Authenticator>) -> Self {
        Self {
            dispatcher,
            metrics,
            auth,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Count the call under `op` and pass the result through
    fn record<T>(&self, op: &str, result: Result<T, DispatchError>) -> Result<T, ApiError> {
        let outcome = match &result {
            Ok(_) => OUTCOME_OK,
            Err(e) if e.is_client_error() => OUTCOME_CLIENT_ERROR,
            Err(_) => OUTCOME_SERVER_ERROR,
        };
        self.metrics.request(op, outcome);
        result.map_err(ApiError::from)
    }

    /// Count a request turned away before dispatch, such as a malformed body
    fn rejected(&self, op: &str, err: impl Into<ApiError>) -> ApiError {
        self.metrics.request(op, OUTCOME_CLIENT_ERROR);
        err.into()
    }
}

pub type SharedState = Arc<AppState>;

pub fn build_router(state: SharedState) -> Router {
    let game_routes = Router::new()
        .route("/game/{game_type}/init", post(init))
        .route("/game/{game_type}/update", post(update))
        .route("/game/{game_type}/state", get(game_state))
        .route("/game/{game_type}/leave", post(leave))
        .route("/game/{game_type}/rooms", get(list_rooms))
        .route("/game/{game_type}/rooms/{room_id}", delete(close_room))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/metrics", get(render_metrics))
        .merge(game_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn require_auth(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    match state.auth.authenticate(token) {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    games: Vec<String>,
    rooms: usize,
}

async fn healthcheck(State(state): State<SharedState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        games: state.dispatcher.engines().game_types(),
        rooms: state.dispatcher.rooms().room_count(),
    })
}

async fn render_metrics(State(state): State<SharedState>) -> Result<String, ApiError> {
    state.metrics.render().map_err(|e| ApiError::internal(e.to_string()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InitRequest {
    room_id: Option<String>,
}

/// Body is optional; without a `room_id` a fresh UUID is used
async fn init(
    State(state): State<SharedState>,
    Path(game_type): Path<String>,
    body: Bytes,
) -> Result<Json<InitAck>, ApiError> {
    let request: InitRequest = if body.iter().all(u8::is_ascii_whitespace) {
        InitRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| state.rejected("init", ApiError::bad_request(e.to_string())))?
    };
    let room_id = request
        .room_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let ack = state.record("init", state.dispatcher.init(&game_type, &room_id))?;
    if ack.created {
        state.metrics.room_created(&game_type);
    }
    Ok(Json(ack))
}

#[derive(Debug, Deserialize)]
struct UpdateRequest {
    room_id: String,
    player_index: i64,
    payload: Box<RawValue>,
}

#[derive(Debug, Serialize)]
struct Ack {
    ok: bool,
}

const ACK: Ack = Ack { ok: true };

async fn update(
    State(state): State<SharedState>,
    Path(game_type): Path<String>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(request) = body.map_err(|e| state.rejected("update", e))?;
    let result = state.dispatcher.update(
        &game_type,
        &request.room_id,
        request.player_index,
        request.payload.get().as_bytes(),
    );
    state.record("update", result)?;
    Ok(Json(ACK))
}

#[derive(Debug, Deserialize)]
struct RoomQuery {
    room_id: String,
}

#[derive(Debug, Serialize)]
struct StateResponse {
    room_id: String,
    state: GameState,
}

async fn game_state(
    State(state): State<SharedState>,
    Path(game_type): Path<String>,
    query: Result<Query<RoomQuery>, QueryRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Query(RoomQuery { room_id }) = query.map_err(|e| state.rejected("state", e))?;
    let game_state = state.record("state", state.dispatcher.state(&game_type, &room_id))?;
    Ok(Json(StateResponse {
        room_id,
        state: game_state,
    }))
}

#[derive(Debug, Deserialize)]
struct LeaveRequest {
    room_id: String,
    player_index: i64,
}

async fn leave(
    State(state): State<SharedState>,
    Path(game_type): Path<String>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Result<Json<Ack>, ApiError> {
    let Json(request) = body.map_err(|e| state.rejected("leave", e))?;
    let result = state
        .dispatcher
        .leave(&game_type, &request.room_id, request.player_index);
    state.record("leave", result)?;
    Ok(Json(ACK))
}

#[derive(Debug, Serialize)]
struct RoomList {
    rooms: Vec<RoomSummary>,
}

async fn list_rooms(
    State(state): State<SharedState>,
    Path(game_type): Path<String>,
) -> Result<Json<RoomList>, ApiError> {
    let rooms = state.record("rooms", state.dispatcher.list_rooms(&game_type))?;
    Ok(Json(RoomList { rooms }))
}

async fn close_room(
    State(state): State<SharedState>,
    Path((game_type, room_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.record("close", state.dispatcher.close(&game_type, &room_id))?;
    state.metrics.room_closed(&game_type);
    Ok(StatusCode::NO_CONTENT)
}

/// Failure response: `{"error": kind, "message": text}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BadRequest", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let message = err.to_string();
        match err {
            DispatchError::Room(room) => match room {
                RoomError::UnknownGameType(_) => Self::new(StatusCode::NOT_FOUND, "UnknownGameType", message),
                RoomError::RoomNotFound { .. } => Self::new(StatusCode::NOT_FOUND, "RoomNotFound", message),
                RoomError::InvalidRoomId(_) => Self::new(StatusCode::BAD_REQUEST, "InvalidRoomId", message),
                RoomError::Poisoned { .. } => {
                    Self::new(StatusCode::INTERNAL_SERVER_ERROR, "RoomPoisoned", message)
                }
                RoomError::Instantiate { .. } => Self::internal(message),
            },
            DispatchError::InvalidPlayer { .. } => Self::new(StatusCode::BAD_REQUEST, "InvalidPlayer", message),
            DispatchError::GameLogic { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "GameLogicError", message)
            }
            DispatchError::GameState { .. } => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "GameStateError", message)
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, kind = self.kind, message = %self.message, "request failed");
        } else {
            warn!(status = %self.status, kind = self.kind, message = %self.message, "request rejected");
        }
        (
            self.status,
            Json(serde_json::json!({"error": self.kind, "message": self.message})),
        )
            .into_response()
    }
}
