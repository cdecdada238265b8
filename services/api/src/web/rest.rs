//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the chat endpoints and the master
//! definition for the OpenAPI specification.

use crate::adapters::alerts::AlertRecord;
use crate::web::protocol::{
    BurstStopResponse, CameraModeDto, CameraStateResponse, ExtractFramesRequest,
    HistoryEntryDto, HistoryPanelRequest, MessageDto, OpenCameraRequest, ReplyResponse, RoleDto,
    SendMessageRequest, SessionView,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use ully_core::chat_session::validate_message;
use ully_core::{ChatMessage, ChatSession, SessionError};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_session_handler,
        send_message_handler,
        new_chat_handler,
        list_history_handler,
        history_panel_handler,
        load_history_handler,
        crate::web::capture::open_camera_handler,
        crate::web::capture::take_picture_handler,
        crate::web::capture::burst_start_handler,
        crate::web::capture::burst_stop_handler,
        crate::web::capture::close_camera_handler,
        crate::web::capture::video_frames_handler,
        crate::web::capture::list_alerts_handler,
    ),
    components(
        schemas(
            RoleDto, CameraModeDto, MessageDto, HistoryEntryDto, SessionView,
            SendMessageRequest, HistoryPanelRequest, OpenCameraRequest, ExtractFramesRequest,
            ReplyResponse, CameraStateResponse, BurstStopResponse, AlertRecord
        )
    ),
    tags(
        (name = "Ully Companion API", description = "Chat, history and capture endpoints for the coffee companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Sending
//=========================================================================================

/// Sends `message` through the session and waits for the reply.
///
/// The exchange runs on its own task so a dropped request cannot leave the
/// session stuck in the loading state.
pub(crate) async fn dispatch(
    session: &ChatSession,
    message: ChatMessage,
) -> Result<Json<ReplyResponse>, (StatusCode, String)> {
    if let Err(e) = validate_message(&message) {
        return Err((StatusCode::BAD_REQUEST, e.to_string()));
    }

    let session = session.clone();
    let exchange = tokio::spawn(async move { session.add_message(message).await });
    match exchange.await {
        Ok(Ok(reply)) => Ok(Json(ReplyResponse {
            reply: reply.into(),
        })),
        Ok(Err(SessionError::Busy)) => {
            warn!("Rejected a message while a reply is pending.");
            Err((StatusCode::CONFLICT, SessionError::Busy.to_string()))
        }
        Err(e) => {
            error!("Chat exchange task failed: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send message".to_string(),
            ))
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Returns the current chat screen state.
#[utoipa::path(
    get,
    path = "/chat",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(SessionView::from(app_state.session.snapshot().await))
}

/// Sends a user message and returns Ully's reply.
///
/// Provider failures still answer 200; the reply then carries the error text.
#[utoipa::path(
    post,
    path = "/chat/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 200, description = "The reply appended to the transcript", body = ReplyResponse),
        (status = 400, description = "An attached image is over 5MB"),
        (status = 409, description = "A reply is already being generated")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    dispatch(&app_state.session, request.into_message()).await
}

/// Clears the transcript.
#[utoipa::path(
    post,
    path = "/chat/new",
    responses((status = 200, description = "Session after reset", body = SessionView))
)]
pub async fn new_chat_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    app_state.session.start_new_chat().await;
    info!("Started a new chat.");
    Json(SessionView::from(app_state.session.snapshot().await))
}

/// Lists saved conversations, newest first.
#[utoipa::path(
    get,
    path = "/chat/history",
    responses((status = 200, description = "Saved chats", body = [HistoryEntryDto]))
)]
pub async fn list_history_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let history: Vec<HistoryEntryDto> = app_state
        .session
        .snapshot()
        .await
        .history
        .into_iter()
        .map(HistoryEntryDto::from)
        .collect();
    Json(history)
}

#[utoipa::path(
    put,
    path = "/chat/history/panel",
    request_body = HistoryPanelRequest,
    responses((status = 200, description = "Session after toggling the panel", body = SessionView))
)]
pub async fn history_panel_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<HistoryPanelRequest>,
) -> impl IntoResponse {
    app_state.session.set_show_history(request.open).await;
    Json(SessionView::from(app_state.session.snapshot().await))
}

/// Replaces the transcript with a saved conversation.
#[utoipa::path(
    post,
    path = "/chat/history/{id}/load",
    params(("id" = String, Path, description = "The saved chat id.")),
    responses(
        (status = 200, description = "Session with the loaded chat", body = SessionView),
        (status = 404, description = "No saved chat with this id")
    )
)]
pub async fn load_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !app_state.session.load_chat_by_id(&id).await {
        return Err((StatusCode::NOT_FOUND, format!("No saved chat with id {}", id)));
    }
    Ok(Json(SessionView::from(app_state.session.snapshot().await)))
}
