//! services/api/src/web/capture.rs
//!
//! Handlers for the camera, burst and video flows. Each finished capture is
//! turned into a user message and sent through the chat session.

use crate::adapters::alerts::AlertRecord;
use crate::web::protocol::{
    BurstStopResponse, CameraStateResponse, ExtractFramesRequest, OpenCameraRequest,
    ReplyResponse,
};
use crate::web::rest::dispatch;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use ully_core::frames::{
    extract_frames, DEFAULT_FRAME_COUNT, DEFAULT_VIDEO_DURATION_MS, MAX_FRAME_COUNT,
};
use ully_core::prompt::capture_message_text;
use ully_core::{CameraMode, CaptureController, ChatMessage};

async fn camera_state(capture: &CaptureController) -> CameraStateResponse {
    let mode = capture.mode().await;
    CameraStateResponse {
        open: capture.is_open().await,
        recording: capture.is_recording().await,
        mode: mode.map(Into::into),
        instruction: mode.map(|m| m.instruction().to_string()),
    }
}

//=========================================================================================
// Camera
//=========================================================================================

/// Opens the camera for an optional mode, asking for permission the first time.
#[utoipa::path(
    post,
    path = "/camera/open",
    request_body = OpenCameraRequest,
    responses(
        (status = 200, description = "Camera opened", body = CameraStateResponse),
        (status = 403, description = "Camera permission was not granted")
    )
)]
pub async fn open_camera_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<OpenCameraRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mode = request.mode.map(CameraMode::from);
    if !app_state.capture.open_camera(mode).await {
        return Err((
            StatusCode::FORBIDDEN,
            "Camera permission was not granted".to_string(),
        ));
    }
    info!("Camera opened in mode {:?}.", mode);
    Ok(Json(camera_state(&app_state.capture).await))
}

/// Takes one photo, closes the camera and sends the photo with the mode's message.
#[utoipa::path(
    post,
    path = "/camera/picture",
    responses(
        (status = 200, description = "Ully's reply to the photo", body = ReplyResponse),
        (status = 400, description = "The photo is over 5MB"),
        (status = 409, description = "A reply is already being generated"),
        (status = 502, description = "The camera could not take a picture")
    )
)]
pub async fn take_picture_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let capture = &app_state.capture;
    let mode = capture.mode().await;

    let photo = capture.take_picture().await.ok_or_else(|| {
        (
            StatusCode::BAD_GATEWAY,
            "Could not take picture. Please try again.".to_string(),
        )
    })?;
    capture.close_camera().await;

    let Some(image) = photo.base64 else {
        return Err((
            StatusCode::BAD_GATEWAY,
            "Camera returned no image data".to_string(),
        ));
    };
    let message = ChatMessage::user_photo(
        capture_message_text(mode, false),
        image,
        Some(photo.uri),
    );
    dispatch(&app_state.session, message).await
}

/// Starts a timed burst. The frames are sent as a video message once it ends.
#[utoipa::path(
    post,
    path = "/camera/burst/start",
    responses((status = 202, description = "Burst running", body = CameraStateResponse))
)]
pub async fn burst_start_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let capture = app_state.capture.clone();
    let session = app_state.session.clone();
    let mode = capture.mode().await;

    let on_complete_capture = capture.clone();
    capture
        .start_burst(move |frames| {
            // Runs inside stop_burst; the follow-up work needs its own task.
            tokio::spawn(async move {
                on_complete_capture.close_camera().await;
                info!("Sending {} burst frame(s) to the chat.", frames.len());
                let message = ChatMessage::user_frames(capture_message_text(mode, true), frames);
                if let Err(e) = session.add_message(message).await {
                    warn!("Burst frames were not sent: {}", e);
                }
            });
        })
        .await;

    (StatusCode::ACCEPTED, Json(camera_state(&capture).await))
}

/// Stops the burst early. Frames collected so far are still sent.
#[utoipa::path(
    post,
    path = "/camera/burst/stop",
    responses((status = 200, description = "Burst stopped", body = BurstStopResponse))
)]
pub async fn burst_stop_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let frames = app_state.capture.stop_burst(None).await;
    Json(BurstStopResponse { frames })
}

/// Closes the camera. A running burst is dropped without sending anything.
#[utoipa::path(
    post,
    path = "/camera/close",
    responses((status = 200, description = "Camera closed", body = CameraStateResponse))
)]
pub async fn close_camera_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    app_state.capture.close_camera().await;
    Json(camera_state(&app_state.capture).await)
}

//=========================================================================================
// Video
//=========================================================================================

/// Pulls evenly spaced stills out of a recorded video and sends them to the chat.
#[utoipa::path(
    post,
    path = "/video/frames",
    request_body = ExtractFramesRequest,
    responses(
        (status = 200, description = "Ully's reply to the frames", body = ReplyResponse),
        (status = 400, description = "count is outside 1..=20"),
        (status = 409, description = "A reply is already being generated"),
        (status = 422, description = "No frame could be extracted")
    )
)]
pub async fn video_frames_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ExtractFramesRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let count = request.count.unwrap_or(DEFAULT_FRAME_COUNT);
    if !(1..=MAX_FRAME_COUNT).contains(&count) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("count must be between 1 and {}", MAX_FRAME_COUNT),
        ));
    }

    let frames = extract_frames(
        app_state.thumbnailer.as_ref(),
        app_state.files.as_ref(),
        &request.video_uri,
        count,
        request.duration_ms.unwrap_or(DEFAULT_VIDEO_DURATION_MS),
    )
    .await;

    if frames.is_empty() {
        error!("No frames extracted from {}", request.video_uri);
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("No frames could be extracted from {}", request.video_uri),
        ));
    }

    let mode = request.mode.map(CameraMode::from);
    let message = ChatMessage::user_frames(capture_message_text(mode, true), frames);
    dispatch(&app_state.session, message).await
}

//=========================================================================================
// Alerts
//=========================================================================================

/// Recent capture alerts, newest first.
#[utoipa::path(
    get,
    path = "/alerts",
    responses((status = 200, description = "Recent alerts", body = [AlertRecord]))
)]
pub async fn list_alerts_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.alerts.recent())
}
