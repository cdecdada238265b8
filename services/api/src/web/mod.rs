pub mod capture;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

use state::AppState;

// Re-export the handlers so the binary can build the router from one place.
pub use capture::{
    burst_start_handler, burst_stop_handler, close_camera_handler, list_alerts_handler,
    open_camera_handler, take_picture_handler, video_frames_handler,
};
pub use rest::{
    get_session_handler, history_panel_handler, list_history_handler, load_history_handler,
    new_chat_handler, send_message_handler,
};

/// Base64 photos and frame sets are large; the 5MB per-image check happens in the handlers.
const BODY_LIMIT_BYTES: usize = 40 * 1024 * 1024;

/// All chat and capture routes, bound to the shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    let chat_routes = Router::new()
        .route("/chat", get(get_session_handler))
        .route("/chat/messages", post(send_message_handler))
        .route("/chat/new", post(new_chat_handler))
        .route("/chat/history", get(list_history_handler))
        .route("/chat/history/panel", put(history_panel_handler))
        .route("/chat/history/{id}/load", post(load_history_handler));

    let capture_routes = Router::new()
        .route("/camera/open", post(open_camera_handler))
        .route("/camera/picture", post(take_picture_handler))
        .route("/camera/burst/start", post(burst_start_handler))
        .route("/camera/burst/stop", post(burst_stop_handler))
        .route("/camera/close", post(close_camera_handler))
        .route("/video/frames", post(video_frames_handler))
        .route("/alerts", get(list_alerts_handler));

    Router::new()
        .merge(chat_routes)
        .merge(capture_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(app_state)
}
