//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::TracingAlertSink;
use std::sync::Arc;
use ully_core::ports::{FileReader, VideoThumbnailer};
use ully_core::{CaptureController, ChatSession};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The service backs a single device, so there is exactly one live chat
/// session and one camera.
#[derive(Clone)]
pub struct AppState {
    pub session: ChatSession,
    pub capture: CaptureController,
    pub alerts: Arc<TracingAlertSink>,
    pub thumbnailer: Arc<dyn VideoThumbnailer>,
    pub files: Arc<dyn FileReader>,
}
