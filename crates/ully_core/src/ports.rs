//! crates/ully_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the assistant's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of device APIs, storage backends and remote services.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Accuracy, CaptureOptions, CapturedPhoto, Coordinates, PermissionStatus,
};
use crate::payload::ProviderMessage;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The remote quota is exhausted. Carries the provider's own message when it sent one.
    #[error("Rate limited: {}", .0.as_deref().unwrap_or("daily limit reached"))]
    RateLimited(Option<String>),
    #[error("The request timed out")]
    Timeout,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends the full provider-formatted transcript and returns the reply text.
    async fn chat_with_history(
        &self,
        messages: &[ProviderMessage],
        system_prompt: &str,
        max_tokens: u32,
    ) -> PortResult<String>;
}

/// String key-value storage, the shape of the device's local store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove_item(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn permission_status(&self) -> PortResult<PermissionStatus>;

    /// Prompts for camera access and returns the resulting status.
    async fn request_permission(&self) -> PortResult<PermissionStatus>;

    async fn take_picture(&self, options: CaptureOptions) -> PortResult<CapturedPhoto>;
}

#[async_trait]
pub trait VideoThumbnailer: Send + Sync {
    /// Grabs a still at `time_ms` and returns a handle (uri) to the image.
    async fn thumbnail_at(&self, video_uri: &str, time_ms: u64) -> PortResult<String>;

    /// Releases a still once its contents have been read.
    async fn discard(&self, _thumbnail_uri: &str) -> PortResult<()> {
        Ok(())
    }
}

#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read_as_base64(&self, uri: &str) -> PortResult<String>;
}

#[async_trait]
pub trait LocationService: Send + Sync {
    async fn request_foreground_permission(&self) -> PortResult<PermissionStatus>;

    async fn current_position(&self, accuracy: Accuracy) -> PortResult<Coordinates>;
}

#[async_trait]
pub trait WeatherService: Send + Sync {
    /// Returns the raw JSON body of the weather-by-coordinates endpoint.
    async fn fetch_by_coordinates(&self, coordinates: Coordinates) -> PortResult<String>;
}

/// Surfaces a message to the user outside of the chat transcript.
pub trait AlertSink: Send + Sync {
    fn alert(&self, title: &str, message: &str);
}

/// Source of the current time, injectable so caches can be tested without timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
