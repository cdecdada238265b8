//! crates/ully_core/src/domain.rs
//!
//! Defines the pure, core data structures for the chat assistant.
//! The serde shapes here are the persisted JSON format of the chat history.

use serde::{Deserialize, Serialize};

//=========================================================================================
// Chat Transcript
//=========================================================================================

/// Who authored a message in the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Ully,
}

/// The role names understood by the chat provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderRole {
    User,
    Assistant,
}

impl Role {
    /// Maps a transcript role onto the provider's role vocabulary.
    pub fn provider_role(self) -> ProviderRole {
        match self {
            Role::User => ProviderRole::User,
            Role::Ully => ProviderRole::Assistant,
        }
    }
}

/// A single message in the live transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_video: Option<bool>,
}

impl ChatMessage {
    /// A plain text message typed by the user.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image: None,
            image_uri: None,
            frames: None,
            is_video: None,
        }
    }

    /// A reply authored by the assistant.
    pub fn ully(text: impl Into<String>) -> Self {
        Self {
            role: Role::Ully,
            ..Self::user(text)
        }
    }

    /// A user message carrying a single still photo.
    pub fn user_photo(
        text: impl Into<String>,
        image: String,
        image_uri: Option<String>,
    ) -> Self {
        Self {
            image: Some(image),
            image_uri,
            ..Self::user(text)
        }
    }

    /// A user message carrying a sequence of frames from a burst or a video.
    pub fn user_frames(text: impl Into<String>, frames: Vec<String>) -> Self {
        Self {
            frames: Some(frames),
            is_video: Some(true),
            ..Self::user(text)
        }
    }

    /// Every base64 image attached to this message, in send order.
    pub fn attachments(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        if let Some(image) = &self.image {
            out.push(image);
        }
        if let Some(frames) = &self.frames {
            out.extend(frames.iter().map(String::as_str));
        }
        out
    }
}

//=========================================================================================
// Chat History
//=========================================================================================

/// A snapshot of a full transcript, stored once per completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    /// Creation time in milliseconds since the epoch, as a string.
    pub id: String,
    pub preview: String,
    pub date: String,
    pub messages: Vec<ChatMessage>,
}

//=========================================================================================
// Context and Capture
//=========================================================================================

/// Location and current weather, injected into the system prompt when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherContext {
    pub city: String,
    pub region: String,
    pub country: String,
    pub temp_c: String,
    pub temp_f: String,
    pub feels_like_c: String,
    pub feels_like_f: String,
    pub condition: String,
}

/// What the camera is being pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraMode {
    /// A coffee bag, menu or piece of equipment.
    Scan,
    /// An espresso shot while it pulls.
    Extraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == PermissionStatus::Granted
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// How precise a position fix the caller needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    Low,
    Balanced,
    High,
}

/// Options passed to the camera for a still capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// JPEG quality in `0.0..=1.0`.
    pub quality: f32,
    pub base64: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            quality: 0.8,
            base64: true,
        }
    }
}

/// A still photo as returned by the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPhoto {
    pub uri: String,
    pub base64: Option<String>,
}
