//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the app client and the service.
//! These mirror the core types and carry the OpenAPI schema annotations.

use serde::{Deserialize, Serialize};
use ully_core::{CameraMode, ChatHistoryEntry, ChatMessage, Role, SessionSnapshot};
use utoipa::ToSchema;

//=========================================================================================
// Shared Shapes
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleDto {
    User,
    Ully,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CameraModeDto {
    Scan,
    Extraction,
}

impl From<CameraModeDto> for CameraMode {
    fn from(mode: CameraModeDto) -> Self {
        match mode {
            CameraModeDto::Scan => CameraMode::Scan,
            CameraModeDto::Extraction => CameraMode::Extraction,
        }
    }
}

impl From<CameraMode> for CameraModeDto {
    fn from(mode: CameraMode) -> Self {
        match mode {
            CameraMode::Scan => CameraModeDto::Scan,
            CameraMode::Extraction => CameraModeDto::Extraction,
        }
    }
}

/// One chat message as the client sees it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub role: RoleDto,
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

impl From<ChatMessage> for MessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: match message.role {
                Role::User => RoleDto::User,
                Role::Ully => RoleDto::Ully,
            },
            text: message.text,
            image: message.image,
            image_uri: message.image_uri,
            frames: message.frames,
            is_video: message.is_video,
        }
    }
}

#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct HistoryEntryDto {
    pub id: String,
    pub preview: String,
    pub date: String,
    pub messages: Vec<MessageDto>,
}

impl From<ChatHistoryEntry> for HistoryEntryDto {
    fn from(entry: ChatHistoryEntry) -> Self {
        Self {
            id: entry.id,
            preview: entry.preview,
            date: entry.date,
            messages: entry.messages.into_iter().map(MessageDto::from).collect(),
        }
    }
}

/// The whole chat screen state.
#[derive(Serialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub messages: Vec<MessageDto>,
    pub loading: bool,
    pub history: Vec<HistoryEntryDto>,
    pub show_history: bool,
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            messages: snapshot.messages.into_iter().map(MessageDto::from).collect(),
            loading: snapshot.loading,
            history: snapshot.history.into_iter().map(HistoryEntryDto::from).collect(),
            show_history: snapshot.show_history,
        }
    }
}

//=========================================================================================
// Requests
//=========================================================================================

/// A message typed or attached by the user.
#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub frames: Option<Vec<String>>,
}

impl SendMessageRequest {
    /// Builds the outgoing user message. Frames win over a single image.
    pub fn into_message(self) -> ChatMessage {
        match (self.frames, self.image) {
            (Some(frames), _) if !frames.is_empty() => ChatMessage::user_frames(self.text, frames),
            (_, Some(image)) => ChatMessage::user_photo(self.text, image, self.image_uri),
            _ => ChatMessage::user(self.text),
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct HistoryPanelRequest {
    pub open: bool,
}

#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct OpenCameraRequest {
    #[serde(default)]
    pub mode: Option<CameraModeDto>,
}

#[derive(Deserialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractFramesRequest {
    pub video_uri: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub mode: Option<CameraModeDto>,
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct ReplyResponse {
    pub reply: MessageDto,
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CameraStateResponse {
    pub open: bool,
    pub recording: bool,
    pub mode: Option<CameraModeDto>,
    pub instruction: Option<String>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BurstStopResponse {
    pub frames: usize,
}
