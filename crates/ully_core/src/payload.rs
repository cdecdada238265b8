//! crates/ully_core/src/payload.rs
//!
//! The provider wire format for chat requests, and the conversion from the
//! live transcript into it.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, ProviderRole};
use crate::image_guard::{validate_image_size, ImageTooLarge};

/// Media type attached to every image block; the camera and the thumbnailer produce JPEG.
pub const IMAGE_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: ProviderRole,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

impl ContentBlock {
    pub fn jpeg(data: impl Into<String>) -> Self {
        ContentBlock::Image {
            source: ImageSource {
                kind: "base64".to_string(),
                media_type: IMAGE_MEDIA_TYPE.to_string(),
                data: data.into(),
            },
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Converts one transcript message; image blocks come before the text block.
pub fn to_provider_message(message: &ChatMessage) -> Result<ProviderMessage, ImageTooLarge> {
    let mut content = Vec::new();
    for attachment in message.attachments() {
        validate_image_size(attachment)?;
        content.push(ContentBlock::jpeg(attachment));
    }
    content.push(ContentBlock::text(message.text.clone()));

    Ok(ProviderMessage {
        role: message.role.provider_role(),
        content,
    })
}

pub fn to_provider_messages(
    transcript: &[ChatMessage],
) -> Result<Vec<ProviderMessage>, ImageTooLarge> {
    transcript.iter().map(to_provider_message).collect()
}
