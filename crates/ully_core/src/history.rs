//! crates/ully_core/src/history.rs
//!
//! The persisted list of past conversations. Every completed exchange stores a
//! fresh snapshot of the whole transcript, newest first.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{ChatHistoryEntry, ChatMessage, Role};
use crate::ports::{Clock, KeyValueStore, PortError, PortResult};

/// Storage key of the JSON-encoded history list.
pub const CHAT_HISTORY_KEY: &str = "ully_chat_history";
pub const MAX_HISTORY_ENTRIES: usize = 50;
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Preview of a transcript: its first user message, cut at 50 characters.
pub fn build_preview(transcript: &[ChatMessage]) -> String {
    let first = transcript
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.text.as_str())
        .unwrap_or("Chat");

    if first.chars().count() > PREVIEW_MAX_CHARS {
        let cut: String = first.chars().take(PREVIEW_MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}

pub struct HistoryStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    entries: Mutex<Vec<ChatHistoryEntry>>,
}

impl HistoryStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Reads the persisted list. A missing or corrupt value yields an empty history.
    pub async fn load_history(&self) -> Vec<ChatHistoryEntry> {
        let loaded = match self.read_persisted().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to load chat history, starting empty: {}", e);
                Vec::new()
            }
        };
        let mut entries = self.entries.lock().await;
        *entries = loaded;
        entries.clone()
    }

    /// Stores a snapshot of `transcript` and returns the updated list.
    ///
    /// Does nothing for an empty transcript. The in-memory list is updated even
    /// when the write fails; the failure is only logged.
    pub async fn save_chat(&self, transcript: &[ChatMessage]) -> Vec<ChatHistoryEntry> {
        let mut entries = self.entries.lock().await;
        if transcript.is_empty() {
            return entries.clone();
        }

        let now = self.clock.now();
        let entry = ChatHistoryEntry {
            id: now.timestamp_millis().to_string(),
            preview: build_preview(transcript),
            date: now.with_timezone(&Local).format("%-m/%-d/%Y").to_string(),
            messages: transcript.to_vec(),
        };
        entries.insert(0, entry);
        entries.truncate(MAX_HISTORY_ENTRIES);

        if let Err(e) = self.write_persisted(&entries).await {
            warn!("Failed to persist chat history: {}", e);
        } else {
            debug!("Chat history saved ({} entries).", entries.len());
        }
        entries.clone()
    }

    pub async fn find(&self, id: &str) -> Option<ChatHistoryEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
    }

    async fn read_persisted(&self) -> PortResult<Vec<ChatHistoryEntry>> {
        match self.storage.get_item(CHAT_HISTORY_KEY).await? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| PortError::Unexpected(format!("corrupt history: {e}"))),
        }
    }

    async fn write_persisted(&self, entries: &[ChatHistoryEntry]) -> PortResult<()> {
        let raw =
            serde_json::to_string(entries).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.storage.set_item(CHAT_HISTORY_KEY, &raw).await
    }
}
