//! crates/ully_core/src/chat_session.rs
//!
//! The live chat session. Owns the transcript, turns each user message into a
//! provider request, appends exactly one reply per request and hands the
//! transcript to the history store in the background.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::domain::{ChatHistoryEntry, ChatMessage, WeatherContext};
use crate::history::HistoryStore;
use crate::image_guard::{validate_image_size, ImageTooLarge};
use crate::payload::to_provider_messages;
use crate::ports::{ChatService, PortError, PortResult};
use crate::prompt::{build_system_prompt, MAX_REPLY_TOKENS};
use crate::weather::WeatherLocationProvider;

pub const RATE_LIMIT_FALLBACK_REPLY: &str =
    "You've reached your daily limit for Ully AI messages. Please try again tomorrow!";
pub const CONNECTION_ERROR_REPLY: &str =
    "Sorry, something went wrong. Could not reach Ully AI right now. Please check your connection and try again.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a reply is already being generated")]
    Busy,
}

/// The two failure buckets the user can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited(Option<String>),
    Unreachable,
}

impl FailureKind {
    pub fn classify(error: &PortError) -> Self {
        match error {
            PortError::RateLimited(message) => FailureKind::RateLimited(message.clone()),
            _ => FailureKind::Unreachable,
        }
    }

    pub fn reply_text(&self) -> String {
        match self {
            FailureKind::RateLimited(Some(message)) if !message.trim().is_empty() => {
                message.clone()
            }
            FailureKind::RateLimited(_) => RATE_LIMIT_FALLBACK_REPLY.to_string(),
            FailureKind::Unreachable => CONNECTION_ERROR_REPLY.to_string(),
        }
    }
}

/// Everything the UI renders for the chat screen.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
    pub history: Vec<ChatHistoryEntry>,
    pub show_history: bool,
}

#[derive(Default)]
struct SessionState {
    messages: Vec<ChatMessage>,
    loading: bool,
    history: Vec<ChatHistoryEntry>,
    show_history: bool,
    /// Bumped whenever the live transcript is swapped out.
    generation: u64,
}

#[derive(Clone)]
pub struct ChatSession {
    chat: Arc<dyn ChatService>,
    history: Arc<HistoryStore>,
    weather: Arc<WeatherLocationProvider>,
    weather_context: Arc<RwLock<Option<WeatherContext>>>,
    state: Arc<Mutex<SessionState>>,
    background: TaskTracker,
}

impl ChatSession {
    pub fn new(
        chat: Arc<dyn ChatService>,
        history: Arc<HistoryStore>,
        weather: Arc<WeatherLocationProvider>,
    ) -> Self {
        Self {
            chat,
            history,
            weather,
            weather_context: Arc::new(RwLock::new(None)),
            state: Arc::new(Mutex::new(SessionState::default())),
            background: TaskTracker::new(),
        }
    }

    /// Loads the saved history and starts the weather lookup in the background.
    pub async fn mount(&self) {
        let history = self.history.load_history().await;
        info!("Chat session mounted with {} saved chats.", history.len());
        self.state.lock().await.history = history;

        let weather = self.weather.clone();
        let cell = self.weather_context.clone();
        self.background.spawn(async move {
            if let Some(context) = weather.get_weather_and_location().await {
                *cell.write().await = Some(context);
            }
        });
    }

    /// Sends `message` and appends the assistant's reply.
    ///
    /// The message is in the transcript before the request goes out, and exactly
    /// one reply follows it: the answer, or an assistant-authored error. Fails
    /// only with [`SessionError::Busy`] while another request is outstanding.
    pub async fn add_message(&self, message: ChatMessage) -> Result<ChatMessage, SessionError> {
        let (transcript, generation) = {
            let mut state = self.state.lock().await;
            if state.loading {
                return Err(SessionError::Busy);
            }
            state.messages.push(message);
            state.loading = true;
            (state.messages.clone(), state.generation)
        };

        let system_prompt = build_system_prompt(self.weather_context.read().await.as_ref());
        let reply = match self.request_reply(&transcript, &system_prompt).await {
            Ok(text) => ChatMessage::ully(text),
            Err(e) => {
                let kind = FailureKind::classify(&e);
                warn!("Chat request failed ({:?}): {}", kind, e);
                ChatMessage::ully(kind.reply_text())
            }
        };

        let finished = {
            let mut state = self.state.lock().await;
            state.loading = false;
            if state.generation == generation {
                state.messages.push(reply.clone());
                state.messages.clone()
            } else {
                // The user moved to another chat; the reply belongs to the old one.
                info!("Reply arrived after the transcript changed; saving it with its own chat.");
                let mut finished = transcript;
                finished.push(reply.clone());
                finished
            }
        };
        self.spawn_history_save(finished);

        Ok(reply)
    }

    async fn request_reply(
        &self,
        transcript: &[ChatMessage],
        system_prompt: &str,
    ) -> PortResult<String> {
        let payload = to_provider_messages(transcript)
            .map_err(|e| PortError::InvalidInput(e.to_string()))?;
        self.chat
            .chat_with_history(&payload, system_prompt, MAX_REPLY_TOKENS)
            .await
    }

    fn spawn_history_save(&self, transcript: Vec<ChatMessage>) {
        let history = self.history.clone();
        let state = self.state.clone();
        self.background.spawn(async move {
            let entries = history.save_chat(&transcript).await;
            state.lock().await.history = entries;
        });
    }

    /// Replaces the transcript with a saved conversation and closes the history panel.
    pub async fn load_chat_from_history(&self, entry: &ChatHistoryEntry) {
        let mut state = self.state.lock().await;
        state.messages = entry.messages.clone();
        state.show_history = false;
        state.generation += 1;
    }

    /// Looks a saved conversation up by id and loads it. Returns `false` if unknown.
    pub async fn load_chat_by_id(&self, id: &str) -> bool {
        match self.history.find(id).await {
            Some(entry) => {
                self.load_chat_from_history(&entry).await;
                true
            }
            None => false,
        }
    }

    pub async fn start_new_chat(&self) {
        let mut state = self.state.lock().await;
        state.messages.clear();
        state.show_history = false;
        state.generation += 1;
    }

    pub async fn set_show_history(&self, show: bool) {
        self.state.lock().await.show_history = show;
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            messages: state.messages.clone(),
            loading: state.loading,
            history: state.history.clone(),
            show_history: state.show_history,
        }
    }

    pub async fn weather_context(&self) -> Option<WeatherContext> {
        self.weather_context.read().await.clone()
    }

    /// Waits until every background task started so far (history saves, the
    /// weather lookup) has finished.
    pub async fn flush(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

/// Checks every attachment of `message` against the image size limit.
pub fn validate_message(message: &ChatMessage) -> Result<(), ImageTooLarge> {
    message
        .attachments()
        .into_iter()
        .try_for_each(validate_image_size)
}
