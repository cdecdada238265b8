pub mod capture;
pub mod chat_session;
pub mod domain;
pub mod frames;
pub mod history;
pub mod image_guard;
pub mod payload;
pub mod ports;
pub mod prompt;
pub mod weather;

#[cfg(test)]
pub(crate) mod test_support;

pub use capture::{BurstCallback, CaptureController};
pub use chat_session::{ChatSession, FailureKind, SessionError, SessionSnapshot};
pub use domain::{
    CameraMode, ChatHistoryEntry, ChatMessage, Coordinates, PermissionStatus, Role,
    WeatherContext,
};
pub use history::HistoryStore;
pub use ports::{
    AlertSink, CameraDevice, ChatService, Clock, FileReader, KeyValueStore, LocationService,
    PortError, PortResult, SystemClock, VideoThumbnailer, WeatherService,
};
pub use weather::WeatherLocationProvider;
