pub mod alerts;
pub mod anthropic;
pub mod chat_proxy;
pub mod kv_file;
pub mod kv_pg;
pub mod media;
pub mod weather;

pub use alerts::TracingAlertSink;
pub use anthropic::AnthropicChatAdapter;
pub use chat_proxy::ChatProxyAdapter;
pub use kv_file::FileKeyValueStore;
pub use kv_pg::PgKeyValueStore;
pub use media::{FfmpegCameraAdapter, FfmpegThumbnailAdapter, LocalFileReader};
pub use weather::{FixedLocationAdapter, WttrWeatherAdapter};
