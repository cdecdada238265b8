//! In-memory fakes for the ports, shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{
    Accuracy, CaptureOptions, CapturedPhoto, Coordinates, PermissionStatus,
};
use crate::payload::ProviderMessage;
use crate::ports::{
    AlertSink, CameraDevice, ChatService, Clock, FileReader, KeyValueStore, LocationService,
    PortError, PortResult, VideoThumbnailer, WeatherService,
};

//=========================================================================================
// Clock
//=========================================================================================

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

//=========================================================================================
// Storage
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub items: Mutex<HashMap<String, String>>,
    pub fail_writes: Mutex<bool>,
    pub writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_item(key: &str, value: &str) -> Arc<Self> {
        let store = Self::default();
        store
            .items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Arc::new(store)
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> PortResult<()> {
        *self.writes.lock().unwrap() += 1;
        if *self.fail_writes.lock().unwrap() {
            return Err(PortError::Unexpected("disk full".into()));
        }
        self.items
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> PortResult<()> {
        self.items.lock().unwrap().remove(key);
        Ok(())
    }
}

//=========================================================================================
// Chat
//=========================================================================================

pub struct ScriptedChat {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub calls: Mutex<Vec<(Vec<ProviderMessage>, String, u32)>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<PortResult<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatService for ScriptedChat {
    async fn chat_with_history(
        &self,
        messages: &[ProviderMessage],
        system_prompt: &str,
        max_tokens: u32,
    ) -> PortResult<String> {
        self.calls.lock().unwrap().push((
            messages.to_vec(),
            system_prompt.to_string(),
            max_tokens,
        ));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Unexpected("no scripted reply".into())))
    }
}

//=========================================================================================
// Location and Weather
//=========================================================================================

pub struct FakeLocation {
    pub status: Mutex<PermissionStatus>,
    pub permission_requests: Mutex<usize>,
    pub position: Coordinates,
}

impl FakeLocation {
    pub fn new(status: PermissionStatus) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            permission_requests: Mutex::new(0),
            position: Coordinates {
                latitude: 45.52,
                longitude: -122.68,
            },
        })
    }

    pub fn set_status(&self, status: PermissionStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl LocationService for FakeLocation {
    async fn request_foreground_permission(&self) -> PortResult<PermissionStatus> {
        *self.permission_requests.lock().unwrap() += 1;
        Ok(*self.status.lock().unwrap())
    }

    async fn current_position(&self, _accuracy: Accuracy) -> PortResult<Coordinates> {
        Ok(self.position)
    }
}

pub const WTTR_SAMPLE: &str = r#"{
  "current_condition": [{
    "FeelsLikeC": "12", "FeelsLikeF": "54", "temp_C": "14", "temp_F": "57",
    "weatherDesc": [{"value": "Light rain"}]
  }],
  "nearest_area": [{
    "areaName": [{"value": "Portland"}],
    "region": [{"value": "Oregon"}],
    "country": [{"value": "United States of America"}]
  }]
}"#;

pub struct FakeWeather {
    pub body: Mutex<PortResult<String>>,
    pub requests: Mutex<usize>,
}

impl FakeWeather {
    pub fn returning(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Ok(body.to_string())),
            requests: Mutex::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Err(PortError::Unexpected("offline".into()))),
            requests: Mutex::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

#[async_trait]
impl WeatherService for FakeWeather {
    async fn fetch_by_coordinates(&self, _coordinates: Coordinates) -> PortResult<String> {
        *self.requests.lock().unwrap() += 1;
        match &*self.body.lock().unwrap() {
            Ok(body) => Ok(body.clone()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}

//=========================================================================================
// Media
//=========================================================================================

/// Thumbnails are named after their timestamp; listed timestamps fail.
pub struct FakeThumbnailer {
    pub failing_at: Vec<u64>,
    pub requested: Mutex<Vec<u64>>,
    pub discarded: Mutex<Vec<String>>,
}

impl FakeThumbnailer {
    pub fn new(failing_at: Vec<u64>) -> Self {
        Self {
            failing_at,
            requested: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VideoThumbnailer for FakeThumbnailer {
    async fn thumbnail_at(&self, video_uri: &str, time_ms: u64) -> PortResult<String> {
        self.requested.lock().unwrap().push(time_ms);
        if self.failing_at.contains(&time_ms) {
            return Err(PortError::Unexpected(format!("no frame at {time_ms}")));
        }
        Ok(format!("{video_uri}#t={time_ms}"))
    }

    async fn discard(&self, thumbnail_uri: &str) -> PortResult<()> {
        self.discarded.lock().unwrap().push(thumbnail_uri.to_string());
        Ok(())
    }
}

/// Returns the uri itself as the "base64" body.
pub struct EchoReader;

#[async_trait]
impl FileReader for EchoReader {
    async fn read_as_base64(&self, uri: &str) -> PortResult<String> {
        Ok(format!("b64:{uri}"))
    }
}

pub struct FakeCamera {
    pub status: Mutex<PermissionStatus>,
    pub grant_on_request: bool,
    pub permission_requests: Mutex<usize>,
    pub shots: Mutex<usize>,
    /// Shot indexes (0-based) that fail.
    pub failing_shots: Vec<usize>,
    pub options_seen: Mutex<Vec<CaptureOptions>>,
}

impl FakeCamera {
    pub fn new(status: PermissionStatus, grant_on_request: bool) -> Arc<Self> {
        Self::with_failures(status, grant_on_request, Vec::new())
    }

    pub fn with_failures(
        status: PermissionStatus,
        grant_on_request: bool,
        failing_shots: Vec<usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(status),
            grant_on_request,
            permission_requests: Mutex::new(0),
            shots: Mutex::new(0),
            failing_shots,
            options_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn shot_count(&self) -> usize {
        *self.shots.lock().unwrap()
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn permission_status(&self) -> PortResult<PermissionStatus> {
        Ok(*self.status.lock().unwrap())
    }

    async fn request_permission(&self) -> PortResult<PermissionStatus> {
        *self.permission_requests.lock().unwrap() += 1;
        let granted = if self.grant_on_request {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        *self.status.lock().unwrap() = granted;
        Ok(granted)
    }

    async fn take_picture(&self, options: CaptureOptions) -> PortResult<CapturedPhoto> {
        self.options_seen.lock().unwrap().push(options);
        let index = {
            let mut shots = self.shots.lock().unwrap();
            let index = *shots;
            *shots += 1;
            index
        };
        if self.failing_shots.contains(&index) {
            return Err(PortError::Unexpected("shutter jammed".into()));
        }
        Ok(CapturedPhoto {
            uri: format!("file:///shot-{index}.jpg"),
            base64: Some(format!("SHOT{index}")),
        })
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub alerts: Mutex<Vec<(String, String)>>,
}

impl AlertSink for RecordingAlerts {
    fn alert(&self, title: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}
