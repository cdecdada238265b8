//! crates/ully_core/src/capture.rs
//!
//! Wraps the camera into the three capture flows the chat uses: a single
//! photo, a timed burst of photos, and (through `frames`) stills from a video.
//! Owns the permission state, the open/recording flags and the burst buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::{CameraMode, CaptureOptions, CapturedPhoto, PermissionStatus};
use crate::ports::{AlertSink, CameraDevice};

/// A burst stops by itself once this many frames are in.
pub const BURST_FRAME_LIMIT: usize = 5;
pub const BURST_INTERVAL: Duration = Duration::from_secs(2);

/// Receives the frames of a finished burst.
pub type BurstCallback = Box<dyn FnOnce(Vec<String>) + Send + 'static>;

struct ActiveBurst {
    token: CancellationToken,
    on_complete: Option<BurstCallback>,
}

#[derive(Default)]
struct CaptureState {
    permission: Option<PermissionStatus>,
    open: bool,
    mode: Option<CameraMode>,
    recording: bool,
    frames: Vec<String>,
    burst: Option<ActiveBurst>,
}

impl CaptureState {
    /// Ends the current burst and hands back its frames with the callback to run.
    fn finish_burst(
        &mut self,
        on_complete: Option<BurstCallback>,
    ) -> (Vec<String>, Option<BurstCallback>) {
        let registered = self.burst.take().and_then(|burst| {
            burst.token.cancel();
            burst.on_complete
        });
        self.recording = false;
        (std::mem::take(&mut self.frames), on_complete.or(registered))
    }
}

fn deliver(frames: Vec<String>, callback: Option<BurstCallback>) -> usize {
    let count = frames.len();
    info!("Burst capture stopped with {} frame(s).", count);
    if count > 0 {
        if let Some(callback) = callback {
            callback(frames);
        }
    }
    count
}

#[derive(Clone)]
pub struct CaptureController {
    camera: Arc<dyn CameraDevice>,
    alerts: Arc<dyn AlertSink>,
    state: Arc<Mutex<CaptureState>>,
}

impl CaptureController {
    pub fn new(camera: Arc<dyn CameraDevice>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            camera,
            alerts,
            state: Arc::new(Mutex::new(CaptureState::default())),
        }
    }

    /// Opens the camera view for `mode`, asking for permission the first time.
    ///
    /// Returns `false` and leaves the camera closed if access is refused.
    pub async fn open_camera(&self, mode: Option<CameraMode>) -> bool {
        let known = self.state.lock().await.permission;
        if known != Some(PermissionStatus::Granted) {
            let status = self.resolve_permission().await;
            self.state.lock().await.permission = Some(status);
            if !status.is_granted() {
                info!("Camera permission not granted; camera stays closed.");
                return false;
            }
        }

        let mut state = self.state.lock().await;
        state.open = true;
        state.mode = mode;
        true
    }

    async fn resolve_permission(&self) -> PermissionStatus {
        match self.camera.permission_status().await {
            Ok(status) if status.is_granted() => return status,
            Ok(_) => {}
            Err(e) => warn!("Could not read camera permission: {}", e),
        }
        match self.camera.request_permission().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Camera permission request failed: {}", e);
                PermissionStatus::Denied
            }
        }
    }

    /// Takes one still. On failure the user is alerted and `None` is returned.
    pub async fn take_picture(&self) -> Option<CapturedPhoto> {
        match self.camera.take_picture(CaptureOptions::default()).await {
            Ok(photo) if photo.base64.is_some() => Some(photo),
            Ok(photo) => {
                error!("Camera returned {} without image data.", photo.uri);
                self.alert_capture_failed();
                None
            }
            Err(e) => {
                error!("Failed to take picture: {}", e);
                self.alert_capture_failed();
                None
            }
        }
    }

    fn alert_capture_failed(&self) {
        self.alerts
            .alert("Camera Error", "Could not take picture. Please try again.");
    }

    /// Starts a timed burst: one frame now, then one every two seconds.
    ///
    /// Does nothing if a burst is already running. When five frames are in the
    /// burst stops and `on_complete` receives them.
    pub async fn start_burst<F>(&self, on_complete: F)
    where
        F: FnOnce(Vec<String>) + Send + 'static,
    {
        let token = {
            let mut state = self.state.lock().await;
            if state.recording {
                debug!("Burst already running; ignoring start.");
                return;
            }
            let token = CancellationToken::new();
            state.recording = true;
            state.frames.clear();
            state.burst = Some(ActiveBurst {
                token: token.clone(),
                on_complete: Some(Box::new(on_complete)),
            });
            token
        };

        info!("Burst capture started.");
        let controller = self.clone();
        tokio::spawn(async move { controller.run_burst(token).await });
    }

    async fn run_burst(&self, token: CancellationToken) {
        let mut ticker = tokio::time::interval(BURST_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let shot = self.camera.take_picture(CaptureOptions::default()).await;
            let finished = {
                let mut state = self.state.lock().await;
                // A frame that lands after stop belongs to no burst.
                if token.is_cancelled() {
                    return;
                }
                match shot {
                    Ok(CapturedPhoto {
                        base64: Some(frame),
                        ..
                    }) => state.frames.push(frame),
                    Ok(photo) => warn!("Burst frame {} had no image data; skipped.", photo.uri),
                    Err(e) => warn!("Burst frame failed; skipped: {}", e),
                }
                if state.frames.len() >= BURST_FRAME_LIMIT {
                    Some(state.finish_burst(None))
                } else {
                    None
                }
            };

            if let Some((frames, callback)) = finished {
                deliver(frames, callback);
                return;
            }
        }
    }

    /// Stops the running burst and hands its frames to `on_complete`, or to the
    /// callback given at start when `on_complete` is `None`.
    ///
    /// The callback only runs if at least one frame was captured. Returns the
    /// number of frames collected.
    pub async fn stop_burst(&self, on_complete: Option<BurstCallback>) -> usize {
        let (frames, callback) = self.state.lock().await.finish_burst(on_complete);
        deliver(frames, callback)
    }

    /// Stops any burst without delivering its frames and closes the camera view.
    pub async fn close_camera(&self) {
        let mut state = self.state.lock().await;
        if let Some(burst) = state.burst.take() {
            burst.token.cancel();
        }
        state.frames.clear();
        state.recording = false;
        state.open = false;
        state.mode = None;
    }

    pub async fn is_open(&self) -> bool {
        self.state.lock().await.open
    }

    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.recording
    }

    pub async fn mode(&self) -> Option<CameraMode> {
        self.state.lock().await.mode
    }

    pub async fn frames_captured(&self) -> usize {
        self.state.lock().await.frames.len()
    }

    /// The hint to show over the open camera, if a mode is set.
    pub async fn instruction(&self) -> Option<&'static str> {
        self.mode().await.map(CameraMode::instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCamera, RecordingAlerts};
    use crate::ports::PortResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::{oneshot, Notify};
    use tokio::time::Instant;

    fn controller(camera: Arc<FakeCamera>) -> (CaptureController, Arc<RecordingAlerts>) {
        let alerts = Arc::new(RecordingAlerts::default());
        (CaptureController::new(camera, alerts.clone()), alerts)
    }

    fn granted_camera() -> Arc<FakeCamera> {
        FakeCamera::new(PermissionStatus::Granted, true)
    }

    #[tokio::test]
    async fn open_requests_permission_once_and_respects_denial() {
        let camera = FakeCamera::new(PermissionStatus::Undetermined, false);
        let (denied, _) = controller(camera.clone());
        assert!(!denied.open_camera(Some(CameraMode::Scan)).await);
        assert!(!denied.is_open().await);
        assert_eq!(*camera.permission_requests.lock().unwrap(), 1);

        let camera = FakeCamera::new(PermissionStatus::Undetermined, true);
        let (granted, _) = controller(camera.clone());
        assert!(granted.open_camera(Some(CameraMode::Extraction)).await);
        assert!(granted.open_camera(Some(CameraMode::Scan)).await);
        assert_eq!(*camera.permission_requests.lock().unwrap(), 1);
        assert_eq!(granted.mode().await, Some(CameraMode::Scan));
        assert_eq!(
            granted.instruction().await,
            Some(CameraMode::Scan.instruction())
        );
    }

    #[tokio::test]
    async fn picture_uses_quality_and_base64() {
        let camera = granted_camera();
        let (capture, alerts) = controller(camera.clone());
        let photo = capture.take_picture().await.unwrap();

        assert_eq!(photo.base64.as_deref(), Some("SHOT0"));
        let options = camera.options_seen.lock().unwrap()[0];
        assert_eq!(options.quality, 0.8);
        assert!(options.base64);
        assert!(alerts.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_picture_alerts_and_returns_none() {
        let camera = FakeCamera::with_failures(PermissionStatus::Granted, true, vec![0]);
        let (capture, alerts) = controller(camera);
        assert!(capture.take_picture().await.is_none());
        assert_eq!(alerts.alerts.lock().unwrap()[0].0, "Camera Error");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_stops_itself_after_five_frames() {
        let camera = granted_camera();
        let (capture, _) = controller(camera.clone());
        let (tx, rx) = oneshot::channel();

        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;
        let frames = rx.await.unwrap();

        assert_eq!(frames, vec!["SHOT0", "SHOT1", "SHOT2", "SHOT3", "SHOT4"]);
        assert!(!capture.is_recording().await);
        assert_eq!(capture.frames_captured().await, 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(camera.shot_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_skips_failed_frames() {
        let camera = FakeCamera::with_failures(PermissionStatus::Granted, true, vec![1, 3]);
        let (capture, _) = controller(camera.clone());
        let (tx, rx) = oneshot::channel();

        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;

        assert_eq!(
            rx.await.unwrap(),
            vec!["SHOT0", "SHOT2", "SHOT4", "SHOT5", "SHOT6"]
        );
        assert_eq!(camera.shot_count(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_delivers_partial_burst() {
        let camera = granted_camera();
        let (capture, _) = controller(camera.clone());
        let (tx, rx) = oneshot::channel();

        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(capture.stop_burst(None).await, 2);
        assert_eq!(rx.await.unwrap(), vec!["SHOT0", "SHOT1"]);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(camera.shot_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_frames_skips_callback() {
        let (capture, _) = controller(granted_camera());
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        capture
            .start_burst(move |_| flag.store(true, Ordering::SeqCst))
            .await;
        assert_eq!(capture.stop_burst(None).await, 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!called.load(Ordering::SeqCst));
        assert!(!capture.is_recording().await);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_recording_is_ignored() {
        let (capture, _) = controller(granted_camera());
        let (tx, rx) = oneshot::channel();
        let second_called = Arc::new(AtomicBool::new(false));
        let flag = second_called.clone();

        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;
        capture
            .start_burst(move |_| flag.store(true, Ordering::SeqCst))
            .await;

        assert_eq!(rx.await.unwrap().len(), BURST_FRAME_LIMIT);
        assert!(!second_called.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prefers_explicit_callback() {
        let (capture, _) = controller(granted_camera());
        let registered = Arc::new(AtomicBool::new(false));
        let flag = registered.clone();
        let (tx, rx) = oneshot::channel();

        capture
            .start_burst(move |_| flag.store(true, Ordering::SeqCst))
            .await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        capture
            .stop_burst(Some(Box::new(move |frames| {
                let _ = tx.send(frames);
            })))
            .await;

        assert_eq!(rx.await.unwrap(), vec!["SHOT0"]);
        assert!(!registered.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn close_is_safe_and_cancels_burst_silently() {
        let camera = granted_camera();
        let (capture, _) = controller(camera.clone());
        capture.close_camera().await;
        assert!(!capture.is_open().await);

        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        assert!(capture.open_camera(None).await);
        capture
            .start_burst(move |_| flag.store(true, Ordering::SeqCst))
            .await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        capture.close_camera().await;

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!called.load(Ordering::SeqCst));
        assert!(!capture.is_open().await);
        assert!(!capture.is_recording().await);
        assert_eq!(camera.shot_count(), 2);
    }

    /// Shots are numbered; one of them can be made slow or held until released.
    struct ScriptedCamera {
        shots: AtomicUsize,
        slow_shot: Option<(usize, Duration)>,
        held_shot: Option<usize>,
        release: Notify,
        started_at: std::sync::Mutex<Vec<Instant>>,
    }

    impl ScriptedCamera {
        fn new(slow_shot: Option<(usize, Duration)>, held_shot: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                shots: AtomicUsize::new(0),
                slow_shot,
                held_shot,
                release: Notify::new(),
                started_at: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CameraDevice for ScriptedCamera {
        async fn permission_status(&self) -> PortResult<PermissionStatus> {
            Ok(PermissionStatus::Granted)
        }

        async fn request_permission(&self) -> PortResult<PermissionStatus> {
            Ok(PermissionStatus::Granted)
        }

        async fn take_picture(&self, _options: CaptureOptions) -> PortResult<CapturedPhoto> {
            let index = self.shots.fetch_add(1, Ordering::SeqCst);
            self.started_at.lock().unwrap().push(Instant::now());
            if let Some((slow, delay)) = self.slow_shot {
                if slow == index {
                    tokio::time::sleep(delay).await;
                }
            }
            if self.held_shot == Some(index) {
                self.release.notified().await;
            }
            Ok(CapturedPhoto {
                uri: format!("file:///shot-{index}.jpg"),
                base64: Some(format!("SHOT{index}")),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_shot_does_not_trigger_catch_up_frames() {
        let camera = ScriptedCamera::new(Some((0, Duration::from_secs(5))), None);
        let (capture, _) = controller_for(camera.clone());
        let (tx, rx) = oneshot::channel();
        let start = Instant::now();

        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;
        assert_eq!(rx.await.unwrap().len(), BURST_FRAME_LIMIT);

        let offsets: Vec<u64> = camera
            .started_at
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 5, 7, 9, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_shot_of_stopped_burst_leaves_next_burst_alone() {
        let camera = ScriptedCamera::new(None, Some(4));
        let (capture, _) = controller_for(camera.clone());
        let first_called = Arc::new(AtomicBool::new(false));
        let flag = first_called.clone();

        capture
            .start_burst(move |_| flag.store(true, Ordering::SeqCst))
            .await;
        // Shot 4 (the one that would fill the burst) is now in flight.
        tokio::time::sleep(Duration::from_millis(8500)).await;
        assert_eq!(capture.stop_burst(Some(Box::new(|_| {}))).await, 4);

        let (tx, rx) = oneshot::channel();
        capture
            .start_burst(move |frames| {
                let _ = tx.send(frames);
            })
            .await;
        camera.release.notify_one();

        assert_eq!(
            rx.await.unwrap(),
            vec!["SHOT5", "SHOT6", "SHOT7", "SHOT8", "SHOT9"]
        );
        assert!(!first_called.load(Ordering::SeqCst));
        assert!(!capture.is_recording().await);
    }

    fn controller_for(camera: Arc<ScriptedCamera>) -> (CaptureController, Arc<RecordingAlerts>) {
        let alerts = Arc::new(RecordingAlerts::default());
        (CaptureController::new(camera, alerts.clone()), alerts)
    }
}
