//! services/api/src/adapters/media.rs
//!
//! Camera, video thumbnail and file adapters. Stills are grabbed with `ffmpeg`
//! and handed to the core as file paths or base64 strings. Stills are removed
//! once they have been encoded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};
use ully_core::domain::{CaptureOptions, CapturedPhoto, PermissionStatus};
use ully_core::ports::{
    CameraDevice, FileReader, PortError, PortResult, VideoThumbnailer,
};

/// Maps a `0.0..=1.0` quality onto ffmpeg's JPEG `-q:v` scale (2 best, 31 worst).
fn jpeg_qscale(quality: f32) -> u32 {
    let quality = quality.clamp(0.0, 1.0);
    (2.0 + (1.0 - quality) * 29.0).round() as u32
}

fn strip_file_scheme(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

async fn run_ffmpeg(args: &[String]) -> PortResult<()> {
    let output = Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        return Err(PortError::Unexpected(format!("ffmpeg failed: {}", tail)));
    }
    Ok(())
}

async fn ensure_dir(dir: &Path) -> PortResult<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to create {}: {}", dir.display(), e)))
}

async fn remove_still(path: &str) -> PortResult<()> {
    match fs::remove_file(strip_file_scheme(path)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PortError::Unexpected(format!("Failed to remove {}: {}", path, e))),
    }
}

/// Encodes a still and deletes it, even when the read fails.
async fn encode_and_remove(path: &str) -> PortResult<String> {
    let encoded = LocalFileReader.read_as_base64(path).await;
    if let Err(e) = remove_still(path).await {
        warn!("{}", e);
    }
    encoded
}

//=========================================================================================
// Files
//=========================================================================================

#[derive(Clone, Debug, Default)]
pub struct LocalFileReader;

#[async_trait]
impl FileReader for LocalFileReader {
    async fn read_as_base64(&self, uri: &str) -> PortResult<String> {
        let bytes = fs::read(strip_file_scheme(uri)).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PortError::NotFound(uri.to_string()),
            _ => PortError::Unexpected(e.to_string()),
        })?;
        Ok(STANDARD.encode(bytes))
    }
}

//=========================================================================================
// Camera
//=========================================================================================

/// Grabs single stills from a capture device (e.g. `/dev/video0` via `v4l2`).
pub struct FfmpegCameraAdapter {
    device: Option<String>,
    input_format: String,
    capture_dir: PathBuf,
    counter: AtomicU64,
}

impl FfmpegCameraAdapter {
    pub fn new(device: Option<String>, input_format: String, capture_dir: PathBuf) -> Self {
        Self {
            device,
            input_format,
            capture_dir,
            counter: AtomicU64::new(0),
        }
    }

    async fn device_status(&self) -> PermissionStatus {
        match &self.device {
            None => PermissionStatus::Denied,
            Some(device) if device.starts_with('/') => match fs::metadata(device).await {
                Ok(_) => PermissionStatus::Granted,
                Err(_) => PermissionStatus::Denied,
            },
            Some(_) => PermissionStatus::Granted,
        }
    }
}

#[async_trait]
impl CameraDevice for FfmpegCameraAdapter {
    async fn permission_status(&self) -> PortResult<PermissionStatus> {
        Ok(self.device_status().await)
    }

    async fn request_permission(&self) -> PortResult<PermissionStatus> {
        Ok(self.device_status().await)
    }

    async fn take_picture(&self, options: CaptureOptions) -> PortResult<CapturedPhoto> {
        let device = self
            .device
            .as_deref()
            .ok_or_else(|| PortError::PermissionDenied("no camera configured".to_string()))?;
        ensure_dir(&self.capture_dir).await?;

        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let stamp = chrono::Utc::now().timestamp_millis();
        let output = self.capture_dir.join(format!("photo-{}-{}.jpg", stamp, n));

        let args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.input_format.clone(),
            "-i".to_string(),
            device.to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            jpeg_qscale(options.quality).to_string(),
            output.display().to_string(),
        ];
        run_ffmpeg(&args).await?;
        debug!("Captured still {}", output.display());

        let uri = output.display().to_string();
        // With base64 requested the caller never opens the file, so it is not kept.
        let base64 = if options.base64 {
            Some(encode_and_remove(&uri).await?)
        } else {
            None
        };
        Ok(CapturedPhoto { uri, base64 })
    }
}

//=========================================================================================
// Video Thumbnails
//=========================================================================================

/// Writes a JPEG still of a local video at a given timestamp.
pub struct FfmpegThumbnailAdapter {
    frames_dir: PathBuf,
    counter: AtomicU64,
}

impl FfmpegThumbnailAdapter {
    pub fn new(frames_dir: PathBuf) -> Self {
        Self {
            frames_dir,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl VideoThumbnailer for FfmpegThumbnailAdapter {
    async fn thumbnail_at(&self, video_uri: &str, time_ms: u64) -> PortResult<String> {
        ensure_dir(&self.frames_dir).await?;
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let output = self.frames_dir.join(format!("frame-{}-{}ms.jpg", n, time_ms));

        let args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", time_ms as f64 / 1000.0),
            "-i".to_string(),
            strip_file_scheme(video_uri).to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            jpeg_qscale(0.8).to_string(),
            output.display().to_string(),
        ];
        run_ffmpeg(&args).await?;

        // ffmpeg exits cleanly without writing anything when seeking past the end.
        if fs::metadata(&output).await.is_err() {
            return Err(PortError::NotFound(format!(
                "no frame at {}ms in {}",
                time_ms, video_uri
            )));
        }
        Ok(output.display().to_string())
    }

    async fn discard(&self, thumbnail_uri: &str) -> PortResult<()> {
        remove_still(thumbnail_uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn quality_maps_to_qscale() {
        assert_eq!(jpeg_qscale(1.0), 2);
        assert_eq!(jpeg_qscale(0.8), 8);
        assert_eq!(jpeg_qscale(0.0), 31);
        assert_eq!(jpeg_qscale(7.0), 2);
    }

    #[tokio::test]
    async fn reads_files_as_base64() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("still.jpg");
        std::fs::write(&path, b"ABC").unwrap();

        let uri = format!("file://{}", path.display());
        assert_eq!(LocalFileReader.read_as_base64(&uri).await.unwrap(), "QUJD");
        assert!(matches!(
            LocalFileReader.read_as_base64("/definitely/missing.jpg").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn encoded_stills_leave_no_files_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo-1-0.jpg");
        std::fs::write(&path, b"ABC").unwrap();

        let encoded = encode_and_remove(&path.display().to_string()).await.unwrap();
        assert_eq!(encoded, "QUJD");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn discarded_thumbnails_are_deleted() {
        let dir = tempdir().unwrap();
        let thumbnailer = FfmpegThumbnailAdapter::new(dir.path().to_path_buf());
        let still = dir.path().join("frame-0-0ms.jpg");
        std::fs::write(&still, b"JPEG").unwrap();

        let uri = format!("file://{}", still.display());
        thumbnailer.discard(&uri).await.unwrap();
        thumbnailer.discard(&uri).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn camera_without_device_is_denied() {
        let dir = tempdir().unwrap();
        let camera = FfmpegCameraAdapter::new(None, "v4l2".into(), dir.path().to_path_buf());
        assert_eq!(
            camera.request_permission().await.unwrap(),
            PermissionStatus::Denied
        );
        assert!(camera.take_picture(CaptureOptions::default()).await.is_err());

        let missing = FfmpegCameraAdapter::new(
            Some("/dev/no-such-camera".into()),
            "v4l2".into(),
            dir.path().to_path_buf(),
        );
        assert_eq!(
            missing.permission_status().await.unwrap(),
            PermissionStatus::Denied
        );
    }
}
