//! Still-frame extraction from a recorded video.

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::ports::{FileReader, PortResult, VideoThumbnailer};

pub const DEFAULT_FRAME_COUNT: usize = 5;
pub const DEFAULT_VIDEO_DURATION_MS: u64 = 10_000;
/// Upper bound on frames pulled from one video.
pub const MAX_FRAME_COUNT: usize = DEFAULT_FRAME_COUNT * 4;
/// Thumbnails generated at the same time.
pub const FRAME_GRAB_CONCURRENCY: usize = 3;

/// `count` timestamps spread evenly over `[0, duration_ms]`, both ends included.
pub fn frame_timestamps(count: usize, duration_ms: u64) -> Vec<u64> {
    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => {
            let last = (count - 1) as f64;
            (0..count)
                .map(|i| (i as f64 / last * duration_ms as f64).round() as u64)
                .collect()
        }
    }
}

async fn grab_frame(
    thumbnailer: &dyn VideoThumbnailer,
    files: &dyn FileReader,
    video_uri: &str,
    time_ms: u64,
) -> PortResult<String> {
    let thumbnail_uri = thumbnailer.thumbnail_at(video_uri, time_ms).await?;
    let frame = files.read_as_base64(&thumbnail_uri).await;
    if let Err(e) = thumbnailer.discard(&thumbnail_uri).await {
        warn!("Could not discard still {}: {}", thumbnail_uri, e);
    }
    frame
}

/// Extracts base64 frames from `video_uri`.
///
/// Frames that fail are left out; the result keeps timestamp order and is empty
/// if every frame fails. `count` is capped at [`MAX_FRAME_COUNT`] and at most
/// [`FRAME_GRAB_CONCURRENCY`] thumbnails are in flight.
pub async fn extract_frames(
    thumbnailer: &dyn VideoThumbnailer,
    files: &dyn FileReader,
    video_uri: &str,
    count: usize,
    duration_ms: u64,
) -> Vec<String> {
    if count > MAX_FRAME_COUNT {
        warn!("Asked for {} frames; extracting {}.", count, MAX_FRAME_COUNT);
    }
    let count = count.min(MAX_FRAME_COUNT);
    let timestamps = frame_timestamps(count, duration_ms);

    let results: Vec<(u64, PortResult<String>)> = stream::iter(timestamps)
        .map(move |t| async move { (t, grab_frame(thumbnailer, files, video_uri, t).await) })
        .buffered(FRAME_GRAB_CONCURRENCY)
        .collect()
        .await;

    let frames: Vec<String> = results
        .into_iter()
        .filter_map(|(t, result)| match result {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Skipping frame at {}ms of {}: {}", t, video_uri, e);
                None
            }
        })
        .collect();

    debug!("Extracted {}/{} frames from {}", frames.len(), count, video_uri);
    frames
}
