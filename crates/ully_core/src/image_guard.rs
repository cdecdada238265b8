//! Local size limit for base64 images, applied before anything leaves the device.

/// Largest decoded image the assistant will send.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Image is too large ({size_mb:.1}MB). Maximum size is 5MB.")]
pub struct ImageTooLarge {
    pub decoded_bytes: usize,
    pub size_mb: f64,
}

/// Decoded byte length of a base64 payload, ignoring any `data:` URL prefix.
pub fn decoded_size(base64: &str) -> usize {
    let body = match base64.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => base64,
    };
    let body = body.trim_end();
    let padding = body.bytes().rev().take_while(|b| *b == b'=').count().min(2);
    (body.len() * 3 / 4).saturating_sub(padding)
}

pub fn validate_image_size(base64: &str) -> Result<(), ImageTooLarge> {
    let decoded_bytes = decoded_size(base64);
    if decoded_bytes > MAX_IMAGE_BYTES {
        return Err(ImageTooLarge {
            decoded_bytes,
            size_mb: decoded_bytes as f64 / (1024.0 * 1024.0),
        });
    }
    Ok(())
}
