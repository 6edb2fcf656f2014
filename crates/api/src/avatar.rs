//! Avatar processing
//!
//! Decodes an uploaded image, resizes it to the fixed avatar dimensions and
//! writes it under the configured avatar directory as `<user_id>.png`.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use uuid::Uuid;

/// Fixed avatar dimensions
pub const AVATAR_SIZE: u32 = 250;

/// Resize uploaded image bytes and store them for a user
///
/// Returns the public URL path for the stored avatar. Decoding and resizing
/// run on a blocking thread; image work is CPU-bound.
pub async fn store_avatar(
    avatar_dir: &str,
    user_id: Uuid,
    bytes: Vec<u8>,
) -> Result<String, AvatarError> {
    let dir = PathBuf::from(avatar_dir);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(AvatarError::Io)?;

    let filename = format!("{}.png", user_id);
    let target = dir.join(&filename);

    tokio::task::spawn_blocking(move || resize_to(&bytes, &target))
        .await
        .map_err(|_| AvatarError::TaskFailed)??;

    Ok(format!("/avatars/{}", filename))
}

fn resize_to(bytes: &[u8], target: &Path) -> Result<(), AvatarError> {
    let img = image::load_from_memory(bytes).map_err(|e| AvatarError::InvalidImage(e.to_string()))?;
    let resized = img.resize_exact(AVATAR_SIZE, AVATAR_SIZE, FilterType::Triangle);
    resized
        .save_with_format(target, image::ImageFormat::Png)
        .map_err(|e| AvatarError::InvalidImage(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing task failed")]
    TaskFailed,
}
