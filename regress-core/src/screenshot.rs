//! Turning image files into embeddable screenshots

use base64::{engine::general_purpose::STANDARD, Engine};
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::models::Screenshot;

/// MIME type for a supported image extension
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(mime)
}

/// Builds a `data:<mime>;base64,<payload>` URI
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Reads an image file into a screenshot with an embedded data URI.
/// Files that are not images are rejected.
pub fn screenshot_from_file(path: &Path, description: Option<&str>) -> StoreResult<Screenshot> {
    let mime = image_mime_type(path).ok_or_else(|| {
        StoreError::validation(format!("{} is not an image file", path.display()))
    })?;
    let bytes = fs::read(path)
        .map_err(|e| StoreError::validation(format!("Cannot read {}: {}", path.display(), e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut screenshot = Screenshot::new(file_name, to_data_uri(mime, &bytes));
    if let Some(description) = description {
        screenshot.description = description.to_string();
    }
    Ok(screenshot)
}
