use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::ai::ImagePart;
use crate::ai::codec::encode_base64;

/// A photo picked for recognition, already encoded for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedImage {
    pub path: PathBuf,
    /// Short label shown in place of a thumbnail.
    pub preview: String,
    pub mime_type: String,
    pub data: String,
    pub size_bytes: usize,
}

impl SelectedImage {
    pub fn to_part(&self) -> ImagePart {
        ImagePart {
            mime_type: self.mime_type.clone(),
            data: self.data.clone(),
        }
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

pub fn load_image(path: &Path) -> Result<SelectedImage> {
    let Some(mime_type) = mime_for_path(path) else {
        bail!("Unsupported image type: {}", path.display());
    };
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        bail!("Image file is empty: {}", path.display());
    }
    let preview = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SelectedImage {
        path: path.to_path_buf(),
        preview,
        mime_type: mime_type.to_string(),
        data: encode_base64(&bytes),
        size_bytes: bytes.len(),
    })
}

/// Expand a leading `~` the way the path prompt displays it.
pub fn expand_home(input: &str) -> PathBuf {
    if let Some(rest) = input.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(input)
}
