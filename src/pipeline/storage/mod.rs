//! Raw upload storage.
//!
//! Stored names are `{user}_{YYYYMMDD_HHMMSS}_{uuid8}_{sanitized name}`,
//! so concurrent uploads of the same file never collide.

pub mod local;

pub use local::{LocalFileStore, MockFileStore};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;
use uuid::Uuid;

use crate::models::StoredFile;
use crate::pipeline::extraction::detect_image_mime;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn store(
        &self,
        user_id: i64,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError>;
}

/// Unique on-disk name for an upload.
pub fn stored_file_name(
    user_id: i64,
    original_name: Option<&str>,
    bytes: &[u8],
    now: DateTime<Local>,
) -> String {
    let mut name = sanitize_filename(original_name.unwrap_or_default());
    if !name.contains('.') {
        if let Some(ext) = extension_for(detect_image_mime(bytes)) {
            name.push('.');
            name.push_str(ext);
        }
    }

    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}_{}",
        user_id,
        now.format("%Y%m%d_%H%M%S"),
        &unique[..8],
        name
    )
}

/// Preferred file extension for a MIME type, e.g. `jpeg` for `image/jpeg`.
fn extension_for(mime: &str) -> Option<&'static str> {
    let extensions = mime_guess::get_mime_extensions_str(mime)?;
    let subtype = mime.rsplit('/').next().unwrap_or_default();
    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .copied()
}

/// Strip path components and anything outside `[A-Za-z0-9._-]`-like
/// characters; never empty.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let sanitized: String = base
        .chars()
        .filter(|&c| c != '\0')
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.replace("..", "");
    let sanitized = sanitized.trim_start_matches('.');
    let sanitized: String = sanitized.chars().take(100).collect();

    if sanitized.is_empty() {
        "document".into()
    } else {
        sanitized
    }
}
