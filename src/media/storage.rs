use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media reference")]
    InvalidReference,
    #[error("empty upload")]
    EmptyUpload,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What kind of object a reference points at. Doubles as the storage
/// subdirectory, so references look like `image/<uuid>.png`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    fn dir(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Disk-backed store for uploaded media. References are opaque
/// `kind/uuid.ext` strings; callers persist them on entities and hand them
/// back for deletion.
pub struct MediaStorage {
    base_path: PathBuf,
}

impl MediaStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("media"),
        }
    }

    fn object_path(&self, reference: &str) -> PathBuf {
        self.base_path.join(reference)
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    pub async fn exists(&self, reference: &str) -> Result<bool, MediaError> {
        validate_reference(reference)?;
        Ok(self.object_path(reference).exists())
    }

    /// Writes an uploaded file and returns its reference. Fails closed:
    /// on any error nothing is left behind at the final path.
    pub async fn store(
        &self,
        kind: MediaKind,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        if data.is_empty() {
            return Err(MediaError::EmptyUpload);
        }

        let reference = format!(
            "{}/{}.{}",
            kind.dir(),
            Uuid::new_v4(),
            extension_of(original_name)
        );

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;

        let final_path = self.object_path(&reference);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::rename(&temp_path, &final_path).await?;

        Ok(reference)
    }

    /// Removes a stored object. Returns false (not an error) when the
    /// reference points at nothing.
    pub async fn delete(&self, reference: &str) -> Result<bool, MediaError> {
        validate_reference(reference)?;
        let path = self.object_path(reference);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MediaError::Io(e)),
        }
    }

    /// Uploads a replacement and then drops the previous object. The new
    /// upload must succeed before the old reference is touched; a failed
    /// deletion leaks the old object but is never surfaced to the caller.
    pub async fn replace(
        &self,
        old: Option<&str>,
        kind: MediaKind,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, MediaError> {
        let reference = self.store(kind, original_name, data).await?;

        if let Some(old) = old {
            if let Err(e) = self.delete(old).await {
                tracing::warn!("Failed to delete replaced media object '{}': {}", old, e);
            }
        }

        Ok(reference)
    }
}

/// Sanitizes an upload's extension; anything suspicious becomes "bin".
fn extension_of(original_name: &str) -> String {
    let ext = original_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "bin".to_string()
    } else {
        ext
    }
}

fn validate_reference(reference: &str) -> Result<(), MediaError> {
    let Some((dir, name)) = reference.split_once('/') else {
        return Err(MediaError::InvalidReference);
    };

    if !matches!(dir, "image" | "video") {
        return Err(MediaError::InvalidReference);
    }

    if name.is_empty()
        || name.contains('/')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        || name.contains("..")
    {
        return Err(MediaError::InvalidReference);
    }

    Ok(())
}
