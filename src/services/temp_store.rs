// src/services/temp_store.rs
use crate::errors::RestorationError;
use crate::services::llm_service::ImageData;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Opaque reference to a stored image: its bare filename.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
    /// Accepts only plain filenames so a handle can never leave the store.
    pub fn parse(raw: &str) -> Result<Self, RestorationError> {
        let valid = !raw.is_empty()
            && !raw.contains("..")
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(RestorationError::InvalidInput(format!(
                "Invalid image reference: {}",
                raw
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

/// A stored image owned by one pipeline run. Dropping it deletes the file
/// unless [`TempImage::persist`] was called first.
///
/// The delete is a single blocking unlink run inline in `drop`, so the file
/// is gone as soon as the guard is, even outside a runtime.
#[derive(Debug)]
pub struct TempImage {
    handle: ImageHandle,
    path: PathBuf,
    armed: bool,
}

impl TempImage {
    pub fn handle(&self) -> &ImageHandle {
        &self.handle
    }

    /// Keep the file past the end of the run and hand out its handle.
    pub fn persist(mut self) -> ImageHandle {
        self.armed = false;
        self.handle.clone()
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temp file {}", self.handle),
            Err(e) => warn!("Could not delete temp file {}: {}", self.path.display(), e),
        }
    }
}

/// Directory-backed store for uploads and restored images.
pub struct TempImageStore {
    dir: PathBuf,
}

impl TempImageStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, RestorationError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            RestorationError::Storage(format!("Cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `image` under a fresh `{millis}-{suffix}.{ext}` name.
    pub async fn stage(
        &self,
        image: &ImageData,
        prefix: Option<&str>,
    ) -> Result<TempImage, RestorationError> {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}{}-{}.{}",
            prefix.map(|p| format!("{}-", p)).unwrap_or_default(),
            chrono::Utc::now().timestamp_millis(),
            &suffix[..9],
            extension_for(&image.mime_type)
        );
        let handle = ImageHandle::parse(&name)?;
        let path = self.dir.join(handle.as_str());

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| RestorationError::Storage(format!("Cannot create {}: {}", name, e)))?;

        // From here on the guard owns the file, so a failed write still cleans up.
        let staged = TempImage {
            handle,
            path,
            armed: true,
        };

        file.write_all(&image.bytes)
            .await
            .map_err(|e| RestorationError::Storage(format!("Cannot write {}: {}", name, e)))?;
        file.flush()
            .await
            .map_err(|e| RestorationError::Storage(format!("Cannot write {}: {}", name, e)))?;

        debug!("Staged {} ({} bytes)", staged.handle, image.bytes.len());
        Ok(staged)
    }

    pub async fn load(&self, handle: &ImageHandle) -> Result<ImageData, RestorationError> {
        let path = self.dir.join(handle.as_str());
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RestorationError::NotFound(format!("Image {} not found", handle))
            }
            _ => RestorationError::Storage(format!("Cannot read {}: {}", handle, e)),
        })?;

        let mime_type = mime_for_extension(handle.as_str());
        Ok(ImageData::new(bytes, mime_type))
    }

    /// Best-effort delete.
    pub async fn remove(&self, handle: &ImageHandle) {
        let path = self.dir.join(handle.as_str());
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Could not delete temp file {}: {}", path.display(), e);
            }
        }
    }

    /// Delete files older than `max_age`. Never fails; problems are logged
    /// and counted.
    pub async fn cleanup(&self, max_age: Duration) -> CleanupReport {
        let mut report = CleanupReport::default();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.dir.display(), e);
                return report;
            }
        };

        let now = SystemTime::now();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Cannot read entry in {}: {}", self.dir.display(), e);
                    report.failed += 1;
                    break;
                }
            };

            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Cannot stat {}: {}", entry.path().display(), e);
                    report.failed += 1;
                    continue;
                }
            };

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => report.removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Could not delete {}: {}", entry.path().display(), e);
                    report.failed += 1;
                }
            }
        }

        if report.removed > 0 || report.failed > 0 {
            info!(
                "Cleanup removed {} file(s), {} failure(s)",
                report.removed, report.failed
            );
        }
        report
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        _ => "png",
    }
}

fn mime_for_extension(name: &str) -> &'static str {
    let extension = name.rsplit('.').next().unwrap_or_default();
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "image/png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn handles_reject_path_tricks() {
        assert!(ImageHandle::parse("1700000000000-abc123def.png").is_ok());
        assert!(ImageHandle::parse("restored-1-abc.png").is_ok());
        for bad in ["", "..", "../secret.png", "a/b.png", "a\\b.png", "x.png\0"] {
            assert!(ImageHandle::parse(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[tokio::test]
    async fn dropped_guard_deletes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TempImageStore::open(tmp.path()).await.unwrap();

        let staged = store
            .stage(&ImageData::new(vec![1u8, 2, 3], "image/jpeg"), None)
            .await
            .unwrap();
        assert!(staged.handle().as_str().ends_with(".jpg"));
        assert_eq!(file_count(tmp.path()), 1);

        drop(staged);
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn persisted_image_can_be_loaded_and_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TempImageStore::open(tmp.path()).await.unwrap();

        let handle = store
            .stage(&ImageData::new(vec![9u8; 16], "image/png"), Some("restored"))
            .await
            .unwrap()
            .persist();
        assert!(handle.as_str().starts_with("restored-"));

        let loaded = store.load(&handle).await.unwrap();
        assert_eq!(loaded.mime_type, "image/png");
        assert_eq!(loaded.bytes.len(), 16);

        store.remove(&handle).await;
        assert!(matches!(
            store.load(&handle).await,
            Err(RestorationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn staged_names_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TempImageStore::open(tmp.path()).await.unwrap();
        let image = ImageData::new(vec![0u8], "image/png");

        let mut handles = Vec::new();
        for _ in 0..20 {
            handles.push(store.stage(&image, None).await.unwrap().persist());
        }
        handles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        handles.dedup();
        assert_eq!(handles.len(), 20);
    }

    #[tokio::test]
    async fn cleanup_only_removes_files_past_retention() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TempImageStore::open(tmp.path()).await.unwrap();
        let image = ImageData::new(vec![0u8], "image/png");

        store.stage(&image, None).await.unwrap().persist();
        store.stage(&image, None).await.unwrap().persist();

        let kept = store.cleanup(Duration::from_secs(3600)).await;
        assert_eq!(kept, CleanupReport::default());
        assert_eq!(file_count(tmp.path()), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let swept = store.cleanup(Duration::from_millis(10)).await;
        assert_eq!(swept.removed, 2);
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn cleanup_of_missing_directory_reports_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = TempImageStore::open(tmp.path().join("uploads")).await.unwrap();
        std::fs::remove_dir(store.dir()).unwrap();
        assert_eq!(store.cleanup(Duration::ZERO).await, CleanupReport::default());
    }
}
