//! Filesystem artifact store.
//!
//! Layout: `<root>/<kind dir>/<stem>.<ext>`. Writes go to a hidden temp file
//! in the target directory and are renamed into place, so readers never see
//! a partial artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vscribe_models::{ArtifactKey, ArtifactKind, ArtifactLocation, Stem};

use crate::catalog::Catalog;
use crate::error::{StorageError, StorageResult};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory of all artifact namespaces
    pub root: PathBuf,
    /// SQLite catalog file
    pub catalog_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            catalog_path: PathBuf::from("sqlite.db"),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            root: std::env::var("ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(default.root),
            catalog_path: std::env::var("CATALOG_PATH")
                .map(PathBuf::from)
                .unwrap_or(default.catalog_path),
        }
    }
}

/// Artifact store addressed by `(kind, stem)`.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    catalog: Option<Arc<Catalog>>,
}

impl ArtifactStore {
    /// Store rooted at `root`, without a catalog.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            catalog: None,
        }
    }

    /// Open the store and its catalog from configuration.
    pub fn open(config: &StoreConfig) -> StorageResult<Self> {
        std::fs::create_dir_all(&config.root)?;
        let catalog = Catalog::open(&config.catalog_path)?;
        info!(
            root = %config.root.display(),
            catalog = %config.catalog_path.display(),
            "Opened artifact store"
        );
        Ok(Self::new(&config.root).with_catalog(Arc::new(catalog)))
    }

    /// Attach a catalog. Deleting videos and word clouds then also removes
    /// their catalog rows.
    pub fn with_catalog(mut self, catalog: Arc<Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> Option<&Arc<Catalog>> {
        self.catalog.as_ref()
    }

    /// Absolute path of an artifact.
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Check that the root directory is usable.
    pub async fn check_ready(&self) -> StorageResult<()> {
        fs::create_dir_all(&self.root).await?;
        let meta = fs::metadata(&self.root).await?;
        if meta.permissions().readonly() {
            return Err(StorageError::config_error(format!(
                "artifact root {} is read-only",
                self.root.display()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write the canonical rendition of `(kind, stem)`.
    pub async fn write(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
        bytes: impl AsRef<[u8]>,
    ) -> StorageResult<ArtifactLocation> {
        self.write_key(&ArtifactKey::new(kind, stem.clone()), bytes.as_ref())
            .await
    }

    /// Write a secondary rendition, e.g. the `.txt` of a translation.
    pub async fn write_variant(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
        extension: &str,
        bytes: impl AsRef<[u8]>,
    ) -> StorageResult<ArtifactLocation> {
        let key = ArtifactKey::variant(kind, stem.clone(), extension)?;
        self.write_key(&key, bytes.as_ref()).await
    }

    /// Serialize `value` as pretty JSON into the canonical rendition.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
        value: &T,
    ) -> StorageResult<ArtifactLocation> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write(kind, stem, bytes).await
    }

    async fn write_key(&self, key: &ArtifactKey, bytes: &[u8]) -> StorageResult<ArtifactLocation> {
        let dst = self.path_for(key);
        let tmp = self.temp_path_for(key);
        ensure_parent(&dst).await?;

        if let Err(e) = write_and_sync(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &dst).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(artifact = %key, size = bytes.len(), "Wrote artifact");
        Ok(location(key, bytes.len() as u64))
    }

    /// Move a file produced by a collaborator into place.
    ///
    /// Falls back to copy when the source lives on another filesystem. The
    /// source is removed either way.
    pub async fn persist_file(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
        src: impl AsRef<Path>,
    ) -> StorageResult<ArtifactLocation> {
        let src = src.as_ref();
        let key = ArtifactKey::new(kind, stem.clone());
        let dst = self.path_for(&key);
        ensure_parent(&dst).await?;

        match fs::rename(src, &dst).await {
            Ok(()) => {}
            Err(e) if is_cross_device_error(&e) => {
                debug!(
                    "Cross-device rename detected, falling back to copy: {} -> {}",
                    src.display(),
                    dst.display()
                );
                let tmp = self.temp_path_for(&key);
                if let Err(e) = fs::copy(src, &tmp).await {
                    let _ = fs::remove_file(&tmp).await;
                    return Err(e.into());
                }
                fs::rename(&tmp, &dst).await?;
                fs::remove_file(src).await?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(src.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let size = fs::metadata(&dst).await?.len();
        debug!(artifact = %key, size, "Persisted artifact");
        Ok(location(&key, size))
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Read the canonical rendition.
    pub async fn read(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<Vec<u8>> {
        self.read_key(&ArtifactKey::new(kind, stem.clone())).await
    }

    /// Read a secondary rendition.
    pub async fn read_variant(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
        extension: &str,
    ) -> StorageResult<Vec<u8>> {
        let key = ArtifactKey::variant(kind, stem.clone(), extension)?;
        self.read_key(&key).await
    }

    /// Read the canonical rendition as UTF-8 text.
    pub async fn read_to_string(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<String> {
        let bytes = self.read(kind, stem).await?;
        String::from_utf8(bytes).map_err(|e| {
            StorageError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }

    /// Read and deserialize a JSON artifact.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        kind: ArtifactKind,
        stem: &Stem,
    ) -> StorageResult<T> {
        let bytes = self.read(kind, stem).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn read_key(&self, key: &ArtifactKey) -> StorageResult<Vec<u8>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<bool> {
        let path = self.path_for(&ArtifactKey::new(kind, stem.clone()));
        Ok(fs::try_exists(path).await?)
    }

    /// Size and location of an existing artifact.
    pub async fn locate(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<ArtifactLocation> {
        let key = ArtifactKey::new(kind, stem.clone());
        match fs::metadata(self.path_for(&key)).await {
            Ok(meta) => Ok(location(&key, meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stems that have a canonical artifact of `kind`, sorted.
    pub async fn list(&self, kind: ArtifactKind) -> StorageResult<Vec<Stem>> {
        let dir = self.root.join(kind.dir_name());
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let suffix = format!(".{}", kind.extension());
        let mut stems = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(&suffix) else { continue };
            match Stem::parse(stem) {
                Ok(stem) => stems.push(stem),
                Err(_) => debug!(file = name, "Skipping file with invalid stem"),
            }
        }
        stems.sort();
        Ok(stems)
    }

    // ------------------------------------------------------------------
    // Deletes
    // ------------------------------------------------------------------

    /// Delete every rendition of `(kind, stem)`.
    ///
    /// The canonical file decides the outcome: when two callers race, the one
    /// whose unlink succeeds wins and the other gets `NotFound`. Only the
    /// winner removes the other renditions and the catalog rows for videos
    /// and word clouds; a `NotFound` delete leaves everything in place.
    pub async fn delete(&self, kind: ArtifactKind, stem: &Stem) -> StorageResult<()> {
        let canonical = ArtifactKey::new(kind, stem.clone());
        match fs::remove_file(self.path_for(&canonical)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(canonical.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        for ext in kind.extensions().iter().skip(1) {
            let key = ArtifactKey::variant(kind, stem.clone(), ext)?;
            match fs::remove_file(self.path_for(&key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(artifact = %key, "Failed to remove rendition: {}", e),
            }
        }

        if kind.has_catalog_row() {
            if let Some(catalog) = &self.catalog {
                catalog.remove_rows_for(kind, stem)?;
            }
        }

        info!(artifact = %canonical, "Deleted artifact");
        Ok(())
    }

    fn temp_path_for(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.kind.dir_name()).join(format!(
            ".{}.{}.{}.tmp",
            key.stem,
            key.extension,
            Uuid::new_v4().simple()
        ))
    }
}

fn location(key: &ArtifactKey, size_bytes: u64) -> ArtifactLocation {
    ArtifactLocation {
        kind: key.kind,
        stem: key.stem.to_string(),
        path: key.relative_path(),
        size_bytes,
    }
}

async fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// EXDEV (cross-device link) is 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    fn stem(s: &str) -> Stem {
        Stem::parse(s).unwrap()
    }

    #[tokio::test]
    async fn write_then_read() {
        let (_dir, store) = store();
        let loc = store
            .write(ArtifactKind::TranscriptText, &stem("v1"), b"hello world")
            .await
            .unwrap();

        assert_eq!(loc.path, "transcripts/v1.txt");
        assert_eq!(loc.size_bytes, 11);
        let bytes = store.read(ArtifactKind::TranscriptText, &stem("v1")).await.unwrap();
        assert_eq!(bytes, b"hello world");
        assert!(store.exists(ArtifactKind::TranscriptText, &stem("v1")).await.unwrap());
        assert!(!store.exists(ArtifactKind::Audio, &stem("v1")).await.unwrap());
    }

    #[tokio::test]
    async fn last_write_wins_and_leaves_no_temp_files() {
        let (dir, store) = store();
        store.write(ArtifactKind::Audio, &stem("v1"), b"first").await.unwrap();
        store.write(ArtifactKind::Audio, &stem("v1"), b"second").await.unwrap();

        assert_eq!(store.read(ArtifactKind::Audio, &stem("v1")).await.unwrap(), b"second");
        let names: Vec<_> = std::fs::read_dir(dir.path().join("audios"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("v1.mp3")]);
    }

    #[tokio::test]
    async fn delete_then_read_is_not_found() {
        let (_dir, store) = store();
        store.write(ArtifactKind::Audio, &stem("v1"), b"x").await.unwrap();

        store.delete(ArtifactKind::Audio, &stem("v1")).await.unwrap();
        let err = store.read(ArtifactKind::Audio, &stem("v1")).await.unwrap_err();
        assert!(err.is_not_found());

        let err = store.delete(ArtifactKind::Audio, &stem("v1")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn concurrent_delete_has_one_winner() {
        let (_dir, store) = store();
        store.write(ArtifactKind::Video, &stem("v1"), b"x").await.unwrap();

        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            async move { a.delete(ArtifactKind::Video, &stem("v1")).await },
            async move { b.delete(ArtifactKind::Video, &stem("v1")).await },
        );
        let oks = [&ra, &rb].iter().filter(|r| r.is_ok()).count();
        assert_eq!(oks, 1);
        assert!([ra, rb].into_iter().any(|r| matches!(r, Err(StorageError::NotFound(_)))));
    }

    #[tokio::test]
    async fn delete_removes_every_rendition() {
        let (_dir, store) = store();
        let s = stem("v1");
        store.write_json(ArtifactKind::Translated, &s, &vec!["hi"]).await.unwrap();
        store
            .write_variant(ArtifactKind::Translated, &s, "txt", "hi")
            .await
            .unwrap();

        store.delete(ArtifactKind::Translated, &s).await.unwrap();
        let err = store
            .read_variant(ArtifactKind::Translated, &s, "txt")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn not_found_delete_leaves_renditions() {
        let (_dir, store) = store();
        let s = stem("v1");
        store
            .write_variant(ArtifactKind::Translated, &s, "txt", "hi")
            .await
            .unwrap();

        let err = store.delete(ArtifactKind::Translated, &s).await.unwrap_err();
        assert!(err.is_not_found());
        let txt = store
            .read_variant(ArtifactKind::Translated, &s, "txt")
            .await
            .unwrap();
        assert_eq!(txt, b"hi");
    }

    #[tokio::test]
    async fn kinds_are_separate_namespaces() {
        let (_dir, store) = store();
        let s = stem("v1");
        store.write(ArtifactKind::TranscriptText, &s, "text").await.unwrap();
        store.write(ArtifactKind::TranscriptSubtitle, &s, "srt").await.unwrap();

        store.delete(ArtifactKind::TranscriptText, &s).await.unwrap();
        assert_eq!(
            store.read_to_string(ArtifactKind::TranscriptSubtitle, &s).await.unwrap(),
            "srt"
        );
    }

    #[tokio::test]
    async fn json_helpers() {
        let (_dir, store) = store();
        let s = stem("v1");
        let mut table = std::collections::BTreeMap::new();
        table.insert("hello".to_string(), 1u64);
        store.write_json(ArtifactKind::FrequencyTable, &s, &table).await.unwrap();

        let back: std::collections::BTreeMap<String, u64> =
            store.read_json(ArtifactKind::FrequencyTable, &s).await.unwrap();
        assert_eq!(back, table);
    }

    #[tokio::test]
    async fn persist_moves_collaborator_output() {
        let (dir, store) = store();
        let src = dir.path().join("scratch.mp3");
        std::fs::write(&src, b"mp3 bytes").unwrap();

        let loc = store
            .persist_file(ArtifactKind::Audio, &stem("v1"), &src)
            .await
            .unwrap();

        assert_eq!(loc.size_bytes, 9);
        assert!(!src.exists());
        assert_eq!(store.read(ArtifactKind::Audio, &stem("v1")).await.unwrap(), b"mp3 bytes");
    }

    #[tokio::test]
    async fn list_skips_other_files() {
        let (dir, store) = store();
        store.write(ArtifactKind::Video, &stem("b"), b"x").await.unwrap();
        store.write(ArtifactKind::Video, &stem("a"), b"x").await.unwrap();
        std::fs::write(dir.path().join("videos/.a.mp4.123.tmp"), b"partial").unwrap();
        std::fs::write(dir.path().join("videos/notes.txt"), b"x").unwrap();

        let stems = store.list(ArtifactKind::Video).await.unwrap();
        assert_eq!(stems, vec![stem("a"), stem("b")]);
        assert!(store.list(ArtifactKind::Audio).await.unwrap().is_empty());
    }
}
