use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};
use tracing::debug;

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Object storage for original uploads (PDFs and images).
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    public_base_url: String,
}

impl StorageManager {
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let store = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind: cfg.storage.clone(),
            public_base_url: cfg.public_files_url.clone(),
        })
    }

    /// Build a manager around an injected backend, used by tests.
    pub fn with_backend(
        store: DynStore,
        backend_kind: StorageKind,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            backend_kind,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn memory(public_base_url: impl Into<String>) -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory, public_base_url)
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())?;
        debug!(location, "Stored object");
        Ok(())
    }

    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Public url for an object location: configured base + "/" + location.
    pub fn public_url(&self, location: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            location.trim_start_matches('/')
        )
    }
}

/// Location of an uploaded PDF.
pub fn pdf_location(owner_id: &str, course_id: &str, document_id: &str) -> String {
    format!("owners/{owner_id}/courses/{course_id}/docs/{document_id}.pdf")
}

/// Location of an uploaded image; `extension` is stored lowercased without a dot.
pub fn image_location(owner_id: &str, course_id: &str, document_id: &str, extension: &str) -> String {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    format!("owners/{owner_id}/courses/{course_id}/images/{document_id}.{extension}")
}

async fn create_storage_backend(cfg: &AppConfig) -> object_store::Result<DynStore> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base)?;
            Ok(Arc::new(store))
        }
        StorageKind::Memory => Ok(Arc::new(InMemory::new())),
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn memory_backend_round_trips_bytes() {
        let storage = StorageManager::memory("http://files.local/");
        let location = pdf_location("u1", "c1", "d1");

        storage
            .put(&location, Bytes::from_static(b"%PDF-1.7"))
            .await
            .expect("put");

        assert!(storage.exists(&location).await.expect("exists"));
        assert!(!storage.exists("owners/u1/missing.pdf").await.expect("exists"));
        let data = storage.get(&location).await.expect("get");
        assert_eq!(data.as_ref(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn local_backend_writes_under_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = AppConfig {
            data_dir: dir.path().join(Uuid::new_v4().to_string()).display().to_string(),
            storage: StorageKind::Local,
            ..AppConfig::default()
        };

        let storage = StorageManager::new(&cfg).await.expect("local storage");
        let location = image_location("u1", "c1", "d1", ".PNG");
        storage
            .put(&location, Bytes::from_static(b"png"))
            .await
            .expect("put");

        let on_disk = resolve_base_dir(&cfg).join(&location);
        assert!(on_disk.exists());
        assert!(location.ends_with("images/d1.png"));
    }

    #[test]
    fn public_url_joins_base_and_location() {
        let storage = StorageManager::memory("http://localhost:3000/files/");
        assert_eq!(
            storage.public_url("/owners/u/courses/c/docs/d.pdf"),
            "http://localhost:3000/files/owners/u/courses/c/docs/d.pdf"
        );
    }
}
