use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::{Booking, Slot};

use super::{MirrorError, MirrorRecord, MirrorStore};

/// A document collection kept as one JSON array on disk.
///
/// Each write loads the collection, edits it, and renames a fresh copy over
/// the old one. Writes are serialized by an internal lock.
pub struct DocumentMirror {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<MirrorRecord>, MirrorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| MirrorError::WriteFailed(e.to_string()))
    }

    async fn store(&self, docs: &[MirrorRecord]) -> Result<(), MirrorError> {
        let json =
            serde_json::to_vec_pretty(docs).map_err(|e| MirrorError::WriteFailed(e.to_string()))?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MirrorStore for DocumentMirror {
    async fn put(&self, booking: &Booking) -> Result<(), MirrorError> {
        let _guard = self.write_lock.lock().await;
        let record = MirrorRecord::from(booking);
        let mut docs = self.load().await?;
        docs.retain(|d| !(d.label == record.label && d.user_email == record.user_email));
        docs.push(record);
        self.store(&docs).await
    }

    async fn remove(&self, slot: &Slot, user_email: &str) -> Result<(), MirrorError> {
        let _guard = self.write_lock.lock().await;
        let mut docs = self.load().await?;
        let before = docs.len();
        docs.retain(|d| !(d.label == slot.label && d.user_email == user_email));
        if docs.len() == before {
            return Ok(());
        }
        self.store(&docs).await
    }

    async fn snapshot(&self) -> Result<Vec<MirrorRecord>, MirrorError> {
        self.load().await
    }
}
