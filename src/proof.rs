//! Proof submission pipeline.
//!
//! Uploads user-supplied task evidence to blob storage and returns a durable
//! public URL. Runs strictly before the ledger credit, so an upload failure
//! leaves no partial state to reconcile.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::info;

use crate::model::{TaskId, Wallet};
use crate::store::Collection;

/// Media library access, granted by the user out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaPermission {
    Granted,
    Denied,
}

/// A locally picked image ready for upload.
#[derive(Debug, Clone)]
pub struct ProofImage {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum ProofError {
    /// Recoverable: the user must grant photo library access and retry.
    #[error("photo library permission denied")]
    PermissionDenied,

    /// Defensive: callers should not submit without a picked image.
    #[error("no image selected")]
    MissingImage,

    /// Local pre-check against the wallet. A UX affordance only; the ledger
    /// transaction is what actually prevents double crediting.
    #[error("task {0} already completed")]
    AlreadyCompleted(TaskId),

    /// Recoverable: nothing was persisted, the user may retry.
    #[error("upload failed: {0}")]
    UploadFailed(#[from] BlobError),
}

/// Blob storage failure, as reported by the backing object store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BlobError(pub String);

/// Shared blob store holding proof images.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, overwriting any previous object.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError>;

    /// Publicly resolvable URL for `path`.
    fn public_url(&self, path: &str) -> String;
}

/// In-memory blob store adapter. Mirrors the URL layout of the hosted
/// object store so returned links look the same to callers.
pub struct MemoryBlobStore {
    base_url: String,
    bucket: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: bucket.into(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.insert(path.to_owned(), bytes.to_vec());
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}

/// The proof submission service.
pub struct ProofPipeline {
    wallets: Arc<Collection<Wallet>>,
    blobs: Arc<dyn BlobStore>,
}

impl ProofPipeline {
    pub fn new(wallets: Arc<Collection<Wallet>>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { wallets, blobs }
    }

    /// Upload proof for a task and return its public URL.
    ///
    /// The upload target path is unique per (user, task, timestamp), so
    /// uploads never collide across users or tasks.
    pub async fn submit_proof(
        &self,
        user_id: &str,
        task_id: &str,
        permission: MediaPermission,
        image: Option<&ProofImage>,
    ) -> Result<String, ProofError> {
        if permission == MediaPermission::Denied {
            return Err(ProofError::PermissionDenied);
        }
        let image = image.ok_or(ProofError::MissingImage)?;

        if let Some(wallet) = self.wallets.get(user_id).await {
            if wallet.has_completed(task_id) {
                return Err(ProofError::AlreadyCompleted(task_id.to_owned()));
            }
        }

        let path = format!(
            "{user_id}/{}_{task_id}.jpg",
            Utc::now().timestamp_millis()
        );
        self.blobs.upload(&path, &image.bytes).await?;
        let url = self.blobs.public_url(&path);

        info!(user = user_id, task = task_id, url = %url, "proof uploaded");
        Ok(url)
    }
}
