//! Concurrent image ingestion
//!
//! Uploads every selected file to the object store in parallel and folds
//! the results back into input order. The call is all-or-nothing: one failed
//! upload fails the whole call, and uploads that already succeeded stay in
//! the object store as orphans (reported, never cleaned up here).

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::domain::errors::{
    IngestionError, OrphanedAssetWarning, TransportError, UploadFailure, ValidationError,
};
use crate::domain::image_asset::{FileHandle, ImageAsset, UploadState, UploadTask};
use crate::domain::repositories::ObjectStore;
use crate::infrastructure::config::defaults;

/// Limits applied to one ingestion call
#[derive(Debug, Clone)]
pub struct IngestionConstraints {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub allowed_mime_types: Vec<String>,
    pub max_concurrent_uploads: usize,
    pub upload_timeout: Duration,
}

impl Default for IngestionConstraints {
    fn default() -> Self {
        Self {
            max_files: defaults::MAX_FILES_PER_INGEST,
            max_file_size_bytes: defaults::MAX_FILE_SIZE_BYTES,
            allowed_mime_types: defaults::ALLOWED_MIME_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_concurrent_uploads: defaults::MAX_CONCURRENT_UPLOADS,
            upload_timeout: Duration::from_secs(defaults::UPLOAD_TIMEOUT_SECONDS),
        }
    }
}

pub struct AssetIngestionPipeline {
    object_store: Arc<dyn ObjectStore>,
    constraints: IngestionConstraints,
    progress: Option<mpsc::UnboundedSender<UploadTask>>,
}

impl AssetIngestionPipeline {
    /// File count and upload concurrency are clamped to the hard ceilings in
    /// `defaults`, whatever the caller asked for.
    pub fn new(object_store: Arc<dyn ObjectStore>, mut constraints: IngestionConstraints) -> Self {
        constraints.max_files = constraints.max_files.min(defaults::MAX_FILES_PER_INGEST);
        constraints.max_concurrent_uploads = constraints
            .max_concurrent_uploads
            .clamp(1, defaults::MAX_CONCURRENT_UPLOADS);
        Self {
            object_store,
            constraints,
            progress: None,
        }
    }

    /// Publish a snapshot of every task state change on `sender`.
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<UploadTask>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn constraints(&self) -> &IngestionConstraints {
        &self.constraints
    }

    /// Reject the selection before anything touches the network.
    pub fn validate(&self, files: &[FileHandle]) -> Result<(), ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::EmptySelection);
        }
        if files.len() > self.constraints.max_files {
            return Err(ValidationError::TooManyFiles {
                count: files.len(),
                max: self.constraints.max_files,
            });
        }

        for file in files {
            let allowed = self
                .constraints
                .allowed_mime_types
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&file.mime_type));
            if !allowed {
                return Err(ValidationError::DisallowedFormat {
                    file_name: file.name.clone(),
                    mime_type: file.mime_type.clone(),
                });
            }
            if file.size() == 0 {
                return Err(ValidationError::EmptyFile {
                    file_name: file.name.clone(),
                });
            }
            if file.size() > self.constraints.max_file_size_bytes {
                return Err(ValidationError::FileTooLarge {
                    file_name: file.name.clone(),
                    size: file.size(),
                    max: self.constraints.max_file_size_bytes,
                });
            }
        }
        Ok(())
    }

    /// Upload `files` concurrently and return one asset per file, in input order.
    ///
    /// The first asset is flagged as main. Waits for every upload to reach a
    /// terminal state before returning.
    pub async fn ingest(&self, files: Vec<FileHandle>) -> Result<Vec<ImageAsset>, IngestionError> {
        self.validate(&files)?;

        let total = files.len();
        let file_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.constraints.max_concurrent_uploads));
        let timeout = self.constraints.upload_timeout;

        info!(
            "📤 Ingesting {} file(s) with up to {} concurrent uploads",
            total,
            self.constraints.max_concurrent_uploads
        );

        let handles: Vec<_> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| {
                let semaphore = Arc::clone(&semaphore);
                let object_store = Arc::clone(&self.object_store);
                let progress = self.progress.clone();

                tokio::spawn(async move {
                    let mut task = UploadTask::new(index, &file);
                    publish(progress.as_ref(), &task);

                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            task.fail(TransportError::Network(format!(
                                "upload slot unavailable: {e}"
                            )));
                            publish(progress.as_ref(), &task);
                            return task;
                        }
                    };

                    task.start();
                    publish(progress.as_ref(), &task);
                    debug!("Uploading [{}] {} ({} bytes)", index, file.name, file.size());

                    match tokio::time::timeout(timeout, object_store.upload(&file)).await {
                        Ok(Ok(uploaded)) => {
                            debug!("✅ Uploaded [{}] {} as {}", index, file.name, uploaded.public_id);
                            task.succeed(ImageAsset::new(
                                uploaded.url,
                                uploaded.public_id,
                                file.name.clone(),
                                file.size(),
                            ));
                        }
                        Ok(Err(e)) => {
                            warn!("❌ Upload [{}] {} failed: {}", index, file.name, e);
                            task.fail(e);
                        }
                        Err(_) => {
                            warn!("⏱️ Upload [{}] {} timed out after {:?}", index, file.name, timeout);
                            task.fail(TransportError::Timeout(timeout));
                        }
                    }
                    publish(progress.as_ref(), &task);
                    task
                })
            })
            .collect();

        // join_all keeps spawn order, so results line up with the input.
        let joined = join_all(handles).await;

        let mut assets = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (index, outcome) in joined.into_iter().enumerate() {
            match outcome {
                Ok(UploadTask {
                    state: UploadState::Succeeded(asset),
                    ..
                }) => assets.push(asset),
                Ok(UploadTask {
                    state: UploadState::Failed(cause),
                    file_name,
                    ..
                }) => failures.push(UploadFailure {
                    index,
                    file_name,
                    cause,
                }),
                Ok(task) => failures.push(UploadFailure {
                    index,
                    file_name: task.file_name,
                    cause: TransportError::Network("upload never reached a terminal state".into()),
                }),
                Err(e) => {
                    error!("Upload task [{}] aborted: {}", index, e);
                    failures.push(UploadFailure {
                        index,
                        file_name: file_names[index].clone(),
                        cause: TransportError::Network(format!("upload task aborted: {e}")),
                    });
                }
            }
        }

        if failures.is_empty() {
            for (i, asset) in assets.iter_mut().enumerate() {
                asset.is_main = i == 0;
            }
            info!("✅ Ingested {} file(s)", assets.len());
            return Ok(assets);
        }

        let orphaned = OrphanedAssetWarning { assets };
        error!("{} of {} uploads failed", failures.len(), total);
        if !orphaned.is_empty() {
            warn!("⚠️ {}", orphaned);
        }
        Err(IngestionError::BatchFailed {
            total,
            failures,
            orphaned,
        })
    }
}

fn publish(sender: Option<&mpsc::UnboundedSender<UploadTask>>, task: &UploadTask) {
    if let Some(sender) = sender {
        // A dropped receiver only means nobody is watching progress.
        let _ = sender.send(task.clone());
    }
}
