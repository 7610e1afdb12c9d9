//! Image assets, input files, and per-file upload tasks

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::errors::TransportError;

/// An uploaded image attached to a product.
///
/// Position is implicit: it is the index in the owning sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub url: String,
    pub public_id: String,
    pub file_name: String,
    pub size: u64,
    #[serde(default)]
    pub is_main: bool,
}

impl ImageAsset {
    pub fn new(
        url: impl Into<String>,
        public_id: impl Into<String>,
        file_name: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            url: url.into(),
            public_id: public_id.into(),
            file_name: file_name.into(),
            size,
            is_main: false,
        }
    }

    pub fn with_main(mut self, is_main: bool) -> Self {
        self.is_main = is_main;
        self
    }
}

/// What the object store returns for a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    pub url: String,
    pub public_id: String,
}

/// A user-selected file waiting to be uploaded.
#[derive(Clone)]
pub struct FileHandle {
    pub name: String,
    pub mime_type: String,
    pub contents: Vec<u8>,
}

impl FileHandle {
    /// Build a handle from in-memory contents, guessing the MIME type from the name.
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            name,
            mime_type,
            contents,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Read a file from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, contents))
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.contents.len())
            .finish()
    }
}

/// Lifecycle of one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "camelCase")]
pub enum UploadState {
    Pending,
    Uploading,
    Succeeded(ImageAsset),
    Failed(TransportError),
}

/// Progress record for one file of an ingestion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub index: usize,
    pub file_name: String,
    pub size: u64,
    pub state: UploadState,
    /// 0-100. Terminal states, failed included, report 100.
    pub progress: u8,
}

impl UploadTask {
    pub fn new(index: usize, file: &FileHandle) -> Self {
        Self {
            index,
            file_name: file.name.clone(),
            size: file.size(),
            state: UploadState::Pending,
            progress: 0,
        }
    }

    pub fn start(&mut self) {
        self.state = UploadState::Uploading;
    }

    pub fn succeed(&mut self, asset: ImageAsset) {
        self.state = UploadState::Succeeded(asset);
        self.progress = 100;
    }

    pub fn fail(&mut self, error: TransportError) {
        self.state = UploadState::Failed(error);
        self.progress = 100;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            UploadState::Succeeded(_) | UploadState::Failed(_)
        )
    }
}
