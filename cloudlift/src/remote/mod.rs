//! Storage-agnostic view of a hierarchical remote disk.
//!
//! The upload core only talks to [`RemoteStorage`]. Handles are logical: a
//! [`FolderHandle`] remembers the folder names from the storage root, so a
//! freshly authenticated session can walk back to the same place.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

pub mod disk;
mod paths;
mod transfer;

pub use paths::{PathError, validate_name};
pub use transfer::{TransferClient, TransferError};

pub type ByteStream = Pin<Box<dyn AsyncRead + Send + Sync>>;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("temporarily unavailable: {0}")]
    Transient(String),
    #[error("session rejected: {0}")]
    Unauthorized(String),
    #[error("invalid remote name: {0}")]
    InvalidName(#[from] PathError),
    #[error("remote call failed: {0}")]
    Failed(String),
    #[error("local I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RemoteError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RemoteError::AlreadyExists(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RemoteError::NotFound(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::Transient(_) | RemoteError::Unauthorized(_)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FolderHandle {
    segments: Vec<String>,
}

impl FolderHandle {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for FolderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub folder: FolderHandle,
    pub name: String,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteNode {
    Folder(FolderHandle),
    File(FileHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[async_trait]
pub trait RemoteStorage: Send + Sync {
    fn root(&self) -> FolderHandle {
        FolderHandle::root()
    }

    async fn list(&self, folder: &FolderHandle) -> Result<Vec<RemoteEntry>, RemoteError>;

    async fn create_folder(&self, parent: &FolderHandle, name: &str) -> Result<(), RemoteError>;

    async fn child(&self, parent: &FolderHandle, name: &str) -> Result<RemoteNode, RemoteError>;

    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        body: ByteStream,
        size: u64,
    ) -> Result<(), RemoteError>;

    async fn delete_file(&self, file: &FileHandle) -> Result<(), RemoteError>;
}

/// Opens a brand-new session from stored credentials.
#[async_trait]
pub trait Reauthenticator<R: RemoteStorage>: Send + Sync {
    async fn reconnect(&self) -> Result<Arc<R>, RemoteError>;
}

/// Walks from `client`'s root down `segments`, requiring every hop to be a folder.
pub async fn navigate<R: RemoteStorage + ?Sized>(
    client: &R,
    segments: &[String],
) -> Result<FolderHandle, RemoteError> {
    let mut current = client.root();
    for segment in segments {
        current = match client.child(&current, segment).await? {
            RemoteNode::Folder(folder) => folder,
            RemoteNode::File(file) => {
                return Err(RemoteError::Failed(format!(
                    "{}/{} is a file, expected a folder",
                    file.folder, file.name
                )));
            }
        };
    }
    Ok(current)
}
