use tracing::{info, warn};

use super::conflict::{ConflictDecision, ConflictPolicy};
use super::local::LocalNode;
use super::report::UploadCounts;
use crate::remote::{FolderHandle, RemoteError, RemoteNode, RemoteStorage};

pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Uploaded,
    Replaced,
    SkippedExisting,
    SkippedOversize,
    Failed,
}

impl FileOutcome {
    pub fn counts_as_success(self) -> bool {
        matches!(
            self,
            FileOutcome::Uploaded | FileOutcome::Replaced | FileOutcome::SkippedExisting
        )
    }

    pub fn tally(self) -> UploadCounts {
        let mut counts = UploadCounts::default();
        match self {
            FileOutcome::SkippedOversize => counts.oversized = 1,
            FileOutcome::Failed => counts.failed = 1,
            _ => counts.succeeded = 1,
        }
        counts
    }
}

pub fn within_upload_limit(size: u64) -> bool {
    size <= MAX_UPLOAD_BYTES
}

pub struct FileUploader {
    policy: ConflictPolicy,
}

impl FileUploader {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    /// Uploads `local` into `folder` as `remote_name`. Never fails: every
    /// problem is logged and reported as [`FileOutcome::Failed`].
    pub async fn upload<R: RemoteStorage + ?Sized>(
        &mut self,
        client: &R,
        folder: &FolderHandle,
        local: &LocalNode,
        remote_name: &str,
        display_path: &str,
    ) -> FileOutcome {
        if !within_upload_limit(local.size) {
            warn!(
                path = display_path,
                size = local.size,
                limit = MAX_UPLOAD_BYTES,
                "file too large, not uploading"
            );
            return FileOutcome::SkippedOversize;
        }

        let replacing = match self
            .policy
            .decide(client, folder, remote_name, display_path)
            .await
        {
            ConflictDecision::Proceed => false,
            ConflictDecision::Skip => {
                info!(path = display_path, "already exists, skipped");
                return FileOutcome::SkippedExisting;
            }
            ConflictDecision::Overwrite(existing) => {
                if let Err(err) = remove_existing(client, &existing).await {
                    warn!(path = display_path, error = %err, "failed to remove existing file");
                    return FileOutcome::Failed;
                }
                info!(path = display_path, "removed existing file");
                true
            }
        };

        match stream_file(client, folder, local, remote_name).await {
            Ok(()) => {
                info!(path = display_path, size = local.size, "uploaded");
                if replacing {
                    FileOutcome::Replaced
                } else {
                    FileOutcome::Uploaded
                }
            }
            Err(err) => {
                warn!(path = display_path, error = %err, "upload failed");
                FileOutcome::Failed
            }
        }
    }
}

async fn remove_existing<R: RemoteStorage + ?Sized>(
    client: &R,
    existing: &RemoteNode,
) -> Result<(), RemoteError> {
    match existing {
        RemoteNode::File(file) => client.delete_file(file).await,
        RemoteNode::Folder(folder) => Err(RemoteError::Failed(format!(
            "{folder} is a folder and cannot be replaced by a file"
        ))),
    }
}

async fn stream_file<R: RemoteStorage + ?Sized>(
    client: &R,
    folder: &FolderHandle,
    local: &LocalNode,
    remote_name: &str,
) -> Result<(), RemoteError> {
    let file = tokio::fs::File::open(&local.path).await?;
    client
        .upload_file(folder, remote_name, Box::pin(file), local.size)
        .await
}
