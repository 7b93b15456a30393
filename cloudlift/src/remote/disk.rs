use std::time::Duration;

use async_trait::async_trait;
use cloudlift_core::{ApiErrorClass, DiskClient, DiskError, OperationStatus, ResourceType};
use tracing::debug;

use super::paths::{remote_path_for, validate_name};
use super::transfer::{TransferClient, TransferError};
use super::{
    ByteStream, EntryKind, FileHandle, FolderHandle, RemoteEntry, RemoteError, RemoteNode,
    RemoteStorage,
};

const LIST_PAGE_SIZE: u32 = 200;
const OPERATION_POLL_ATTEMPTS: u32 = 10;
const OPERATION_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// [`RemoteStorage`] backed by the disk REST API.
pub struct DiskRemote {
    client: DiskClient,
    transfer: TransferClient,
    storage_root: String,
}

impl DiskRemote {
    pub fn new(client: DiskClient, storage_root: impl Into<String>) -> Self {
        Self {
            client,
            transfer: TransferClient::new(),
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &str {
        &self.storage_root
    }

    fn path_of(&self, folder: &FolderHandle, leaf: Option<&str>) -> Result<String, RemoteError> {
        Ok(remote_path_for(&self.storage_root, folder, leaf)?)
    }

    async fn wait_for_operation(&self, operation_url: &str) -> Result<(), RemoteError> {
        for _ in 0..OPERATION_POLL_ATTEMPTS {
            match self.client.get_operation_status(operation_url).await? {
                OperationStatus::Success => return Ok(()),
                OperationStatus::Failure => {
                    return Err(RemoteError::Failed(format!(
                        "operation {operation_url} reported failure"
                    )));
                }
                OperationStatus::InProgress => tokio::time::sleep(OPERATION_POLL_INTERVAL).await,
            }
        }
        Err(RemoteError::Transient(format!(
            "operation {operation_url} still in progress"
        )))
    }
}

#[async_trait]
impl RemoteStorage for DiskRemote {
    async fn list(&self, folder: &FolderHandle) -> Result<Vec<RemoteEntry>, RemoteError> {
        let path = self.path_of(folder, None)?;
        let items = self.client.list_directory_all(&path, LIST_PAGE_SIZE).await?;
        Ok(items
            .into_iter()
            .map(|item| RemoteEntry {
                name: item.name,
                kind: match item.resource_type {
                    ResourceType::File => EntryKind::File,
                    ResourceType::Dir => EntryKind::Folder,
                },
            })
            .collect())
    }

    async fn create_folder(&self, parent: &FolderHandle, name: &str) -> Result<(), RemoteError> {
        let path = self.path_of(parent, Some(name))?;
        debug!(path = %path, "creating remote folder");
        self.client.create_folder(&path).await?;
        Ok(())
    }

    async fn child(&self, parent: &FolderHandle, name: &str) -> Result<RemoteNode, RemoteError> {
        let path = self.path_of(parent, Some(name))?;
        let resource = self.client.get_resource(&path).await?;
        Ok(match resource.resource_type {
            ResourceType::Dir => RemoteNode::Folder(parent.child(name)),
            ResourceType::File => RemoteNode::File(FileHandle {
                folder: parent.clone(),
                name: name.to_string(),
                size: resource.size,
            }),
        })
    }

    async fn upload_file(
        &self,
        folder: &FolderHandle,
        name: &str,
        body: ByteStream,
        size: u64,
    ) -> Result<(), RemoteError> {
        let path = self.path_of(folder, Some(name))?;
        let link = self.client.get_upload_link(&path, false).await?;
        debug!(path = %path, size, "streaming upload");
        self.transfer
            .upload_stream(link.href.as_str(), &link.method, body, size)
            .await?;
        Ok(())
    }

    async fn delete_file(&self, file: &FileHandle) -> Result<(), RemoteError> {
        validate_name(&file.name)?;
        let path = self.path_of(&file.folder, Some(&file.name))?;
        if let Some(link) = self.client.delete_resource(&path, true).await? {
            self.wait_for_operation(link.href.as_str()).await?;
        }
        Ok(())
    }
}

impl From<DiskError> for RemoteError {
    fn from(err: DiskError) -> Self {
        if err.is_already_exists() {
            return RemoteError::AlreadyExists(err.to_string());
        }
        if err.is_not_found() {
            return RemoteError::NotFound(err.to_string());
        }
        match err.classification() {
            Some(ApiErrorClass::Auth) => RemoteError::Unauthorized(err.to_string()),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient) => {
                RemoteError::Transient(err.to_string())
            }
            Some(ApiErrorClass::Permanent) | None => RemoteError::Failed(err.to_string()),
        }
    }
}

impl From<TransferError> for RemoteError {
    fn from(err: TransferError) -> Self {
        match &err {
            TransferError::Request(inner) if inner.is_timeout() || inner.is_connect() => {
                RemoteError::Transient(err.to_string())
            }
            _ => RemoteError::Failed(err.to_string()),
        }
    }
}
