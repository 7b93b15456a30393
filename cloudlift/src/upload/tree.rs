use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::file::FileUploader;
use super::local::{LocalNode, read_children};
use super::report::{SuccessPolicy, UploadCounts, UploadReport};
use super::resolver::{FolderResolver, ResolutionOutcome, usable_child};
use crate::remote::{FolderHandle, RemoteError, RemoteStorage};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("local folder {0} does not exist or is not a directory")]
    LocalRoot(PathBuf),
    #[error("local folder {0} has no usable name, set a remote name explicitly")]
    UnnamedRoot(PathBuf),
    #[error("remote root {folder} is not accessible: {source}")]
    RemoteRoot {
        folder: FolderHandle,
        #[source]
        source: RemoteError,
    },
    #[error("remote folder {0} could not be created or accessed")]
    TargetUnresolvable(FolderHandle),
}

/// Walks a local tree and mirrors it into a remote folder, one entry at a time.
pub struct TreeUploader<R: RemoteStorage> {
    resolver: FolderResolver<R>,
    files: FileUploader,
    success_policy: SuccessPolicy,
    /// Canonical paths of the local folders currently being walked.
    ancestors: Vec<PathBuf>,
}

impl<R: RemoteStorage + 'static> TreeUploader<R> {
    pub fn new(
        resolver: FolderResolver<R>,
        files: FileUploader,
        success_policy: SuccessPolicy,
    ) -> Self {
        Self {
            resolver,
            files,
            success_policy,
            ancestors: Vec::new(),
        }
    }

    /// Uploads `local_root` as a folder named `remote_name` (or the local
    /// folder's own name) under `remote_root`.
    ///
    /// Only an unusable local root, an unreachable remote root or an
    /// unresolvable target folder abort the run. Everything below the target
    /// is best effort and shows up in the report counts.
    pub async fn upload_tree(
        &mut self,
        client: Arc<R>,
        remote_root: &FolderHandle,
        local_root: &Path,
        remote_name: Option<&str>,
    ) -> Result<UploadReport, UploadError> {
        match tokio::fs::metadata(local_root).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(UploadError::LocalRoot(local_root.to_path_buf())),
        }
        let name = match remote_name {
            Some(name) => name.to_string(),
            None => local_root
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
                .ok_or_else(|| UploadError::UnnamedRoot(local_root.to_path_buf()))?,
        };

        let entries = client
            .list(remote_root)
            .await
            .map_err(|source| UploadError::RemoteRoot {
                folder: remote_root.clone(),
                source,
            })?;
        info!(folder = %remote_root, items = entries.len(), "remote root reachable");

        let existing = existing_folder(client.as_ref(), remote_root, &name).await;
        let (client, target) = match existing {
            Some(target) => {
                info!(folder = %target, "uploading into existing remote folder");
                (client, target)
            }
            None => match self.resolver.resolve(&client, remote_root, &name).await {
                ResolutionOutcome::Resolved(resolved) => (resolved.client, resolved.folder),
                ResolutionOutcome::Unresolvable => {
                    return Err(UploadError::TargetUnresolvable(remote_root.child(&name)));
                }
            },
        };

        let counts = self
            .upload_contents(client, target.clone(), local_root.to_path_buf(), String::new())
            .await;
        let report = UploadReport {
            remote_folder: target.to_string(),
            success: self.success_policy.verdict(&counts),
            counts,
        };
        info!(
            folder = %target,
            succeeded = counts.succeeded,
            failed = counts.failed,
            oversized = counts.oversized,
            success = report.success,
            "upload finished"
        );
        Ok(report)
    }

    /// Uploads every entry of `local_dir` into `folder` and returns the
    /// counts summed over the whole subtree. `relative` is the path of
    /// `local_dir` below the upload root, used for log output only.
    pub fn upload_contents(
        &mut self,
        client: Arc<R>,
        folder: FolderHandle,
        local_dir: PathBuf,
        relative: String,
    ) -> BoxFuture<'_, UploadCounts> {
        async move {
            let children = match read_children(&local_dir).await {
                Ok(children) => children,
                Err(err) => {
                    warn!(path = %local_dir.display(), error = %err, "cannot read local folder");
                    return UploadCounts::failure();
                }
            };
            debug!(folder = %folder, items = children.len(), "processing folder");
            let real_dir = tokio::fs::canonicalize(&local_dir)
                .await
                .unwrap_or_else(|_| local_dir.clone());
            self.ancestors.push(real_dir);

            let mut counts = UploadCounts::default();
            for node in children {
                let display = join_relative(&relative, &node.name);
                if !node.is_dir() {
                    counts += self
                        .files
                        .upload(client.as_ref(), &folder, &node, &node.name, &display)
                        .await
                        .tally();
                    continue;
                }
                if loops_back(&self.ancestors, &node.path).await {
                    warn!(
                        path = %node.path.display(),
                        "folder links back to one of its parents, not following"
                    );
                    continue;
                }

                let existing = existing_folder(client.as_ref(), &folder, &node.name).await;
                if let Some(existing) = existing {
                    counts += self
                        .upload_contents(Arc::clone(&client), existing, node.path, display)
                        .await;
                    continue;
                }

                match self.resolver.resolve(&client, &folder, &node.name).await {
                    ResolutionOutcome::Resolved(resolved) => {
                        counts += self
                            .upload_contents(resolved.client, resolved.folder, node.path, display)
                            .await;
                    }
                    ResolutionOutcome::Unresolvable => {
                        counts += self
                            .flatten_into(client.as_ref(), &folder, &node, &relative)
                            .await;
                    }
                }
            }
            self.ancestors.pop();
            counts
        }
        .boxed()
    }

    /// Uploads the direct files of `dir` into `folder` as `{dir}_{file}`.
    /// Folders nested inside `dir` are not uploaded.
    async fn flatten_into(
        &mut self,
        client: &R,
        folder: &FolderHandle,
        dir: &LocalNode,
        relative: &str,
    ) -> UploadCounts {
        warn!(
            path = %join_relative(relative, &dir.name),
            folder = %folder,
            "remote folder unusable, flattening its files"
        );
        let children = match read_children(&dir.path).await {
            Ok(children) => children,
            Err(err) => {
                warn!(path = %dir.path.display(), error = %err, "cannot read local folder");
                return UploadCounts::failure();
            }
        };

        let mut counts = UploadCounts::default();
        for child in children {
            if child.is_dir() {
                warn!(
                    path = %child.path.display(),
                    "nested folder inside unusable remote folder is not uploaded"
                );
                continue;
            }
            let flat_name = format!("{}_{}", dir.name, child.name);
            let display = join_relative(relative, &flat_name);
            counts += self
                .files
                .upload(client, folder, &child, &flat_name, &display)
                .await
                .tally();
        }
        counts
    }
}

/// Finds a same-named remote folder that can already be listed. Lookup
/// errors of any kind count as "no such folder".
async fn existing_folder<R: RemoteStorage + ?Sized>(
    client: &R,
    parent: &FolderHandle,
    name: &str,
) -> Option<FolderHandle> {
    match usable_child(client, parent, name).await {
        Ok(folder) => Some(folder),
        Err(err) => {
            debug!(folder = %parent.child(name), error = %err, "no usable remote folder yet");
            None
        }
    }
}

async fn loops_back(ancestors: &[PathBuf], dir: &Path) -> bool {
    match tokio::fs::canonicalize(dir).await {
        Ok(real) => ancestors.contains(&real),
        Err(_) => false,
    }
}

fn join_relative(relative: &str, name: &str) -> String {
    if relative.is_empty() {
        name.to_string()
    } else {
        format!("{relative}/{name}")
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
