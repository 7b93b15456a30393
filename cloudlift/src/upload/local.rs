use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    File,
    Directory,
}

/// Snapshot of one local entry taken when its parent is enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNode {
    pub path: PathBuf,
    pub name: String,
    pub kind: LocalKind,
    pub size: u64,
}

impl LocalNode {
    pub fn is_dir(&self) -> bool {
        self.kind == LocalKind::Directory
    }
}

/// Lists the direct children of `dir` in the filesystem's enumeration order.
/// Symlinks are followed; entries that are neither files nor directories, or
/// whose names are not valid UTF-8, are left out.
pub async fn read_children(dir: &Path) -> io::Result<Vec<LocalNode>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut nodes = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            warn!(path = %entry.path().display(), "skipping entry with non UTF-8 name");
            continue;
        };
        let path = entry.path();
        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let kind = if meta.is_dir() {
            LocalKind::Directory
        } else if meta.is_file() {
            LocalKind::File
        } else {
            continue;
        };
        nodes.push(LocalNode {
            path,
            name,
            kind,
            size: if kind == LocalKind::File { meta.len() } else { 0 },
        });
    }
    Ok(nodes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewLine {
    File { name: String, size: u64 },
    Directory { name: String, children: usize },
}

impl PreviewLine {
    pub fn render(&self) -> String {
        match self {
            PreviewLine::File { name, size } => {
                format!("{name} ({:.2} MB)", *size as f64 / (1024.0 * 1024.0))
            }
            PreviewLine::Directory { name, children } => format!("{name}/ ({children} items)"),
        }
    }
}

/// One line per direct child of `dir`, for showing what is about to be uploaded.
pub async fn preview(dir: &Path) -> io::Result<Vec<PreviewLine>> {
    let mut lines = Vec::new();
    for node in read_children(dir).await? {
        lines.push(match node.kind {
            LocalKind::File => PreviewLine::File {
                name: node.name,
                size: node.size,
            },
            LocalKind::Directory => PreviewLine::Directory {
                children: read_children(&node.path).await.map(|c| c.len()).unwrap_or(0),
                name: node.name,
            },
        });
    }
    Ok(lines)
}
