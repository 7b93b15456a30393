use std::path::{Component, Path};

use thiserror::Error;

use super::FolderHandle;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("name is empty")]
    Empty,
    #[error("name {0:?} contains a path separator or relative component")]
    UnsupportedComponent(String),
}

pub fn validate_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::Empty);
    }
    if name.contains('/') {
        return Err(PathError::UnsupportedComponent(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(PathError::UnsupportedComponent(name.to_string())),
    }
}

/// Maps a logical folder (plus an optional leaf) under a storage root such as `disk:/`.
pub fn remote_path_for(
    root: &str,
    folder: &FolderHandle,
    leaf: Option<&str>,
) -> Result<String, PathError> {
    let mut out = root.trim_end_matches('/').to_string();
    for segment in folder.segments().iter().map(String::as_str).chain(leaf) {
        validate_name(segment)?;
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() || out.ends_with(':') {
        out.push('/');
    }
    Ok(out)
}
