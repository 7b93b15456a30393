//! Recursive upload of a local folder into remote storage.
//!
//! [`TreeUploader`] walks the local tree top-down. Files go through
//! [`FileUploader`] and its [`ConflictPolicy`]; folders go through
//! [`FolderResolver`], which keeps trying until a created folder can actually
//! be listed. When a folder never becomes usable its direct files are
//! uploaded next to it under `{folder}_{file}` names.

mod backoff;
mod conflict;
mod file;
mod local;
mod report;
mod resolver;
mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use backoff::SettleBackoff;
pub use conflict::{
    ConflictDecision, ConflictMode, ConflictPolicy, ConflictPrompt, FixedPrompt, LinePrompt,
    PromptChoice, StickyPrompt, UnknownConflictMode,
};
pub use file::{FileOutcome, FileUploader, MAX_UPLOAD_BYTES};
pub use local::{LocalKind, LocalNode, PreviewLine, preview, read_children};
pub use report::{SuccessPolicy, UploadCounts, UploadReport};
pub use resolver::{FolderResolver, ResolutionOutcome, ResolutionTier, ResolvedFolder};
pub use tree::{TreeUploader, UploadError};
