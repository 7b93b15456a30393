use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tracing::{info, warn};

use crate::remote::{FolderHandle, RemoteNode, RemoteStorage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictMode {
    #[default]
    Skip,
    Overwrite,
    Ask,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conflict mode {0:?}")]
pub struct UnknownConflictMode(pub String);

impl FromStr for ConflictMode {
    type Err = UnknownConflictMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ConflictMode::Skip),
            "overwrite" => Ok(ConflictMode::Overwrite),
            "ask" => Ok(ConflictMode::Ask),
            _ => Err(UnknownConflictMode(value.to_string())),
        }
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictMode::Skip => "skip",
            ConflictMode::Overwrite => "overwrite",
            ConflictMode::Ask => "ask",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    Skip,
    Overwrite,
    SkipAll,
    OverwriteAll,
}

impl PromptChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "s" => Some(PromptChoice::Skip),
            "o" => Some(PromptChoice::Overwrite),
            "sa" => Some(PromptChoice::SkipAll),
            "oa" => Some(PromptChoice::OverwriteAll),
            _ => None,
        }
    }

    pub fn overwrites(self) -> bool {
        matches!(self, PromptChoice::Overwrite | PromptChoice::OverwriteAll)
    }

    fn is_sticky(self) -> bool {
        matches!(self, PromptChoice::SkipAll | PromptChoice::OverwriteAll)
    }
}

/// Asks someone what to do about one existing remote file.
#[async_trait]
pub trait ConflictPrompt: Send {
    async fn choose(&mut self, display_path: &str) -> PromptChoice;
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedPrompt(pub PromptChoice);

#[async_trait]
impl ConflictPrompt for FixedPrompt {
    async fn choose(&mut self, _display_path: &str) -> PromptChoice {
        self.0
    }
}

/// Line-oriented prompt: `s`, `o`, `sa`, `oa`. End of input means skip.
pub struct LinePrompt<R> {
    reader: R,
}

impl LinePrompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> LinePrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R> ConflictPrompt for LinePrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn choose(&mut self, display_path: &str) -> PromptChoice {
        loop {
            eprint!(
                "{display_path} already exists. s=skip, o=overwrite, sa=skip all, oa=overwrite all: "
            );
            let mut line = String::new();
            match self.reader.read_line(&mut line).await {
                Ok(0) => {
                    info!(path = display_path, "no input available, skipping");
                    return PromptChoice::Skip;
                }
                Ok(_) => match PromptChoice::parse(&line) {
                    Some(choice) => return choice,
                    None => warn!(input = line.trim(), "invalid choice, expected s, o, sa or oa"),
                },
                Err(err) => {
                    warn!(error = %err, "failed to read choice, skipping");
                    return PromptChoice::Skip;
                }
            }
        }
    }
}

/// Remembers a "skip all" / "overwrite all" answer for the rest of the run.
pub struct StickyPrompt<P> {
    inner: P,
    sticky: Option<PromptChoice>,
}

impl<P: ConflictPrompt> StickyPrompt<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            sticky: None,
        }
    }

    pub fn sticky_choice(&self) -> Option<PromptChoice> {
        self.sticky
    }
}

#[async_trait]
impl<P: ConflictPrompt> ConflictPrompt for StickyPrompt<P> {
    async fn choose(&mut self, display_path: &str) -> PromptChoice {
        if let Some(choice) = self.sticky {
            return choice;
        }
        let choice = self.inner.choose(display_path).await;
        if choice.is_sticky() {
            self.sticky = Some(choice);
        }
        choice
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictDecision {
    Proceed,
    Skip,
    Overwrite(RemoteNode),
}

pub struct ConflictPolicy {
    mode: ConflictMode,
    prompt: Box<dyn ConflictPrompt>,
}

impl ConflictPolicy {
    pub fn new(mode: ConflictMode, prompt: Box<dyn ConflictPrompt>) -> Self {
        Self { mode, prompt }
    }

    /// Policy for modes that never consult a prompt; `ask` falls back to skipping.
    pub fn unattended(mode: ConflictMode) -> Self {
        Self::new(mode, Box::new(FixedPrompt(PromptChoice::Skip)))
    }

    pub fn mode(&self) -> ConflictMode {
        self.mode
    }

    pub async fn decide<R: RemoteStorage + ?Sized>(
        &mut self,
        client: &R,
        folder: &FolderHandle,
        name: &str,
        display_path: &str,
    ) -> ConflictDecision {
        let existing = match client.child(folder, name).await {
            Ok(node) => node,
            Err(err) if err.is_absent() => return ConflictDecision::Proceed,
            Err(err) => {
                warn!(path = display_path, error = %err, "lookup failed, treating as absent");
                return ConflictDecision::Proceed;
            }
        };
        match self.mode {
            ConflictMode::Skip => ConflictDecision::Skip,
            ConflictMode::Overwrite => ConflictDecision::Overwrite(existing),
            ConflictMode::Ask => {
                if self.prompt.choose(display_path).await.overwrites() {
                    ConflictDecision::Overwrite(existing)
                } else {
                    ConflictDecision::Skip
                }
            }
        }
    }
}
