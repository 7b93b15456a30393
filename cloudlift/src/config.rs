use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::upload::{ConflictMode, SettleBackoff, SuccessPolicy};

const DEFAULT_REMOTE_ROOT: &str = "disk:/";
const DEFAULT_RETRY_BASE_SECS: u64 = 3;
const DEFAULT_RETRY_STEP_SECS: u64 = 2;
const DEFAULT_RETRY_ATTEMPTS: u64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub local_root: PathBuf,
    pub remote_name: Option<String>,
    pub remote_root: String,
    pub conflict_mode: ConflictMode,
    pub success_policy: SuccessPolicy,
    pub settle: SettleBackoff,
}

impl UploadConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = dirs::home_dir();
        let local_root = non_empty(&lookup, "CLOUDLIFT_LOCAL_DIR")
            .map(|value| expand_with_home(&value, home.as_deref()))
            .ok_or(ConfigError::Missing("CLOUDLIFT_LOCAL_DIR"))?;
        let remote_name = non_empty(&lookup, "CLOUDLIFT_REMOTE_NAME");
        let remote_root = non_empty(&lookup, "CLOUDLIFT_REMOTE_ROOT")
            .unwrap_or_else(|| DEFAULT_REMOTE_ROOT.to_string());
        let conflict_mode = match non_empty(&lookup, "CLOUDLIFT_CONFLICT_MODE") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "CLOUDLIFT_CONFLICT_MODE",
                value,
            })?,
            None => ConflictMode::default(),
        };
        let success_policy = if read_bool(&lookup, "CLOUDLIFT_STRICT_SUCCESS", false) {
            SuccessPolicy::NoFailures
        } else {
            SuccessPolicy::AnySucceeded
        };
        let base = read_u64(&lookup, "CLOUDLIFT_RETRY_BASE_SECS", DEFAULT_RETRY_BASE_SECS);
        let step = read_u64(&lookup, "CLOUDLIFT_RETRY_STEP_SECS", DEFAULT_RETRY_STEP_SECS);
        let attempts = read_u64(&lookup, "CLOUDLIFT_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS);
        let settle = SettleBackoff::new(
            Duration::from_secs(base),
            Duration::from_secs(step),
            attempts.min(u64::from(u32::MAX)) as u32,
        );

        Ok(Self {
            local_root,
            remote_name,
            remote_root,
            conflict_mode,
            success_policy,
            settle,
        })
    }
}

pub(crate) fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn expand_with_home(value: &str, home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) if value == "~" => home.to_path_buf(),
        Some(home) => match value.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}

fn read_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn read_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
