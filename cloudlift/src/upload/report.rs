use std::fmt;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadCounts {
    pub succeeded: usize,
    pub failed: usize,
    /// Files over the size ceiling; counted in neither total above.
    pub oversized: usize,
}

impl UploadCounts {
    pub fn failure() -> Self {
        Self {
            failed: 1,
            ..Self::default()
        }
    }
}

impl AddAssign for UploadCounts {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.oversized += other.oversized;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// The run succeeded if anything landed remotely.
    #[default]
    AnySucceeded,
    NoFailures,
}

impl SuccessPolicy {
    pub fn verdict(self, counts: &UploadCounts) -> bool {
        match self {
            SuccessPolicy::AnySucceeded => counts.succeeded > 0,
            SuccessPolicy::NoFailures => counts.failed == 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub remote_folder: String,
    pub counts: UploadCounts,
    pub success: bool,
}

impl fmt::Display for UploadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} succeeded, {} failed, {} over size limit ({})",
            self.remote_folder,
            self.counts.succeeded,
            self.counts.failed,
            self.counts.oversized,
            if self.success { "success" } else { "failure" }
        )
    }
}
