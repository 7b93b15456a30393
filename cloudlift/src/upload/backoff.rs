use std::time::Duration;

/// Linear wait schedule for letting a freshly created folder settle:
/// `base + step * attempt` before each of `attempts` tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleBackoff {
    base: Duration,
    step: Duration,
    attempts: u32,
}

impl SettleBackoff {
    pub fn new(base: Duration, step: Duration, attempts: u32) -> Self {
        Self {
            base,
            step,
            attempts,
        }
    }

    pub fn immediate(attempts: u32) -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_add(self.step.saturating_mul(attempt))
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.attempts).map(|attempt| self.delay(attempt))
    }
}

impl Default for SettleBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), Duration::from_secs(2), 3)
    }
}
