use serde::{Deserialize, Serialize};

/// Length of one sub-minute block, in seconds.
pub const BLOCK_SECONDS: u32 = 10;

/// Duration of day 1.
pub const DEFAULT_BASE_SECONDS: u32 = 60;

/// Seconds added for every completed day.
pub const DEFAULT_INCREMENT_SECONDS: u32 = 10;

/// The day-to-duration rule shared by the practice runner and the server.
///
/// Day `n` lasts `base + (n - 1) * increment` seconds. The day counter only
/// moves forward when a session is completed, so a user repeats the same
/// duration until they finish it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub base_seconds: u32,
    pub increment_seconds: u32,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            base_seconds: DEFAULT_BASE_SECONDS,
            increment_seconds: DEFAULT_INCREMENT_SECONDS,
        }
    }
}

impl Progression {
    pub fn new(base_seconds: u32, increment_seconds: u32) -> Self {
        Self {
            base_seconds,
            increment_seconds,
        }
    }

    /// Target duration in seconds for the given day. Day 0 is treated as day 1.
    pub fn duration_for(&self, day: u32) -> u32 {
        let extra_days = day.saturating_sub(1);
        self.base_seconds
            .saturating_add(extra_days.saturating_mul(self.increment_seconds))
    }
}
