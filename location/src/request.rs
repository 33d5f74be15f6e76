use serde::{Deserialize, Serialize};

const DEFAULT_INTERVAL_MS: u64 = 10_000;

/// Accuracy/power trade-off requested from the fusion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Most accurate fix available, GPS included.
    #[default]
    HighAccuracy,
    /// Block-level accuracy.
    BalancedPowerAccuracy,
    /// City-level accuracy.
    LowPower,
    /// Only fixes other applications already paid for.
    NoPower,
}

impl Priority {
    /// Android `Priority` constant.
    #[must_use]
    pub const fn android_code(self) -> i32 {
        match self {
            Self::HighAccuracy => 100,
            Self::BalancedPowerAccuracy => 102,
            Self::LowPower => 104,
            Self::NoPower => 105,
        }
    }
}

/// Cadence and accuracy of a location-update subscription.
///
/// When deserialized without `fastest_interval_ms`, the fastest interval is
/// half of `interval_ms`. It never exceeds `interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawLocationRequest")]
pub struct LocationRequest {
    /// Desired interval between updates, in milliseconds.
    pub interval_ms: u64,
    /// Fastest interval the application can handle, in milliseconds.
    pub fastest_interval_ms: u64,
    /// Requested accuracy.
    pub priority: Priority,
}

impl LocationRequest {
    /// A request for `interval_ms` that accepts updates twice as fast.
    #[must_use]
    pub const fn with_interval(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            fastest_interval_ms: interval_ms / 2,
            priority: Priority::HighAccuracy,
        }
    }

    /// Replaces the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::with_interval(DEFAULT_INTERVAL_MS)
    }
}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawLocationRequest {
    interval_ms: u64,
    fastest_interval_ms: Option<u64>,
    priority: Priority,
}

impl Default for RawLocationRequest {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            fastest_interval_ms: None,
            priority: Priority::default(),
        }
    }
}

impl From<RawLocationRequest> for LocationRequest {
    fn from(raw: RawLocationRequest) -> Self {
        let fastest = raw.fastest_interval_ms.unwrap_or(raw.interval_ms / 2);
        Self {
            interval_ms: raw.interval_ms,
            fastest_interval_ms: fastest.min(raw.interval_ms),
            priority: raw.priority,
        }
    }
}
