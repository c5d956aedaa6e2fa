//! Rate categories and their window limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bucket a capability's call frequency is accounted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateCategory {
    /// Read-only introspection.
    Read,
    /// Session-scoped mutation.
    Session,
    /// Long-running analysis operations.
    Analysis,
    /// Persistence-backed CRUD.
    Persistence,
    /// Anything without an explicit category.
    Default,
}

impl RateCategory {
    pub const ALL: [RateCategory; 5] = [
        RateCategory::Read,
        RateCategory::Session,
        RateCategory::Analysis,
        RateCategory::Persistence,
        RateCategory::Default,
    ];
}

/// Window limits for one rate category.
///
/// The burst window is a shorter, stricter window nested inside the main
/// window; it is checked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub window: Duration,
    pub max: u32,
    pub burst_window: Duration,
    pub burst_max: u32,
}

impl RateLimits {
    pub const fn new(window: Duration, max: u32, burst_window: Duration, burst_max: u32) -> Self {
        Self {
            window,
            max,
            burst_window,
            burst_max,
        }
    }

    /// Built-in limits for a category, used when no TOML override is given.
    pub fn builtin(category: RateCategory) -> Self {
        const MINUTE: Duration = Duration::from_secs(60);
        const SECOND: Duration = Duration::from_secs(1);
        match category {
            RateCategory::Read => Self::new(MINUTE, 60, SECOND, 10),
            RateCategory::Session => Self::new(MINUTE, 30, SECOND, 5),
            RateCategory::Analysis => Self::new(MINUTE, 5, Duration::from_secs(10), 2),
            RateCategory::Persistence => Self::new(MINUTE, 20, SECOND, 5),
            RateCategory::Default => Self::new(MINUTE, 30, SECOND, 10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_window_nested_in_main_window() {
        for category in RateCategory::ALL {
            let limits = RateLimits::builtin(category);
            assert!(limits.burst_window < limits.window, "{category:?}");
            assert!(limits.burst_max < limits.max, "{category:?}");
        }
    }
}
