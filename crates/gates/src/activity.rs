//! Advisory detection of suspicious usage patterns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::Clock;
use crate::statemap::StateMap;
use crate::window::SlidingWindow;

/// Window for the rapid-capability-switching pattern.
pub const SWITCH_WINDOW: Duration = Duration::from_secs(10);
/// Distinct capabilities within [`SWITCH_WINDOW`] before flagging.
pub const SWITCH_THRESHOLD: usize = 10;
/// Window for the repeated-error patterns.
pub const ERROR_WINDOW: Duration = Duration::from_secs(60);
/// Validation errors within [`ERROR_WINDOW`] before flagging.
pub const VALIDATION_THRESHOLD: usize = 5;
/// Permission denials within [`ERROR_WINDOW`] before flagging.
pub const PERMISSION_THRESHOLD: usize = 3;
/// Ownership denials within [`ERROR_WINDOW`] before flagging.
pub const OWNERSHIP_THRESHOLD: usize = 3;

/// Error classes tracked for pattern detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Permission,
    Ownership,
}

/// How many patterns fired at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

/// Report from a suspicious-pattern probe.
///
/// Advisory only: the surrounding application decides what to do with it
/// (extra logging, elevated scrutiny, manual review). It never denies calls.
#[derive(Debug, Clone, Serialize)]
pub struct PatternReport {
    pub suspicious: bool,
    pub patterns: Vec<&'static str>,
    pub severity: Severity,
}

#[derive(Debug, Default)]
struct CallerActivity {
    calls: HashMap<String, SlidingWindow>,
    validation_errors: SlidingWindow,
    permission_errors: SlidingWindow,
    ownership_errors: SlidingWindow,
}

/// Per-caller capability-call and error history.
pub struct ActivityMonitor {
    clock: Arc<dyn Clock>,
    callers: StateMap<String, CallerActivity>,
}

impl ActivityMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            callers: StateMap::new(),
        }
    }

    /// Record one capability call.
    pub fn record_call(&self, caller_id: &str, capability: &str) {
        let now = self.clock.now();
        self.callers.with(caller_id.to_string(), |activity| {
            let window = activity.calls.entry(capability.to_string()).or_default();
            window.prune(now, SWITCH_WINDOW);
            window.record(now);
        });
    }

    /// Record one classified error.
    pub fn record_error(&self, caller_id: &str, kind: ErrorKind) {
        let now = self.clock.now();
        self.callers.with(caller_id.to_string(), |activity| {
            let window = match kind {
                ErrorKind::Validation => &mut activity.validation_errors,
                ErrorKind::Permission => &mut activity.permission_errors,
                ErrorKind::Ownership => &mut activity.ownership_errors,
            };
            window.prune(now, ERROR_WINDOW);
            window.record(now);
        });
    }

    /// Probe for suspicious patterns in a caller's recent history.
    pub fn check(&self, caller_id: &str) -> PatternReport {
        let now = self.clock.now();
        let mut patterns = Vec::new();

        self.callers.with(caller_id.to_string(), |activity| {
            let mut distinct = 0usize;
            for window in activity.calls.values_mut() {
                window.prune(now, SWITCH_WINDOW);
                if !window.is_empty() {
                    distinct += 1;
                }
            }
            if distinct >= SWITCH_THRESHOLD {
                patterns.push("rapid_capability_switching");
            }

            let mut check_errors = |window: &mut SlidingWindow, threshold, name| {
                window.prune(now, ERROR_WINDOW);
                if window.len() >= threshold {
                    patterns.push(name);
                }
            };
            check_errors(
                &mut activity.validation_errors,
                VALIDATION_THRESHOLD,
                "repeated_validation_errors",
            );
            check_errors(
                &mut activity.permission_errors,
                PERMISSION_THRESHOLD,
                "repeated_permission_denials",
            );
            check_errors(
                &mut activity.ownership_errors,
                OWNERSHIP_THRESHOLD,
                "repeated_ownership_denials",
            );
        });

        let severity = match patterns.len() {
            0 => Severity::None,
            1 => Severity::Low,
            2 => Severity::Medium,
            _ => Severity::High,
        };

        if severity > Severity::None {
            tracing::warn!(caller_id, ?patterns, ?severity, "suspicious activity");
        }

        PatternReport {
            suspicious: !patterns.is_empty(),
            patterns,
            severity,
        }
    }

    /// Drop callers with no activity inside the longest pattern window.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let longest = SWITCH_WINDOW.max(ERROR_WINDOW);

        self.callers.retain(|_, activity| {
            activity.calls.retain(|_, window| {
                window.prune(now, longest);
                !window.is_empty()
            });
            for window in [
                &mut activity.validation_errors,
                &mut activity.permission_errors,
                &mut activity.ownership_errors,
            ] {
                window.prune(now, longest);
            }
            !activity.calls.is_empty()
                || !activity.validation_errors.is_empty()
                || !activity.permission_errors.is_empty()
                || !activity.ownership_errors.is_empty()
        })
    }
}
