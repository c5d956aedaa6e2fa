//! Multi-scope sliding-window rate limiting.
//!
//! Checks run in a fixed order: network address, global window, then the
//! per-(caller, capability) category limits with the violation penalty
//! applied. Quota is charged at admission time: a call that later fails in
//! its handler still consumed its slot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use catalog::Catalog;
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;
use crate::statemap::StateMap;
use crate::window::SlidingWindow;

/// Per-address window before an automatic block.
pub const ADDRESS_WINDOW: Duration = Duration::from_secs(60);
/// Calls per address per window before the address is blocked.
pub const ADDRESS_MAX: u32 = 100;
/// How long an abusive address stays blocked.
pub const ADDRESS_BLOCK: Duration = Duration::from_secs(300);

/// Process-wide window across all callers and addresses.
pub const GLOBAL_WINDOW: Duration = Duration::from_secs(60);
/// Calls per global window.
pub const GLOBAL_MAX: u32 = 1000;
/// Fixed retry hint when the global window is saturated.
pub const GLOBAL_RETRY: Duration = Duration::from_secs(5);

/// Quiet time after which a stored violation decays by one.
pub const VIOLATION_DECAY: Duration = Duration::from_secs(3600);
/// Penalty base: effective limits divide by `multiplier^violations`.
pub const PENALTY_MULTIPLIER: f64 = 2.0;
/// Policy cap on the penalty divisor. A heuristic ceiling, not derived.
pub const MAX_PENALTY_DIVISOR: f64 = 16.0;

/// Outcome of a rate check.
#[derive(Debug, Clone, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub violation_level: u32,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
            reason: None,
            violation_level: 0,
        }
    }

    fn deny(reason: impl Into<String>, retry_after: Duration, violation_level: u32) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
            reason: Some(reason.into()),
            violation_level,
        }
    }
}

/// Current window usage for one (caller, capability) pair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RateStatus {
    pub used: u32,
    pub max: u32,
    pub remaining: u32,
    pub violations: u32,
}

/// What one GC sweep removed.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SweepStats {
    pub callers_removed: usize,
    pub addresses_removed: usize,
}

#[derive(Debug, Default)]
struct CallerWindow {
    window: SlidingWindow,
    violations: u32,
    last_violation: Option<Instant>,
}

impl CallerWindow {
    /// Decay one stored violation after a quiet period, then record a new one.
    fn record_violation(&mut self, now: Instant) {
        if let Some(last) = self.last_violation {
            if now.duration_since(last) > VIOLATION_DECAY {
                self.violations = self.violations.saturating_sub(1);
            }
        }
        self.violations += 1;
        self.last_violation = Some(now);
    }
}

#[derive(Debug, Default)]
struct AddressState {
    window: SlidingWindow,
    blocked_until: Option<Instant>,
}

/// Sliding-window rate limiter with violation-adaptive penalties.
pub struct RateGate {
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    callers: StateMap<(String, String), CallerWindow>,
    addresses: StateMap<String, AddressState>,
    global: Mutex<SlidingWindow>,
}

impl RateGate {
    pub fn new(catalog: Arc<Catalog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            catalog,
            clock,
            callers: StateMap::new(),
            addresses: StateMap::new(),
            global: Mutex::new(SlidingWindow::new()),
        }
    }

    /// Check whether a call is admitted, charging its quota slot if so.
    pub fn check(
        &self,
        caller_id: &str,
        capability: &str,
        network_address: Option<&str>,
    ) -> RateDecision {
        let now = self.clock.now();

        if let Some(address) = network_address {
            if let Some(denied) = self.check_address(address, now) {
                return denied;
            }
        }

        if let Some(denied) = self.check_global(now) {
            return denied;
        }

        self.check_caller(caller_id, capability, now)
    }

    fn check_address(&self, address: &str, now: Instant) -> Option<RateDecision> {
        self.addresses.with(address.to_string(), |state| {
            if let Some(until) = state.blocked_until {
                if now < until {
                    return Some(RateDecision::deny(
                        format!("address {address} is blocked"),
                        until - now,
                        0,
                    ));
                }
                // Block expired: history resets with it.
                state.blocked_until = None;
                state.window.clear();
            }

            state.window.prune(now, ADDRESS_WINDOW);
            if state.window.len() >= ADDRESS_MAX as usize {
                state.blocked_until = Some(now + ADDRESS_BLOCK);
                tracing::warn!(address, "address exceeded rate ceiling, blocking");
                return Some(RateDecision::deny(
                    format!("address {address} is blocked"),
                    ADDRESS_BLOCK,
                    0,
                ));
            }

            state.window.record(now);
            None
        })
    }

    fn check_global(&self, now: Instant) -> Option<RateDecision> {
        let mut global = self.global.lock();
        global.prune(now, GLOBAL_WINDOW);
        if global.len() >= GLOBAL_MAX as usize {
            tracing::warn!("global rate ceiling reached");
            return Some(RateDecision::deny(
                "global rate limit exceeded",
                GLOBAL_RETRY,
                0,
            ));
        }
        global.record(now);
        None
    }

    fn check_caller(&self, caller_id: &str, capability: &str, now: Instant) -> RateDecision {
        let category = self.catalog.descriptor(capability).rate_category;
        let limits = self.catalog.limits(category);
        let key = (caller_id.to_string(), capability.to_string());

        self.callers.with(key, |state| {
            let divisor = penalty_divisor(state.violations);
            let max = effective_limit(limits.max, divisor);
            let burst_max = effective_limit(limits.burst_max, divisor);

            state.window.prune(now, limits.window);

            // Burst sub-window first: shorter duration, smaller ceiling.
            let burst_used = state.window.count_within(now, limits.burst_window);
            if burst_used >= burst_max as usize {
                state.record_violation(now);
                let retry = state
                    .window
                    .oldest_within(now, limits.burst_window)
                    .map(|oldest| limits.burst_window - now.duration_since(oldest))
                    .unwrap_or(limits.burst_window);
                tracing::debug!(caller_id, capability, violations = state.violations, "burst limit exceeded");
                return RateDecision::deny(
                    format!("burst limit exceeded for '{capability}'"),
                    retry,
                    state.violations,
                );
            }

            if state.window.len() >= max as usize {
                state.record_violation(now);
                let retry = state
                    .window
                    .oldest()
                    .map(|oldest| limits.window - now.duration_since(oldest))
                    .unwrap_or(limits.window);
                tracing::debug!(caller_id, capability, violations = state.violations, "rate limit exceeded");
                return RateDecision::deny(
                    format!("rate limit exceeded for '{capability}'"),
                    retry,
                    state.violations,
                );
            }

            state.window.record(now);
            RateDecision::allow()
        })
    }

    /// Current usage against the effective (penalty-adjusted) limit.
    pub fn status(&self, caller_id: &str, capability: &str) -> RateStatus {
        let now = self.clock.now();
        let category = self.catalog.descriptor(capability).rate_category;
        let limits = self.catalog.limits(category);
        let key = (caller_id.to_string(), capability.to_string());

        self.callers.with(key, |state| {
            state.window.prune(now, limits.window);
            let max = effective_limit(limits.max, penalty_divisor(state.violations));
            let used = state.window.len() as u32;
            RateStatus {
                used,
                max,
                remaining: max.saturating_sub(used),
                violations: state.violations,
            }
        })
    }

    /// Clear rate state for one capability, or for every capability of a
    /// caller when `capability` is `None`.
    pub fn reset(&self, caller_id: &str, capability: Option<&str>) {
        match capability {
            Some(capability) => {
                self.callers
                    .remove(&(caller_id.to_string(), capability.to_string()));
            }
            None => {
                self.callers.retain(|(id, _), _| id.as_str() != caller_id);
            }
        }
    }

    /// Administratively block an address.
    pub fn block_address(&self, address: &str, duration: Duration) {
        let until = self.clock.now() + duration;
        self.addresses.with(address.to_string(), |state| {
            state.blocked_until = Some(until);
        });
        tracing::warn!(address, ?duration, "address blocked");
    }

    /// Lift an address block and clear its history.
    pub fn unblock_address(&self, address: &str) {
        self.addresses.remove(&address.to_string());
        tracing::info!(address, "address unblocked");
    }

    /// Whether an address is currently blocked.
    pub fn is_address_blocked(&self, address: &str) -> bool {
        let now = self.clock.now();
        self.addresses
            .with_existing(&address.to_string(), |state| {
                state.blocked_until.is_some_and(|until| now < until)
            })
            .unwrap_or(false)
    }

    /// Drop entries with no timestamps inside the longest window and no
    /// live violations or blocks.
    pub fn sweep(&self) -> SweepStats {
        let now = self.clock.now();
        let longest = self.catalog.longest_window();

        let callers_removed = self.callers.retain(|_, state| {
            state.window.prune(now, longest);
            !state.window.is_empty() || state.violations > 0
        });

        let addresses_removed = self.addresses.retain(|_, state| {
            state.window.prune(now, ADDRESS_WINDOW);
            let blocked = state.blocked_until.is_some_and(|until| now < until);
            !state.window.is_empty() || blocked
        });

        self.global.lock().prune(now, GLOBAL_WINDOW);

        let stats = SweepStats {
            callers_removed,
            addresses_removed,
        };
        tracing::debug!(?stats, "rate state sweep");
        stats
    }
}

/// `min(multiplier^violations, cap)`, 1.0 when there are no violations.
fn penalty_divisor(violations: u32) -> f64 {
    if violations == 0 {
        return 1.0;
    }
    PENALTY_MULTIPLIER
        .powi(violations.min(64) as i32)
        .min(MAX_PENALTY_DIVISOR)
}

/// `max(1, floor(limit / divisor))`: non-increasing in violations,
/// never below one.
fn effective_limit(limit: u32, divisor: f64) -> u32 {
    ((limit as f64 / divisor).floor() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn gate() -> (RateGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let gate = RateGate::new(Arc::new(Catalog::builtin()), clock.clone());
        (gate, clock)
    }

    const SEC: Duration = Duration::from_secs(1);
    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn burst_ceiling_denies_eleventh_call() {
        // Read category: 60/min, burst 10/s.
        let (gate, clock) = gate();
        for _ in 0..10 {
            assert!(gate.check("u1", "list_files", None).allowed);
            clock.advance(Duration::from_millis(50));
        }
        let denied = gate.check("u1", "list_files", None);
        assert!(!denied.allowed);
        assert!(denied.reason.unwrap().contains("burst"));
        assert_eq!(denied.violation_level, 1);
    }

    #[test]
    fn window_ceiling_denies_sixty_first_call() {
        let (gate, clock) = gate();
        // One call per second stays under the burst ceiling; all 60 calls
        // land inside a 59-second span.
        for i in 0..60 {
            assert!(gate.check("u1", "list_files", None).allowed, "call {i}");
            if i < 59 {
                clock.advance(SEC);
            }
        }
        clock.advance(Duration::from_millis(500));
        let denied = gate.check("u1", "list_files", None);
        assert!(!denied.allowed);
        assert!(denied.reason.unwrap().contains("rate limit"));
        // Oldest call exits the window in ~0.5s.
        let retry = denied.retry_after.unwrap();
        assert!(retry <= SEC && retry > Duration::ZERO);
    }

    #[test]
    fn violation_decays_after_quiet_hour() {
        let (gate, clock) = gate();
        for _ in 0..10 {
            gate.check("u1", "list_files", None);
        }
        let denied = gate.check("u1", "list_files", None);
        assert_eq!(denied.violation_level, 1);

        // Over an hour of silence, then trip the (penalty-halved) burst
        // ceiling again: the stored violation decays by one before the new
        // one is recorded, so the level is 1 rather than 2.
        clock.advance(VIOLATION_DECAY + SEC);
        for _ in 0..5 {
            assert!(gate.check("u1", "list_files", None).allowed);
            clock.advance(MS);
        }
        let denied = gate.check("u1", "list_files", None);
        assert!(!denied.allowed);
        assert_eq!(denied.violation_level, 1);
    }

    #[test]
    fn penalty_formula_monotonic_and_floored() {
        let mut previous = u32::MAX;
        for v in 0..12 {
            let effective = effective_limit(60, penalty_divisor(v));
            assert!(effective <= previous);
            assert!(effective >= 1);
            previous = effective;
        }
        // Cap: divisor never exceeds MAX_PENALTY_DIVISOR.
        assert_eq!(effective_limit(60, penalty_divisor(30)), 60 / 16);
    }

    #[test]
    fn penalty_tightens_effective_limits() {
        let (gate, clock) = gate();
        // Read burst is 10; earn two violations.
        for _ in 0..12 {
            gate.check("u1", "list_files", None);
            clock.advance(MS);
        }
        let status = gate.status("u1", "list_files");
        assert!(status.violations >= 1);
        assert!(status.max < 60);
    }

    #[test]
    fn address_blocked_at_ceiling_and_recovers() {
        let (gate, clock) = gate();
        // Distinct callers so per-caller limits never interfere.
        for i in 0..100 {
            let caller = format!("u{i}");
            let decision = gate.check(&caller, "list_files", Some("10.0.0.9"));
            assert!(decision.allowed, "call {i}");
            clock.advance(Duration::from_millis(100));
        }
        // 100 calls in well under a minute: the 101st trips the block.
        let denied = gate.check("u-next", "list_files", Some("10.0.0.9"));
        assert!(!denied.allowed);
        assert!(gate.is_address_blocked("10.0.0.9"));

        // Still denied before the block expires, even with caller capacity.
        clock.advance(Duration::from_secs(60));
        assert!(!gate.check("fresh", "list_files", Some("10.0.0.9")).allowed);

        // After expiry the history resets and calls succeed again.
        clock.advance(ADDRESS_BLOCK);
        assert!(gate.check("fresh", "list_files", Some("10.0.0.9")).allowed);
    }

    #[test]
    fn manual_block_and_unblock() {
        let (gate, _clock) = gate();
        gate.block_address("10.1.1.1", Duration::from_secs(30));
        assert!(!gate.check("u1", "list_files", Some("10.1.1.1")).allowed);
        gate.unblock_address("10.1.1.1");
        assert!(gate.check("u1", "list_files", Some("10.1.1.1")).allowed);
    }

    #[test]
    fn global_ceiling_denies_everyone() {
        let (gate, clock) = gate();
        for i in 0..1000 {
            // Unique caller and capability keys keep category limits out of
            // the way; the global window still counts every admission.
            let caller = format!("c{i}");
            let capability = format!("cap{i}");
            assert!(gate.check(&caller, &capability, None).allowed);
            clock.advance(MS);
        }
        let denied = gate.check("one-more", "capx", None);
        assert!(!denied.allowed);
        assert_eq!(denied.reason.as_deref(), Some("global rate limit exceeded"));
        assert_eq!(denied.retry_after, Some(GLOBAL_RETRY));
    }

    #[test]
    fn denied_call_consumes_no_slot() {
        let (gate, clock) = gate();
        for _ in 0..10 {
            gate.check("u1", "list_files", None);
            clock.advance(MS);
        }
        let before = gate.status("u1", "list_files").used;
        gate.check("u1", "list_files", None); // denied
        assert_eq!(gate.status("u1", "list_files").used, before);
    }

    #[test]
    fn reset_clears_state() {
        let (gate, clock) = gate();
        for _ in 0..11 {
            gate.check("u1", "list_files", None);
            clock.advance(MS);
        }
        assert!(gate.status("u1", "list_files").violations > 0);
        gate.reset("u1", Some("list_files"));
        let status = gate.status("u1", "list_files");
        assert_eq!(status.used, 0);
        assert_eq!(status.violations, 0);
    }

    #[test]
    fn sweep_drops_idle_entries_keeps_violators() {
        let (gate, clock) = gate();
        gate.check("idle", "list_files", None);
        for _ in 0..11 {
            gate.check("noisy", "list_files", None);
        }
        clock.advance(Duration::from_secs(120));
        let stats = gate.sweep();
        // "idle" had no violations and its window expired; "noisy" keeps
        // its violation record.
        assert_eq!(stats.callers_removed, 1);
        assert!(gate.status("noisy", "list_files").violations > 0);
    }
}
