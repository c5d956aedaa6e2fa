//! Governance gates: permission, rate limiting, and activity monitoring.
//!
//! Each gate owns its state maps behind per-map locks and performs its whole
//! check-and-update sequence synchronously, never holding a lock across I/O.
//! Gates are constructed with an injected [`Clock`], so tests run against a
//! deterministic [`ManualClock`] and a fresh store per test.
//!
//! # Overview
//!
//! - [`PermissionGate`] — resolves caller tiers against the catalog and runs
//!   the two-phase confirmation protocol for dangerous capabilities.
//! - [`RateGate`] — sliding-window limits at three scopes (network address,
//!   global, per-caller-per-capability) with violation-adaptive penalties.
//! - [`ActivityMonitor`] — advisory detection of suspicious usage patterns.

mod activity;
mod clock;
mod permission;
mod rate;
mod statemap;
mod window;

pub use activity::{ActivityMonitor, ErrorKind, PatternReport, Severity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use permission::{Caller, CapabilitySplit, PermissionCheck, PermissionGate};
pub use rate::{RateDecision, RateGate, RateStatus, SweepStats};
pub use statemap::StateMap;
pub use window::SlidingWindow;
