//! Static capability catalog.
//!
//! Core principle: **every capability has exactly one descriptor**, fixed at
//! process start. Names absent from the catalog resolve to a default
//! descriptor (tier 3, default rate category, not dangerous).

mod catalog;
mod descriptor;
mod error;
mod limits;

pub use catalog::Catalog;
pub use descriptor::{CapabilityDescriptor, ConfirmKind, Tier};
pub use error::{Error, Result};
pub use limits::{RateCategory, RateLimits};
