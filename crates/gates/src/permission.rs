//! Tiered permission checks with two-phase confirmation.

use std::sync::Arc;

use catalog::{Catalog, Tier};
use serde::Serialize;

/// An authenticated caller. Absence of a caller denotes a guest.
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: String,
    pub elevated: bool,
    pub explicit_tier: Option<i64>,
}

impl Caller {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elevated: false,
            explicit_tier: None,
        }
    }

    pub fn elevated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elevated: true,
            explicit_tier: None,
        }
    }

    pub fn with_tier(id: impl Into<String>, tier: i64) -> Self {
        Self {
            id: id.into(),
            elevated: false,
            explicit_tier: Some(tier),
        }
    }

    /// Effective tier: elevation always wins, explicit tiers are clamped,
    /// any other authenticated caller gets the standard tier.
    pub fn tier(&self) -> Tier {
        if self.elevated {
            Tier::Full
        } else if let Some(level) = self.explicit_tier {
            Tier::from_level(level)
        } else {
            Tier::Standard
        }
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionCheck {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub required_tier: Tier,
    pub caller_tier: Tier,
    pub requires_confirmation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
}

/// Capabilities a caller may and may not invoke.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilitySplit {
    pub available: Vec<String>,
    pub restricted: Vec<String>,
}

/// Compares caller tiers against catalog requirements and runs the
/// two-phase confirmation protocol for dangerous capabilities.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    catalog: Arc<Catalog>,
}

impl PermissionGate {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Resolve a caller's tier; `None` is a guest.
    pub fn caller_tier(caller: Option<&Caller>) -> Tier {
        caller.map(Caller::tier).unwrap_or(Tier::Guest)
    }

    /// Check whether `caller` may invoke `capability`.
    ///
    /// A dangerous capability that has not been `confirmed` comes back
    /// `allowed: true, requires_confirmation: true`; the caller must
    /// re-invoke with confirmation to reach execution. Elevation never
    /// bypasses the confirmation phase.
    pub fn check(&self, capability: &str, caller: Option<&Caller>, confirmed: bool) -> PermissionCheck {
        let descriptor = self.catalog.descriptor(capability);
        let caller_tier = Self::caller_tier(caller);
        let required_tier = descriptor.required_tier;

        if caller_tier < required_tier {
            tracing::debug!(
                capability,
                caller_tier = caller_tier.level(),
                required_tier = required_tier.level(),
                "permission denied"
            );
            return PermissionCheck {
                allowed: false,
                reason: Some(format!(
                    "'{capability}' requires tier {} but caller has tier {}",
                    required_tier.level(),
                    caller_tier.level()
                )),
                required_tier,
                caller_tier,
                requires_confirmation: false,
                confirmation_message: None,
            };
        }

        if descriptor.dangerous && !confirmed {
            return PermissionCheck {
                allowed: true,
                reason: None,
                required_tier,
                caller_tier,
                requires_confirmation: true,
                confirmation_message: descriptor.confirmation_message(),
            };
        }

        PermissionCheck {
            allowed: true,
            reason: None,
            required_tier,
            caller_tier,
            requires_confirmation: false,
            confirmation_message: None,
        }
    }

    /// Split the catalog into capabilities this caller can and cannot reach.
    pub fn available(&self, caller: Option<&Caller>) -> CapabilitySplit {
        let caller_tier = Self::caller_tier(caller);
        let mut available = Vec::new();
        let mut restricted = Vec::new();

        for name in self.catalog.names() {
            if caller_tier >= self.catalog.descriptor(name).required_tier {
                available.push(name.to_string());
            } else {
                restricted.push(name.to_string());
            }
        }
        available.sort();
        restricted.sort();

        CapabilitySplit {
            available,
            restricted,
        }
    }
}
