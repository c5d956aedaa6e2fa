use serde::{Deserialize, Serialize};

use crate::RateCategory;

/// Ordered authorization level required to invoke a capability.
///
/// Tier 1 is read-only guest access; tier 4 is full access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Tier {
    Guest = 1,
    Limited = 2,
    Standard = 3,
    Full = 4,
}

impl Tier {
    /// Numeric level, 1..=4.
    pub fn level(self) -> u8 {
        self as u8
    }

    /// Convert an arbitrary integer level, clamping into 1..=4.
    pub fn from_level(level: i64) -> Self {
        match level {
            i64::MIN..=1 => Tier::Guest,
            2 => Tier::Limited,
            3 => Tier::Standard,
            _ => Tier::Full,
        }
    }
}

/// Classification of a dangerous capability, used to pick the
/// human-readable confirmation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmKind {
    Destructive,
    ResourceIntensive,
    Sensitive,
    Generic,
}

impl ConfirmKind {
    /// Confirmation prompt shown to the caller before the second phase.
    pub fn message(self, capability: &str) -> String {
        match self {
            ConfirmKind::Destructive => format!(
                "'{capability}' permanently deletes data and cannot be undone. \
                 Re-invoke with confirmed=true to proceed."
            ),
            ConfirmKind::ResourceIntensive => format!(
                "'{capability}' starts a long-running, resource-consuming operation. \
                 Re-invoke with confirmed=true to proceed."
            ),
            ConfirmKind::Sensitive => format!(
                "'{capability}' accesses sensitive data. \
                 Re-invoke with confirmed=true to proceed."
            ),
            ConfirmKind::Generic => format!(
                "'{capability}' requires explicit confirmation. \
                 Re-invoke with confirmed=true to proceed."
            ),
        }
    }
}

/// Immutable description of one capability: who may call it, how often,
/// and whether it needs two-phase confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub required_tier: Tier,
    pub rate_category: RateCategory,
    #[serde(default)]
    pub dangerous: bool,
    #[serde(default)]
    pub confirm_kind: Option<ConfirmKind>,
}

impl CapabilityDescriptor {
    /// Descriptor applied to names not present in the catalog.
    pub fn default_for(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required_tier: Tier::Standard,
            rate_category: RateCategory::Default,
            dangerous: false,
            confirm_kind: None,
        }
    }

    /// Confirmation message for this capability, if it is dangerous.
    pub fn confirmation_message(&self) -> Option<String> {
        if !self.dangerous {
            return None;
        }
        let kind = self.confirm_kind.unwrap_or(ConfirmKind::Generic);
        Some(kind.message(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_ordering() {
        assert!(Tier::Guest < Tier::Limited);
        assert!(Tier::Standard < Tier::Full);
        assert_eq!(Tier::Full.level(), 4);
    }

    #[test]
    fn from_level_clamps() {
        assert_eq!(Tier::from_level(-3), Tier::Guest);
        assert_eq!(Tier::from_level(0), Tier::Guest);
        assert_eq!(Tier::from_level(2), Tier::Limited);
        assert_eq!(Tier::from_level(99), Tier::Full);
    }

    #[test]
    fn default_descriptor_is_standard() {
        let d = CapabilityDescriptor::default_for("mystery_tool");
        assert_eq!(d.required_tier, Tier::Standard);
        assert_eq!(d.rate_category, RateCategory::Default);
        assert!(!d.dangerous);
        assert!(d.confirmation_message().is_none());
    }

    #[test]
    fn destructive_message_names_capability() {
        let msg = ConfirmKind::Destructive.message("delete_todo");
        assert!(msg.contains("delete_todo"));
        assert!(msg.contains("confirmed=true"));
    }
}
