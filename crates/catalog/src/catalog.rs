//! Catalog registry and TOML configuration.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{CapabilityDescriptor, ConfirmKind, Error, RateCategory, RateLimits, Result, Tier};

/// The capability registry: name → descriptor, category → limits.
///
/// Built at process start from the built-in table, optionally overridden
/// from a TOML file. Lookup never fails: unknown names resolve to
/// [`CapabilityDescriptor::default_for`].
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: HashMap<String, CapabilityDescriptor>,
    limits: HashMap<RateCategory, RateLimits>,
}

impl Catalog {
    /// The built-in catalog covering every registered handler.
    pub fn builtin() -> Self {
        let mut entries = HashMap::new();
        for descriptor in builtin_entries() {
            entries.insert(descriptor.name.clone(), descriptor);
        }

        let limits = RateCategory::ALL
            .into_iter()
            .map(|c| (c, RateLimits::builtin(c)))
            .collect();

        Self { entries, limits }
    }

    /// Load catalog overrides from a TOML file on top of the built-ins.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse catalog overrides from a TOML string on top of the built-ins.
    pub fn parse(toml: &str) -> Result<Self> {
        let config: CatalogConfig =
            toml::from_str(toml).map_err(|e| Error::Parse(e.to_string()))?;

        let mut catalog = Self::builtin();

        for (name, entry) in config.capabilities {
            let mut descriptor = catalog.descriptor(&name);
            if let Some(level) = entry.required_tier {
                descriptor.required_tier = Tier::from_level(level);
            }
            if let Some(category) = entry.rate_category {
                descriptor.rate_category = category;
            }
            if let Some(dangerous) = entry.dangerous {
                descriptor.dangerous = dangerous;
            }
            if let Some(kind) = entry.confirm {
                descriptor.confirm_kind = Some(kind);
            }
            catalog.entries.insert(name, descriptor);
        }

        for (category, entry) in config.limits {
            let mut limits = catalog.limits(category);
            if let Some(ms) = entry.window_ms {
                limits.window = Duration::from_millis(ms);
            }
            if let Some(max) = entry.max {
                limits.max = max;
            }
            if let Some(ms) = entry.burst_window_ms {
                limits.burst_window = Duration::from_millis(ms);
            }
            if let Some(max) = entry.burst_max {
                limits.burst_max = max;
            }
            if limits.max == 0 || limits.burst_max == 0 {
                return Err(Error::Invalid(format!(
                    "{category:?}: window ceilings must be positive"
                )));
            }
            catalog.limits.insert(category, limits);
        }

        Ok(catalog)
    }

    /// Resolve the descriptor for a capability name.
    pub fn descriptor(&self, name: &str) -> CapabilityDescriptor {
        self.entries
            .get(name)
            .cloned()
            .unwrap_or_else(|| CapabilityDescriptor::default_for(name))
    }

    /// Whether a name has an explicit catalog entry.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Limits for a rate category.
    pub fn limits(&self, category: RateCategory) -> RateLimits {
        self.limits
            .get(&category)
            .copied()
            .unwrap_or_else(|| RateLimits::builtin(category))
    }

    /// The longest configured main window, used to bound state GC.
    pub fn longest_window(&self) -> Duration {
        self.limits
            .values()
            .map(|l| l.window)
            .max()
            .unwrap_or(Duration::from_secs(60))
    }

    /// Names of every explicitly registered capability.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_entries() -> Vec<CapabilityDescriptor> {
    fn entry(
        name: &str,
        required_tier: Tier,
        rate_category: RateCategory,
        confirm_kind: Option<ConfirmKind>,
    ) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: name.to_string(),
            required_tier,
            rate_category,
            dangerous: confirm_kind.is_some(),
            confirm_kind,
        }
    }

    vec![
        // Read-only introspection
        entry("list_files", Tier::Guest, RateCategory::Read, None),
        entry("get_config", Tier::Guest, RateCategory::Read, None),
        entry("get_analysis_status", Tier::Guest, RateCategory::Read, None),
        entry("list_capabilities", Tier::Guest, RateCategory::Read, None),
        // Session-scoped mutation
        entry("select_files", Tier::Limited, RateCategory::Session, None),
        entry("set_config", Tier::Limited, RateCategory::Session, None),
        entry(
            "start_analysis",
            Tier::Limited,
            RateCategory::Analysis,
            Some(ConfirmKind::ResourceIntensive),
        ),
        entry("cancel_analysis", Tier::Limited, RateCategory::Session, None),
        // Persistence-backed CRUD
        entry("list_todos", Tier::Limited, RateCategory::Persistence, None),
        entry("create_todo", Tier::Standard, RateCategory::Persistence, None),
        entry("update_todo", Tier::Standard, RateCategory::Persistence, None),
        entry(
            "complete_todo",
            Tier::Standard,
            RateCategory::Persistence,
            None,
        ),
        entry(
            "delete_todo",
            Tier::Standard,
            RateCategory::Persistence,
            Some(ConfirmKind::Destructive),
        ),
    ]
}

#[derive(Debug, Default, Deserialize)]
struct CatalogConfig {
    #[serde(default)]
    capabilities: HashMap<String, CapabilityEntry>,
    #[serde(default)]
    limits: HashMap<RateCategory, LimitsEntry>,
}

#[derive(Debug, Deserialize)]
struct CapabilityEntry {
    required_tier: Option<i64>,
    rate_category: Option<RateCategory>,
    dangerous: Option<bool>,
    confirm: Option<ConfirmKind>,
}

#[derive(Debug, Deserialize)]
struct LimitsEntry {
    window_ms: Option<u64>,
    max: Option<u32>,
    burst_window_ms: Option<u64>,
    burst_max: Option<u32>,
}
