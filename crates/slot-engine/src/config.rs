//! Resolver configuration, loadable from YAML.
//!
//! ```yaml
//! max_range_days: 31
//! dst_policy: shift_forward
//! cache_ttl_seconds: 30
//! default_timezone: Europe/Berlin
//! ```

use std::path::Path;
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::dst::{parse_timezone, DstPolicy};
use crate::error::{Result, SlotError};

const CONFIG_ENTITY: &str = "resolver config";

/// Upper bound for `max_range_days`; session expansion counts fit in `u16`.
pub const MAX_RANGE_DAYS_LIMIT: u32 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Longest query range accepted, in days.
    pub max_range_days: u32,
    pub dst_policy: DstPolicy,
    /// Lifetime of cached pre-filter results; `None` disables the cache.
    pub cache_ttl_seconds: Option<u64>,
    /// Zone for fixed sessions when neither the session nor the host names one.
    pub default_timezone: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_range_days: 62,
            dst_policy: DstPolicy::Skip,
            cache_ttl_seconds: None,
            default_timezone: "UTC".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| SlotError::config(CONFIG_ENTITY, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            SlotError::config(CONFIG_ENTITY, format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_range_days == 0 || self.max_range_days > MAX_RANGE_DAYS_LIMIT {
            return Err(SlotError::config(
                CONFIG_ENTITY,
                format!("max_range_days must be within 1..={MAX_RANGE_DAYS_LIMIT}"),
            ));
        }
        self.default_tz().map(|_| ())
    }

    pub fn default_tz(&self) -> Result<Tz> {
        parse_timezone(&self.default_timezone, CONFIG_ENTITY)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_seconds.map(Duration::from_secs)
    }
}
