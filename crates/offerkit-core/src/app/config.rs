//! SchedulerConfig - explicit scheduler configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is a valid
//! configuration.
//!
//! ```toml
//! [service]
//! role = "hello-role"
//!
//! [recovery]
//! min_launch_delay_ms = 600000
//! permanent_failure_timeout_ms = 1200000
//!
//! [reconciliation]
//! base_backoff_ms = 8000
//!
//! [plan.strategy]
//! kind = "dependency"
//! dependencies = { world = ["hello"] }
//!
//! [plan.phases.hello]
//! kind = "parallel"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ServiceSpec;
use crate::plan::{BackoffPolicy, StrategySpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub service: ServiceOverrides,
    pub recovery: RecoveryConfig,
    pub reconciliation: ReconciliationConfig,
    pub plan: PlanConfig,
}

/// Replaces the corresponding `ServiceSpec` fields when set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceOverrides {
    pub name: Option<String>,
    pub role: Option<String>,
    pub principal: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Rate limit permanent replacements of a pod instance.
    pub launch_constrainer_enabled: bool,
    /// Minimum time between two permanent replacements of one pod instance.
    pub min_launch_delay_ms: u64,
    /// Replace a task that has been failing for this long. Unset: only
    /// labeled tasks and non-sticky pods are replaced.
    pub permanent_failure_timeout_ms: Option<u64>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            launch_constrainer_enabled: true,
            min_launch_delay_ms: 600_000,
            permanent_failure_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconciliationConfig {
    pub base_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            base_backoff_ms: 8_000,
            multiplier: 2.0,
            max_backoff_ms: 30_000,
        }
    }
}

impl ReconciliationConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::from_millis(self.base_backoff_ms, self.multiplier, self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlanConfig {
    /// Strategy across phases (one phase per pod type).
    pub strategy: StrategySpec,
    /// Strategy inside the phase of a pod type, keyed by pod type.
    pub phases: BTreeMap<String, StrategySpec>,
}

impl SchedulerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.reconciliation;
        if r.base_backoff_ms == 0 {
            return Err(ConfigError::Invalid(
                "reconciliation.base_backoff_ms must be positive".to_string(),
            ));
        }
        if !(r.multiplier.is_finite() && r.multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "reconciliation.multiplier must be at least 1.0, got {}",
                r.multiplier
            )));
        }
        if r.max_backoff_ms < r.base_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "reconciliation.max_backoff_ms ({}) is below base_backoff_ms ({})",
                r.max_backoff_ms, r.base_backoff_ms
            )));
        }
        if self.recovery.permanent_failure_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "recovery.permanent_failure_timeout_ms must be positive when set".to_string(),
            ));
        }
        for (name, value) in [("name", &self.service.name), ("role", &self.service.role), ("principal", &self.service.principal)] {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::Invalid(format!("service.{name} must not be empty")));
            }
        }
        Ok(())
    }

    /// `spec` with the service overrides applied.
    pub fn apply(&self, spec: &ServiceSpec) -> ServiceSpec {
        let mut spec = spec.clone();
        if let Some(name) = &self.service.name {
            spec.name = name.clone();
        }
        if let Some(role) = &self.service.role {
            spec.role = role.clone();
        }
        if let Some(principal) = &self.service.principal {
            spec.principal = principal.clone();
        }
        spec
    }
}

/// Reads a `ServiceSpec` from a TOML file. Validation happens at build time.
pub fn load_service_spec(path: impl AsRef<Path>) -> Result<ServiceSpec, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&raw)?)
}
