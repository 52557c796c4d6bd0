use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use drift_core::{DurationWindow, SyncConfig};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Domain {
    Inventory,
    Loan,
    Revenue,
    Tax,
}

impl Domain {
    pub const ALL: [Domain; 4] = [Domain::Inventory, Domain::Loan, Domain::Revenue, Domain::Tax];
}

/// Partial [`SyncConfig`]; unset keys keep the adapter's default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<DurationWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<DurationWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnect_window_ms: Option<DurationWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<DurationWindow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_rate: Option<f64>,
}

impl SyncConfigPatch {
    pub fn merge_over(&self, base: SyncConfig) -> SyncConfig {
        SyncConfig {
            interval: self.interval_ms.unwrap_or(base.interval),
            latency: self.latency_ms.unwrap_or(base.latency),
            disconnect_after: self.disconnect_window_ms.unwrap_or(base.disconnect_after),
            reconnect_after: self.reconnect_delay_ms.unwrap_or(base.reconnect_after),
            failure_rate: self.failure_rate.unwrap_or(base.failure_rate),
        }
    }
}

/// Contents of `drift.toml`: one optional table per domain.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub inventory: SyncConfigPatch,
    #[serde(default)]
    pub loan: SyncConfigPatch,
    #[serde(default)]
    pub revenue: SyncConfigPatch,
    #[serde(default)]
    pub tax: SyncConfigPatch,
}

impl Settings {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let settings = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        Ok(settings)
    }

    /// Like [`load_from`](Self::load_from), but a missing file means no
    /// overrides.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn patch(&self, domain: Domain) -> &SyncConfigPatch {
        match domain {
            Domain::Inventory => &self.inventory,
            Domain::Loan => &self.loan,
            Domain::Revenue => &self.revenue,
            Domain::Tax => &self.tax,
        }
    }

    /// The domain's overrides merged over `defaults`, validated.
    pub fn effective(&self, domain: Domain, defaults: SyncConfig) -> Result<SyncConfig> {
        let config = self.patch(domain).merge_over(defaults);
        config
            .validate()
            .with_context(|| format!("{domain:?} settings"))?;
        Ok(config)
    }
}

/// Fully resolved configuration of every domain, as printed by
/// `drift config`.
#[derive(Clone, Debug, Serialize)]
pub struct EffectiveConfig {
    pub inventory: SyncConfig,
    pub loan: SyncConfig,
    pub revenue: SyncConfig,
    pub tax: SyncConfig,
}

impl EffectiveConfig {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize toml")
    }
}
