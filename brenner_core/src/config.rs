//! Tunable thresholds for the core
//!
//! Every field has a default, so a partial JSON document (or none at all)
//! yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{BrennerError, Result, ValidationReport};

/// Lifecycle defaults applied when a card is upgraded to a lifecycle hypothesis
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifecycleConfig {
    /// Days without activity before an active hypothesis counts as dormant (default: 14)
    pub dormancy_threshold_days: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            dormancy_threshold_days: 14,
        }
    }
}

/// Evidence hygiene thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvidenceConfig {
    /// Confidence movement below this is flagged as weak evidence (default: 5.0)
    pub weak_delta_threshold: f64,
    /// Discriminative power below this is flagged (default: 3)
    pub low_power_threshold: u8,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            weak_delta_threshold: 5.0,
            low_power_threshold: 3,
        }
    }
}

/// Graveyard pattern analysis thresholds
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraveyardConfig {
    /// Minimum share for a death type to be reported as dominant (default: 0.30)
    pub dominant_share: f64,
    /// Share of entries without epitaph above which they are reported (default: 0.50)
    pub unprocessed_share: f64,
    /// Number of domains listed in statistics (default: 5)
    pub top_domains: usize,
}

impl Default for GraveyardConfig {
    fn default() -> Self {
        Self {
            dominant_share: 0.30,
            unprocessed_share: 0.50,
            top_domains: 5,
        }
    }
}

/// Complete core configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrennerConfig {
    pub lifecycle: LifecycleConfig,
    pub evidence: EvidenceConfig,
    pub graveyard: GraveyardConfig,
}

impl BrennerConfig {
    /// Parse from JSON and validate
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate().into_result("configuration")?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        if self.lifecycle.dormancy_threshold_days == 0 {
            report.error("lifecycle.dormancyThresholdDays", "must be at least 1");
        }
        let weak = self.evidence.weak_delta_threshold;
        if !weak.is_finite() || !(0.0..=100.0).contains(&weak) {
            report.error("evidence.weakDeltaThreshold", "must be between 0 and 100");
        }
        if !(1..=5).contains(&self.evidence.low_power_threshold) {
            report.error("evidence.lowPowerThreshold", "must be between 1 and 5");
        }
        for (field, share) in [
            ("graveyard.dominantShare", self.graveyard.dominant_share),
            ("graveyard.unprocessedShare", self.graveyard.unprocessed_share),
        ] {
            if !share.is_finite() || !(0.0..=1.0).contains(&share) {
                report.error(field, "must be between 0 and 1");
            }
        }
        report
    }
}

impl std::str::FromStr for BrennerConfig {
    type Err = BrennerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_json_str(s)
    }
}
