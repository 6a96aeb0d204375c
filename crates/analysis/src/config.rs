//! `Flowmetry` Analysis Configuration
//!
//! Per-engine configuration sections with type-safe validation. Every engine
//! validates its own section on construction and again on each calculate
//! call, so a broken section fails exactly that engine and nothing else.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration for one analyzer instance
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnalysisConfig {
    /// Throughput engine section
    #[garde(dive)]
    pub throughput: ThroughputConfig,

    /// Cost engine section
    #[garde(dive)]
    pub cost: CostConfig,

    /// Quality engine section
    #[garde(dive)]
    pub quality: QualityConfig,

    /// Latency engine section
    #[garde(dive)]
    pub latency: LatencyConfig,
}

/// Throughput engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ThroughputConfig {
    /// Records per second offered to every source node
    #[garde(range(min = 0.001, max = 1_000_000_000.0))]
    pub default_ingestion_rate_rps: f64,

    /// Queue excess at overloaded nodes instead of dropping it
    #[garde(skip)]
    pub backpressure_enabled: bool,

    /// Average record size used for byte-rate figures
    #[garde(range(min = 1, max = 1_048_576))]
    pub record_size_bytes: u32,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self {
            default_ingestion_rate_rps: 1_000.0,
            backpressure_enabled: true,
            record_size_bytes: 1_024,
        }
    }
}

/// Cost engine configuration
///
/// Default rates follow the published cloud list prices the designer uses:
/// $0.0001 per compute millisecond, $0.023 per GB-month stored, $0.09 per
/// GB transferred out.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CostConfig {
    /// Dollars per millisecond of processing time
    #[garde(range(min = 0.0, max = 1.0))]
    pub compute_rate_per_ms: f64,

    /// Dollars per GB-month of resident data
    #[garde(range(min = 0.0, max = 100.0))]
    pub storage_rate_per_gb_month: f64,

    /// Dollars per GB of outbound transfer
    #[garde(range(min = 0.0, max = 100.0))]
    pub network_rate_per_gb: f64,

    /// Fraction of the subtotal budgeted for maintenance
    #[garde(range(min = 0.0, max = 1.0))]
    pub maintenance_fraction: f64,

    /// Data volume assumed per run when nodes and edges do not declare one
    #[garde(range(min = 0.0, max = 1_000_000.0))]
    pub default_volume_gb_per_run: f64,

    /// Run cadence assumed by `calculate` for the per-period projections
    #[garde(range(min = 1, max = 3_600))]
    pub runs_per_hour: u32,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            compute_rate_per_ms: 0.0001,
            storage_rate_per_gb_month: 0.023,
            network_rate_per_gb: 0.09,
            maintenance_fraction: 0.10,
            default_volume_gb_per_run: 1.0,
            runs_per_hour: 4,
        }
    }
}

/// Quality engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QualityConfig {
    /// Effective-score threshold below which a node is a weak point
    #[garde(range(min = 0.01, max = 1.0))]
    pub weak_point_threshold: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weak_point_threshold: 0.70,
        }
    }
}

/// Latency engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LatencyConfig {
    /// Transfer latency assumed for edges without an override
    #[garde(range(min = 0.0, max = 60_000.0))]
    pub default_network_latency_ms: f64,

    /// Upper bound on queue wait, keeps zero-capacity nodes finite
    #[garde(range(min = 1.0, max = 600_000.0))]
    pub max_queue_wait_ms: f64,

    /// Minimum slack before a node counts as a parallelization opportunity
    #[garde(range(min = 0.0, max = 60_000.0))]
    pub parallelization_margin_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            default_network_latency_ms: 5.0,
            max_queue_wait_ms: 60_000.0,
            parallelization_margin_ms: 10.0,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            throughput: ThroughputConfig::default(),
            cost: CostConfig::default(),
            quality: QualityConfig::default(),
            latency: LatencyConfig::default(),
        }
    }
}

impl ThroughputConfig {
    /// Validate this section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a field is out of range.
    pub fn validate(&self) -> ConfigResult<()> {
        garde::Validate::validate(self, &())
            .map_err(|e| ConfigError::invalid("throughput", e.to_string()))
    }
}

impl CostConfig {
    /// Validate this section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a field is out of range.
    pub fn validate(&self) -> ConfigResult<()> {
        garde::Validate::validate(self, &())
            .map_err(|e| ConfigError::invalid("cost", e.to_string()))
    }
}

impl QualityConfig {
    /// Validate this section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a field is out of range.
    pub fn validate(&self) -> ConfigResult<()> {
        garde::Validate::validate(self, &())
            .map_err(|e| ConfigError::invalid("quality", e.to_string()))
    }
}

impl LatencyConfig {
    /// Validate this section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a field is out of range or the slack
    /// margin exceeds the queue-wait cap.
    pub fn validate(&self) -> ConfigResult<()> {
        garde::Validate::validate(self, &())
            .map_err(|e| ConfigError::invalid("latency", e.to_string()))?;

        // A slack margin beyond the queue cap could never fire
        if self.parallelization_margin_ms >= self.max_queue_wait_ms {
            return Err(ConfigError::conflict(
                "latency",
                "parallelization_margin_ms must be smaller than max_queue_wait_ms",
            ));
        }
        Ok(())
    }
}

impl AnalysisConfig {
    /// Validate all sections
    ///
    /// # Errors
    ///
    /// Returns the first section's `ConfigError` if any section is invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        self.throughput.validate()?;
        self.cost.validate()?;
        self.quality.validate()?;
        self.latency.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_ingestion_rate_is_rejected() {
        let config = ThroughputConfig {
            default_ingestion_rate_rps: 0.0,
            ..ThroughputConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn negative_cost_rate_is_rejected() {
        let config = CostConfig {
            compute_rate_per_ms: -0.5,
            ..CostConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn margin_beyond_queue_cap_is_a_conflict() {
        let config = LatencyConfig {
            parallelization_margin_ms: 1_000.0,
            max_queue_wait_ms: 500.0,
            ..LatencyConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict { .. })
        ));
    }

    #[test]
    fn sections_fail_independently() {
        let mut config = AnalysisConfig::default();
        config.cost.maintenance_fraction = 2.0;
        assert!(config.cost.validate().is_err());
        assert!(config.throughput.validate().is_ok());
        assert!(config.quality.validate().is_ok());
        assert!(config.latency.validate().is_ok());
    }
}
