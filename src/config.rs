//! TOML configuration for metricwatch.
//!
//! Layered model: an explicit path, then the `METRICWATCH_CONFIG` environment
//! variable, then `/etc/metricwatch/metricwatch.toml`, then compiled-in
//! defaults. Every section and field is optional.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::model::{PatternKind, PatternRule, Threshold};
use crate::detect::{Sensitivity, Severity};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "METRICWATCH_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/metricwatch/metricwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MetricwatchConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded metricwatch configuration");
        Ok(config)
    }

    /// Resolve configuration in order:
    /// 1. `explicit` (from `--config`); failure to load it is an error.
    /// 2. The path in `METRICWATCH_CONFIG`.
    /// 3. `/etc/metricwatch/metricwatch.toml`.
    /// 4. Compiled-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "METRICWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP API.
    pub listen_address: String,
    /// Deadline for a single detection request (seconds). The engine stops at
    /// the next source boundary once it passes.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Sensitivity used when a request does not specify one.
    pub default_sensitivity: Sensitivity,
    /// `timeWindow` used when a request does not specify one (1..=168).
    pub default_time_window_hours: u32,
    /// Larger batches are rejected as invalid requests.
    pub max_points_per_request: usize,
    /// Threshold set used when a request supplies none.
    pub thresholds: Vec<Threshold>,
    /// Pattern rules used when a request supplies none.
    pub pattern_rules: Vec<PatternRule>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            default_sensitivity: Sensitivity::Medium,
            default_time_window_hours: 24,
            max_points_per_request: 100_000,
            thresholds: default_thresholds(),
            pattern_rules: default_pattern_rules(),
        }
    }
}

pub fn default_thresholds() -> Vec<Threshold> {
    vec![
        Threshold::new("delivery_performance", 120.0, 80.0, Severity::Medium),
        Threshold::new("cost_efficiency", 110.0, 90.0, Severity::High),
        Threshold::new("risk_level", 80.0, 0.0, Severity::Critical),
        Threshold::new("sustainability_score", 100.0, 60.0, Severity::Medium),
    ]
}

pub fn default_pattern_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new("spike_detection", "Spike Detection", PatternKind::Spike, (5, 25.0, 5), Severity::High),
        PatternRule::new("drop_detection", "Drop Detection", PatternKind::Drop, (5, 25.0, 5), Severity::High),
        PatternRule::new("trend_detection", "Trend Detection", PatternKind::Trend, (10, 15.0, 30), Severity::Medium),
        PatternRule::new(
            "oscillation_detection",
            "Oscillation Detection",
            PatternKind::Oscillation,
            (8, 20.0, 15),
            Severity::Medium,
        ),
        PatternRule::new(
            "flatline_detection",
            "Flatline Detection",
            PatternKind::Flatline,
            (6, 2.0, 10),
            Severity::Critical,
        ),
    ]
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
