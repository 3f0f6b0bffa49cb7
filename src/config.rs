//! Experiment configuration
//!
//! Roster, horizon, cutoff and noise parameters for the panel generator.
//! Defaults reproduce the standard four-city demo setup; a TOML file can
//! override any of them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::market::{default_roster, Market};

/// Fraction of the horizon that elapses before the intervention starts.
///
/// The cutoff index is `floor(horizon_days * CUTOFF_RATIO)`: at the default
/// 60-day horizon that is index 39, making day 40 the first post-intervention
/// day. This is the ratio-derived cutoff variant; a fixed-index cutoff is
/// deliberately not supported.
pub const CUTOFF_RATIO: f64 = 0.66;

/// Day-of-week response multipliers.
///
/// Days are numbered from Monday = 0 through Sunday = 6. The defaults model
/// ride-hailing supply: a 30% surge on Friday and Saturday and a 10% boost
/// on Sunday, with weekdays at baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityProfile {
    /// The two busiest days of the week (days-from-Monday).
    #[serde(default = "default_peak_days")]
    pub peak_days: [u32; 2],
    /// Multiplier applied on peak days.
    #[serde(default = "default_peak_factor")]
    pub peak_factor: f64,
    /// One additional elevated day (days-from-Monday).
    #[serde(default = "default_shoulder_day")]
    pub shoulder_day: u32,
    /// Multiplier applied on the shoulder day.
    #[serde(default = "default_shoulder_factor")]
    pub shoulder_factor: f64,
}

fn default_peak_days() -> [u32; 2] {
    [4, 5] // Friday, Saturday
}

fn default_peak_factor() -> f64 {
    1.30
}

fn default_shoulder_day() -> u32 {
    6 // Sunday
}

fn default_shoulder_factor() -> f64 {
    1.10
}

impl Default for SeasonalityProfile {
    fn default() -> Self {
        Self {
            peak_days: default_peak_days(),
            peak_factor: default_peak_factor(),
            shoulder_day: default_shoulder_day(),
            shoulder_factor: default_shoulder_factor(),
        }
    }
}

impl SeasonalityProfile {
    /// Multiplier for a day-of-week (days-from-Monday, 0..=6).
    pub fn factor(&self, days_from_monday: u32) -> f64 {
        if self.peak_days.contains(&days_from_monday) {
            self.peak_factor
        } else if days_from_monday == self.shoulder_day {
            self.shoulder_factor
        } else {
            1.0
        }
    }
}

/// Full generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Market roster; iteration order fixes the RNG draw order.
    #[serde(default = "default_roster")]
    pub markets: Vec<Market>,

    /// Number of consecutive days in the panel.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    /// Fraction of the horizon before the intervention starts.
    #[serde(default = "default_cutoff_ratio")]
    pub cutoff_ratio: f64,

    /// Standard deviation of the zero-mean Gaussian daily noise.
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,

    /// Day-of-week multipliers.
    #[serde(default)]
    pub seasonality: SeasonalityProfile,
}

fn default_horizon_days() -> u32 {
    60
}

fn default_cutoff_ratio() -> f64 {
    CUTOFF_RATIO
}

fn default_noise_sigma() -> f64 {
    15.0
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            markets: default_roster(),
            horizon_days: default_horizon_days(),
            cutoff_ratio: default_cutoff_ratio(),
            noise_sigma: default_noise_sigma(),
            seasonality: SeasonalityProfile::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load from TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment or default path, falling back to defaults.
    pub fn from_env() -> Self {
        let path = std::env::var("GEOLIFT_CONFIG_PATH")
            .unwrap_or_else(|_| "geolift.toml".to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default experiment config ({}): {}", path, e);
            Self::default()
        })
    }

    /// Save to TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Reject configurations the generator cannot run on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.markets.is_empty() {
            anyhow::bail!("config: market roster is empty");
        }
        if self.horizon_days == 0 {
            anyhow::bail!("config: horizon_days must be at least 1");
        }
        if !(self.noise_sigma.is_finite() && self.noise_sigma > 0.0) {
            anyhow::bail!("config: noise_sigma must be a positive finite number");
        }
        if !(0.0..1.0).contains(&self.cutoff_ratio) {
            anyhow::bail!("config: cutoff_ratio must be in [0, 1)");
        }
        Ok(())
    }

    /// First control-group market in roster order, used as the default fake
    /// treatment market for the placebo test.
    pub fn first_control_market(&self) -> Option<&Market> {
        self.markets.iter().find(|m| !m.is_treatment())
    }
}
