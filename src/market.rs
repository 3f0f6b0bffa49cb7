//! Experiment roster: markets and their group assignments
//!
//! A market is a static descriptor created once at simulator construction.
//! Coordinates are carried only for display by downstream consumers; the
//! estimator never reads them.

use serde::{Deserialize, Serialize};

/// Experimental arm a market is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Group {
    Treatment,
    Control,
}

impl Group {
    /// Label used in the panel's `group` column.
    pub fn label(&self) -> &'static str {
        match self {
            Group::Treatment => "Treatment",
            Group::Control => "Control",
        }
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single geographic market participating in the experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Unique market name, e.g. "Tallinn".
    pub name: String,
    /// Treatment or control arm.
    pub group: Group,
    /// Latitude, display only.
    pub lat: f64,
    /// Longitude, display only.
    pub lon: f64,
    /// Baseline daily response level before seasonality and noise.
    pub baseline: f64,
}

impl Market {
    pub fn new(name: &str, group: Group, lat: f64, lon: f64, baseline: f64) -> Self {
        Self {
            name: name.to_string(),
            group,
            lat,
            lon,
            baseline,
        }
    }

    pub fn is_treatment(&self) -> bool {
        self.group == Group::Treatment
    }
}

/// The default four-city roster: two treatment markets (driver bonus) and
/// two control markets (no bonus).
///
/// Order matters: the simulator iterates the roster in this order, which
/// fixes the RNG draw order and therefore byte-level reproducibility.
pub fn default_roster() -> Vec<Market> {
    vec![
        Market::new("Tallinn", Group::Treatment, 59.4370, 24.7536, 500.0),
        Market::new("Vilnius", Group::Treatment, 54.6872, 25.2797, 520.0),
        Market::new("Riga", Group::Control, 56.9496, 24.1052, 480.0),
        Market::new("Tartu", Group::Control, 58.3780, 26.7290, 490.0),
    ]
}
