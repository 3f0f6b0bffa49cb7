//! Panel rows and panel-level helpers
//!
//! The panel is an ordered sequence of daily observations, one row per
//! (market, date), market-major then date-minor. Rows are immutable once
//! generated; relabeling for the placebo test produces a new panel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Which side of the intervention cutoff a row falls on.
///
/// Derived from the row's date and the single global cutoff date shared by
/// all markets; never stored independently of that comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "Pre-Intervention")]
    Pre,
    #[serde(rename = "Post-Intervention")]
    Post,
}

impl Period {
    /// Classify a date against the intervention cutoff. The cutoff day
    /// itself is the first post-intervention day.
    pub fn from_date(date: NaiveDate, cutoff: NaiveDate) -> Self {
        if date >= cutoff {
            Period::Post
        } else {
            Period::Pre
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Pre => "Pre-Intervention",
            Period::Post => "Post-Intervention",
        }
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the panel: a single market-day measurement.
///
/// `response` is integer-valued: the generator truncates the underlying
/// continuous value toward zero when it stores the row. It can go negative
/// under a strongly harmful uplift, so it is signed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub market: String,
    pub date: NaiveDate,
    /// Group label, e.g. "Treatment" / "Control", or the fake labels used
    /// by the placebo relabeling.
    pub group: String,
    pub period: Period,
    pub response: i64,
}

/// Restrict a panel to rows whose group label matches `group`, then relabel:
/// rows from `fake_treatment_market` get `fake_treatment_label`, every other
/// market gets `fake_control_label`.
///
/// This is the relabeling step of the placebo (A/A) test: it manufactures a
/// two-group panel out of markets known to share no real treatment effect.
pub fn relabel_for_placebo(
    panel: &[Observation],
    group: &str,
    fake_treatment_market: &str,
    fake_treatment_label: &str,
    fake_control_label: &str,
) -> Vec<Observation> {
    panel
        .iter()
        .filter(|obs| obs.group == group)
        .map(|obs| {
            let label = if obs.market == fake_treatment_market {
                fake_treatment_label
            } else {
                fake_control_label
            };
            Observation {
                group: label.to_string(),
                ..obs.clone()
            }
        })
        .collect()
}
