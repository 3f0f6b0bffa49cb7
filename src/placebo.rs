//! Placebo (A/A) validation of the estimator
//!
//! Re-runs the regression estimator on markets known to be true controls,
//! with one of them relabeled as a fake treatment. A well-behaved estimator
//! should find nothing: a near-zero lift and a non-significant (or
//! undefined) p-value. The two checks are reported separately so a caller
//! can explain which one sank a failing run.

use serde::Serialize;

use crate::did::{self, DidResult, EstimateError, Mode};
use crate::panel::{relabel_for_placebo, Observation};

/// Group label given to the relabeled fake-treatment market.
pub const FAKE_TREATMENT_LABEL: &str = "Fake Treatment";

/// Group label given to the remaining control markets.
pub const FAKE_CONTROL_LABEL: &str = "Fake Control";

/// Magnitude bound on the placebo lift: `|lift|` must stay below this.
pub const PLACEBO_LIFT_TOLERANCE: f64 = 0.05;

/// Outcome of one placebo run.
#[derive(Debug, Clone, Serialize)]
pub struct PlaceboReport {
    /// Which true-control market was relabeled as fake treatment.
    pub fake_treatment_market: String,
    /// The regression result on the relabeled panel.
    pub result: DidResult,
    /// `|lift| < 0.05`.
    pub magnitude_ok: bool,
    /// p-value undefined, or `> 0.05`. A small p here means the estimator
    /// found a significant difference between two untreated markets.
    pub significance_ok: bool,
    /// `magnitude_ok && significance_ok`.
    pub passed: bool,
}

/// Run the placebo test: restrict `panel` to rows of `control_group`,
/// relabel `fake_treatment_market` as the fake treatment arm and every other
/// control market as the fake control arm, then estimate in regression mode.
///
/// Fails with [`EstimateError::RegressionFailure`] if the relabeled panel
/// cannot support the fit, e.g. when `fake_treatment_market` has no rows in
/// the control group.
pub fn run_placebo(
    panel: &[Observation],
    control_group: &str,
    fake_treatment_market: &str,
) -> Result<PlaceboReport, EstimateError> {
    let relabeled = relabel_for_placebo(
        panel,
        control_group,
        fake_treatment_market,
        FAKE_TREATMENT_LABEL,
        FAKE_CONTROL_LABEL,
    );

    tracing::debug!(
        rows = relabeled.len(),
        fake_treatment = fake_treatment_market,
        "running placebo estimation on relabeled control panel"
    );

    let result = did::estimate(
        &relabeled,
        FAKE_TREATMENT_LABEL,
        FAKE_CONTROL_LABEL,
        Mode::Regression,
    )?;

    let magnitude_ok = result.lift.abs() < PLACEBO_LIFT_TOLERANCE;
    let significance_ok = result
        .inference
        .as_ref()
        .and_then(|inf| inf.p_value)
        .map_or(true, |p| p > 0.05);

    Ok(PlaceboReport {
        fake_treatment_market: fake_treatment_market.to_string(),
        passed: magnitude_ok && significance_ok,
        magnitude_ok,
        significance_ok,
        result,
    })
}
