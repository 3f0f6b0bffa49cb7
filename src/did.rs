//! Difference-in-Differences effect estimation
//!
//! Two inference modes over a two-group, two-period panel:
//! - **Descriptive**: the raw four-cell group-mean contrast, no inference.
//! - **Regression**: OLS with the full interaction specification
//!   (intercept + treated + post + treated×post); the interaction
//!   coefficient is the DiD estimate, with a Student-t p-value and 95%
//!   confidence interval.
//!
//! Degenerate inputs follow a strict taxonomy:
//! - missing (group, period) cells default to a 0.0 mean in descriptive
//!   mode — deliberate, never an error;
//! - numerically undefined inference outputs (saturated or zero-variance
//!   fits) surface as `None`, never coerced to a number;
//! - an unsolvable fit (singular design) raises `RegressionFailure`.

use nalgebra::{Cholesky, DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::panel::{Observation, Period};

/// Significance threshold for the regression p-value.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Estimation mode selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Raw group-mean contrast, no inferential statistics.
    Descriptive,
    /// OLS interaction model with p-value and confidence interval.
    Regression,
}

/// Inferential statistics for the regression mode.
///
/// Fields are `None` when the sampling distribution is undefined (saturated
/// fit with zero residual degrees of freedom, or a non-finite intermediate).
/// Serialization turns `None` into `null`, which is the transport-safe form
/// the boundary layer expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub p_value: Option<f64>,
    pub conf_int_lower: Option<f64>,
    pub conf_int_upper: Option<f64>,
    /// `p_value < 0.05`; false whenever the p-value is undefined.
    pub is_significant: bool,
}

/// Output record of the estimator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DidResult {
    /// The DiD point estimate, in response units.
    pub absolute_impact: f64,
    /// Relative lift. Descriptive mode: relative to the treatment pre-period
    /// mean. Regression mode: relative to the counterfactual post-period
    /// mean (actual post-treatment mean minus the effect). The two baselines
    /// differ by design.
    pub lift: f64,
    pub treatment_pre_avg: f64,
    pub treatment_post_avg: f64,
    pub control_pre_avg: f64,
    pub control_post_avg: f64,
    /// Present in regression mode only.
    pub inference: Option<Inference>,
}

/// Errors raised by the estimator.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// The OLS system could not be solved: the design matrix is singular
    /// (an empty cell, collinear indicators, or fewer rows than
    /// coefficients). Carries the solver context.
    RegressionFailure(String),
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegressionFailure(msg) => write!(f, "regression failure: {}", msg),
        }
    }
}

impl std::error::Error for EstimateError {}

// ---------------------------------------------------------------------------
// Cell means
// ---------------------------------------------------------------------------

/// Per-(group, period) cell means, `None` when a cell has no rows.
///
/// The Defined/Undefined distinction lives here; the descriptive surface is
/// the only place allowed to flatten `None` to 0.0.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CellMeans {
    treatment_pre: Option<f64>,
    treatment_post: Option<f64>,
    control_pre: Option<f64>,
    control_post: Option<f64>,
}

impl CellMeans {
    fn from_panel(panel: &[Observation], treatment_group: &str, control_group: &str) -> Self {
        let cell = |group: &str, period: Period| -> Option<f64> {
            let mut sum = 0.0;
            let mut count = 0usize;
            for obs in panel {
                if obs.group == group && obs.period == period {
                    sum += obs.response as f64;
                    count += 1;
                }
            }
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        };

        Self {
            treatment_pre: cell(treatment_group, Period::Pre),
            treatment_post: cell(treatment_group, Period::Post),
            control_pre: cell(control_group, Period::Pre),
            control_post: cell(control_group, Period::Post),
        }
    }
}

/// `numer / denom`, or exactly 0.0 when the denominator is exactly zero.
/// Protects lift calculations against empty or all-zero baselines.
fn guarded_ratio(numer: f64, denom: f64) -> f64 {
    if denom == 0.0 {
        0.0
    } else {
        numer / denom
    }
}

/// `Some(x)` only when `x` is a finite float.
fn finite_or_none(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Estimate the causal effect of the intervention on `panel`, contrasting
/// `treatment_group` against `control_group`.
///
/// Only regression mode can fail; descriptive mode is total.
pub fn estimate(
    panel: &[Observation],
    treatment_group: &str,
    control_group: &str,
    mode: Mode,
) -> Result<DidResult, EstimateError> {
    let cells = CellMeans::from_panel(panel, treatment_group, control_group);

    match mode {
        Mode::Descriptive => Ok(descriptive(&cells)),
        Mode::Regression => regression(panel, treatment_group, control_group, &cells),
    }
}

fn descriptive(cells: &CellMeans) -> DidResult {
    // missing cells flatten to 0.0 here, and only here
    let t_pre = cells.treatment_pre.unwrap_or(0.0);
    let t_post = cells.treatment_post.unwrap_or(0.0);
    let c_pre = cells.control_pre.unwrap_or(0.0);
    let c_post = cells.control_post.unwrap_or(0.0);

    let effect = (t_post - t_pre) - (c_post - c_pre);
    let lift = guarded_ratio(effect, t_pre);

    DidResult {
        absolute_impact: effect,
        lift,
        treatment_pre_avg: t_pre,
        treatment_post_avg: t_post,
        control_pre_avg: c_pre,
        control_post_avg: c_post,
        inference: None,
    }
}

fn regression(
    panel: &[Observation],
    treatment_group: &str,
    control_group: &str,
    cells: &CellMeans,
) -> Result<DidResult, EstimateError> {
    // rows filtered to the two named groups; (treated, post) indicators
    let rows: Vec<(f64, f64, f64)> = panel
        .iter()
        .filter(|obs| obs.group == treatment_group || obs.group == control_group)
        .map(|obs| {
            let treated = if obs.group == treatment_group { 1.0 } else { 0.0 };
            let post = if obs.period == Period::Post { 1.0 } else { 0.0 };
            (treated, post, obs.response as f64)
        })
        .collect();

    let n = rows.len();

    // full interaction design: intercept, treated, post, treated*post
    let x = DMatrix::from_fn(n, 4, |r, c| {
        let (treated, post, _) = rows[r];
        match c {
            0 => 1.0,
            1 => treated,
            2 => post,
            _ => treated * post,
        }
    });
    let y = DVector::from_iterator(n, rows.iter().map(|&(_, _, resp)| resp));

    let xtx = x.transpose() * &x;
    let xty = x.transpose() * &y;

    let chol = Cholesky::new(xtx).ok_or_else(|| {
        EstimateError::RegressionFailure(format!(
            "singular design matrix: cannot identify all four DiD coefficients \
             from {} rows of '{}' vs '{}' (likely an empty group/period cell)",
            n, treatment_group, control_group
        ))
    })?;

    let beta = chol.solve(&xty);
    let effect = beta[3];

    let residuals = &y - &x * &beta;
    let dof = n as i64 - 4;

    let inference = if dof > 0 {
        let sigma2 = residuals.norm_squared() / dof as f64;
        let se = (sigma2 * chol.inverse()[(3, 3)]).sqrt();

        let tdist = StudentsT::new(0.0, 1.0, dof as f64)
            .map_err(|e| EstimateError::RegressionFailure(format!("t-distribution: {}", e)))?;

        // zero-variance fits push the t statistic to NaN/inf; the finite
        // guard turns the affected field into an explicit undefined marker
        let t_stat = effect / se;
        let p_value = finite_or_none(2.0 * (1.0 - tdist.cdf(t_stat.abs())));
        let t_crit = tdist.inverse_cdf(1.0 - SIGNIFICANCE_LEVEL / 2.0);

        Inference {
            p_value,
            conf_int_lower: finite_or_none(effect - t_crit * se),
            conf_int_upper: finite_or_none(effect + t_crit * se),
            is_significant: p_value.map_or(false, |p| p < SIGNIFICANCE_LEVEL),
        }
    } else {
        // saturated fit: the point estimate is exact but has no sampling
        // distribution
        Inference {
            p_value: None,
            conf_int_lower: None,
            conf_int_upper: None,
            is_significant: false,
        }
    };

    // lift against the counterfactual post-period level, not the pre mean
    let t_post_actual = cells.treatment_post.unwrap_or(0.0);
    let counterfactual = t_post_actual - effect;
    let lift = guarded_ratio(effect, counterfactual);

    Ok(DidResult {
        absolute_impact: effect,
        lift,
        treatment_pre_avg: cells.treatment_pre.unwrap_or(0.0),
        treatment_post_avg: t_post_actual,
        control_pre_avg: cells.control_pre.unwrap_or(0.0),
        control_post_avg: cells.control_post.unwrap_or(0.0),
        inference: Some(inference),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(group: &str, period: Period, response: i64) -> Observation {
        Observation {
            market: format!("{}-market", group),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            group: group.to_string(),
            period,
            response,
        }
    }

    /// One observation per cell: c_pre=10, c_post=20, t_pre=11, t_post=30.
    fn saturated_panel() -> Vec<Observation> {
        vec![
            obs("Control", Period::Pre, 10),
            obs("Control", Period::Post, 20),
            obs("Treatment", Period::Pre, 11),
            obs("Treatment", Period::Post, 30),
        ]
    }

    /// Two observations per cell with ±1 spread around the means
    /// t_pre=11, t_post=31, c_pre=10, c_post=21. DiD effect = 9.
    fn balanced_panel() -> Vec<Observation> {
        vec![
            obs("Treatment", Period::Pre, 10),
            obs("Treatment", Period::Pre, 12),
            obs("Treatment", Period::Post, 30),
            obs("Treatment", Period::Post, 32),
            obs("Control", Period::Pre, 9),
            obs("Control", Period::Pre, 11),
            obs("Control", Period::Post, 20),
            obs("Control", Period::Post, 22),
        ]
    }

    #[test]
    fn test_guarded_ratio_zero_denominator() {
        assert_eq!(guarded_ratio(5.0, 0.0), 0.0);
        assert_eq!(guarded_ratio(0.0, 0.0), 0.0);
        assert_eq!(guarded_ratio(3.0, 2.0), 1.5);
    }

    #[test]
    fn test_descriptive_four_cell_contrast() {
        let result = estimate(&balanced_panel(), "Treatment", "Control", Mode::Descriptive).unwrap();
        assert_eq!(result.treatment_pre_avg, 11.0);
        assert_eq!(result.treatment_post_avg, 31.0);
        assert_eq!(result.control_pre_avg, 10.0);
        assert_eq!(result.control_post_avg, 21.0);
        // (31 - 11) - (21 - 10) = 9
        assert_eq!(result.absolute_impact, 9.0);
        assert!((result.lift - 9.0 / 11.0).abs() < 1e-12);
        assert!(result.inference.is_none());
    }

    #[test]
    fn test_descriptive_missing_cell_defaults_to_zero() {
        // no Control rows at all: both control cells fall back to 0.0
        let panel = vec![
            obs("Treatment", Period::Pre, 10),
            obs("Treatment", Period::Post, 16),
        ];
        let result = estimate(&panel, "Treatment", "Control", Mode::Descriptive).unwrap();
        assert_eq!(result.control_pre_avg, 0.0);
        assert_eq!(result.control_post_avg, 0.0);
        assert_eq!(result.absolute_impact, 6.0);
    }

    #[test]
    fn test_descriptive_zero_pre_mean_lift_guard() {
        // all-zero pre-period treatment cell: lift is exactly 0.0, no panic
        let panel = vec![
            obs("Treatment", Period::Pre, 0),
            obs("Treatment", Period::Pre, 0),
            obs("Treatment", Period::Post, 50),
            obs("Control", Period::Pre, 10),
            obs("Control", Period::Post, 10),
        ];
        let result = estimate(&panel, "Treatment", "Control", Mode::Descriptive).unwrap();
        assert_eq!(result.treatment_pre_avg, 0.0);
        assert_eq!(result.lift, 0.0);
        assert_eq!(result.absolute_impact, 50.0);
    }

    #[test]
    fn test_regression_matches_descriptive_on_saturated_panel() {
        let panel = saturated_panel();
        let descriptive = estimate(&panel, "Treatment", "Control", Mode::Descriptive).unwrap();
        let regression = estimate(&panel, "Treatment", "Control", Mode::Regression).unwrap();

        // interaction coefficient equals the four-cell contrast:
        // (30 - 11) - (20 - 10) = 9
        assert_eq!(descriptive.absolute_impact, 9.0);
        assert!((regression.absolute_impact - 9.0).abs() < 1e-9);

        // zero residual degrees of freedom: inference undefined, not faked
        let inference = regression.inference.unwrap();
        assert_eq!(inference.p_value, None);
        assert_eq!(inference.conf_int_lower, None);
        assert_eq!(inference.conf_int_upper, None);
        assert!(!inference.is_significant);
    }

    #[test]
    fn test_regression_inference_on_balanced_panel() {
        let result = estimate(&balanced_panel(), "Treatment", "Control", Mode::Regression).unwrap();
        assert!((result.absolute_impact - 9.0).abs() < 1e-9);

        // counterfactual baseline: 31 - 9 = 22
        assert!((result.lift - 9.0 / 22.0).abs() < 1e-9);

        // by hand: sigma2 = 2, se = 2, t = 4.5, dof = 4 => p ~ 0.011
        let inference = result.inference.unwrap();
        let p = inference.p_value.unwrap();
        assert!(p < SIGNIFICANCE_LEVEL, "p = {}", p);
        assert!(inference.is_significant);

        let lo = inference.conf_int_lower.unwrap();
        let hi = inference.conf_int_upper.unwrap();
        assert!(lo < 9.0 && 9.0 < hi);
        assert!(lo > 0.0, "interval should exclude zero, lo = {}", lo);
    }

    #[test]
    fn test_regression_null_effect_has_large_p() {
        // identical group trajectories: effect 0, p = 1
        let panel = vec![
            obs("Treatment", Period::Pre, 10),
            obs("Treatment", Period::Pre, 12),
            obs("Treatment", Period::Post, 10),
            obs("Treatment", Period::Post, 12),
            obs("Control", Period::Pre, 10),
            obs("Control", Period::Pre, 12),
            obs("Control", Period::Post, 10),
            obs("Control", Period::Post, 12),
        ];
        let result = estimate(&panel, "Treatment", "Control", Mode::Regression).unwrap();
        assert!(result.absolute_impact.abs() < 1e-9);
        let inference = result.inference.unwrap();
        assert!(inference.p_value.unwrap() > 0.9);
        assert!(!inference.is_significant);
    }

    #[test]
    fn test_regression_zero_variance_fit_surfaces_undefined_p() {
        // every response identical: zero residual variance, t = 0/0
        let panel = vec![
            obs("Treatment", Period::Pre, 10),
            obs("Treatment", Period::Pre, 10),
            obs("Treatment", Period::Post, 10),
            obs("Treatment", Period::Post, 10),
            obs("Control", Period::Pre, 10),
            obs("Control", Period::Pre, 10),
            obs("Control", Period::Post, 10),
            obs("Control", Period::Post, 10),
        ];
        let result = estimate(&panel, "Treatment", "Control", Mode::Regression).unwrap();
        assert!(result.absolute_impact.abs() < 1e-9);
        let inference = result.inference.unwrap();
        assert_eq!(inference.p_value, None);
        assert!(!inference.is_significant);
    }

    #[test]
    fn test_regression_empty_cell_is_failure() {
        // constant treatment cells plus a missing control-post cell: the
        // design matrix loses rank and the fit must fail loudly
        let panel = vec![
            obs("Treatment", Period::Pre, 5),
            obs("Treatment", Period::Pre, 5),
            obs("Treatment", Period::Post, 5),
            obs("Treatment", Period::Post, 5),
            obs("Control", Period::Pre, 4),
            obs("Control", Period::Pre, 4),
        ];
        let err = estimate(&panel, "Treatment", "Control", Mode::Regression).unwrap_err();
        let EstimateError::RegressionFailure(msg) = err;
        assert!(msg.contains("singular"), "unexpected message: {}", msg);

        // descriptive mode stays permissive on the same panel
        let result = estimate(&panel, "Treatment", "Control", Mode::Descriptive).unwrap();
        assert_eq!(result.control_post_avg, 0.0);
    }

    #[test]
    fn test_regression_empty_panel_is_failure() {
        let err = estimate(&[], "Treatment", "Control", Mode::Regression).unwrap_err();
        assert!(matches!(err, EstimateError::RegressionFailure(_)));
    }

    #[test]
    fn test_estimator_ignores_other_groups() {
        // rows from a third group must not leak into the contrast
        let mut panel = balanced_panel();
        panel.push(obs("Bystander", Period::Pre, 1_000_000));
        panel.push(obs("Bystander", Period::Post, 1_000_000));
        let result = estimate(&panel, "Treatment", "Control", Mode::Descriptive).unwrap();
        assert_eq!(result.absolute_impact, 9.0);
    }

    #[test]
    fn test_undefined_inference_serializes_as_null() {
        let result = estimate(&saturated_panel(), "Treatment", "Control", Mode::Regression).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["inference"]["p_value"].is_null());
        assert!(json["inference"]["conf_int_lower"].is_null());
    }
}
