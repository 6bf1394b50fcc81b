//! Finite-difference check of the oracle's gradients.
//!
//! For every parameter element `p`, the central difference
//! `(L(p + h) - L(p - h)) / 2h` must agree with the tape gradient up to
//! `O(h^2)`. A failing check means the reference evaluator is wrong, and the
//! fixtures it would emit cannot be trusted.

use crate::{Error, Oracle, Param, Result};

/// Gradient checking configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradCheckConfig {
    /// Step size for central differences.
    pub epsilon: f64,

    /// Relative tolerance.
    pub rtol: f64,

    /// Absolute tolerance.
    pub atol: f64,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-6,
            rtol: 1e-5,
            atol: 1e-8,
        }
    }
}

impl GradCheckConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("epsilon", self.epsilon),
            ("rtol", self.rtol),
            ("atol", self.atol),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(())
    }
}

/// Worst disagreement seen during a check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mismatch {
    pub param: Param,
    pub offset: usize,
    pub analytic: f64,
    pub numeric: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradCheckReport {
    pub max_abs_diff: f64,
    pub max_rel_diff: f64,
    pub num_elements: usize,
    pub num_failures: usize,
    pub worst: Option<Mismatch>,
}

impl GradCheckReport {
    #[inline]
    pub fn passed(&self) -> bool {
        self.num_failures == 0
    }
}

/// Compare every gradient entry of `oracle` against central differences.
pub fn check_oracle(oracle: &Oracle, config: &GradCheckConfig) -> Result<GradCheckReport> {
    config.validate()?;
    let h = config.epsilon;

    let mut report = GradCheckReport {
        max_abs_diff: 0.0,
        max_rel_diff: 0.0,
        num_elements: 0,
        num_failures: 0,
        worst: None,
    };

    for param in Param::ALL {
        let values = oracle.param(param).data();
        let analytic = oracle.gradient(param).data();

        for (offset, (&p, &a)) in values.iter().zip(analytic).enumerate() {
            let plus = oracle.fixtures().with_param_value(param, offset, p + h)?;
            let minus = oracle.fixtures().with_param_value(param, offset, p - h)?;
            let loss_plus = Oracle::from_fixtures(plus)?.loss();
            let loss_minus = Oracle::from_fixtures(minus)?.loss();
            let numeric = (loss_plus - loss_minus) / (2.0 * h);

            let abs_diff = (a - numeric).abs();
            let rel_diff = abs_diff / a.abs().max(numeric.abs()).max(f64::MIN_POSITIVE);

            report.num_elements += 1;
            if abs_diff > config.atol + config.rtol * numeric.abs() {
                report.num_failures += 1;
            }
            if abs_diff > report.max_abs_diff || report.worst.is_none() {
                report.worst = Some(Mismatch {
                    param,
                    offset,
                    analytic: a,
                    numeric,
                });
            }
            report.max_abs_diff = report.max_abs_diff.max(abs_diff);
            report.max_rel_diff = report.max_rel_diff.max(rel_diff);
        }
    }

    tracing::debug!(
        checked = report.num_elements,
        failures = report.num_failures,
        max_abs_diff = report.max_abs_diff,
        "finite-difference check"
    );
    Ok(report)
}

/// Like [`check_oracle`], but a failed check is an error.
pub fn verify_oracle(oracle: &Oracle, config: &GradCheckConfig) -> Result<GradCheckReport> {
    let report = check_oracle(oracle, config)?;
    if !report.passed() {
        return Err(Error::SelfCheck(format!(
            "{} of {} gradient entries disagree with finite differences (worst: {:?})",
            report.num_failures, report.num_elements, report.worst
        )));
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NetworkShape;

    #[test]
    fn oracle_gradients_match_central_differences() {
        for seed in [0, 1, 42] {
            let shape = NetworkShape::new(2, 3, 4).unwrap();
            let oracle = Oracle::evaluate(shape, seed).unwrap();
            let report = check_oracle(&oracle, &GradCheckConfig::default()).unwrap();
            assert_eq!(report.num_elements, shape.num_params());
            assert!(report.passed(), "seed {seed}: {report:?}");
            assert!(report.max_abs_diff < 1e-7, "{report:?}");
        }
    }

    #[test]
    fn non_square_shapes_check_out() {
        let shape = NetworkShape::new(5, 1, 3).unwrap();
        let oracle = Oracle::evaluate(shape, 9).unwrap();
        let report = check_oracle(&oracle, &GradCheckConfig::default()).unwrap();
        assert!(report.passed(), "{report:?}");
    }

    #[test]
    fn verify_fails_on_impossibly_tight_tolerance() {
        let oracle = Oracle::evaluate(NetworkShape::default(), 0).unwrap();
        let cfg = GradCheckConfig {
            epsilon: 1e-1,
            rtol: 1e-300,
            atol: 1e-300,
        };
        assert!(matches!(
            verify_oracle(&oracle, &cfg),
            Err(Error::SelfCheck(_))
        ));
        verify_oracle(&oracle, &GradCheckConfig::default()).unwrap();
    }

    #[test]
    fn rejects_bad_config() {
        let oracle = Oracle::evaluate(NetworkShape::default(), 0).unwrap();
        let cfg = GradCheckConfig {
            epsilon: 0.0,
            ..GradCheckConfig::default()
        };
        assert!(check_oracle(&oracle, &cfg).is_err());
    }
}
