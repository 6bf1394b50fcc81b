//! Sum-of-squared-error loss.
//!
//! The network under test reports `L = sum((pred - target)^2)`. This is the plain
//! sum with no `0.5` factor and no division by `N`, so the gradient is
//! `dL/dpred = 2 * (pred - target)`.

/// Sum of squared error.
#[inline]
pub fn sse(pred: &[f64], target: &[f64]) -> f64 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );

    let mut sum_sq = 0.0_f64;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
    }
    sum_sq
}

/// SSE loss + gradient w.r.t. `pred`, scaled by the upstream gradient `d_loss`.
///
/// Writes `d_pred[i] = d_loss * 2 * (pred[i] - target[i])` and returns the loss.
#[inline]
pub fn sse_backward(pred: &[f64], target: &[f64], d_loss: f64, d_pred: &mut [f64]) -> f64 {
    assert_eq!(
        pred.len(),
        target.len(),
        "pred len {} does not match target len {}",
        pred.len(),
        target.len()
    );
    assert_eq!(
        pred.len(),
        d_pred.len(),
        "pred len {} does not match d_pred len {}",
        pred.len(),
        d_pred.len()
    );

    let mut sum_sq = 0.0_f64;
    for i in 0..pred.len() {
        let diff = pred[i] - target[i];
        sum_sq = diff.mul_add(diff, sum_sq);
        d_pred[i] = d_loss * 2.0 * diff;
    }
    sum_sq
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn sse_is_zero_when_equal() {
        let pred = [1.0_f64, -2.0, 0.5];
        assert_eq!(sse(&pred, &pred), 0.0);
    }

    #[test]
    fn sse_is_a_sum_not_a_mean() {
        let pred = [1.0_f64, 3.0];
        let target = [2.0_f64, 1.0];
        // (-1)^2 + 2^2
        assert_abs_diff_eq!(sse(&pred, &target), 5.0);
    }

    #[test]
    fn sse_backward_matches_expected_gradient() {
        let pred = [1.0_f64, 3.0];
        let target = [2.0_f64, 1.0];
        let mut d_pred = [0.0_f64; 2];
        let loss = sse_backward(&pred, &target, 1.0, &mut d_pred);

        assert_abs_diff_eq!(loss, 5.0);
        assert_abs_diff_eq!(d_pred[0], -2.0);
        assert_abs_diff_eq!(d_pred[1], 4.0);
    }

    #[test]
    #[should_panic]
    fn sse_panics_on_length_mismatch() {
        sse(&[1.0, 2.0], &[1.0]);
    }
}
