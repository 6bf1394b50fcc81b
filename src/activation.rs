//! Logistic sigmoid.
//!
//! Both layers of the network apply `sigmoid` element-wise to the pre-activation
//! `z = W x + b`. The tape caches the post-activation output `y`, and the backward
//! rule computes `dy/dz` from `y` alone, so no separate `z` buffer is kept.

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// `sigmoid'(z)` expressed through the cached output `y = sigmoid(z)`.
#[inline]
pub fn sigmoid_grad_from_output(y: f64) -> f64 {
    y * (1.0 - y)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn sigmoid_basic_values() {
        assert_abs_diff_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
        assert!(sigmoid(-800.0).is_finite());
        assert!(sigmoid(800.0).is_finite());
    }

    #[test]
    fn sigmoid_is_symmetric() {
        for x in [0.1, 0.7, 2.5, 9.0] {
            assert_abs_diff_eq!(sigmoid(-x), 1.0 - sigmoid(x), epsilon = 1e-15);
        }
    }

    #[test]
    fn gradient_from_output_matches_central_difference() {
        let eps = 1e-6;
        for x in [-3.0, -0.4, 0.0, 0.8, 2.2] {
            let numeric = (sigmoid(x + eps) - sigmoid(x - eps)) / (2.0 * eps);
            let analytic = sigmoid_grad_from_output(sigmoid(x));
            assert_abs_diff_eq!(analytic, numeric, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(sigmoid_grad_from_output(sigmoid(0.0)), 0.25);
    }
}
