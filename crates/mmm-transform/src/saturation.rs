//! Hill saturation curves.

use mmm_core::errors::{ErrorInfo, MmmError};

fn hill_error(code: &str, message: impl Into<String>) -> MmmError {
    MmmError::InvalidInput(ErrorInfo::new(code, message))
}

fn check_params(k: f64, s: f64) -> Result<(), MmmError> {
    if !(k.is_finite() && k > 0.0) {
        return Err(hill_error("non-positive-k", "half-saturation K must be > 0").with_context("K", k));
    }
    if !(s.is_finite() && s > 0.0) {
        return Err(hill_error("non-positive-s", "steepness S must be > 0").with_context("S", s));
    }
    Ok(())
}

fn check_input(x: f64) -> Result<(), MmmError> {
    if !(x.is_finite() && x >= 0.0) {
        return Err(hill_error("negative-input", "saturation input must be finite and >= 0")
            .with_context("x", x));
    }
    Ok(())
}

/// Largest `f64` strictly below 1.
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

fn hill_raw(x: f64, k: f64, s: f64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    // x^S / (K^S + x^S) rewritten as 1 / (1 + (K/x)^S) to avoid overflow for large x.
    1.0 / (1.0 + (k / x).powf(s))
}

// Rounds to 1.0 once (K/x)^S falls under machine epsilon; the clamp keeps the curve open at 1.
fn hill_unchecked(x: f64, k: f64, s: f64) -> f64 {
    hill_raw(x, k, s).min(BELOW_ONE)
}

/// Hill curve `x^S / (K^S + x^S)`; non-decreasing in `x`, within `[0, 1)`, equal to 0.5 at `x = K`.
pub fn hill_function(x: f64, k: f64, s: f64) -> Result<f64, MmmError> {
    check_params(k, s)?;
    check_input(x)?;
    Ok(hill_unchecked(x, k, s))
}

/// [`hill_function`] multiplied by `max_effect`.
pub fn hill_function_scaled(x: f64, k: f64, s: f64, max_effect: f64) -> Result<f64, MmmError> {
    Ok(max_effect * hill_function(x, k, s)?)
}

/// Element-wise [`hill_function`].
pub fn hill_series(x: &[f64], k: f64, s: f64) -> Result<Vec<f64>, MmmError> {
    check_params(k, s)?;
    x.iter()
        .map(|&value| {
            check_input(value)?;
            Ok(hill_unchecked(value, k, s))
        })
        .collect()
}

/// Element-wise [`hill_function_scaled`].
pub fn hill_series_scaled(x: &[f64], k: f64, s: f64, max_effect: f64) -> Result<Vec<f64>, MmmError> {
    Ok(hill_series(x, k, s)?
        .into_iter()
        .map(|value| value * max_effect)
        .collect())
}

/// Analytic slope `S K^S x^(S-1) / (K^S + x^S)^2`.
pub fn hill_derivative(x: f64, k: f64, s: f64) -> Result<f64, MmmError> {
    check_params(k, s)?;
    check_input(x)?;
    if x == 0.0 {
        return Ok(if s < 1.0 {
            f64::INFINITY
        } else if s == 1.0 {
            1.0 / k
        } else {
            0.0
        });
    }
    let h = hill_raw(x, k, s);
    Ok(s * h * (1.0 - h) / x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_saturation_at_k() {
        assert!((hill_function(50.0, 50.0, 2.0).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(hill_function(0.0, 50.0, 2.0).unwrap(), 0.0);
    }

    #[test]
    fn matches_textbook_formula() {
        let (x, k, s) = (30.0_f64, 20.0_f64, 1.7_f64);
        let expected = x.powf(s) / (k.powf(s) + x.powf(s));
        assert!((hill_function(x, k, s).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn scaled_multiplies_max_effect() {
        let value = hill_function_scaled(50.0, 50.0, 1.0, 8.0).unwrap();
        assert!((value - 4.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert_eq!(hill_function(1.0, 0.0, 1.0).unwrap_err().info().code, "non-positive-k");
        assert_eq!(hill_function(-1.0, 1.0, 1.0).unwrap_err().info().code, "negative-input");
        assert!(hill_series(&[1.0, -2.0], 1.0, 1.0).is_err());
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let (x, k, s) = (40.0, 25.0, 2.5);
        let eps = 1e-5;
        let numeric =
            (hill_function(x + eps, k, s).unwrap() - hill_function(x - eps, k, s).unwrap()) / (2.0 * eps);
        assert!((hill_derivative(x, k, s).unwrap() - numeric).abs() < 1e-8);
    }

    #[test]
    fn stays_below_one_for_huge_inputs() {
        for x in [1e4, 1e8, 1e300] {
            let value = hill_function(x, 1.0, 5.0).unwrap();
            assert!(value < 1.0 && value.is_finite(), "{x} -> {value}");
        }
        assert!(hill_function(1e8, 1.0, 5.0).unwrap() <= hill_function(1e300, 1.0, 5.0).unwrap());
        assert!(hill_function_scaled(1e300, 1.0, 5.0, 2.0).unwrap() < 2.0);
    }
}
