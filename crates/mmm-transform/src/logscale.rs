//! Log-scale transform used for the log-log response model.

use mmm_core::errors::{ErrorInfo, MmmError};

/// Offset used when none is configured.
pub const DEFAULT_LOG_OFFSET: f64 = 1.0;

/// `ln(x + offset)`; fails when `x + offset <= 0`.
pub fn log_transform(x: f64, offset: f64) -> Result<f64, MmmError> {
    let shifted = x + offset;
    if !(shifted.is_finite() && shifted > 0.0) {
        return Err(MmmError::InvalidInput(
            ErrorInfo::new("log-domain", "log transform requires x + offset > 0")
                .with_context("x", x)
                .with_context("offset", offset),
        ));
    }
    Ok(shifted.ln())
}

/// `exp(x) - offset`.
pub fn inverse_log_transform(x: f64, offset: f64) -> f64 {
    x.exp() - offset
}

/// Element-wise [`log_transform`].
pub fn log_series(x: &[f64], offset: f64) -> Result<Vec<f64>, MmmError> {
    x.iter()
        .enumerate()
        .map(|(idx, &value)| log_transform(value, offset).map_err(|err| err.with_context("index", idx)))
        .collect()
}

/// Element-wise [`inverse_log_transform`].
pub fn inverse_log_series(x: &[f64], offset: f64) -> Vec<f64> {
    x.iter().map(|&value| inverse_log_transform(value, offset)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_undoes_forward() {
        for value in [0.0, 0.5, 10.0, 12345.0] {
            let back = inverse_log_transform(log_transform(value, 1.0).unwrap(), 1.0);
            assert!((back - value).abs() < 1e-9 * value.max(1.0));
        }
    }

    #[test]
    fn zero_maps_to_zero_with_unit_offset() {
        assert_eq!(log_transform(0.0, DEFAULT_LOG_OFFSET).unwrap(), 0.0);
    }

    #[test]
    fn guards_non_positive_argument() {
        assert_eq!(log_transform(-1.0, 1.0).unwrap_err().info().code, "log-domain");
        assert!(log_transform(-3.0, 1.0).is_err());
        let err = log_series(&[1.0, -2.0], 1.0).unwrap_err();
        assert_eq!(err.info().context["index"], "1");
    }
}
