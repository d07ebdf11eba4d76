//! Marginal return in the log-log response model.

use mmm_core::numeric::finite_or_zero;

/// Marginal ROI `elasticity * avg_outcome / current_spend`, 0 when spend is not positive.
pub fn marginal_roi_loglog(current_spend: f64, elasticity: f64, avg_outcome: f64) -> f64 {
    if current_spend <= 0.0 {
        return 0.0;
    }
    finite_or_zero(elasticity * avg_outcome / current_spend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_inversely_with_spend() {
        assert!((marginal_roi_loglog(100.0, 0.2, 5000.0) - 10.0).abs() < 1e-12);
        assert!((marginal_roi_loglog(200.0, 0.2, 5000.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn zero_spend_has_no_marginal_return() {
        assert_eq!(marginal_roi_loglog(0.0, 0.3, 100.0), 0.0);
        assert_eq!(marginal_roi_loglog(-5.0, 0.3, 100.0), 0.0);
    }
}
