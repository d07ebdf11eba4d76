use mmm_core::numeric::{finite_or_zero, percentile, ratio_or_zero};
use proptest::prelude::*;

proptest! {
    #[test]
    fn percentile_stays_within_sample_range(
        values in prop::collection::vec(-1e6f64..1e6, 1..64),
        pct in 0.0f64..=100.0,
    ) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let p = percentile(&values, pct);
        prop_assert!(p >= lo - 1e-6 && p <= hi + 1e-6);
    }

    #[test]
    fn percentile_is_monotone_in_rank(
        values in prop::collection::vec(-1e3f64..1e3, 2..32),
        a in 0.0f64..=100.0,
        b in 0.0f64..=100.0,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(percentile(&values, low) <= percentile(&values, high) + 1e-9);
    }

    #[test]
    fn guarded_ratio_is_always_finite(num in prop::num::f64::ANY, den in prop::num::f64::ANY) {
        prop_assert!(ratio_or_zero(num, den).is_finite());
        prop_assert!(finite_or_zero(num).is_finite());
    }
}
