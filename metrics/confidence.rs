use crate::distribution::{Distribution, Outcome};
use num_traits::ToPrimitive;

/// The two-sided 95% z-score.
pub const DEFAULT_Z: f64 = 1.96;

/**
The lower bound of the [Wilson score interval](https://en.wikipedia.org/wiki/Binomial_proportion_confidence_interval#Wilson_score_interval) for an observed proportion `p` over `n` trials.

`(p + z²/2n - z·sqrt(p(1-p)/n + z²/4n²)) / (1 + z²/n)`
*/
pub fn wilson_lower_bound(p: f64, n: f64, z: f64) -> f64 {
	if n <= 0.0 {
		return 0.0;
	}
	let z2 = z * z;
	let factor = z2 / n;
	let sqrt = ((p * (1.0 - p) + factor / 4.0) / n).sqrt();
	(p + factor / 2.0 - z * sqrt) / (1.0 + factor)
}

/**
The Wilson score confidence of `prediction` within `distribution`. The observed proportion is the prediction's share of the distribution's weight. `n` defaults to the total weight of the distribution and `z` defaults to [`DEFAULT_Z`](constant.DEFAULT_Z.html). The confidence is zero when there are no instances.
*/
pub fn ws_confidence(
	prediction: &Outcome,
	distribution: &Distribution,
	n: Option<u64>,
	z: Option<f64>,
) -> f64 {
	let total = distribution.total();
	let n = n.unwrap_or(total);
	if n == 0 || total == 0 {
		return 0.0;
	}
	let p = distribution.count(prediction).to_f64().unwrap_or(0.0) / total.to_f64().unwrap_or(1.0);
	wilson_lower_bound(p, n.to_f64().unwrap_or(0.0), z.unwrap_or(DEFAULT_Z))
}

/// The confidence band reported for regression predictions: `rz * sqrt(variance / instances)`.
pub fn regression_error(variance: f64, instances: u64, rz: f64) -> f64 {
	if instances == 0 || !variance.is_finite() {
		return 0.0;
	}
	rz * (variance / instances.to_f64().unwrap_or(1.0)).sqrt()
}

#[cfg(test)]
fn yes_no(yes: u64, no: u64) -> Distribution {
	Distribution::new(vec![
		(Outcome::Category("yes".to_owned()), yes),
		(Outcome::Category("no".to_owned()), no),
	])
}

#[test]
fn test_ws_confidence() {
	let yes = Outcome::Category("yes".to_owned());
	let d = yes_no(5, 0);
	let confidence = ws_confidence(&yes, &d, None, None);
	// p = 1 reduces the bound to 1 / (1 + z²/n).
	assert!((confidence - 1.0 / (1.0 + DEFAULT_Z * DEFAULT_Z / 5.0)).abs() < 1e-12);
	assert!((confidence - 0.565_508_3).abs() < 1e-6);
	assert_eq!(ws_confidence(&yes, &Distribution::default(), None, None), 0.0);
	assert_eq!(ws_confidence(&yes, &d, Some(0), None), 0.0);
}

#[test]
fn test_ws_confidence_is_non_increasing_in_z() {
	let yes = Outcome::Category("yes".to_owned());
	for (a, b) in &[(1, 9), (5, 5), (9, 1), (3, 0), (0, 4)] {
		let d = yes_no(*a, *b);
		let mut previous = std::f64::INFINITY;
		for z in &[0.0, 0.5, 1.0, 1.645, 1.96, 2.576, 3.5] {
			let confidence = ws_confidence(&yes, &d, None, Some(*z));
			assert!(confidence <= previous + 1e-12);
			assert!(confidence >= -1e-12 && confidence <= 1.0);
			previous = confidence;
		}
	}
}

#[test]
fn test_regression_error() {
	assert!((regression_error(4.0, 16, 1.96) - 0.98).abs() < 1e-12);
	assert_eq!(regression_error(4.0, 0, 1.96), 0.0);
}
