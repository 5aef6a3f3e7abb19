//! Instance-weighted statistics over numeric distributions in the `[[point, count], ...]` form.

use num_traits::ToPrimitive;

/// The instance-weighted mean of the distribution, or `None` if it holds no instances.
pub fn mean(distribution: &[(f64, u64)]) -> Option<f64> {
	let (sum, total) = distribution
		.iter()
		.fold((0.0, 0u64), |(sum, total), (point, count)| {
			(sum + point * count.to_f64().unwrap_or(0.0), total + count)
		});
	if total == 0 {
		None
	} else {
		Some(sum / total.to_f64()?)
	}
}

/**
The median of an ordered distribution. `instances` is the total instance count of the distribution, passed in because callers always have it at hand. When the count is even and the middle falls between two bins, the median is the average of their points.
*/
pub fn median(distribution: &[(f64, u64)], instances: u64) -> Option<f64> {
	let half = instances.to_f64()? / 2.0;
	let mut counter = 0u64;
	let mut previous_point = None;
	for (point, count) in distribution.iter() {
		counter += count;
		if counter.to_f64()? > half {
			if instances % 2 == 0 && (counter - 1).to_f64()? == half {
				if let Some(previous_point) = previous_point {
					return Some((point + previous_point) / 2.0);
				}
			}
			return Some(*point);
		}
		previous_point = Some(*point);
	}
	None
}

/// The unbiased instance-weighted sample variance around `mean`. Distributions with fewer than two instances have zero variance.
pub fn variance(distribution: &[(f64, u64)], mean: f64) -> f64 {
	let (sum, total) = distribution
		.iter()
		.fold((0.0, 0u64), |(sum, total), (point, count)| {
			let delta = point - mean;
			(
				sum + delta * delta * count.to_f64().unwrap_or(0.0),
				total + count,
			)
		});
	if total < 2 {
		0.0
	} else {
		sum / (total - 1).to_f64().unwrap_or(1.0)
	}
}

#[test]
fn test_mean() {
	assert_eq!(mean(&[(1.0, 1), (2.0, 2), (4.0, 1)]), Some(2.25));
	assert_eq!(mean(&[]), None);
	assert_eq!(mean(&[(3.0, 0)]), None);
}

#[test]
fn test_median() {
	assert_eq!(median(&[(1.0, 1), (2.0, 1), (3.0, 1)], 3), Some(2.0));
	assert_eq!(median(&[(1.0, 2), (3.0, 2)], 4), Some(3.0));
	assert_eq!(median(&[(1.0, 1), (3.0, 1)], 2), Some(2.0));
	assert_eq!(median(&[(5.0, 10)], 10), Some(5.0));
	assert_eq!(median(&[], 0), None);
}

#[test]
fn test_variance() {
	let distribution = [(1.0, 1), (2.0, 2), (3.0, 1)];
	let m = mean(&distribution).unwrap();
	assert!((variance(&distribution, m) - 2.0 / 3.0).abs() < 1e-12);
	assert_eq!(variance(&[(7.0, 1)], 7.0), 0.0);
}
