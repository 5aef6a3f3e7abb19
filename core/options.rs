use crate::{cluster::DistanceMetric, time_series::Criterion};
use localml_metrics::DEFAULT_Z;
use localml_tree::{CombinationMethod, MissingStrategy, TraversalOptions};
use localml_util::{Error, Result};
use serde::Deserialize;
use std::convert::TryFrom;

/// The options record accepted by every prediction entry point. Options that do not apply to a model kind are ignored.
#[derive(serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PredictOptions {
	/// Interpret input keys as field names rather than field ids.
	pub by_name: bool,
	pub missing_strategy: MissingStrategy,
	pub method: Method,
	/// The number of votes the designated category needs under the `threshold` method.
	pub threshold: Option<usize>,
	/// The designated category of the `threshold` method.
	pub category: Option<String>,
	pub multiple: Multiple,
	pub distance: DistanceMetric,
	pub z: f64,
	pub horizon: usize,
	pub criterion: Criterion,
}

impl Default for PredictOptions {
	fn default() -> PredictOptions {
		PredictOptions {
			by_name: false,
			missing_strategy: MissingStrategy::LastPrediction,
			method: Method::Plurality,
			threshold: None,
			category: None,
			multiple: Multiple::Count(0),
			distance: DistanceMetric::Euclidean,
			z: DEFAULT_Z,
			horizon: 1,
			criterion: Criterion::Aic,
		}
	}
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Method {
	Plurality,
	Confidence,
	Probability,
	Threshold,
}

/// How many distribution entries to report with a classification. `Count(0)` reports none.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "serde_json::Value")]
pub enum Multiple {
	Count(usize),
	All,
}

impl TryFrom<serde_json::Value> for Multiple {
	type Error = String;
	fn try_from(value: serde_json::Value) -> Result<Multiple, String> {
		match &value {
			serde_json::Value::String(keyword) if keyword == "all" => Ok(Multiple::All),
			serde_json::Value::Number(number) => number
				.as_u64()
				.map(|count| Multiple::Count(count as usize))
				.ok_or_else(|| format!("multiple must be a non-negative integer, got {}", number)),
			_ => Err(format!("multiple must be a non-negative integer or \"all\", got {}", value)),
		}
	}
}

impl Multiple {
	/// The number of entries to keep out of `len`, or `None` when the distribution is not reported.
	pub fn limit(self, len: usize) -> Option<usize> {
		match self {
			Multiple::Count(0) => None,
			Multiple::Count(count) => Some(count.min(len)),
			Multiple::All => Some(len),
		}
	}
}

impl PredictOptions {
	/// Parse an options record. `null` yields the defaults.
	pub fn from_value(value: &serde_json::Value) -> Result<PredictOptions> {
		if value.is_null() {
			return Ok(PredictOptions::default());
		}
		let options = PredictOptions::deserialize(value)
			.map_err(|error| Error::invalid_option(error.to_string()))?;
		if !options.z.is_finite() || options.z <= 0.0 {
			return Err(Error::invalid_option(format!(
				"z must be a positive number, got {}",
				options.z
			)));
		}
		Ok(options)
	}

	pub fn traversal(&self) -> TraversalOptions {
		TraversalOptions {
			missing_strategy: self.missing_strategy,
			z: self.z,
		}
	}

	pub fn combination_method(&self) -> Result<CombinationMethod> {
		let method = match self.method {
			Method::Plurality => CombinationMethod::Plurality,
			Method::Confidence => CombinationMethod::Confidence,
			Method::Probability => CombinationMethod::Probability,
			Method::Threshold => {
				let threshold = self.threshold.ok_or_else(|| {
					Error::invalid_option("the threshold method requires a threshold")
				})?;
				let category = self.category.clone().ok_or_else(|| {
					Error::invalid_option("the threshold method requires a category")
				})?;
				CombinationMethod::Threshold {
					threshold,
					category,
				}
			}
		};
		Ok(method)
	}
}

#[test]
fn test_defaults() {
	let options = PredictOptions::from_value(&serde_json::Value::Null).unwrap();
	assert_eq!(options, PredictOptions::default());
	let options = PredictOptions::from_value(&serde_json::json!({})).unwrap();
	assert_eq!(options, PredictOptions::default());
	assert_eq!(options.combination_method().unwrap(), CombinationMethod::Plurality);
}

#[test]
fn test_parse() {
	let options = PredictOptions::from_value(&serde_json::json!({
		"byName": true,
		"missingStrategy": "proportional",
		"method": "threshold",
		"threshold": 2,
		"category": "yes",
		"multiple": "all",
		"distance": "manhattan",
		"criterion": "bic"
	}))
	.unwrap();
	assert!(options.by_name);
	assert_eq!(options.missing_strategy, MissingStrategy::Proportional);
	assert_eq!(options.multiple, Multiple::All);
	assert_eq!(options.distance, DistanceMetric::Manhattan);
	assert_eq!(options.criterion, Criterion::Bic);
	assert_eq!(
		options.combination_method().unwrap(),
		CombinationMethod::Threshold {
			threshold: 2,
			category: "yes".to_owned()
		}
	);
	let options = PredictOptions::from_value(&serde_json::json!({ "multiple": 3 })).unwrap();
	assert_eq!(options.multiple.limit(2), Some(2));
	assert_eq!(options.multiple.limit(5), Some(3));
	assert_eq!(Multiple::Count(0).limit(5), None);
}

#[test]
fn test_invalid_options() {
	let invalid = |value: serde_json::Value| match PredictOptions::from_value(&value) {
		Err(Error::InvalidOption { .. }) => true,
		_ => false,
	};
	assert!(invalid(serde_json::json!({ "missingStrategy": "guess" })));
	assert!(invalid(serde_json::json!({ "multiple": -1 })));
	assert!(invalid(serde_json::json!({ "multiple": "some" })));
	assert!(invalid(serde_json::json!({ "unknown": true })));
	assert!(invalid(serde_json::json!({ "z": 0 })));
	let options = PredictOptions::from_value(&serde_json::json!({ "method": "threshold" })).unwrap();
	assert_eq!(
		options.combination_method().unwrap_err(),
		Error::invalid_option("the threshold method requires a threshold")
	);
}
