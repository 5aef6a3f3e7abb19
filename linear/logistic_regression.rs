use itertools::izip;
use localml_features::{Fields, InputData, Value};
use localml_util::{Error, Result};
use ndarray::prelude::*;
use num_traits::ToPrimitive;
use std::sync::Arc;

/// A logistic regression model. Each input field is encoded into a group of features, and the features are combined linearly with one row of `weights` per class.
#[derive(Clone, Debug)]
pub struct LogisticRegression {
	/// The classes, in the order of the rows of `weights`. A model with a single row of weights has exactly two classes, and the second is the negative class.
	pub classes: Vec<String>,
	pub groups: Vec<FeatureGroup>,
	/// The shape is `(n_rows, n_features)`.
	pub weights: Array2<f64>,
	pub biases: Array1<f64>,
	pub fields: Arc<Fields>,
	/// Divide the linear term by the L2 norm of the encoded input.
	pub lr_normalize: bool,
	/// Standardize numeric inputs with the training mean and standard deviation.
	pub balance_fields: bool,
}

/// A `FeatureGroup` describes how one input field is encoded.
#[derive(Clone, Debug)]
pub enum FeatureGroup {
	Numeric(NumericFeatureGroup),
	/// One feature per category followed by a feature for missing values.
	Categorical(TermsFeatureGroup),
	/// One feature per term counting its occurrences, followed by a feature for missing values. Used for text and items fields.
	Terms(TermsFeatureGroup),
}

#[derive(Clone, Debug)]
pub struct NumericFeatureGroup {
	pub field: String,
	pub missing: NumericMissing,
	pub mean: f64,
	pub standard_deviation: f64,
}

/// What a numeric group encodes when its field is missing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NumericMissing {
	/// The group has a second feature that is set when the field is missing.
	Coefficient,
	/// The missing value is replaced by this value.
	Default(f64),
}

#[derive(Clone, Debug)]
pub struct TermsFeatureGroup {
	pub field: String,
	pub terms: Vec<String>,
}

impl FeatureGroup {
	pub fn field(&self) -> &str {
		match self {
			FeatureGroup::Numeric(group) => &group.field,
			FeatureGroup::Categorical(group) | FeatureGroup::Terms(group) => &group.field,
		}
	}

	/// The number of features this group encodes into.
	pub fn n_features(&self) -> usize {
		match self {
			FeatureGroup::Numeric(NumericFeatureGroup {
				missing: NumericMissing::Coefficient,
				..
			}) => 2,
			FeatureGroup::Numeric(_) => 1,
			FeatureGroup::Categorical(group) | FeatureGroup::Terms(group) => group.terms.len() + 1,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogisticRegressionPrediction {
	pub prediction: String,
	pub probability: f64,
	/// The probability of every class, by descending probability.
	pub distribution: Vec<(String, f64)>,
}

impl LogisticRegression {
	pub fn n_features(&self) -> usize {
		self.groups.iter().map(|group| group.n_features()).sum()
	}

	/// Encode a normalized input into the feature vector the weights apply to.
	pub fn encode(&self, input: &InputData) -> Result<Array1<f64>> {
		let mut features = Array1::<f64>::zeros(self.n_features());
		let mut offset = 0;
		for group in self.groups.iter() {
			let n_features = group.n_features();
			let slice = features.slice_mut(s![offset..offset + n_features]);
			self.encode_group(group, input.get(group.field()), slice)?;
			offset += n_features;
		}
		Ok(features)
	}

	fn encode_group(
		&self,
		group: &FeatureGroup,
		value: Option<&Value>,
		mut features: ArrayViewMut1<f64>,
	) -> Result<()> {
		let field = self.fields.get(group.field()).ok_or_else(|| {
			Error::invalid_model(format!("unknown field \"{}\"", group.field()))
		})?;
		let missing_index = features.len() - 1;
		match (group, value) {
			(FeatureGroup::Numeric(group), Some(value)) => {
				let value = value
					.as_number()
					.ok_or_else(|| Error::type_mismatch(&field.name, value, field.optype))?;
				features[0] = self.balance(group, value);
			}
			(FeatureGroup::Numeric(group), None) => match group.missing {
				NumericMissing::Coefficient => features[missing_index] = 1.0,
				NumericMissing::Default(value) => features[0] = self.balance(group, value),
			},
			(FeatureGroup::Categorical(group), Some(value)) => {
				let value = value.to_string();
				if let Some(index) = group.terms.iter().position(|category| *category == value) {
					features[index] = 1.0;
				}
			}
			(FeatureGroup::Terms(group), Some(value)) => {
				let text = value
					.as_text()
					.ok_or_else(|| Error::type_mismatch(&field.name, value, field.optype))?;
				for (term, count) in field.unique_terms(text) {
					if let Some(index) = group.terms.iter().position(|known| *known == term) {
						features[index] = count.to_f64().unwrap_or(0.0);
					}
				}
			}
			(FeatureGroup::Categorical(_), None) | (FeatureGroup::Terms(_), None) => {
				features[missing_index] = 1.0
			}
		}
		Ok(())
	}

	fn balance(&self, group: &NumericFeatureGroup, value: f64) -> f64 {
		if self.balance_fields && group.standard_deviation > 0.0 {
			(value - group.mean) / group.standard_deviation
		} else {
			value
		}
	}

	/// Compute the probability of every class for a normalized input.
	pub fn predict(&self, input: &InputData) -> Result<LogisticRegressionPrediction> {
		let features = self.encode(input)?;
		let mut logits = self.weights.dot(&features);
		if self.lr_normalize {
			let norm = features.dot(&features).sqrt();
			if norm > 0.0 {
				logits /= norm;
			}
		}
		logits += &self.biases;
		let probabilities = if logits.len() == 1 {
			let probability = sigmoid(logits[0]);
			arr1(&[probability, 1.0 - probability])
		} else {
			softmax(logits.view_mut());
			logits
		};
		if probabilities.len() != self.classes.len() {
			return Err(Error::invalid_model(format!(
				"the model has {} classes but {} probabilities",
				self.classes.len(),
				probabilities.len()
			)));
		}
		let mut distribution = izip!(self.classes.iter().cloned(), probabilities.iter().cloned())
			.collect::<Vec<_>>();
		distribution.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
		let (prediction, probability) = distribution
			.first()
			.cloned()
			.ok_or_else(|| Error::invalid_model("the model has no classes"))?;
		Ok(LogisticRegressionPrediction {
			prediction,
			probability,
			distribution,
		})
	}
}

fn sigmoid(logit: f64) -> f64 {
	1.0 / ((-logit).exp() + 1.0)
}

fn softmax(mut logits: ArrayViewMut1<f64>) {
	let max = logits.iter().fold(std::f64::MIN, |a, &b| a.max(b));
	logits -= max;
	logits.mapv_inplace(|l| l.exp());
	let sum = logits.iter().fold(0.0, |a, b| a + b);
	logits /= sum;
}

#[cfg(test)]
fn test_model() -> LogisticRegression {
	use localml_features::{Field, Optype};
	let mut color = Field::new("000001", "color", Optype::Categorical);
	color.summary.categories = vec![("red".to_owned(), 10), ("blue".to_owned(), 5)];
	let mut review = Field::new("000002", "review", Optype::Text);
	review.summary.tag_cloud = vec!["good".to_owned(), "bad".to_owned()];
	let fields = Fields::new(vec![Field::new("000000", "size", Optype::Numeric), color, review]);
	LogisticRegression {
		classes: vec!["yes".to_owned(), "no".to_owned()],
		groups: vec![
			FeatureGroup::Numeric(NumericFeatureGroup {
				field: "000000".to_owned(),
				missing: NumericMissing::Default(2.0),
				mean: 2.0,
				standard_deviation: 1.0,
			}),
			FeatureGroup::Categorical(TermsFeatureGroup {
				field: "000001".to_owned(),
				terms: vec!["red".to_owned(), "blue".to_owned()],
			}),
			FeatureGroup::Terms(TermsFeatureGroup {
				field: "000002".to_owned(),
				terms: vec!["good".to_owned(), "bad".to_owned()],
			}),
		],
		weights: arr2(&[[0.5, 1.0, -1.0, 0.0, 2.0, -2.0, 0.5]]),
		biases: arr1(&[-1.0]),
		fields: Arc::new(fields),
		lr_normalize: false,
		balance_fields: false,
	}
}

#[test]
fn test_encode() {
	let model = test_model();
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(3.0),
		"000001".to_owned() => Value::Text("blue".to_owned()),
		"000002".to_owned() => Value::Text("Good, good, bad!".to_owned()),
	};
	assert_eq!(
		model.encode(&input).unwrap(),
		arr1(&[3.0, 0.0, 1.0, 0.0, 2.0, 1.0, 0.0])
	);
	let missing = model.encode(&InputData::new()).unwrap();
	assert_eq!(missing, arr1(&[2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn test_predict_binary() {
	let model = test_model();
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(4.0),
		"000001".to_owned() => Value::Text("red".to_owned()),
	};
	// 0.5 * 4 + 1 * 1 + 0.5 (missing review) - 1 = 2.5
	let prediction = model.predict(&input).unwrap();
	let expected = 1.0 / (1.0 + (-2.5f64).exp());
	assert_eq!(prediction.prediction, "yes");
	assert!((prediction.probability - expected).abs() < 1e-12);
	assert_eq!(prediction.distribution[1].0, "no");
	assert!((prediction.distribution[1].1 - (1.0 - expected)).abs() < 1e-12);
}

#[test]
fn test_predict_normalized_and_balanced() {
	let model = LogisticRegression {
		lr_normalize: true,
		balance_fields: true,
		..test_model()
	};
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(4.0),
		"000001".to_owned() => Value::Text("red".to_owned()),
	};
	// The balanced size is 2 and the encoding is [2, 1, 0, 0, 0, 0, 1] with norm sqrt(6).
	let logit = (0.5 * 2.0 + 1.0 + 0.5) / 6.0f64.sqrt() - 1.0;
	let prediction = model.predict(&input).unwrap();
	let probability = 1.0 / (1.0 + (-logit).exp());
	assert!((prediction.distribution.iter().find(|(class, _)| class == "yes").unwrap().1 - probability).abs() < 1e-12);
}

#[test]
fn test_predict_multiclass() {
	let model = LogisticRegression {
		classes: vec!["a".to_owned(), "b".to_owned(), "c".to_owned()],
		weights: arr2(&[
			[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
			[0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0],
			[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
		]),
		biases: arr1(&[0.0, 0.0, 0.0]),
		..test_model()
	};
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(1.0),
		"000001".to_owned() => Value::Text("red".to_owned()),
		"000002".to_owned() => Value::Text("nothing".to_owned()),
	};
	let prediction = model.predict(&input).unwrap();
	let total = 1.0f64.exp() + 2.0f64.exp() + 1.0;
	assert_eq!(prediction.prediction, "b");
	assert!((prediction.probability - 2.0f64.exp() / total).abs() < 1e-12);
	let sum: f64 = prediction.distribution.iter().map(|(_, p)| p).sum();
	assert!((sum - 1.0).abs() < 1e-12);
	assert_eq!(
		prediction
			.distribution
			.iter()
			.map(|(class, _)| class.as_str())
			.collect::<Vec<_>>(),
		vec!["b", "a", "c"]
	);
}
