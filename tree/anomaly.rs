use crate::predicate::{Evaluation, Predicate};
use localml_features::{Fields, InputData};
use localml_util::{Error, Result};
use num_traits::ToPrimitive;
use rayon::prelude::*;
use std::sync::Arc;

/// The Euler-Mascheroni constant, used to approximate harmonic numbers.
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// An isolation forest. The anomaly score of an input is derived from how quickly the trees isolate it.
#[derive(Clone, Debug)]
pub struct AnomalyForest {
	pub trees: Vec<IsolationTree>,
	pub fields: Arc<Fields>,
	/// The number of instances each tree was grown from.
	pub sample_size: u64,
	/// The mean depth of the training instances, if the model reports it.
	pub mean_depth: Option<f64>,
}

/// The nodes of an isolation tree, with the root at index 0.
#[derive(Clone, Debug)]
pub struct IsolationTree {
	pub nodes: Vec<AnomalyNode>,
}

#[derive(Clone, Debug)]
pub struct AnomalyNode {
	/// All of these must hold for an input to reach this node.
	pub predicates: Vec<Predicate>,
	pub population: u64,
	pub children: Vec<usize>,
}

/**
The average path length of an unsuccessful search in a binary search tree of `n` instances, `c(n) = 2H(n - 1) - 2(n - 1) / n`, with the harmonic number approximated by `ln(n - 1) + γ`. Populations of one or fewer instances have a path length of zero.
*/
pub fn average_path_length(n: f64) -> f64 {
	if n <= 1.0 {
		return 0.0;
	}
	2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

/// `2^(-mean_depth / expected_mean_depth)`. A mean depth of zero scores exactly 1.
pub fn anomaly_score(mean_depth: f64, expected_mean_depth: f64) -> f64 {
	if mean_depth == 0.0 {
		return 1.0;
	}
	2.0f64.powf(-mean_depth / expected_mean_depth)
}

impl AnomalyNode {
	fn evaluate(&self, input: &InputData, fields: &Fields) -> Result<Evaluation> {
		let mut evaluation = Evaluation::True;
		for predicate in self.predicates.iter() {
			match predicate.apply(input, fields)? {
				Evaluation::False => return Ok(Evaluation::False),
				Evaluation::Missing => evaluation = Evaluation::Missing,
				Evaluation::True => {}
			}
		}
		Ok(evaluation)
	}
}

impl IsolationTree {
	/**
	The depth at which this tree isolates `input`. An input the root's predicates reject has depth zero. When the field a split tests is missing, the input follows the most populated of the children whose predicates could not be decided. The leaf reached adds the average path length of its population.
	*/
	pub fn depth(&self, input: &InputData, fields: &Fields) -> Result<f64> {
		let root = self
			.nodes
			.first()
			.ok_or_else(|| Error::invalid_model("isolation tree has no root"))?;
		if root.evaluate(input, fields)? == Evaluation::False {
			return Ok(0.0);
		}
		let mut depth = 1.0;
		let mut node = root;
		loop {
			let mut next = None;
			let mut fallback: Option<&AnomalyNode> = None;
			for child_index in node.children.iter() {
				let child = &self.nodes[*child_index];
				match child.evaluate(input, fields)? {
					Evaluation::True => {
						next = Some(child);
						break;
					}
					Evaluation::Missing => {
						if fallback.map_or(true, |best| child.population > best.population) {
							fallback = Some(child);
						}
					}
					Evaluation::False => {}
				}
			}
			match next.or(fallback) {
				Some(child) => {
					depth += 1.0;
					node = child;
				}
				None => break,
			}
		}
		if node.population > 1 {
			depth += average_path_length(node.population.to_f64().unwrap_or(0.0));
		}
		Ok(depth)
	}
}

impl AnomalyForest {
	/// The normalizing depth: `c(sample_size)`, capped by the training mean depth when the model reports it.
	pub fn expected_mean_depth(&self) -> f64 {
		let default_depth = average_path_length(self.sample_size.to_f64().unwrap_or(0.0));
		match self.mean_depth {
			Some(mean_depth) => mean_depth.min(default_depth),
			None => default_depth,
		}
	}

	/// The anomaly score of `input`, in `(0, 1]`. Scores near 1 are more anomalous.
	pub fn score(&self, input: &InputData) -> Result<f64> {
		if self.trees.is_empty() {
			return Err(Error::invalid_model("the isolation forest has no trees"));
		}
		let depths = self
			.trees
			.par_iter()
			.map(|tree| tree.depth(input, &self.fields))
			.collect::<Result<Vec<_>>>()?;
		let mean_depth = depths.iter().sum::<f64>() / depths.len().to_f64().unwrap_or(1.0);
		let expected_mean_depth = self.expected_mean_depth();
		if expected_mean_depth <= 0.0 {
			return Err(Error::invalid_model(
				"the expected mean depth of the isolation forest is not positive",
			));
		}
		Ok(anomaly_score(mean_depth, expected_mean_depth))
	}
}

#[cfg(test)]
fn split(field: &str, operator: crate::Operator, value: f64) -> Predicate {
	Predicate::Split(crate::Split {
		operator,
		field: field.to_owned(),
		value: crate::Operand::Number(value),
		term: None,
		missing: false,
	})
}

/// The root splits on `x < 10`. Its left child splits again on `x < 2`.
#[cfg(test)]
fn test_forest() -> AnomalyForest {
	use crate::Operator::{Ge, Lt};
	use localml_features::{Field, Optype};
	let node = |predicates: Vec<Predicate>, population: u64, children: Vec<usize>| AnomalyNode {
		predicates,
		population,
		children,
	};
	let tree = IsolationTree {
		nodes: vec![
			node(vec![Predicate::True], 64, vec![1, 2]),
			node(vec![split("x", Lt, 10.0)], 60, vec![3, 4]),
			node(vec![split("x", Ge, 10.0)], 4, vec![]),
			node(vec![split("x", Lt, 2.0)], 1, vec![]),
			node(vec![split("x", Ge, 2.0)], 59, vec![]),
		],
	};
	AnomalyForest {
		trees: vec![tree.clone(), tree],
		fields: Arc::new(Fields::new(vec![Field::new("x", "x", Optype::Numeric)])),
		sample_size: 64,
		mean_depth: None,
	}
}

#[test]
fn test_average_path_length() {
	assert_eq!(average_path_length(1.0), 0.0);
	let expected = 2.0 * (255.0f64.ln() + EULER_GAMMA) - 2.0 * 255.0 / 256.0;
	assert!((average_path_length(256.0) - expected).abs() < 1e-12);
}

#[test]
fn test_anomaly_score() {
	assert_eq!(anomaly_score(0.0, 7.0), 1.0);
	let mut previous = 1.0;
	for depth in 1..20 {
		let score = anomaly_score(depth as f64, 7.0);
		assert!(score < previous);
		assert!(score > 0.0);
		previous = score;
	}
	assert!((anomaly_score(7.0, 7.0) - 0.5).abs() < 1e-12);
}

#[test]
fn test_depth() {
	let forest = test_forest();
	let tree = &forest.trees[0];
	let record = |x: f64| maplit::btreemap! { "x".to_owned() => localml_features::Value::Number(x) };
	// The isolated instance sits alone at depth 3.
	assert_eq!(tree.depth(&record(1.0), &forest.fields).unwrap(), 3.0);
	let expected = 2.0 + average_path_length(4.0);
	assert!((tree.depth(&record(20.0), &forest.fields).unwrap() - expected).abs() < 1e-12);
	// A missing field follows the most populated branch at every level.
	let expected = 3.0 + average_path_length(59.0);
	let depth = tree.depth(&localml_features::InputData::new(), &forest.fields).unwrap();
	assert!((depth - expected).abs() < 1e-12);
}

#[test]
fn test_score() {
	let forest = test_forest();
	let record = |x: f64| maplit::btreemap! { "x".to_owned() => localml_features::Value::Number(x) };
	let outlier = forest.score(&record(1.0)).unwrap();
	let inlier = forest.score(&record(5.0)).unwrap();
	assert!(outlier > inlier);
	assert!(outlier > 0.0 && outlier <= 1.0);
	let expected = anomaly_score(3.0, average_path_length(64.0));
	assert!((outlier - expected).abs() < 1e-12);
	let capped = AnomalyForest {
		mean_depth: Some(2.0),
		..test_forest()
	};
	assert_eq!(capped.expected_mean_depth(), 2.0);
}
