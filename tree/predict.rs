use crate::{DistributionUnit, MissingStrategy, Node, NodeKind, Predicate, TraversalOptions, Tree};
use crate::predicate::Evaluation;
use localml_features::{InputData, Optype};
use localml_metrics::{
	mean, median, merge_bins, regression_error, variance, ws_confidence, Distribution, Outcome,
	BINS_LIMIT,
};
use localml_util::{Error, Result};
use log::{debug, trace};
use num_traits::ToPrimitive;

/// The prediction of a single tree.
#[derive(Clone, Debug, PartialEq)]
pub struct TreePrediction {
	pub prediction: Outcome,
	/// The Wilson score lower bound for classification, or the error band for regression.
	pub confidence: f64,
	/// The share of instances with the predicted category. Regression trees do not report one.
	pub probability: Option<f64>,
	pub count: u64,
	pub median: Option<f64>,
	/// The rules of the branches taken, from the root down.
	pub path: Vec<String>,
	pub distribution: Distribution,
	pub distribution_unit: DistributionUnit,
	/// The name of the field the node the traversal stopped at would have split on.
	pub next: Option<String>,
}

struct ProportionalResult {
	distribution: Distribution,
	population: u64,
	last_node: usize,
	/// The node where the traversal first fanned out into all of its children.
	fanned_out_at: Option<usize>,
}

impl Tree {
	/// Make a prediction for a normalized input.
	pub fn predict(&self, input: &InputData, options: &TraversalOptions) -> Result<TreePrediction> {
		match options.missing_strategy {
			MissingStrategy::LastPrediction => self.predict_last(input, options.z),
			MissingStrategy::Proportional => self.predict_proportional(input, options.z),
		}
	}

	fn predict_last(&self, input: &InputData, z: f64) -> Result<TreePrediction> {
		let mut path = Vec::new();
		// Start at the root node.
		let mut node_index = 0;
		loop {
			let node = &self.nodes[node_index];
			match self.choose_child(node, input)? {
				Some(child_index) => {
					let rule = self.nodes[child_index].predicate.rule(&self.fields);
					trace!("descending into node {}: {}", child_index, rule);
					path.push(rule);
					node_index = child_index;
				}
				None => {
					if !node.children().is_empty() {
						debug!("no branch holds at node {}, stopping", node_index);
					}
					return self.node_prediction(node, path, z);
				}
			}
		}
	}

	fn predict_proportional(&self, input: &InputData, z: f64) -> Result<TreePrediction> {
		let mut path = Vec::new();
		let result = self.proportional(0, input, &mut path, false)?;
		let fan_out_index = match result.fanned_out_at {
			Some(fan_out_index) => fan_out_index,
			// Nothing was missing, so this is exactly the single path prediction.
			None => return self.node_prediction(&self.nodes[result.last_node], path, z),
		};
		let fan_out_node = &self.nodes[fan_out_index];
		let next = self.split_field_name(fan_out_node);
		if self.regression {
			let points = result.distribution.points();
			let distribution_unit = if points.len() > BINS_LIMIT {
				DistributionUnit::Bins
			} else {
				DistributionUnit::Counts
			};
			let bins = merge_bins(&points, BINS_LIMIT);
			let total: u64 = bins.iter().map(|(_, count)| count).sum();
			let (prediction, confidence) = if bins.len() == 1 {
				// A single bin has no spread of its own, so the error of the node that fanned out is scaled down instead.
				let parent_confidence = self.regression_confidence(fan_out_node, z);
				let instances = total.max(1).to_f64().unwrap_or(1.0);
				(bins[0].0, parent_confidence / instances.sqrt())
			} else {
				let prediction = mean(&bins)
					.or_else(|| fan_out_node.output.as_number())
					.unwrap_or(0.0);
				let confidence = regression_error(variance(&bins, prediction), total, z);
				(prediction, confidence)
			};
			let distribution = Distribution::from_points(&bins)
				.map_err(|_| Error::invalid_model("regression distribution is not finite"))?;
			Ok(TreePrediction {
				prediction: Outcome::number(prediction)
					.map_err(|_| Error::invalid_model("regression prediction is not finite"))?,
				confidence,
				probability: None,
				count: total,
				median: median(&bins, total),
				path,
				distribution,
				distribution_unit,
				next,
			})
		} else {
			let prediction = result
				.distribution
				.sorted_by_count()
				.into_iter()
				.next()
				.map(|(outcome, _)| outcome)
				.unwrap_or_else(|| fan_out_node.output.clone());
			let confidence = ws_confidence(
				&prediction,
				&result.distribution,
				Some(result.population),
				Some(z),
			);
			let probability = result.distribution.probability(&prediction);
			Ok(TreePrediction {
				prediction,
				confidence,
				probability: Some(probability),
				count: result.population,
				median: None,
				path,
				distribution: result.distribution,
				distribution_unit: DistributionUnit::Categories,
				next,
			})
		}
	}

	fn proportional(
		&self,
		node_index: usize,
		input: &InputData,
		path: &mut Vec<String>,
		missing_found: bool,
	) -> Result<ProportionalResult> {
		let node = &self.nodes[node_index];
		let leaf = ProportionalResult {
			distribution: node.distribution.clone(),
			population: node.count,
			last_node: node_index,
			fanned_out_at: None,
		};
		let children = node.children();
		if children.is_empty() {
			return Ok(leaf);
		}
		if self.follows_one_branch(children, input) {
			return match self.choose_child(node, input)? {
				Some(child_index) => {
					let rule = self.nodes[child_index].predicate.rule(&self.fields);
					if !missing_found && !path.contains(&rule) {
						path.push(rule);
					}
					self.proportional(child_index, input, path, missing_found)
				}
				None => Ok(leaf),
			};
		}
		debug!("field missing at node {}, merging all branches", node_index);
		let mut distribution = Distribution::default();
		let mut population = 0;
		for child_index in children {
			let result = self.proportional(*child_index, input, path, true)?;
			distribution = distribution.merge(&result.distribution);
			population += result.population;
		}
		Ok(ProportionalResult {
			distribution,
			population,
			last_node: node_index,
			fanned_out_at: Some(node_index),
		})
	}

	/// The first child whose predicate holds. A catch-all child is not taken once a sibling found its field missing.
	fn choose_child(&self, node: &Node, input: &InputData) -> Result<Option<usize>> {
		let mut missing = false;
		for child_index in node.children() {
			let predicate = &self.nodes[*child_index].predicate;
			match (predicate, predicate.apply(input, &self.fields)?) {
				(Predicate::True, _) if missing => return Ok(None),
				(_, Evaluation::True) => return Ok(Some(*child_index)),
				(_, Evaluation::Missing) => missing = true,
				(_, Evaluation::False) => {}
			}
		}
		Ok(None)
	}

	/// A branch is chosen without fanning out if its field is present, if a child handles missing values explicitly, or if the field is text or items, whose absence means zero occurrences.
	fn follows_one_branch(&self, children: &[usize], input: &InputData) -> bool {
		let splits = children
			.iter()
			.filter_map(|child_index| match &self.nodes[*child_index].predicate {
				Predicate::Split(split) => Some(split),
				Predicate::True => None,
			})
			.collect::<Vec<_>>();
		let field = match splits.first() {
			Some(split) => &split.field,
			None => return true,
		};
		input.contains_key(field)
			|| splits
				.iter()
				.any(|split| split.missing || split.value == crate::Operand::Null)
			|| matches!(
				self.fields.get(field).map(|field| field.optype),
				Some(Optype::Text) | Some(Optype::Items)
			)
	}

	fn split_field_name(&self, node: &Node) -> Option<String> {
		node.children()
			.iter()
			.filter_map(|child_index| self.nodes[*child_index].predicate.field())
			.next()
			.map(|field| self.fields.name(field).to_owned())
	}

	fn regression_confidence(&self, node: &Node, z: f64) -> f64 {
		let points = node.distribution.points();
		let center = node
			.output
			.as_number()
			.or_else(|| mean(&points))
			.unwrap_or(0.0);
		regression_error(variance(&points, center), node.count, z)
	}

	fn node_prediction(&self, node: &Node, path: Vec<String>, z: f64) -> Result<TreePrediction> {
		let next = match node.kind {
			NodeKind::Branch(_) => self.split_field_name(node),
			NodeKind::Leaf => None,
		};
		if self.regression {
			let points = node.distribution.points();
			let median = node.median.or_else(|| median(&points, node.count));
			Ok(TreePrediction {
				prediction: node.output.clone(),
				confidence: self.regression_confidence(node, z),
				probability: None,
				count: node.count,
				median,
				path,
				distribution: node.distribution.clone(),
				distribution_unit: node.distribution_unit,
				next,
			})
		} else {
			Ok(TreePrediction {
				prediction: node.output.clone(),
				confidence: ws_confidence(&node.output, &node.distribution, Some(node.count), Some(z)),
				probability: Some(node.distribution.probability(&node.output)),
				count: node.count,
				median: None,
				path,
				distribution: node.distribution.clone(),
				distribution_unit: node.distribution_unit,
				next,
			})
		}
	}
}

#[cfg(test)]
pub(crate) mod test {
	use crate::*;
	use localml_features::{Field, Fields, Optype};
	use localml_metrics::{Distribution, Outcome};
	use std::sync::Arc;

	pub fn categories(entries: &[(&str, u64)]) -> Distribution {
		Distribution::new(
			entries
				.iter()
				.map(|(value, count)| (Outcome::Category((*value).to_owned()), *count))
				.collect(),
		)
	}

	pub fn node(predicate: Predicate, distribution: Distribution, children: Vec<usize>) -> Node {
		let output = distribution
			.mode()
			.cloned()
			.unwrap_or_else(|| Outcome::Category(String::new()));
		let kind = if children.is_empty() {
			NodeKind::Leaf
		} else {
			NodeKind::Branch(BranchNode { children })
		};
		Node {
			predicate,
			count: distribution.total(),
			distribution,
			distribution_unit: DistributionUnit::Categories,
			output,
			median: None,
			kind,
		}
	}

	pub fn equals(field: &str, value: &str) -> Predicate {
		Predicate::Split(Split {
			operator: Operator::Eq,
			field: field.to_owned(),
			value: Operand::Text(value.to_owned()),
			term: None,
			missing: false,
		})
	}

	/// The root `{A:7,B:3}` has a branch `field1 = x` leading to `{A:5,B:0}` and a catch-all branch leading to `{A:2,B:3}`.
	pub fn two_level_tree() -> Tree {
		let fields = Fields::new(vec![
			Field::new("field1", "field1", Optype::Categorical),
			Field::new("objective", "objective", Optype::Categorical),
		]);
		Tree {
			nodes: vec![
				node(Predicate::True, categories(&[("A", 7), ("B", 3)]), vec![1, 2]),
				node(equals("field1", "x"), categories(&[("A", 5), ("B", 0)]), vec![]),
				node(Predicate::True, categories(&[("A", 2), ("B", 3)]), vec![]),
			],
			fields: Arc::new(fields),
			objective_field: "objective".to_owned(),
			regression: false,
		}
	}

	/// A regression tree splitting on `x > 5` with a missing-tolerant first branch on `y`.
	pub fn regression_tree() -> Tree {
		let fields = Fields::new(vec![
			Field::new("x", "x", Optype::Numeric),
			Field::new("y", "y", Optype::Categorical),
			Field::new("target", "target", Optype::Numeric),
		]);
		let numeric = |points: &[(f64, u64)], children: Vec<usize>, predicate: Predicate| {
			let distribution = Distribution::from_points(points).unwrap();
			let output = Outcome::number(localml_metrics::mean(points).unwrap()).unwrap();
			Node {
				predicate,
				count: distribution.total(),
				distribution,
				distribution_unit: DistributionUnit::Counts,
				output,
				median: None,
				kind: if children.is_empty() {
					NodeKind::Leaf
				} else {
					NodeKind::Branch(BranchNode { children })
				},
			}
		};
		let split = |operator: Operator, value: f64| {
			Predicate::Split(Split {
				operator,
				field: "x".to_owned(),
				value: Operand::Number(value),
				term: None,
				missing: false,
			})
		};
		Tree {
			nodes: vec![
				numeric(
					&[(1.0, 2), (2.0, 2), (10.0, 3), (12.0, 1)],
					vec![1, 2],
					Predicate::True,
				),
				numeric(&[(1.0, 2), (2.0, 2)], vec![], split(Operator::Le, 5.0)),
				numeric(&[(10.0, 3), (12.0, 1)], vec![], split(Operator::Gt, 5.0)),
			],
			fields: Arc::new(fields),
			objective_field: "target".to_owned(),
			regression: true,
		}
	}

	pub fn input(entries: &[(&str, &str)]) -> localml_features::InputData {
		entries
			.iter()
			.map(|(field, value)| {
				(
					(*field).to_owned(),
					localml_features::Value::Text((*value).to_owned()),
				)
			})
			.collect()
	}

	fn options(missing_strategy: MissingStrategy) -> TraversalOptions {
		TraversalOptions {
			missing_strategy,
			..TraversalOptions::default()
		}
	}

	#[test]
	fn test_predict_present_field() {
		let tree = two_level_tree();
		let prediction = tree
			.predict(&input(&[("field1", "x")]), &TraversalOptions::default())
			.unwrap();
		assert_eq!(prediction.prediction, Outcome::Category("A".to_owned()));
		assert_eq!(prediction.count, 5);
		let wilson = localml_metrics::wilson_lower_bound(1.0, 5.0, 1.96);
		assert!((prediction.confidence - wilson).abs() < 1e-12);
		assert_eq!(prediction.probability, Some(1.0));
		assert_eq!(prediction.path, vec!["field1 = x".to_owned()]);
		assert_eq!(prediction.next, None);
	}

	#[test]
	fn test_predict_catch_all() {
		let tree = two_level_tree();
		let prediction = tree
			.predict(&input(&[("field1", "y")]), &TraversalOptions::default())
			.unwrap();
		assert_eq!(prediction.prediction, Outcome::Category("B".to_owned()));
		assert_eq!(prediction.count, 5);
		assert_eq!(prediction.path, vec!["T".to_owned()]);
	}

	#[test]
	fn test_predict_missing_last_prediction() {
		let tree = two_level_tree();
		let prediction = tree
			.predict(&input(&[]), &options(MissingStrategy::LastPrediction))
			.unwrap();
		assert_eq!(prediction.prediction, Outcome::Category("A".to_owned()));
		assert_eq!(prediction.count, 10);
		assert!(prediction.path.is_empty());
		assert_eq!(prediction.next.as_deref(), Some("field1"));
	}

	#[test]
	fn test_predict_missing_proportional() {
		let tree = two_level_tree();
		let prediction = tree
			.predict(&input(&[]), &options(MissingStrategy::Proportional))
			.unwrap();
		assert_eq!(prediction.prediction, Outcome::Category("A".to_owned()));
		assert_eq!(prediction.distribution, categories(&[("A", 7), ("B", 3)]));
		assert_eq!(prediction.count, 10);
		let confidence = localml_metrics::wilson_lower_bound(0.7, 10.0, 1.96);
		assert!((prediction.confidence - confidence).abs() < 1e-12);
	}

	#[test]
	fn test_proportional_without_missing_fields_is_single_path() {
		let tree = two_level_tree();
		for value in &["x", "y"] {
			let record = input(&[("field1", value)]);
			let single = tree
				.predict(&record, &options(MissingStrategy::LastPrediction))
				.unwrap();
			let proportional = tree
				.predict(&record, &options(MissingStrategy::Proportional))
				.unwrap();
			assert_eq!(single, proportional);
		}
		let tree = regression_tree();
		let record = maplit::btreemap! { "x".to_owned() => localml_features::Value::Number(7.0) };
		assert_eq!(
			tree.predict(&record, &options(MissingStrategy::LastPrediction))
				.unwrap(),
			tree.predict(&record, &options(MissingStrategy::Proportional))
				.unwrap()
		);
	}

	#[test]
	fn test_classification_bounds() {
		let tree = two_level_tree();
		for node in tree.nodes.iter() {
			assert_eq!(node.distribution.total(), node.count);
		}
		for record in &[input(&[("field1", "x")]), input(&[("field1", "z")]), input(&[])] {
			for strategy in &[MissingStrategy::LastPrediction, MissingStrategy::Proportional] {
				let prediction = tree.predict(record, &options(*strategy)).unwrap();
				assert!(prediction.confidence >= 0.0 && prediction.confidence <= 1.0);
				let probability = prediction.probability.unwrap();
				assert!(probability >= 0.0 && probability <= 1.0);
			}
		}
	}

	#[test]
	fn test_regression() {
		let tree = regression_tree();
		let record = maplit::btreemap! { "x".to_owned() => localml_features::Value::Number(3.0) };
		let prediction = tree.predict(&record, &TraversalOptions::default()).unwrap();
		assert_eq!(prediction.prediction.as_number(), Some(1.5));
		assert_eq!(prediction.probability, None);
		assert_eq!(prediction.count, 4);
		assert_eq!(prediction.median, Some(2.0));
		// variance = 1 / 3 over 4 instances
		let expected = 1.96 * (1.0f64 / 3.0 / 4.0).sqrt();
		assert!((prediction.confidence - expected).abs() < 1e-12);
		let prediction = tree
			.predict(&input(&[]), &options(MissingStrategy::Proportional))
			.unwrap();
		assert_eq!(prediction.prediction.as_number(), Some(6.0));
		assert_eq!(prediction.count, 8);
		assert_eq!(prediction.next.as_deref(), Some("x"));
		assert_eq!(prediction.distribution_unit, DistributionUnit::Counts);
	}
}
