/*!
This module converts the raw model descriptions in [`model`](../model/index.html) into the strongly typed structures the evaluators run on. Every structural problem with a model is reported here, so a model that loads successfully never fails a prediction because of its own shape.
*/

use crate::model;
use localml_features::{
	DatetimeComponent, DatetimePart, Field, FieldSummary, Fields, Optype, TermAnalysis, TokenMode,
};
use localml_linear::{
	FeatureGroup, LogisticRegression, NumericFeatureGroup, NumericMissing, TermsFeatureGroup,
};
use localml_metrics::{mean, Distribution, Outcome};
use localml_tree::{
	AnomalyForest, AnomalyNode, BranchNode, DistributionUnit, IsolationTree, Node, NodeKind, Operand,
	Operator, Predicate, Split, Tree,
};
use localml_util::{Error, Result};
use log::debug;
use ndarray::prelude::*;
use std::{convert::TryFrom, sync::Arc};

pub fn load_fields(fields: model::Fields) -> Result<Fields> {
	let fields = fields
		.into_iter()
		.map(|(id, field)| load_field(id, field))
		.collect::<Result<Vec<_>>>()?;
	Ok(Fields::new(fields))
}

fn load_field(id: String, field: model::Field) -> Result<Field> {
	let optype = Optype::parse(&field.optype).ok_or_else(|| {
		Error::invalid_model(format!(
			"field \"{}\" has unknown optype \"{}\"",
			id, field.optype
		))
	})?;
	let term_analysis = match field.term_analysis {
		Some(term_analysis) => TermAnalysis {
			case_sensitive: term_analysis.case_sensitive,
			token_mode: match term_analysis.token_mode.as_deref() {
				None => TokenMode::All,
				Some(token_mode) => TokenMode::parse(token_mode).ok_or_else(|| {
					Error::invalid_model(format!(
						"field \"{}\" has unknown token mode \"{}\"",
						id, token_mode
					))
				})?,
			},
		},
		None => TermAnalysis::default(),
	};
	let datetime_component = match field.parent_ids.first() {
		Some(parent_id) if optype == Optype::Numeric => {
			let datatype = field.datatype.as_deref().unwrap_or_default();
			let part = DatetimePart::parse(datatype).ok_or_else(|| {
				Error::invalid_model(format!(
					"field \"{}\" is generated from \"{}\" with unknown datatype \"{}\"",
					id, parent_id, datatype
				))
			})?;
			Some(DatetimeComponent {
				parent_id: parent_id.clone(),
				part,
			})
		}
		_ => None,
	};
	let categories = field
		.summary
		.categories
		.iter()
		.map(|(value, count)| {
			let name = json_to_string(value).ok_or_else(|| {
				Error::invalid_model(format!("field \"{}\" has a category of {}", id, value))
			})?;
			Ok((name, *count))
		})
		.collect::<Result<Vec<_>>>()?;
	let summary = FieldSummary {
		categories,
		tag_cloud: field.summary.tag_cloud.into_iter().map(|(term, _)| term).collect(),
		items: field.summary.items.into_iter().map(|(item, _)| item).collect(),
		term_forms: field.summary.term_forms,
		mean: field.summary.mean,
		median: field.summary.median,
		minimum: field.summary.minimum,
		maximum: field.summary.maximum,
		standard_deviation: field.summary.standard_deviation,
	};
	let item_separator = field
		.item_analysis
		.and_then(|item_analysis| item_analysis.separator)
		.unwrap_or_else(|| ",".to_owned());
	Ok(Field {
		id,
		name: field.name,
		optype,
		prefix: field.prefix,
		suffix: field.suffix,
		summary,
		term_analysis,
		item_separator,
		datetime_component,
	})
}

/// Categories are strings in most models, but some services emit numbers and booleans.
pub(crate) fn json_to_string(value: &serde_json::Value) -> Option<String> {
	match value {
		serde_json::Value::String(value) => Some(value.clone()),
		serde_json::Value::Number(value) => Some(value.to_string()),
		serde_json::Value::Bool(value) => Some(value.to_string()),
		_ => None,
	}
}

/// Look up the summary statistic a model asks missing numerics to be replaced with.
pub(crate) fn numeric_default(field: &Field, statistic: &str) -> Result<Option<f64>> {
	let summary = &field.summary;
	let value = match statistic {
		"mean" => summary.mean,
		"median" => summary.median,
		"minimum" => summary.minimum,
		"maximum" => summary.maximum,
		"zero" => Some(0.0),
		_ => {
			return Err(Error::invalid_model(format!(
				"unknown default numeric value \"{}\"",
				statistic
			)))
		}
	};
	Ok(value)
}

pub fn load_predicate(predicate: model::Predicate, fields: &Fields) -> Result<Predicate> {
	let split = match predicate {
		model::Predicate::Constant(true) => return Ok(Predicate::True),
		model::Predicate::Constant(false) => {
			return Err(Error::invalid_model("a predicate cannot be constantly false"))
		}
		model::Predicate::Split(split) => split,
	};
	let operator = split
		.operator
		.ok_or_else(|| Error::invalid_model("predicate has no operator"))?;
	let operator = Operator::parse(&operator)?;
	let field_id = split
		.field
		.ok_or_else(|| Error::invalid_model("predicate has no field"))?;
	let field = fields.get(&field_id).ok_or_else(|| {
		Error::invalid_model(format!("predicate references unknown field \"{}\"", field_id))
	})?;
	if split.term.is_some() && !matches!(field.optype, Optype::Text | Optype::Items) {
		return Err(Error::invalid_model(format!(
			"predicate tests a term of {} field \"{}\"",
			field.optype, field_id
		)));
	}
	Ok(Predicate::Split(Split {
		operator,
		field: field_id,
		value: load_operand(&split.value)?,
		term: split.term,
		missing: split.missing,
	}))
}

fn load_operand(value: &serde_json::Value) -> Result<Operand> {
	match value {
		serde_json::Value::Null => Ok(Operand::Null),
		serde_json::Value::Number(number) => number
			.as_f64()
			.map(Operand::Number)
			.ok_or_else(|| Error::invalid_model(format!("predicate value {} is not a number", number))),
		serde_json::Value::String(text) => Ok(Operand::Text(text.clone())),
		serde_json::Value::Bool(flag) => Ok(Operand::Text(flag.to_string())),
		serde_json::Value::Array(values) => Ok(Operand::Set(
			values.iter().map(load_operand).collect::<Result<Vec<_>>>()?,
		)),
		serde_json::Value::Object(_) => Err(Error::invalid_model(format!(
			"predicate value {} is not a constant",
			value
		))),
	}
}

/// The objective field named by a tree model, which is either `objective_field` or the first of `objective_fields`.
fn objective_field(
	objective_field: Option<String>,
	objective_fields: Option<Vec<String>>,
) -> Result<String> {
	objective_field
		.or_else(|| objective_fields.and_then(|fields| fields.into_iter().next()))
		.ok_or_else(|| Error::invalid_model("the model has no objective field"))
}

impl TryFrom<model::TreeModel> for Tree {
	type Error = Error;
	fn try_from(value: model::TreeModel) -> Result<Tree> {
		let fields = load_fields(value.model.fields)?;
		let objective_field = objective_field(value.objective_field, value.objective_fields)?;
		let objective = fields.get(&objective_field).ok_or_else(|| {
			Error::invalid_model(format!(
				"objective field \"{}\" is not a field of the model",
				objective_field
			))
		})?;
		let regression = match objective.optype {
			Optype::Numeric => true,
			Optype::Categorical => false,
			optype => {
				return Err(Error::invalid_model(format!(
					"the objective field of a tree cannot be {}",
					optype
				)))
			}
		};
		let mut nodes = Vec::new();
		load_node(value.model.root, &fields, regression, &mut nodes)?;
		debug!(
			"loaded {} tree {} with {} nodes",
			if regression { "regression" } else { "classification" },
			value.resource.as_deref().unwrap_or("(local)"),
			nodes.len()
		);
		Ok(Tree {
			nodes,
			fields: Arc::new(fields),
			objective_field,
			regression,
		})
	}
}

/// Nodes are stored in preorder, so the root lands at index 0. Returns the index of `node`.
fn load_node(
	node: model::Node,
	fields: &Fields,
	regression: bool,
	nodes: &mut Vec<Node>,
) -> Result<usize> {
	let predicate = load_predicate(node.predicate, fields)?;
	let (distribution, distribution_unit) =
		load_objective_summary(node.objective_summary.unwrap_or_default(), node.count)?;
	if regression == (distribution_unit == DistributionUnit::Categories) && !distribution.is_empty()
	{
		return Err(Error::invalid_model(format!(
			"a {} tree has a node distributed in {:?}",
			if regression { "regression" } else { "classification" },
			distribution_unit
		)));
	}
	let output = load_output(node.output.as_ref(), &distribution, regression)?;
	let index = nodes.len();
	nodes.push(Node {
		predicate,
		count: node.count,
		distribution,
		distribution_unit,
		output,
		median: node.median,
		kind: NodeKind::Leaf,
	});
	if !node.children.is_empty() {
		let children = node
			.children
			.into_iter()
			.map(|child| load_node(child, fields, regression, nodes))
			.collect::<Result<Vec<_>>>()?;
		let children_count: u64 = children.iter().map(|child| nodes[*child].count).sum();
		if children_count != nodes[index].count {
			return Err(Error::invalid_model(format!(
				"node children hold {} instances but the node count is {}",
				children_count, nodes[index].count
			)));
		}
		nodes[index].kind = NodeKind::Branch(BranchNode { children });
	}
	Ok(index)
}

fn load_objective_summary(
	summary: model::ObjectiveSummary,
	count: u64,
) -> Result<(Distribution, DistributionUnit)> {
	let (distribution, unit) = match summary {
		model::ObjectiveSummary {
			categories: Some(categories),
			..
		} => {
			let entries = categories
				.iter()
				.map(|(value, count)| {
					let category = json_to_string(value).ok_or_else(|| {
						Error::invalid_model(format!("node distribution has a category of {}", value))
					})?;
					Ok((Outcome::Category(category), *count))
				})
				.collect::<Result<Vec<_>>>()?;
			(Distribution::new(entries), DistributionUnit::Categories)
		}
		model::ObjectiveSummary {
			bins: Some(points), ..
		} => (points_distribution(&points)?, DistributionUnit::Bins),
		model::ObjectiveSummary {
			counts: Some(points),
			..
		} => (points_distribution(&points)?, DistributionUnit::Counts),
		_ => return Err(Error::invalid_model("node has no objective summary")),
	};
	if distribution.total() != count {
		return Err(Error::invalid_model(format!(
			"node distribution holds {} instances but the node count is {}",
			distribution.total(),
			count
		)));
	}
	Ok((distribution, unit))
}

fn points_distribution(points: &[(f64, u64)]) -> Result<Distribution> {
	Distribution::from_points(points)
		.map_err(|_| Error::invalid_model("node distribution has a point that is not finite"))
}

/// The output a node declares, or the one its distribution implies.
fn load_output(
	output: Option<&serde_json::Value>,
	distribution: &Distribution,
	regression: bool,
) -> Result<Outcome> {
	let not_finite = |_| Error::invalid_model("node output is not finite");
	match (output, regression) {
		(Some(serde_json::Value::Number(number)), true) => number
			.as_f64()
			.ok_or_else(|| Error::invalid_model("node output is not a number"))
			.and_then(|value| Outcome::number(value).map_err(not_finite)),
		(Some(value), false) if !value.is_null() => json_to_string(value)
			.map(Outcome::Category)
			.ok_or_else(|| Error::invalid_model(format!("node output {} is not a category", value))),
		(Some(value), true) if !value.is_null() => Err(Error::invalid_model(format!(
			"node output {} is not a number",
			value
		))),
		(_, true) => Outcome::number(mean(&distribution.points()).unwrap_or(0.0)).map_err(not_finite),
		(_, false) => distribution
			.mode()
			.cloned()
			.ok_or_else(|| Error::invalid_model("node has neither an output nor a distribution")),
	}
}

/// Assemble an ensemble from its description and its member models, given in the order the description lists them.
pub fn load_ensemble(
	ensemble: model::Ensemble,
	members: Vec<model::TreeModel>,
) -> Result<localml_tree::Ensemble> {
	if ensemble.models.is_empty() {
		return Err(Error::invalid_model("the ensemble has no members"));
	}
	if members.len() != ensemble.models.len() {
		return Err(Error::invalid_model(format!(
			"the ensemble lists {} members but {} were loaded",
			ensemble.models.len(),
			members.len()
		)));
	}
	if let Some(weights) = ensemble.weights.as_ref() {
		if weights.len() != ensemble.models.len() {
			return Err(Error::invalid_model(format!(
				"the ensemble has {} members but {} weights",
				ensemble.models.len(),
				weights.len()
			)));
		}
	}
	let trees = members
		.into_iter()
		.map(Tree::try_from)
		.collect::<Result<Vec<_>>>()?;
	let first = &trees[0];
	for (id, tree) in ensemble.models.iter().zip(trees.iter()) {
		if tree.regression != first.regression || tree.objective_field != first.objective_field {
			return Err(Error::invalid_model(format!(
				"member \"{}\" does not predict the same objective as the rest of the ensemble",
				id
			)));
		}
	}
	if let Some(objective_field) = ensemble.objective_field.as_ref() {
		if *objective_field != first.objective_field {
			return Err(Error::invalid_model(format!(
				"the ensemble predicts \"{}\" but its members predict \"{}\"",
				objective_field, first.objective_field
			)));
		}
	}
	Ok(localml_tree::Ensemble {
		trees,
		weights: ensemble.weights,
	})
}

impl TryFrom<model::Anomaly> for AnomalyForest {
	type Error = Error;
	fn try_from(value: model::Anomaly) -> Result<AnomalyForest> {
		let model = value.model;
		let fields = load_fields(model.fields)?;
		if model.trees.is_empty() {
			return Err(Error::invalid_model("the isolation forest has no trees"));
		}
		if model.sample_size < 2 {
			return Err(Error::invalid_model(format!(
				"the isolation forest was grown from {} instances",
				model.sample_size
			)));
		}
		let trees = model
			.trees
			.into_iter()
			.map(|tree| {
				let mut nodes = Vec::new();
				load_anomaly_node(tree.root, &fields, &mut nodes)?;
				Ok(IsolationTree { nodes })
			})
			.collect::<Result<Vec<_>>>()?;
		Ok(AnomalyForest {
			trees,
			fields: Arc::new(fields),
			sample_size: model.sample_size,
			mean_depth: model.mean_depth,
		})
	}
}

fn load_anomaly_node(
	node: model::AnomalyNode,
	fields: &Fields,
	nodes: &mut Vec<AnomalyNode>,
) -> Result<usize> {
	let predicates = node
		.predicates
		.into_iter()
		.map(|predicate| load_predicate(predicate, fields))
		.collect::<Result<Vec<_>>>()?;
	let index = nodes.len();
	nodes.push(AnomalyNode {
		predicates,
		population: node.population,
		children: Vec::new(),
	});
	let children = node
		.children
		.into_iter()
		.map(|child| load_anomaly_node(child, fields, nodes))
		.collect::<Result<Vec<_>>>()?;
	nodes[index].children = children;
	Ok(index)
}

impl TryFrom<model::LogisticRegression> for LogisticRegression {
	type Error = Error;
	fn try_from(value: model::LogisticRegression) -> Result<LogisticRegression> {
		let body = value.logistic_regression;
		if !body.field_codings.is_empty() {
			return Err(Error::invalid_model(
				"logistic regressions with field codings are not supported",
			));
		}
		let fields = load_fields(body.fields)?;
		let objective_field = value.objective_field;
		let objective = fields.get(&objective_field).ok_or_else(|| {
			Error::invalid_model(format!(
				"objective field \"{}\" is not a field of the model",
				objective_field
			))
		})?;
		let default_numeric_value = value.default_numeric_value.as_deref().unwrap_or("mean");
		let missing_numerics = body.missing_numerics;
		let input_fields = if value.input_fields.is_empty() {
			fields.iter().map(|field| field.id.clone()).collect()
		} else {
			value.input_fields
		};
		let groups = input_fields
			.iter()
			.filter(|id| **id != objective_field)
			.map(|id| {
				fields.get(id).ok_or_else(|| {
					Error::invalid_model(format!("input field \"{}\" is not a field of the model", id))
				})
			})
			.filter_map(|field| match field {
				Ok(field) if field.optype == Optype::Datetime => None,
				field => Some(field),
			})
			.map(|field| feature_group(field?, missing_numerics, default_numeric_value))
			.collect::<Result<Vec<_>>>()?;
		let n_features: usize = groups.iter().map(|group| group.n_features()).sum();
		let n_vectors = groups.len() + if body.bias { 1 } else { 0 };
		let mut classes = Vec::with_capacity(body.coefficients.len());
		let mut weights = Vec::with_capacity(body.coefficients.len() * n_features);
		let mut biases = Vec::with_capacity(body.coefficients.len());
		for (class, coefficients) in body.coefficients.iter() {
			let class = json_to_string(class).ok_or_else(|| {
				Error::invalid_model(format!("coefficients are given for class {}", class))
			})?;
			if coefficients.len() != n_vectors {
				return Err(Error::invalid_model(format!(
					"class \"{}\" has {} coefficient vectors but the model has {} input fields{}",
					class,
					coefficients.len(),
					groups.len(),
					if body.bias { " and a bias" } else { "" }
				)));
			}
			for (group, group_coefficients) in groups.iter().zip(coefficients.iter()) {
				if group_coefficients.len() != group.n_features() {
					return Err(Error::invalid_model(format!(
						"class \"{}\" has {} coefficients for field \"{}\" but {} were expected",
						class,
						group_coefficients.len(),
						group.field(),
						group.n_features()
					)));
				}
				weights.extend_from_slice(group_coefficients);
			}
			let bias = if body.bias {
				coefficients
					.last()
					.and_then(|bias| bias.first())
					.cloned()
					.ok_or_else(|| Error::invalid_model(format!("class \"{}\" has an empty bias", class)))?
			} else {
				0.0
			};
			biases.push(bias);
			classes.push(class);
		}
		match classes.len() {
			0 => return Err(Error::invalid_model("the model has no coefficients")),
			1 => {
				let negative = objective
					.category_names()
					.into_iter()
					.find(|category| *category != classes[0])
					.ok_or_else(|| {
						Error::invalid_model("a binary model needs a second objective category")
					})?
					.to_owned();
				classes.push(negative);
			}
			_ => {}
		}
		let weights = Array2::from_shape_vec((biases.len(), n_features), weights)
			.map_err(|error| Error::invalid_model(error.to_string()))?;
		Ok(LogisticRegression {
			classes,
			groups,
			weights,
			biases: Array1::from(biases),
			fields: Arc::new(fields),
			lr_normalize: body.lr_normalize,
			balance_fields: body.balance_fields,
		})
	}
}

fn feature_group(field: &Field, missing_numerics: bool, default_numeric_value: &str) -> Result<FeatureGroup> {
	let terms = |terms: Vec<String>| TermsFeatureGroup {
		field: field.id.clone(),
		terms,
	};
	let group = match field.optype {
		Optype::Numeric => {
			let missing = if missing_numerics {
				NumericMissing::Coefficient
			} else {
				let value = numeric_default(field, default_numeric_value)?.ok_or_else(|| {
					Error::invalid_model(format!(
						"field \"{}\" has no {} to replace missing values with",
						field.id, default_numeric_value
					))
				})?;
				NumericMissing::Default(value)
			};
			FeatureGroup::Numeric(NumericFeatureGroup {
				field: field.id.clone(),
				missing,
				mean: field.summary.mean.unwrap_or(0.0),
				standard_deviation: field.summary.standard_deviation.unwrap_or(0.0),
			})
		}
		Optype::Categorical => FeatureGroup::Categorical(terms(
			field
				.category_names()
				.into_iter()
				.map(|category| category.to_owned())
				.collect(),
		)),
		Optype::Text => FeatureGroup::Terms(terms(field.summary.tag_cloud.clone())),
		Optype::Items => FeatureGroup::Terms(terms(field.summary.items.clone())),
		Optype::Datetime => {
			return Err(Error::invalid_model(format!(
				"datetime field \"{}\" cannot be encoded directly",
				field.id
			)))
		}
	};
	Ok(group)
}

#[cfg(test)]
fn tree_description() -> serde_json::Value {
	serde_json::json!({
		"resource": "model/1",
		"objective_field": "000001",
		"model": {
			"fields": {
				"000000": { "name": "field1", "optype": "categorical" },
				"000001": {
					"name": "label",
					"optype": "categorical",
					"summary": { "categories": [["A", 9], ["B", 6]] }
				}
			},
			"root": {
				"predicate": true,
				"count": 10,
				"output": "A",
				"objective_summary": { "categories": [["A", 7], ["B", 3]] },
				"children": [
					{
						"predicate": { "operator": "=", "field": "000000", "value": "x" },
						"count": 5,
						"objective_summary": { "categories": [["A", 5]] }
					},
					{
						"predicate": true,
						"count": 5,
						"objective_summary": { "categories": [["A", 2], ["B", 3]] }
					}
				]
			}
		}
	})
}

#[cfg(test)]
fn load_tree(value: &serde_json::Value) -> Result<Tree> {
	Tree::try_from(model::from_value::<model::TreeModel>(value)?)
}

#[test]
fn test_load_tree() {
	let tree = load_tree(&tree_description()).unwrap();
	assert!(!tree.regression);
	assert_eq!(tree.objective_field, "000001");
	assert_eq!(tree.nodes.len(), 3);
	assert_eq!(tree.nodes[0].children(), &[1, 2]);
	assert_eq!(tree.nodes[2].output, Outcome::Category("B".to_owned()));
	insta::assert_debug_snapshot!(tree.nodes[1].predicate, @r###"
 Split(
     Split {
         operator: Eq,
         field: "000000",
         value: Text(
             "x",
         ),
         term: None,
         missing: false,
     },
 )
 "###);
}

#[test]
fn test_load_tree_errors() {
	let mut description = tree_description();
	description["model"]["root"]["children"][0]["predicate"]["field"] = "00000f".into();
	assert_eq!(
		load_tree(&description).unwrap_err(),
		Error::invalid_model("predicate references unknown field \"00000f\"")
	);
	let mut description = tree_description();
	description["model"]["root"]["children"][0]["predicate"]["operator"] = serde_json::Value::Null;
	assert_eq!(
		load_tree(&description).unwrap_err(),
		Error::invalid_model("predicate has no operator")
	);
	let mut description = tree_description();
	description["model"]["root"]["children"][0]["predicate"]["operator"] = "~".into();
	assert_eq!(
		load_tree(&description).unwrap_err(),
		Error::UnsupportedOperator {
			operator: "~".to_owned()
		}
	);
	let mut description = tree_description();
	description["model"]["root"]["count"] = 11.into();
	assert_eq!(
		load_tree(&description).unwrap_err(),
		Error::invalid_model("node distribution holds 10 instances but the node count is 11")
	);
	let mut description = tree_description();
	description["model"]["root"]["children"][1]["count"] = 2.into();
	description["model"]["root"]["children"][1]["objective_summary"] =
		serde_json::json!({ "categories": [["A", 1], ["B", 1]] });
	assert_eq!(
		load_tree(&description).unwrap_err(),
		Error::invalid_model("node children hold 7 instances but the node count is 10")
	);
}

#[test]
fn test_load_regression_tree() {
	let description = serde_json::json!({
		"objective_fields": ["000001"],
		"model": {
			"fields": {
				"000000": { "name": "x", "optype": "numeric" },
				"000001": { "name": "y", "optype": "numeric" }
			},
			"root": {
				"predicate": true,
				"count": 4,
				"objective_summary": { "counts": [[1.0, 2], [3.0, 2]] }
			}
		}
	});
	let tree = load_tree(&description).unwrap();
	assert!(tree.regression);
	assert_eq!(tree.nodes[0].distribution_unit, DistributionUnit::Counts);
	assert_eq!(tree.nodes[0].output.as_number(), Some(2.0));
}

#[test]
fn test_load_ensemble() {
	let ensemble = model::Ensemble {
		models: vec!["model/1".to_owned(), "model/2".to_owned()],
		objective_field: None,
		weights: Some(vec![1.0]),
	};
	let members = || {
		vec![
			model::from_value(&tree_description()).unwrap(),
			model::from_value(&tree_description()).unwrap(),
		]
	};
	assert_eq!(
		load_ensemble(ensemble, members()).unwrap_err(),
		Error::invalid_model("the ensemble has 2 members but 1 weights")
	);
	let ensemble = model::Ensemble {
		models: vec!["model/1".to_owned(), "model/2".to_owned()],
		objective_field: Some("000001".to_owned()),
		weights: None,
	};
	assert_eq!(load_ensemble(ensemble, members()).unwrap().trees.len(), 2);
}

#[test]
fn test_load_anomaly() {
	let description = serde_json::json!({
		"model": {
			"fields": { "000000": { "name": "x", "optype": "numeric" } },
			"sample_size": 1,
			"trees": [{
				"root": {
					"predicates": [true],
					"population": 1,
					"children": []
				}
			}]
		}
	});
	let anomaly = model::from_value::<model::Anomaly>(&description).unwrap();
	assert_eq!(
		AnomalyForest::try_from(anomaly).unwrap_err(),
		Error::invalid_model("the isolation forest was grown from 1 instances")
	);
}

#[test]
fn test_load_logistic_regression() {
	let description = serde_json::json!({
		"input_fields": ["000000", "000001", "000002"],
		"objective_field": "000002",
		"logistic_regression": {
			"bias": true,
			"coefficients": [["yes", [[0.5], [1.0, -1.0, 0.0], [-1.0]]]],
			"fields": {
				"000000": { "name": "size", "optype": "numeric", "summary": { "mean": 2.0, "median": 1.5 } },
				"000001": {
					"name": "color",
					"optype": "categorical",
					"summary": { "categories": [["red", 10], ["blue", 5]] }
				},
				"000002": {
					"name": "label",
					"optype": "categorical",
					"summary": { "categories": [["yes", 8], ["no", 7]] }
				}
			}
		},
		"default_numeric_value": "median"
	});
	let model = model::from_value::<model::LogisticRegression>(&description).unwrap();
	let model = LogisticRegression::try_from(model).unwrap();
	assert_eq!(model.classes, vec!["yes", "no"]);
	assert_eq!(model.n_features(), 4);
	assert_eq!(model.biases, arr1(&[-1.0]));
	match &model.groups[0] {
		FeatureGroup::Numeric(group) => assert_eq!(group.missing, NumericMissing::Default(1.5)),
		group => panic!("unexpected group {:?}", group),
	}
	let mut description = description;
	description["logistic_regression"]["coefficients"][0][1][1] = serde_json::json!([1.0]);
	let model = model::from_value::<model::LogisticRegression>(&description).unwrap();
	assert_eq!(
		LogisticRegression::try_from(model).unwrap_err(),
		Error::invalid_model(
			"class \"yes\" has 1 coefficients for field \"000001\" but 3 were expected"
		)
	);
}

#[test]
fn test_load_datetime_subfields() {
	let fields: model::Fields = serde_json::from_value(serde_json::json!({
		"000000": { "name": "date", "optype": "datetime" },
		"000000-0": {
			"name": "date.year",
			"optype": "numeric",
			"parent_ids": ["000000"],
			"datatype": "year"
		}
	}))
	.unwrap();
	let fields = load_fields(fields).unwrap();
	assert_eq!(
		fields.get("000000-0").unwrap().datetime_component,
		Some(DatetimeComponent {
			parent_id: "000000".to_owned(),
			part: DatetimePart::Year,
		})
	);
}
