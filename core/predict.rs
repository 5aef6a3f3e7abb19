use crate::{
	cluster::{CentroidPrediction, Cluster},
	fetch::load_supplied_ensemble,
	model,
	options::PredictOptions,
	time_series::{Forecast, TimeSeries},
	topic_model::{TopicModel, TopicProbability},
};
use localml_features::{normalize, Fields, InputData};
use localml_linear::LogisticRegression;
use localml_metrics::{ws_confidence, Distribution, Outcome};
use localml_tree::{AnomalyForest, DistributionUnit, Ensemble, Tree};
use localml_util::{Error, Result};
use num_traits::ToPrimitive;
use std::{collections::BTreeMap, convert::TryFrom};

/// A loaded model of any kind.
#[derive(Debug)]
pub enum Model {
	Tree(Tree),
	Ensemble(Ensemble),
	Anomaly(AnomalyForest),
	LogisticRegression(LogisticRegression),
	Cluster(Cluster),
	TopicModel(TopicModel),
	TimeSeries(TimeSeries),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
	Tree,
	Ensemble,
	Anomaly,
	LogisticRegression,
	Cluster,
	TopicModel,
	TimeSeries,
}

impl Model {
	/**
	Load a model description of the given kind. Ensembles are built from their description and `members`, the descriptions of their member trees. Other kinds ignore `members`.
	*/
	pub fn load(
		kind: ModelKind,
		description: &serde_json::Value,
		members: Vec<serde_json::Value>,
	) -> Result<Model> {
		let model = match kind {
			ModelKind::Tree => Model::Tree(Tree::try_from(model::from_value::<model::TreeModel>(
				description,
			)?)?),
			ModelKind::Ensemble => Model::Ensemble(load_supplied_ensemble(description, members)?),
			ModelKind::Anomaly => Model::Anomaly(AnomalyForest::try_from(
				model::from_value::<model::Anomaly>(description)?,
			)?),
			ModelKind::LogisticRegression => Model::LogisticRegression(LogisticRegression::try_from(
				model::from_value::<model::LogisticRegression>(description)?,
			)?),
			ModelKind::Cluster => Model::Cluster(Cluster::try_from(
				model::from_value::<model::Cluster>(description)?,
			)?),
			ModelKind::TopicModel => Model::TopicModel(TopicModel::try_from(
				model::from_value::<model::TopicModel>(description)?,
			)?),
			ModelKind::TimeSeries => Model::TimeSeries(TimeSeries::try_from(
				model::from_value::<model::TimeSeries>(description)?,
			)?),
		};
		Ok(model)
	}
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum PredictOutput {
	Tree(TreePredictOutput),
	Ensemble(EnsemblePredictOutput),
	Anomaly(AnomalyScoreOutput),
	LogisticRegression(LogisticRegressionPredictOutput),
	Cluster(CentroidPrediction),
	TopicModel(Vec<TopicProbability>),
	TimeSeries(BTreeMap<String, Vec<Forecast>>),
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreePredictOutput {
	pub prediction: Outcome,
	pub confidence: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub probability: Option<f64>,
	pub count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub median: Option<f64>,
	pub path: Vec<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub distribution: Option<Vec<DistributionEntry>>,
	pub distribution_unit: DistributionUnit,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next: Option<String>,
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnsemblePredictOutput {
	pub prediction: Outcome,
	pub confidence: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub probability: Option<f64>,
	pub count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub median: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub distribution: Option<Vec<DistributionEntry>>,
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DistributionEntry {
	pub prediction: Outcome,
	/// The Wilson confidence of a category, or the error band of the prediction for a numeric value.
	pub confidence: f64,
	pub probability: f64,
	pub count: u64,
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyScoreOutput {
	pub score: f64,
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogisticRegressionPredictOutput {
	pub prediction: String,
	pub probability: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub distribution: Option<Vec<ClassProbability>>,
}

#[derive(serde::Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassProbability {
	pub prediction: String,
	pub probability: f64,
}

/// Make a prediction with any kind of model.
pub fn predict(
	model: &Model,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<PredictOutput> {
	let output = match model {
		Model::Tree(tree) => PredictOutput::Tree(predict_model(tree, input, options)?),
		Model::Ensemble(ensemble) => {
			PredictOutput::Ensemble(predict_ensemble(ensemble, input, options)?)
		}
		Model::Anomaly(forest) => PredictOutput::Anomaly(anomaly_score(forest, input, options)?),
		Model::LogisticRegression(model) => {
			PredictOutput::LogisticRegression(predict_logistic_regression(model, input, options)?)
		}
		Model::Cluster(cluster) => PredictOutput::Cluster(find_centroid(cluster, input, options)?),
		Model::TopicModel(model) => {
			PredictOutput::TopicModel(topic_distribution(model, input, options)?)
		}
		Model::TimeSeries(time_series) => {
			PredictOutput::TimeSeries(forecast(time_series, input, options)?)
		}
	};
	Ok(output)
}

fn input_object(input: &serde_json::Value) -> Result<&serde_json::Map<String, serde_json::Value>> {
	input
		.as_object()
		.ok_or_else(|| Error::invalid_option("the input must be an object"))
}

fn normalize_input(
	input: &serde_json::Value,
	fields: &Fields,
	options: &PredictOptions,
) -> Result<InputData> {
	normalize(input_object(input)?, fields, options.by_name)
}

/// The entries of `distribution` most common first, capped by the `multiple` option.
fn distribution_entries(
	distribution: &Distribution,
	error_band: f64,
	options: &PredictOptions,
) -> Option<Vec<DistributionEntry>> {
	let entries = distribution.sorted_by_count();
	let limit = options.multiple.limit(entries.len())?;
	let total = distribution.total().to_f64().unwrap_or(0.0);
	Some(
		entries
			.into_iter()
			.take(limit)
			.map(|(prediction, count)| DistributionEntry {
				confidence: match prediction {
					Outcome::Category(_) => {
						ws_confidence(&prediction, distribution, None, Some(options.z))
					}
					Outcome::Number(_) => error_band,
				},
				prediction,
				probability: if total > 0.0 {
					count.to_f64().unwrap_or(0.0) / total
				} else {
					0.0
				},
				count,
			})
			.collect(),
	)
}

pub fn predict_model(
	tree: &Tree,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<TreePredictOutput> {
	let input = normalize_input(input, &tree.fields, options)?;
	let prediction = tree.predict(&input, &options.traversal())?;
	Ok(TreePredictOutput {
		distribution: distribution_entries(&prediction.distribution, prediction.confidence, options),
		prediction: prediction.prediction,
		confidence: prediction.confidence,
		probability: prediction.probability,
		count: prediction.count,
		median: prediction.median,
		path: prediction.path,
		distribution_unit: prediction.distribution_unit,
		next: prediction.next,
	})
}

pub fn predict_ensemble(
	ensemble: &Ensemble,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<EnsemblePredictOutput> {
	let fields = &ensemble
		.trees
		.first()
		.ok_or_else(|| Error::invalid_model("the ensemble has no members"))?
		.fields;
	let input = normalize_input(input, fields, options)?;
	let method = options.combination_method()?;
	let prediction = ensemble.predict(&input, &method, &options.traversal())?;
	Ok(EnsemblePredictOutput {
		distribution: distribution_entries(&prediction.distribution, prediction.confidence, options),
		prediction: prediction.prediction,
		confidence: prediction.confidence,
		probability: prediction.probability,
		count: prediction.count,
		median: prediction.median,
	})
}

pub fn anomaly_score(
	forest: &AnomalyForest,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<AnomalyScoreOutput> {
	let input = normalize_input(input, &forest.fields, options)?;
	Ok(AnomalyScoreOutput {
		score: forest.score(&input)?,
	})
}

pub fn predict_logistic_regression(
	model: &LogisticRegression,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<LogisticRegressionPredictOutput> {
	let input = normalize_input(input, &model.fields, options)?;
	let prediction = model.predict(&input)?;
	let distribution = options
		.multiple
		.limit(prediction.distribution.len())
		.map(|limit| {
			prediction
				.distribution
				.iter()
				.take(limit)
				.map(|(class, probability)| ClassProbability {
					prediction: class.clone(),
					probability: *probability,
				})
				.collect()
		});
	Ok(LogisticRegressionPredictOutput {
		prediction: prediction.prediction,
		probability: prediction.probability,
		distribution,
	})
}

pub fn find_centroid(
	cluster: &Cluster,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<CentroidPrediction> {
	let input = normalize_input(input, &cluster.fields, options)?;
	cluster.nearest(&input, options.distance)
}

pub fn topic_distribution(
	model: &TopicModel,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<Vec<TopicProbability>> {
	let input = normalize_input(input, &model.fields, options)?;
	Ok(model.distribution(&input))
}

/// Forecast a time series. The input maps objective fields to their forecast requests rather than holding a record.
pub fn forecast(
	time_series: &TimeSeries,
	input: &serde_json::Value,
	options: &PredictOptions,
) -> Result<BTreeMap<String, Vec<Forecast>>> {
	time_series.forecast(
		input_object(input)?,
		options.by_name,
		options.horizon,
		options.criterion,
	)
}

#[cfg(test)]
fn two_level_tree() -> serde_json::Value {
	serde_json::json!({
		"object": {
			"resource": "model/1",
			"objective_field": "000001",
			"model": {
				"fields": {
					"000000": { "name": "field1", "optype": "categorical" },
					"000001": { "name": "label", "optype": "categorical" }
				},
				"root": {
					"predicate": true,
					"count": 10,
					"objective_summary": { "categories": [["A", 7], ["B", 3]] },
					"children": [
						{
							"predicate": { "operator": "=", "field": "000000", "value": "x" },
							"count": 5,
							"objective_summary": { "categories": [["A", 5], ["B", 0]] }
						},
						{
							"predicate": true,
							"count": 5,
							"objective_summary": { "categories": [["A", 2], ["B", 3]] }
						}
					]
				}
			}
		}
	})
}

#[test]
fn test_predict_model() {
	let model = Model::load(ModelKind::Tree, &two_level_tree(), Vec::new()).unwrap();
	let options = PredictOptions {
		by_name: true,
		..Default::default()
	};
	let output = predict(&model, &serde_json::json!({ "field1": "x" }), &options).unwrap();
	let output = match output {
		PredictOutput::Tree(output) => output,
		output => panic!("unexpected output {:?}", output),
	};
	assert_eq!(output.prediction, Outcome::Category("A".to_owned()));
	assert_eq!(output.count, 5);
	assert_eq!(output.path, vec!["field1 = x"]);
	assert_eq!(output.probability, Some(1.0));
	assert!((output.confidence - localml_metrics::wilson_lower_bound(1.0, 5.0, 1.96)).abs() < 1e-12);
	assert!(output.distribution.is_none());
}

#[test]
fn test_missing_strategies() {
	let model = Model::load(ModelKind::Tree, &two_level_tree(), Vec::new()).unwrap();
	let last_prediction = PredictOptions {
		multiple: crate::options::Multiple::All,
		..Default::default()
	};
	let output = predict(&model, &serde_json::json!({}), &last_prediction).unwrap();
	let json = serde_json::to_value(&output).unwrap();
	assert_eq!(json["prediction"], "A");
	assert_eq!(json["count"], 10);
	assert_eq!(json["next"], "field1");
	assert_eq!(json["distributionUnit"], "categories");
	let distribution = json["distribution"].as_array().unwrap();
	assert_eq!(distribution.len(), 2);
	for (entry, (category, probability, count)) in distribution
		.iter()
		.zip(vec![("A", 0.7, 7), ("B", 0.3, 3)])
	{
		assert_eq!(entry["prediction"], category);
		assert_eq!(entry["probability"], probability);
		assert_eq!(entry["count"], count);
		let confidence = localml_metrics::wilson_lower_bound(probability, 10.0, 1.96);
		assert!((entry["confidence"].as_f64().unwrap() - confidence).abs() < 1e-12);
	}
	let proportional = PredictOptions::from_value(&serde_json::json!({
		"missingStrategy": "proportional"
	}))
	.unwrap();
	let output = predict(&model, &serde_json::json!({}), &proportional).unwrap();
	let json = serde_json::to_value(&output).unwrap();
	assert_eq!(json["prediction"], "A");
	assert_eq!(json["count"], 10);
}

#[test]
fn test_predict_ensemble() {
	let member = |resource: &str| {
		serde_json::json!({
			"resource": resource,
			"objective_field": "000000",
			"model": {
				"fields": { "000000": { "name": "label", "optype": "categorical" } },
				"root": {
					"predicate": true,
					"count": 10,
					"output": "yes",
					"objective_summary": { "categories": [["yes", 8], ["no", 2]] }
				}
			}
		})
	};
	let description = serde_json::json!({ "models": ["model/1", "model/2", "model/3"] });
	let model = Model::load(
		ModelKind::Ensemble,
		&description,
		vec![member("model/1"), member("model/2"), member("model/3")],
	)
	.unwrap();
	for method in &["plurality", "confidence"] {
		let options = PredictOptions::from_value(&serde_json::json!({
			"method": method,
			"multiple": 1
		}))
		.unwrap();
		match predict(&model, &serde_json::json!({}), &options).unwrap() {
			PredictOutput::Ensemble(output) => {
				assert_eq!(output.prediction, Outcome::Category("yes".to_owned()));
				assert_eq!(output.probability, Some(1.0));
				let distribution = output.distribution.unwrap();
				assert_eq!(distribution.len(), 1);
				assert_eq!(distribution[0].count, 24);
				let confidence = localml_metrics::wilson_lower_bound(0.8, 30.0, 1.96);
				assert!((distribution[0].confidence - confidence).abs() < 1e-12);
			}
			output => panic!("unexpected output {:?}", output),
		}
	}
}

#[test]
fn test_type_mismatch() {
	let description = serde_json::json!({
		"objective_field": "000001",
		"model": {
			"fields": {
				"000000": { "name": "price", "optype": "numeric" },
				"000001": { "name": "label", "optype": "categorical" }
			},
			"root": {
				"predicate": true,
				"count": 1,
				"objective_summary": { "categories": [["A", 1]] }
			}
		}
	});
	let model = Model::load(ModelKind::Tree, &description, Vec::new()).unwrap();
	let error = predict(
		&model,
		&serde_json::json!({ "000000": "cheap" }),
		&PredictOptions::default(),
	)
	.unwrap_err();
	assert_eq!(
		error,
		Error::type_mismatch("price", "\"cheap\"", "numeric")
	);
	assert_eq!(
		predict(&model, &serde_json::json!([1, 2]), &PredictOptions::default()).unwrap_err(),
		Error::invalid_option("the input must be an object")
	);
}

#[test]
fn test_regression_distribution() {
	let description = serde_json::json!({
		"objective_field": "000001",
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
	let model = Model::load(ModelKind::Tree, &description, Vec::new()).unwrap();
	let options = PredictOptions {
		multiple: crate::options::Multiple::All,
		..Default::default()
	};
	let output = match predict(&model, &serde_json::json!({}), &options).unwrap() {
		PredictOutput::Tree(output) => output,
		output => panic!("unexpected output {:?}", output),
	};
	let distribution = output.distribution.unwrap();
	assert_eq!(distribution.len(), 2);
	assert!(output.confidence > 0.0);
	for entry in distribution.iter() {
		assert_eq!(entry.confidence, output.confidence);
		assert_eq!(entry.probability, 0.5);
	}
}
