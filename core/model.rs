/*!
This module defines the model descriptions exactly as the training service serializes them. Nothing outside [`load`](../load/index.html) reads these types: they are converted into the typed structures of the evaluator crates once, when a model is loaded.
*/

use localml_util::{Error, Result};
use std::collections::BTreeMap;

/// Deserialize a model description, unwrapping the `object` envelope of a resource if there is one.
pub fn from_value<T>(value: &serde_json::Value) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	let value = match value.get("object") {
		Some(object) if object.is_object() => object,
		_ => value,
	};
	T::deserialize(value).map_err(|error| Error::invalid_model(error.to_string()))
}

pub type Fields = BTreeMap<String, Field>;

#[derive(serde::Deserialize, Debug)]
pub struct Field {
	pub name: String,
	pub optype: String,
	pub prefix: Option<String>,
	pub suffix: Option<String>,
	#[serde(default)]
	pub summary: Summary,
	pub term_analysis: Option<TermAnalysis>,
	pub item_analysis: Option<ItemAnalysis>,
	#[serde(default)]
	pub parent_ids: Vec<String>,
	pub datatype: Option<String>,
}

#[derive(serde::Deserialize, Debug, Default)]
pub struct Summary {
	#[serde(default)]
	pub categories: Vec<(serde_json::Value, u64)>,
	#[serde(default)]
	pub tag_cloud: Vec<(String, u64)>,
	#[serde(default)]
	pub items: Vec<(String, u64)>,
	#[serde(default)]
	pub term_forms: BTreeMap<String, Vec<String>>,
	pub mean: Option<f64>,
	pub median: Option<f64>,
	pub minimum: Option<f64>,
	pub maximum: Option<f64>,
	pub standard_deviation: Option<f64>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TermAnalysis {
	#[serde(default)]
	pub case_sensitive: bool,
	pub token_mode: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct ItemAnalysis {
	pub separator: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TreeModel {
	pub model: TreeModelBody,
	pub objective_field: Option<String>,
	pub objective_fields: Option<Vec<String>>,
	pub resource: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TreeModelBody {
	pub root: Node,
	pub fields: Fields,
}

#[derive(serde::Deserialize, Debug)]
pub struct Node {
	pub predicate: Predicate,
	pub output: Option<serde_json::Value>,
	pub confidence: Option<f64>,
	pub count: u64,
	#[serde(default)]
	pub children: Vec<Node>,
	pub objective_summary: Option<ObjectiveSummary>,
	pub median: Option<f64>,
	pub id: Option<u64>,
}

/// `true` for the root and catch-all branches, otherwise a split.
#[derive(serde::Deserialize, Debug)]
#[serde(untagged)]
pub enum Predicate {
	Constant(bool),
	Split(Split),
}

#[derive(serde::Deserialize, Debug)]
pub struct Split {
	pub operator: Option<String>,
	pub field: Option<String>,
	#[serde(default)]
	pub value: serde_json::Value,
	pub term: Option<String>,
	#[serde(default)]
	pub missing: bool,
}

#[derive(serde::Deserialize, Debug, Default)]
pub struct ObjectiveSummary {
	pub categories: Option<Vec<(serde_json::Value, u64)>>,
	pub bins: Option<Vec<(f64, u64)>>,
	pub counts: Option<Vec<(f64, u64)>>,
}

#[derive(serde::Deserialize, Debug)]
pub struct Ensemble {
	pub models: Vec<String>,
	pub objective_field: Option<String>,
	pub weights: Option<Vec<f64>>,
}

#[derive(serde::Deserialize, Debug)]
pub struct Anomaly {
	pub model: AnomalyBody,
}

#[derive(serde::Deserialize, Debug)]
pub struct AnomalyBody {
	pub fields: Fields,
	pub trees: Vec<IsolationTree>,
	pub sample_size: u64,
	pub mean_depth: Option<f64>,
}

#[derive(serde::Deserialize, Debug)]
pub struct IsolationTree {
	pub root: AnomalyNode,
}

#[derive(serde::Deserialize, Debug)]
pub struct AnomalyNode {
	pub predicates: Vec<Predicate>,
	pub population: u64,
	#[serde(default)]
	pub children: Vec<AnomalyNode>,
}

#[derive(serde::Deserialize, Debug)]
pub struct LogisticRegression {
	pub logistic_regression: LogisticRegressionBody,
	#[serde(default)]
	pub input_fields: Vec<String>,
	pub objective_field: String,
	pub default_numeric_value: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct LogisticRegressionBody {
	/// One `[class, [coefficients of each field..., [bias]]]` entry per class.
	pub coefficients: Vec<(serde_json::Value, Vec<Vec<f64>>)>,
	#[serde(default = "default_true")]
	pub bias: bool,
	#[serde(default)]
	pub lr_normalize: bool,
	#[serde(default)]
	pub balance_fields: bool,
	#[serde(default)]
	pub missing_numerics: bool,
	#[serde(default)]
	pub field_codings: Vec<serde_json::Value>,
	pub fields: Fields,
}

fn default_true() -> bool {
	true
}

#[derive(serde::Deserialize, Debug)]
pub struct Cluster {
	pub clusters: ClusterBody,
	#[serde(default)]
	pub scales: BTreeMap<String, f64>,
	#[serde(default)]
	pub summary_fields: Vec<String>,
	pub default_numeric_value: Option<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct ClusterBody {
	pub clusters: Vec<Centroid>,
	pub fields: Fields,
}

#[derive(serde::Deserialize, Debug)]
pub struct Centroid {
	pub id: String,
	pub name: String,
	pub center: BTreeMap<String, serde_json::Value>,
	pub count: Option<u64>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TopicModel {
	pub topic_model: TopicModelBody,
	#[serde(default)]
	pub input_fields: Vec<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TopicModelBody {
	pub topics: Vec<Topic>,
	pub termset: Vec<String>,
	pub term_topic_assignments: Vec<Vec<u64>>,
	pub alpha: f64,
	pub beta: f64,
	#[serde(default)]
	pub seed: u64,
	#[serde(default)]
	pub case_sensitive: bool,
	#[serde(default)]
	pub bigrams: bool,
	pub fields: Fields,
}

#[derive(serde::Deserialize, Debug)]
pub struct Topic {
	pub id: String,
	pub name: String,
}

#[derive(serde::Deserialize, Debug)]
pub struct TimeSeries {
	pub time_series: TimeSeriesBody,
	#[serde(default)]
	pub objective_fields: Vec<String>,
}

#[derive(serde::Deserialize, Debug)]
pub struct TimeSeriesBody {
	pub ets_models: BTreeMap<String, Vec<EtsModel>>,
	pub fields: Fields,
}

#[derive(serde::Deserialize, Debug)]
pub struct EtsModel {
	pub name: String,
	pub final_state: Option<FinalState>,
	/// The level of the `naive`, `mean` and `drift` models.
	pub value: Option<f64>,
	/// The slope of the `drift` model.
	pub slope: Option<f64>,
	pub phi: Option<f64>,
	pub period: Option<usize>,
	pub aic: Option<f64>,
	pub aicc: Option<f64>,
	pub bic: Option<f64>,
}

#[derive(serde::Deserialize, Debug)]
pub struct FinalState {
	pub l: f64,
	pub b: Option<f64>,
	#[serde(default)]
	pub s: Vec<f64>,
}

#[test]
fn test_from_value_unwraps_envelope() {
	let value = serde_json::json!({
		"resource": "ensemble/1",
		"object": { "models": ["model/1", "model/2"], "weights": [1.0, 2.0] }
	});
	let ensemble: Ensemble = from_value(&value).unwrap();
	assert_eq!(ensemble.models, vec!["model/1", "model/2"]);
	assert_eq!(ensemble.weights, Some(vec![1.0, 2.0]));
	let value = serde_json::json!({ "models": "model/1" });
	assert!(from_value::<Ensemble>(&value).is_err());
}
