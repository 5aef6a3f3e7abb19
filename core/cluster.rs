use crate::{
	load::{json_to_string, load_fields, numeric_default},
	model,
};
use localml_features::{Field, Fields, InputData, Optype};
use localml_util::{Error, Result};
use std::{collections::BTreeMap, convert::TryFrom, sync::Arc};

/// A k-means cluster model. Inputs are assigned to the nearest centroid.
#[derive(Clone, Debug)]
pub struct Cluster {
	pub centroids: Vec<Centroid>,
	pub fields: Arc<Fields>,
	/// The scale applied to each field's difference before it is accumulated.
	pub scales: BTreeMap<String, f64>,
	/// Values that replace missing numerics, by field id.
	pub defaults: BTreeMap<String, f64>,
}

#[derive(Clone, Debug)]
pub struct Centroid {
	pub id: String,
	pub name: String,
	pub count: Option<u64>,
	pub center: BTreeMap<String, CenterValue>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CenterValue {
	Number(f64),
	Category(String),
	/// The terms of a text or items field.
	Terms(Vec<String>),
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
	Euclidean,
	Manhattan,
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CentroidPrediction {
	pub centroid_id: String,
	pub centroid_name: String,
	pub distance: f64,
	/// What each field added to the distance, by field name. Euclidean contributions are squared.
	pub contributions: BTreeMap<String, f64>,
}

impl TryFrom<model::Cluster> for Cluster {
	type Error = Error;
	fn try_from(value: model::Cluster) -> Result<Cluster> {
		let fields = load_fields(value.clusters.fields)?;
		if value.clusters.clusters.is_empty() {
			return Err(Error::invalid_model("the cluster model has no centroids"));
		}
		let summary_fields = value.summary_fields;
		let centroids = value
			.clusters
			.clusters
			.into_iter()
			.map(|centroid| {
				let model::Centroid {
					id,
					name,
					count,
					center,
				} = centroid;
				let center = center
					.into_iter()
					.filter(|(field_id, _)| !summary_fields.contains(field_id))
					.map(|(field_id, center)| {
						let field = fields.get(&field_id).ok_or_else(|| {
							Error::invalid_model(format!(
								"centroid \"{}\" references unknown field \"{}\"",
								id, field_id
							))
						})?;
						Ok((field_id, load_center(field, &center)?))
					})
					.collect::<Result<BTreeMap<_, _>>>()?;
				Ok(Centroid {
					id,
					name,
					count,
					center,
				})
			})
			.collect::<Result<Vec<_>>>()?;
		let mut defaults = BTreeMap::new();
		if let Some(statistic) = value.default_numeric_value.as_deref() {
			for field in fields.iter().filter(|field| field.optype == Optype::Numeric) {
				if let Some(default) = numeric_default(field, statistic)? {
					defaults.insert(field.id.clone(), default);
				}
			}
		}
		Ok(Cluster {
			centroids,
			fields: Arc::new(fields),
			scales: value.scales,
			defaults,
		})
	}
}

fn load_center(field: &Field, value: &serde_json::Value) -> Result<CenterValue> {
	let invalid = || {
		Error::invalid_model(format!(
			"center value {} does not fit {} field \"{}\"",
			value, field.optype, field.id
		))
	};
	match field.optype {
		Optype::Numeric => value.as_f64().map(CenterValue::Number).ok_or_else(invalid),
		Optype::Categorical => json_to_string(value)
			.map(CenterValue::Category)
			.ok_or_else(invalid),
		Optype::Text | Optype::Items => match value {
			serde_json::Value::Array(terms) => terms
				.iter()
				.map(|term| term.as_str().map(|term| term.to_owned()).ok_or_else(invalid))
				.collect::<Result<Vec<_>>>()
				.map(CenterValue::Terms),
			serde_json::Value::String(term) => Ok(CenterValue::Terms(vec![term.clone()])),
			_ => Err(invalid()),
		},
		Optype::Datetime => Err(invalid()),
	}
}

/// `1 - |a ∩ b| / sqrt(|a| |b|)`. Two empty term sets are identical and an empty set is as far as possible from any other.
fn cosine_distance(a: &[String], b: &[String]) -> f64 {
	match (a.is_empty(), b.is_empty()) {
		(true, true) => return 0.0,
		(true, false) | (false, true) => return 1.0,
		_ => {}
	}
	let common = a.iter().filter(|term| b.contains(term)).count() as f64;
	1.0 - common / ((a.len() * b.len()) as f64).sqrt()
}

impl Cluster {
	fn scale(&self, field: &str) -> f64 {
		self.scales.get(field).cloned().unwrap_or(1.0)
	}

	/// The distance from `input` to `centroid` and what each field contributed to it.
	pub fn distance(
		&self,
		centroid: &Centroid,
		input: &InputData,
		metric: DistanceMetric,
	) -> Result<(f64, BTreeMap<String, f64>)> {
		let mut contributions = BTreeMap::new();
		for (id, center) in centroid.center.iter() {
			let field = match self.fields.get(id) {
				Some(field) => field,
				None => continue,
			};
			let scale = self.scale(id);
			let value = input.get(id);
			let difference = match center {
				CenterValue::Number(center) => {
					let value = match value {
						Some(value) => value
							.as_number()
							.ok_or_else(|| Error::type_mismatch(&field.name, value, field.optype))?,
						None => match self.defaults.get(id) {
							Some(default) => *default,
							None => continue,
						},
					};
					(value - center) * scale
				}
				CenterValue::Category(center) => match value {
					Some(value) if value.to_string() == *center => 0.0,
					_ => scale,
				},
				CenterValue::Terms(center) => {
					let terms = match value.and_then(|value| value.as_text()) {
						Some(text) => field
							.unique_terms(text)
							.into_iter()
							.map(|(term, _)| term)
							.collect::<Vec<_>>(),
						None => Vec::new(),
					};
					cosine_distance(&terms, center) * scale
				}
			};
			let contribution = match metric {
				DistanceMetric::Euclidean => difference * difference,
				DistanceMetric::Manhattan => difference.abs(),
			};
			contributions.insert(field.name.clone(), contribution);
		}
		let total: f64 = contributions.values().sum();
		let distance = match metric {
			DistanceMetric::Euclidean => total.sqrt(),
			DistanceMetric::Manhattan => total,
		};
		Ok((distance, contributions))
	}

	/// Find the centroid nearest to `input`. Ties go to the centroid declared first.
	pub fn nearest(&self, input: &InputData, metric: DistanceMetric) -> Result<CentroidPrediction> {
		let mut nearest: Option<(&Centroid, f64, BTreeMap<String, f64>)> = None;
		for centroid in self.centroids.iter() {
			let (distance, contributions) = self.distance(centroid, input, metric)?;
			if nearest
				.as_ref()
				.map_or(true, |(_, best, _)| distance < *best)
			{
				nearest = Some((centroid, distance, contributions));
			}
		}
		let (centroid, distance, contributions) =
			nearest.ok_or_else(|| Error::invalid_model("the cluster model has no centroids"))?;
		Ok(CentroidPrediction {
			centroid_id: centroid.id.clone(),
			centroid_name: centroid.name.clone(),
			distance,
			contributions,
		})
	}
}

#[cfg(test)]
fn test_cluster() -> Cluster {
	let description = serde_json::json!({
		"scales": { "000000": 0.5, "000001": 2.0, "000002": 1.0 },
		"default_numeric_value": "mean",
		"clusters": {
			"fields": {
				"000000": { "name": "x", "optype": "numeric", "summary": { "mean": 4.0 } },
				"000001": {
					"name": "color",
					"optype": "categorical",
					"summary": { "categories": [["red", 3], ["blue", 3]] }
				},
				"000002": {
					"name": "notes",
					"optype": "text",
					"summary": { "tag_cloud": [["fast", 3], ["cheap", 2]] }
				}
			},
			"clusters": [
				{
					"id": "000000",
					"name": "Cluster 0",
					"count": 3,
					"center": { "000000": 2.0, "000001": "red", "000002": ["fast"] }
				},
				{
					"id": "000001",
					"name": "Cluster 1",
					"count": 3,
					"center": { "000000": 10.0, "000001": "blue", "000002": ["cheap"] }
				}
			]
		}
	});
	Cluster::try_from(model::from_value::<model::Cluster>(&description).unwrap()).unwrap()
}

#[test]
fn test_nearest() {
	use localml_features::Value;
	let cluster = test_cluster();
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(3.0),
		"000001".to_owned() => Value::Text("red".to_owned()),
		"000002".to_owned() => Value::Text("Fast and fast".to_owned()),
	};
	let prediction = cluster.nearest(&input, DistanceMetric::Euclidean).unwrap();
	assert_eq!(prediction.centroid_id, "000000");
	assert_eq!(prediction.centroid_name, "Cluster 0");
	assert!((prediction.distance - 0.5).abs() < 1e-12);
	assert_eq!(prediction.contributions["x"], 0.25);
	assert_eq!(prediction.contributions["color"], 0.0);
	assert_eq!(prediction.contributions["notes"], 0.0);
	let prediction = cluster.nearest(&input, DistanceMetric::Manhattan).unwrap();
	assert!((prediction.distance - 0.5).abs() < 1e-12);
}

#[test]
fn test_missing_values() {
	let cluster = test_cluster();
	// x falls back to its mean of 4, color counts as a mismatch everywhere and notes is empty.
	let (distance, contributions) = cluster
		.distance(&cluster.centroids[0], &InputData::new(), DistanceMetric::Euclidean)
		.unwrap();
	assert_eq!(contributions["x"], 1.0);
	assert_eq!(contributions["color"], 4.0);
	assert_eq!(contributions["notes"], 1.0);
	assert!((distance - 6.0f64.sqrt()).abs() < 1e-12);
	let cluster = Cluster {
		defaults: BTreeMap::new(),
		..test_cluster()
	};
	let (_, contributions) = cluster
		.distance(&cluster.centroids[0], &InputData::new(), DistanceMetric::Euclidean)
		.unwrap();
	assert!(!contributions.contains_key("x"));
}

#[test]
fn test_cosine_distance() {
	let terms = |terms: &[&str]| terms.iter().map(|term| (*term).to_owned()).collect::<Vec<_>>();
	assert_eq!(cosine_distance(&[], &[]), 0.0);
	assert_eq!(cosine_distance(&terms(&["a"]), &[]), 1.0);
	assert_eq!(cosine_distance(&terms(&["a", "b"]), &terms(&["a", "b"])), 0.0);
	assert!((cosine_distance(&terms(&["a", "b"]), &terms(&["a"])) - (1.0 - 1.0 / 2.0f64.sqrt())).abs() < 1e-12);
}
