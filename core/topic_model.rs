/*!
Topic distributions are inferred with a collapsed Gibbs sampler over the topic-term weights the model was trained with. The sampler is seeded from the model so the same document always gets the same distribution.
*/

use crate::{load::load_fields, model};
use fnv::FnvHashMap;
use localml_features::{Fields, InputData, Optype};
use localml_util::{tokenizer::Tokenizer, Error, Result};
use num_traits::ToPrimitive;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::{convert::TryFrom, sync::Arc};

/// Longer terms are truncated to this many characters before they are looked up.
const MAX_TERM_LENGTH: usize = 30;
const MIN_UPDATES: usize = 16;
const MAX_UPDATES: usize = 512;
const SAMPLES_PER_TOPIC: usize = 128;

#[derive(Clone, Debug)]
pub struct TopicModel {
	pub topics: Vec<Topic>,
	/// Maps each term of the termset to its index.
	pub terms: FnvHashMap<String, usize>,
	/// `phi[term][topic]` is the probability of the term under the topic.
	pub phi: Vec<Vec<f64>>,
	pub alpha: f64,
	pub seed: u64,
	pub case_sensitive: bool,
	pub bigrams: bool,
	pub fields: Arc<Fields>,
	/// The text fields documents are read from.
	pub input_fields: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Topic {
	pub id: String,
	pub name: String,
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicProbability {
	pub id: String,
	pub name: String,
	pub probability: f64,
}

impl TryFrom<model::TopicModel> for TopicModel {
	type Error = Error;
	fn try_from(value: model::TopicModel) -> Result<TopicModel> {
		let body = value.topic_model;
		let fields = load_fields(body.fields)?;
		let n_topics = body.topics.len();
		if n_topics == 0 {
			return Err(Error::invalid_model("the topic model has no topics"));
		}
		if body.term_topic_assignments.len() != body.termset.len() {
			return Err(Error::invalid_model(format!(
				"the topic model has {} terms but {} term assignments",
				body.termset.len(),
				body.term_topic_assignments.len()
			)));
		}
		if let Some(assignments) = body
			.term_topic_assignments
			.iter()
			.find(|assignments| assignments.len() != n_topics)
		{
			return Err(Error::invalid_model(format!(
				"a term is assigned to {} topics but the model has {}",
				assignments.len(),
				n_topics
			)));
		}
		let n_terms = body.termset.len().to_f64().unwrap_or(0.0);
		let beta = body.beta;
		let mut totals = vec![0u64; n_topics];
		for assignments in body.term_topic_assignments.iter() {
			for (total, count) in totals.iter_mut().zip(assignments.iter()) {
				*total += count;
			}
		}
		let phi = body
			.term_topic_assignments
			.iter()
			.map(|assignments| {
				assignments
					.iter()
					.zip(totals.iter())
					.map(|(count, total)| {
						let count = count.to_f64().unwrap_or(0.0);
						let total = total.to_f64().unwrap_or(0.0);
						(count + beta) / (total + n_terms * beta)
					})
					.collect()
			})
			.collect();
		let terms = body
			.termset
			.into_iter()
			.enumerate()
			.map(|(index, term)| (term, index))
			.collect();
		let input_fields = if value.input_fields.is_empty() {
			fields
				.iter()
				.filter(|field| field.optype == Optype::Text)
				.map(|field| field.id.clone())
				.collect()
		} else {
			value.input_fields
		};
		Ok(TopicModel {
			topics: body
				.topics
				.into_iter()
				.map(|topic| Topic {
					id: topic.id,
					name: topic.name,
				})
				.collect(),
			terms,
			phi,
			alpha: body.alpha,
			seed: body.seed,
			case_sensitive: body.case_sensitive,
			bigrams: body.bigrams,
			fields: Arc::new(fields),
			input_fields,
		})
	}
}

fn truncate(term: &str) -> &str {
	match term.char_indices().nth(MAX_TERM_LENGTH) {
		Some((index, _)) => &term[..index],
		None => term,
	}
}

impl TopicModel {
	/// The indexes of the known terms in the text fields of `input`, in reading order.
	pub fn document(&self, input: &InputData) -> Vec<usize> {
		let mut document = Vec::new();
		for id in self.input_fields.iter() {
			let text = match input.get(id).and_then(|value| value.as_text()) {
				Some(text) => text,
				None => continue,
			};
			let tokens = Tokenizer::new(text, self.case_sensitive).collect::<Vec<_>>();
			for (index, token) in tokens.iter().enumerate() {
				if let Some(term) = self.terms.get(truncate(token)) {
					document.push(*term);
				}
				if self.bigrams {
					if let Some(next) = tokens.get(index + 1) {
						let bigram = format!("{} {}", token, next);
						if let Some(term) = self.terms.get(truncate(&bigram)) {
							document.push(*term);
						}
					}
				}
			}
		}
		document
	}

	/// Infer the topic distribution of `input`. The probabilities follow the order of `topics` and sum to 1.
	pub fn distribution(&self, input: &InputData) -> Vec<TopicProbability> {
		let probabilities = self.infer(&self.document(input));
		self.topics
			.iter()
			.zip(probabilities)
			.map(|(topic, probability)| TopicProbability {
				id: topic.id.clone(),
				name: topic.name.clone(),
				probability,
			})
			.collect()
	}

	fn infer(&self, document: &[usize]) -> Vec<f64> {
		let n_topics = self.topics.len();
		let k = n_topics.to_f64().unwrap_or(1.0);
		if document.is_empty() {
			return vec![1.0 / k; n_topics];
		}
		let updates = (SAMPLES_PER_TOPIC * n_topics / document.len()).max(MIN_UPDATES).min(MAX_UPDATES);
		let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
		let mut assignments = document
			.iter()
			.map(|_| rng.gen_range(0, n_topics))
			.collect::<Vec<_>>();
		let mut topic_counts = vec![0u64; n_topics];
		for topic in assignments.iter() {
			topic_counts[*topic] += 1;
		}
		let mut sums = vec![0u64; n_topics];
		let mut weights = vec![0.0; n_topics];
		// Burn in for as many sweeps as are sampled.
		for sweep in 0..2 * updates {
			for (term, assignment) in document.iter().zip(assignments.iter_mut()) {
				topic_counts[*assignment] -= 1;
				let mut total = 0.0;
				for (topic, weight) in weights.iter_mut().enumerate() {
					total += (topic_counts[topic].to_f64().unwrap_or(0.0) + self.alpha) * self.phi[*term][topic];
					*weight = total;
				}
				let draw = rng.gen::<f64>() * total;
				let topic = weights
					.iter()
					.position(|weight| draw < *weight)
					.unwrap_or(n_topics - 1);
				*assignment = topic;
				topic_counts[topic] += 1;
			}
			if sweep >= updates {
				for (sum, count) in sums.iter_mut().zip(topic_counts.iter()) {
					*sum += count;
				}
			}
		}
		let denominator = (document.len() * updates).to_f64().unwrap_or(0.0) + k * self.alpha;
		sums.iter()
			.map(|sum| (sum.to_f64().unwrap_or(0.0) + self.alpha) / denominator)
			.collect()
	}
}

#[cfg(test)]
fn test_model() -> TopicModel {
	let description = serde_json::json!({
		"topic_model": {
			"alpha": 0.5,
			"beta": 0.1,
			"seed": 42,
			"bigrams": true,
			"topics": [
				{ "id": "000000", "name": "Sports" },
				{ "id": "000001", "name": "Cooking" }
			],
			"termset": ["ball", "goal", "oven", "recipe", "goal keeper"],
			"term_topic_assignments": [[40, 0], [30, 1], [0, 25], [1, 35], [10, 0]],
			"fields": { "000000": { "name": "body", "optype": "text" } }
		}
	});
	TopicModel::try_from(model::from_value::<model::TopicModel>(&description).unwrap()).unwrap()
}

#[test]
fn test_document() {
	let model = test_model();
	let input = maplit::btreemap! {
		"000000".to_owned() => localml_features::Value::Text("The Goal keeper caught the BALL".to_owned()),
	};
	assert_eq!(model.document(&input), vec![1, 4, 0]);
	assert_eq!(truncate(&"x".repeat(40)).len(), MAX_TERM_LENGTH);
}

#[test]
fn test_distribution() {
	let model = test_model();
	let input = maplit::btreemap! {
		"000000".to_owned() => localml_features::Value::Text("ball goal ball goal keeper".to_owned()),
	};
	let distribution = model.distribution(&input);
	let sum: f64 = distribution.iter().map(|topic| topic.probability).sum();
	assert!((sum - 1.0).abs() < 1e-9);
	assert_eq!(distribution[0].name, "Sports");
	assert!(distribution[0].probability > distribution[1].probability);
	// Inference is deterministic for a given model.
	assert_eq!(model.distribution(&input), distribution);
	let empty = model.distribution(&InputData::new());
	assert_eq!(empty[0].probability, 0.5);
	assert_eq!(empty[1].probability, 0.5);
}
