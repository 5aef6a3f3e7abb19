use crate::{TraversalOptions, Tree, TreePrediction};
use itertools::izip;
use localml_features::InputData;
use localml_metrics::{median, merge_bins, Distribution, Outcome, BINS_LIMIT};
use localml_util::{Error, Result};
use num_traits::ToPrimitive;
use rayon::prelude::*;

/// Confidence-weighted regression spreads member weights over `exp(0)..exp(-TOP_RANGE)`.
const TOP_RANGE: f64 = 10.0;

/// An `Ensemble` is an ordered sequence of trees predicting the same objective field.
#[derive(Clone, Debug)]
pub struct Ensemble {
	pub trees: Vec<Tree>,
	/// Optional per-tree weights, one for each tree.
	pub weights: Option<Vec<f64>>,
}

/// The method used to combine the predictions of the trees in an ensemble.
#[derive(Clone, Debug, PartialEq)]
pub enum CombinationMethod {
	/// One vote per tree, or the mean for regression.
	Plurality,
	/// Votes weighted by each tree's confidence, or the error-weighted mean for regression.
	Confidence,
	/// Each tree votes for every category with the share of instances at the node it reached.
	Probability,
	/// `category` wins if at least `threshold` trees predict it. Otherwise plurality decides among the other predictions.
	Threshold { threshold: usize, category: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnsemblePrediction {
	pub prediction: Outcome,
	pub confidence: f64,
	/// The winning share of the combined votes. Regression ensembles do not report one.
	pub probability: Option<f64>,
	pub count: u64,
	pub median: Option<f64>,
	/// The union of the distributions of the nodes every member reached.
	pub distribution: Distribution,
	/// The weight of each outcome voted for, in the order the outcomes were first seen.
	pub votes: Vec<(Outcome, f64)>,
}

impl Ensemble {
	pub fn regression(&self) -> bool {
		self.trees.first().map(|tree| tree.regression).unwrap_or(false)
	}

	/// Make a prediction with every tree and combine the results. Trees are evaluated in parallel.
	pub fn predict(
		&self,
		input: &InputData,
		method: &CombinationMethod,
		options: &TraversalOptions,
	) -> Result<EnsemblePrediction> {
		let predictions = self
			.trees
			.par_iter()
			.map(|tree| tree.predict(input, options))
			.collect::<Result<Vec<_>>>()?;
		combine(&predictions, self.weights.as_deref(), method, self.regression())
	}
}

/// Combine the predictions of the members of an ensemble.
pub fn combine(
	predictions: &[TreePrediction],
	weights: Option<&[f64]>,
	method: &CombinationMethod,
	regression: bool,
) -> Result<EnsemblePrediction> {
	if predictions.is_empty() {
		return Err(Error::invalid_model("the ensemble has no members"));
	}
	let weights = match weights {
		Some(weights) if weights.len() == predictions.len() => weights.to_owned(),
		Some(weights) => {
			return Err(Error::invalid_model(format!(
				"the ensemble has {} members but {} weights",
				predictions.len(),
				weights.len()
			)))
		}
		None => vec![1.0; predictions.len()],
	};
	let distribution = predictions
		.iter()
		.fold(Distribution::default(), |distribution, prediction| {
			distribution.merge(&prediction.distribution)
		});
	if regression {
		combine_regression(predictions, &weights, method, distribution)
	} else {
		combine_classification(predictions, &weights, method, distribution)
	}
}

struct Vote {
	outcome: Outcome,
	weight: f64,
	confidence: f64,
}

fn combine_classification(
	predictions: &[TreePrediction],
	weights: &[f64],
	method: &CombinationMethod,
	distribution: Distribution,
) -> Result<EnsemblePrediction> {
	let members = izip!(predictions.iter(), weights.iter().cloned()).collect::<Vec<_>>();
	let members = match method {
		CombinationMethod::Threshold {
			threshold,
			category,
		} => {
			if *threshold < 1 || *threshold > predictions.len() {
				return Err(Error::invalid_option(format!(
					"threshold must be between 1 and the number of trees, {}",
					predictions.len()
				)));
			}
			let is_category =
				|prediction: &TreePrediction| prediction.prediction.as_category() == Some(category.as_str());
			let category_votes = members.iter().filter(|(prediction, _)| is_category(prediction)).count();
			let singled_out = category_votes >= *threshold;
			members
				.into_iter()
				.filter(|(prediction, _)| is_category(prediction) == singled_out)
				.collect()
		}
		_ => members,
	};
	let mut votes: Vec<Vote> = Vec::new();
	let mut add_vote = |outcome: &Outcome, weight: f64, confidence: f64| {
		match votes.iter_mut().find(|vote| &vote.outcome == outcome) {
			Some(vote) => {
				vote.weight += weight;
				vote.confidence += confidence;
			}
			None => votes.push(Vote {
				outcome: outcome.clone(),
				weight,
				confidence,
			}),
		}
	};
	for (prediction, weight) in members.iter() {
		match method {
			CombinationMethod::Plurality | CombinationMethod::Threshold { .. } => {
				add_vote(&prediction.prediction, *weight, prediction.confidence)
			}
			CombinationMethod::Confidence => add_vote(
				&prediction.prediction,
				weight * prediction.confidence,
				prediction.confidence,
			),
			CombinationMethod::Probability => {
				let total = prediction.distribution.total();
				if total == 0 {
					add_vote(&prediction.prediction, *weight, prediction.confidence);
					continue;
				}
				let total = total.to_f64().unwrap_or(1.0);
				for (outcome, count) in prediction.distribution.entries() {
					let share = count.to_f64().unwrap_or(0.0) / total;
					let confidence = if *outcome == prediction.prediction {
						prediction.confidence
					} else {
						0.0
					};
					add_vote(outcome, weight * share, confidence);
				}
			}
		}
	}
	// Ties go to the greater total confidence, then to the outcome seen first.
	let mut winner: Option<&Vote> = None;
	for vote in votes.iter() {
		winner = match winner {
			Some(best)
				if best.weight > vote.weight
					|| (best.weight == vote.weight && best.confidence >= vote.confidence) =>
			{
				Some(best)
			}
			_ => Some(vote),
		};
	}
	let winner = winner.ok_or_else(|| Error::invalid_model("the ensemble produced no votes"))?;
	let total_weight: f64 = votes.iter().map(|vote| vote.weight).sum();
	let probability = if total_weight > 0.0 {
		winner.weight / total_weight
	} else {
		0.0
	};
	let mut confidence_sum = 0.0;
	let mut confidence_weight = 0.0;
	let mut count = 0;
	for (prediction, weight) in members.iter() {
		if prediction.prediction != winner.outcome {
			continue;
		}
		let weight = match method {
			CombinationMethod::Confidence => weight * prediction.confidence,
			CombinationMethod::Probability => weight * prediction.distribution.probability(&winner.outcome),
			CombinationMethod::Plurality | CombinationMethod::Threshold { .. } => *weight,
		};
		confidence_sum += weight * prediction.confidence;
		confidence_weight += weight;
		count += prediction.count;
	}
	let confidence = if confidence_weight > 0.0 {
		confidence_sum / confidence_weight
	} else {
		0.0
	};
	Ok(EnsemblePrediction {
		prediction: winner.outcome.clone(),
		confidence,
		probability: Some(probability),
		count,
		median: None,
		distribution,
		votes: votes
			.iter()
			.map(|vote| (vote.outcome.clone(), vote.weight))
			.collect(),
	})
}

fn combine_regression(
	predictions: &[TreePrediction],
	weights: &[f64],
	method: &CombinationMethod,
	distribution: Distribution,
) -> Result<EnsemblePrediction> {
	let weights = match method {
		CombinationMethod::Plurality | CombinationMethod::Probability => weights.to_owned(),
		CombinationMethod::Confidence => {
			let errors = predictions
				.iter()
				.map(|prediction| prediction.confidence)
				.collect::<Vec<_>>();
			let min_error = errors.iter().cloned().fold(std::f64::INFINITY, f64::min);
			let max_error = errors.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max);
			izip!(errors.iter(), weights.iter())
				.map(|(error, weight)| {
					if max_error > min_error {
						weight * ((min_error - error) / (max_error - min_error) * TOP_RANGE).exp()
					} else {
						*weight
					}
				})
				.collect()
		}
		CombinationMethod::Threshold { .. } => {
			return Err(Error::invalid_option(
				"the threshold method applies only to classification ensembles",
			))
		}
	};
	let mut prediction_sum = 0.0;
	let mut confidence_sum = 0.0;
	let mut weight_sum = 0.0;
	for (prediction, weight) in izip!(predictions.iter(), weights.iter()) {
		let value = prediction
			.prediction
			.as_number()
			.ok_or_else(|| Error::invalid_model("a regression tree predicted a category"))?;
		prediction_sum += weight * value;
		confidence_sum += weight * prediction.confidence;
		weight_sum += weight;
	}
	if weight_sum <= 0.0 {
		return Err(Error::invalid_model("the ensemble weights sum to zero"));
	}
	let prediction = prediction_sum / weight_sum;
	let bins = merge_bins(&distribution.points(), BINS_LIMIT);
	let total: u64 = bins.iter().map(|(_, count)| count).sum();
	let distribution = Distribution::from_points(&bins)
		.map_err(|_| Error::invalid_model("regression distribution is not finite"))?;
	let outcome = Outcome::number(prediction)
		.map_err(|_| Error::invalid_model("regression prediction is not finite"))?;
	Ok(EnsemblePrediction {
		prediction: outcome.clone(),
		confidence: confidence_sum / weight_sum,
		probability: None,
		count: predictions.iter().map(|prediction| prediction.count).sum(),
		median: median(&bins, total),
		distribution,
		votes: vec![(outcome, weight_sum)],
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::predict::test::{categories, input, two_level_tree};
	use crate::{DistributionUnit, MissingStrategy};

	fn vote(value: &str, confidence: f64, distribution: Distribution) -> TreePrediction {
		TreePrediction {
			prediction: Outcome::Category(value.to_owned()),
			confidence,
			probability: Some(distribution.probability(&Outcome::Category(value.to_owned()))),
			count: distribution.total(),
			median: None,
			path: Vec::new(),
			distribution,
			distribution_unit: DistributionUnit::Categories,
			next: None,
		}
	}

	fn number(value: f64, confidence: f64) -> TreePrediction {
		TreePrediction {
			prediction: Outcome::number(value).unwrap(),
			confidence,
			probability: None,
			count: 4,
			median: None,
			path: Vec::new(),
			distribution: Distribution::from_points(&[(value, 4)]).unwrap(),
			distribution_unit: DistributionUnit::Counts,
			next: None,
		}
	}

	#[test]
	fn test_identical_trees() {
		let predictions = (0..3)
			.map(|_| vote("yes", 0.8, categories(&[("yes", 8), ("no", 2)])))
			.collect::<Vec<_>>();
		for method in &[CombinationMethod::Plurality, CombinationMethod::Confidence] {
			let combined = combine(&predictions, None, method, false).unwrap();
			assert_eq!(combined.prediction, Outcome::Category("yes".to_owned()));
			assert_eq!(combined.probability, Some(1.0));
			assert!((combined.confidence - 0.8).abs() < 1e-12);
			assert_eq!(combined.count, 30);
		}
	}

	#[test]
	fn test_single_tree_plurality() {
		let tree = two_level_tree();
		let ensemble = Ensemble {
			trees: vec![tree.clone()],
			weights: None,
		};
		for record in &[input(&[("field1", "x")]), input(&[("field1", "y")]), input(&[])] {
			let options = TraversalOptions::default();
			let single = tree.predict(record, &options).unwrap();
			let combined = ensemble
				.predict(record, &CombinationMethod::Plurality, &options)
				.unwrap();
			assert_eq!(combined.prediction, single.prediction);
			assert_eq!(combined.confidence, single.confidence);
			assert_eq!(combined.count, single.count);
			assert_eq!(combined.distribution, single.distribution);
		}
	}

	#[test]
	fn test_plurality_ties() {
		let predictions = vec![
			vote("a", 0.2, categories(&[("a", 2)])),
			vote("b", 0.6, categories(&[("b", 2)])),
			vote("c", 0.6, categories(&[("c", 2)])),
		];
		let combined = combine(&predictions, None, &CombinationMethod::Plurality, false).unwrap();
		assert_eq!(combined.prediction, Outcome::Category("b".to_owned()));
		assert!((combined.probability.unwrap() - 1.0 / 3.0).abs() < 1e-12);
	}

	#[test]
	fn test_confidence_and_probability() {
		let predictions = vec![
			vote("a", 0.9, categories(&[("a", 9), ("b", 1)])),
			vote("b", 0.3, categories(&[("a", 4), ("b", 6)])),
			vote("b", 0.4, categories(&[("a", 3), ("b", 7)])),
		];
		let plurality = combine(&predictions, None, &CombinationMethod::Plurality, false).unwrap();
		assert_eq!(plurality.prediction, Outcome::Category("b".to_owned()));
		let confidence = combine(&predictions, None, &CombinationMethod::Confidence, false).unwrap();
		assert_eq!(confidence.prediction, Outcome::Category("a".to_owned()));
		let probability = combine(&predictions, None, &CombinationMethod::Probability, false).unwrap();
		// a: 0.9 + 0.4 + 0.3 = 1.6, b: 0.1 + 0.6 + 0.7 = 1.4
		assert_eq!(probability.prediction, Outcome::Category("a".to_owned()));
		assert!((probability.probability.unwrap() - 1.6 / 3.0).abs() < 1e-12);
		let weighted = combine(
			&predictions,
			Some(&[3.0, 1.0, 1.0]),
			&CombinationMethod::Plurality,
			false,
		)
		.unwrap();
		assert_eq!(weighted.prediction, Outcome::Category("a".to_owned()));
	}

	#[test]
	fn test_threshold() {
		let predictions = vec![
			vote("fraud", 0.5, categories(&[("fraud", 1)])),
			vote("ok", 0.7, categories(&[("ok", 1)])),
			vote("ok", 0.7, categories(&[("ok", 1)])),
		];
		let threshold = |threshold| CombinationMethod::Threshold {
			threshold,
			category: "fraud".to_owned(),
		};
		let combined = combine(&predictions, None, &threshold(1), false).unwrap();
		assert_eq!(combined.prediction, Outcome::Category("fraud".to_owned()));
		let combined = combine(&predictions, None, &threshold(2), false).unwrap();
		assert_eq!(combined.prediction, Outcome::Category("ok".to_owned()));
		assert!(combine(&predictions, None, &threshold(0), false).is_err());
		assert!(combine(&predictions, None, &threshold(4), false).is_err());
	}

	#[test]
	fn test_regression() {
		let predictions = vec![number(1.0, 0.5), number(2.0, 0.5), number(6.0, 1.5)];
		let plurality = combine(&predictions, None, &CombinationMethod::Plurality, true).unwrap();
		assert_eq!(plurality.prediction.as_number(), Some(3.0));
		assert!((plurality.confidence - 2.5 / 3.0).abs() < 1e-12);
		assert_eq!(plurality.probability, None);
		assert_eq!(plurality.count, 12);
		let confidence = combine(&predictions, None, &CombinationMethod::Confidence, true).unwrap();
		let outlier_weight = (-10.0f64).exp();
		let expected = (1.0 + 2.0 + 6.0 * outlier_weight) / (2.0 + outlier_weight);
		assert!((confidence.prediction.as_number().unwrap() - expected).abs() < 1e-12);
		let threshold = CombinationMethod::Threshold {
			threshold: 1,
			category: "x".to_owned(),
		};
		assert!(combine(&predictions, None, &threshold, true).is_err());
	}

	#[test]
	fn test_missing_strategy_reaches_members() {
		let tree = two_level_tree();
		let ensemble = Ensemble {
			trees: vec![tree.clone(), tree],
			weights: None,
		};
		let options = TraversalOptions {
			missing_strategy: MissingStrategy::Proportional,
			..TraversalOptions::default()
		};
		let combined = ensemble
			.predict(&input(&[]), &CombinationMethod::Plurality, &options)
			.unwrap();
		assert_eq!(combined.prediction, Outcome::Category("A".to_owned()));
		assert_eq!(combined.distribution, categories(&[("A", 14), ("B", 6)]));
	}
}
