use itertools::Itertools;
use localml_util::finite::{Finite, NotFiniteError};
use num_traits::ToPrimitive;
use std::{cmp::Ordering, collections::BTreeMap};

/// Merged regression distributions are reduced to at most this many bins.
pub const BINS_LIMIT: usize = 32;

/// An `Outcome` is a value of the objective field: a category for classification or a number for regression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
	Category(String),
	Number(Finite),
}

impl Outcome {
	pub fn number(value: f64) -> Result<Outcome, NotFiniteError> {
		Ok(Outcome::Number(Finite::new(value)?))
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Outcome::Number(value) => Some(value.get()),
			Outcome::Category(_) => None,
		}
	}

	pub fn as_category(&self) -> Option<&str> {
		match self {
			Outcome::Category(value) => Some(value),
			Outcome::Number(_) => None,
		}
	}
}

impl std::fmt::Display for Outcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Outcome::Category(value) => write!(f, "{}", value),
			Outcome::Number(value) => write!(f, "{}", value),
		}
	}
}

impl serde::Serialize for Outcome {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		match self {
			Outcome::Category(value) => serializer.serialize_str(value),
			Outcome::Number(value) => serializer.serialize_f64(value.get()),
		}
	}
}

/**
A `Distribution` is a weighted multiset of outcomes. Categorical distributions keep the order their entries were declared in. Numeric distributions are kept sorted by value.
*/
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Distribution(Vec<(Outcome, u64)>);

impl Distribution {
	/// Create a distribution from its entries. Entries with the same outcome are combined and numeric distributions are sorted.
	pub fn new(entries: Vec<(Outcome, u64)>) -> Distribution {
		Distribution::default().merge(&Distribution(entries))
	}

	/// Create a numeric distribution from `[point, count]` pairs.
	pub fn from_points(points: &[(f64, u64)]) -> Result<Distribution, NotFiniteError> {
		let entries = points
			.iter()
			.map(|(point, count)| Ok((Outcome::number(*point)?, *count)))
			.collect::<Result<Vec<_>, NotFiniteError>>()?;
		Ok(Distribution::new(entries))
	}

	pub fn entries(&self) -> &[(Outcome, u64)] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The sum of the instance counts of all entries.
	pub fn total(&self) -> u64 {
		self.0.iter().map(|(_, count)| count).sum()
	}

	/// The instance count for `outcome`, or zero if it does not appear.
	pub fn count(&self, outcome: &Outcome) -> u64 {
		self.0
			.iter()
			.find(|(value, _)| value == outcome)
			.map(|(_, count)| *count)
			.unwrap_or(0)
	}

	/// A distribution is numeric if it is not empty and all of its outcomes are numbers.
	pub fn is_numeric(&self) -> bool {
		!self.0.is_empty()
			&& self
				.0
				.iter()
				.all(|(outcome, _)| matches!(outcome, Outcome::Number(_)))
	}

	/// The `[point, count]` pairs of the numeric entries, in ascending order.
	pub fn points(&self) -> Vec<(f64, u64)> {
		self.0
			.iter()
			.filter_map(|(outcome, count)| outcome.as_number().map(|point| (point, *count)))
			.collect()
	}

	/// The entries ordered by descending count. Ties are ordered by ascending outcome.
	pub fn sorted_by_count(&self) -> Vec<(Outcome, u64)> {
		self.0
			.iter()
			.cloned()
			.sorted_by(|(outcome_a, count_a), (outcome_b, count_b)| {
				match count_b.cmp(count_a) {
					Ordering::Equal => outcome_a.cmp(outcome_b),
					ordering => ordering,
				}
			})
			.collect()
	}

	/// The entry with the greatest count. Ties go to the entry declared first.
	pub fn mode(&self) -> Option<&Outcome> {
		let mut best: Option<&(Outcome, u64)> = None;
		for entry in self.0.iter() {
			match best {
				Some((_, count)) if *count >= entry.1 => {}
				_ => best = Some(entry),
			}
		}
		best.map(|(outcome, _)| outcome)
	}

	/// The proportion of instances with `outcome`.
	pub fn probability(&self, outcome: &Outcome) -> f64 {
		let total = self.total();
		if total == 0 {
			return 0.0;
		}
		self.count(outcome).to_f64().unwrap_or(0.0) / total.to_f64().unwrap_or(1.0)
	}

	/// Add the counts of `other` to the counts of `self`. Outcomes that appear only in `other` are appended.
	pub fn merge(&self, other: &Distribution) -> Distribution {
		let mut entries = self.0.clone();
		for (outcome, count) in other.0.iter() {
			match entries.iter_mut().find(|(value, _)| value == outcome) {
				Some((_, existing)) => *existing += count,
				None => entries.push((outcome.clone(), *count)),
			}
		}
		let mut distribution = Distribution(entries);
		if distribution.is_numeric() {
			distribution.0.sort_by(|(a, _), (b, _)| a.cmp(b));
		}
		distribution
	}

	pub fn to_map(&self) -> BTreeMap<Outcome, u64> {
		self.0.iter().cloned().collect()
	}
}

impl std::iter::FromIterator<(Outcome, u64)> for Distribution {
	fn from_iter<I: IntoIterator<Item = (Outcome, u64)>>(iter: I) -> Self {
		Distribution::new(iter.into_iter().collect())
	}
}

/// Additive union of two distributions keyed by outcome value.
pub fn merge_distributions(a: &Distribution, b: &Distribution) -> Distribution {
	a.merge(b)
}

/**
Merge the two closest adjacent bins of an ordered numeric distribution until no more than `limit` bins remain. The merged bin's point is the count-weighted average of the two points and its count is their sum. When two adjacent pairs are equally close, the pair that comes first is merged.
*/
pub fn merge_bins(distribution: &[(f64, u64)], limit: usize) -> Vec<(f64, u64)> {
	let mut bins = distribution.to_vec();
	if limit < 1 {
		return bins;
	}
	while bins.len() > limit && bins.len() >= 2 {
		let mut index_to_merge = 1;
		let mut shortest = std::f64::INFINITY;
		for index in 1..bins.len() {
			let distance = bins[index].0 - bins[index - 1].0;
			if distance < shortest {
				shortest = distance;
				index_to_merge = index;
			}
		}
		let (left_point, left_count) = bins[index_to_merge - 1];
		let (right_point, right_count) = bins[index_to_merge];
		let count = left_count + right_count;
		let point = if count == 0 {
			(left_point + right_point) / 2.0
		} else {
			(left_point * left_count.to_f64().unwrap_or(0.0)
				+ right_point * right_count.to_f64().unwrap_or(0.0))
				/ count.to_f64().unwrap_or(1.0)
		};
		bins[index_to_merge - 1] = (point, count);
		bins.remove(index_to_merge);
	}
	bins
}

#[cfg(test)]
fn categories(entries: &[(&str, u64)]) -> Distribution {
	Distribution::new(
		entries
			.iter()
			.map(|(value, count)| (Outcome::Category((*value).to_owned()), *count))
			.collect(),
	)
}

#[test]
fn test_merge_distributions_identity() {
	let d = categories(&[("A", 7), ("B", 3)]);
	assert_eq!(merge_distributions(&d, &Distribution::default()), d);
	assert_eq!(merge_distributions(&Distribution::default(), &d), d);
}

#[test]
fn test_merge_distributions_commutative_and_associative() {
	let a = categories(&[("A", 5), ("B", 0)]);
	let b = categories(&[("A", 2), ("B", 3), ("C", 1)]);
	let c = categories(&[("C", 4), ("D", 2)]);
	assert_eq!(
		merge_distributions(&a, &b).to_map(),
		merge_distributions(&b, &a).to_map()
	);
	assert_eq!(
		merge_distributions(&merge_distributions(&a, &b), &c).to_map(),
		merge_distributions(&a, &merge_distributions(&b, &c)).to_map()
	);
	let merged = merge_distributions(&a, &b);
	assert_eq!(merged, categories(&[("A", 7), ("B", 3), ("C", 1)]));
	assert_eq!(merged.total(), 11);
}

#[test]
fn test_merge_numeric_distributions_is_sorted() {
	let a = Distribution::from_points(&[(3.0, 1), (1.0, 2)]).unwrap();
	let b = Distribution::from_points(&[(2.0, 4), (1.0, 1)]).unwrap();
	assert_eq!(a.merge(&b).points(), vec![(1.0, 3), (2.0, 4), (3.0, 1)]);
}

#[test]
fn test_sorted_by_count_and_mode() {
	let d = categories(&[("b", 3), ("a", 3), ("c", 5)]);
	let sorted = d
		.sorted_by_count()
		.into_iter()
		.map(|(outcome, count)| (outcome.to_string(), count))
		.collect::<Vec<_>>();
	assert_eq!(
		sorted,
		vec![
			("c".to_owned(), 5),
			("a".to_owned(), 3),
			("b".to_owned(), 3)
		]
	);
	let d = categories(&[("b", 3), ("a", 3)]);
	assert_eq!(d.mode(), Some(&Outcome::Category("b".to_owned())));
}

#[test]
fn test_merge_bins() {
	let merged = merge_bins(&[(1.0, 1), (2.0, 1), (10.0, 2)], 2);
	insta::assert_debug_snapshot!(merged, @r###"
 [
     (
         1.5,
         2,
     ),
     (
         10.0,
         2,
     ),
 ]
 "###);
}

#[test]
fn test_merge_bins_ties_merge_first_pair() {
	let merged = merge_bins(&[(0.0, 1), (1.0, 1), (2.0, 1)], 2);
	assert_eq!(merged, vec![(0.5, 2), (2.0, 1)]);
}

#[test]
fn test_merge_bins_respects_limit_and_preserves_counts() {
	let points = (0..100)
		.map(|i| ((i * i) as f64 * 0.37, (i % 7) as u64 + 1))
		.collect::<Vec<_>>();
	let total: u64 = points.iter().map(|(_, count)| count).sum();
	for limit in &[1, 2, 5, 32, 99, 100, 150] {
		let merged = merge_bins(&points, *limit);
		assert!(merged.len() <= *limit);
		assert_eq!(merged.iter().map(|(_, count)| count).sum::<u64>(), total);
	}
}
