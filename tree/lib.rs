/*!
This crate evaluates decision tree models: single trees, ensembles of trees combined by voting, and isolation forests scored for anomalousness.

Trees are built once by the load step in `localml_core` and never mutated afterward, so a loaded tree can be shared by any number of threads making predictions at the same time.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod anomaly;
mod ensemble;
mod predicate;
mod predict;

pub use self::anomaly::{anomaly_score, average_path_length, AnomalyForest, AnomalyNode, IsolationTree};
pub use self::ensemble::{combine, CombinationMethod, Ensemble, EnsemblePrediction};
pub use self::predicate::{Evaluation, Operand, Operator, Predicate, Split};
pub use self::predict::TreePrediction;

use localml_features::Fields;
use localml_metrics::{Distribution, Outcome, DEFAULT_Z};
use std::sync::Arc;

/// Trees are stored as a `Vec` of `Node`s with the root at index 0. Each branch holds the indexes of its children in declaration order.
#[derive(Clone, Debug)]
pub struct Tree {
	pub nodes: Vec<Node>,
	pub fields: Arc<Fields>,
	pub objective_field: String,
	/// True if the objective field is numeric.
	pub regression: bool,
}

#[derive(Clone, Debug)]
pub struct Node {
	/// The predicate guarding the branch that leads to this node. The root's predicate is `Predicate::True`.
	pub predicate: Predicate,
	/// The number of training instances that reached this node. This is the sum of the counts in `distribution`.
	pub count: u64,
	pub distribution: Distribution,
	pub distribution_unit: DistributionUnit,
	/// The best value at this node: the majority category for classification or the mean for regression.
	pub output: Outcome,
	pub median: Option<f64>,
	pub kind: NodeKind,
}

/// A node is either a branch or a leaf.
#[derive(Clone, Debug)]
pub enum NodeKind {
	Branch(BranchNode),
	Leaf,
}

#[derive(Clone, Debug)]
pub struct BranchNode {
	pub children: Vec<usize>,
}

impl Node {
	pub fn children(&self) -> &[usize] {
		match &self.kind {
			NodeKind::Branch(BranchNode { children }) => children,
			NodeKind::Leaf => &[],
		}
	}
}

/// The form the instance counts of a node are reported in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionUnit {
	Categories,
	Counts,
	Bins,
}

/// How a traversal proceeds when the field a branch tests is absent from the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MissingStrategy {
	/// Stop at the node whose children could not be chosen and report its prediction.
	LastPrediction,
	/// Descend into every child and merge the distributions of the nodes reached.
	Proportional,
}

impl Default for MissingStrategy {
	fn default() -> MissingStrategy {
		MissingStrategy::LastPrediction
	}
}

/// These are the options for a single tree traversal. Ensembles pass the same options to every member.
#[derive(Clone, Copy, Debug)]
pub struct TraversalOptions {
	pub missing_strategy: MissingStrategy,
	/// The z-score used to compute confidences.
	pub z: f64,
}

impl Default for TraversalOptions {
	fn default() -> TraversalOptions {
		TraversalOptions {
			missing_strategy: MissingStrategy::default(),
			z: DEFAULT_Z,
		}
	}
}
