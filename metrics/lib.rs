/*!
This crate implements the statistics shared by every evaluator: distributions of outcomes and their merging, the mean, median and variance of numeric distributions, and the confidence measures reported with predictions.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod confidence;
mod distribution;
mod mean_variance;

pub use self::confidence::{regression_error, wilson_lower_bound, ws_confidence, DEFAULT_Z};
pub use self::distribution::{merge_bins, merge_distributions, Distribution, Outcome, BINS_LIMIT};
pub use self::mean_variance::{mean, median, variance};
