/*!
This crate makes predictions with models trained by a remote machine learning service, entirely locally. A model description is loaded once with [`Model::load`], which validates it and builds the typed structures of the evaluator crates, and then any number of predictions can be made with [`predict`], concurrently if need be.

Ensembles whose member trees are not at hand can be resolved with [`resolve_ensemble`] and a [`ModelFetcher`].
*/

#![allow(clippy::tabs_in_doc_comments)]

pub mod cluster;
pub mod fetch;
pub mod load;
pub mod model;
pub mod options;
pub mod predict;
pub mod time_series;
pub mod topic_model;

pub use self::{
	fetch::{load_supplied_ensemble, resolve_ensemble, MemoryFetcher, ModelFetcher},
	options::PredictOptions,
	predict::{predict, Model, ModelKind, PredictOutput},
};
pub use localml_util::{Error, Result};
