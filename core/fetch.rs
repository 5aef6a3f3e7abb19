/*!
Ensembles list their members by id. The member descriptions are either supplied alongside the ensemble or resolved through a [`ModelFetcher`], which is the only asynchronous seam in the library. Evaluation never waits on a fetch: an ensemble is resolved completely before any member tree runs.
*/

use crate::{load::load_ensemble, model};
use futures::future::{self, BoxFuture, FutureExt};
use itertools::Itertools;
use localml_tree::Ensemble;
use localml_util::{Error, Result};
use log::debug;
use std::collections::BTreeMap;

/// A source of model descriptions, usually a client for the service that trained them.
pub trait ModelFetcher: Sync {
	fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<serde_json::Value>>;
}

/// A `ModelFetcher` over descriptions already held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
	models: BTreeMap<String, serde_json::Value>,
}

impl MemoryFetcher {
	pub fn new() -> MemoryFetcher {
		MemoryFetcher::default()
	}

	pub fn insert(&mut self, id: impl Into<String>, model: serde_json::Value) {
		self.models.insert(id.into(), model);
	}
}

impl ModelFetcher for MemoryFetcher {
	fn fetch<'a>(&'a self, id: &'a str) -> BoxFuture<'a, anyhow::Result<serde_json::Value>> {
		let result = self
			.models
			.get(id)
			.cloned()
			.ok_or_else(|| anyhow::anyhow!("no model with id \"{}\"", id));
		future::ready(result).boxed()
	}
}

/// The id a member description declares in its `resource` key, at the top level or inside its envelope.
fn resource_id(value: &serde_json::Value) -> Option<&str> {
	value
		.get("resource")
		.or_else(|| value.get("object").and_then(|object| object.get("resource")))
		.and_then(|resource| resource.as_str())
}

/// Key the supplied members by id. A member without a `resource` key takes the id listed at its position.
fn index_members(
	models: &[String],
	supplied: Vec<serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
	supplied
		.into_iter()
		.enumerate()
		.filter_map(|(position, value)| {
			let id = resource_id(&value)
				.map(|id| id.to_owned())
				.or_else(|| models.get(position).cloned())?;
			Some((id, value))
		})
		.collect()
}

fn assemble(
	ensemble: model::Ensemble,
	members: &BTreeMap<String, serde_json::Value>,
) -> Result<Ensemble> {
	let trees = ensemble
		.models
		.iter()
		.map(|id| {
			let member = members
				.get(id)
				.ok_or_else(|| Error::UnresolvedEnsembleMember {
					member: id.clone(),
					reason: "the member was not supplied".to_owned(),
				})?;
			model::from_value::<model::TreeModel>(member)
		})
		.collect::<Result<Vec<_>>>()?;
	load_ensemble(ensemble, trees)
}

/// Build an ensemble from its description and the descriptions of all of its members.
pub fn load_supplied_ensemble(
	description: &serde_json::Value,
	supplied: Vec<serde_json::Value>,
) -> Result<Ensemble> {
	let ensemble = model::from_value::<model::Ensemble>(description)?;
	let members = index_members(&ensemble.models, supplied);
	assemble(ensemble, &members)
}

/// Build an ensemble, fetching every member that was not supplied. The fetches run concurrently and the first failure is reported.
pub async fn resolve_ensemble(
	description: &serde_json::Value,
	supplied: Vec<serde_json::Value>,
	fetcher: &dyn ModelFetcher,
) -> Result<Ensemble> {
	let ensemble = model::from_value::<model::Ensemble>(description)?;
	let mut members = index_members(&ensemble.models, supplied);
	let missing = ensemble
		.models
		.iter()
		.filter(|id| !members.contains_key(*id))
		.unique()
		.collect::<Vec<_>>();
	debug!(
		"fetching {} of {} ensemble members",
		missing.len(),
		ensemble.models.len()
	);
	let fetched = future::try_join_all(missing.into_iter().map(|id| async move {
		let member = fetcher
			.fetch(id)
			.await
			.map_err(|error| Error::UnresolvedEnsembleMember {
				member: id.clone(),
				reason: error.to_string(),
			})?;
		Ok::<_, Error>((id.clone(), member))
	}))
	.await?;
	members.extend(fetched);
	assemble(ensemble, &members)
}

#[cfg(test)]
fn member(resource: &str, output: &str) -> serde_json::Value {
	serde_json::json!({
		"resource": resource,
		"objective_field": "000000",
		"model": {
			"fields": { "000000": { "name": "label", "optype": "categorical" } },
			"root": {
				"predicate": true,
				"count": 2,
				"output": output,
				"objective_summary": { "categories": [[output, 2]] }
			}
		}
	})
}

#[test]
fn test_resolve_ensemble() {
	let description = serde_json::json!({ "models": ["model/1", "model/2", "model/3"] });
	let mut fetcher = MemoryFetcher::new();
	fetcher.insert("model/2", member("model/2", "b"));
	fetcher.insert("model/3", member("model/3", "c"));
	// The supplied member is used even though the fetcher does not know it.
	let ensemble = futures::executor::block_on(resolve_ensemble(
		&description,
		vec![member("model/1", "a")],
		&fetcher,
	))
	.unwrap();
	let outputs = ensemble
		.trees
		.iter()
		.map(|tree| tree.nodes[0].output.to_string())
		.collect::<Vec<_>>();
	assert_eq!(outputs, vec!["a", "b", "c"]);
}

#[test]
fn test_unresolved_member() {
	let description = serde_json::json!({ "models": ["model/1", "model/2"] });
	let fetcher = MemoryFetcher::new();
	let error = futures::executor::block_on(resolve_ensemble(
		&description,
		vec![member("model/1", "a")],
		&fetcher,
	))
	.unwrap_err();
	assert_eq!(
		error,
		Error::UnresolvedEnsembleMember {
			member: "model/2".to_owned(),
			reason: "no model with id \"model/2\"".to_owned(),
		}
	);
	let error = load_supplied_ensemble(&description, vec![member("model/1", "a")]).unwrap_err();
	assert_eq!(
		error.to_string(),
		"unresolved ensemble member model/2: the member was not supplied"
	);
}
