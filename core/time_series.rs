/*!
This module forecasts the objective fields of a time series model. Each objective field has several fitted submodels: exponential smoothing (ETS) models named by their error, trend and seasonality components, such as `A,Ad,M`, and the trivial `naive`, `mean` and `drift` models.
*/

use crate::{load::load_fields, model};
use localml_features::Fields;
use localml_util::{Error, Result};
use log::debug;
use num_traits::ToPrimitive;
use serde::Deserialize;
use std::{collections::BTreeMap, convert::TryFrom, sync::Arc};

/// Forecasts further ahead than this are rejected.
pub const MAX_HORIZON: usize = 10_000;

#[derive(Clone, Debug)]
pub struct TimeSeries {
	pub fields: Arc<Fields>,
	/// The submodels of each objective field, by field id.
	pub submodels: BTreeMap<String, Vec<Submodel>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Submodel {
	pub name: String,
	pub kind: SubmodelKind,
	pub aic: Option<f64>,
	pub aicc: Option<f64>,
	pub bic: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SubmodelKind {
	Ets(Ets),
	/// Repeats the last observed value.
	Naive(f64),
	/// Repeats the mean of the observed values.
	Mean(f64),
	Drift { value: f64, slope: f64 },
}

/// The final state of a fitted exponential smoothing model.
#[derive(Clone, Debug, PartialEq)]
pub struct Ets {
	pub trend: Trend,
	pub seasonality: Seasonality,
	pub level: f64,
	pub slope: f64,
	/// The damping parameter of damped trends.
	pub phi: f64,
	/// The seasonal indexes, the most recent last.
	pub seasons: Vec<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trend {
	None,
	Additive,
	AdditiveDamped,
	Multiplicative,
	MultiplicativeDamped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Seasonality {
	None,
	Additive,
	Multiplicative,
}

/// The information criterion used to pick a submodel when none is named.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
	Aic,
	Aicc,
	Bic,
}

/// What to forecast for one objective field.
#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ForecastRequest {
	pub horizon: Option<usize>,
	pub ets_models: Option<SubmodelFilter>,
}

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SubmodelFilter {
	#[serde(default)]
	pub names: Vec<String>,
	pub criterion: Option<Criterion>,
}

#[derive(serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
	pub submodel: String,
	pub point_forecast: Vec<f64>,
}

impl TryFrom<model::TimeSeries> for TimeSeries {
	type Error = Error;
	fn try_from(value: model::TimeSeries) -> Result<TimeSeries> {
		let fields = load_fields(value.time_series.fields)?;
		if value.time_series.ets_models.is_empty() {
			return Err(Error::invalid_model("the time series has no submodels"));
		}
		let submodels = value
			.time_series
			.ets_models
			.into_iter()
			.map(|(id, submodels)| {
				if !fields.contains(&id) {
					return Err(Error::invalid_model(format!(
						"submodels are given for unknown field \"{}\"",
						id
					)));
				}
				let submodels = submodels
					.into_iter()
					.map(Submodel::try_from)
					.collect::<Result<Vec<_>>>()?;
				Ok((id, submodels))
			})
			.collect::<Result<BTreeMap<_, _>>>()?;
		Ok(TimeSeries {
			fields: Arc::new(fields),
			submodels,
		})
	}
}

impl TryFrom<model::EtsModel> for Submodel {
	type Error = Error;
	fn try_from(value: model::EtsModel) -> Result<Submodel> {
		let level = |value: &model::EtsModel| {
			value
				.value
				.or_else(|| value.final_state.as_ref().map(|state| state.l))
				.ok_or_else(|| {
					Error::invalid_model(format!("submodel \"{}\" has no level", value.name))
				})
		};
		let kind = match value.name.as_str() {
			"naive" => SubmodelKind::Naive(level(&value)?),
			"mean" => SubmodelKind::Mean(level(&value)?),
			"drift" => SubmodelKind::Drift {
				value: level(&value)?,
				slope: value.slope.unwrap_or(0.0),
			},
			name => SubmodelKind::Ets(load_ets(name, &value)?),
		};
		Ok(Submodel {
			name: value.name,
			kind,
			aic: value.aic,
			aicc: value.aicc,
			bic: value.bic,
		})
	}
}

fn load_ets(name: &str, value: &model::EtsModel) -> Result<Ets> {
	let invalid = || Error::invalid_model(format!("unknown submodel \"{}\"", name));
	let components = name.split(',').collect::<Vec<_>>();
	let (trend, seasonality) = match components.as_slice() {
		[_, trend, seasonality] => (*trend, *seasonality),
		_ => return Err(invalid()),
	};
	let trend = match trend {
		"N" => Trend::None,
		"A" => Trend::Additive,
		"Ad" => Trend::AdditiveDamped,
		"M" => Trend::Multiplicative,
		"Md" => Trend::MultiplicativeDamped,
		_ => return Err(invalid()),
	};
	let seasonality = match seasonality {
		"N" => Seasonality::None,
		"A" => Seasonality::Additive,
		"M" => Seasonality::Multiplicative,
		_ => return Err(invalid()),
	};
	let state = value
		.final_state
		.as_ref()
		.ok_or_else(|| Error::invalid_model(format!("submodel \"{}\" has no final state", name)))?;
	if seasonality != Seasonality::None && state.s.is_empty() {
		return Err(Error::invalid_model(format!(
			"seasonal submodel \"{}\" has no seasonal indexes",
			name
		)));
	}
	if let Some(period) = value.period {
		if seasonality != Seasonality::None && period != state.s.len() {
			return Err(Error::invalid_model(format!(
				"submodel \"{}\" has period {} but {} seasonal indexes",
				name,
				period,
				state.s.len()
			)));
		}
	}
	Ok(Ets {
		trend,
		seasonality,
		level: state.l,
		slope: state.b.unwrap_or(0.0),
		phi: value.phi.unwrap_or(1.0),
		seasons: state.s.clone(),
	})
}

impl Ets {
	/// The trend component `h` steps ahead.
	fn trend(&self, h: usize) -> f64 {
		let steps = h.to_f64().unwrap_or(0.0);
		// phi + phi^2 + ... + phi^h
		let damped = (1..=h)
			.scan(1.0, |power, _| {
				*power *= self.phi;
				Some(*power)
			})
			.sum::<f64>();
		match self.trend {
			Trend::None => self.level,
			Trend::Additive => self.level + steps * self.slope,
			Trend::AdditiveDamped => self.level + damped * self.slope,
			Trend::Multiplicative => self.level * self.slope.powf(steps),
			Trend::MultiplicativeDamped => self.level * self.slope.powf(damped),
		}
	}

	/// The seasonal index `h` steps ahead, `s[m - 1 - (h - 1) % m]`.
	fn season(&self, h: usize) -> f64 {
		let m = self.seasons.len();
		if m == 0 {
			return 0.0;
		}
		self.seasons[m - 1 - (h - 1) % m]
	}

	pub fn forecast(&self, horizon: usize) -> Vec<f64> {
		(1..=horizon)
			.map(|h| match self.seasonality {
				Seasonality::None => self.trend(h),
				Seasonality::Additive => self.trend(h) + self.season(h),
				Seasonality::Multiplicative => self.trend(h) * self.season(h),
			})
			.collect()
	}
}

impl Submodel {
	pub fn forecast(&self, horizon: usize) -> Vec<f64> {
		match &self.kind {
			SubmodelKind::Ets(ets) => ets.forecast(horizon),
			SubmodelKind::Naive(value) | SubmodelKind::Mean(value) => vec![*value; horizon],
			SubmodelKind::Drift { value, slope } => (1..=horizon)
				.map(|h| value + slope * h.to_f64().unwrap_or(0.0))
				.collect(),
		}
	}

	fn criterion(&self, criterion: Criterion) -> f64 {
		let value = match criterion {
			Criterion::Aic => self.aic,
			Criterion::Aicc => self.aicc,
			Criterion::Bic => self.bic,
		};
		value.unwrap_or(std::f64::INFINITY)
	}
}

impl TimeSeries {
	/// Forecast one objective field. Without a names filter the submodel minimizing the criterion is used.
	pub fn forecast_field(
		&self,
		id: &str,
		request: &ForecastRequest,
		default_horizon: usize,
		default_criterion: Criterion,
	) -> Result<Vec<Forecast>> {
		let submodels = self.submodels.get(id).ok_or_else(|| {
			Error::invalid_option(format!("field \"{}\" is not forecast by the model", id))
		})?;
		let horizon = request.horizon.unwrap_or(default_horizon);
		if horizon == 0 || horizon > MAX_HORIZON {
			return Err(Error::invalid_option(format!(
				"the forecast horizon must be between 1 and {} but is {}",
				MAX_HORIZON, horizon
			)));
		}
		let filter = request.ets_models.clone().unwrap_or_default();
		let chosen = if filter.names.is_empty() {
			let criterion = filter.criterion.unwrap_or(default_criterion);
			let mut best: Option<&Submodel> = None;
			for submodel in submodels.iter() {
				if best.map_or(true, |best| submodel.criterion(criterion) < best.criterion(criterion)) {
					best = Some(submodel);
				}
			}
			best.into_iter().collect::<Vec<_>>()
		} else {
			submodels
				.iter()
				.filter(|submodel| filter.names.contains(&submodel.name))
				.collect()
		};
		debug!(
			"forecasting field \"{}\" {} steps ahead with {} submodels",
			id,
			horizon,
			chosen.len()
		);
		Ok(chosen
			.into_iter()
			.map(|submodel| Forecast {
				submodel: submodel.name.clone(),
				point_forecast: submodel.forecast(horizon),
			})
			.collect())
	}

	/**
	Forecast the objective fields named in `input`, which maps each field to its [`ForecastRequest`]. An empty input forecasts every objective field with the defaults.
	*/
	pub fn forecast(
		&self,
		input: &serde_json::Map<String, serde_json::Value>,
		by_name: bool,
		default_horizon: usize,
		default_criterion: Criterion,
	) -> Result<BTreeMap<String, Vec<Forecast>>> {
		let mut requests = BTreeMap::new();
		for (key, value) in input.iter() {
			let field = if by_name {
				self.fields.by_name(key)
			} else {
				self.fields.get(key)
			};
			let field = match field {
				Some(field) => field,
				None => {
					debug!("dropping unknown input key \"{}\"", key);
					continue;
				}
			};
			let request = ForecastRequest::deserialize(value)
				.map_err(|error| Error::invalid_option(format!("field \"{}\": {}", key, error)))?;
			requests.insert(field.id.clone(), request);
		}
		if input.is_empty() {
			for id in self.submodels.keys() {
				requests.insert(id.clone(), ForecastRequest::default());
			}
		}
		requests
			.iter()
			.map(|(id, request)| {
				let forecasts = self.forecast_field(id, request, default_horizon, default_criterion)?;
				Ok((id.clone(), forecasts))
			})
			.collect()
	}
}

#[cfg(test)]
fn test_time_series() -> TimeSeries {
	let description = serde_json::json!({
		"objective_fields": ["000001"],
		"time_series": {
			"fields": {
				"000001": { "name": "sales", "optype": "numeric" }
			},
			"ets_models": {
				"000001": [
					{ "name": "naive", "value": 10.0, "aic": 30.0, "aicc": 31.0, "bic": 29.0 },
					{ "name": "drift", "value": 10.0, "slope": 2.0, "aic": 25.0, "aicc": 26.0, "bic": 32.0 },
					{
						"name": "A,A,A",
						"final_state": { "l": 10.0, "b": 1.0, "s": [1.0, 2.0, 3.0, 4.0] },
						"period": 4,
						"aic": 20.0
					},
					{
						"name": "M,Ad,M",
						"final_state": { "l": 10.0, "b": 2.0, "s": [0.5, 1.5] },
						"phi": 0.5,
						"period": 2,
						"aic": 22.0
					}
				]
			}
		}
	});
	TimeSeries::try_from(model::from_value::<model::TimeSeries>(&description).unwrap()).unwrap()
}

#[test]
fn test_ets_forecast() {
	let time_series = test_time_series();
	let submodels = &time_series.submodels["000001"];
	// Additive seasons cycle from s[3] backwards.
	assert_eq!(submodels[2].forecast(5), vec![15.0, 15.0, 15.0, 15.0, 19.0]);
	// Damped additive trend: phi sums 0.5 and 0.75, seasons 1.5 then 0.5.
	let forecast = submodels[3].forecast(2);
	let expected = vec![(10.0 + 0.5 * 2.0) * 1.5, (10.0 + 0.75 * 2.0) * 0.5];
	match &submodels[3].kind {
		SubmodelKind::Ets(ets) => assert_eq!(ets.trend, Trend::AdditiveDamped),
		kind => panic!("unexpected submodel {:?}", kind),
	}
	assert_eq!(forecast, expected);
	assert_eq!(submodels[1].forecast(3), vec![12.0, 14.0, 16.0]);
	assert_eq!(submodels[0].forecast(2), vec![10.0, 10.0]);
}

#[test]
fn test_submodel_selection() {
	let time_series = test_time_series();
	let empty = serde_json::Map::new();
	let forecasts = time_series.forecast(&empty, false, 2, Criterion::Aic).unwrap();
	assert_eq!(forecasts["000001"].len(), 1);
	assert_eq!(forecasts["000001"][0].submodel, "A,A,A");
	let input = serde_json::json!({
		"sales": { "horizon": 1, "ets_models": { "criterion": "bic" } }
	});
	let forecasts = time_series
		.forecast(input.as_object().unwrap(), true, 2, Criterion::Aic)
		.unwrap();
	assert_eq!(forecasts["000001"][0].submodel, "naive");
	let input = serde_json::json!({
		"000001": { "ets_models": { "names": ["drift", "naive"] } }
	});
	let forecasts = time_series
		.forecast(input.as_object().unwrap(), false, 1, Criterion::Aic)
		.unwrap();
	let names = forecasts["000001"]
		.iter()
		.map(|forecast| forecast.submodel.as_str())
		.collect::<Vec<_>>();
	assert_eq!(names, vec!["naive", "drift"]);
	let input = serde_json::json!({ "000001": { "horizon": 0 } });
	assert!(time_series
		.forecast(input.as_object().unwrap(), false, 1, Criterion::Aic)
		.is_err());
	let input = serde_json::json!({ "000001": { "horizon": 4_000_000_000u64 } });
	assert_eq!(
		time_series
			.forecast(input.as_object().unwrap(), false, 1, Criterion::Aic)
			.unwrap_err(),
		Error::invalid_option(format!(
			"the forecast horizon must be between 1 and {} but is 4000000000",
			MAX_HORIZON
		))
	);
	let input = serde_json::json!({});
	assert!(time_series
		.forecast(input.as_object().unwrap(), false, MAX_HORIZON + 1, Criterion::Aic)
		.is_err());
}

#[test]
fn test_invalid_submodel() {
	let value: model::EtsModel = serde_json::from_value(serde_json::json!({
		"name": "A,X,N",
		"final_state": { "l": 1.0 }
	}))
	.unwrap();
	assert_eq!(
		Submodel::try_from(value).unwrap_err(),
		Error::invalid_model("unknown submodel \"A,X,N\"")
	);
}
