//! This module contains the main entrypoint to the localml cli.

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use localml_core::{predict, Model, ModelKind, PredictOptions};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[clap(
	about = "Make predictions locally with models trained by a remote machine learning service.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "predict", about = "predict with a decision tree")]
	Predict(PredictArgs),
	#[clap(name = "ensemble", about = "predict with an ensemble of decision trees")]
	Ensemble(PredictArgs),
	#[clap(name = "anomaly", about = "score an input for anomalousness")]
	Anomaly(PredictArgs),
	#[clap(name = "logistic", about = "predict with a logistic regression")]
	Logistic(PredictArgs),
	#[clap(name = "centroid", about = "find the nearest centroid of a cluster model")]
	Centroid(PredictArgs),
	#[clap(name = "topics", about = "infer the topic distribution of a document")]
	Topics(PredictArgs),
	#[clap(name = "forecast", about = "forecast the objective fields of a time series")]
	Forecast(PredictArgs),
}

#[derive(Parser, Debug)]
struct PredictArgs {
	#[clap(short, long, help = "the path to the model description")]
	model: PathBuf,
	#[clap(short, long, help = "the path to the input record")]
	input: PathBuf,
	#[clap(short, long, help = "the path to the options record")]
	options: Option<PathBuf>,
	#[clap(
		long = "member",
		help = "the path to the description of an ensemble member, may be repeated"
	)]
	members: Vec<PathBuf>,
}

fn main() {
	let env = env_logger::Env::default().default_filter_or("localml=info");
	env_logger::Builder::from_env(env)
		.format_level(false)
		.format_module_path(false)
		.format_timestamp(None)
		.init();
	let (kind, args) = match Options::parse() {
		Options::Predict(args) => (ModelKind::Tree, args),
		Options::Ensemble(args) => (ModelKind::Ensemble, args),
		Options::Anomaly(args) => (ModelKind::Anomaly, args),
		Options::Logistic(args) => (ModelKind::LogisticRegression, args),
		Options::Centroid(args) => (ModelKind::Cluster, args),
		Options::Topics(args) => (ModelKind::TopicModel, args),
		Options::Forecast(args) => (ModelKind::TimeSeries, args),
	};
	if let Err(error) = cli_predict(kind, args) {
		eprintln!("{}: {:#}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_predict(kind: ModelKind, args: PredictArgs) -> anyhow::Result<()> {
	let description = read_json(&args.model)?;
	let members = args
		.members
		.iter()
		.map(|path| read_json(path))
		.collect::<anyhow::Result<Vec<_>>>()?;
	let input = read_json(&args.input)?;
	let options = match args.options.as_ref() {
		Some(path) => PredictOptions::from_value(&read_json(path)?)?,
		None => PredictOptions::default(),
	};
	let model = Model::load(kind, &description, members)?;
	log::info!("loaded {:?} model from {}", kind, args.model.display());
	let output = predict(&model, &input, &options)?;
	println!("{}", serde_json::to_string_pretty(&output)?);
	Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
	let file = std::fs::File::open(path)
		.with_context(|| format!("failed to open {}", path.display()))?;
	let value = serde_json::from_reader(std::io::BufReader::new(file))
		.with_context(|| format!("failed to parse {}", path.display()))?;
	Ok(value)
}
