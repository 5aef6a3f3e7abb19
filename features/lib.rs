/*!
This crate describes the fields of a model and turns raw input records into values of the types those fields declare.
*/

#![allow(clippy::tabs_in_doc_comments)]

mod datetime;
mod normalize;
mod text;

pub use self::datetime::{parse_datetime, DatetimePart};
pub use self::normalize::normalize;
pub use self::text::{item_matches, term_matches};

use fnv::FnvHashMap;
use std::collections::BTreeMap;

/// A normalized input record, keyed by field id. Fields absent from the raw input are absent here too.
pub type InputData = BTreeMap<String, Value>;

/// A single input value after it has been coerced to its field's optype.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Number(f64),
	/// Categorical, text, and items values.
	Text(String),
	DateTime(chrono::NaiveDateTime),
}

impl Value {
	pub fn as_number(&self) -> Option<f64> {
		match self {
			Value::Number(value) => Some(*value),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Value::Text(value) => Some(value),
			_ => None,
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Number(value) => write!(f, "{}", value),
			Value::Text(value) => write!(f, "{}", value),
			Value::DateTime(value) => write!(f, "{}", value),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Optype {
	Numeric,
	Categorical,
	Text,
	Items,
	Datetime,
}

impl Optype {
	pub fn parse(value: &str) -> Option<Optype> {
		match value {
			"numeric" => Some(Optype::Numeric),
			"categorical" => Some(Optype::Categorical),
			"text" => Some(Optype::Text),
			"items" => Some(Optype::Items),
			"datetime" => Some(Optype::Datetime),
			_ => None,
		}
	}
}

impl std::fmt::Display for Optype {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Optype::Numeric => "numeric",
			Optype::Categorical => "categorical",
			Optype::Text => "text",
			Optype::Items => "items",
			Optype::Datetime => "datetime",
		};
		write!(f, "{}", name)
	}
}

/// How text is split into terms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenMode {
	/// Terms are single tokens or the whole text.
	All,
	TokensOnly,
	/// The whole text is the only term.
	FullTermsOnly,
}

impl TokenMode {
	pub fn parse(value: &str) -> Option<TokenMode> {
		match value {
			"all" => Some(TokenMode::All),
			"tokens_only" => Some(TokenMode::TokensOnly),
			"full_terms_only" => Some(TokenMode::FullTermsOnly),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct TermAnalysis {
	pub case_sensitive: bool,
	pub token_mode: TokenMode,
}

impl Default for TermAnalysis {
	fn default() -> TermAnalysis {
		TermAnalysis {
			case_sensitive: false,
			token_mode: TokenMode::All,
		}
	}
}

/// The training-time summary of a field. Only the parts used for prediction are kept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldSummary {
	pub categories: Vec<(String, u64)>,
	pub tag_cloud: Vec<String>,
	pub items: Vec<String>,
	/// Maps a term to the other forms of the same term.
	pub term_forms: BTreeMap<String, Vec<String>>,
	pub mean: Option<f64>,
	pub median: Option<f64>,
	pub minimum: Option<f64>,
	pub maximum: Option<f64>,
	pub standard_deviation: Option<f64>,
}

/// A numeric field generated from one component of a datetime field.
#[derive(Clone, Debug, PartialEq)]
pub struct DatetimeComponent {
	pub parent_id: String,
	pub part: DatetimePart,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
	pub id: String,
	pub name: String,
	pub optype: Optype,
	pub prefix: Option<String>,
	pub suffix: Option<String>,
	pub summary: FieldSummary,
	pub term_analysis: TermAnalysis,
	pub item_separator: String,
	pub datetime_component: Option<DatetimeComponent>,
}

impl Field {
	pub fn new(id: impl Into<String>, name: impl Into<String>, optype: Optype) -> Field {
		Field {
			id: id.into(),
			name: name.into(),
			optype,
			prefix: None,
			suffix: None,
			summary: FieldSummary::default(),
			term_analysis: TermAnalysis::default(),
			item_separator: ",".to_owned(),
			datetime_component: None,
		}
	}

	/// The term followed by its other forms.
	pub fn term_forms<'a>(&'a self, term: &'a str) -> Vec<&'a str> {
		let mut forms = vec![term];
		if let Some(other_forms) = self.summary.term_forms.get(term) {
			forms.extend(other_forms.iter().map(|form| form.as_str()));
		}
		forms
	}

	/// The category names declared in the field summary, in declaration order.
	pub fn category_names(&self) -> Vec<&str> {
		self.summary
			.categories
			.iter()
			.map(|(name, _)| name.as_str())
			.collect()
	}
}

/// The set of fields of a model, addressable by id and by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields {
	fields: BTreeMap<String, Field>,
	ids_by_name: FnvHashMap<String, String>,
}

impl Fields {
	pub fn new(fields: Vec<Field>) -> Fields {
		let ids_by_name = fields
			.iter()
			.map(|field| (field.name.clone(), field.id.clone()))
			.collect();
		let fields = fields
			.into_iter()
			.map(|field| (field.id.clone(), field))
			.collect();
		Fields {
			fields,
			ids_by_name,
		}
	}

	pub fn get(&self, id: &str) -> Option<&Field> {
		self.fields.get(id)
	}

	pub fn by_name(&self, name: &str) -> Option<&Field> {
		self.ids_by_name
			.get(name)
			.and_then(|id| self.fields.get(id))
	}

	pub fn contains(&self, id: &str) -> bool {
		self.fields.contains_key(id)
	}

	/// The display name of the field, falling back to its id.
	pub fn name<'a>(&'a self, id: &'a str) -> &'a str {
		self.fields
			.get(id)
			.map(|field| field.name.as_str())
			.unwrap_or(id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Field> {
		self.fields.values()
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

#[test]
fn test_fields_lookup() {
	let fields = Fields::new(vec![
		Field::new("000000", "sepal length", Optype::Numeric),
		Field::new("000004", "species", Optype::Categorical),
	]);
	assert_eq!(fields.len(), 2);
	assert_eq!(
		fields.by_name("species").map(|f| f.id.as_str()),
		Some("000004")
	);
	assert_eq!(fields.name("000000"), "sepal length");
	assert_eq!(fields.name("00000f"), "00000f");
	assert!(fields.get("species").is_none());
}
