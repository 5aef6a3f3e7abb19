use localml_features::{item_matches, term_matches, Field, Fields, InputData, Optype, TokenMode, Value};
use localml_util::{Error, Result};
use std::cmp::Ordering;

/// A `Predicate` guards a branch of a tree. `True` is the catch-all branch.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
	True,
	Split(Split),
}

/// A `Split` compares the value of one field with a constant, or counts the occurrences of a term in a text or items field and compares the count with the constant.
#[derive(Clone, Debug, PartialEq)]
pub struct Split {
	pub operator: Operator,
	pub field: String,
	pub value: Operand,
	pub term: Option<String>,
	/// If true, the predicate holds when the field is absent from the input.
	pub missing: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	In,
}

impl Operator {
	pub fn parse(operator: &str) -> Result<Operator> {
		match operator {
			"=" | "==" => Ok(Operator::Eq),
			"!=" | "/=" => Ok(Operator::Ne),
			"<" => Ok(Operator::Lt),
			"<=" => Ok(Operator::Le),
			">" => Ok(Operator::Gt),
			">=" => Ok(Operator::Ge),
			"in" => Ok(Operator::In),
			_ => Err(Error::UnsupportedOperator {
				operator: operator.to_owned(),
			}),
		}
	}

	fn holds(self, ordering: Ordering) -> bool {
		match self {
			Operator::Eq | Operator::In => ordering == Ordering::Equal,
			Operator::Ne => ordering != Ordering::Equal,
			Operator::Lt => ordering == Ordering::Less,
			Operator::Le => ordering != Ordering::Greater,
			Operator::Gt => ordering == Ordering::Greater,
			Operator::Ge => ordering != Ordering::Less,
		}
	}
}

impl std::fmt::Display for Operator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let operator = match self {
			Operator::Eq => "=",
			Operator::Ne => "!=",
			Operator::Lt => "<",
			Operator::Le => "<=",
			Operator::Gt => ">",
			Operator::Ge => ">=",
			Operator::In => "in",
		};
		write!(f, "{}", operator)
	}
}

/// The constant a split compares against. `Null` tests whether the field is present.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
	Null,
	Number(f64),
	Text(String),
	Set(Vec<Operand>),
}

impl Operand {
	fn as_number(&self) -> Option<f64> {
		match self {
			Operand::Number(value) => Some(*value),
			_ => None,
		}
	}
}

impl std::fmt::Display for Operand {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Operand::Null => write!(f, "None"),
			Operand::Number(value) => write!(f, "{}", value),
			Operand::Text(value) => write!(f, "{}", value),
			Operand::Set(values) => {
				write!(f, "[")?;
				for (index, value) in values.iter().enumerate() {
					if index > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", value)?;
				}
				write!(f, "]")
			}
		}
	}
}

/// The result of applying a predicate to an input. `Missing` means the field the predicate tests is absent and the predicate does not say what to do about it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluation {
	True,
	False,
	Missing,
}

impl From<bool> for Evaluation {
	fn from(value: bool) -> Evaluation {
		if value {
			Evaluation::True
		} else {
			Evaluation::False
		}
	}
}

impl Predicate {
	pub fn field(&self) -> Option<&str> {
		match self {
			Predicate::True => None,
			Predicate::Split(split) => Some(&split.field),
		}
	}

	pub fn missing(&self) -> bool {
		match self {
			Predicate::True => false,
			Predicate::Split(split) => split.missing,
		}
	}

	pub fn apply(&self, input: &InputData, fields: &Fields) -> Result<Evaluation> {
		match self {
			Predicate::True => Ok(Evaluation::True),
			Predicate::Split(split) => split.apply(input, fields),
		}
	}

	/// Render the predicate as a human readable rule, naming fields by their display name.
	pub fn rule(&self, fields: &Fields) -> String {
		match self {
			Predicate::True => "T".to_owned(),
			Predicate::Split(split) => split.rule(fields),
		}
	}
}

impl Split {
	pub fn apply(&self, input: &InputData, fields: &Fields) -> Result<Evaluation> {
		let value = input.get(&self.field);
		if value.is_none() {
			if self.missing {
				return Ok(Evaluation::True);
			}
			if self.value == Operand::Null {
				return Ok((self.operator == Operator::Eq).into());
			}
			// Absent text behaves like empty text, which follows the branch without the term.
			if self.term.is_none() {
				return Ok(Evaluation::Missing);
			}
		}
		if self.value == Operand::Null {
			return Ok((self.operator == Operator::Ne).into());
		}
		if let Some(term) = self.term.as_deref() {
			return self.apply_term(term, value, fields);
		}
		let value = match value {
			Some(value) => value,
			None => return Ok(Evaluation::Missing),
		};
		if self.operator == Operator::In {
			let members = match &self.value {
				Operand::Set(members) => members.as_slice(),
				operand => std::slice::from_ref(operand),
			};
			for member in members {
				if compare(&self.field, value, member)? == Ordering::Equal {
					return Ok(Evaluation::True);
				}
			}
			return Ok(Evaluation::False);
		}
		let ordering = compare(&self.field, value, &self.value)?;
		Ok(self.operator.holds(ordering).into())
	}

	fn apply_term(&self, term: &str, value: Option<&Value>, fields: &Fields) -> Result<Evaluation> {
		let field = fields
			.get(&self.field)
			.ok_or_else(|| Error::invalid_model(format!("unknown field \"{}\"", self.field)))?;
		let text = match value {
			Some(Value::Text(text)) => text.as_str(),
			Some(value) => return Err(Error::type_mismatch(&field.name, value, field.optype)),
			None => "",
		};
		let count = match field.optype {
			Optype::Items => item_matches(text, term, field),
			_ => term_matches(text, term, field),
		};
		let expected = self.value.as_number().ok_or_else(|| {
			Error::invalid_model(format!(
				"term predicate on field \"{}\" compares with a non numeric value",
				self.field
			))
		})?;
		let ordering = (count as f64).partial_cmp(&expected).unwrap_or(Ordering::Less);
		Ok(self.operator.holds(ordering).into())
	}

	fn is_full_term(&self, field: Option<&Field>) -> bool {
		match field {
			Some(field) => match field.optype {
				Optype::Items => true,
				Optype::Text => field.term_analysis.token_mode == TokenMode::FullTermsOnly,
				_ => false,
			},
			None => false,
		}
	}

	pub fn rule(&self, fields: &Fields) -> String {
		let name = fields.name(&self.field);
		let or_missing = if self.missing { " or missing" } else { "" };
		if let Some(term) = self.term.as_deref() {
			let full_term = self.is_full_term(fields.get(&self.field));
			let count = self.value.as_number().unwrap_or(0.0);
			let absent = (self.operator == Operator::Lt && count <= 1.0)
				|| (self.operator == Operator::Le && count == 0.0);
			if absent {
				let relation = if full_term {
					"is not equal to"
				} else {
					"does not contain"
				};
				return format!("{} {} {}{}", name, relation, term, or_missing);
			}
			if full_term {
				return format!("{} is equal to {}{}", name, term, or_missing);
			}
			let times = if count == 1.0 { "time" } else { "times" };
			let suffix = match self.operator {
				Operator::Gt if count == 0.0 => String::new(),
				Operator::Gt => format!(" more than {} {}", count, times),
				Operator::Ge => format!(" at least {} {}", count, times),
				Operator::Lt => format!(" less than {} {}", count, times),
				Operator::Le => format!(" no more than {} {}", count, times),
				Operator::Eq | Operator::In => format!(" exactly {} {}", count, times),
				Operator::Ne => format!(" other than {} {}", count, times),
			};
			return format!("{} contains {}{}{}", name, term, suffix, or_missing);
		}
		if self.value == Operand::Null {
			let test = if self.operator == Operator::Eq {
				"is None"
			} else {
				"is not None"
			};
			return format!("{} {}", name, test);
		}
		format!("{} {} {}{}", name, self.operator, self.value, or_missing)
	}
}

fn compare(field: &str, value: &Value, operand: &Operand) -> Result<Ordering> {
	match (value, operand) {
		(Value::Number(value), Operand::Number(operand)) => {
			Ok(value.partial_cmp(operand).unwrap_or(Ordering::Less))
		}
		(Value::Text(value), Operand::Text(operand)) => Ok(value.as_str().cmp(operand.as_str())),
		(Value::Text(value), Operand::Number(operand)) => match value.trim().parse::<f64>() {
			Ok(value) => Ok(value.partial_cmp(operand).unwrap_or(Ordering::Less)),
			Err(_) => Err(Error::type_mismatch(field, value, "numeric")),
		},
		(value, operand) => Err(Error::type_mismatch(field, value, operand_kind(operand))),
	}
}

fn operand_kind(operand: &Operand) -> &'static str {
	match operand {
		Operand::Number(_) => "numeric",
		Operand::Text(_) => "categorical",
		Operand::Null | Operand::Set(_) => "scalar",
	}
}

#[cfg(test)]
fn test_fields() -> Fields {
	let mut review = Field::new("000002", "review", Optype::Text);
	review.summary.tag_cloud = vec!["good".to_owned()];
	Fields::new(vec![
		Field::new("000000", "age", Optype::Numeric),
		Field::new("000001", "color", Optype::Categorical),
		review,
	])
}

#[cfg(test)]
fn split(operator: &str, field: &str, value: Operand) -> Split {
	Split {
		operator: Operator::parse(operator).unwrap(),
		field: field.to_owned(),
		value,
		term: None,
		missing: false,
	}
}

#[test]
fn test_apply() {
	let fields = test_fields();
	let input = maplit::btreemap! {
		"000000".to_owned() => Value::Number(30.0),
		"000001".to_owned() => Value::Text("red".to_owned()),
	};
	let age_gt = split(">", "000000", Operand::Number(20.0));
	assert_eq!(age_gt.apply(&input, &fields).unwrap(), Evaluation::True);
	let age_le = split("<=", "000000", Operand::Number(20.0));
	assert_eq!(age_le.apply(&input, &fields).unwrap(), Evaluation::False);
	let color_ne = split("/=", "000001", Operand::Text("red".to_owned()));
	assert_eq!(color_ne.apply(&input, &fields).unwrap(), Evaluation::False);
	let color_in = split(
		"in",
		"000001",
		Operand::Set(vec![
			Operand::Text("blue".to_owned()),
			Operand::Text("red".to_owned()),
		]),
	);
	assert_eq!(color_in.apply(&input, &fields).unwrap(), Evaluation::True);
	let age_is_null = split("=", "000000", Operand::Null);
	assert_eq!(age_is_null.apply(&input, &fields).unwrap(), Evaluation::False);
	let mismatch = split("=", "000000", Operand::Text("old".to_owned()));
	assert!(mismatch.apply(&input, &fields).is_err());
}

#[test]
fn test_apply_missing() {
	let fields = test_fields();
	let input = InputData::new();
	let age_gt = split(">", "000000", Operand::Number(20.0));
	assert_eq!(age_gt.apply(&input, &fields).unwrap(), Evaluation::Missing);
	let age_gt_or_missing = Split {
		missing: true,
		..age_gt
	};
	assert_eq!(
		age_gt_or_missing.apply(&input, &fields).unwrap(),
		Evaluation::True
	);
	let is_null = split("=", "000000", Operand::Null);
	assert_eq!(is_null.apply(&input, &fields).unwrap(), Evaluation::True);
	let is_not_null = split("!=", "000000", Operand::Null);
	assert_eq!(is_not_null.apply(&input, &fields).unwrap(), Evaluation::False);
	let contains = Split {
		term: Some("good".to_owned()),
		..split(">", "000002", Operand::Number(0.0))
	};
	assert_eq!(contains.apply(&input, &fields).unwrap(), Evaluation::False);
}

#[test]
fn test_apply_term() {
	let fields = test_fields();
	let input = maplit::btreemap! {
		"000002".to_owned() => Value::Text("Good food, good service".to_owned()),
	};
	let contains = Split {
		term: Some("good".to_owned()),
		..split(">", "000002", Operand::Number(1.0))
	};
	assert_eq!(contains.apply(&input, &fields).unwrap(), Evaluation::True);
	let absent = Split {
		term: Some("good".to_owned()),
		..split("<=", "000002", Operand::Number(0.0))
	};
	assert_eq!(absent.apply(&input, &fields).unwrap(), Evaluation::False);
}

#[test]
fn test_unsupported_operator() {
	assert_eq!(
		Operator::parse("~=").unwrap_err(),
		Error::UnsupportedOperator {
			operator: "~=".to_owned()
		}
	);
}

#[test]
fn test_rule() {
	let fields = test_fields();
	let rules = vec![
		Predicate::True,
		Predicate::Split(split(">", "000000", Operand::Number(20.5))),
		Predicate::Split(Split {
			missing: true,
			..split("=", "000001", Operand::Text("red".to_owned()))
		}),
		Predicate::Split(split("!=", "000000", Operand::Null)),
		Predicate::Split(Split {
			term: Some("good".to_owned()),
			..split(">", "000002", Operand::Number(0.0))
		}),
		Predicate::Split(Split {
			term: Some("good".to_owned()),
			..split(">", "000002", Operand::Number(2.0))
		}),
		Predicate::Split(Split {
			term: Some("good".to_owned()),
			..split("<=", "000002", Operand::Number(0.0))
		}),
	]
	.into_iter()
	.map(|predicate| predicate.rule(&fields))
	.collect::<Vec<_>>();
	insta::assert_debug_snapshot!(rules, @r###"
 [
     "T",
     "age > 20.5",
     "color = red or missing",
     "age is not None",
     "review contains good",
     "review contains good more than 2 times",
     "review does not contain good",
 ]
 "###);
}
