use crate::{parse_datetime, Field, Fields, InputData, Optype, Value};
use localml_util::{Error, Result};
use log::debug;

const NUMERIC_NOISE: &[char] = &['$', '€', '£', '¥', '%', ' '];

/**
Coerce a raw input record to the optypes declared by `fields`.

Keys are field ids, or field names when `by_name` is set. Keys that do not name a field are dropped and `null` values are treated as absent. Generated datetime subfields are filled from their parent datetime value unless the record already provides them.
*/
pub fn normalize(
	raw: &serde_json::Map<String, serde_json::Value>,
	fields: &Fields,
	by_name: bool,
) -> Result<InputData> {
	let mut input = InputData::new();
	for (key, value) in raw.iter() {
		let field = if by_name {
			fields.by_name(key)
		} else {
			fields.get(key)
		};
		let field = match field {
			Some(field) => field,
			None => {
				debug!("dropping unknown input key \"{}\"", key);
				continue;
			}
		};
		if value.is_null() {
			continue;
		}
		input.insert(field.id.clone(), normalize_value(field, value)?);
	}
	expand_datetimes(&mut input, fields);
	Ok(input)
}

fn normalize_value(field: &Field, value: &serde_json::Value) -> Result<Value> {
	let mismatch = || Error::type_mismatch(&field.name, value, field.optype);
	match field.optype {
		Optype::Numeric => match value {
			serde_json::Value::Number(number) => number.as_f64().map(Value::Number).ok_or_else(mismatch),
			serde_json::Value::String(text) => parse_number(field, text)
				.map(Value::Number)
				.ok_or_else(mismatch),
			_ => Err(mismatch()),
		},
		Optype::Categorical | Optype::Text | Optype::Items => match value {
			serde_json::Value::String(text) => Ok(Value::Text(text.clone())),
			serde_json::Value::Number(number) => Ok(Value::Text(number.to_string())),
			serde_json::Value::Bool(flag) => Ok(Value::Text(flag.to_string())),
			_ => Err(mismatch()),
		},
		Optype::Datetime => match value {
			serde_json::Value::String(text) => parse_datetime(text)
				.map(Value::DateTime)
				.ok_or_else(mismatch),
			_ => Err(mismatch()),
		},
	}
}

fn parse_number(field: &Field, text: &str) -> Option<f64> {
	let mut text = text.trim();
	if let Some(prefix) = field.prefix.as_deref() {
		text = text.strip_prefix(prefix).unwrap_or(text);
	}
	if let Some(suffix) = field.suffix.as_deref() {
		text = text.strip_suffix(suffix).unwrap_or(text);
	}
	let cleaned: String = text.chars().filter(|c| !NUMERIC_NOISE.contains(c)).collect();
	strip_thousands_separators(&cleaned)?
		.parse::<f64>()
		.ok()
		.filter(|value| value.is_finite())
}

/// Commas are only accepted between groups of three integer digits, so a decimal comma such as `1,5` is rejected rather than read as `15`.
fn strip_thousands_separators(text: &str) -> Option<String> {
	if !text.contains(',') {
		return Some(text.to_owned());
	}
	let (integer, fraction) = match text.find('.') {
		Some(index) => text.split_at(index),
		None => (text, ""),
	};
	if fraction.contains(',') {
		return None;
	}
	let unsigned = integer.trim_start_matches(|c| c == '-' || c == '+');
	let mut groups = unsigned.split(',');
	let leading = groups.next()?;
	let is_digits = |group: &str| group.chars().all(|c| c.is_ascii_digit());
	if leading.is_empty() || leading.len() > 3 || !is_digits(leading) {
		return None;
	}
	if !groups.all(|group| group.len() == 3 && is_digits(group)) {
		return None;
	}
	Some(text.replace(',', ""))
}

fn expand_datetimes(input: &mut InputData, fields: &Fields) {
	for field in fields.iter() {
		let component = match field.datetime_component.as_ref() {
			Some(component) => component,
			None => continue,
		};
		if input.contains_key(&field.id) {
			continue;
		}
		if let Some(Value::DateTime(datetime)) = input.get(&component.parent_id) {
			let value = component.part.extract(datetime);
			input.insert(field.id.clone(), Value::Number(value));
		}
	}
}

#[cfg(test)]
fn test_fields() -> Fields {
	let mut price = Field::new("000000", "price", Optype::Numeric);
	price.suffix = Some(" USD".to_owned());
	let mut year = Field::new("000002-0", "date.year", Optype::Numeric);
	year.datetime_component = Some(crate::DatetimeComponent {
		parent_id: "000002".to_owned(),
		part: crate::DatetimePart::Year,
	});
	Fields::new(vec![
		price,
		Field::new("000001", "color", Optype::Categorical),
		Field::new("000002", "date", Optype::Datetime),
		year,
	])
}

#[test]
fn test_normalize() {
	let fields = test_fields();
	let raw = serde_json::json!({
		"price": "$1,250.50 USD",
		"color": 3,
		"date": "2019-05-01",
		"weight": 10,
	});
	let input = normalize(raw.as_object().unwrap(), &fields, true).unwrap();
	assert_eq!(input.get("000000"), Some(&Value::Number(1250.5)));
	assert_eq!(input.get("000001"), Some(&Value::Text("3".to_owned())));
	assert_eq!(input.get("000002-0"), Some(&Value::Number(2019.0)));
	assert_eq!(input.len(), 4);
}

#[test]
fn test_normalize_missing_and_nulls() {
	let fields = test_fields();
	let raw = serde_json::json!({ "000000": null, "000001": "red" });
	let input = normalize(raw.as_object().unwrap(), &fields, false).unwrap();
	assert!(!input.contains_key("000000"));
	assert_eq!(input.len(), 1);
	let raw = serde_json::json!({ "price": 3 });
	let input = normalize(raw.as_object().unwrap(), &fields, false).unwrap();
	assert!(input.is_empty());
}

#[test]
fn test_normalize_type_mismatch() {
	let fields = test_fields();
	let raw = serde_json::json!({ "000000": "twelve" });
	let error = normalize(raw.as_object().unwrap(), &fields, false).unwrap_err();
	assert_eq!(
		error.to_string(),
		"mismatched input type in field \"price\" for value \"twelve\": expected numeric"
	);
	let raw = serde_json::json!({ "000000": true });
	assert!(normalize(raw.as_object().unwrap(), &fields, false).is_err());
	let raw = serde_json::json!({ "000000": "1,5" });
	assert!(normalize(raw.as_object().unwrap(), &fields, false).is_err());
}

#[test]
fn test_thousands_separators() {
	assert_eq!(strip_thousands_separators("-12,345,678.25").as_deref(), Some("-12345678.25"));
	assert_eq!(strip_thousands_separators("0.5").as_deref(), Some("0.5"));
	assert_eq!(strip_thousands_separators("1,5"), None);
	assert_eq!(strip_thousands_separators("1234,567"), None);
	assert_eq!(strip_thousands_separators(",123"), None);
	assert_eq!(strip_thousands_separators("1.234,5"), None);
}
