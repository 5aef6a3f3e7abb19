use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use num_traits::ToPrimitive;

/// The component of a datetime that a generated numeric field holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatetimePart {
	Year,
	Month,
	DayOfMonth,
	/// Monday is 1 and Sunday is 7.
	DayOfWeek,
	Hour,
	Minute,
	Second,
	Millisecond,
}

impl DatetimePart {
	pub fn parse(value: &str) -> Option<DatetimePart> {
		match value {
			"year" => Some(DatetimePart::Year),
			"month" => Some(DatetimePart::Month),
			"day-of-month" => Some(DatetimePart::DayOfMonth),
			"day-of-week" => Some(DatetimePart::DayOfWeek),
			"hour" => Some(DatetimePart::Hour),
			"minute" => Some(DatetimePart::Minute),
			"second" => Some(DatetimePart::Second),
			"millisecond" => Some(DatetimePart::Millisecond),
			_ => None,
		}
	}

	pub fn extract(self, value: &NaiveDateTime) -> f64 {
		let component = match self {
			DatetimePart::Year => value.year().to_f64(),
			DatetimePart::Month => value.month().to_f64(),
			DatetimePart::DayOfMonth => value.day().to_f64(),
			DatetimePart::DayOfWeek => value.weekday().number_from_monday().to_f64(),
			DatetimePart::Hour => value.hour().to_f64(),
			DatetimePart::Minute => value.minute().to_f64(),
			DatetimePart::Second => value.second().to_f64(),
			DatetimePart::Millisecond => (value.nanosecond() / 1_000_000).to_f64(),
		};
		component.unwrap_or(0.0)
	}
}

const DATETIME_FORMATS: &[&str] = &[
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M",
	"%Y-%m-%d %H:%M",
	"%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];

/// Parse the datetime formats accepted in input records. Offsets are discarded after converting to UTC.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
	let value = value.trim();
	if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
		return Some(datetime.naive_utc());
	}
	for format in DATETIME_FORMATS {
		if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
			return Some(datetime);
		}
	}
	for format in DATE_FORMATS {
		if let Ok(date) = NaiveDate::parse_from_str(value, format) {
			return date.and_hms_opt(0, 0, 0);
		}
	}
	None
}

#[test]
fn test_parse_datetime() {
	let datetime = parse_datetime("2016-03-21T14:05:09.250").unwrap();
	assert_eq!(DatetimePart::Year.extract(&datetime), 2016.0);
	assert_eq!(DatetimePart::Month.extract(&datetime), 3.0);
	assert_eq!(DatetimePart::DayOfMonth.extract(&datetime), 21.0);
	assert_eq!(DatetimePart::DayOfWeek.extract(&datetime), 1.0);
	assert_eq!(DatetimePart::Hour.extract(&datetime), 14.0);
	assert_eq!(DatetimePart::Minute.extract(&datetime), 5.0);
	assert_eq!(DatetimePart::Second.extract(&datetime), 9.0);
	assert_eq!(DatetimePart::Millisecond.extract(&datetime), 250.0);
	let date = parse_datetime("2017-07-19").unwrap();
	assert_eq!(DatetimePart::Hour.extract(&date), 0.0);
	assert_eq!(
		parse_datetime("2017-07-19T10:00:00+02:00").map(|d| DatetimePart::Hour.extract(&d)),
		Some(8.0)
	);
	assert!(parse_datetime("yesterday").is_none());
}
