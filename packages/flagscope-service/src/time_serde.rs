pub mod option;

use serde::Serializer;
use time::{
	Date, OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description,
};

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	let formatted = value.format(&Rfc3339).map_err(serde::ser::Error::custom)?;

	serializer.serialize_str(&formatted)
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date, read as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(parsed);
	}

	Date::parse(raw, format_description!("[year]-[month]-[day]"))
		.ok()
		.map(|date| date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use crate::time_serde::parse_timestamp;

	#[test]
	fn parses_dates_and_timestamps() {
		assert_eq!(parse_timestamp("2024-06-01"), Some(datetime!(2024-06-01 0:00 UTC)));
		assert_eq!(
			parse_timestamp("2024-06-01T12:30:00+02:00"),
			Some(datetime!(2024-06-01 10:30 UTC))
		);
		assert_eq!(parse_timestamp("June 1st"), None);
	}
}
