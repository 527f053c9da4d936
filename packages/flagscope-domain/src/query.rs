use std::fmt::{Display, Formatter};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const OPERATOR_VALUE_PATTERN: &str = r"^(?P<op>[A-Z_]+):(?P<values>.+)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
	Is,
	IsNot,
	IsAnyOf,
	IsNoneOf,
	Include,
	DoNotInclude,
	IncludeAllOf,
	IncludeAnyOf,
	ExcludeIfAnyOf,
	ExcludeAll,
	IsBefore,
	IsOnOrAfter,
}
impl Operator {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Is => "IS",
			Self::IsNot => "IS_NOT",
			Self::IsAnyOf => "IS_ANY_OF",
			Self::IsNoneOf => "IS_NONE_OF",
			Self::Include => "INCLUDE",
			Self::DoNotInclude => "DO_NOT_INCLUDE",
			Self::IncludeAllOf => "INCLUDE_ALL_OF",
			Self::IncludeAnyOf => "INCLUDE_ANY_OF",
			Self::ExcludeIfAnyOf => "EXCLUDE_IF_ANY_OF",
			Self::ExcludeAll => "EXCLUDE_ALL",
			Self::IsBefore => "IS_BEFORE",
			Self::IsOnOrAfter => "IS_ON_OR_AFTER",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"IS" => Some(Self::Is),
			"IS_NOT" => Some(Self::IsNot),
			"IS_ANY_OF" => Some(Self::IsAnyOf),
			"IS_NONE_OF" => Some(Self::IsNoneOf),
			"INCLUDE" => Some(Self::Include),
			"DO_NOT_INCLUDE" => Some(Self::DoNotInclude),
			"INCLUDE_ALL_OF" => Some(Self::IncludeAllOf),
			"INCLUDE_ANY_OF" => Some(Self::IncludeAnyOf),
			"EXCLUDE_IF_ANY_OF" => Some(Self::ExcludeIfAnyOf),
			"EXCLUDE_ALL" => Some(Self::ExcludeAll),
			"IS_BEFORE" => Some(Self::IsBefore),
			"IS_ON_OR_AFTER" => Some(Self::IsOnOrAfter),
			_ => None,
		}
	}
}
impl Display for Operator {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagColumn {
	Name,
	Type,
	Project,
	CreatedAt,
	CreatedByUserId,
	ImpressionData,
}
impl FlagColumn {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Name => "name",
			Self::Type => "type",
			Self::Project => "project",
			Self::CreatedAt => "created_at",
			Self::CreatedByUserId => "created_by_user_id",
			Self::ImpressionData => "impression_data",
		}
	}

	pub fn column(self) -> &'static str {
		match self {
			Self::Name => "features.name",
			Self::Type => "features.type",
			Self::Project => "features.project",
			Self::CreatedAt => "features.created_at",
			Self::CreatedByUserId => "features.created_by_user_id",
			Self::ImpressionData => "features.impression_data",
		}
	}

	pub fn sql_type(self) -> &'static str {
		match self {
			Self::Name | Self::Type | Self::Project => "text",
			Self::CreatedAt => "timestamptz",
			Self::CreatedByUserId => "integer",
			Self::ImpressionData => "boolean",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
	Column(FlagColumn),
	Tag,
	Segment,
	Stale,
	LastSeenAt,
}
impl FilterField {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Column(column) => column.as_str(),
			Self::Tag => "tag",
			Self::Segment => "segment",
			Self::Stale => "stale",
			Self::LastSeenAt => "last_seen_at",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"tag" => Some(Self::Tag),
			"segment" => Some(Self::Segment),
			"stale" | "state" => Some(Self::Stale),
			"last_seen_at" | "lastSeenAt" => Some(Self::LastSeenAt),
			"name" => Some(Self::Column(FlagColumn::Name)),
			"type" => Some(Self::Column(FlagColumn::Type)),
			"project" => Some(Self::Column(FlagColumn::Project)),
			"created_at" | "createdAt" => Some(Self::Column(FlagColumn::CreatedAt)),
			"created_by_user_id" | "createdBy" => Some(Self::Column(FlagColumn::CreatedByUserId)),
			"impression_data" | "impressionData" => Some(Self::Column(FlagColumn::ImpressionData)),
			_ => None,
		}
	}
}
impl Serialize for FilterField {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}
impl<'de> Deserialize<'de> for FilterField {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::parse(&raw)
			.ok_or_else(|| serde::de::Error::custom(format!("unknown filter field '{raw}'")))
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParam {
	pub field: FilterField,
	pub operator: Operator,
	pub values: Vec<String>,
}
impl QueryParam {
	pub fn new<I, V>(field: FilterField, operator: Operator, values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<String>,
	{
		Self { field, operator, values: values.into_iter().map(Into::into).collect() }
	}

	pub fn from_operator_value(field: FilterField, raw: &str) -> Option<Self> {
		let (operator, values) = parse_operator_value(raw)?;

		Some(Self { field, operator, values })
	}
}

/// Splits `OPERATOR:value1,value2` into its operator and trimmed, non-empty values.
pub fn parse_operator_value(raw: &str) -> Option<(Operator, Vec<String>)> {
	let pattern = Regex::new(OPERATOR_VALUE_PATTERN).ok()?;
	let captures = pattern.captures(raw.trim())?;
	let operator = Operator::parse(captures.name("op")?.as_str())?;
	let values: Vec<String> = captures
		.name("values")?
		.as_str()
		.split(',')
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_string)
		.collect();

	if values.is_empty() {
		return None;
	}

	Some((operator, values))
}

#[cfg(test)]
mod tests {
	use crate::query::{FilterField, FlagColumn, Operator, QueryParam, parse_operator_value};

	#[test]
	fn parses_operator_and_values() {
		let (operator, values) =
			parse_operator_value("IS_ANY_OF:stale, potentially-stale").expect("valid filter");

		assert_eq!(operator, Operator::IsAnyOf);
		assert_eq!(values, vec!["stale".to_string(), "potentially-stale".to_string()]);
	}

	#[test]
	fn keeps_colons_inside_tag_values() {
		let (operator, values) =
			parse_operator_value("INCLUDE_ALL_OF:simple:a,simple:b").expect("valid filter");

		assert_eq!(operator, Operator::IncludeAllOf);
		assert_eq!(values, vec!["simple:a".to_string(), "simple:b".to_string()]);
	}

	#[test]
	fn rejects_missing_or_unknown_operator() {
		assert!(parse_operator_value("simple:my_tag").is_none());
		assert!(parse_operator_value("CONTAINS:x").is_none());
		assert!(parse_operator_value("IS:").is_none());
		assert!(parse_operator_value("IS: , ").is_none());
	}

	#[test]
	fn filter_fields_accept_camel_case_aliases() {
		assert_eq!(FilterField::parse("lastSeenAt"), Some(FilterField::LastSeenAt));
		assert_eq!(FilterField::parse("state"), Some(FilterField::Stale));
		assert_eq!(
			FilterField::parse("createdBy"),
			Some(FilterField::Column(FlagColumn::CreatedByUserId))
		);
		assert_eq!(FilterField::parse("environment"), None);
	}

	#[test]
	fn query_param_deserializes_from_json() {
		let raw = serde_json::json!({
			"field": "tag",
			"operator": "EXCLUDE_ALL",
			"values": ["simple:a", "simple:b"],
		});
		let param: QueryParam = serde_json::from_value(raw).expect("valid query param");

		assert_eq!(param, QueryParam::new(FilterField::Tag, Operator::ExcludeAll, [
			"simple:a", "simple:b"
		]));
	}

	#[test]
	fn query_param_rejects_unknown_field() {
		let raw = serde_json::json!({ "field": "color", "operator": "IS", "values": ["red"] });

		assert!(serde_json::from_value::<QueryParam>(raw).is_err());
	}
}
