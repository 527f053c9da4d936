use crate::query::{FilterField, FlagColumn, Operator, QueryParam};

const STALE_ACTIVE: &str = "active";
const STALE_STALE: &str = "stale";
const STALE_POTENTIALLY: &str = "potentially-stale";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
	Text { patterns: Vec<String> },
	Archived(bool),
	Column { column: FlagColumn, comparison: Comparison, values: Vec<String> },
	Staleness(StaleCondition),
	Tag(SetFilter<TagRef>),
	Segment(SetFilter<String>),
	EnvironmentStatus(Vec<EnvironmentStatus>),
	/// Compares `coalesce(environment last seen, flag last seen)`; any environment may match.
	LastSeen { comparison: Comparison, at: String },
	Lifecycle { stage: String },
	Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
	AnyOf,
	NoneOf,
	Before,
	OnOrAfter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMatch {
	AnyOf,
	NoneOf,
	AllOf,
	NotAllOf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetFilter<T> {
	pub matching: SetMatch,
	pub values: Vec<T>,
}
impl<T> SetFilter<T>
where
	T: PartialEq,
{
	fn new(matching: SetMatch, values: Vec<T>) -> Self {
		let mut unique = Vec::with_capacity(values.len());

		for value in values {
			if !unique.contains(&value) {
				unique.push(value);
			}
		}

		Self { matching, values: unique }
	}

	pub fn matches(&self, attached: &[T]) -> bool {
		let hits = self.values.iter().filter(|value| attached.contains(value)).count();

		match self.matching {
			SetMatch::AnyOf => hits > 0,
			SetMatch::NoneOf => hits == 0,
			SetMatch::AllOf => hits == self.values.len(),
			SetMatch::NotAllOf => hits != self.values.len(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
	pub tag_type: String,
	pub value: String,
}
impl TagRef {
	pub fn parse(raw: &str) -> Option<Self> {
		let (tag_type, value) = raw.split_once(':')?;
		let (tag_type, value) = (tag_type.trim(), value.trim());

		if tag_type.is_empty() || value.is_empty() {
			return None;
		}

		Some(Self { tag_type: tag_type.to_string(), value: value.to_string() })
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentStatus {
	pub environment: String,
	pub enabled: bool,
}
impl EnvironmentStatus {
	pub fn parse(raw: &str) -> Option<Self> {
		let (environment, state) = raw.rsplit_once(':')?;
		let environment = environment.trim();
		let enabled = match state.trim() {
			"enabled" => true,
			"disabled" => false,
			_ => return None,
		};

		if environment.is_empty() {
			return None;
		}

		Some(Self { environment: environment.to_string(), enabled })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleCondition {
	Stale(bool),
	PotentiallyStaleOnly,
	NotPotentiallyStaleOnly,
	StaleOrPotentiallyStale,
	NeitherStaleNorPotentiallyStale,
}
impl StaleCondition {
	pub fn matches(self, stale: bool, potentially_stale: bool) -> bool {
		match self {
			Self::Stale(expected) => stale == expected,
			Self::PotentiallyStaleOnly => !stale && potentially_stale,
			Self::NotPotentiallyStaleOnly => stale || !potentially_stale,
			Self::StaleOrPotentiallyStale => stale || potentially_stale,
			Self::NeitherStaleNorPotentiallyStale => !stale && !potentially_stale,
		}
	}
}

pub fn lower_query_params(query_params: &[QueryParam]) -> Vec<Predicate> {
	query_params.iter().filter_map(lower_query_param).collect()
}

fn lower_query_param(param: &QueryParam) -> Option<Predicate> {
	match param.field {
		FilterField::Column(column) => lower_column(column, param.operator, &param.values),
		FilterField::Tag => {
			let matching = set_match(param.operator)?;
			let tags = param.values.iter().filter_map(|raw| TagRef::parse(raw)).collect();

			Some(Predicate::Tag(SetFilter::new(matching, tags)))
		},
		FilterField::Segment => {
			let matching = set_match(param.operator)?;
			let segments = param
				.values
				.iter()
				.map(|raw| raw.trim())
				.filter(|name| !name.is_empty())
				.map(str::to_string)
				.collect();

			Some(Predicate::Segment(SetFilter::new(matching, segments)))
		},
		FilterField::Stale => stale_predicate(param.operator, &param.values),
		FilterField::LastSeenAt => {
			let comparison = range_comparison(param.operator)?;
			let at = param.values.first()?.trim().to_string();

			Some(Predicate::LastSeen { comparison, at })
		},
	}
}

fn lower_column(column: FlagColumn, operator: Operator, values: &[String]) -> Option<Predicate> {
	let comparison = match operator {
		Operator::Is | Operator::IsAnyOf => Comparison::AnyOf,
		Operator::IsNot | Operator::IsNoneOf => Comparison::NoneOf,
		Operator::IsBefore | Operator::IsOnOrAfter => {
			let comparison = range_comparison(operator)?;
			let first = values.first()?.clone();

			return Some(Predicate::Column { column, comparison, values: vec![first] });
		},
		_ => return None,
	};

	Some(Predicate::Column { column, comparison, values: values.to_vec() })
}

fn range_comparison(operator: Operator) -> Option<Comparison> {
	match operator {
		Operator::IsBefore => Some(Comparison::Before),
		Operator::IsOnOrAfter => Some(Comparison::OnOrAfter),
		_ => None,
	}
}

fn set_match(operator: Operator) -> Option<SetMatch> {
	match operator {
		Operator::Include | Operator::IncludeAnyOf => Some(SetMatch::AnyOf),
		Operator::DoNotInclude | Operator::ExcludeIfAnyOf => Some(SetMatch::NoneOf),
		Operator::IncludeAllOf => Some(SetMatch::AllOf),
		Operator::ExcludeAll => Some(SetMatch::NotAllOf),
		_ => None,
	}
}

// Selecting all three states is a no-op for inclusion and matches nothing for exclusion.
pub fn stale_predicate(operator: Operator, values: &[String]) -> Option<Predicate> {
	let exclude = match operator {
		Operator::Is | Operator::IsAnyOf => false,
		Operator::IsNot | Operator::IsNoneOf => true,
		_ => return None,
	};
	let selected = |state: &str| values.iter().any(|value| value.trim() == state);
	let active = selected(STALE_ACTIVE);
	let stale = selected(STALE_STALE);
	let potentially = selected(STALE_POTENTIALLY);
	let condition = match (active, stale, potentially) {
		(false, false, false) => return None,
		(true, true, _) => return if exclude { Some(Predicate::Never) } else { None },
		(false, false, true) if exclude => StaleCondition::NotPotentiallyStaleOnly,
		(false, false, true) => StaleCondition::PotentiallyStaleOnly,
		(false, true, true) if exclude => StaleCondition::NeitherStaleNorPotentiallyStale,
		(false, true, true) => StaleCondition::StaleOrPotentiallyStale,
		// `active` alone, or `active` with `potentially-stale`.
		(true, false, _) => StaleCondition::Stale(exclude),
		(false, true, false) => StaleCondition::Stale(!exclude),
	};

	Some(Predicate::Staleness(condition))
}
