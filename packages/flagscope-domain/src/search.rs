use crate::{
	filter::{self, EnvironmentStatus, Predicate},
	query::QueryParam,
	ranking::{PageWindow, RankSpec},
};

const DEFAULT_METRICS_WINDOW_HOURS: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSearchParams {
	pub user_id: Option<i32>,
	pub search_params: Vec<String>,
	pub status: Vec<EnvironmentStatus>,
	pub lifecycle: Option<String>,
	pub archived: bool,
	pub offset: u32,
	pub limit: u32,
	pub sort_by: String,
	pub sort_order: String,
	pub favorites_first: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPlan {
	pub predicates: Vec<Predicate>,
	pub rank: RankSpec,
	pub window: PageWindow,
	pub user_id: Option<i32>,
	pub metrics_window_hours: u32,
}
impl SearchPlan {
	pub fn new(params: &FeatureSearchParams, query_params: &[QueryParam]) -> Self {
		let mut predicates = vec![Predicate::Archived(params.archived)];
		let patterns: Vec<String> = params
			.search_params
			.iter()
			.map(|fragment| fragment.trim())
			.filter(|fragment| !fragment.is_empty())
			.map(|fragment| format!("%{}%", escape_like(fragment)))
			.collect();

		if !patterns.is_empty() {
			predicates.push(Predicate::Text { patterns });
		}
		if !params.status.is_empty() {
			predicates.push(Predicate::EnvironmentStatus(params.status.clone()));
		}
		if let Some(stage) = params.lifecycle.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
			predicates.push(Predicate::Lifecycle { stage: stage.to_string() });
		}

		predicates.extend(filter::lower_query_params(query_params));

		// Favorites are per user; without one there is nothing to rank by.
		let favorites_first = params.favorites_first && params.user_id.is_some();

		Self {
			predicates,
			rank: RankSpec::new(&params.sort_by, &params.sort_order, favorites_first),
			window: PageWindow::new(params.offset, params.limit),
			user_id: params.user_id,
			metrics_window_hours: DEFAULT_METRICS_WINDOW_HOURS,
		}
	}

	pub fn with_metrics_window(mut self, hours: u32) -> Self {
		self.metrics_window_hours = hours.max(1);

		self
	}

	pub fn matches_nothing(&self) -> bool {
		self.predicates.iter().any(|predicate| matches!(predicate, Predicate::Never))
	}
}

fn escape_like(fragment: &str) -> String {
	let mut escaped = String::with_capacity(fragment.len());

	for ch in fragment.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped
}

#[cfg(test)]
mod tests {
	use crate::{
		filter::{EnvironmentStatus, Predicate, StaleCondition},
		query::{FilterField, Operator, QueryParam},
		ranking::{SortKey, SortOrder},
		search::{FeatureSearchParams, SearchPlan},
	};

	fn params() -> FeatureSearchParams {
		FeatureSearchParams { limit: 50, ..Default::default() }
	}

	#[test]
	fn archived_predicate_is_always_present() {
		let plan = SearchPlan::new(&params(), &[]);

		assert_eq!(plan.predicates, vec![Predicate::Archived(false)]);
		assert_eq!(plan.rank.key, SortKey::CreatedAt);
		assert_eq!(plan.rank.order, SortOrder::Asc);
	}

	#[test]
	fn text_fragments_become_escaped_patterns() {
		let params = FeatureSearchParams {
			search_params: vec!["checkout".to_string(), "  ".to_string(), "50%_off".to_string()],
			..params()
		};
		let plan = SearchPlan::new(&params, &[]);

		assert!(plan.predicates.contains(&Predicate::Text {
			patterns: vec!["%checkout%".to_string(), "%50\\%\\_off%".to_string()],
		}));
	}

	#[test]
	fn status_lifecycle_and_query_params_are_combined() {
		let params = FeatureSearchParams {
			status: vec![EnvironmentStatus { environment: "production".to_string(), enabled: true }],
			lifecycle: Some("live".to_string()),
			..params()
		};
		let query_params = [QueryParam::new(FilterField::Stale, Operator::IsAnyOf, ["stale"])];
		let plan = SearchPlan::new(&params, &query_params);

		assert_eq!(plan.predicates, vec![
			Predicate::Archived(false),
			Predicate::EnvironmentStatus(vec![EnvironmentStatus {
				environment: "production".to_string(),
				enabled: true,
			}]),
			Predicate::Lifecycle { stage: "live".to_string() },
			Predicate::Staleness(StaleCondition::Stale(true)),
		]);
	}

	#[test]
	fn favorites_first_requires_user() {
		let anonymous = FeatureSearchParams { favorites_first: true, ..params() };
		let signed_in = FeatureSearchParams { user_id: Some(7), ..anonymous.clone() };

		assert!(!SearchPlan::new(&anonymous, &[]).rank.favorites_first);
		assert!(SearchPlan::new(&signed_in, &[]).rank.favorites_first);
	}

	#[test]
	fn exclusion_of_every_stale_state_matches_nothing() {
		let query_params = [QueryParam::new(FilterField::Stale, Operator::IsNoneOf, [
			"active",
			"stale",
			"potentially-stale",
		])];
		let plan = SearchPlan::new(&params(), &query_params);

		assert!(plan.matches_nothing());
	}

	#[test]
	fn metrics_window_is_configurable() {
		let plan = SearchPlan::new(&params(), &[]).with_metrics_window(6);

		assert_eq!(plan.metrics_window_hours, 6);
		assert_eq!(plan.window.first_rank(), 1);
		assert_eq!(plan.window.last_rank(), 50);
	}
}
