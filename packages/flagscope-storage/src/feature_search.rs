use sqlx::{Executor, Postgres, QueryBuilder};

use flagscope_domain::{
	Comparison, Predicate, RankExpr, RankTerm, SearchPlan, SetFilter, SetMatch, StaleCondition,
	TagRef,
};

use crate::{Result, models::FeatureSearchRow};

const RANKED_COLUMNS: &str = "\
WITH ranked_features AS (
	SELECT
		features.name AS feature_name,
		features.description,
		features.type,
		features.project,
		features.created_at,
		features.archived_at,
		features.stale,
		features.potentially_stale,
		features.impression_data,
		features.last_seen_at AS feature_last_seen_at,
		features.created_by_user_id,
		users.name AS user_name,
		users.username AS user_username,
		users.email AS user_email,
		feature_environments.environment,
		feature_environments.enabled AS environment_enabled,
		environments.type AS environment_type,
		environments.sort_order AS environment_sort_order,
		jsonb_array_length(coalesce(feature_environments.variants, '[]'::jsonb)) AS variant_count,
		last_seen_at_metrics.last_seen_at AS environment_last_seen_at,
		feature_tag.tag_type,
		feature_tag.tag_value,
		tag_types.color AS tag_color,
		segments.name AS segment_name,
		lifecycle.stage AS lifecycle_stage,
		lifecycle.status AS lifecycle_status,
		lifecycle.created_at AS lifecycle_entered_at,
		CASE
			WHEN dependency_children.child IS NOT NULL THEN 'child'
			WHEN dependency_parents.parent IS NOT NULL THEN 'parent'
		END AS dependency_type,
";

const RANKED_JOINS: &str = "
	FROM features
	LEFT JOIN feature_environments ON feature_environments.feature_name = features.name
	LEFT JOIN environments ON environments.name = feature_environments.environment
	LEFT JOIN last_seen_at_metrics
		ON last_seen_at_metrics.feature_name = features.name
		AND last_seen_at_metrics.environment = feature_environments.environment
	LEFT JOIN feature_tag ON feature_tag.feature_name = features.name
	LEFT JOIN tag_types ON tag_types.name = feature_tag.tag_type
	LEFT JOIN feature_strategies
		ON feature_strategies.feature_name = features.name
		AND feature_strategies.environment = feature_environments.environment
	LEFT JOIN feature_strategy_segment
		ON feature_strategy_segment.feature_strategy_id = feature_strategies.id
	LEFT JOIN segments ON segments.id = feature_strategy_segment.segment_id
	LEFT JOIN users ON users.id = features.created_by_user_id
	LEFT JOIN (
		SELECT DISTINCT ON (feature) feature, stage, status, created_at
		FROM feature_lifecycles
		ORDER BY feature, created_at DESC, stage
	) AS lifecycle ON lifecycle.feature = features.name
	LEFT JOIN (SELECT DISTINCT child FROM dependent_features) AS dependency_children
		ON dependency_children.child = features.name
	LEFT JOIN (SELECT DISTINCT parent FROM dependent_features) AS dependency_parents
		ON dependency_parents.parent = features.name
";

const PAGE_CTES: &str = "
),
final_ranks AS (
	SELECT
		feature_name,
		ROW_NUMBER() OVER (ORDER BY MIN(sort_rank), feature_name) AS final_rank
	FROM ranked_features
	GROUP BY feature_name
),
total_features AS (
	SELECT count(*) AS total
	FROM final_ranks
),
paged AS (
	SELECT ranked_features.*, final_ranks.final_rank, total_features.total
	FROM ranked_features
	JOIN final_ranks ON final_ranks.feature_name = ranked_features.feature_name
	CROSS JOIN total_features
	WHERE final_ranks.final_rank BETWEEN ";

const PAGE_SELECT: &str = "
)
SELECT
	paged.*,
	metrics.yes,
	metrics.no,
	EXISTS (
		SELECT 1
		FROM feature_strategies AS strategy
		LEFT JOIN milestones AS strategy_milestone ON strategy_milestone.id = strategy.milestone_id
		LEFT JOIN release_plan_definitions AS strategy_plan
			ON strategy_plan.id = strategy_milestone.release_plan_definition_id
		WHERE strategy.feature_name = paged.feature_name
			AND strategy.environment = paged.environment
			AND (strategy.milestone_id IS NULL OR strategy.milestone_id = strategy_plan.active_milestone_id)
	) AS has_strategies,
	EXISTS (
		SELECT 1
		FROM feature_strategies AS strategy
		LEFT JOIN milestones AS strategy_milestone ON strategy_milestone.id = strategy.milestone_id
		LEFT JOIN release_plan_definitions AS strategy_plan
			ON strategy_plan.id = strategy_milestone.release_plan_definition_id
		WHERE strategy.feature_name = paged.feature_name
			AND strategy.environment = paged.environment
			AND (strategy.milestone_id IS NULL OR strategy.milestone_id = strategy_plan.active_milestone_id)
			AND (strategy.disabled IS NULL OR strategy.disabled = false)
	) AS has_enabled_strategies,
	(
		SELECT array_agg(DISTINCT change_requests.id ORDER BY change_requests.id)
		FROM change_requests
		JOIN change_request_events
			ON change_request_events.change_request_id = change_requests.id
		WHERE change_request_events.feature = paged.feature_name
			AND change_requests.environment = paged.environment
			AND change_requests.state NOT IN ('Applied', 'Cancelled', 'Rejected')
	) AS change_request_ids,
	active_milestone.name AS milestone_name,
	active_milestone.sort_order AS milestone_order,
	milestone_totals.total_milestones
FROM paged
LEFT JOIN LATERAL (
	SELECT SUM(client_metrics_env.yes)::bigint AS yes, SUM(client_metrics_env.no)::bigint AS no
	FROM client_metrics_env
	WHERE client_metrics_env.feature_name = paged.feature_name
		AND client_metrics_env.environment = paged.environment
		AND client_metrics_env.timestamp >= now() - make_interval(hours => ";

const PAGE_TAIL: &str = "::integer)
) AS metrics ON TRUE
LEFT JOIN release_plan_definitions AS release_plan
	ON release_plan.feature_name = paged.feature_name
	AND release_plan.environment = paged.environment
	AND release_plan.discriminator = 'plan'
LEFT JOIN milestones AS active_milestone ON active_milestone.id = release_plan.active_milestone_id
LEFT JOIN LATERAL (
	SELECT count(*) AS total_milestones
	FROM milestones
	WHERE milestones.release_plan_definition_id = release_plan.id
) AS milestone_totals ON release_plan.id IS NOT NULL
ORDER BY
	paged.final_rank,
	paged.environment_sort_order,
	paged.environment,
	paged.tag_type,
	paged.tag_value,
	paged.segment_name";

pub fn build_search_query(plan: &SearchPlan) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new(RANKED_COLUMNS);

	push_ranked_features(&mut builder, plan);
	builder.push(PAGE_CTES);
	builder.push_bind(plan.window.first_rank());
	builder.push(" AND ");
	builder.push_bind(plan.window.last_rank());
	builder.push(PAGE_SELECT);
	builder.push_bind(i32::try_from(plan.metrics_window_hours).unwrap_or(i32::MAX));
	builder.push(PAGE_TAIL);

	builder
}

/// Counts the flags matching the plan's predicates, ignoring the page window.
pub fn build_count_query(plan: &SearchPlan) -> QueryBuilder<'static, Postgres> {
	let mut builder = QueryBuilder::new(RANKED_COLUMNS);

	push_ranked_features(&mut builder, plan);
	builder.push("\n)\nSELECT count(DISTINCT feature_name) FROM ranked_features");

	builder
}

pub async fn search_features<'e, E>(executor: E, plan: &SearchPlan) -> Result<Vec<FeatureSearchRow>>
where
	E: Executor<'e, Database = Postgres>,
{
	let mut builder = build_search_query(plan);
	let rows = builder.build_query_as::<FeatureSearchRow>().fetch_all(executor).await?;

	Ok(rows)
}

pub async fn count_features<'e, E>(executor: E, plan: &SearchPlan) -> Result<i64>
where
	E: Executor<'e, Database = Postgres>,
{
	let mut builder = build_count_query(plan);
	let total = builder.build_query_scalar::<i64>().fetch_one(executor).await?;

	Ok(total)
}

fn push_ranked_features(builder: &mut QueryBuilder<'static, Postgres>, plan: &SearchPlan) {
	let has_user = plan.user_id.is_some();

	builder.push(if has_user {
		"\t\tfavorite_features.feature IS NOT NULL AS favorite,\n"
	} else {
		"\t\tFALSE AS favorite,\n"
	});
	builder.push("\t\tDENSE_RANK() OVER (ORDER BY ");

	for (index, term) in plan.rank.terms().iter().enumerate() {
		if index > 0 {
			builder.push(", ");
		}

		push_rank_term(builder, term, has_user);
	}

	builder.push(") AS sort_rank");
	builder.push(RANKED_JOINS);

	if let Some(user_id) = plan.user_id {
		builder.push(
			"\tLEFT JOIN favorite_features\n\t\tON favorite_features.feature = features.name\n\t\tAND favorite_features.user_id = ",
		);
		builder.push_bind(user_id);
		builder.push("\n");
	}

	builder.push("\tWHERE TRUE");

	for predicate in &plan.predicates {
		builder.push("\n\t\tAND ");

		push_predicate(builder, predicate);
	}
}

fn push_rank_term(builder: &mut QueryBuilder<'static, Postgres>, term: &RankTerm, has_user: bool) {
	match &term.expr {
		RankExpr::Favorite if has_user => {
			builder.push("(favorite_features.feature IS NOT NULL)");
		},
		RankExpr::Favorite => {
			builder.push("FALSE");
		},
		RankExpr::Column(column) => {
			builder.push(*column);
		},
		RankExpr::EnvironmentEnabled(environment) => {
			builder.push("CASE WHEN feature_environments.environment = ");
			builder.push_bind(environment.clone());
			builder.push(" THEN feature_environments.enabled END");
		},
		RankExpr::LastSeen => {
			builder.push("coalesce(last_seen_at_metrics.last_seen_at, features.last_seen_at)");
		},
	}

	builder.push(" ");
	builder.push(term.order.as_sql());

	if term.nulls_last {
		builder.push(" NULLS LAST");
	}
}

fn push_predicate(builder: &mut QueryBuilder<'static, Postgres>, predicate: &Predicate) {
	match predicate {
		Predicate::Text { patterns } => {
			builder.push("(features.name ILIKE ANY(");
			builder.push_bind(patterns.clone());
			builder.push("::text[]) OR features.description ILIKE ANY(");
			builder.push_bind(patterns.clone());
			builder.push(
				"::text[]) OR features.name IN (SELECT text_tag.feature_name FROM feature_tag AS text_tag \
				 WHERE text_tag.tag_type || ':' || text_tag.tag_value ILIKE ANY(",
			);
			builder.push_bind(patterns.clone());
			builder.push("::text[])))");
		},
		Predicate::Archived(true) => {
			builder.push("features.archived_at IS NOT NULL");
		},
		Predicate::Archived(false) => {
			builder.push("features.archived_at IS NULL");
		},
		Predicate::Column { column, comparison, values } => {
			let (name, sql_type) = (column.column(), column.sql_type());

			match comparison {
				Comparison::AnyOf | Comparison::NoneOf => {
					if *comparison == Comparison::NoneOf {
						builder.push("NOT ");
					}

					builder.push("(").push(name).push(" = ANY(");
					builder.push_bind(values.clone());
					builder.push("::text[]::").push(sql_type).push("[]))");
				},
				Comparison::Before | Comparison::OnOrAfter => match values.first() {
					Some(value) => {
						let operator = if *comparison == Comparison::Before { " < " } else { " >= " };

						builder.push(name).push(operator);
						builder.push_bind(value.clone());
						builder.push("::text::").push(sql_type);
					},
					None => {
						builder.push("FALSE");
					},
				},
			}
		},
		Predicate::Staleness(condition) => {
			builder.push(stale_condition_sql(*condition));
		},
		Predicate::Tag(filter) => push_tag_filter(builder, filter),
		Predicate::Segment(filter) => push_segment_filter(builder, filter),
		Predicate::EnvironmentStatus(statuses) => {
			let environments: Vec<String> =
				statuses.iter().map(|status| status.environment.clone()).collect();
			let enabled: Vec<bool> = statuses.iter().map(|status| status.enabled).collect();

			builder.push(
				"features.name IN (SELECT status_env.feature_name FROM feature_environments AS status_env WHERE (status_env.environment, status_env.enabled) IN (SELECT * FROM UNNEST(",
			);
			builder.push_bind(environments);
			builder.push("::text[], ");
			builder.push_bind(enabled);
			builder.push("::boolean[])))");
		},
		Predicate::LastSeen { comparison, at } => {
			let operator = match comparison {
				Comparison::Before => " < ",
				Comparison::OnOrAfter => " >= ",
				Comparison::AnyOf | Comparison::NoneOf => {
					builder.push("FALSE");

					return;
				},
			};

			builder.push(
				"features.name IN (SELECT seen.name FROM features AS seen \
				 LEFT JOIN feature_environments AS seen_env ON seen_env.feature_name = seen.name \
				 LEFT JOIN last_seen_at_metrics AS seen_metrics ON seen_metrics.feature_name = seen.name \
				 AND seen_metrics.environment = seen_env.environment \
				 WHERE coalesce(seen_metrics.last_seen_at, seen.last_seen_at)",
			);
			builder.push(operator);
			builder.push_bind(at.clone());
			builder.push("::text::timestamptz)");
		},
		Predicate::Lifecycle { stage } => {
			builder.push("lifecycle.stage = ");
			builder.push_bind(stage.clone());
		},
		Predicate::Never => {
			builder.push("FALSE");
		},
	}
}

fn stale_condition_sql(condition: StaleCondition) -> &'static str {
	match condition {
		StaleCondition::Stale(true) => "features.stale = true",
		StaleCondition::Stale(false) => "features.stale = false",
		StaleCondition::PotentiallyStaleOnly =>
			"(features.stale = false AND features.potentially_stale = true)",
		StaleCondition::NotPotentiallyStaleOnly =>
			"NOT (features.stale = false AND features.potentially_stale = true)",
		StaleCondition::StaleOrPotentiallyStale =>
			"(features.stale = true OR features.potentially_stale = true)",
		StaleCondition::NeitherStaleNorPotentiallyStale =>
			"(features.stale = false AND features.potentially_stale = false)",
	}
}

fn push_tag_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &SetFilter<TagRef>) {
	if filter.values.is_empty() {
		builder.push(if filter.matches(&[]) { "TRUE" } else { "FALSE" });

		return;
	}

	let types: Vec<String> = filter.values.iter().map(|tag| tag.tag_type.clone()).collect();
	let values: Vec<String> = filter.values.iter().map(|tag| tag.value.clone()).collect();

	push_membership_head(builder, filter.matching);
	builder.push(
		"SELECT tagged.feature_name FROM feature_tag AS tagged \
		 WHERE (tagged.tag_type, tagged.tag_value) IN (SELECT * FROM UNNEST(",
	);
	builder.push_bind(types);
	builder.push("::text[], ");
	builder.push_bind(values);
	builder.push("::text[]))");

	if requires_every_value(filter.matching) {
		builder.push(
			" GROUP BY tagged.feature_name \
			 HAVING COUNT(DISTINCT tagged.tag_type || ':' || tagged.tag_value) = ",
		);
		builder.push_bind(cardinality(filter.values.len()));
	}

	builder.push(")");
}

fn push_segment_filter(builder: &mut QueryBuilder<'static, Postgres>, filter: &SetFilter<String>) {
	if filter.values.is_empty() {
		builder.push(if filter.matches(&[]) { "TRUE" } else { "FALSE" });

		return;
	}

	push_membership_head(builder, filter.matching);
	builder.push(
		"SELECT segmented.feature_name FROM feature_strategies AS segmented \
		 JOIN feature_strategy_segment AS segmented_link ON segmented_link.feature_strategy_id = segmented.id \
		 JOIN segments AS segment ON segment.id = segmented_link.segment_id \
		 WHERE segment.name = ANY(",
	);
	builder.push_bind(filter.values.clone());
	builder.push("::text[])");

	if requires_every_value(filter.matching) {
		builder.push(" GROUP BY segmented.feature_name HAVING COUNT(DISTINCT segment.name) = ");
		builder.push_bind(cardinality(filter.values.len()));
	}

	builder.push(")");
}

fn push_membership_head(builder: &mut QueryBuilder<'static, Postgres>, matching: SetMatch) {
	builder.push(match matching {
		SetMatch::AnyOf | SetMatch::AllOf => "features.name IN (",
		SetMatch::NoneOf | SetMatch::NotAllOf => "features.name NOT IN (",
	});
}

fn requires_every_value(matching: SetMatch) -> bool {
	matches!(matching, SetMatch::AllOf | SetMatch::NotAllOf)
}

fn cardinality(len: usize) -> i64 {
	i64::try_from(len).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	use flagscope_domain::{
		EnvironmentStatus, FeatureSearchParams, FilterField, FlagColumn, Operator, QueryParam,
		SearchPlan,
	};

	use crate::feature_search::{build_count_query, build_search_query};

	fn params() -> FeatureSearchParams {
		FeatureSearchParams { limit: 2, sort_by: "name".to_string(), ..Default::default() }
	}

	fn sql_for(params: &FeatureSearchParams, query_params: &[QueryParam]) -> String {
		build_search_query(&SearchPlan::new(params, query_params)).sql().to_string()
	}

	#[test]
	fn rank_order_ends_with_fixed_tie_breaks() {
		let sql = sql_for(&params(), &[]);

		assert!(sql.contains(
			"DENSE_RANK() OVER (ORDER BY features.name ASC, features.created_at ASC, features.name ASC) AS sort_rank"
		));
		assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY MIN(sort_rank), feature_name)"));
		assert!(sql.contains("WHERE final_ranks.final_rank BETWEEN $1 AND $2"));
	}

	#[test]
	fn favorites_join_only_with_user() {
		let anonymous = sql_for(&FeatureSearchParams { favorites_first: true, ..params() }, &[]);
		let signed_in = sql_for(
			&FeatureSearchParams { favorites_first: true, user_id: Some(3), ..params() },
			&[],
		);

		assert!(!anonymous.contains("LEFT JOIN favorite_features"));
		assert!(anonymous.contains("FALSE AS favorite"));
		assert!(signed_in.contains("AND favorite_features.user_id = $1"));
		assert!(signed_in.contains("ORDER BY (favorite_features.feature IS NOT NULL) DESC, features.name ASC"));
	}

	#[test]
	fn environment_sort_binds_name_and_sorts_nulls_last() {
		let sql = sql_for(
			&FeatureSearchParams {
				sort_by: "environment:production".to_string(),
				sort_order: "desc".to_string(),
				..params()
			},
			&[],
		);

		assert!(sql.contains(
			"CASE WHEN feature_environments.environment = $1 THEN feature_environments.enabled END DESC NULLS LAST"
		));
	}

	#[test]
	fn stale_and_potentially_stale_compile_to_disjunction() {
		let query_params =
			[QueryParam::new(FilterField::Stale, Operator::IsAnyOf, ["stale", "potentially-stale"])];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("AND (features.stale = true OR features.potentially_stale = true)"));
	}

	#[test]
	fn include_all_tags_groups_and_counts() {
		let query_params = [QueryParam::new(FilterField::Tag, Operator::IncludeAllOf, [
			"simple:a", "simple:b",
		])];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("features.name IN (SELECT tagged.feature_name FROM feature_tag"));
		assert!(sql.contains("HAVING COUNT(DISTINCT tagged.tag_type || ':' || tagged.tag_value) = $3"));
	}

	#[test]
	fn exclude_all_tags_negates_membership() {
		let query_params =
			[QueryParam::new(FilterField::Tag, Operator::ExcludeAll, ["simple:a", "simple:b"])];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("features.name NOT IN (SELECT tagged.feature_name"));
		assert!(sql.contains("GROUP BY tagged.feature_name"));
	}

	#[test]
	fn segment_exclusion_uses_plain_membership() {
		let query_params =
			[QueryParam::new(FilterField::Segment, Operator::DoNotInclude, ["beta-users"])];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("features.name NOT IN (SELECT segmented.feature_name"));
		assert!(!sql.contains("GROUP BY segmented.feature_name"));
	}

	#[test]
	fn column_filters_cast_bound_text() {
		let query_params = [
			QueryParam::new(FilterField::Column(FlagColumn::Project), Operator::IsNot, ["default"]),
			QueryParam::new(FilterField::Column(FlagColumn::CreatedAt), Operator::IsOnOrAfter, [
				"2024-01-01T00:00:00Z",
			]),
		];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("NOT (features.project = ANY($1::text[]::text[]))"));
		assert!(sql.contains("features.created_at >= $2::text::timestamptz"));
	}

	#[test]
	fn status_and_text_filters_keep_every_environment_row() {
		let params = FeatureSearchParams {
			search_params: vec!["checkout".to_string()],
			status: vec![EnvironmentStatus { environment: "production".to_string(), enabled: true }],
			..params()
		};
		let sql = sql_for(&params, &[]);

		assert!(sql.contains("(features.name ILIKE ANY($1::text[]) OR features.description ILIKE ANY($2::text[])"));
		assert!(sql.contains("text_tag.tag_type || ':' || text_tag.tag_value ILIKE ANY($3::text[])))"));
		assert!(sql.contains("features.name IN (SELECT status_env.feature_name"));
	}

	#[test]
	fn exclusion_of_every_stale_state_matches_nothing() {
		let query_params = [QueryParam::new(FilterField::Stale, Operator::IsNoneOf, [
			"active",
			"stale",
			"potentially-stale",
		])];
		let sql = sql_for(&params(), &query_params);

		assert!(sql.contains("AND FALSE"));
	}

	#[test]
	fn count_query_reuses_predicates_without_page_window() {
		let query_params =
			[QueryParam::new(FilterField::Stale, Operator::IsAnyOf, ["stale", "potentially-stale"])];
		let plan = SearchPlan::new(&FeatureSearchParams { offset: 40, ..params() }, &query_params);
		let sql = build_count_query(&plan).sql().to_string();

		assert!(sql.contains("AND (features.stale = true OR features.potentially_stale = true)"));
		assert!(sql.ends_with("SELECT count(DISTINCT feature_name) FROM ranked_features"));
		assert!(!sql.contains("final_rank"));
		assert!(!sql.contains("client_metrics_env"));
	}

	#[test]
	fn secondary_joins_run_after_paging() {
		let sql = sql_for(&params(), &[]);
		let paged = sql.find("paged AS (").expect("paged CTE");
		let metrics = sql.find("FROM client_metrics_env").expect("metrics join");
		let change_requests = sql.find("FROM change_requests").expect("change request join");

		assert!(metrics > paged);
		assert!(change_requests > paged);
		assert!(sql.contains("NOT IN ('Applied', 'Cancelled', 'Rejected')"));
	}
}
