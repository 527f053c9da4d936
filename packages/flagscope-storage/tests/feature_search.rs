use std::collections::BTreeSet;

use sqlx::PgPool;

use flagscope_config::Postgres;
use flagscope_domain::{FeatureSearchParams, FilterField, Operator, QueryParam, SearchPlan};
use flagscope_storage::{db::Db, feature_search, models::FeatureSearchRow};
use flagscope_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

async fn execute(pool: &PgPool, sql: &str) {
	sqlx::query(sql).execute(pool).await.expect("Failed to seed fixture.");
}

async fn seed_stale_flags(pool: &PgPool) {
	execute(
		pool,
		"INSERT INTO environments (name, type, sort_order) VALUES ('production', 'production', 2), ('development', 'development', 1)",
	)
	.await;
	execute(
		pool,
		"INSERT INTO features (name, stale, potentially_stale, created_at) VALUES \
		 ('f1', true, false, '2024-01-01T00:00:00Z'), \
		 ('f2', false, true, '2024-01-02T00:00:00Z'), \
		 ('f3', false, false, '2024-01-03T00:00:00Z')",
	)
	.await;
	execute(
		pool,
		"INSERT INTO feature_environments (environment, feature_name, enabled) \
		 SELECT environments.name, features.name, environments.name = 'production' \
		 FROM environments CROSS JOIN features",
	)
	.await;
}

fn params(limit: u32, offset: u32) -> FeatureSearchParams {
	FeatureSearchParams { limit, offset, sort_by: "name".to_string(), ..Default::default() }
}

fn flag_names(rows: &[FeatureSearchRow]) -> Vec<String> {
	let mut names: Vec<String> = Vec::new();

	for row in rows {
		if names.last() != Some(&row.feature_name) {
			names.push(row.feature_name.clone());
		}
	}

	names
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FLAGSCOPE_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = flagscope_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set FLAGSCOPE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	db.ensure_schema().await.expect("Second bootstrap should be a no-op.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'feature_strategy_segment'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FLAGSCOPE_PG_DSN to run."]
async fn stale_filter_pages_whole_flags() {
	let Some(base_dsn) = flagscope_testkit::env_dsn() else {
		eprintln!("Skipping stale_filter_pages_whole_flags; set FLAGSCOPE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	seed_stale_flags(&db.pool).await;

	let query_params =
		[QueryParam::new(FilterField::Stale, Operator::IsAnyOf, ["stale", "potentially-stale"])];
	let plan = SearchPlan::new(&params(2, 0), &query_params);
	let rows = feature_search::search_features(&db.pool, &plan).await.expect("Search failed.");

	assert_eq!(flag_names(&rows), vec!["f1".to_string(), "f2".to_string()]);
	assert_eq!(rows.len(), 4, "Each flag carries both environment rows.");
	assert!(rows.iter().all(|row| row.total == 2));
	assert!(rows.iter().all(|row| row.yes.is_none() && row.has_strategies == Some(false)));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FLAGSCOPE_PG_DSN to run."]
async fn consecutive_pages_cover_every_flag_once() {
	let Some(base_dsn) = flagscope_testkit::env_dsn() else {
		eprintln!("Skipping consecutive_pages_cover_every_flag_once; set FLAGSCOPE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	seed_stale_flags(&db.pool).await;
	execute(&db.pool, "INSERT INTO tag_types (name) VALUES ('simple')").await;
	execute(
		&db.pool,
		"INSERT INTO feature_tag (feature_name, tag_type, tag_value) VALUES \
		 ('f1', 'simple', 'a'), ('f1', 'simple', 'b'), ('f3', 'simple', 'a')",
	)
	.await;

	let mut seen = Vec::new();
	let mut totals = BTreeSet::new();

	for offset in [0, 1, 2, 3] {
		let plan = SearchPlan::new(&params(1, offset), &[]);
		let rows = feature_search::search_features(&db.pool, &plan).await.expect("Search failed.");

		totals.extend(rows.iter().map(|row| row.total));
		seen.extend(flag_names(&rows));
	}

	assert_eq!(seen, vec!["f1".to_string(), "f2".to_string(), "f3".to_string()]);
	assert_eq!(totals.into_iter().collect::<Vec<_>>(), vec![3]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set FLAGSCOPE_PG_DSN to run."]
async fn no_matches_returns_no_rows() {
	let Some(base_dsn) = flagscope_testkit::env_dsn() else {
		eprintln!("Skipping no_matches_returns_no_rows; set FLAGSCOPE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	seed_stale_flags(&db.pool).await;

	let params = FeatureSearchParams { archived: true, ..params(10, 0) };
	let plan = SearchPlan::new(&params, &[]);
	let rows = feature_search::search_features(&db.pool, &plan).await.expect("Search failed.");

	assert!(rows.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
