use time::OffsetDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeatureSearchRow {
	pub feature_name: String,
	pub description: Option<String>,
	pub r#type: String,
	pub project: String,
	pub created_at: OffsetDateTime,
	pub archived_at: Option<OffsetDateTime>,
	pub stale: bool,
	pub potentially_stale: bool,
	pub impression_data: bool,
	pub feature_last_seen_at: Option<OffsetDateTime>,
	pub created_by_user_id: Option<i32>,
	pub user_name: Option<String>,
	pub user_username: Option<String>,
	pub user_email: Option<String>,
	pub environment: Option<String>,
	pub environment_enabled: Option<bool>,
	pub environment_type: Option<String>,
	pub environment_sort_order: Option<i32>,
	pub variant_count: Option<i32>,
	pub environment_last_seen_at: Option<OffsetDateTime>,
	pub tag_type: Option<String>,
	pub tag_value: Option<String>,
	pub tag_color: Option<String>,
	pub segment_name: Option<String>,
	pub lifecycle_stage: Option<String>,
	pub lifecycle_status: Option<String>,
	pub lifecycle_entered_at: Option<OffsetDateTime>,
	pub dependency_type: Option<String>,
	pub favorite: bool,
	pub sort_rank: i64,
	pub final_rank: i64,
	pub total: i64,
	pub yes: Option<i64>,
	pub no: Option<i64>,
	pub has_strategies: Option<bool>,
	pub has_enabled_strategies: Option<bool>,
	pub change_request_ids: Option<Vec<i64>>,
	pub milestone_name: Option<String>,
	pub milestone_order: Option<i32>,
	pub total_milestones: Option<i64>,
}
