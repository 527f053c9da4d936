use std::collections::HashMap;

use serde::Serialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use flagscope_storage::models::FeatureSearchRow;

const UNKNOWN_CREATOR: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOverview {
	pub name: String,
	pub description: Option<String>,
	#[serde(rename = "type")]
	pub feature_type: String,
	pub project: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub archived_at: Option<OffsetDateTime>,
	pub stale: bool,
	pub potentially_stale: bool,
	pub impression_data: bool,
	pub favorite: bool,
	#[serde(with = "crate::time_serde::option")]
	pub last_seen_at: Option<OffsetDateTime>,
	pub dependency_type: Option<String>,
	pub lifecycle: Option<Lifecycle>,
	pub created_by: Option<Creator>,
	pub environments: Vec<EnvironmentOverview>,
	pub segments: Vec<String>,
	pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOverview {
	pub name: String,
	pub enabled: bool,
	#[serde(rename = "type")]
	pub environment_type: Option<String>,
	pub sort_order: i32,
	pub variant_count: i32,
	#[serde(with = "crate::time_serde::option")]
	pub last_seen_at: Option<OffsetDateTime>,
	pub has_strategies: bool,
	pub has_enabled_strategies: bool,
	pub yes: i64,
	pub no: i64,
	pub change_request_ids: Vec<i64>,
	pub milestone_name: Option<String>,
	pub milestone_order: Option<i32>,
	pub total_milestones: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
	#[serde(rename = "type")]
	pub tag_type: String,
	pub value: String,
	pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
	pub stage: String,
	pub status: Option<String>,
	#[serde(with = "crate::time_serde::option")]
	pub entered_stage_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
	pub id: i32,
	pub name: String,
	pub image_url: String,
}
impl Creator {
	fn from_row(row: &FeatureSearchRow) -> Option<Self> {
		let id = row.created_by_user_id?;
		let name = first_present([&row.user_name, &row.user_username, &row.user_email])
			.unwrap_or(UNKNOWN_CREATOR)
			.to_string();
		let avatar_key = first_present([&row.user_email, &row.user_username])
			.map(|key| key.to_lowercase())
			.unwrap_or_else(|| id.to_string());

		Some(Self { id, name, image_url: avatar_url(&avatar_key) })
	}
}

#[derive(Debug, Default)]
pub struct RowAggregator {
	entries: Vec<FeatureOverview>,
	positions: HashMap<String, usize>,
}
impl RowAggregator {
	pub fn push(&mut self, row: FeatureSearchRow) {
		let position = match self.positions.get(&row.feature_name).copied() {
			Some(position) => position,
			None => {
				self.entries.push(new_entry(&row));
				self.positions.insert(row.feature_name.clone(), self.entries.len() - 1);

				self.entries.len() - 1
			},
		};
		let entry = &mut self.entries[position];
		let environment_name = row.environment.clone().unwrap_or_default();

		if !entry.environments.iter().any(|environment| environment.name == environment_name) {
			entry.environments.push(environment_from_row(environment_name, &row));
		}
		if let Some(segment) = row.segment_name.as_ref()
			&& !entry.segments.contains(segment)
		{
			entry.segments.push(segment.clone());
		}
		if let (Some(tag_type), Some(value)) = (row.tag_type.as_ref(), row.tag_value.as_ref())
			&& !entry.tags.iter().any(|tag| &tag.tag_type == tag_type && &tag.value == value)
		{
			entry.tags.push(Tag {
				tag_type: tag_type.clone(),
				value: value.clone(),
				color: row.tag_color.clone(),
			});
		}

		entry.last_seen_at = entry.last_seen_at.max(row.environment_last_seen_at);
	}

	pub fn finish(self) -> Vec<FeatureOverview> {
		let mut entries = self.entries;

		for entry in &mut entries {
			entry.environments.retain(|environment| !environment.name.is_empty());
			entry.environments.sort_by(|a, b| {
				a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name))
			});
		}

		entries
	}
}

pub fn aggregate_rows<I>(rows: I) -> Vec<FeatureOverview>
where
	I: IntoIterator<Item = FeatureSearchRow>,
{
	let mut aggregator = RowAggregator::default();

	for row in rows {
		aggregator.push(row);
	}

	aggregator.finish()
}

/// Gravatar URL keyed by the SHA-256 of the trimmed identity.
pub fn avatar_url(identity: &str) -> String {
	let digest = Sha256::digest(identity.trim().as_bytes());

	format!("https://gravatar.com/avatar/{digest:x}?s=42&d=retro&r=g")
}

fn new_entry(row: &FeatureSearchRow) -> FeatureOverview {
	FeatureOverview {
		name: row.feature_name.clone(),
		description: row.description.clone(),
		feature_type: row.r#type.clone(),
		project: row.project.clone(),
		created_at: row.created_at,
		archived_at: row.archived_at,
		stale: row.stale,
		potentially_stale: row.potentially_stale,
		impression_data: row.impression_data,
		favorite: row.favorite,
		last_seen_at: row.feature_last_seen_at,
		dependency_type: row.dependency_type.clone(),
		lifecycle: row.lifecycle_stage.as_ref().map(|stage| Lifecycle {
			stage: stage.clone(),
			status: row.lifecycle_status.clone(),
			entered_stage_at: row.lifecycle_entered_at,
		}),
		created_by: Creator::from_row(row),
		environments: Vec::new(),
		segments: Vec::new(),
		tags: Vec::new(),
	}
}

fn environment_from_row(name: String, row: &FeatureSearchRow) -> EnvironmentOverview {
	EnvironmentOverview {
		name,
		enabled: row.environment_enabled.unwrap_or(false),
		environment_type: row.environment_type.clone(),
		sort_order: row.environment_sort_order.unwrap_or_default(),
		variant_count: row.variant_count.unwrap_or_default(),
		last_seen_at: row.environment_last_seen_at,
		has_strategies: row.has_strategies.unwrap_or(false),
		has_enabled_strategies: row.has_enabled_strategies.unwrap_or(false),
		yes: row.yes.unwrap_or_default(),
		no: row.no.unwrap_or_default(),
		change_request_ids: row.change_request_ids.clone().unwrap_or_default(),
		milestone_name: row.milestone_name.clone(),
		milestone_order: row.milestone_order,
		total_milestones: row.total_milestones,
	}
}

fn first_present<const N: usize>(candidates: [&Option<String>; N]) -> Option<&str> {
	candidates
		.into_iter()
		.filter_map(|candidate| candidate.as_deref())
		.map(str::trim)
		.find(|candidate| !candidate.is_empty())
}
