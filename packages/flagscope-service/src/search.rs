pub mod aggregate;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use flagscope_domain::{
	EnvironmentStatus, FeatureSearchParams, FilterField, FlagColumn, Operator, QueryParam,
	SearchPlan, parse_operator_value,
};
use flagscope_storage::feature_search;

use crate::{Error, FlagscopeService, Result, time_serde};
use aggregate::FeatureOverview;

const DEFAULT_SORT_BY: &str = "createdAt";
const DEFAULT_SORT_ORDER: &str = "asc";

/// Filter fields use the `OPERATOR:value1,value2` form; `status` takes `<environment>:<enabled|disabled>`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSearchRequest {
	pub query: Option<String>,
	pub project: Option<String>,
	#[serde(rename = "type")]
	pub feature_type: Option<String>,
	pub tag: Option<String>,
	pub segment: Option<String>,
	pub created_at: Option<String>,
	pub created_by: Option<String>,
	pub state: Option<String>,
	pub last_seen_at: Option<String>,
	pub status: Option<String>,
	pub lifecycle: Option<String>,
	pub archived: Option<bool>,
	pub sort_by: Option<String>,
	pub sort_order: Option<String>,
	pub favorites_first: Option<bool>,
	pub offset: Option<u32>,
	pub limit: Option<u32>,
}
impl FeatureSearchRequest {
	pub fn into_parts(
		self,
		cfg: &flagscope_config::Search,
		user_id: Option<i32>,
	) -> Result<(FeatureSearchParams, Vec<QueryParam>)> {
		let filters = [
			(FilterField::Column(FlagColumn::Project), self.project.as_deref()),
			(FilterField::Column(FlagColumn::Type), self.feature_type.as_deref()),
			(FilterField::Tag, self.tag.as_deref()),
			(FilterField::Segment, self.segment.as_deref()),
			(FilterField::Column(FlagColumn::CreatedAt), self.created_at.as_deref()),
			(FilterField::Column(FlagColumn::CreatedByUserId), self.created_by.as_deref()),
			(FilterField::Stale, self.state.as_deref()),
			(FilterField::LastSeenAt, self.last_seen_at.as_deref()),
		];
		let mut query_params = Vec::with_capacity(filters.len());

		for (field, raw) in filters {
			let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
				continue;
			};

			query_params.push(parse_filter(field, raw)?);
		}

		let status = match self.status.as_deref() {
			Some(raw) => parse_status(raw)?,
			None => Vec::new(),
		};
		let lifecycle = self.lifecycle.as_deref().and_then(|raw| plain_values(raw).into_iter().next());
		let limit = self.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit.max(1));
		let params = FeatureSearchParams {
			user_id,
			search_params: self.query.as_deref().map(plain_values).unwrap_or_default(),
			status,
			lifecycle,
			archived: self.archived.unwrap_or(false),
			offset: self.offset.unwrap_or(0),
			limit,
			sort_by: self.sort_by.unwrap_or_else(|| DEFAULT_SORT_BY.to_string()),
			sort_order: self.sort_order.unwrap_or_else(|| DEFAULT_SORT_ORDER.to_string()),
			favorites_first: self.favorites_first.unwrap_or(false),
		};

		Ok((params, query_params))
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureSearchResponse {
	pub features: Vec<FeatureOverview>,
	pub total: u64,
}

impl FlagscopeService {
	pub async fn search_features(
		&self,
		params: &FeatureSearchParams,
		query_params: &[QueryParam],
	) -> Result<FeatureSearchResponse> {
		let plan = SearchPlan::new(params, query_params)
			.with_metrics_window(self.cfg.search.metrics_window_hours);

		if plan.matches_nothing() {
			tracing::debug!("Feature search skipped; the filters match nothing.");

			return Ok(FeatureSearchResponse { features: Vec::new(), total: 0 });
		}

		let started = Instant::now();
		let rows = feature_search::search_features(&self.db.pool, &plan).await?;
		let total = match rows.first() {
			Some(row) => row.total,
			None if plan.window.first_rank() > 1 =>
				feature_search::count_features(&self.db.pool, &plan).await?,
			None => 0,
		};
		let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
		let row_count = rows.len();
		let total = u64::try_from(total).unwrap_or(0);
		let features = aggregate::aggregate_rows(rows);

		tracing::debug!(elapsed_ms, rows = row_count, total, "Feature search completed.");

		Ok(FeatureSearchResponse { features, total })
	}

	pub async fn search(
		&self,
		request: FeatureSearchRequest,
		user_id: Option<i32>,
	) -> Result<FeatureSearchResponse> {
		let (params, query_params) = request.into_parts(&self.cfg.search, user_id)?;

		self.search_features(&params, &query_params).await
	}
}

fn parse_filter(field: FilterField, raw: &str) -> Result<QueryParam> {
	let param = QueryParam::from_operator_value(field, raw).ok_or_else(|| {
		Error::invalid(format!(
			"{} filter must look like OPERATOR:value[,value], got {raw:?}.",
			field.as_str()
		))
	})?;

	if is_timestamp_field(field) {
		if !matches!(param.operator, Operator::IsBefore | Operator::IsOnOrAfter) {
			return Err(Error::invalid(format!(
				"{} filter only supports IS_BEFORE and IS_ON_OR_AFTER.",
				field.as_str()
			)));
		}
		if let Some(value) =
			param.values.iter().find(|value| time_serde::parse_timestamp(value).is_none())
		{
			return Err(Error::invalid(format!(
				"{} filter value {value:?} is not a date or RFC 3339 timestamp.",
				field.as_str()
			)));
		}
	}
	if field == FilterField::Column(FlagColumn::CreatedByUserId)
		&& let Some(value) = param.values.iter().find(|value| value.parse::<i32>().is_err())
	{
		return Err(Error::invalid(format!("createdBy filter value {value:?} is not a user id.")));
	}

	Ok(param)
}

fn is_timestamp_field(field: FilterField) -> bool {
	matches!(field, FilterField::LastSeenAt | FilterField::Column(FlagColumn::CreatedAt))
}

fn parse_status(raw: &str) -> Result<Vec<EnvironmentStatus>> {
	plain_values(raw)
		.iter()
		.map(|value| {
			EnvironmentStatus::parse(value).ok_or_else(|| {
				Error::invalid(format!(
					"status value {value:?} must look like <environment>:<enabled|disabled>."
				))
			})
		})
		.collect()
}

/// Comma separated values, with an optional `IS:` or `IS_ANY_OF:` prefix.
fn plain_values(raw: &str) -> Vec<String> {
	if let Some((Operator::Is | Operator::IsAnyOf, values)) = parse_operator_value(raw) {
		return values;
	}

	raw.split(',')
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_string)
		.collect()
}
