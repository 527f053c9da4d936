use axum::{
	Json, Router,
	extract::{Query, State, rejection::QueryRejection},
	http::{HeaderMap, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
};
use serde::Serialize;

use flagscope_service::{Error as ServiceError, FeatureSearchRequest, FeatureSearchResponse};

use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-flagscope-user-id";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/admin/search/features", get(search_features))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search_features(
	State(state): State<AppState>,
	headers: HeaderMap,
	query: Result<Query<FeatureSearchRequest>, QueryRejection>,
) -> Result<Json<FeatureSearchResponse>, ApiError> {
	let Query(request) = query.map_err(|err| ApiError::invalid_request(err.body_text()))?;
	let user_id = user_id(&headers)?;
	let response = state.service.search(request, user_id).await?;

	Ok(Json(response))
}

fn user_id(headers: &HeaderMap) -> Result<Option<i32>, ApiError> {
	let Some(value) = headers.get(USER_ID_HEADER) else {
		return Ok(None);
	};

	value
		.to_str()
		.ok()
		.and_then(|raw| raw.trim().parse::<i32>().ok())
		.map(Some)
		.ok_or_else(|| ApiError::invalid_request(format!("{USER_ID_HEADER} must be an integer.")))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}
impl ApiError {
	fn invalid_request(message: impl Into<String>) -> Self {
		Self { status: StatusCode::BAD_REQUEST, error_code: "invalid_request", message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => Self::invalid_request(message),
			ServiceError::Storage { message } => {
				tracing::error!(%message, "Feature search failed.");

				Self {
					status: StatusCode::INTERNAL_SERVER_ERROR,
					error_code: "storage_error",
					message,
				}
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
