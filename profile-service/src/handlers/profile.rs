use service_core::axum::{
    Json,
    extract::{Path, Query, State},
};
use service_core::error::AppError;

use crate::AppState;
use crate::dtos::{ApiVersion, ProfileReadRequest, ReadProfileQuery, ReadProfileResponse};
use crate::middleware::RequesterContext;

pub async fn read_v3(
    state: State<AppState>,
    path: Path<String>,
    query: Query<ReadProfileQuery>,
    requester: RequesterContext,
) -> Result<Json<ReadProfileResponse>, AppError> {
    read(state, path, query, requester, ApiVersion::V3, false).await
}

pub async fn read_v4(
    state: State<AppState>,
    path: Path<String>,
    query: Query<ReadProfileQuery>,
    requester: RequesterContext,
) -> Result<Json<ReadProfileResponse>, AppError> {
    read(state, path, query, requester, ApiVersion::V4, false).await
}

pub async fn private_read_v3(
    state: State<AppState>,
    path: Path<String>,
    query: Query<ReadProfileQuery>,
    requester: RequesterContext,
) -> Result<Json<ReadProfileResponse>, AppError> {
    read(state, path, query, requester, ApiVersion::V3, true).await
}

pub async fn private_read_v4(
    state: State<AppState>,
    path: Path<String>,
    query: Query<ReadProfileQuery>,
    requester: RequesterContext,
) -> Result<Json<ReadProfileResponse>, AppError> {
    read(state, path, query, requester, ApiVersion::V4, true).await
}

async fn read(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<ReadProfileQuery>,
    RequesterContext(requester): RequesterContext,
    version: ApiVersion,
    private: bool,
) -> Result<Json<ReadProfileResponse>, AppError> {
    let request = ProfileReadRequest::from_query(user_id, version, private, query);

    let profile = state
        .profiles
        .read(&request, &requester)
        .await
        .map_err(|e| {
            tracing::warn!(id = %request.user_id, error = %e, "Profile read failed");
            AppError::from(e)
        })?;

    let request_id = requester.request_id.unwrap_or_default();
    Ok(Json(ReadProfileResponse::new(version, request_id, profile)))
}
