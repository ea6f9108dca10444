use axum::extract::{Path, State};

use crate::services::response::{ServiceError, ServiceResponse};

use super::AppState;

pub async fn archive_post(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.archive.archive_now(id).await?.into())
}

pub async fn archive_expired_posts(State(state): State<AppState>) -> Result<ServiceResponse, ServiceError> {
	Ok(state.archive.archive_expired_posts().await?.into())
}

pub async fn list_archived(State(state): State<AppState>) -> Result<ServiceResponse, ServiceError> {
	Ok(state.archive.list_archived().await?.into())
}

pub async fn get_archived(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.archive.get_archived(id).await?.into())
}
