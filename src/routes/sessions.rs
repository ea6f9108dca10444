use axum::{
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
	Json,
};

use crate::{
	common::middleware::{clear_session_cookies, session_cookies},
	domain::commands::{CreateSession, RenameSession},
	services::response::{ServiceError, ServiceResponse},
};

use super::AppState;

pub async fn create_session(
	State(state): State<AppState>,
	Json(cmd): Json<CreateSession>,
) -> Result<(StatusCode, HeaderMap, ServiceResponse), ServiceError> {
	let session = state.sessions.create_session(&cmd.name).await?;
	let cookies = session_cookies(&session)?;
	Ok((StatusCode::CREATED, cookies, session.into()))
}

pub async fn list_sessions(State(state): State<AppState>) -> ServiceResponse {
	state.sessions.list_all().await.into()
}

pub async fn get_session(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.sessions.lookup(&id).await?.into())
}

/// Renames the session and everything it authored, then refreshes the cookies.
pub async fn rename_session(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(cmd): Json<RenameSession>,
) -> Result<(HeaderMap, ServiceResponse), ServiceError> {
	let session = state.sessions.rename(&id, &cmd.name).await?;
	let cookies = session_cookies(&session)?;
	Ok((cookies, session.into()))
}

pub async fn delete_session(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<(HeaderMap, ServiceResponse), ServiceError> {
	state.sessions.delete(&id).await?;
	Ok((clear_session_cookies()?, ().into()))
}
