use std::str::FromStr;

use axum::{
	extract::{Path, State},
	http::{header::CONTENT_TYPE, HeaderValue},
	response::{IntoResponse, Response},
};

use crate::{adapters::blob_store::Bucket, services::response::ServiceError};

use super::AppState;

pub async fn serve_image(
	State(state): State<AppState>,
	Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
	let bucket = Bucket::from_str(&bucket)?;
	let (bytes, content_type) = state.blob_store.get(bucket, &key).await?;
	let content_type = HeaderValue::from_str(&content_type).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
	Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
}
