use std::str::FromStr;

use axum::{
	extract::{Multipart, Path, Query, State},
	http::StatusCode,
	Extension,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::{
	adapters::blob_store::{object_key, Bucket},
	common::middleware::SessionIdentity,
	domain::commands::{CreateComment, CreatePost},
	services::response::{ServiceError, ServiceResponse},
};

use super::AppState;

/// Fields of a post or comment upload form.
#[derive(Default)]
struct UploadForm {
	title: String,
	content: String,
	post_id: Option<String>,
	reply_to_id: Option<String>,
	image: Option<(Bytes, String)>,
}

impl UploadForm {
	async fn read(mut multipart: Multipart) -> Result<Self, ServiceError> {
		let mut form = UploadForm::default();
		while let Some(field) = multipart.next_field().await.map_err(|err| ServiceError::ParsingError(err.to_string()))? {
			let name = field.name().unwrap_or_default().to_string();
			match name.as_str() {
				"image" => {
					let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
					let bytes = field.bytes().await.map_err(|err| ServiceError::ParsingError(err.to_string()))?;
					// browsers send an empty part when no file was picked
					if !bytes.is_empty() {
						if !content_type.starts_with("image/") {
							return Err(ServiceError::validation(format!("unsupported image type `{content_type}`")));
						}
						form.image = Some((bytes, content_type));
					}
				}
				"title" | "content" | "post_id" | "reply_to_id" => {
					let text = field.text().await.map_err(|err| ServiceError::ParsingError(err.to_string()))?;
					match name.as_str() {
						"title" => form.title = text,
						"content" => form.content = text,
						"post_id" => form.post_id = Some(text),
						_ => form.reply_to_id = Some(text).filter(|id| !id.trim().is_empty()),
					}
				}
				other => tracing::debug!(field = other, "ignoring unknown form field"),
			}
		}
		Ok(form)
	}

	/// Stores the attached image, if any, and returns its public URL.
	async fn store_image(
		&mut self,
		state: &AppState,
		bucket: Bucket,
	) -> Result<Option<String>, ServiceError> {
		let Some((bytes, content_type)) = self.image.take() else {
			return Ok(None);
		};
		let key = object_key(state.clock.now(), &content_type);
		let url = state.blob_store.put(bucket, &key, bytes, &content_type).await?;
		Ok(Some(url))
	}
}

fn parse_id(
	field: &str,
	raw: &str,
) -> Result<i64, ServiceError> {
	i64::from_str(raw.trim()).map_err(|_| ServiceError::ParsingError(format!("{field} must be an integer, got `{raw}`")))
}

pub async fn create_post(
	State(state): State<AppState>,
	Extension(author): Extension<SessionIdentity>,
	multipart: Multipart,
) -> Result<(StatusCode, ServiceResponse), ServiceError> {
	let mut form = UploadForm::read(multipart).await?;
	if form.title.trim().is_empty() || form.content.trim().is_empty() {
		return Err(ServiceError::validation("title and content are required"));
	}
	let image_url = form.store_image(&state, Bucket::Posts).await?;

	let post = state
		.posts
		.create_post(CreatePost {
			title: form.title,
			content: form.content,
			author_id: author.id,
			author_name: author.name,
			image_url,
		})
		.await?;
	Ok((StatusCode::CREATED, post.into()))
}

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
	pub author_id: Option<String>,
}

pub async fn list_posts(
	State(state): State<AppState>,
	Query(query): Query<ListPostsQuery>,
) -> Result<ServiceResponse, ServiceError> {
	let posts = match query.author_id {
		Some(author_id) => state.posts.list_by_author(&author_id).await?,
		None => state.posts.list_posts().await?,
	};
	Ok(posts.into())
}

pub async fn get_post(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.posts.get_post(id).await?.into())
}

pub async fn delete_post(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	state.posts.delete_post(id).await?;
	Ok(().into())
}

pub async fn create_comment(
	State(state): State<AppState>,
	Extension(author): Extension<SessionIdentity>,
	multipart: Multipart,
) -> Result<(StatusCode, ServiceResponse), ServiceError> {
	let mut form = UploadForm::read(multipart).await?;
	let post_id = parse_id("post_id", form.post_id.as_deref().unwrap_or_default())?;
	let reply_to_comment_id = form.reply_to_id.as_deref().map(|raw| parse_id("reply_to_id", raw)).transpose()?;
	if form.content.trim().is_empty() {
		return Err(ServiceError::validation("content cannot be empty"));
	}
	// fail before uploading anything for a thread or parent that is gone
	state.posts.get_post(post_id).await?;
	if let Some(parent_id) = reply_to_comment_id {
		state.comments.reply_target(post_id, parent_id).await?;
	}
	let image_url = form.store_image(&state, Bucket::Comments).await?;

	let comment = state
		.comments
		.create_comment(CreateComment {
			post_id,
			title: form.title,
			content: form.content,
			author_id: author.id,
			author_name: author.name,
			image_url,
			reply_to_comment_id,
		})
		.await?;
	Ok((StatusCode::CREATED, comment.into()))
}

pub async fn get_comment(
	State(state): State<AppState>,
	Path(id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.comments.get_comment(id).await?.into())
}

pub async fn list_comments_of_post(
	State(state): State<AppState>,
	Path(post_id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.comments.list_comments_of_post(post_id).await?.into())
}

pub async fn list_replies(
	State(state): State<AppState>,
	Path(comment_id): Path<i64>,
) -> Result<ServiceResponse, ServiceError> {
	Ok(state.comments.list_replies(comment_id).await?.into())
}
