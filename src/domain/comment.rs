use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{domain::commands::CreateComment, services::response::ServiceError};

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
	pub id: i64,
	pub post_id: i64,
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reply_to_comment_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

impl Comment {
	/// Only the content is mandatory; reference checks need the store and live in the service.
	pub fn new(
		cmd: CreateComment,
		now: DateTime<Utc>,
	) -> Result<Self, ServiceError> {
		if cmd.content.trim().is_empty() {
			return Err(ServiceError::validation("comment content cannot be empty"));
		}

		Ok(Comment {
			id: 0,
			post_id: cmd.post_id,
			title: cmd.title,
			content: cmd.content,
			author_id: cmd.author_id,
			author_name: cmd.author_name,
			image_url: cmd.image_url.filter(|url| !url.is_empty()),
			reply_to_comment_id: cmd.reply_to_comment_id,
			created_at: now,
		})
	}
}
