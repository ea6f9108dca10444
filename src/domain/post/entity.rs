use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
	domain::{commands::CreatePost, comment::Comment},
	services::response::ServiceError,
};

/// Initial lifetime of a freshly created thread.
pub const POST_TTL_MINUTES: i64 = 10;
/// The single extension target, counted from the thread's creation.
pub const COMMENT_EXTENSION_MINUTES: i64 = 15;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Post {
	pub id: i64,
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
	pub comments: Vec<Comment>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl Post {
	/// Validates the command and stamps the initial TTL. The id is assigned by the store.
	pub fn new(
		cmd: CreatePost,
		now: DateTime<Utc>,
	) -> Result<Self, ServiceError> {
		if cmd.title.trim().is_empty() {
			return Err(ServiceError::validation("title cannot be empty"));
		}
		if cmd.content.trim().is_empty() {
			return Err(ServiceError::validation("content cannot be empty"));
		}

		Ok(Post {
			id: 0,
			title: cmd.title,
			content: cmd.content,
			author_id: cmd.author_id,
			author_name: cmd.author_name,
			image_url: cmd.image_url.filter(|url| !url.is_empty()),
			comments: Vec::new(),
			created_at: now,
			expires_at: now + Duration::minutes(POST_TTL_MINUTES),
		})
	}

	pub fn extension_target(&self) -> DateTime<Utc> {
		self.created_at + Duration::minutes(COMMENT_EXTENSION_MINUTES)
	}

	/// Moves `expires_at` up to the extension target if it is still behind it.
	/// Returns the new deadline when something changed.
	pub fn extend_for_comment(&mut self) -> Option<DateTime<Utc>> {
		let target = self.extension_target();
		if target > self.expires_at {
			self.expires_at = target;
			Some(target)
		} else {
			None
		}
	}

	pub fn last_comment_at(&self) -> Option<DateTime<Utc>> {
		self.comments.iter().map(|comment| comment.created_at).max()
	}

	pub fn is_expired(
		&self,
		now: DateTime<Utc>,
	) -> bool {
		self.expires_at < now
	}
}
