use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{comment::Comment, post::Post};

/// A thread moved to cold storage. Keeps the id it had while live.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Archive {
	pub id: i64,
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
	pub comments: Vec<ArchivedComment>,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
	pub archived_at: DateTime<Utc>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct ArchivedComment {
	pub id: i64,
	pub post_id: i64,
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
	pub reply_to_comment_id: Option<i64>,
	pub created_at: DateTime<Utc>,
}

impl From<Comment> for ArchivedComment {
	fn from(value: Comment) -> Self {
		Self {
			id: value.id,
			post_id: value.post_id,
			title: value.title,
			content: value.content,
			author_id: value.author_id,
			author_name: value.author_name,
			image_url: value.image_url,
			reply_to_comment_id: value.reply_to_comment_id,
			created_at: value.created_at,
		}
	}
}

impl Archive {
	pub fn from_post(
		post: Post,
		archived_at: DateTime<Utc>,
	) -> Self {
		let mut comments: Vec<ArchivedComment> = post.comments.into_iter().map(Into::into).collect();
		// ids are issued in insertion order, so a parent always sorts before its replies
		comments.sort_by_key(|comment| comment.id);

		Archive {
			id: post.id,
			title: post.title,
			content: post.content,
			author_id: post.author_id,
			author_name: post.author_name,
			image_url: post.image_url,
			comments,
			created_at: post.created_at,
			expires_at: post.expires_at,
			archived_at,
		}
	}
}
