pub(crate) mod archive_repository;
pub(crate) mod comment_repository;
pub mod in_memory;
pub(crate) mod post_repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
	domain::{archive::Archive, comment::Comment, post::Post},
	services::response::ServiceError,
};

pub use self::in_memory::InMemoryStore;

/// Live threads. Reads return posts with their comments, oldest comment first.
#[async_trait]
pub trait TPostRepository: Send + Sync {
	/// Persists a new post and returns it with its assigned id.
	async fn add(
		&self,
		post: Post,
	) -> Result<Post, ServiceError>;
	async fn get(
		&self,
		id: i64,
	) -> Result<Post, ServiceError>;
	async fn list(&self) -> Result<Vec<Post>, ServiceError>;
	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Post>, ServiceError>;
	/// Sets `expires_at` to the later of the stored value and `expires_at`,
	/// returning what is stored afterwards. Never moves the deadline backwards.
	async fn extend_expiration(
		&self,
		id: i64,
		expires_at: DateTime<Utc>,
	) -> Result<DateTime<Utc>, ServiceError>;
	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError>;
	/// Deletes the comments, then the post. Two separate steps, not one unit.
	async fn delete(
		&self,
		id: i64,
	) -> Result<(), ServiceError>;
	/// Deletes the post and its comments as one unit, but only while it still
	/// has exactly `comment_count` comments. `Ok(false)` means it gained a
	/// comment since it was read and nothing was deleted.
	async fn delete_if_unchanged(
		&self,
		id: i64,
		comment_count: usize,
	) -> Result<bool, ServiceError>;
}

#[async_trait]
pub trait TCommentRepository: Send + Sync {
	async fn add(
		&self,
		comment: Comment,
	) -> Result<Comment, ServiceError>;
	async fn get(
		&self,
		id: i64,
	) -> Result<Comment, ServiceError>;
	async fn list_by_post(
		&self,
		post_id: i64,
	) -> Result<Vec<Comment>, ServiceError>;
	async fn list_replies(
		&self,
		comment_id: i64,
	) -> Result<Vec<Comment>, ServiceError>;
	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Comment>, ServiceError>;
	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError>;
}

#[async_trait]
pub trait TArchiveRepository: Send + Sync {
	/// Moves `post` and its comments into the archive as one unit: either every
	/// [`ArchiveStep`] is applied or none is.
	async fn archive(
		&self,
		post: &Post,
		archived_at: DateTime<Utc>,
	) -> Result<Archive, ServiceError>;
	async fn list(&self) -> Result<Vec<Archive>, ServiceError>;
	async fn get(
		&self,
		id: i64,
	) -> Result<Archive, ServiceError>;
}

/// The sub-steps of an archive move, in execution order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArchiveStep {
	InsertArchivedPost,
	InsertArchivedComments,
	DeleteLiveComments,
	DeleteLivePost,
}

impl ArchiveStep {
	pub const ALL: [ArchiveStep; 4] = [
		ArchiveStep::InsertArchivedPost,
		ArchiveStep::InsertArchivedComments,
		ArchiveStep::DeleteLiveComments,
		ArchiveStep::DeleteLivePost,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ArchiveStep::InsertArchivedPost => "insert_archived_post",
			ArchiveStep::InsertArchivedComments => "insert_archived_comments",
			ArchiveStep::DeleteLiveComments => "delete_live_comments",
			ArchiveStep::DeleteLivePost => "delete_live_post",
		}
	}

	pub(crate) fn fail(
		self,
		reason: impl ToString,
	) -> ServiceError {
		ServiceError::TransactionError {
			step: self.as_str(),
			reason: reason.to_string(),
		}
	}
}

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct SqlRepository {
	pub(crate) pool: PgPool,
}

impl SqlRepository {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
