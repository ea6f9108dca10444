use std::sync::Arc;

use serde::Serialize;

use crate::{
	adapters::repositories::{TArchiveRepository, TPostRepository},
	common::clock::Clock,
	domain::{archive::Archive, post::Post},
	services::response::ServiceError,
};

/// Outcome of a pass over the live posts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	pub archived: Vec<i64>,
	pub deleted: Vec<i64>,
	pub failed: Vec<SweepFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
	pub post_id: i64,
	pub reason: String,
}

impl SweepReport {
	pub(crate) fn record_failure(
		&mut self,
		post_id: i64,
		err: &ServiceError,
	) {
		tracing::error!(post_id, "{}", err);
		self.failed.push(SweepFailure {
			post_id,
			reason: err.to_string(),
		});
	}

	pub fn is_empty(&self) -> bool {
		self.archived.is_empty() && self.deleted.is_empty() && self.failed.is_empty()
	}
}

#[derive(Clone)]
pub struct ArchiveService {
	archives: Arc<dyn TArchiveRepository>,
	posts: Arc<dyn TPostRepository>,
	clock: Arc<dyn Clock>,
}

impl ArchiveService {
	pub fn new(
		archives: Arc<dyn TArchiveRepository>,
		posts: Arc<dyn TPostRepository>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { archives, posts, clock }
	}

	/// Moves the post and its comments to the archive, all or nothing.
	pub async fn archive_now(
		&self,
		post_id: i64,
	) -> Result<Archive, ServiceError> {
		let post = self.posts.get(post_id).await?;
		self.archive_post(&post).await
	}

	pub(crate) async fn archive_post(
		&self,
		post: &Post,
	) -> Result<Archive, ServiceError> {
		let archive = self.archives.archive(post, self.clock.now()).await?;
		tracing::info!(post_id = archive.id, comments = archive.comments.len(), "post archived");
		Ok(archive)
	}

	/// Archives every live post whose deadline has passed. One failing post
	/// does not stop the rest; posts that vanished meanwhile are skipped.
	pub async fn archive_expired_posts(&self) -> Result<SweepReport, ServiceError> {
		let now = self.clock.now();
		let mut report = SweepReport::default();

		for post in self.posts.list().await?.into_iter().filter(|post| post.is_expired(now)) {
			match self.archive_post(&post).await {
				Ok(archive) => report.archived.push(archive.id),
				Err(err) if err.is_not_found() => tracing::debug!(post_id = post.id, "post gone before it could be archived"),
				Err(err) => report.record_failure(post.id, &err),
			}
		}
		Ok(report)
	}

	pub async fn list_archived(&self) -> Result<Vec<Archive>, ServiceError> {
		self.archives.list().await
	}

	pub async fn get_archived(
		&self,
		id: i64,
	) -> Result<Archive, ServiceError> {
		self.archives.get(id).await
	}
}
