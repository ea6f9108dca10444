use std::sync::Arc;

use crate::{
	adapters::repositories::{TCommentRepository, TPostRepository},
	common::clock::Clock,
	domain::{commands::CreateComment, comment::Comment},
	services::response::ServiceError,
};

#[derive(Clone)]
pub struct CommentService {
	comments: Arc<dyn TCommentRepository>,
	posts: Arc<dyn TPostRepository>,
	clock: Arc<dyn Clock>,
}

impl CommentService {
	pub fn new(
		comments: Arc<dyn TCommentRepository>,
		posts: Arc<dyn TPostRepository>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { comments, posts, clock }
	}

	/// Stores the comment and, if needed, pushes the thread's deadline to its
	/// single extension target (creation + 15 minutes).
	pub async fn create_comment(
		&self,
		cmd: CreateComment,
	) -> Result<Comment, ServiceError> {
		let comment = Comment::new(cmd, self.clock.now())?;
		let mut post = self.posts.get(comment.post_id).await?;

		if let Some(parent_id) = comment.reply_to_comment_id {
			self.reply_target(post.id, parent_id).await?;
		}

		let comment = self.comments.add(comment).await?;

		if let Some(target) = post.extend_for_comment() {
			match self.posts.extend_expiration(post.id, target).await {
				Ok(expires_at) => tracing::debug!(post_id = post.id, %expires_at, "post lifetime extended"),
				// the comment is already stored; the thread keeps its current deadline
				Err(err) => tracing::warn!(post_id = post.id, "failed to extend post lifetime: {}", err),
			}
		}

		tracing::info!(comment_id = comment.id, post_id = comment.post_id, reply_to = ?comment.reply_to_comment_id, "comment created");
		Ok(comment)
	}

	pub async fn get_comment(
		&self,
		id: i64,
	) -> Result<Comment, ServiceError> {
		self.comments.get(id).await
	}

	/// The comment `parent_id` of post `post_id`. A comment of another post is
	/// reported as not found.
	pub async fn reply_target(
		&self,
		post_id: i64,
		parent_id: i64,
	) -> Result<Comment, ServiceError> {
		match self.get_comment(parent_id).await {
			Ok(parent) if parent.post_id == post_id => Ok(parent),
			Ok(_) => Err(ServiceError::not_found(format!("comment {parent_id} in post {post_id}"))),
			Err(err) if err.is_not_found() => Err(ServiceError::not_found(format!("reply-to comment {parent_id}"))),
			Err(err) => Err(err),
		}
	}

	pub async fn list_comments_of_post(
		&self,
		post_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		self.comments.list_by_post(post_id).await
	}

	pub async fn list_replies(
		&self,
		comment_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		self.comments.list_replies(comment_id).await
	}
}
