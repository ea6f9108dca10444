use std::sync::Arc;

use crate::{
	adapters::repositories::TPostRepository,
	common::clock::Clock,
	domain::{commands::CreatePost, post::Post},
	services::response::ServiceError,
};

#[derive(Clone)]
pub struct PostService {
	posts: Arc<dyn TPostRepository>,
	clock: Arc<dyn Clock>,
}

impl PostService {
	pub fn new(
		posts: Arc<dyn TPostRepository>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { posts, clock }
	}

	pub async fn create_post(
		&self,
		cmd: CreatePost,
	) -> Result<Post, ServiceError> {
		let post = Post::new(cmd, self.clock.now())?;
		let post = self.posts.add(post).await?;
		tracing::info!(post_id = post.id, author_id = %post.author_id, expires_at = %post.expires_at, "post created");
		Ok(post)
	}

	pub async fn get_post(
		&self,
		id: i64,
	) -> Result<Post, ServiceError> {
		self.posts.get(id).await
	}

	pub async fn list_posts(&self) -> Result<Vec<Post>, ServiceError> {
		self.posts.list().await
	}

	pub async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Post>, ServiceError> {
		self.posts.list_by_author(author_id).await
	}

	/// Removes the post and its comments without archiving them.
	pub async fn delete_post(
		&self,
		id: i64,
	) -> Result<(), ServiceError> {
		self.posts.delete(id).await.map_err(|err| {
			if let ServiceError::PartialCascade(_) = err {
				tracing::error!(post_id = id, "{}", err);
			}
			err
		})?;
		tracing::info!(post_id = id, "post deleted");
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use std::sync::Arc;

	use chrono::{Duration, TimeZone, Utc};

	use super::PostService;
	use crate::{
		adapters::repositories::{InMemoryStore, TPostRepository},
		common::clock::ManualClock,
		domain::commands::CreatePost,
		services::response::ServiceError,
	};

	fn command(
		title: &str,
		content: &str,
	) -> CreatePost {
		CreatePost {
			title: title.into(),
			content: content.into(),
			author_id: "sid".into(),
			author_name: "Alice".into(),
			image_url: Some("/images/posts/a.png".into()),
		}
	}

	#[tokio::test]
	async fn test_create_post_sets_ten_minute_ttl() {
		let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
		let store = InMemoryStore::new();
		let service = PostService::new(Arc::new(store.clone()), Arc::new(ManualClock::new(start)));

		let post = service.create_post(command("T", "C")).await.unwrap();
		assert!(post.id > 0);
		assert_eq!(post.created_at, start);
		assert_eq!(post.expires_at, start + Duration::minutes(10));
		assert_eq!(service.get_post(post.id).await.unwrap(), post);
	}

	#[tokio::test]
	async fn test_invalid_post_is_never_stored() {
		let store = InMemoryStore::new();
		let service = PostService::new(Arc::new(store.clone()), Arc::new(ManualClock::new(Utc::now())));

		for (title, content) in [("", "C"), ("T", ""), ("", "")] {
			let err = service.create_post(command(title, content)).await.unwrap_err();
			assert!(matches!(err, ServiceError::ValidationError(_)));
		}
		assert!(store.list().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_list_by_author_only_returns_own_posts() {
		let store = InMemoryStore::new();
		let service = PostService::new(Arc::new(store), Arc::new(ManualClock::new(Utc::now())));
		service.create_post(command("mine", "C")).await.unwrap();
		service
			.create_post(CreatePost {
				author_id: "other".into(),
				..command("theirs", "C")
			})
			.await
			.unwrap();

		let mine = service.list_by_author("sid").await.unwrap();
		assert_eq!(mine.len(), 1);
		assert_eq!(mine[0].title, "mine");
		assert_eq!(service.list_posts().await.unwrap().len(), 2);
	}

	#[tokio::test]
	async fn test_delete_missing_post_is_not_found() {
		let service = PostService::new(Arc::new(InMemoryStore::new()), Arc::new(ManualClock::new(Utc::now())));
		assert!(service.delete_post(42).await.unwrap_err().is_not_found());
	}
}
