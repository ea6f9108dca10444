use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
	domain::{archive::Archive, comment::Comment, post::Post},
	services::response::ServiceError,
};

use super::{ArchiveStep, TArchiveRepository, TCommentRepository, TPostRepository};

#[derive(Clone, Default)]
struct Tables {
	next_post_id: i64,
	next_comment_id: i64,
	/// Stored without comments; reads attach them from `comments`.
	posts: BTreeMap<i64, Post>,
	comments: BTreeMap<i64, Comment>,
	archived: BTreeMap<i64, Archive>,
}

impl Tables {
	fn assemble(
		&self,
		post: &Post,
	) -> Post {
		let mut post = post.clone();
		post.comments = self.comments_of(post.id);
		post
	}

	fn comments_of(
		&self,
		post_id: i64,
	) -> Vec<Comment> {
		let mut comments: Vec<Comment> = self.comments.values().filter(|comment| comment.post_id == post_id).cloned().collect();
		comments.sort_by_key(|comment| (comment.created_at, comment.id));
		comments
	}

	fn newest_first(mut posts: Vec<Post>) -> Vec<Post> {
		posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
		posts
	}
}

/// Failures the in-memory store can be told to produce.
#[derive(Clone, Debug, Default)]
pub struct Faults {
	pub fail_archive_at: Option<ArchiveStep>,
	pub fail_post_rename: bool,
	pub fail_comment_rename: bool,
	/// Comments are deleted, then the post delete fails.
	pub fail_post_delete_after_comments: bool,
}

#[derive(Default)]
struct Inner {
	tables: Tables,
	faults: Faults,
}

/// Process-local implementation of every repository trait.
///
/// One lock guards all tables, so an archive move is applied to a staged copy
/// and swapped in only once every step succeeded.
#[derive(Clone, Default)]
pub struct InMemoryStore {
	inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	#[cfg(any(test, feature = "test"))]
	pub async fn inject(
		&self,
		faults: Faults,
	) {
		self.inner.write().await.faults = faults;
	}
}

#[async_trait]
impl TPostRepository for InMemoryStore {
	async fn add(
		&self,
		mut post: Post,
	) -> Result<Post, ServiceError> {
		let mut inner = self.inner.write().await;
		inner.tables.next_post_id += 1;
		post.id = inner.tables.next_post_id;
		post.comments.clear();
		inner.tables.posts.insert(post.id, post.clone());
		Ok(post)
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Post, ServiceError> {
		let inner = self.inner.read().await;
		inner
			.tables
			.posts
			.get(&id)
			.map(|post| inner.tables.assemble(post))
			.ok_or_else(|| ServiceError::not_found(format!("post {id}")))
	}

	async fn list(&self) -> Result<Vec<Post>, ServiceError> {
		let inner = self.inner.read().await;
		let posts = inner.tables.posts.values().map(|post| inner.tables.assemble(post)).collect();
		Ok(Tables::newest_first(posts))
	}

	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Post>, ServiceError> {
		let inner = self.inner.read().await;
		let posts = inner
			.tables
			.posts
			.values()
			.filter(|post| post.author_id == author_id)
			.map(|post| inner.tables.assemble(post))
			.collect();
		Ok(Tables::newest_first(posts))
	}

	async fn extend_expiration(
		&self,
		id: i64,
		expires_at: DateTime<Utc>,
	) -> Result<DateTime<Utc>, ServiceError> {
		let mut inner = self.inner.write().await;
		let post = inner.tables.posts.get_mut(&id).ok_or_else(|| ServiceError::not_found(format!("post {id}")))?;
		post.expires_at = post.expires_at.max(expires_at);
		Ok(post.expires_at)
	}

	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError> {
		let mut inner = self.inner.write().await;
		if inner.faults.fail_post_rename {
			return Err(ServiceError::DatabaseError("injected post rename failure".into()));
		}
		let mut updated = 0;
		for post in inner.tables.posts.values_mut().filter(|post| post.author_id == author_id) {
			post.author_name = author_name.to_string();
			updated += 1;
		}
		Ok(updated)
	}

	async fn delete(
		&self,
		id: i64,
	) -> Result<(), ServiceError> {
		let mut inner = self.inner.write().await;
		inner.tables.comments.retain(|_, comment| comment.post_id != id);

		if inner.faults.fail_post_delete_after_comments {
			return Err(ServiceError::PartialCascade(format!("comments of post {id} deleted but the post was not")));
		}
		inner.tables.posts.remove(&id).map(|_| ()).ok_or_else(|| ServiceError::not_found(format!("post {id}")))
	}

	async fn delete_if_unchanged(
		&self,
		id: i64,
		comment_count: usize,
	) -> Result<bool, ServiceError> {
		let mut inner = self.inner.write().await;
		if !inner.tables.posts.contains_key(&id) {
			return Err(ServiceError::not_found(format!("post {id}")));
		}
		if inner.tables.comments.values().filter(|comment| comment.post_id == id).count() != comment_count {
			return Ok(false);
		}
		inner.tables.comments.retain(|_, comment| comment.post_id != id);
		inner.tables.posts.remove(&id);
		Ok(true)
	}
}

#[async_trait]
impl TCommentRepository for InMemoryStore {
	async fn add(
		&self,
		mut comment: Comment,
	) -> Result<Comment, ServiceError> {
		let mut inner = self.inner.write().await;
		// mirrors the foreign keys of the relational schema
		if !inner.tables.posts.contains_key(&comment.post_id) {
			return Err(ServiceError::not_found(format!("post {}", comment.post_id)));
		}
		if let Some(parent) = comment.reply_to_comment_id {
			if !inner.tables.comments.contains_key(&parent) {
				return Err(ServiceError::not_found(format!("comment {parent}")));
			}
		}
		inner.tables.next_comment_id += 1;
		comment.id = inner.tables.next_comment_id;
		inner.tables.comments.insert(comment.id, comment.clone());
		Ok(comment)
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Comment, ServiceError> {
		self.inner
			.read()
			.await
			.tables
			.comments
			.get(&id)
			.cloned()
			.ok_or_else(|| ServiceError::not_found(format!("comment {id}")))
	}

	async fn list_by_post(
		&self,
		post_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		Ok(self.inner.read().await.tables.comments_of(post_id))
	}

	async fn list_replies(
		&self,
		comment_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		let inner = self.inner.read().await;
		let mut replies: Vec<Comment> = inner
			.tables
			.comments
			.values()
			.filter(|comment| comment.reply_to_comment_id == Some(comment_id))
			.cloned()
			.collect();
		replies.sort_by_key(|comment| (comment.created_at, comment.id));
		Ok(replies)
	}

	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Comment>, ServiceError> {
		let inner = self.inner.read().await;
		let mut comments: Vec<Comment> = inner.tables.comments.values().filter(|comment| comment.author_id == author_id).cloned().collect();
		comments.sort_by_key(|comment| (comment.created_at, comment.id));
		Ok(comments)
	}

	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError> {
		let mut inner = self.inner.write().await;
		if inner.faults.fail_comment_rename {
			return Err(ServiceError::DatabaseError("injected comment rename failure".into()));
		}
		let mut updated = 0;
		for comment in inner.tables.comments.values_mut().filter(|comment| comment.author_id == author_id) {
			comment.author_name = author_name.to_string();
			updated += 1;
		}
		Ok(updated)
	}
}

#[async_trait]
impl TArchiveRepository for InMemoryStore {
	async fn archive(
		&self,
		post: &Post,
		archived_at: DateTime<Utc>,
	) -> Result<Archive, ServiceError> {
		let archive = Archive::from_post(post.clone(), archived_at);
		let mut inner = self.inner.write().await;
		let mut staged = inner.tables.clone();

		for step in ArchiveStep::ALL {
			if inner.faults.fail_archive_at == Some(step) {
				return Err(step.fail("injected failure"));
			}
			match step {
				ArchiveStep::InsertArchivedPost => {
					if staged.archived.contains_key(&archive.id) {
						return Err(step.fail(format!("post {} is already archived", archive.id)));
					}
					let mut header = archive.clone();
					header.comments.clear();
					staged.archived.insert(archive.id, header);
				}
				ArchiveStep::InsertArchivedComments => {
					if let Some(archived) = staged.archived.get_mut(&archive.id) {
						archived.comments = archive.comments.clone();
					}
				}
				ArchiveStep::DeleteLiveComments => {
					let before = staged.comments.len();
					staged.comments.retain(|_, comment| comment.post_id != archive.id);
					let deleted = before - staged.comments.len();
					if deleted != archive.comments.len() {
						return Err(step.fail(format!("expected {} live comments, found {}", archive.comments.len(), deleted)));
					}
				}
				ArchiveStep::DeleteLivePost => {
					if staged.posts.remove(&archive.id).is_none() {
						return Err(ServiceError::not_found(format!("post {}", archive.id)));
					}
				}
			}
		}

		inner.tables = staged;
		Ok(archive)
	}

	async fn list(&self) -> Result<Vec<Archive>, ServiceError> {
		let inner = self.inner.read().await;
		let mut archives: Vec<Archive> = inner.tables.archived.values().cloned().collect();
		archives.sort_by(|a, b| b.archived_at.cmp(&a.archived_at).then(b.id.cmp(&a.id)));
		Ok(archives)
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Archive, ServiceError> {
		self.inner
			.read()
			.await
			.tables
			.archived
			.get(&id)
			.cloned()
			.ok_or_else(|| ServiceError::not_found(format!("archived post {id}")))
	}
}

#[cfg(test)]
mod test {
	use chrono::{Duration, Utc};

	use super::{Faults, InMemoryStore};
	use crate::{
		adapters::repositories::{TCommentRepository, TPostRepository},
		domain::{
			commands::{CreateComment, CreatePost},
			comment::Comment,
			post::Post,
		},
		services::response::ServiceError,
	};

	async fn seed(store: &InMemoryStore) -> Post {
		let now = Utc::now();
		let post = TPostRepository::add(
			store,
			Post::new(
				CreatePost {
					title: "T".into(),
					content: "C".into(),
					author_id: "a".into(),
					author_name: "Alice".into(),
					image_url: None,
				},
				now,
			)
			.unwrap(),
		)
		.await
		.unwrap();
		TCommentRepository::add(
			store,
			Comment::new(
				CreateComment {
					post_id: post.id,
					content: "first".into(),
					..Default::default()
				},
				now,
			)
			.unwrap(),
		)
		.await
		.unwrap();
		post
	}

	#[tokio::test]
	async fn test_extend_expiration_never_moves_backwards() {
		let store = InMemoryStore::new();
		let post = seed(&store).await;

		let later = post.expires_at + Duration::minutes(5);
		assert_eq!(store.extend_expiration(post.id, later).await.unwrap(), later);
		assert_eq!(store.extend_expiration(post.id, post.expires_at).await.unwrap(), later);
	}

	#[tokio::test]
	async fn test_delete_removes_comments_then_post() {
		let store = InMemoryStore::new();
		let post = seed(&store).await;

		TPostRepository::delete(&store, post.id).await.unwrap();
		assert!(TPostRepository::get(&store, post.id).await.unwrap_err().is_not_found());
		assert!(store.list_by_post(post.id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_half_completed_delete_is_reported_and_not_rolled_back() {
		let store = InMemoryStore::new();
		let post = seed(&store).await;
		store
			.inject(Faults {
				fail_post_delete_after_comments: true,
				..Default::default()
			})
			.await;

		let err = TPostRepository::delete(&store, post.id).await.unwrap_err();
		assert!(matches!(err, ServiceError::PartialCascade(_)));
		let survivor = TPostRepository::get(&store, post.id).await.unwrap();
		assert!(survivor.comments.is_empty());
	}

	#[tokio::test]
	async fn test_delete_if_unchanged_keeps_a_post_that_gained_comments() {
		let store = InMemoryStore::new();
		let post = seed(&store).await;

		assert!(!store.delete_if_unchanged(post.id, 0).await.unwrap());
		assert_eq!(TPostRepository::get(&store, post.id).await.unwrap().comments.len(), 1);

		assert!(store.delete_if_unchanged(post.id, 1).await.unwrap());
		assert!(TPostRepository::get(&store, post.id).await.unwrap_err().is_not_found());
		assert!(store.list_by_post(post.id).await.unwrap().is_empty());
		assert!(store.delete_if_unchanged(post.id, 0).await.unwrap_err().is_not_found());
	}
}
