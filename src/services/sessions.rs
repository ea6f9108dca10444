use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::{
	adapters::{
		blob_store::{object_key, Bucket, TBlobStore},
		character_source::TCharacterSource,
		repositories::{TCommentRepository, TPostRepository},
	},
	common::clock::Clock,
	domain::{
		character::Character,
		session::{generate_session_id, Session},
	},
	services::{avatars::AvatarAssigner, response::ServiceError},
};

/// In-memory registry of pseudonymous sessions. Nothing here survives a restart.
pub struct SessionDirectory {
	sessions: RwLock<HashMap<String, Session>>,
	avatars: AvatarAssigner,
	character_source: Arc<dyn TCharacterSource>,
	blob_store: Arc<dyn TBlobStore>,
	posts: Arc<dyn TPostRepository>,
	comments: Arc<dyn TCommentRepository>,
	clock: Arc<dyn Clock>,
}

impl SessionDirectory {
	pub fn new(
		avatars: AvatarAssigner,
		character_source: Arc<dyn TCharacterSource>,
		blob_store: Arc<dyn TBlobStore>,
		posts: Arc<dyn TPostRepository>,
		comments: Arc<dyn TCommentRepository>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			sessions: Default::default(),
			avatars,
			character_source,
			blob_store,
			posts,
			comments,
			clock,
		}
	}

	/// Draws an avatar, copies its image into the avatars bucket and registers
	/// the session. An empty `requested_name` falls back to the character name.
	/// The avatar goes back to the pool when any step fails.
	pub async fn create_session(
		&self,
		requested_name: &str,
	) -> Result<Session, ServiceError> {
		let claim = self.avatars.assign().await;
		let session = match self.build_session(&claim.character, requested_name).await {
			Ok(session) => session,
			Err(err) => {
				tracing::warn!(image = %claim.character.image, "avatar released: {}", err);
				self.avatars.release(claim).await;
				return Err(err);
			}
		};

		self.sessions.write().await.insert(session.id.clone(), session.clone());
		tracing::info!(session_id = %session.id, name = %session.name, avatar = %session.avatar_url, "session created");
		Ok(session)
	}

	async fn build_session(
		&self,
		character: &Character,
		requested_name: &str,
	) -> Result<Session, ServiceError> {
		let (image, content_type) = self.character_source.fetch_image(&character.image).await?;
		let now = self.clock.now();
		let avatar_url = self.blob_store.put(Bucket::Avatars, &object_key(now, &content_type), image, &content_type).await?;

		let name = match requested_name.trim() {
			"" => character.name.clone(),
			requested => requested.to_string(),
		};
		Session::new(generate_session_id(now), name, avatar_url, now)
	}

	/// Renames the session, then every post and comment it authored.
	///
	/// The cascade is not transactional: when a later step fails the error is
	/// returned and earlier steps stay applied.
	pub async fn rename(
		&self,
		session_id: &str,
		new_name: &str,
	) -> Result<Session, ServiceError> {
		if new_name.trim().is_empty() {
			return Err(ServiceError::validation("name cannot be empty"));
		}

		let session = {
			let mut sessions = self.sessions.write().await;
			let session = sessions.get_mut(session_id).ok_or_else(|| ServiceError::not_found(format!("session {session_id}")))?;
			session.name = new_name.to_string();
			session.clone()
		};

		let posts = self.posts.rename_author(session_id, new_name).await.map_err(|err| {
			tracing::error!(session_id, "session renamed but its posts were not: {}", err);
			ServiceError::PartialCascade(format!("session {session_id} renamed, posts not updated: {err}"))
		})?;
		let comments = self.comments.rename_author(session_id, new_name).await.map_err(|err| {
			tracing::error!(session_id, posts, "session and posts renamed but comments were not: {}", err);
			ServiceError::PartialCascade(format!("session {session_id} and {posts} posts renamed, comments not updated: {err}"))
		})?;

		tracing::info!(session_id, posts, comments, "session renamed");
		Ok(session)
	}

	pub async fn lookup(
		&self,
		session_id: &str,
	) -> Result<Session, ServiceError> {
		self.sessions
			.read()
			.await
			.get(session_id)
			.cloned()
			.ok_or_else(|| ServiceError::not_found(format!("session {session_id}")))
	}

	/// Oldest first.
	pub async fn list_all(&self) -> Vec<Session> {
		let mut sessions: Vec<Session> = self.sessions.read().await.values().cloned().collect();
		sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
		sessions
	}

	pub async fn delete(
		&self,
		session_id: &str,
	) -> Result<(), ServiceError> {
		self.sessions
			.write()
			.await
			.remove(session_id)
			.map(|_| tracing::info!(session_id, "session deleted"))
			.ok_or_else(|| ServiceError::not_found(format!("session {session_id}")))
	}
}

#[cfg(test)]
pub(crate) mod test {
	use std::sync::Arc;

	use async_trait::async_trait;
	use bytes::Bytes;
	use chrono::{TimeZone, Utc};

	use super::SessionDirectory;
	use crate::{
		adapters::{
			blob_store::{Bucket, InMemoryBlobStore, TBlobStore},
			character_source::TCharacterSource,
			repositories::{
				in_memory::{Faults, InMemoryStore},
				TCommentRepository, TPostRepository,
			},
		},
		common::clock::ManualClock,
		domain::{
			character::{Character, CharacterPage},
			commands::{CreateComment, CreatePost},
			comment::Comment,
			post::Post,
		},
		services::{
			avatars::{AvatarAssigner, CharacterPool},
			response::ServiceError,
		},
	};

	pub(crate) struct StubCatalog {
		pub(crate) image_available: bool,
	}

	#[async_trait]
	impl TCharacterSource for StubCatalog {
		fn first_page(&self) -> String {
			"stub".into()
		}

		async fn fetch_page(
			&self,
			_url: &str,
		) -> Result<CharacterPage, ServiceError> {
			Ok(CharacterPage {
				info: Default::default(),
				results: vec![Character {
					id: 1,
					name: "Rick Sanchez".into(),
					image: "https://img/1.jpeg".into(),
					..Default::default()
				}],
			})
		}

		async fn fetch_image(
			&self,
			url: &str,
		) -> Result<(Bytes, String), ServiceError> {
			if self.image_available {
				Ok((Bytes::from(url.to_string()), "image/jpeg".into()))
			} else {
				Err(ServiceError::ExternalSourceError(format!("failed to download {url}")))
			}
		}
	}

	pub(crate) async fn directory(
		store: &InMemoryStore,
		blobs: &InMemoryBlobStore,
		image_available: bool,
	) -> SessionDirectory {
		let catalog = StubCatalog { image_available };
		let pool = CharacterPool::load(&catalog).await.unwrap();
		let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
		SessionDirectory::new(
			AvatarAssigner::new(pool),
			Arc::new(catalog),
			Arc::new(blobs.clone()),
			Arc::new(store.clone()),
			Arc::new(store.clone()),
			Arc::new(clock),
		)
	}

	#[tokio::test]
	async fn test_create_session_falls_back_to_character_name_and_stores_avatar() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;

		let anonymous = sessions.create_session("  ").await.unwrap();
		assert_eq!(anonymous.name, "Rick Sanchez");
		assert!(anonymous.avatar_url.starts_with("/images/avatars/"));

		let key = anonymous.avatar_url.rsplit('/').next().unwrap();
		let (bytes, content_type) = blobs.get(Bucket::Avatars, key).await.unwrap();
		assert_eq!(&bytes[..], b"https://img/1.jpeg");
		assert_eq!(content_type, "image/jpeg");

		let named = sessions.create_session("Alice").await.unwrap();
		assert_eq!(named.name, "Alice");
		assert_ne!(named.id, anonymous.id);

		assert_eq!(sessions.lookup(&named.id).await.unwrap(), named);
		assert_eq!(sessions.list_all().await.len(), 2);
	}

	#[tokio::test]
	async fn test_avatar_failure_is_propagated_and_nothing_is_registered() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, false).await;

		let err = sessions.create_session("Alice").await.unwrap_err();
		assert!(matches!(err, ServiceError::ExternalSourceError(_)));
		assert!(sessions.list_all().await.is_empty());
	}

	#[tokio::test]
	async fn test_failed_avatar_copy_returns_the_avatar_to_the_pool() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, false).await;

		for _ in 0..3 {
			assert!(sessions.create_session("Alice").await.is_err());
			assert_eq!(sessions.avatars.assigned_count().await, 0);
		}
	}

	#[tokio::test]
	async fn test_successful_session_keeps_its_avatar_assigned() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;

		sessions.create_session("Alice").await.unwrap();
		assert_eq!(sessions.avatars.assigned_count().await, 1);
	}

	#[tokio::test]
	async fn test_rename_rejects_blank_names_and_unknown_sessions() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;
		let session = sessions.create_session("Alice").await.unwrap();

		assert!(matches!(sessions.rename(&session.id, "").await, Err(ServiceError::ValidationError(_))));
		assert!(sessions.rename("missing", "Bob").await.unwrap_err().is_not_found());
		assert_eq!(sessions.lookup(&session.id).await.unwrap().name, "Alice");
	}

	#[tokio::test]
	async fn test_delete_forgets_the_session() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;
		let session = sessions.create_session("Alice").await.unwrap();

		sessions.delete(&session.id).await.unwrap();
		assert!(sessions.lookup(&session.id).await.unwrap_err().is_not_found());
		assert!(sessions.delete(&session.id).await.unwrap_err().is_not_found());
	}

	async fn author_content(
		store: &InMemoryStore,
		author_id: &str,
	) {
		let now = Utc::now();
		let mut post_ids = Vec::new();
		for title in ["first", "second"] {
			let post = Post::new(
				CreatePost {
					title: title.into(),
					content: "C".into(),
					author_id: author_id.into(),
					author_name: "Alice".into(),
					image_url: None,
				},
				now,
			)
			.unwrap();
			post_ids.push(TPostRepository::add(store, post).await.unwrap().id);
		}
		for post_id in [post_ids[0], post_ids[0], post_ids[1]] {
			let comment = Comment::new(
				CreateComment {
					post_id,
					content: "reply".into(),
					author_id: author_id.into(),
					author_name: "Alice".into(),
					..Default::default()
				},
				now,
			)
			.unwrap();
			TCommentRepository::add(store, comment).await.unwrap();
		}
	}

	#[tokio::test]
	async fn test_rename_cascades_to_posts_and_comments() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;
		let session = sessions.create_session("Alice").await.unwrap();
		author_content(&store, &session.id).await;

		let renamed = sessions.rename(&session.id, "Bob").await.unwrap();
		assert_eq!(renamed.name, "Bob");

		let posts = TPostRepository::list_by_author(&store, &session.id).await.unwrap();
		let comments = TCommentRepository::list_by_author(&store, &session.id).await.unwrap();
		assert_eq!(posts.len(), 2);
		assert_eq!(comments.len(), 3);
		assert!(posts.iter().all(|post| post.author_name == "Bob"));
		assert!(comments.iter().all(|comment| comment.author_name == "Bob"));
	}

	#[tokio::test]
	async fn test_failed_post_cascade_keeps_only_the_session_renamed() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;
		let session = sessions.create_session("Alice").await.unwrap();
		author_content(&store, &session.id).await;
		store
			.inject(Faults {
				fail_post_rename: true,
				..Default::default()
			})
			.await;

		let err = sessions.rename(&session.id, "Bob").await.unwrap_err();
		assert!(matches!(err, ServiceError::PartialCascade(_)));

		let posts = TPostRepository::list_by_author(&store, &session.id).await.unwrap();
		let comments = TCommentRepository::list_by_author(&store, &session.id).await.unwrap();
		assert_eq!(posts.len(), 2);
		assert_eq!(comments.len(), 3);
		assert!(posts.iter().all(|post| post.author_name == "Alice"));
		assert!(comments.iter().all(|comment| comment.author_name == "Alice"));
		assert_eq!(sessions.lookup(&session.id).await.unwrap().name, "Bob");
	}

	#[tokio::test]
	async fn test_failed_comment_cascade_keeps_renamed_posts() {
		let store = InMemoryStore::new();
		let blobs = InMemoryBlobStore::new("/images");
		let sessions = directory(&store, &blobs, true).await;
		let session = sessions.create_session("Alice").await.unwrap();
		author_content(&store, &session.id).await;
		store
			.inject(Faults {
				fail_comment_rename: true,
				..Default::default()
			})
			.await;

		let err = sessions.rename(&session.id, "Bob").await.unwrap_err();
		assert!(matches!(err, ServiceError::PartialCascade(_)));

		let posts = TPostRepository::list_by_author(&store, &session.id).await.unwrap();
		let comments = TCommentRepository::list_by_author(&store, &session.id).await.unwrap();
		assert!(posts.iter().all(|post| post.author_name == "Bob"));
		assert!(comments.iter().all(|comment| comment.author_name == "Alice"));
		assert_eq!(sessions.lookup(&session.id).await.unwrap().name, "Bob");
	}
}
