use std::sync::Arc;

use axum::http::HeaderValue;

use crate::{
	adapters::{
		blob_store::{LocalBlobStore, TBlobStore},
		character_source::{CharacterCatalogClient, TCharacterSource},
		repositories::{InMemoryStore, SqlRepository, TArchiveRepository, TCommentRepository, TPostRepository},
	},
	common::clock::{Clock, SystemClock},
	config::{Config, StorageBackend},
	database::{connection_pool, migrate},
	routes::{AppState, HttpSettings},
	services::{
		archive::ArchiveService,
		avatars::{AvatarAssigner, CharacterPool},
		comments::CommentService,
		posts::PostService,
		reconciler::LifecycleReconciler,
		response::ServiceError,
		sessions::SessionDirectory,
	},
};

/// Everything the web binary runs.
pub struct Dependency {
	pub state: AppState,
	pub http: HttpSettings,
	pub reconciler: Arc<LifecycleReconciler>,
}

struct Repositories {
	posts: Arc<dyn TPostRepository>,
	comments: Arc<dyn TCommentRepository>,
	archives: Arc<dyn TArchiveRepository>,
}

async fn repositories(config: &Config) -> Result<Repositories, ServiceError> {
	match config.storage_backend {
		StorageBackend::Postgres => {
			let url = config
				.database_url
				.as_deref()
				.ok_or_else(|| ServiceError::ConfigError("DATABASE_URL must be set for the postgres backend".into()))?;
			let pool = connection_pool(url, config.database_max_connections).await?;
			migrate(&pool).await?;
			tracing::info!("connected to postgres");
			let repository = SqlRepository::new(pool);
			Ok(Repositories {
				posts: Arc::new(repository.clone()),
				comments: Arc::new(repository.clone()),
				archives: Arc::new(repository),
			})
		}
		StorageBackend::Memory => {
			tracing::warn!("using in-memory storage; posts are lost on restart");
			let store = InMemoryStore::new();
			Ok(Repositories {
				posts: Arc::new(store.clone()),
				comments: Arc::new(store.clone()),
				archives: Arc::new(store),
			})
		}
	}
}

pub fn allow_origins(raw: &str) -> Result<Vec<HeaderValue>, ServiceError> {
	raw.split(',')
		.map(str::trim)
		.filter(|origin| !origin.is_empty())
		.map(|origin| HeaderValue::from_str(origin).map_err(|err| ServiceError::ConfigError(format!("ALLOW_ORIGINS `{origin}`: {err}"))))
		.collect()
}

impl Dependency {
	/// Connects storage and loads the avatar catalog. A catalog that cannot be
	/// loaded is fatal: sessions cannot be created without it.
	pub async fn new(config: &Config) -> Result<Self, ServiceError> {
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);
		let repositories = repositories(config).await?;
		let blob_store: Arc<dyn TBlobStore> = Arc::new(LocalBlobStore::new(&config.blob_root, &config.public_image_base));

		let character_source: Arc<dyn TCharacterSource> =
			Arc::new(CharacterCatalogClient::new(&config.character_source_url, config.external_fetch_timeout)?);
		let pool = CharacterPool::load(character_source.as_ref()).await?;

		let posts = PostService::new(repositories.posts.clone(), clock.clone());
		let comments = CommentService::new(repositories.comments.clone(), repositories.posts.clone(), clock.clone());
		let archive = ArchiveService::new(repositories.archives.clone(), repositories.posts.clone(), clock.clone());
		let sessions = SessionDirectory::new(
			AvatarAssigner::new(pool),
			character_source,
			blob_store.clone(),
			repositories.posts.clone(),
			repositories.comments.clone(),
			clock.clone(),
		);

		let reconciler = LifecycleReconciler::new(repositories.posts.clone(), archive.clone(), clock.clone(), config.reconciler_interval)
			.archive_expired(config.reconciler_archive_expired);

		Ok(Dependency {
			state: AppState {
				posts,
				comments,
				archive,
				sessions: Arc::new(sessions),
				blob_store,
				clock,
			},
			http: HttpSettings {
				allow_origins: allow_origins(&config.allow_origins)?,
				request_timeout: config.request_timeout,
			},
			reconciler: Arc::new(reconciler),
		})
	}
}

#[cfg(test)]
mod test {
	use super::allow_origins;

	#[test]
	fn test_allow_origins_are_split_and_trimmed() {
		let origins = allow_origins("http://localhost:3000, http://localhost:3001,").unwrap();
		assert_eq!(origins, vec!["http://localhost:3000", "http://localhost:3001"]);
		assert!(allow_origins("http://bad\norigin").is_err());
	}
}
