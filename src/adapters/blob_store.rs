use std::{collections::HashMap, fmt::Display, path::PathBuf, str::FromStr, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::response::ServiceError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Bucket {
	Avatars,
	Posts,
	Comments,
}

impl Bucket {
	pub fn as_str(&self) -> &'static str {
		match self {
			Bucket::Avatars => "avatars",
			Bucket::Posts => "posts",
			Bucket::Comments => "comments",
		}
	}
}

impl Display for Bucket {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Bucket {
	type Err = ServiceError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"avatars" => Ok(Bucket::Avatars),
			"posts" => Ok(Bucket::Posts),
			"comments" => Ok(Bucket::Comments),
			other => Err(ServiceError::not_found(format!("bucket {other}"))),
		}
	}
}

/// Time-based object key with a random suffix, keeping the extension implied by the content type.
pub fn object_key(
	now: DateTime<Utc>,
	content_type: &str,
) -> String {
	let extension = match content_type {
		"image/png" => "png",
		"image/gif" => "gif",
		"image/webp" => "webp",
		"image/jpeg" | "image/jpg" => "jpg",
		_ => "bin",
	};
	let suffix = Uuid::new_v4().simple().to_string();
	format!("{}-{}.{}", now.format("%Y%m%d%H%M%S%6f"), &suffix[..8], extension)
}

fn validate_key(key: &str) -> Result<(), ServiceError> {
	let well_formed = !key.is_empty()
		&& !key.starts_with('.')
		&& key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
	if well_formed {
		Ok(())
	} else {
		Err(ServiceError::validation(format!("malformed object key `{key}`")))
	}
}

#[async_trait]
pub trait TBlobStore: Send + Sync {
	/// Stores the object and returns the URL it is served under.
	async fn put(
		&self,
		bucket: Bucket,
		key: &str,
		bytes: Bytes,
		content_type: &str,
	) -> Result<String, ServiceError>;

	/// Returns the object bytes and their content type.
	async fn get(
		&self,
		bucket: Bucket,
		key: &str,
	) -> Result<(Bytes, String), ServiceError>;
}

fn public_url(
	base: &str,
	bucket: Bucket,
	key: &str,
) -> String {
	format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
}

/// Keeps objects under `root/<bucket>/<key>` with the content type in a `<key>.type` sidecar.
pub struct LocalBlobStore {
	root: PathBuf,
	public_base: String,
}

impl LocalBlobStore {
	pub fn new(
		root: impl Into<PathBuf>,
		public_base: impl Into<String>,
	) -> Self {
		Self {
			root: root.into(),
			public_base: public_base.into(),
		}
	}

	fn paths(
		&self,
		bucket: Bucket,
		key: &str,
	) -> (PathBuf, PathBuf) {
		let dir = self.root.join(bucket.as_str());
		(dir.join(key), dir.join(format!("{key}.type")))
	}
}

#[async_trait]
impl TBlobStore for LocalBlobStore {
	async fn put(
		&self,
		bucket: Bucket,
		key: &str,
		bytes: Bytes,
		content_type: &str,
	) -> Result<String, ServiceError> {
		validate_key(key)?;
		let (object, sidecar) = self.paths(bucket, key);
		if let Some(dir) = object.parent() {
			tokio::fs::create_dir_all(dir)
				.await
				.map_err(|err| ServiceError::BlobStoreError(format!("cannot create {}: {err}", dir.display())))?;
		}
		tokio::fs::write(&object, &bytes)
			.await
			.map_err(|err| ServiceError::BlobStoreError(format!("cannot write {bucket}/{key}: {err}")))?;
		tokio::fs::write(&sidecar, content_type.as_bytes())
			.await
			.map_err(|err| ServiceError::BlobStoreError(format!("cannot write {bucket}/{key} metadata: {err}")))?;

		Ok(public_url(&self.public_base, bucket, key))
	}

	async fn get(
		&self,
		bucket: Bucket,
		key: &str,
	) -> Result<(Bytes, String), ServiceError> {
		validate_key(key)?;
		let (object, sidecar) = self.paths(bucket, key);
		let bytes = match tokio::fs::read(&object).await {
			Ok(bytes) => bytes,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				return Err(ServiceError::not_found(format!("object {bucket}/{key}")));
			}
			Err(err) => return Err(ServiceError::BlobStoreError(format!("cannot read {bucket}/{key}: {err}"))),
		};
		let content_type = tokio::fs::read_to_string(&sidecar).await.unwrap_or_else(|_| "application/octet-stream".to_string());

		Ok((Bytes::from(bytes), content_type))
	}
}

#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
	objects: Arc<RwLock<HashMap<(Bucket, String), (Bytes, String)>>>,
	public_base: String,
}

impl InMemoryBlobStore {
	pub fn new(public_base: impl Into<String>) -> Self {
		Self {
			objects: Default::default(),
			public_base: public_base.into(),
		}
	}

	#[cfg(test)]
	pub(crate) async fn count(
		&self,
		bucket: Bucket,
	) -> usize {
		self.objects.read().await.keys().filter(|(stored, _)| *stored == bucket).count()
	}
}

#[async_trait]
impl TBlobStore for InMemoryBlobStore {
	async fn put(
		&self,
		bucket: Bucket,
		key: &str,
		bytes: Bytes,
		content_type: &str,
	) -> Result<String, ServiceError> {
		validate_key(key)?;
		self.objects.write().await.insert((bucket, key.to_string()), (bytes, content_type.to_string()));
		Ok(public_url(&self.public_base, bucket, key))
	}

	async fn get(
		&self,
		bucket: Bucket,
		key: &str,
	) -> Result<(Bytes, String), ServiceError> {
		self.objects
			.read()
			.await
			.get(&(bucket, key.to_string()))
			.cloned()
			.ok_or_else(|| ServiceError::not_found(format!("object {bucket}/{key}")))
	}
}
