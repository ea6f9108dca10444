use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;

use crate::{
	database::DatabaseExecutor,
	domain::{comment::Comment, post::Post},
	services::response::ServiceError,
};

use super::{SqlRepository, TPostRepository};

#[derive(sqlx::FromRow)]
struct PostRow {
	id: i64,
	title: String,
	content: String,
	author_id: String,
	author_name: String,
	image_url: Option<String>,
	created_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
}

impl PostRow {
	fn into_post(
		self,
		comments: Vec<Comment>,
	) -> Post {
		Post {
			id: self.id,
			title: self.title,
			content: self.content,
			author_id: self.author_id,
			author_name: self.author_name,
			image_url: self.image_url,
			comments,
			created_at: self.created_at,
			expires_at: self.expires_at,
		}
	}
}

const POST_COLUMNS: &str = "id, title, content, author_id, author_name, image_url, created_at, expires_at";
pub(super) const COMMENT_COLUMNS: &str = "id, post_id, title, content, author_id, author_name, image_url, reply_to_comment_id, created_at";

impl SqlRepository {
	/// Attaches comments to a batch of post rows with a single query.
	async fn hydrate(
		&self,
		rows: Vec<PostRow>,
	) -> Result<Vec<Post>, ServiceError> {
		if rows.is_empty() {
			return Ok(Vec::new());
		}
		let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
		let mut by_post: HashMap<i64, Vec<Comment>> = HashMap::new();

		let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ANY($1) ORDER BY created_at, id");
		let mut stream = sqlx::query_as::<_, Comment>(&sql).bind(&ids[..]).fetch(&self.pool);
		while let Some(comment) = stream.try_next().await? {
			by_post.entry(comment.post_id).or_default().push(comment);
		}

		Ok(rows
			.into_iter()
			.map(|row| {
				let comments = by_post.remove(&row.id).unwrap_or_default();
				row.into_post(comments)
			})
			.collect())
	}
}

#[async_trait]
impl TPostRepository for SqlRepository {
	async fn add(
		&self,
		mut post: Post,
	) -> Result<Post, ServiceError> {
		let id: i64 = sqlx::query_scalar(
			"INSERT INTO posts (title, content, author_id, author_name, image_url, created_at, expires_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7)
			RETURNING id",
		)
		.bind(&post.title)
		.bind(&post.content)
		.bind(&post.author_id)
		.bind(&post.author_name)
		.bind(&post.image_url)
		.bind(post.created_at)
		.bind(post.expires_at)
		.fetch_one(&self.pool)
		.await?;

		post.id = id;
		Ok(post)
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Post, ServiceError> {
		let row = sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| ServiceError::not_found(format!("post {id}")))?;

		self.hydrate(vec![row]).await?.pop().ok_or_else(|| ServiceError::not_found(format!("post {id}")))
	}

	async fn list(&self) -> Result<Vec<Post>, ServiceError> {
		let rows = sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY created_at DESC, id DESC"))
			.fetch(&self.pool)
			.try_collect::<Vec<_>>()
			.await?;
		self.hydrate(rows).await
	}

	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Post>, ServiceError> {
		let rows = sqlx::query_as::<_, PostRow>(&format!(
			"SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY created_at DESC, id DESC"
		))
		.bind(author_id)
		.fetch(&self.pool)
		.try_collect::<Vec<_>>()
		.await?;
		self.hydrate(rows).await
	}

	async fn extend_expiration(
		&self,
		id: i64,
		expires_at: DateTime<Utc>,
	) -> Result<DateTime<Utc>, ServiceError> {
		sqlx::query_scalar::<_, DateTime<Utc>>("UPDATE posts SET expires_at = GREATEST(expires_at, $2) WHERE id = $1 RETURNING expires_at")
			.bind(id)
			.bind(expires_at)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| ServiceError::not_found(format!("post {id}")))
	}

	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError> {
		let result = sqlx::query("UPDATE posts SET author_name = $2 WHERE author_id = $1")
			.bind(author_id)
			.bind(author_name)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}

	async fn delete(
		&self,
		id: i64,
	) -> Result<(), ServiceError> {
		sqlx::query("DELETE FROM comments WHERE post_id = $1").bind(id).execute(&self.pool).await?;

		let result = sqlx::query("DELETE FROM posts WHERE id = $1")
			.bind(id)
			.execute(&self.pool)
			.await
			.map_err(|err| ServiceError::PartialCascade(format!("comments of post {id} deleted but the post was not: {err}")))?;

		if result.rows_affected() == 0 {
			return Err(ServiceError::not_found(format!("post {id}")));
		}
		Ok(())
	}

	async fn delete_if_unchanged(
		&self,
		id: i64,
		comment_count: usize,
	) -> Result<bool, ServiceError> {
		let mut executor = DatabaseExecutor::new(self.pool.clone());
		executor.begin().await?;

		match Self::delete_unchanged(&mut executor, id, comment_count).await {
			Ok(true) => {
				executor.commit().await?;
				Ok(true)
			}
			outcome => {
				if let Err(err) = executor.rollback().await {
					tracing::error!(post_id = id, "rollback failed: {}", err);
				}
				outcome
			}
		}
	}
}

impl SqlRepository {
	async fn delete_unchanged(
		executor: &mut DatabaseExecutor,
		id: i64,
		comment_count: usize,
	) -> Result<bool, ServiceError> {
		// the row lock conflicts with the key-share lock a comment insert takes on its post
		sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
			.bind(id)
			.fetch_optional(&mut **executor.transaction()?)
			.await?
			.ok_or_else(|| ServiceError::not_found(format!("post {id}")))?;

		let live: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = $1")
			.bind(id)
			.fetch_one(&mut **executor.transaction()?)
			.await?;
		if live != comment_count as i64 {
			return Ok(false);
		}

		sqlx::query("DELETE FROM comments WHERE post_id = $1")
			.bind(id)
			.execute(&mut **executor.transaction()?)
			.await?;
		sqlx::query("DELETE FROM posts WHERE id = $1")
			.bind(id)
			.execute(&mut **executor.transaction()?)
			.await?;
		Ok(true)
	}
}
