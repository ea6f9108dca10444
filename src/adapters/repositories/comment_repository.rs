use async_trait::async_trait;

use crate::{domain::comment::Comment, services::response::ServiceError};

use super::{post_repository::COMMENT_COLUMNS, SqlRepository, TCommentRepository};

#[async_trait]
impl TCommentRepository for SqlRepository {
	async fn add(
		&self,
		mut comment: Comment,
	) -> Result<Comment, ServiceError> {
		let id: i64 = sqlx::query_scalar(
			"INSERT INTO comments (post_id, title, content, author_id, author_name, image_url, reply_to_comment_id, created_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
			RETURNING id",
		)
		.bind(comment.post_id)
		.bind(&comment.title)
		.bind(&comment.content)
		.bind(&comment.author_id)
		.bind(&comment.author_name)
		.bind(&comment.image_url)
		.bind(comment.reply_to_comment_id)
		.bind(comment.created_at)
		.fetch_one(&self.pool)
		.await?;

		comment.id = id;
		Ok(comment)
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Comment, ServiceError> {
		sqlx::query_as::<_, Comment>(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| ServiceError::not_found(format!("comment {id}")))
	}

	async fn list_by_post(
		&self,
		post_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		Ok(sqlx::query_as::<_, Comment>(&format!(
			"SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at, id"
		))
		.bind(post_id)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn list_replies(
		&self,
		comment_id: i64,
	) -> Result<Vec<Comment>, ServiceError> {
		Ok(sqlx::query_as::<_, Comment>(&format!(
			"SELECT {COMMENT_COLUMNS} FROM comments WHERE reply_to_comment_id = $1 ORDER BY created_at, id"
		))
		.bind(comment_id)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn list_by_author(
		&self,
		author_id: &str,
	) -> Result<Vec<Comment>, ServiceError> {
		Ok(sqlx::query_as::<_, Comment>(&format!(
			"SELECT {COMMENT_COLUMNS} FROM comments WHERE author_id = $1 ORDER BY created_at, id"
		))
		.bind(author_id)
		.fetch_all(&self.pool)
		.await?)
	}

	async fn rename_author(
		&self,
		author_id: &str,
		author_name: &str,
	) -> Result<u64, ServiceError> {
		let result = sqlx::query("UPDATE comments SET author_name = $2 WHERE author_id = $1")
			.bind(author_id)
			.bind(author_name)
			.execute(&self.pool)
			.await?;
		Ok(result.rows_affected())
	}
}
