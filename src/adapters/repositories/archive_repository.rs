use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;

use crate::{
	database::DatabaseExecutor,
	domain::{
		archive::{Archive, ArchivedComment},
		post::Post,
	},
	services::response::ServiceError,
};

use super::{post_repository::COMMENT_COLUMNS, ArchiveStep, SqlRepository, TArchiveRepository};

#[derive(sqlx::FromRow)]
struct ArchiveRow {
	id: i64,
	title: String,
	content: String,
	author_id: String,
	author_name: String,
	image_url: Option<String>,
	created_at: DateTime<Utc>,
	expires_at: DateTime<Utc>,
	archived_at: DateTime<Utc>,
}

const ARCHIVE_COLUMNS: &str = "id, title, content, author_id, author_name, image_url, created_at, expires_at, archived_at";

impl SqlRepository {
	async fn run_archive_steps(
		executor: &mut DatabaseExecutor,
		archive: &Archive,
	) -> Result<(), ServiceError> {
		let step = ArchiveStep::InsertArchivedPost;
		sqlx::query(
			"INSERT INTO archived_posts (id, title, content, author_id, author_name, image_url, created_at, expires_at, archived_at)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
		)
		.bind(archive.id)
		.bind(&archive.title)
		.bind(&archive.content)
		.bind(&archive.author_id)
		.bind(&archive.author_name)
		.bind(&archive.image_url)
		.bind(archive.created_at)
		.bind(archive.expires_at)
		.bind(archive.archived_at)
		.execute(&mut **executor.transaction()?)
		.await
		.map_err(|err| step.fail(err))?;

		let step = ArchiveStep::InsertArchivedComments;
		for comment in &archive.comments {
			sqlx::query(&format!("INSERT INTO archived_comments ({COMMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"))
				.bind(comment.id)
				.bind(comment.post_id)
				.bind(&comment.title)
				.bind(&comment.content)
				.bind(&comment.author_id)
				.bind(&comment.author_name)
				.bind(&comment.image_url)
				.bind(comment.reply_to_comment_id)
				.bind(comment.created_at)
				.execute(&mut **executor.transaction()?)
				.await
				.map_err(|err| step.fail(err))?;
		}

		let step = ArchiveStep::DeleteLiveComments;
		let deleted = sqlx::query("DELETE FROM comments WHERE post_id = $1")
			.bind(archive.id)
			.execute(&mut **executor.transaction()?)
			.await
			.map_err(|err| step.fail(err))?;
		if deleted.rows_affected() != archive.comments.len() as u64 {
			// a comment landed after the post was loaded; retrying picks it up
			return Err(step.fail(format!(
				"expected {} live comments, found {}",
				archive.comments.len(),
				deleted.rows_affected()
			)));
		}

		let step = ArchiveStep::DeleteLivePost;
		let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
			.bind(archive.id)
			.execute(&mut **executor.transaction()?)
			.await
			.map_err(|err| step.fail(err))?;
		if deleted.rows_affected() == 0 {
			return Err(ServiceError::not_found(format!("post {}", archive.id)));
		}
		Ok(())
	}

	async fn archived_comments(
		&self,
		ids: &[i64],
	) -> Result<HashMap<i64, Vec<ArchivedComment>>, ServiceError> {
		let mut by_post: HashMap<i64, Vec<ArchivedComment>> = HashMap::new();
		let sql = format!("SELECT {COMMENT_COLUMNS} FROM archived_comments WHERE post_id = ANY($1) ORDER BY id");
		let mut stream = sqlx::query_as::<_, ArchivedComment>(&sql).bind(ids).fetch(&self.pool);
		while let Some(comment) = stream.try_next().await? {
			by_post.entry(comment.post_id).or_default().push(comment);
		}
		Ok(by_post)
	}
}

#[async_trait]
impl TArchiveRepository for SqlRepository {
	async fn archive(
		&self,
		post: &Post,
		archived_at: DateTime<Utc>,
	) -> Result<Archive, ServiceError> {
		let archive = Archive::from_post(post.clone(), archived_at);

		let mut executor = DatabaseExecutor::new(self.pool.clone());
		executor.begin().await?;

		match Self::run_archive_steps(&mut executor, &archive).await {
			Ok(()) => {
				executor.commit().await?;
				Ok(archive)
			}
			Err(err) => {
				if let Err(rollback_err) = executor.rollback().await {
					// the transaction is dropped uncommitted either way
					tracing::error!(post_id = archive.id, "rollback failed: {}", rollback_err);
				}
				Err(err)
			}
		}
	}

	async fn list(&self) -> Result<Vec<Archive>, ServiceError> {
		let rows = sqlx::query_as::<_, ArchiveRow>(&format!(
			"SELECT {ARCHIVE_COLUMNS} FROM archived_posts ORDER BY archived_at DESC, id DESC"
		))
		.fetch(&self.pool)
		.try_collect::<Vec<_>>()
		.await?;

		let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
		let mut comments = if ids.is_empty() { HashMap::new() } else { self.archived_comments(&ids).await? };

		Ok(rows
			.into_iter()
			.map(|row| {
				let comments = comments.remove(&row.id).unwrap_or_default();
				row.into_archive(comments)
			})
			.collect())
	}

	async fn get(
		&self,
		id: i64,
	) -> Result<Archive, ServiceError> {
		let row = sqlx::query_as::<_, ArchiveRow>(&format!("SELECT {ARCHIVE_COLUMNS} FROM archived_posts WHERE id = $1"))
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| ServiceError::not_found(format!("archived post {id}")))?;

		let comments = self.archived_comments(&[id]).await?.remove(&id).unwrap_or_default();
		Ok(row.into_archive(comments))
	}
}

impl ArchiveRow {
	fn into_archive(
		self,
		comments: Vec<ArchivedComment>,
	) -> Archive {
		Archive {
			id: self.id,
			title: self.title,
			content: self.content,
			author_id: self.author_id,
			author_name: self.author_name,
			image_url: self.image_url,
			comments,
			created_at: self.created_at,
			expires_at: self.expires_at,
			archived_at: self.archived_at,
		}
	}
}

#[cfg(test)]
mod test {
	use chrono::Utc;

	use crate::{
		adapters::repositories::{
			post_repository::test::{repository, seed_comment, seed_post},
			SqlRepository, TArchiveRepository, TCommentRepository, TPostRepository,
		},
		services::response::ServiceError,
	};

	async fn assert_still_live(
		repository: &SqlRepository,
		post_id: i64,
		comments: usize,
	) {
		assert_eq!(TPostRepository::get(repository, post_id).await.unwrap().comments.len(), comments);
		assert!(TArchiveRepository::get(repository, post_id).await.unwrap_err().is_not_found());
		let archived: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM archived_comments WHERE post_id = $1")
			.bind(post_id)
			.fetch_one(&repository.pool)
			.await
			.unwrap();
		assert_eq!(archived, 0);
	}

	#[tokio::test]
	#[ignore = "needs DATABASE_URL"]
	async fn test_archive_moves_a_reply_chain() {
		let repository = repository().await;
		let post = seed_post(&repository).await;
		let parent = seed_comment(&repository, post.id, None).await;
		let reply = seed_comment(&repository, post.id, Some(parent.id)).await;
		let nested = seed_comment(&repository, post.id, Some(reply.id)).await;

		let live = TPostRepository::get(&repository, post.id).await.unwrap();
		let archive = repository.archive(&live, Utc::now()).await.unwrap();
		assert_eq!(archive.comments.len(), 3);

		assert!(TPostRepository::get(&repository, post.id).await.unwrap_err().is_not_found());
		assert!(repository.list_by_post(post.id).await.unwrap().is_empty());

		let stored = TArchiveRepository::get(&repository, post.id).await.unwrap();
		let links: Vec<(i64, Option<i64>)> = stored.comments.iter().map(|comment| (comment.id, comment.reply_to_comment_id)).collect();
		assert_eq!(links, vec![(parent.id, None), (reply.id, Some(parent.id)), (nested.id, Some(reply.id))]);
		assert!(TArchiveRepository::list(&repository).await.unwrap().iter().any(|archive| archive.id == post.id));
	}

	#[tokio::test]
	#[ignore = "needs DATABASE_URL"]
	async fn test_failed_comment_insert_rolls_back_the_archived_post() {
		let repository = repository().await;
		let post = seed_post(&repository).await;
		let comment = seed_comment(&repository, post.id, None).await;

		// an archived row already holding the comment's id makes the second step fail;
		// live ids are positive, so the negated post id cannot collide with a real thread
		let squatter = -post.id;
		let now = Utc::now();
		sqlx::query(
			"INSERT INTO archived_posts (id, title, content, author_id, author_name, created_at, expires_at, archived_at)
			VALUES ($1, 'T', 'C', 'a', 'A', $2, $2, $2)",
		)
		.bind(squatter)
		.bind(now)
		.execute(&repository.pool)
		.await
		.unwrap();
		sqlx::query(
			"INSERT INTO archived_comments (id, post_id, content, author_id, author_name, created_at) VALUES ($1, $2, 'c', 'a', 'A', $3)",
		)
		.bind(comment.id)
		.bind(squatter)
		.bind(now)
		.execute(&repository.pool)
		.await
		.unwrap();

		let live = TPostRepository::get(&repository, post.id).await.unwrap();
		let err = repository.archive(&live, now).await.unwrap_err();
		assert!(matches!(err, ServiceError::TransactionError { step: "insert_archived_comments", .. }));
		assert_still_live(&repository, post.id, 1).await;

		sqlx::query("DELETE FROM archived_comments WHERE post_id = $1").bind(squatter).execute(&repository.pool).await.unwrap();
		sqlx::query("DELETE FROM archived_posts WHERE id = $1").bind(squatter).execute(&repository.pool).await.unwrap();

		// nothing half-applied is left in the way of a retry
		repository.archive(&live, Utc::now()).await.unwrap();
		assert!(TPostRepository::get(&repository, post.id).await.unwrap_err().is_not_found());
	}

	#[tokio::test]
	#[ignore = "needs DATABASE_URL"]
	async fn test_comment_after_load_aborts_the_archive() {
		let repository = repository().await;
		let post = seed_post(&repository).await;
		seed_comment(&repository, post.id, None).await;

		let stale = TPostRepository::get(&repository, post.id).await.unwrap();
		seed_comment(&repository, post.id, None).await;

		let err = repository.archive(&stale, Utc::now()).await.unwrap_err();
		assert!(matches!(err, ServiceError::TransactionError { step: "delete_live_comments", .. }));
		assert_still_live(&repository, post.id, 2).await;
	}
}
