use std::{mem, time::Duration};

use sqlx::postgres::PgPoolOptions;
use sqlx::{postgres::PgPool, Postgres, Transaction};

use crate::services::response::ServiceError;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_BACKOFF: Duration = Duration::from_secs(2);

/// Holds at most one open transaction on top of the shared pool.
///
/// Dropping an executor with an open transaction rolls it back, which is what
/// makes a cancelled request leave no half-applied writes behind.
pub struct DatabaseExecutor {
	pool: PgPool,
	transaction: Option<Transaction<'static, Postgres>>,
}

impl DatabaseExecutor {
	pub fn new(pool: PgPool) -> Self {
		Self { pool, transaction: None }
	}

	pub fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>, ServiceError> {
		self.transaction
			.as_mut()
			.ok_or_else(|| ServiceError::DatabaseError("transaction has not begun".into()))
	}

	pub(crate) async fn begin(&mut self) -> Result<(), ServiceError> {
		match self.transaction.as_mut() {
			None => {
				self.transaction = Some(self.pool.begin().await?);
				Ok(())
			}
			Some(_trx) => {
				tracing::warn!("transaction begun already");
				Err(ServiceError::DatabaseError("transaction begun already".into()))
			}
		}
	}

	pub(crate) async fn commit(&mut self) -> Result<(), ServiceError> {
		let trx = mem::take(&mut self.transaction).ok_or_else(|| ServiceError::DatabaseError("transaction has not begun".into()))?;
		trx.commit().await.map_err(|err| {
			tracing::error!("error occurred during commit operation: {:?}", err);
			ServiceError::from(err)
		})
	}

	pub(crate) async fn rollback(&mut self) -> Result<(), ServiceError> {
		let trx = mem::take(&mut self.transaction).ok_or_else(|| ServiceError::DatabaseError("transaction has not begun".into()))?;
		trx.rollback().await.map_err(ServiceError::from)
	}
}

/// Connects with a few retries so the service can start alongside its database.
pub async fn connection_pool(
	url: &str,
	max_connections: u32,
) -> Result<PgPool, ServiceError> {
	let mut attempt = 1;
	loop {
		match PgPoolOptions::new().max_connections(max_connections).connect(url).await {
			Ok(pool) => return Ok(pool),
			Err(err) if attempt < CONNECT_ATTEMPTS => {
				tracing::warn!(attempt, "waiting for database to be ready: {}", err);
				attempt += 1;
				tokio::time::sleep(CONNECT_BACKOFF).await;
			}
			Err(err) => return Err(err.into()),
		}
	}
}

pub async fn migrate(pool: &PgPool) -> Result<(), ServiceError> {
	sqlx::migrate!("./migrations").run(pool).await?;
	Ok(())
}

/// Pool for the tests that run against a real database. They are `#[ignore]`d;
/// run them with `DATABASE_URL` set and `cargo test -- --ignored`.
#[cfg(test)]
pub(crate) async fn test_pool() -> PgPool {
	dotenv::dotenv().ok();
	let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
	let pool = connection_pool(&url, 5).await.unwrap();
	migrate(&pool).await.unwrap();
	pool
}
