use std::{sync::Arc, time::Duration};

use tokio::{
	sync::oneshot,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};

use crate::{
	adapters::repositories::TPostRepository,
	common::clock::Clock,
	domain::post::PostLifecycle,
	services::{
		archive::{ArchiveService, SweepReport},
		response::ServiceError,
	},
};

/// Applies the lifecycle policy to every live post, once per tick.
pub struct LifecycleReconciler {
	posts: Arc<dyn TPostRepository>,
	archive: ArchiveService,
	clock: Arc<dyn Clock>,
	interval: Duration,
	archive_expired: bool,
}

impl LifecycleReconciler {
	pub fn new(
		posts: Arc<dyn TPostRepository>,
		archive: ArchiveService,
		clock: Arc<dyn Clock>,
		interval: Duration,
	) -> Self {
		Self {
			posts,
			archive,
			clock,
			interval,
			archive_expired: false,
		}
	}

	/// Also archive posts past `expires_at` that no deletion rule claims.
	pub fn archive_expired(
		mut self,
		enabled: bool,
	) -> Self {
		self.archive_expired = enabled;
		self
	}

	/// One pass over the live posts. Only listing the posts can fail the tick;
	/// per-post failures end up in the report.
	pub async fn tick(&self) -> Result<SweepReport, ServiceError> {
		let now = self.clock.now();
		let mut report = SweepReport::default();

		for post in self.posts.list().await? {
			match PostLifecycle::decide(&post, now, self.archive_expired) {
				PostLifecycle::Keep => {}
				decision @ (PostLifecycle::DeleteIdle | PostLifecycle::DeleteStale) => {
					match self.posts.delete_if_unchanged(post.id, post.comments.len()).await {
						Ok(true) => {
							tracing::info!(post_id = post.id, ?decision, "expired post deleted");
							report.deleted.push(post.id);
						}
						Ok(false) => tracing::debug!(post_id = post.id, "post gained a comment since listing, kept"),
						Err(err) if err.is_not_found() => {}
						Err(err) => report.record_failure(post.id, &err),
					}
				}
				PostLifecycle::Archive => match self.archive.archive_post(&post).await {
					Ok(archive) => report.archived.push(archive.id),
					Err(err) if err.is_not_found() => {}
					Err(err) => report.record_failure(post.id, &err),
				},
			}
		}
		Ok(report)
	}

	/// Starts the periodic loop. The first tick runs immediately.
	pub fn spawn(self: Arc<Self>) -> ReconcilerHandle {
		let (shutdown, mut stop) = oneshot::channel::<()>();
		let join = tokio::spawn(async move {
			let mut ticker = time::interval(self.interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
			tracing::info!(interval_secs = self.interval.as_secs(), archive_expired = self.archive_expired, "lifecycle reconciler started");

			loop {
				tokio::select! {
					_ = &mut stop => break,
					_ = ticker.tick() => match self.tick().await {
						Ok(report) if report.is_empty() => {}
						Ok(report) => tracing::info!(
							archived = report.archived.len(),
							deleted = report.deleted.len(),
							failed = report.failed.len(),
							"reconciler tick"
						),
						Err(err) => tracing::error!("reconciler tick failed: {}", err),
					},
				}
			}
			tracing::info!("lifecycle reconciler stopped");
		});

		ReconcilerHandle { shutdown, join }
	}
}

/// Owner of the running reconciler task.
pub struct ReconcilerHandle {
	shutdown: oneshot::Sender<()>,
	join: JoinHandle<()>,
}

impl ReconcilerHandle {
	/// Stops the loop after the tick in progress, if any, and waits for it.
	pub async fn shutdown(self) {
		let _ = self.shutdown.send(());
		if let Err(err) = self.join.await {
			tracing::error!("reconciler task ended abnormally: {}", err);
		}
	}
}
