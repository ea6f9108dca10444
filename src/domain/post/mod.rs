pub mod entity;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub use self::entity::{Post, COMMENT_EXTENSION_MINUTES, POST_TTL_MINUTES};

/// A thread nobody answered is dropped this long after creation.
pub const IDLE_DELETE_AFTER_MINUTES: i64 = 10;
/// A thread with replies is dropped this long after its latest comment.
pub const STALE_DELETE_AFTER_MINUTES: i64 = 15;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostLifecycle {
	Keep,
	/// No comments and older than the idle window.
	DeleteIdle,
	/// Has comments, but the latest one is older than the stale window.
	DeleteStale,
	/// Past `expires_at` and not claimed by a deletion rule.
	Archive,
}

impl PostLifecycle {
	/// Deletion rules take precedence over archival. Archival by `expires_at` is
	/// only considered when `archive_expired` is set.
	pub fn decide(
		post: &Post,
		now: DateTime<Utc>,
		archive_expired: bool,
	) -> Self {
		match post.last_comment_at() {
			None if now - post.created_at > Duration::minutes(IDLE_DELETE_AFTER_MINUTES) => PostLifecycle::DeleteIdle,
			Some(last) if now - last > Duration::minutes(STALE_DELETE_AFTER_MINUTES) => PostLifecycle::DeleteStale,
			_ if archive_expired && post.is_expired(now) => PostLifecycle::Archive,
			_ => PostLifecycle::Keep,
		}
	}
}

#[cfg(test)]
mod test {
	use chrono::{DateTime, Duration, TimeZone, Utc};

	use super::{Post, PostLifecycle};
	use crate::domain::{commands::CreatePost, comment::Comment};

	fn t0() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
	}

	fn post() -> Post {
		Post::new(
			CreatePost {
				title: "T".into(),
				content: "C".into(),
				author_id: "sid".into(),
				author_name: "Rick".into(),
				image_url: None,
			},
			t0(),
		)
		.unwrap()
	}

	fn comment_at(at: DateTime<Utc>) -> Comment {
		Comment {
			id: 1,
			post_id: 1,
			title: String::new(),
			content: "reply".into(),
			author_id: "sid".into(),
			author_name: "Rick".into(),
			image_url: None,
			reply_to_comment_id: None,
			created_at: at,
		}
	}

	#[test]
	fn test_new_post_gets_ten_minute_ttl() {
		let post = post();
		assert_eq!(post.created_at, t0());
		assert_eq!(post.expires_at, t0() + Duration::minutes(10));
		assert!(post.comments.is_empty());
		assert!(post.image_url.is_none());
	}

	#[test]
	fn test_new_post_rejects_empty_title_or_content() {
		for (title, content) in [("", "C"), ("T", ""), ("   ", "C"), ("T", "\n")] {
			let result = Post::new(
				CreatePost {
					title: title.into(),
					content: content.into(),
					..Default::default()
				},
				t0(),
			);
			assert!(matches!(result, Err(crate::services::response::ServiceError::ValidationError(_))));
		}
	}

	#[test]
	fn test_extension_only_moves_forward_once() {
		let mut post = post();
		assert_eq!(post.extend_for_comment(), Some(t0() + Duration::minutes(15)));
		assert_eq!(post.extend_for_comment(), None);
		assert_eq!(post.expires_at, t0() + Duration::minutes(15));

		post.expires_at = t0() + Duration::minutes(30);
		assert_eq!(post.extend_for_comment(), None);
		assert_eq!(post.expires_at, t0() + Duration::minutes(30));
	}

	#[test]
	fn test_idle_post_is_deleted_after_ten_minutes() {
		let post = post();
		assert_eq!(PostLifecycle::decide(&post, t0() + Duration::minutes(10), true), PostLifecycle::Keep);
		assert_eq!(PostLifecycle::decide(&post, t0() + Duration::minutes(11), false), PostLifecycle::DeleteIdle);
		// deletion wins over archival even though the post is expired
		assert_eq!(PostLifecycle::decide(&post, t0() + Duration::minutes(11), true), PostLifecycle::DeleteIdle);
	}

	#[test]
	fn test_post_with_comments_is_deleted_fifteen_minutes_after_last_comment() {
		let mut post = post();
		post.comments.push(comment_at(t0() + Duration::minutes(2)));
		post.comments.push(comment_at(t0() + Duration::minutes(5)));
		post.extend_for_comment();

		assert_eq!(PostLifecycle::decide(&post, t0() + Duration::minutes(20), false), PostLifecycle::Keep);
		assert_eq!(PostLifecycle::decide(&post, t0() + Duration::minutes(21), false), PostLifecycle::DeleteStale);
	}

	#[test]
	fn test_expired_post_with_recent_comment_is_archived_only_when_enabled() {
		let mut post = post();
		post.comments.push(comment_at(t0() + Duration::minutes(14)));
		post.extend_for_comment();

		let now = t0() + Duration::minutes(16);
		assert_eq!(PostLifecycle::decide(&post, now, false), PostLifecycle::Keep);
		assert_eq!(PostLifecycle::decide(&post, now, true), PostLifecycle::Archive);
	}
}
