use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::response::ServiceError;

/// Advisory lifetime of a session; nothing purges expired sessions.
pub const SESSION_TTL_DAYS: i64 = 7;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Session {
	pub id: String,
	pub name: String,
	pub avatar_url: String,
	pub created_at: DateTime<Utc>,
	pub expires_at: DateTime<Utc>,
}

impl Session {
	pub fn new(
		id: String,
		name: String,
		avatar_url: String,
		now: DateTime<Utc>,
	) -> Result<Self, ServiceError> {
		if name.trim().is_empty() {
			return Err(ServiceError::validation("name cannot be empty"));
		}
		Ok(Session {
			id,
			name,
			avatar_url,
			created_at: now,
			expires_at: now + Duration::days(SESSION_TTL_DAYS),
		})
	}

	pub fn is_expired(
		&self,
		now: DateTime<Utc>,
	) -> bool {
		self.expires_at < now
	}
}

/// Time-based id with a random suffix, e.g. `1714554000123456-9f2c4e1a`.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
	let suffix = Uuid::new_v4().simple().to_string();
	format!("{}-{}", now.timestamp_micros(), &suffix[..8])
}

#[cfg(test)]
mod test {
	use chrono::{Duration, TimeZone, Utc};

	use super::{generate_session_id, Session};

	#[test]
	fn test_session_expires_after_seven_days() {
		let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
		let session = Session::new("id".into(), "Morty".into(), "/images/avatars/a".into(), now).unwrap();
		assert_eq!(session.expires_at, now + Duration::days(7));
		assert!(!session.is_expired(now + Duration::days(7)));
		assert!(session.is_expired(now + Duration::days(8)));
	}

	#[test]
	fn test_session_requires_a_name() {
		let now = Utc::now();
		assert!(Session::new("id".into(), " ".into(), String::new(), now).is_err());
	}

	#[test]
	fn test_session_ids_do_not_collide_within_the_same_instant() {
		let now = Utc::now();
		let ids: std::collections::HashSet<String> = (0..1000).map(|_| generate_session_id(now)).collect();
		assert_eq!(ids.len(), 1000);
		assert!(ids.iter().all(|id| id.starts_with(&now.timestamp_micros().to_string())));
	}
}
