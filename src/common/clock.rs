use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of "now" for every TTL decision.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Clock that only moves when told to.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self(Arc::new(Mutex::new(start)))
	}

	pub fn set(
		&self,
		at: DateTime<Utc>,
	) {
		let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		*guard = at;
	}

	pub fn advance(
		&self,
		by: Duration,
	) {
		let mut guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
		*guard += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Utc> {
		*self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}
