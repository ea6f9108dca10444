//! Avatar identities for new sessions.
//!
//! The pool is loaded once from the external catalog. Draws avoid handing out
//! the same image twice until the pool is used up, then start over.

use std::collections::HashSet;

use rand::Rng;
use tokio::sync::Mutex;

use crate::{adapters::character_source::TCharacterSource, domain::character::Character, services::response::ServiceError};

/// Draws per assignment before an already-assigned avatar is accepted.
pub const MAX_DRAW_ATTEMPTS: usize = 10;

/// Characters that carry an image, in catalog order. Never empty.
#[derive(Clone, Debug)]
pub struct CharacterPool(Vec<Character>);

impl CharacterPool {
	pub fn new(characters: Vec<Character>) -> Result<Self, ServiceError> {
		let usable: Vec<Character> = characters.into_iter().filter(Character::has_image).collect();
		if usable.is_empty() {
			return Err(ServiceError::ExternalSourceError("character catalog has no entries with an image".into()));
		}
		Ok(Self(usable))
	}

	/// Fetches the whole catalog. Any failure here should stop the process.
	pub async fn load(source: &dyn TCharacterSource) -> Result<Self, ServiceError> {
		let fetched = source.fetch_all().await?;
		let total = fetched.len();
		let pool = Self::new(fetched)?;
		tracing::info!(usable = pool.len(), total, "loaded character pool");
		Ok(pool)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn characters(&self) -> &[Character] {
		&self.0
	}
}

#[derive(Debug, Default)]
struct Assignments {
	images: HashSet<String>,
}

impl Assignments {
	/// `pick(n)` must return an index in `0..n`. The flag is false when the
	/// drawn image was already assigned.
	fn draw<'p>(
		&mut self,
		pool: &'p [Character],
		mut pick: impl FnMut(usize) -> usize,
	) -> (&'p Character, bool) {
		if self.images.len() >= pool.len() {
			tracing::info!(pool = pool.len(), "all avatars assigned, resetting");
			self.images.clear();
		}

		let mut drawn = &pool[pick(pool.len())];
		let mut attempts = 1;
		while self.images.contains(&drawn.image) && attempts < MAX_DRAW_ATTEMPTS {
			drawn = &pool[pick(pool.len())];
			attempts += 1;
		}
		if self.images.contains(&drawn.image) {
			tracing::warn!(character = %drawn.name, "reusing an assigned avatar after {} draws", MAX_DRAW_ATTEMPTS);
		}

		let fresh = self.images.insert(drawn.image.clone());
		(drawn, fresh)
	}
}

/// An avatar handed out by [`AvatarAssigner::assign`]. Give it back with
/// [`AvatarAssigner::release`] if the session it was drawn for is never created.
#[derive(Debug)]
pub struct AvatarClaim {
	pub character: Character,
	fresh: bool,
}

pub struct AvatarAssigner {
	pool: CharacterPool,
	assigned: Mutex<Assignments>,
}

impl AvatarAssigner {
	pub fn new(pool: CharacterPool) -> Self {
		Self {
			pool,
			assigned: Mutex::new(Assignments::default()),
		}
	}

	pub async fn assign(&self) -> AvatarClaim {
		let mut assigned = self.assigned.lock().await;
		let mut rng = rand::thread_rng();
		let (character, fresh) = assigned.draw(self.pool.characters(), |len| rng.gen_range(0..len));
		AvatarClaim {
			character: character.clone(),
			fresh,
		}
	}

	/// Unmarks the claimed image, unless it was already assigned before the claim.
	pub async fn release(
		&self,
		claim: AvatarClaim,
	) {
		if claim.fresh {
			self.assigned.lock().await.images.remove(&claim.character.image);
		}
	}

	pub async fn assigned_count(&self) -> usize {
		self.assigned.lock().await.images.len()
	}

	pub fn pool_size(&self) -> usize {
		self.pool.len()
	}
}
