use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
	domain::character::{Character, CharacterPage},
	services::response::ServiceError,
};

/// Upper bound on followed `next` links, in case a catalog loops.
const MAX_PAGES: usize = 1_000;

/// External catalog of avatar characters.
#[async_trait]
pub trait TCharacterSource: Send + Sync {
	/// URL of the first catalog page.
	fn first_page(&self) -> String;

	async fn fetch_page(
		&self,
		url: &str,
	) -> Result<CharacterPage, ServiceError>;

	/// Downloads a character image, returning its bytes and content type.
	async fn fetch_image(
		&self,
		url: &str,
	) -> Result<(Bytes, String), ServiceError>;

	/// Follows the `next` cursor until the catalog is exhausted.
	async fn fetch_all(&self) -> Result<Vec<Character>, ServiceError> {
		let mut characters = Vec::new();
		let mut next = Some(self.first_page());
		let mut pages = 0;

		while let Some(url) = next {
			pages += 1;
			if pages > MAX_PAGES {
				return Err(ServiceError::ExternalSourceError(format!("catalog exceeded {MAX_PAGES} pages")));
			}
			let page = self.fetch_page(&url).await?;
			next = page.next_url().map(str::to_string);
			characters.extend(page.results);
		}

		tracing::debug!(pages, count = characters.len(), "character catalog fetched");
		Ok(characters)
	}
}

/// HTTP client for a paginated JSON catalog shaped like `{info: {next}, results: [...]}`.
pub struct CharacterCatalogClient {
	client: reqwest::Client,
	catalog_url: String,
}

impl CharacterCatalogClient {
	pub fn new(
		catalog_url: impl Into<String>,
		timeout: Duration,
	) -> Result<Self, ServiceError> {
		let client = reqwest::Client::builder().timeout(timeout).build()?;
		Ok(Self {
			client,
			catalog_url: catalog_url.into(),
		})
	}
}

#[async_trait]
impl TCharacterSource for CharacterCatalogClient {
	fn first_page(&self) -> String {
		self.catalog_url.clone()
	}

	async fn fetch_page(
		&self,
		url: &str,
	) -> Result<CharacterPage, ServiceError> {
		let page = self
			.client
			.get(url)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(|err| ServiceError::ExternalSourceError(format!("failed to fetch characters from {url}: {err}")))?
			.json::<CharacterPage>()
			.await
			.map_err(|err| ServiceError::ExternalSourceError(format!("failed to decode character page {url}: {err}")))?;
		Ok(page)
	}

	async fn fetch_image(
		&self,
		url: &str,
	) -> Result<(Bytes, String), ServiceError> {
		let response = self
			.client
			.get(url)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(|err| ServiceError::ExternalSourceError(format!("failed to download {url}: {err}")))?;

		let content_type = response
			.headers()
			.get(reqwest::header::CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.unwrap_or("image/jpeg")
			.to_string();
		let bytes = response.bytes().await?;
		Ok((bytes, content_type))
	}
}
