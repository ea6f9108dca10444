use serde::{Deserialize, Serialize};

/// Avatar source record from the external catalog.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Character {
	pub id: i64,
	pub name: String,
	#[serde(default)]
	pub image: String,
	#[serde(default)]
	pub status: String,
	#[serde(default)]
	pub species: String,
	#[serde(default)]
	pub gender: String,
	#[serde(default, rename = "type")]
	pub kind: String,
}

impl Character {
	pub fn has_image(&self) -> bool {
		!self.image.trim().is_empty()
	}
}

/// One page of the paginated catalog.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CharacterPage {
	#[serde(default)]
	pub info: PageInfo,
	#[serde(default)]
	pub results: Vec<Character>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PageInfo {
	pub next: Option<String>,
}

impl CharacterPage {
	pub fn next_url(&self) -> Option<&str> {
		self.info.next.as_deref().filter(|next| !next.is_empty())
	}
}

#[cfg(test)]
mod test {
	use super::CharacterPage;

	#[test]
	fn test_page_decodes_catalog_payload() {
		let page: CharacterPage = serde_json::from_str(
			r#"{
				"info": {"count": 826, "pages": 42, "next": "https://catalog/api/character?page=2", "prev": null},
				"results": [
					{"id": 1, "name": "Rick Sanchez", "status": "Alive", "species": "Human", "type": "", "gender": "Male",
					 "image": "https://catalog/api/character/avatar/1.jpeg", "episode": []},
					{"id": 2, "name": "Nobody", "image": ""}
				]
			}"#,
		)
		.unwrap();

		assert_eq!(page.next_url(), Some("https://catalog/api/character?page=2"));
		assert_eq!(page.results.len(), 2);
		assert!(page.results[0].has_image());
		assert!(!page.results[1].has_image());
	}

	#[test]
	fn test_last_page_has_no_next_url() {
		for payload in [r#"{"info": {"next": null}, "results": []}"#, r#"{"info": {"next": ""}}"#, "{}"] {
			let page: CharacterPage = serde_json::from_str(payload).unwrap();
			assert_eq!(page.next_url(), None);
		}
	}
}
