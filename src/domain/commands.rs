use serde::Deserialize;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreatePost {
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateComment {
	pub post_id: i64,
	pub title: String,
	pub content: String,
	pub author_id: String,
	pub author_name: String,
	pub image_url: Option<String>,
	/// `None` for a top-level comment.
	pub reply_to_comment_id: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateSession {
	#[serde(default)]
	pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RenameSession {
	pub name: String,
}
