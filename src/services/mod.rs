pub mod archive;
pub mod avatars;
pub mod comments;
pub mod posts;
pub mod reconciler;
pub mod response;
pub mod sessions;
