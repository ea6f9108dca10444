pub mod blob_store;
pub mod character_source;
pub mod repositories;
