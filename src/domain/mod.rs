pub mod archive;
pub mod character;
pub mod commands;
pub mod comment;
pub mod post;
pub mod session;
