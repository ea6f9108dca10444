use std::fmt::Display;

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use serde::Serialize;

use crate::domain::{
	archive::Archive,
	comment::Comment,
	post::Post,
	session::Session,
};

use super::archive::SweepReport;

pub type AnyError = dyn std::error::Error + Send + Sync + 'static;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ServiceResponse {
	Post(Post),
	Posts(Vec<Post>),
	Comment(Comment),
	Comments(Vec<Comment>),
	Session(Session),
	Sessions(Vec<Session>),
	Archive(Archive),
	Archives(Vec<Archive>),
	Sweep(SweepReport),
	Empty(()),
}

impl From<Post> for ServiceResponse {
	fn from(value: Post) -> Self {
		ServiceResponse::Post(value)
	}
}

impl From<Vec<Post>> for ServiceResponse {
	fn from(value: Vec<Post>) -> Self {
		ServiceResponse::Posts(value)
	}
}

impl From<Comment> for ServiceResponse {
	fn from(value: Comment) -> Self {
		ServiceResponse::Comment(value)
	}
}

impl From<Vec<Comment>> for ServiceResponse {
	fn from(value: Vec<Comment>) -> Self {
		ServiceResponse::Comments(value)
	}
}

impl From<Session> for ServiceResponse {
	fn from(value: Session) -> Self {
		ServiceResponse::Session(value)
	}
}

impl From<Vec<Session>> for ServiceResponse {
	fn from(value: Vec<Session>) -> Self {
		ServiceResponse::Sessions(value)
	}
}

impl From<Archive> for ServiceResponse {
	fn from(value: Archive) -> Self {
		ServiceResponse::Archive(value)
	}
}

impl From<Vec<Archive>> for ServiceResponse {
	fn from(value: Vec<Archive>) -> Self {
		ServiceResponse::Archives(value)
	}
}

impl From<SweepReport> for ServiceResponse {
	fn from(value: SweepReport) -> Self {
		ServiceResponse::Sweep(value)
	}
}

impl From<()> for ServiceResponse {
	fn from(_value: ()) -> Self {
		ServiceResponse::Empty(())
	}
}

impl IntoResponse for ServiceResponse {
	fn into_response(self) -> Response {
		match self {
			ServiceResponse::Empty(()) => StatusCode::NO_CONTENT.into_response(),
			other => Json(other).into_response(),
		}
	}
}

#[derive(Debug)]
pub enum ServiceError {
	/// Rejected input; nothing was persisted.
	ValidationError(String),
	EntityNotFound(String),
	/// The request carries no usable session cookies.
	Unauthorized(String),
	ParsingError(String),
	DatabaseError(Box<AnyError>),
	/// A step of the archive transaction failed and the unit was rolled back.
	TransactionError { step: &'static str, reason: String },
	/// A multi-step cascade stopped midway. Steps already applied stay applied.
	PartialCascade(String),
	BlobStoreError(String),
	ExternalSourceError(String),
	ConfigError(String),
}

impl ServiceError {
	pub fn validation(message: impl Into<String>) -> Self {
		ServiceError::ValidationError(message.into())
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		ServiceError::EntityNotFound(message.into())
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, ServiceError::EntityNotFound(_))
	}

	pub fn code(&self) -> &'static str {
		match self {
			ServiceError::ValidationError(_) => "VALIDATION_ERROR",
			ServiceError::EntityNotFound(_) => "NOT_FOUND",
			ServiceError::Unauthorized(_) => "UNAUTHORIZED",
			ServiceError::ParsingError(_) => "PARSING_ERROR",
			ServiceError::DatabaseError(_) => "DATABASE_ERROR",
			ServiceError::TransactionError { .. } => "TRANSACTION_ERROR",
			ServiceError::PartialCascade(_) => "PARTIAL_CASCADE",
			ServiceError::BlobStoreError(_) => "BLOB_STORE_ERROR",
			ServiceError::ExternalSourceError(_) => "EXTERNAL_SOURCE_ERROR",
			ServiceError::ConfigError(_) => "CONFIG_ERROR",
		}
	}

	pub fn status_code(&self) -> StatusCode {
		match self {
			ServiceError::ValidationError(_) | ServiceError::ParsingError(_) => StatusCode::BAD_REQUEST,
			ServiceError::EntityNotFound(_) => StatusCode::NOT_FOUND,
			ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ServiceError::ExternalSourceError(_) => StatusCode::BAD_GATEWAY,
			ServiceError::DatabaseError(_)
			| ServiceError::TransactionError { .. }
			| ServiceError::PartialCascade(_)
			| ServiceError::BlobStoreError(_)
			| ServiceError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ServiceError::ValidationError(res) => write!(f, "validation failed: {}", res),
			ServiceError::EntityNotFound(res) => write!(f, "{} not found", res),
			ServiceError::Unauthorized(res) => write!(f, "unauthorized: {}", res),
			ServiceError::ParsingError(res) => write!(f, "parsing failed: {}", res),
			ServiceError::DatabaseError(res) => write!(f, "database error: {}", res),
			ServiceError::TransactionError { step, reason } => write!(f, "transaction rolled back at `{}`: {}", step, reason),
			ServiceError::PartialCascade(res) => write!(f, "partially applied: {}", res),
			ServiceError::BlobStoreError(res) => write!(f, "blob store error: {}", res),
			ServiceError::ExternalSourceError(res) => write!(f, "external source error: {}", res),
			ServiceError::ConfigError(res) => write!(f, "configuration error: {}", res),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
	fn from(value: sqlx::Error) -> Self {
		match value {
			sqlx::Error::RowNotFound => ServiceError::not_found("row"),
			err => ServiceError::DatabaseError(Box::new(err)),
		}
	}
}

impl From<sqlx::migrate::MigrateError> for ServiceError {
	fn from(value: sqlx::migrate::MigrateError) -> Self {
		ServiceError::DatabaseError(Box::new(value))
	}
}

impl From<reqwest::Error> for ServiceError {
	fn from(value: reqwest::Error) -> Self {
		ServiceError::ExternalSourceError(value.to_string())
	}
}

#[derive(Serialize)]
struct ErrorBody {
	code: &'static str,
	message: String,
}

impl IntoResponse for ServiceError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			tracing::error!(code = self.code(), "{}", self);
		}
		(
			status,
			Json(ErrorBody {
				code: self.code(),
				message: self.to_string(),
			}),
		)
			.into_response()
	}
}
