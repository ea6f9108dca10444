mod archive;
mod images;
mod posts;
mod sessions;

use std::{sync::Arc, time::Duration};

use axum::{
	error_handling::HandleErrorLayer,
	extract::DefaultBodyLimit,
	http::{HeaderValue, Method, StatusCode},
	middleware,
	routing::{get, post},
	BoxError, Router,
};
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	trace::TraceLayer,
};

use crate::{
	adapters::blob_store::TBlobStore,
	common::{clock::Clock, middleware::require_session},
	services::{archive::ArchiveService, comments::CommentService, posts::PostService, sessions::SessionDirectory},
};

/// Multipart uploads are capped at 10 MiB.
const MAX_UPLOAD_BYTES: usize = 10 << 20;

#[derive(Clone)]
pub struct AppState {
	pub posts: PostService,
	pub comments: CommentService,
	pub archive: ArchiveService,
	pub sessions: Arc<SessionDirectory>,
	pub blob_store: Arc<dyn TBlobStore>,
	pub clock: Arc<dyn Clock>,
}

pub struct HttpSettings {
	pub allow_origins: Vec<HeaderValue>,
	pub request_timeout: Duration,
}

async fn handle_timeout_error(err: BoxError) -> (StatusCode, String) {
	if err.is::<tower::timeout::error::Elapsed>() {
		(StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
	} else {
		tracing::error!("unhandled middleware error: {}", err);
		(StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled internal error: {err}"))
	}
}

pub fn create_routes(
	state: AppState,
	settings: HttpSettings,
) -> Router {
	let session_routes = Router::new()
		.route("/", post(sessions::create_session).get(sessions::list_sessions))
		.route(
			"/:id",
			get(sessions::get_session).put(sessions::rename_session).delete(sessions::delete_session),
		);

	let post_routes = Router::new()
		.route(
			"/",
			get(posts::list_posts).merge(post(posts::create_post).route_layer(middleware::from_fn(require_session))),
		)
		.route("/:id", get(posts::get_post).delete(posts::delete_post));

	let comment_routes = Router::new()
		.route("/", post(posts::create_comment).route_layer(middleware::from_fn(require_session)))
		.route("/post/:id", get(posts::list_comments_of_post))
		.route("/replies/:id", get(posts::list_replies))
		.route("/:id", get(posts::get_comment));

	let archive_routes = Router::new()
		.route("/", get(archive::list_archived))
		.route("/:id", get(archive::get_archived).post(archive::archive_post));

	Router::new()
		.nest("/sessions", session_routes)
		.nest("/posts", post_routes)
		.nest("/comments", comment_routes)
		.nest("/archive", archive_routes)
		.route("/archive-expired-posts", post(archive::archive_expired_posts))
		.route("/images/:bucket/:key", get(images::serve_image))
		.with_state(state)
		.layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
		.layer(
			ServiceBuilder::new()
				.layer(HandleErrorLayer::new(handle_timeout_error))
				.timeout(settings.request_timeout),
		)
		.layer(
			CorsLayer::new()
				.allow_origin(AllowOrigin::list(settings.allow_origins))
				.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
				.allow_credentials(true),
		)
		.layer(TraceLayer::new_for_http())
}
