use axum::{
	headers::{Cookie, HeaderMapExt},
	http::{header::SET_COOKIE, HeaderMap, HeaderValue, Request},
	middleware::Next,
	response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};

use crate::{domain::session::Session, services::response::ServiceError};

pub const SESSION_ID_COOKIE: &str = "session_id";
pub const SESSION_NAME_COOKIE: &str = "session_name";

/// Author identity carried by the request's session cookies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
	pub id: String,
	pub name: String,
}

/// Rejects requests without both session cookies and exposes the identity
/// to handlers as an `Extension<SessionIdentity>`.
pub async fn require_session<B>(
	mut request: Request<B>,
	next: Next<B>,
) -> Result<Response, ServiceError> {
	let identity = {
		let cookies = request
			.headers()
			.typed_get::<Cookie>()
			.ok_or_else(|| ServiceError::Unauthorized("session cookie missing".into()))?;

		let id = cookies
			.get(SESSION_ID_COOKIE)
			.filter(|id| !id.is_empty())
			.ok_or_else(|| ServiceError::Unauthorized("session cookie missing".into()))?
			.to_string();
		let name = cookies
			.get(SESSION_NAME_COOKIE)
			.and_then(decode_name)
			.filter(|name| !name.trim().is_empty())
			.ok_or_else(|| ServiceError::Unauthorized("session name cookie missing".into()))?;
		SessionIdentity { id, name }
	};

	request.extensions_mut().insert(identity);
	Ok(next.run(request).await)
}

/// Names are free text, so the cookie carries them base64url-encoded.
fn encode_name(name: &str) -> String {
	URL_SAFE_NO_PAD.encode(name.as_bytes())
}

fn decode_name(raw: &str) -> Option<String> {
	let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
	String::from_utf8(bytes).ok()
}

fn http_date(at: DateTime<Utc>) -> String {
	at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn cookie(
	name: &str,
	value: &str,
	expires: &str,
) -> Result<HeaderValue, ServiceError> {
	HeaderValue::from_str(&format!("{name}={value}; Path=/; Expires={expires}; HttpOnly; SameSite=Strict"))
		.map_err(|err| ServiceError::ParsingError(format!("invalid cookie {name}: {err}")))
}

/// `Set-Cookie` headers for both session cookies, valid until the session expires.
pub fn session_cookies(session: &Session) -> Result<HeaderMap, ServiceError> {
	let expires = http_date(session.expires_at);
	let mut headers = HeaderMap::new();
	headers.append(SET_COOKIE, cookie(SESSION_ID_COOKIE, &session.id, &expires)?);
	headers.append(SET_COOKIE, cookie(SESSION_NAME_COOKIE, &encode_name(&session.name), &expires)?);
	Ok(headers)
}

/// `Set-Cookie` headers that make the browser drop both session cookies.
pub fn clear_session_cookies() -> Result<HeaderMap, ServiceError> {
	let expires = http_date(DateTime::<Utc>::default());
	let mut headers = HeaderMap::new();
	headers.append(SET_COOKIE, cookie(SESSION_ID_COOKIE, "", &expires)?);
	headers.append(SET_COOKIE, cookie(SESSION_NAME_COOKIE, "", &expires)?);
	Ok(headers)
}
