//! Redirect and error responses.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::header::LOCATION;
use http::{HeaderMap, HeaderValue, StatusCode};

/// Encode a redirect target for the `Location` header.
///
/// Visible ASCII passes through unchanged so already-encoded URLs are not
/// double-encoded; every other character is percent-encoded.
pub fn encode_redirect_url(target: &str) -> String {
    let mut encoded = String::with_capacity(target.len());
    for ch in target.chars() {
        if ch.is_ascii_graphic() {
            encoded.push(ch);
        } else {
            let mut buf = [0u8; 4];
            encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }
    encoded
}

/// A `302 Found` to `target` carrying the given `Set-Cookie` headers.
pub fn redirect(target: &str, cookies: HeaderMap) -> Response {
    let encoded = encode_redirect_url(target);
    let location = match HeaderValue::from_str(&encoded) {
        Ok(value) => value,
        Err(_) => HeaderValue::from_static("/"),
    };

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::FOUND;
    response.headers_mut().insert(LOCATION, location);
    response.headers_mut().extend(cookies);
    response
}

/// A plain-text error response that never echoes credentials.
pub fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}
