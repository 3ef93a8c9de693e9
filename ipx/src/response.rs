//! Response shaping and failure mapping (§4.7, §4.8).
//!
//! Deliberately independent of any HTTP framework type: `ipx-server`
//! converts a [`ShapedResponse`] into an `axum::response::Response`.
use bytes::Bytes;

use crate::error::IpxError;
use crate::safe_string::{sanitize_body, stringify_strip};

pub enum Body {
    Bytes(Bytes),
    Text(String),
    Empty,
}

/// An unshaped response as assembled by the facade or the failure mapper.
pub struct ResponseDraft {
    pub status: u16,
    pub status_message: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl ResponseDraft {
    pub fn new(status: u16) -> ResponseDraft {
        ResponseDraft { status, status_message: None, headers: Vec::new(), body: Body::Empty }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> ResponseDraft {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Body) -> ResponseDraft {
        self.body = body;
        self
    }
}

/// A response that has passed through the safety pass: no header value,
/// status message, or text body can contain a literal `"`, newline, or
/// surviving `<script>` fragment (§8 invariant 8).
pub struct ShapedResponse {
    pub status: u16,
    pub status_message: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

pub fn shape(draft: ResponseDraft) -> ShapedResponse {
    let status = if draft.status == 0 { 200 } else { draft.status };
    let status_message = match draft.status_message {
        Some(m) if !m.is_empty() => stringify_strip(&m),
        _ => "OK".to_string(),
    };
    let headers = draft.headers.into_iter().map(|(k, v)| (k, stringify_strip(&v))).collect();
    let body = match draft.body {
        Body::Bytes(b) => b,
        Body::Text(s) => Bytes::from(sanitize_body(&stringify_strip(&s))),
        Body::Empty => Bytes::new(),
    };
    ShapedResponse { status, status_message, headers, body }
}

/// Maps a caught [`IpxError`] to a shaped failure response (§4.7).
pub fn error_response(err: &IpxError) -> ShapedResponse {
    let status = err.status_code();
    let status_message = match err {
        IpxError::Internal(_) => format!("IPX Error ({})", status),
        _ => format!("IPX: {}", err.message()),
    };
    let body = format!("IPX Error: {}", err);
    shape(ResponseDraft::new(status).with_body(Body::Text(body)).with_status_message(status_message))
}

impl ResponseDraft {
    fn with_status_message(mut self, message: String) -> ResponseDraft {
        self.status_message = Some(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_status_to_200() {
        let shaped = shape(ResponseDraft::new(0));
        assert_eq!(shaped.status, 200);
        assert_eq!(shaped.status_message, "OK");
    }

    #[test]
    fn strips_quotes_from_headers_and_message() {
        let draft = ResponseDraft::new(200).with_header("X-Test", "a\"b").with_status_message("weird \"msg\"".to_string());
        let shaped = shape(draft);
        assert!(!shaped.status_message.contains('"'));
        assert!(!shaped.headers[0].1.contains('"'));
    }

    #[test]
    fn sanitizes_text_body() {
        let draft = ResponseDraft::new(200).with_body(Body::Text("<script>alert(1)</script>hi".to_string()));
        let shaped = shape(draft);
        let text = String::from_utf8(shaped.body.to_vec()).unwrap();
        assert!(!text.to_lowercase().contains("<script>"));
        assert!(text.contains("hi"));
    }

    #[test]
    fn error_response_prefixes_known_errors() {
        let shaped = error_response(&IpxError::Forbidden("Forbidden path".to_string()));
        assert_eq!(shaped.status, 403);
        assert_eq!(shaped.status_message, "IPX: Forbidden path");
    }

    #[test]
    fn error_response_hides_internal_detail_in_status_message() {
        let shaped = error_response(&IpxError::internal("codec exploded"));
        assert_eq!(shaped.status, 500);
        assert_eq!(shaped.status_message, "IPX Error (500)");
    }
}
