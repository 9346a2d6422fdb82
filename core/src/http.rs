//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. `ApiClient` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network; a
//! `Transport` implementation performs the actual round-trip. The stateful
//! layer (adapter and stores) only ever talks to `dyn Transport`, so tests can
//! substitute a scripted transport and a host application can plug in its own
//! networking stack.
//!
//! All fields use owned types (`String`, `Vec`) so values can be queued, logged
//! or handed across threads without lifetime concerns.

use async_trait::async_trait;

use crate::error::ApiError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// Content of one multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File {
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// A named multipart form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartPart {
    pub name: String,
    pub content: PartContent,
}

impl MultipartPart {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            content: PartContent::Text(value.into()),
        }
    }
}

/// Request body. JSON bodies are pre-serialized; multipart bodies are left as
/// parts so the transport can encode them with its own boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpBody {
    Json(String),
    Multipart(Vec<MultipartPart>),
}

impl HttpBody {
    pub fn as_json(&self) -> Option<&str> {
        match self {
            HttpBody::Json(s) => Some(s),
            HttpBody::Multipart(_) => None,
        }
    }
}

/// An HTTP request described as plain data.
///
/// `path` is the route on the API (`/users/pets/42`), used for matching the
/// unauthenticated allow-list. `url` is the absolute URL including the
/// encoded query string, ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<HttpBody>,
}

impl HttpRequest {
    /// Return the first header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes `HttpRequest` values against the network.
///
/// Implementations must return non-2xx responses as `Ok(HttpResponse)` and
/// reserve `Err` for failures where no response was received, which they
/// report as `ApiError::Network`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: "/events".to_string(),
            url: "http://localhost:3000/events".to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = request();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn set_header_replaces_existing_value() {
        let mut req = request();
        req.set_header("authorization", "Bearer a");
        req.set_header("Authorization", "Bearer b");
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer b"));
        assert_eq!(req.headers.len(), 2);
    }

    #[test]
    fn success_range_is_2xx() {
        let mut resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 302;
        assert!(!resp.is_success());
    }
}
