//! HTTP request/response model and the network boundary.
//!
//! The worker and cache operate on these owned types rather than reqwest's,
//! so response snapshots can be persisted and later replayed from cache with
//! the same shape they had coming off the network.

mod http;

pub use http::HttpFetcher;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// HTTP method of a request routed through the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An outgoing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
  pub method: Method,
  /// Absolute URL, or a path resolved against the server origin by the worker.
  pub url: String,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  #[serde(default)]
  pub body: Vec<u8>,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      headers: BTreeMap::new(),
      body: Vec::new(),
    }
  }

  /// Shorthand for a bodyless GET.
  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }
}

/// A response snapshot: status, headers, and body bytes.
///
/// This is the unit stored in the cache, hence the serde derives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  #[serde(default)]
  pub headers: BTreeMap<String, String>,
  #[serde(default)]
  pub body: Vec<u8>,
}

impl Response {
  /// Whether the status is in the 2xx range.
  pub fn ok(&self) -> bool {
    self.status >= 200 && self.status < 300
  }

  /// Body decoded as UTF-8, lossily.
  pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(&self.body)
  }

  /// Value of a header, case-insensitive on the name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Failure at the network boundary.
///
/// `Transport` means the request never completed: connection refused, DNS
/// failure, TLS error, timeout. A completed response with an error status is
/// NOT a `FetchError`; it comes back as an ordinary `Response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
  /// The request never reached the server or the connection broke.
  Transport(String),
  /// The request URL could not be parsed or resolved.
  InvalidUrl(String),
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FetchError::Transport(msg) => write!(f, "network error: {}", msg),
      FetchError::InvalidUrl(msg) => write!(f, "invalid URL: {}", msg),
    }
  }
}

impl std::error::Error for FetchError {}

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// The boundary the worker fetches through.
///
/// Object-safe so the worker can hold an `Arc<dyn Fetch>`; tests substitute
/// a scripted implementation for the real client.
pub trait Fetch: Send + Sync {
  fn fetch(&self, request: Request) -> BoxFuture<Result<Response, FetchError>>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_method_as_str() {
    assert_eq!(Method::Get.as_str(), "GET");
    assert_eq!(Method::Post.to_string(), "POST");
  }

  #[test]
  fn test_ok_covers_2xx_only() {
    let mut resp = Response {
      status: 200,
      headers: BTreeMap::new(),
      body: Vec::new(),
    };
    assert!(resp.ok());
    resp.status = 204;
    assert!(resp.ok());
    resp.status = 299;
    assert!(resp.ok());
    resp.status = 301;
    assert!(!resp.ok());
    resp.status = 404;
    assert!(!resp.ok());
    resp.status = 500;
    assert!(!resp.ok());
  }

  #[test]
  fn test_header_lookup_ignores_case() {
    let mut resp = Response {
      status: 200,
      headers: BTreeMap::new(),
      body: Vec::new(),
    };
    resp
      .headers
      .insert("Content-Type".to_string(), "text/css".to_string());
    assert_eq!(resp.header("content-type"), Some("text/css"));
    assert_eq!(resp.header("CONTENT-TYPE"), Some("text/css"));
    assert_eq!(resp.header("etag"), None);
  }

  #[test]
  fn test_snapshot_json_round_trip() {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), "text/html".to_string());
    let resp = Response {
      status: 404,
      headers,
      body: b"not found".to_vec(),
    };

    let json = serde_json::to_vec(&resp).unwrap();
    let back: Response = serde_json::from_slice(&json).unwrap();

    assert_eq!(back.status, 404);
    assert_eq!(back.header("content-type"), Some("text/html"));
    assert_eq!(back.body, b"not found");
  }
}
