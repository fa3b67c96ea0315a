//! reqwest-backed implementation of the fetch boundary.

use color_eyre::{eyre::eyre, Result};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{BoxFuture, Fetch, FetchError, Method, Request, Response};

/// Real network fetcher over a shared reqwest client.
#[derive(Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("uniplanner/", env!("CARGO_PKG_VERSION")))
      .connect_timeout(Duration::from_secs(10))
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  async fn run(client: Client, request: Request) -> Result<Response, FetchError> {
    let mut builder = match request.method {
      Method::Get => client.get(&request.url),
      Method::Head => client.head(&request.url),
      Method::Post => client.post(&request.url),
      Method::Put => client.put(&request.url),
      Method::Delete => client.delete(&request.url),
      Method::Patch => client.patch(&request.url),
    };

    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }
    if !request.body.is_empty() {
      builder = builder.body(request.body);
    }

    let resp = builder.send().await.map_err(classify)?;

    let status = resp.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in resp.headers() {
      if let Ok(v) = value.to_str() {
        headers.insert(name.as_str().to_string(), v.to_string());
      }
    }

    let body = resp.bytes().await.map_err(classify)?.to_vec();

    Ok(Response {
      status,
      headers,
      body,
    })
  }
}

/// Map a reqwest error onto the boundary error type.
///
/// Builder errors mean the URL never produced a valid request; everything
/// else (connect, DNS, TLS, timeout, broken body stream) is transport.
fn classify(e: reqwest::Error) -> FetchError {
  if e.is_builder() {
    FetchError::InvalidUrl(e.to_string())
  } else {
    FetchError::Transport(e.to_string())
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, request: Request) -> BoxFuture<Result<Response, FetchError>> {
    let client = self.client.clone();
    Box::pin(async move {
      debug!(method = %request.method, url = %request.url, "network fetch");
      Self::run(client, request).await
    })
  }
}
