//! Install and fetch handling for the shell worker.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::{is_valid_transition, WorkerState, CACHE_NAME, PRECACHE_URLS};
use crate::cache::{request_key, CacheStore};
use crate::net::{Fetch, FetchError, Method, Request, Response};

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
  /// Live response from the network
  Network,
  /// Cache fallback after a transport failure
  Cache,
}

/// Result of a handled request.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
  pub response: Response,
  pub source: FetchSource,
}

/// The worker owning the shell bucket.
///
/// Cheap to share: fetch handling takes `&self`, so an `Arc<ShellWorker>`
/// can serve any number of concurrent requests. Lifecycle steps take
/// `&mut self` and happen before the worker is shared.
pub struct ShellWorker {
  fetcher: Arc<dyn Fetch>,
  store: Arc<dyn CacheStore>,
  origin: Url,
  state: WorkerState,
}

impl ShellWorker {
  /// Create a fresh worker that has never installed.
  #[allow(dead_code)]
  pub fn new(origin: Url, fetcher: Arc<dyn Fetch>, store: Arc<dyn CacheStore>) -> Self {
    Self {
      fetcher,
      store,
      origin,
      state: WorkerState::Parsed,
    }
  }

  /// Construct a worker over whatever is already on disk.
  ///
  /// A bucket that exists means a previously installed worker controls this
  /// scope, so the worker starts out activated; otherwise it starts parsed
  /// and must run `install` first.
  pub fn resume(origin: Url, fetcher: Arc<dyn Fetch>, store: Arc<dyn CacheStore>) -> Result<Self> {
    let state = if store.has_bucket(CACHE_NAME)? {
      WorkerState::Activated
    } else {
      WorkerState::Parsed
    };

    Ok(Self {
      fetcher,
      store,
      origin,
      state,
    })
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn origin(&self) -> &Url {
    &self.origin
  }

  /// Number of entries currently in the shell bucket.
  pub fn cached_count(&self) -> Result<usize> {
    Ok(self.store.keys(CACHE_NAME)?.len())
  }

  fn transition(&mut self, to: WorkerState) -> Result<()> {
    if !is_valid_transition(self.state, to) {
      return Err(eyre!("Invalid worker transition: {} -> {}", self.state, to));
    }
    debug!(from = %self.state, to = %to, "worker state change");
    self.state = to;
    Ok(())
  }

  /// Resolve a possibly-relative URL against the server origin.
  fn resolve(&self, url: &str) -> Result<String, FetchError> {
    self
      .origin
      .join(url)
      .map(|u| u.to_string())
      .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
  }

  /// Run the install step: open the shell bucket and precache every listed
  /// URL.
  ///
  /// Returns only once the whole population attempt has settled. Any single
  /// failure fails the install as a whole and leaves the worker redundant;
  /// entries stored before the failure are kept as-is.
  pub async fn install(&mut self) -> Result<()> {
    self.transition(WorkerState::Installing)?;

    info!(cache = CACHE_NAME, resources = PRECACHE_URLS.len(), "installing app shell");

    match self.precache().await {
      Ok(()) => {
        self.transition(WorkerState::Installed)?;
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "install failed");
        self.transition(WorkerState::Redundant)?;
        Err(e)
      }
    }
  }

  /// Run the activation step, after which the worker controls fetches.
  pub fn activate(&mut self) -> Result<()> {
    self.transition(WorkerState::Activating)?;
    self.transition(WorkerState::Activated)?;
    info!("worker activated");
    Ok(())
  }

  async fn precache(&self) -> Result<()> {
    self.store.ensure_bucket(CACHE_NAME)?;

    let fetches = PRECACHE_URLS.iter().map(|raw| self.fetch_into_cache(raw));
    let results = join_all(fetches).await;

    let failures: Vec<String> = results
      .into_iter()
      .zip(PRECACHE_URLS.iter())
      .filter_map(|(result, url)| result.err().map(|e| format!("{}: {}", url, e)))
      .collect();

    if failures.is_empty() {
      return Ok(());
    }

    Err(eyre!(
      "Failed to precache {} of {} shell resources: {}",
      failures.len(),
      PRECACHE_URLS.len(),
      failures.join("; ")
    ))
  }

  /// Fetch one shell resource and store its snapshot.
  ///
  /// Follows the bulk-add contract: a response outside the 2xx range counts
  /// as a failure here, even though the fetch path passes such responses
  /// through untouched.
  async fn fetch_into_cache(&self, raw: &str) -> Result<()> {
    let url = self.resolve(raw)?;
    let response = self.fetcher.fetch(Request::get(&url)).await?;

    if !response.ok() {
      return Err(eyre!("unexpected status {}", response.status));
    }

    let key = request_key(Method::Get, &url);
    self.store.put(CACHE_NAME, &key, &response)?;
    debug!(url = %url, status = response.status, "precached");

    Ok(())
  }

  /// Handle one request: network first, cache fallback on transport failure.
  ///
  /// A completed response comes back verbatim whatever its status, and the
  /// cache is neither consulted nor written on that path. Only when the
  /// transport fails is the bucket checked; a miss surfaces the original
  /// transport error.
  pub async fn handle(&self, request: Request) -> Result<FetchOutcome, FetchError> {
    let url = self.resolve(&request.url)?;
    let request = Request { url, ..request };

    match self.fetcher.fetch(request.clone()).await {
      Ok(response) => Ok(FetchOutcome {
        response,
        source: FetchSource::Network,
      }),
      Err(err) => {
        warn!(url = %request.url, error = %err, "network fetch failed, trying cache");

        let key = request_key(request.method, &request.url);
        match self.store.get(CACHE_NAME, &key) {
          Ok(Some(cached)) => {
            info!(url = %request.url, "serving cached shell response");
            Ok(FetchOutcome {
              response: cached.response,
              source: FetchSource::Cache,
            })
          }
          Ok(None) => Err(err),
          Err(store_err) => {
            // A broken store cannot rescue the request; report the network
            // failure the caller actually hit
            warn!(error = %store_err, "cache lookup failed");
            Err(err)
          }
        }
      }
    }
  }
}
