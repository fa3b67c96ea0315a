//! Named-bucket response cache backing offline support.
//!
//! A bucket maps normalized request keys to stored response snapshots.
//! Entries are written during worker install and read back whenever the
//! network is unreachable. Nothing here evicts or expires: entries persist
//! until the bucket itself is deleted, however stale they get.

mod storage;

pub use storage::{CacheStore, SqliteStore};

#[cfg(test)]
pub use storage::MemoryStore;

use url::Url;

use crate::net::Method;

/// Normalized lookup key for a request: method plus URL with any fragment
/// stripped. Query strings stay significant; fragments never reach the
/// server, so two URLs differing only in fragment share one entry.
pub fn request_key(method: Method, url: &str) -> String {
  let mut url = url.to_string();
  match Url::parse(&url) {
    Ok(mut parsed) => {
      parsed.set_fragment(None);
      url = parsed.to_string();
    }
    Err(_) => {
      // Not an absolute URL; drop the fragment and key it as-is
      if let Some(pos) = url.find('#') {
        url.truncate(pos);
      }
    }
  }
  format!("{}:{}", method.as_str(), url)
}
