//! The app-shell worker: precache install and network-first fetch handling.
//!
//! This re-expresses the UniPlanner service worker natively. Install opens
//! the named cache bucket and populates it with the fixed shell asset list;
//! fetch handling always tries the live network first and falls back to the
//! bucket only when the transport itself fails. Responses fetched at runtime
//! are never written back, and nothing evicts: a populated bucket serves the
//! same snapshots until it is reinstalled over.

mod interceptor;

pub use interceptor::{FetchSource, ShellWorker};

use std::fmt;

/// Name of the cache bucket holding the app shell.
pub const CACHE_NAME: &str = "uniplanner-v1";

/// The fixed set of shell resources precached at install. Relative entries
/// are resolved against the configured server origin.
pub const PRECACHE_URLS: [&str; 5] = [
  "/",
  "/static/manifest.json",
  "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
  "https://cdn.jsdelivr.net/npm/bootstrap-icons@1.10.0/font/bootstrap-icons.css",
  "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=Outfit:wght@500;700;800&display=swap",
];

/// Lifecycle states of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
  /// Constructed, nothing installed yet
  #[default]
  Parsed,
  /// Install in progress (precache running)
  Installing,
  /// Precache complete, not yet controlling fetches
  Installed,
  /// Activation in progress
  Activating,
  /// Live and controlling fetches
  Activated,
  /// Install or activation failed; the worker is dead
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      WorkerState::Parsed => "parsed",
      WorkerState::Installing => "installing",
      WorkerState::Installed => "installed",
      WorkerState::Activating => "activating",
      WorkerState::Activated => "activated",
      WorkerState::Redundant => "redundant",
    };
    f.write_str(s)
  }
}

/// Whether a worker may move between two lifecycle states.
fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
  use WorkerState::*;

  matches!(
    (from, to),
    // Normal lifecycle
    (Parsed, Installing) |
    (Installing, Installed) |
    (Installing, Redundant) |   // install failed
    (Installed, Activating) |
    (Activating, Activated) |
    (Activating, Redundant) |   // activation failed
    // Reinstall over a live worker
    (Activated, Installing)
  )
}
