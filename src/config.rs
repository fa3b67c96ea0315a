use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Origin the original deployment serves from when run unconfigured.
const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  /// Custom title for the dashboard header (defaults to the server host)
  pub title: Option<String>,
  /// Overrides the platform data directory for databases and logs
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  /// Origin of the UniPlanner deployment the shell is cached from
  pub url: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: DEFAULT_SERVER_URL.to_string(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      server: ServerConfig::default(),
      title: None,
      data_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./uniplanner.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/uniplanner/config.yaml
  /// 4. ~/.config/uniplanner/config.yaml
  ///
  /// With no file anywhere, defaults apply (local deployment on port 5000).
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("uniplanner.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("uniplanner").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The server origin parsed as a URL.
  pub fn origin(&self) -> Result<Url> {
    Url::parse(&self.server.url)
      .map_err(|e| eyre!("Invalid server url '{}': {}", self.server.url, e))
  }

  /// Title to show in the dashboard header.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }

    self
      .origin()
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| "uniplanner".to_string())
  }
}
