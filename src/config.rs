use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Default page size for listings when not given on the command line
  pub default_page_size: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the catalog API, e.g. "http://localhost:8080/api"
  pub url: String,
  /// Fixed request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  10
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./kitdex.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/kitdex/config.yaml
  /// 4. ~/.config/kitdex/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/kitdex/config.yaml\n\
                 with at least:\n  api:\n    url: http://localhost:8080/api"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("kitdex.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("kitdex").join("config.yaml");
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

  /// Base URL with a guaranteed trailing slash, so relative path joins
  /// resolve under it rather than next to it.
  pub fn base_url(&self) -> Result<Url> {
    let raw = if self.api.url.ends_with('/') {
      self.api.url.clone()
    } else {
      format!("{}/", self.api.url)
    };
    Url::parse(&raw).map_err(|e| eyre!("Invalid api.url '{}': {}", self.api.url, e))
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_parses_with_default_timeout() {
    let config: Config = serde_yaml::from_str("api:\n  url: http://localhost:8080/api\n").unwrap();
    assert_eq!(config.api.timeout_secs, 10);
    assert_eq!(config.default_page_size, None);
  }

  #[test]
  fn test_base_url_gains_trailing_slash() {
    let config: Config = serde_yaml::from_str("api:\n  url: http://localhost:8080/api\n").unwrap();
    let url = config.base_url().unwrap();
    assert_eq!(url.as_str(), "http://localhost:8080/api/");
    assert_eq!(
      url.join("models/7").unwrap().as_str(),
      "http://localhost:8080/api/models/7"
    );
  }
}
