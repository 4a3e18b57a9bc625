//! Loading service configuration from TOML plus a few environment overrides.
//!
//! See `AppConfig` for the expected schema. Every section is optional.

use serde::Deserialize;
use tracing::{error, info};

use crate::settings::AccessCodeSettings;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)] pub remote: RemoteConfig,
  #[serde(default)] pub storage: StorageConfig,
  /// Installation-wide defaults for the access-code settings key.
  #[serde(default)] pub access_codes: AccessCodeSettings,
  #[serde(default)] pub runner: RunnerConfig,
  #[serde(default)] pub notifications: NotificationConfig,
  #[serde(default)] pub sample: SampleConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoteConfig {
  #[serde(default)] pub url: Option<String>,
  #[serde(default)] pub api_key: Option<String>,
  #[serde(default = "default_timeout_secs")] pub timeout_secs: u64,
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self { url: None, api_key: None, timeout_secs: default_timeout_secs() }
  }
}

fn default_timeout_secs() -> u64 { 15 }

#[derive(Clone, Debug, Deserialize, Default)]
pub struct StorageConfig {
  /// Directory for the JSON local cache. In-memory when unset.
  #[serde(default)] pub data_dir: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RunnerConfig {
  #[serde(default = "default_question_seconds")] pub question_seconds: u64,
  #[serde(default = "default_advance_delay_ms")] pub advance_delay_ms: u64,
  /// Sessions nobody touched for this long are dropped.
  #[serde(default = "default_idle_session_secs")] pub idle_session_secs: u64,
  /// Completed or failed sessions are dropped sooner.
  #[serde(default = "default_finished_session_secs")] pub finished_session_secs: u64,
}

impl Default for RunnerConfig {
  fn default() -> Self {
    Self {
      question_seconds: default_question_seconds(),
      advance_delay_ms: default_advance_delay_ms(),
      idle_session_secs: default_idle_session_secs(),
      finished_session_secs: default_finished_session_secs(),
    }
  }
}

fn default_question_seconds() -> u64 { 60 }
fn default_advance_delay_ms() -> u64 { 2000 }
fn default_idle_session_secs() -> u64 { 1800 }
fn default_finished_session_secs() -> u64 { 300 }

#[derive(Clone, Debug, Deserialize)]
pub struct NotificationConfig {
  #[serde(default = "default_ttl_secs")] pub ttl_secs: u64,
}

impl Default for NotificationConfig {
  fn default() -> Self { Self { ttl_secs: default_ttl_secs() } }
}

fn default_ttl_secs() -> u64 { 3 }

/// Shape of the placeholder data produced when nothing else is available.
#[derive(Clone, Debug, Deserialize)]
pub struct SampleConfig {
  /// Fixed seed for reproducible placeholder data; random when unset.
  #[serde(default)] pub seed: Option<u64>,
  #[serde(default = "default_students")] pub students: usize,
  #[serde(default = "default_activities")] pub activities: usize,
  #[serde(default = "default_codes")] pub access_codes: usize,
}

impl Default for SampleConfig {
  fn default() -> Self {
    Self { seed: None, students: default_students(), activities: default_activities(), access_codes: default_codes() }
  }
}

fn default_students() -> usize { 8 }
fn default_activities() -> usize { 20 }
fn default_codes() -> usize { 3 }

/// Read CLASSDESK_CONFIG_PATH if set, then apply REMOTE_URL / REMOTE_API_KEY /
/// DATA_DIR overrides. Parse or IO errors are logged and defaults are used.
pub fn load_config_from_env() -> AppConfig {
  let mut cfg = std::env::var("CLASSDESK_CONFIG_PATH")
    .ok()
    .and_then(|path| match std::fs::read_to_string(&path) {
      Ok(s) => match parse_config(&s) {
        Ok(cfg) => {
          info!(target: "classdesk", %path, "Loaded config (TOML)");
          Some(cfg)
        }
        Err(e) => {
          error!(target: "classdesk", %path, error = %e, "Failed to parse TOML config");
          None
        }
      },
      Err(e) => {
        error!(target: "classdesk", %path, error = %e, "Failed to read TOML config file");
        None
      }
    })
    .unwrap_or_default();

  if let Ok(url) = std::env::var("REMOTE_URL") { cfg.remote.url = Some(url); }
  if let Ok(key) = std::env::var("REMOTE_API_KEY") { cfg.remote.api_key = Some(key); }
  if let Ok(dir) = std::env::var("DATA_DIR") { cfg.storage.data_dir = Some(dir); }
  cfg
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.runner.question_seconds, 60);
    assert_eq!(cfg.notifications.ttl_secs, 3);
    assert_eq!(cfg.access_codes.teacher_code_limit, 20);
    assert!(cfg.remote.url.is_none());
  }

  #[test]
  fn sections_override_defaults() {
    let cfg = parse_config(r#"
      [remote]
      url = "https://db.example.test"
      api_key = "anon"

      [access_codes]
      teacherCodeLimit = 5
      requireExpiry = true

      [sample]
      seed = 7
    "#).unwrap();
    assert_eq!(cfg.remote.url.as_deref(), Some("https://db.example.test"));
    assert_eq!(cfg.remote.timeout_secs, 15);
    assert_eq!(cfg.access_codes.teacher_code_limit, 5);
    assert!(cfg.access_codes.require_expiry);
    assert_eq!(cfg.sample.seed, Some(7));
    assert_eq!(cfg.sample.students, 8);
  }
}
