//! Remote store client for the hosted data service.
//!
//! The hosted service speaks PostgREST (`/rest/v1/<table>`): filters are
//! query parameters (`teacher_id=eq.<id>`), inserts/updates ask for the
//! written rows back with `Prefer: return=representation`.
//! Rows travel as raw JSON; typed mapping happens in `rows`.
//!
//! NOTE: We never log the API key, only table names, row counts and latencies.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::util::trunc_for_log;

pub const TEACHERS: &str = "teachers";
pub const STUDENTS: &str = "students";
pub const STUDENT_ACTIVITIES: &str = "student_activities";
pub const CLASS_ROOMS: &str = "class_rooms";
pub const ACCESS_CODES: &str = "access_codes";
pub const MATH_PROBLEMS: &str = "math_problems";
pub const VOCABULARY_WORDS: &str = "vocabulary_words";
pub const GRAMMAR_RULES: &str = "grammar_rules";
pub const QUIZ_QUESTIONS: &str = "quiz_questions";
pub const USER_PROGRESS: &str = "user_progress";
pub const ACHIEVEMENTS: &str = "achievements";

/// Either the hosted service or an in-process stand-in.
pub enum RemoteStore {
  Rest(RestRemote),
  Memory(MemoryRemote),
}

impl RemoteStore {
  /// Build the HTTP client when both URL and key are configured; otherwise None.
  pub fn from_config(cfg: &RemoteConfig) -> Option<Self> {
    let url = cfg.url.as_deref().filter(|s| !s.is_empty())?;
    let key = cfg.api_key.as_deref().filter(|s| !s.is_empty())?;
    RestRemote::new(url, key, Duration::from_secs(cfg.timeout_secs)).map(RemoteStore::Rest)
  }

  pub async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, RemoteError> {
    match self {
      RemoteStore::Rest(r) => r.select(table, column, value).await,
      RemoteStore::Memory(m) => m.select(table, column, value).await,
    }
  }

  pub async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, RemoteError> {
    match self {
      RemoteStore::Rest(r) => r.insert(table, rows).await,
      RemoteStore::Memory(m) => m.insert(table, rows).await,
    }
  }

  pub async fn update(&self, table: &str, id: &str, row: Value) -> Result<(), RemoteError> {
    match self {
      RemoteStore::Rest(r) => r.update(table, id, row).await,
      RemoteStore::Memory(m) => m.update(table, id, row).await,
    }
  }

  pub async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
    match self {
      RemoteStore::Rest(r) => r.delete(table, id).await,
      RemoteStore::Memory(m) => m.delete(table, id).await,
    }
  }
}

pub struct RestRemote {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
}

impl RestRemote {
  pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Option<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build().ok()?;
    Some(Self {
      client,
      api_key: api_key.to_string(),
      base_url: base_url.trim_end_matches('/').to_string(),
    })
  }

  fn table_url(&self, table: &str) -> String {
    format!("{}/rest/v1/{}", self.base_url, table)
  }

  fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
    self.client.request(method, self.table_url(table))
      .header(USER_AGENT, "classdesk-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("apikey", &self.api_key)
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
  }

  #[instrument(level = "debug", skip(self), fields(%table))]
  async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, RemoteError> {
    let started = Instant::now();
    let res = self.request(reqwest::Method::GET, table)
      .query(&[("select", "*".to_string()), (column, format!("eq.{value}"))])
      .send().await?;
    let rows: Vec<Value> = check(res).await?.json().await?;
    debug!(target: "sync", %table, rows = rows.len(), ms = started.elapsed().as_millis() as u64, "Remote select");
    Ok(rows)
  }

  #[instrument(level = "debug", skip(self, rows), fields(%table, count = rows.len()))]
  async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, RemoteError> {
    let res = self.request(reqwest::Method::POST, table)
      .header("Prefer", "return=representation")
      .json(&rows)
      .send().await?;
    Ok(check(res).await?.json().await?)
  }

  #[instrument(level = "debug", skip(self, row), fields(%table, %id))]
  async fn update(&self, table: &str, id: &str, row: Value) -> Result<(), RemoteError> {
    let res = self.request(reqwest::Method::PATCH, table)
      .query(&[("id", format!("eq.{id}"))])
      .json(&row)
      .send().await?;
    check(res).await?;
    Ok(())
  }

  #[instrument(level = "debug", skip(self), fields(%table, %id))]
  async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
    let res = self.request(reqwest::Method::DELETE, table)
      .query(&[("id", format!("eq.{id}"))])
      .send().await?;
    check(res).await?;
    Ok(())
  }
}

async fn check(res: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
  if res.status().is_success() {
    return Ok(res);
  }
  let status = res.status().as_u16();
  let body = res.text().await.unwrap_or_default();
  let message = extract_error_message(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
  Err(RemoteError::Status { status, message })
}

/// PostgREST errors look like `{"message": "...", "code": "..."}`.
fn extract_error_message(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct PgError { message: String }
  serde_json::from_str::<PgError>(body).ok().map(|e| e.message)
}

/// In-process tables. Used when no hosted service is configured and in tests,
/// where `set_offline(true)` makes every call fail like a dropped network.
#[derive(Default)]
pub struct MemoryRemote {
  tables: RwLock<HashMap<String, Vec<Value>>>,
  offline: AtomicBool,
}

impl MemoryRemote {
  pub fn new() -> Self { Self::default() }

  pub fn set_offline(&self, offline: bool) {
    info!(target: "sync", offline, "Memory remote connectivity changed");
    self.offline.store(offline, Ordering::SeqCst);
  }

  fn online(&self) -> Result<(), RemoteError> {
    if self.offline.load(Ordering::SeqCst) { Err(RemoteError::Offline) } else { Ok(()) }
  }

  /// All rows of a table regardless of filters.
  pub async fn dump(&self, table: &str) -> Vec<Value> {
    self.tables.read().await.get(table).cloned().unwrap_or_default()
  }

  async fn select(&self, table: &str, column: &str, value: &str) -> Result<Vec<Value>, RemoteError> {
    self.online()?;
    let tables = self.tables.read().await;
    Ok(tables.get(table)
      .map(|rows| rows.iter().filter(|r| r.get(column).and_then(Value::as_str) == Some(value)).cloned().collect())
      .unwrap_or_default())
  }

  async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, RemoteError> {
    self.online()?;
    let mut tables = self.tables.write().await;
    let stored = tables.entry(table.to_string()).or_default();
    for row in &rows {
      let id = row.get("id").and_then(Value::as_str);
      if let Some(id) = id {
        if stored.iter().any(|r| r.get("id").and_then(Value::as_str) == Some(id)) {
          return Err(RemoteError::Status { status: 409, message: format!("duplicate key id={id}") });
        }
      }
    }
    stored.extend(rows.iter().cloned());
    Ok(rows)
  }

  async fn update(&self, table: &str, id: &str, row: Value) -> Result<(), RemoteError> {
    self.online()?;
    let mut tables = self.tables.write().await;
    let stored = tables.entry(table.to_string()).or_default();
    if let Some(existing) = stored.iter_mut().find(|r| r.get("id").and_then(Value::as_str) == Some(id)) {
      if let (Some(dst), Some(src)) = (existing.as_object_mut(), row.as_object()) {
        for (k, v) in src {
          dst.insert(k.clone(), v.clone());
        }
      }
    }
    Ok(())
  }

  async fn delete(&self, table: &str, id: &str) -> Result<(), RemoteError> {
    self.online()?;
    let mut tables = self.tables.write().await;
    if let Some(stored) = tables.get_mut(table) {
      stored.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
    }
    Ok(())
  }
}
