//! Synchronized read-through cache shared by every entity service.
//!
//! Read path, per owner id:
//!   1) remote select on the owner column; non-empty → overwrite local cache
//!   2) otherwise the local cache (`<entity>-data-<ownerId>`)
//!   3) otherwise generated placeholder data, stored locally and mirrored to
//!      the remote on a best-effort basis
//!
//! Write path: apply to the in-memory list, rewrite the local cache, then try
//! the remote. A failed remote write is logged and queued as a warning
//! notification; the caller never sees it. After any mutation returns, the
//! in-memory list and the local cache hold the same records; a failed local
//! write is queued as a warning as well.
//!
//! Some records keep parts of themselves in companion tables (student progress
//! and achievements). Those rows are selected by the same owner column and
//! handed back to the record on load; on write only the rows that changed are
//! inserted, updated or deleted.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RemoteError;
use crate::notify::{NoticeKind, Notifications};
use crate::remote::RemoteStore;
use crate::storage::{cache_key, KeyValueStore};

/// A record mirrored between the remote table and the local cache.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
  /// Local cache key prefix.
  const ENTITY: &'static str;
  const TABLE: &'static str;
  /// Column holding the owner id remotely.
  const OWNER_COLUMN: &'static str;
  /// Remote tables holding parts of this record, keyed by `OWNER_COLUMN`.
  const COMPANION_TABLES: &'static [&'static str] = &[];
  type Row: Serialize + DeserializeOwned;

  fn id(&self) -> &str;
  fn to_row(&self, owner_id: &str) -> Self::Row;
  fn from_row(row: Self::Row) -> Self;

  /// `(table, row id, row)` for every companion row this record owns.
  fn companion_rows(&self, _owner_id: &str) -> Vec<CompanionRow> {
    Vec::new()
  }

  /// Fold the rows of one companion table back in. `rows` holds every row of
  /// `table` for the owner; pick out your own.
  fn attach_companions(&mut self, _table: &str, _rows: &[Value]) {}
}

pub struct CompanionRow {
  pub table: &'static str,
  pub id: String,
  pub row: Value,
}

/// Where a loaded list came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  Remote,
  Local,
  Generated,
}

/// Collaborators shared by every collection.
#[derive(Clone)]
pub struct SyncContext {
  pub remote: Option<Arc<RemoteStore>>,
  pub local: Arc<dyn KeyValueStore>,
  pub notices: Arc<Notifications>,
}

pub struct SyncedCollection<R: Record> {
  ctx: SyncContext,
  items: RwLock<HashMap<String, Vec<R>>>,
}

impl<R: Record> SyncedCollection<R> {
  pub fn new(ctx: SyncContext) -> Self {
    Self { ctx, items: RwLock::new(HashMap::new()) }
  }

  /// Full three-tier load; replaces whatever is held in memory for `owner`.
  #[instrument(level = "info", skip(self, generate), fields(entity = R::ENTITY, %owner))]
  pub async fn load<F>(&self, owner: &str, generate: F) -> (Vec<R>, Origin)
  where
    F: FnOnce() -> Vec<R>,
  {
    let (list, origin) = match self.fetch_remote(owner).await {
      Ok(rows) if !rows.is_empty() => {
        self.write_local(owner, &rows);
        (rows, Origin::Remote)
      }
      Ok(_) => self.local_or_generated(owner, generate).await,
      Err(e) => {
        warn!(target: "sync", entity = R::ENTITY, %owner, error = %e, "Remote fetch failed; falling back to local cache");
        self.local_or_generated(owner, generate).await
      }
    };
    info!(target: "sync", entity = R::ENTITY, %owner, count = list.len(), ?origin, "Loaded collection");
    self.items.write().await.insert(owner.to_string(), list.clone());
    (list, origin)
  }

  /// In-memory list, loading it first if this owner was never loaded.
  pub async fn ensure_loaded<F>(&self, owner: &str, generate: F) -> Vec<R>
  where
    F: FnOnce() -> Vec<R>,
  {
    if let Some(list) = self.items(owner).await {
      return list;
    }
    self.load(owner, generate).await.0
  }

  pub async fn items(&self, owner: &str) -> Option<Vec<R>> {
    self.items.read().await.get(owner).cloned()
  }

  pub async fn get(&self, owner: &str, id: &str) -> Option<R> {
    self.items.read().await.get(owner).and_then(|l| l.iter().find(|r| r.id() == id).cloned())
  }

  /// What the local cache currently holds for `owner`.
  pub fn cached(&self, owner: &str) -> Option<Vec<R>> {
    self.read_local(owner)
  }

  #[instrument(level = "debug", skip(self, record), fields(entity = R::ENTITY, %owner, id = %record.id()))]
  pub async fn create(&self, owner: &str, record: R) -> R {
    self.create_many(owner, vec![record.clone()]).await;
    record
  }

  /// Append several records with one local write and one remote insert.
  pub async fn create_many(&self, owner: &str, records: Vec<R>) {
    if records.is_empty() {
      return;
    }
    {
      let mut items = self.items.write().await;
      let list = items.entry(owner.to_string()).or_default();
      list.extend(records.iter().cloned());
      self.write_local(owner, list);
    }
    let rows = records.iter().filter_map(|r| row_value(r, owner)).collect::<Vec<_>>();
    if let Some(remote) = &self.ctx.remote {
      if let Err(e) = remote.insert(R::TABLE, rows).await {
        self.remote_write_failed("insert", owner, &e);
        return;
      }
      for rec in &records {
        self.sync_companions(remote, owner, None, Some(rec)).await;
      }
    }
  }

  /// Apply `f` to the record with `id`; None when it is not held.
  #[instrument(level = "debug", skip(self, f), fields(entity = R::ENTITY, %owner, %id))]
  pub async fn update<F>(&self, owner: &str, id: &str, f: F) -> Option<R>
  where
    F: FnOnce(&mut R),
  {
    let (before, updated) = {
      let mut items = self.items.write().await;
      let list = items.get_mut(owner)?;
      let rec = list.iter_mut().find(|r| r.id() == id)?;
      let before = rec.clone();
      f(rec);
      let updated = rec.clone();
      self.write_local(owner, list);
      (before, updated)
    };
    self.push_update(owner, &before, &updated).await;
    Some(updated)
  }

  /// Apply `f` to every record held for `owner`, writing back the ones it
  /// reports as changed.
  pub async fn update_where<F>(&self, owner: &str, mut f: F) -> usize
  where
    F: FnMut(&mut R) -> bool,
  {
    let changed: Vec<(R, R)> = {
      let mut items = self.items.write().await;
      let Some(list) = items.get_mut(owner) else { return 0 };
      let mut changed = Vec::new();
      for rec in list.iter_mut() {
        let before = rec.clone();
        if f(rec) {
          changed.push((before, rec.clone()));
        }
      }
      if !changed.is_empty() {
        self.write_local(owner, list);
      }
      changed
    };
    for (before, after) in &changed {
      self.push_update(owner, before, after).await;
    }
    changed.len()
  }

  #[instrument(level = "debug", skip(self), fields(entity = R::ENTITY, %owner, %id))]
  pub async fn delete(&self, owner: &str, id: &str) -> Option<R> {
    let removed = {
      let mut items = self.items.write().await;
      let list = items.get_mut(owner)?;
      let pos = list.iter().position(|r| r.id() == id)?;
      let removed = list.remove(pos);
      self.write_local(owner, list);
      removed
    };
    if let Some(remote) = &self.ctx.remote {
      if let Err(e) = remote.delete(R::TABLE, id).await {
        self.remote_write_failed("delete", owner, &e);
      } else {
        self.sync_companions(remote, owner, Some(&removed), None).await;
      }
    }
    Some(removed)
  }

  async fn fetch_remote(&self, owner: &str) -> Result<Vec<R>, RemoteError> {
    let remote = self.ctx.remote.as_ref().ok_or(RemoteError::Disabled)?;
    let rows = remote.select(R::TABLE, R::OWNER_COLUMN, owner).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
      match serde_json::from_value::<R::Row>(row) {
        Ok(r) => out.push(R::from_row(r)),
        Err(e) => warn!(target: "sync", entity = R::ENTITY, error = %e, "Skipping undecodable remote row"),
      }
    }
    if out.is_empty() {
      return Ok(out);
    }
    for table in R::COMPANION_TABLES {
      let rows = remote.select(table, R::OWNER_COLUMN, owner).await?;
      for rec in &mut out {
        rec.attach_companions(table, &rows);
      }
    }
    Ok(out)
  }

  async fn push_update(&self, owner: &str, before: &R, after: &R) {
    let (Some(remote), Some(row)) = (&self.ctx.remote, row_value(after, owner)) else { return };
    if let Err(e) = remote.update(R::TABLE, after.id(), row).await {
      self.remote_write_failed("update", owner, &e);
      return;
    }
    self.sync_companions(remote, owner, Some(before), Some(after)).await;
  }

  /// Write the companion rows that differ between `before` and `after`.
  async fn sync_companions(&self, remote: &RemoteStore, owner: &str, before: Option<&R>, after: Option<&R>) {
    let old = before.map(|r| r.companion_rows(owner)).unwrap_or_default();
    let new = after.map(|r| r.companion_rows(owner)).unwrap_or_default();
    for row in &old {
      if !new.iter().any(|n| n.table == row.table && n.id == row.id) {
        if let Err(e) = remote.delete(row.table, &row.id).await {
          self.remote_write_failed("delete", owner, &e);
        }
      }
    }
    let mut inserts: HashMap<&'static str, Vec<Value>> = HashMap::new();
    for row in new {
      match old.iter().find(|o| o.table == row.table && o.id == row.id) {
        Some(o) if o.row == row.row => {}
        Some(_) => {
          if let Err(e) = remote.update(row.table, &row.id, row.row).await {
            self.remote_write_failed("update", owner, &e);
          }
        }
        None => inserts.entry(row.table).or_default().push(row.row),
      }
    }
    for (table, rows) in inserts {
      if let Err(e) = remote.insert(table, rows).await {
        self.remote_write_failed("insert", owner, &e);
      }
    }
  }

  async fn local_or_generated<F>(&self, owner: &str, generate: F) -> (Vec<R>, Origin)
  where
    F: FnOnce() -> Vec<R>,
  {
    if let Some(list) = self.read_local(owner) {
      return (list, Origin::Local);
    }
    let list = generate();
    self.write_local(owner, &list);
    if let Some(remote) = &self.ctx.remote {
      let rows = list.iter().filter_map(|r| row_value(r, owner)).collect::<Vec<_>>();
      if !rows.is_empty() {
        // Mirror failure is expected when offline and carries no consequence.
        if let Err(e) = remote.insert(R::TABLE, rows).await {
          debug!(target: "sync", entity = R::ENTITY, %owner, error = %e, "Mirroring generated data failed");
          return (list, Origin::Generated);
        }
      }
      let mut companions: HashMap<&'static str, Vec<Value>> = HashMap::new();
      for c in list.iter().flat_map(|r| r.companion_rows(owner)) {
        companions.entry(c.table).or_default().push(c.row);
      }
      for (table, rows) in companions {
        if let Err(e) = remote.insert(table, rows).await {
          debug!(target: "sync", entity = R::ENTITY, %owner, %table, error = %e, "Mirroring generated data failed");
        }
      }
    }
    (list, Origin::Generated)
  }

  fn read_local(&self, owner: &str) -> Option<Vec<R>> {
    let value = self.ctx.local.get(&cache_key(R::ENTITY, owner))?;
    match serde_json::from_value::<Vec<R>>(value) {
      Ok(list) => Some(list),
      Err(e) => {
        warn!(target: "sync", entity = R::ENTITY, %owner, error = %e, "Local cache entry unreadable; ignoring it");
        None
      }
    }
  }

  fn write_local(&self, owner: &str, list: &[R]) {
    let key = cache_key(R::ENTITY, owner);
    let result = serde_json::to_value(list)
      .map_err(crate::error::StorageError::from)
      .and_then(|v| self.ctx.local.set(&key, v));
    if let Err(e) = result {
      error!(target: "sync", %key, error = %e, "Failed to write local cache");
      self.ctx.notices.push(
        NoticeKind::Warning,
        format!("Could not save {} on this device; changes may be lost on reload", R::ENTITY),
      );
    }
  }

  fn remote_write_failed(&self, op: &str, owner: &str, e: &RemoteError) {
    if matches!(e, RemoteError::Disabled) {
      return;
    }
    error!(target: "sync", entity = R::ENTITY, %owner, op, error = %e, "Remote write failed; kept local change");
    self.ctx.notices.push(
      NoticeKind::Warning,
      format!("Saved on this device only: could not sync {} to the server", R::ENTITY),
    );
  }
}

fn row_value<R: Record>(record: &R, owner: &str) -> Option<Value> {
  match serde_json::to_value(record.to_row(owner)) {
    Ok(v) => Some(v),
    Err(e) => {
      error!(target: "sync", entity = R::ENTITY, error = %e, "Failed to encode remote row");
      None
    }
  }
}
