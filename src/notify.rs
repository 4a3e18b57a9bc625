//! Transient toast notifications.
//!
//! An ordered queue the frontend polls and renders. Entries are pushed when a
//! mutation succeeds or a remote write fails, and leave the queue when they
//! expire or the user dismisses them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
  Success,
  Info,
  Warning,
  Error,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
  pub id: u64,
  pub kind: NoticeKind,
  pub message: String,
  pub expires_at: DateTime<Utc>,
}

pub struct Notifications {
  next_id: AtomicU64,
  ttl: Duration,
  queue: Mutex<VecDeque<Notification>>,
}

impl Notifications {
  pub fn new(ttl: std::time::Duration) -> Self {
    Self {
      next_id: AtomicU64::new(1),
      ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(3)),
      queue: Mutex::new(VecDeque::new()),
    }
  }

  pub fn push(&self, kind: NoticeKind, message: impl Into<String>) -> u64 {
    self.push_at(kind, message, Utc::now())
  }

  pub fn push_at(&self, kind: NoticeKind, message: impl Into<String>, now: DateTime<Utc>) -> u64 {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let n = Notification { id, kind, message: message.into(), expires_at: now + self.ttl };
    debug!(target: "classdesk", id, kind = ?n.kind, message = %n.message, "Notification queued");
    self.lock().push_back(n);
    id
  }

  /// Returns whether the id was present.
  pub fn dismiss(&self, id: u64) -> bool {
    let mut q = self.lock();
    let before = q.len();
    q.retain(|n| n.id != id);
    q.len() != before
  }

  /// Drop everything expired at `now`; returns how many were dropped.
  pub fn expire(&self, now: DateTime<Utc>) -> usize {
    let mut q = self.lock();
    let before = q.len();
    q.retain(|n| n.expires_at > now);
    before - q.len()
  }

  pub fn active(&self, now: DateTime<Utc>) -> Vec<Notification> {
    self.lock().iter().filter(|n| n.expires_at > now).cloned().collect()
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Notification>> {
    self.queue.lock().unwrap_or_else(|p| p.into_inner())
  }
}
