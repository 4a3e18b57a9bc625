//! Public HTTP request/response structs (serde ready).
//! Domain records are served as-is; these cover queries, small bodies and
//! response envelopes.

use serde::{Deserialize, Serialize};

use crate::domain::CodeStatus;
use crate::listing::{CodeSort, Direction, StudentSort};
use crate::notify::Notification;
use crate::sync::Origin;

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub remote: bool,
}

/// Listing query for `GET .../students`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentQuery {
    #[serde(default)]
    pub search: String,
    pub grade: Option<u8>,
    pub sort: Option<StudentSort>,
    #[serde(default)]
    pub dir: Direction,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

/// Listing query for `GET .../access-codes`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeQuery {
    #[serde(default)]
    pub search: String,
    pub grade: Option<u8>,
    pub status: Option<CodeStatus>,
    pub sort: Option<CodeSort>,
    #[serde(default)]
    pub dir: Direction,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionOut<T> {
    pub items: Vec<T>,
    pub origin: Origin,
}

#[derive(Serialize)]
pub struct GeneratedCodeOut {
    pub code: String,
}

#[derive(Deserialize)]
pub struct RedeemIn {
    pub code: String,
}

#[derive(Deserialize)]
pub struct ActiveIn {
    pub active: bool,
}

/// `author` owns authored content; defaults to the shared library.
#[derive(Debug, Deserialize)]
pub struct AuthorQuery {
    pub author: Option<String>,
}

pub const SHARED_AUTHOR: &str = "shared";

impl AuthorQuery {
    pub fn author(&self) -> &str {
        self.author.as_deref().unwrap_or(SHARED_AUTHOR)
    }
}

#[derive(Serialize)]
pub struct NotificationsOut {
    pub items: Vec<Notification>,
}

#[derive(Deserialize)]
pub struct RunnerStartIn {
    pub skill: String,
    pub author: Option<String>,
}

#[derive(Deserialize)]
pub struct RunnerAnswerIn {
    /// `null` submits no answer.
    pub choice: Option<usize>,
}
