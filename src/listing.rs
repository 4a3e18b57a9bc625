//! Filtering, sorting and pagination for the management screens.
//!
//! All sorts are stable and idempotent. Records missing the sort key
//! (no expiry, never active) stay after every record that has one,
//! whichever direction is requested.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access_codes::code_status;
use crate::domain::{AccessCode, CodeStatus, Student};

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  #[default]
  Asc,
  Desc,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodeSort {
  CreatedAt,
  ExpiresAt,
  Grade,
  UsageCount,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StudentSort {
  Name,
  Grade,
  Score,
  LastActive,
}

/// Case-insensitive substring match of `query` against any of `fields`.
/// An empty query matches everything.
pub fn matches_search(query: &str, fields: &[&str]) -> bool {
  let q = query.trim().to_lowercase();
  q.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&q))
}

fn directed(ord: Ordering, dir: Direction) -> Ordering {
  match dir {
    Direction::Asc => ord,
    Direction::Desc => ord.reverse(),
  }
}

/// Present values ordered by `dir`; absent values always last.
fn optional_last<T: Ord>(a: Option<T>, b: Option<T>, dir: Direction) -> Ordering {
  match (a, b) {
    (Some(x), Some(y)) => directed(x.cmp(&y), dir),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  }
}

pub fn sort_codes(codes: &mut [AccessCode], key: CodeSort, dir: Direction) {
  codes.sort_by(|a, b| match key {
    CodeSort::CreatedAt => directed(a.created_at.cmp(&b.created_at), dir),
    CodeSort::ExpiresAt => optional_last(a.expires_at, b.expires_at, dir),
    CodeSort::Grade => directed(a.grade.cmp(&b.grade), dir),
    CodeSort::UsageCount => directed(a.usage_count.cmp(&b.usage_count), dir),
  });
}

pub fn filter_codes(
  codes: Vec<AccessCode>,
  search: &str,
  grade: Option<u8>,
  status: Option<CodeStatus>,
  now: DateTime<Utc>,
) -> Vec<AccessCode> {
  codes
    .into_iter()
    .filter(|c| matches_search(search, &[c.code.as_str(), c.description.as_str()]))
    .filter(|c| grade.map_or(true, |g| c.grade == g))
    .filter(|c| status.map_or(true, |s| code_status(c, now) == s))
    .collect()
}

pub fn sort_students(students: &mut [Student], key: StudentSort, dir: Direction) {
  students.sort_by(|a, b| match key {
    StudentSort::Name => directed(a.name.to_lowercase().cmp(&b.name.to_lowercase()), dir),
    StudentSort::Grade => directed(a.grade.cmp(&b.grade), dir),
    StudentSort::Score => directed(a.progress.score.cmp(&b.progress.score), dir),
    StudentSort::LastActive => optional_last(a.last_active, b.last_active, dir),
  });
}

pub fn filter_students(students: Vec<Student>, search: &str, grade: Option<u8>) -> Vec<Student> {
  students
    .into_iter()
    .filter(|s| matches_search(search, &[s.name.as_str(), s.student_number.as_str(), s.parent_email.as_str()]))
    .filter(|s| grade.map_or(true, |g| s.grade == g))
    .collect()
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: usize,
  pub per_page: usize,
  pub total: usize,
  pub total_pages: usize,
}

/// 1-based pagination; `page` is clamped into `1..=total_pages`.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
  let per_page = per_page.max(1);
  let total = items.len();
  let total_pages = total.div_ceil(per_page).max(1);
  let page = page.clamp(1, total_pages);
  let items = items.into_iter().skip((page - 1) * per_page).take(per_page).collect();
  Page { items, page, per_page, total, total_pages }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  fn code(id: &str, created_days_ago: i64, expires_in: Option<i64>) -> AccessCode {
    let now = Utc::now();
    AccessCode {
      id: id.into(),
      teacher_id: "t".into(),
      code: format!("CODE{id}"),
      grade: 1,
      description: String::new(),
      expires_at: expires_in.map(|d| now + Duration::days(d)),
      max_usage: None,
      usage_count: 0,
      is_active: true,
      class_id: None,
      student_id: None,
      created_at: now - Duration::days(created_days_ago),
    }
  }

  fn ids(codes: &[AccessCode]) -> Vec<&str> {
    codes.iter().map(|c| c.id.as_str()).collect()
  }

  #[test]
  fn expiry_ascending_puts_undated_last_and_is_idempotent() {
    let mut codes = vec![
      code("a", 1, None),
      code("b", 2, Some(30)),
      code("c", 3, None),
      code("d", 4, Some(5)),
    ];
    sort_codes(&mut codes, CodeSort::ExpiresAt, Direction::Asc);
    assert_eq!(ids(&codes), vec!["d", "b", "a", "c"]);
    let once = codes.clone();
    sort_codes(&mut codes, CodeSort::ExpiresAt, Direction::Asc);
    assert_eq!(codes, once);
  }

  #[test]
  fn expiry_descending_still_puts_undated_last() {
    let mut codes = vec![code("a", 1, None), code("b", 2, Some(30)), code("d", 4, Some(5))];
    sort_codes(&mut codes, CodeSort::ExpiresAt, Direction::Desc);
    assert_eq!(ids(&codes), vec!["b", "d", "a"]);
  }

  #[test]
  fn search_is_case_insensitive_over_fields() {
    assert!(matches_search("LAY", &["Layla Haddad", ""]));
    assert!(matches_search("", &["anything"]));
    assert!(!matches_search("zz", &["Layla", "1001"]));
  }

  #[test]
  fn filter_by_status() {
    let mut expired = code("x", 1, Some(-1));
    expired.code = "OLD22222".into();
    let codes = vec![code("a", 1, None), expired];
    let active = filter_codes(codes.clone(), "", None, Some(CodeStatus::Active), Utc::now());
    assert_eq!(ids(&active), vec!["a"]);
    let found = filter_codes(codes, "old", None, None, Utc::now());
    assert_eq!(ids(&found), vec!["x"]);
  }

  #[test]
  fn pagination_clamps() {
    let p = paginate((1..=25).collect::<Vec<_>>(), 9, 10);
    assert_eq!(p.page, 3);
    assert_eq!(p.total_pages, 3);
    assert_eq!(p.items, vec![21, 22, 23, 24, 25]);

    let empty = paginate(Vec::<u8>::new(), 0, 10);
    assert_eq!(empty.page, 1);
    assert_eq!(empty.total_pages, 1);
    assert!(empty.items.is_empty());
  }
}
