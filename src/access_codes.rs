//! Access codes: the shared secrets a teacher hands to a student cohort.
//!
//! Every check here runs against the codes this teacher currently has loaded.
//! Nothing enforces uniqueness across teachers; the remote table is expected
//! to carry that constraint if it matters.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info, instrument};

use crate::domain::{AccessCode, AccessCodePatch, CodeStatus, NewAccessCode};
use crate::error::DashboardError;
use crate::notify::NoticeKind;
use crate::seeds::{random_id, sample_access_codes};
use crate::state::AppState;
use crate::sync::Origin;

/// No 0/O or 1/I to avoid misreading printed codes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 8;

/// Random 8-character code not present in `existing`.
pub fn generate_random_code(existing: &[&str], rng: &mut impl Rng) -> String {
  loop {
    let code: String = (0..CODE_LENGTH)
      .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
      .collect();
    if !existing.contains(&code.as_str()) {
      return code;
    }
  }
}

pub fn normalize_code(raw: &str) -> String {
  raw.trim().to_uppercase()
}

/// Custom codes: 4..=16 characters from the code alphabet.
pub fn is_valid_code(code: &str) -> bool {
  (4..=16).contains(&code.len()) && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

pub fn code_status(code: &AccessCode, now: DateTime<Utc>) -> CodeStatus {
  if !code.is_active {
    CodeStatus::Inactive
  } else if code.expires_at.is_some_and(|t| t <= now) {
    CodeStatus::Expired
  } else if code.max_usage.is_some_and(|max| code.usage_count >= max) {
    CodeStatus::Exhausted
  } else {
    CodeStatus::Active
  }
}

fn generate_sample(state: &AppState, teacher_id: &str) -> Vec<AccessCode> {
  let n = state.config.sample.access_codes;
  state.with_rng(|rng| sample_access_codes(teacher_id, n, Utc::now(), rng))
}

#[instrument(level = "info", skip(state), fields(%teacher_id))]
pub async fn load_codes(state: &AppState, teacher_id: &str) -> (Vec<AccessCode>, Origin) {
  state.access_codes.load(teacher_id, || generate_sample(state, teacher_id)).await
}

pub async fn current_codes(state: &AppState, teacher_id: &str) -> Vec<AccessCode> {
  state.access_codes.ensure_loaded(teacher_id, || generate_sample(state, teacher_id)).await
}

/// A fresh code unique within this teacher's loaded set.
pub async fn suggest_code(state: &AppState, teacher_id: &str) -> String {
  let codes = current_codes(state, teacher_id).await;
  let existing: Vec<&str> = codes.iter().map(|c| c.code.as_str()).collect();
  state.with_rng(|rng| generate_random_code(&existing, rng))
}

#[instrument(level = "info", skip(state, input), fields(%teacher_id, grade = input.grade))]
pub async fn add_access_code(state: &AppState, teacher_id: &str, input: NewAccessCode) -> Result<AccessCode, DashboardError> {
  let settings = state.code_settings();
  let codes = current_codes(state, teacher_id).await;

  if codes.len() as u64 >= settings.teacher_code_limit as u64 {
    return Err(DashboardError::CodeLimitReached { limit: settings.teacher_code_limit });
  }

  let existing: Vec<&str> = codes.iter().map(|c| c.code.as_str()).collect();
  let code = match input.code.as_deref().map(normalize_code).filter(|c| !c.is_empty()) {
    Some(custom) => {
      if !settings.allow_teacher_custom_codes {
        return Err(DashboardError::CustomCodesDisabled);
      }
      if !is_valid_code(&custom) {
        return Err(DashboardError::InvalidCode(custom));
      }
      if existing.contains(&custom.as_str()) {
        return Err(DashboardError::DuplicateCode(custom));
      }
      custom
    }
    None => state.with_rng(|rng| generate_random_code(&existing, rng)),
  };

  let description = input.description.trim().to_string();
  if settings.require_description && description.is_empty() {
    return Err(DashboardError::MissingField("description"));
  }

  let now = Utc::now();
  let expires_at = match input.expires_at {
    Some(t) => Some(t),
    None if input.use_default_expiry => Some(now + Duration::days(settings.default_expiry_days as i64)),
    None => None,
  };
  if settings.require_expiry && expires_at.is_none() {
    return Err(DashboardError::MissingField("expiresAt"));
  }

  let max_usage = input
    .max_usage
    .or((settings.max_usage_per_code > 0).then_some(settings.max_usage_per_code))
    .filter(|&m| m > 0);

  let record = AccessCode {
    id: state.with_rng(|rng| random_id(rng)),
    teacher_id: teacher_id.to_string(),
    code,
    grade: input.grade,
    description,
    expires_at,
    max_usage,
    usage_count: 0,
    is_active: true,
    class_id: input.class_id,
    student_id: input.student_id,
    created_at: now,
  };
  let record = state.access_codes.create(teacher_id, record).await;
  info!(target: "access_codes", %teacher_id, code = %record.code, total = codes.len() + 1, "Access code created");
  state.notices().push(NoticeKind::Success, format!("Access code {} created", record.code));
  Ok(record)
}

#[instrument(level = "info", skip(state, patch), fields(%teacher_id, %id))]
pub async fn update_access_code(
  state: &AppState,
  teacher_id: &str,
  id: &str,
  patch: AccessCodePatch,
) -> Result<AccessCode, DashboardError> {
  let settings = state.code_settings();
  let codes = current_codes(state, teacher_id).await;
  let current = codes
    .iter()
    .find(|c| c.id == id)
    .ok_or_else(|| DashboardError::NotFound(format!("access code {id}")))?;

  let new_code = match patch.code.as_deref().map(normalize_code) {
    Some(c) if c != current.code => {
      if !settings.allow_teacher_custom_codes {
        return Err(DashboardError::CustomCodesDisabled);
      }
      if !is_valid_code(&c) {
        return Err(DashboardError::InvalidCode(c));
      }
      if codes.iter().any(|other| other.id != id && other.code == c) {
        return Err(DashboardError::DuplicateCode(c));
      }
      Some(c)
    }
    _ => None,
  };
  if let Some(desc) = &patch.description {
    if settings.require_description && desc.trim().is_empty() {
      return Err(DashboardError::MissingField("description"));
    }
  }
  if settings.require_expiry && matches!(patch.expires_at, Some(None)) {
    return Err(DashboardError::MissingField("expiresAt"));
  }

  let updated = state
    .access_codes
    .update(teacher_id, id, |c| {
      if let Some(code) = new_code { c.code = code; }
      if let Some(grade) = patch.grade { c.grade = grade; }
      if let Some(desc) = patch.description { c.description = desc.trim().to_string(); }
      if let Some(exp) = patch.expires_at { c.expires_at = exp; }
      if let Some(max) = patch.max_usage { c.max_usage = max.filter(|&m| m > 0); }
      if let Some(active) = patch.is_active { c.is_active = active; }
    })
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("access code {id}")))?;
  state.notices().push(NoticeKind::Success, format!("Access code {} updated", updated.code));
  Ok(updated)
}

pub async fn set_code_active(state: &AppState, teacher_id: &str, id: &str, active: bool) -> Result<AccessCode, DashboardError> {
  update_access_code(state, teacher_id, id, AccessCodePatch { is_active: Some(active), ..Default::default() }).await
}

#[instrument(level = "info", skip(state), fields(%teacher_id, %id))]
pub async fn delete_access_code(state: &AppState, teacher_id: &str, id: &str) -> Result<AccessCode, DashboardError> {
  current_codes(state, teacher_id).await;
  let removed = state
    .access_codes
    .delete(teacher_id, id)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("access code {id}")))?;
  state.notices().push(NoticeKind::Success, format!("Access code {} deleted", removed.code));
  Ok(removed)
}

/// Count one use of `code`. Fails unless the code is active, unexpired and
/// under its usage cap.
#[instrument(level = "info", skip(state), fields(%teacher_id))]
pub async fn redeem_code(state: &AppState, teacher_id: &str, code: &str) -> Result<AccessCode, DashboardError> {
  let code = normalize_code(code);
  let codes = current_codes(state, teacher_id).await;
  let found = codes
    .iter()
    .find(|c| c.code == code)
    .ok_or_else(|| DashboardError::NotFound(format!("access code {code}")))?;

  let reason = match code_status(found, Utc::now()) {
    CodeStatus::Active => None,
    CodeStatus::Inactive => Some("deactivated"),
    CodeStatus::Expired => Some("expired"),
    CodeStatus::Exhausted => Some("usage limit reached"),
  };
  if let Some(reason) = reason {
    return Err(DashboardError::CodeUnavailable { code, reason });
  }

  state
    .access_codes
    .update(teacher_id, &found.id, |c| c.usage_count += 1)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("access code {code}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::settings::AccessCodeSettings;
  use crate::state::tests::{set_remote_offline, test_state};
  use rand::rngs::StdRng;
  use rand::SeedableRng;

  fn new_code(code: Option<&str>) -> NewAccessCode {
    NewAccessCode { code: code.map(str::to_string), grade: 3, ..Default::default() }
  }

  /// Load an empty list for `teacher` so tests start from a known count.
  async fn empty_teacher(state: &AppState, teacher: &str) {
    state.access_codes.load(teacher, Vec::new).await;
  }

  async fn fill(state: &AppState, teacher: &str, n: usize) {
    for _ in 0..n {
      add_access_code(state, teacher, new_code(None)).await.unwrap();
    }
  }

  #[test]
  fn random_code_shape() {
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..500 {
      let c = generate_random_code(&[], &mut rng);
      assert_eq!(c.len(), CODE_LENGTH);
      assert!(c.bytes().all(|b| CODE_ALPHABET.contains(&b)));
      assert!(!c.contains(['0', 'O', '1', 'I']));
    }
  }

  #[test]
  fn random_code_avoids_existing() {
    let first = generate_random_code(&[], &mut StdRng::seed_from_u64(8));
    // Same seed would reproduce `first`; it must be skipped.
    let second = generate_random_code(&[first.as_str()], &mut StdRng::seed_from_u64(8));
    assert_ne!(first, second);
  }

  #[test]
  fn status_precedence() {
    let now = Utc::now();
    let mut c = AccessCode {
      id: "c".into(),
      teacher_id: "t".into(),
      code: "ABCD2345".into(),
      grade: 1,
      description: String::new(),
      expires_at: Some(now - Duration::days(1)),
      max_usage: Some(2),
      usage_count: 2,
      is_active: true,
      class_id: None,
      student_id: None,
      created_at: now,
    };
    assert_eq!(code_status(&c, now), CodeStatus::Expired);
    c.expires_at = None;
    assert_eq!(code_status(&c, now), CodeStatus::Exhausted);
    c.max_usage = None;
    assert_eq!(code_status(&c, now), CodeStatus::Active);
    c.is_active = false;
    assert_eq!(code_status(&c, now), CodeStatus::Inactive);
  }

  #[tokio::test]
  async fn limit_of_twenty() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    fill(&state, "t1", 19).await;

    let ok = add_access_code(&state, "t1", new_code(None)).await;
    assert!(ok.is_ok());
    assert_eq!(current_codes(&state, "t1").await.len(), 20);

    let before = current_codes(&state, "t1").await;
    let err = add_access_code(&state, "t1", new_code(None)).await.unwrap_err();
    assert!(err.to_string().contains("20"));
    assert_eq!(current_codes(&state, "t1").await, before);
  }

  #[tokio::test]
  async fn duplicate_rejected_without_mutation() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    add_access_code(&state, "t1", new_code(Some("math2345"))).await.unwrap();
    let before = current_codes(&state, "t1").await;

    let err = add_access_code(&state, "t1", new_code(Some(" MATH2345 "))).await.unwrap_err();
    assert_eq!(err, DashboardError::DuplicateCode("MATH2345".into()));
    assert_eq!(current_codes(&state, "t1").await, before);
  }

  #[tokio::test]
  async fn settings_drive_required_fields_and_defaults() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    state.save_code_settings(&AccessCodeSettings {
      require_description: true,
      require_expiry: true,
      allow_teacher_custom_codes: false,
      default_expiry_days: 10,
      max_usage_per_code: 25,
      ..Default::default()
    });

    let err = add_access_code(&state, "t1", new_code(Some("ABCD2345"))).await.unwrap_err();
    assert_eq!(err, DashboardError::CustomCodesDisabled);

    let err = add_access_code(&state, "t1", new_code(None)).await.unwrap_err();
    assert_eq!(err, DashboardError::MissingField("description"));

    let mut input = new_code(None);
    input.description = "Grade 3 spring".into();
    let err = add_access_code(&state, "t1", input.clone()).await.unwrap_err();
    assert_eq!(err, DashboardError::MissingField("expiresAt"));

    input.use_default_expiry = true;
    let code = add_access_code(&state, "t1", input).await.unwrap();
    let days = (code.expires_at.unwrap() - code.created_at).num_days();
    assert_eq!(days, 10);
    assert_eq!(code.max_usage, Some(25));
  }

  #[tokio::test]
  async fn update_checks_duplicates_but_not_against_itself() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    let a = add_access_code(&state, "t1", new_code(Some("AAAA2222"))).await.unwrap();
    add_access_code(&state, "t1", new_code(Some("BBBB3333"))).await.unwrap();

    let same = AccessCodePatch { code: Some("AAAA2222".into()), grade: Some(5), ..Default::default() };
    assert_eq!(update_access_code(&state, "t1", &a.id, same).await.unwrap().grade, 5);

    let clash = AccessCodePatch { code: Some("BBBB3333".into()), ..Default::default() };
    assert!(matches!(update_access_code(&state, "t1", &a.id, clash).await, Err(DashboardError::DuplicateCode(_))));
  }

  #[tokio::test]
  async fn redeem_counts_and_stops_at_cap() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    let mut input = new_code(Some("READ2345"));
    input.max_usage = Some(2);
    add_access_code(&state, "t1", input).await.unwrap();

    assert_eq!(redeem_code(&state, "t1", "read2345").await.unwrap().usage_count, 1);
    assert_eq!(redeem_code(&state, "t1", "READ2345").await.unwrap().usage_count, 2);
    assert!(matches!(
      redeem_code(&state, "t1", "READ2345").await,
      Err(DashboardError::CodeUnavailable { reason: "usage limit reached", .. })
    ));
  }

  #[tokio::test]
  async fn remote_outage_still_commits_locally() {
    let state = test_state();
    empty_teacher(&state, "t1").await;
    set_remote_offline(&state, true);
    let code = add_access_code(&state, "t1", new_code(None)).await.unwrap();
    let mem = current_codes(&state, "t1").await;
    assert_eq!(mem, vec![code.clone()]);
    assert_eq!(state.access_codes.cached("t1").unwrap(), mem);

    delete_access_code(&state, "t1", &code.id).await.unwrap();
    assert!(state.access_codes.cached("t1").unwrap().is_empty());
  }
}
