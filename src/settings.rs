//! Access-code settings: the administrator-controlled options consumed by the
//! code creation and edit flows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::storage::{KeyValueStore, SETTINGS_KEY};

/// Cap on codes per teacher when nothing else is configured.
pub const DEFAULT_TEACHER_CODE_LIMIT: u32 = 20;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessCodeSettings {
  pub require_expiry: bool,
  pub default_expiry_days: u32,
  /// 0 means unlimited.
  pub max_usage_per_code: u32,
  pub require_description: bool,
  pub allow_teacher_custom_codes: bool,
  pub teacher_code_limit: u32,
}

impl Default for AccessCodeSettings {
  fn default() -> Self {
    Self {
      require_expiry: false,
      default_expiry_days: 30,
      max_usage_per_code: 100,
      require_description: false,
      allow_teacher_custom_codes: true,
      teacher_code_limit: DEFAULT_TEACHER_CODE_LIMIT,
    }
  }
}

impl AccessCodeSettings {
  /// Overlay a stored object onto `self`. Unknown keys and values of the wrong
  /// type are ignored; numbers are clamped into their valid ranges.
  pub fn merge(&self, stored: Option<&Value>) -> Self {
    let mut out = self.clone();
    let Some(obj) = stored.and_then(Value::as_object) else {
      return out.validated();
    };
    let flag = |k: &str| obj.get(k).and_then(Value::as_bool);
    let num = |k: &str| obj.get(k).and_then(Value::as_u64).map(|n| n.min(u32::MAX as u64) as u32);

    if let Some(v) = flag("requireExpiry") { out.require_expiry = v; }
    if let Some(v) = num("defaultExpiryDays") { out.default_expiry_days = v; }
    if let Some(v) = num("maxUsagePerCode") { out.max_usage_per_code = v; }
    if let Some(v) = flag("requireDescription") { out.require_description = v; }
    if let Some(v) = flag("allowTeacherCustomCodes") { out.allow_teacher_custom_codes = v; }
    if let Some(v) = num("teacherCodeLimit") { out.teacher_code_limit = v; }
    out.validated()
  }

  pub fn validated(mut self) -> Self {
    self.default_expiry_days = self.default_expiry_days.clamp(1, 365);
    if self.teacher_code_limit == 0 {
      self.teacher_code_limit = DEFAULT_TEACHER_CODE_LIMIT;
    }
    self
  }

  /// Effective settings: `base` overlaid with whatever the settings key holds.
  pub fn load(store: &dyn KeyValueStore, base: &AccessCodeSettings) -> Self {
    base.merge(store.get(SETTINGS_KEY).as_ref())
  }

  pub fn save(&self, store: &dyn KeyValueStore) {
    match serde_json::to_value(self) {
      Ok(v) => {
        if let Err(e) = store.set(SETTINGS_KEY, v) {
          warn!(target: "classdesk", error = %e, "Failed to persist access-code settings");
        }
      }
      Err(e) => warn!(target: "classdesk", error = %e, "Failed to serialize access-code settings"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;
  use serde_json::json;

  #[test]
  fn missing_value_keeps_defaults() {
    assert_eq!(AccessCodeSettings::default().merge(None), AccessCodeSettings::default());
  }

  #[test]
  fn merge_ignores_unknown_and_mistyped() {
    let stored = json!({
      "requireExpiry": true,
      "defaultExpiryDays": "ten",
      "maxUsagePerCode": 5,
      "somethingElse": 1
    });
    let s = AccessCodeSettings::default().merge(Some(&stored));
    assert!(s.require_expiry);
    assert_eq!(s.default_expiry_days, 30);
    assert_eq!(s.max_usage_per_code, 5);
  }

  #[test]
  fn merge_clamps_ranges() {
    let stored = json!({ "defaultExpiryDays": 0, "teacherCodeLimit": 0 });
    let s = AccessCodeSettings::default().merge(Some(&stored));
    assert_eq!(s.default_expiry_days, 1);
    assert_eq!(s.teacher_code_limit, DEFAULT_TEACHER_CODE_LIMIT);
  }

  #[test]
  fn installation_defaults_are_clamped_without_stored_settings() {
    let cfg = crate::config::parse_config("[access_codes]\nteacherCodeLimit = 0\ndefaultExpiryDays = 0").unwrap();
    let s = AccessCodeSettings::load(&MemoryStore::new(), &cfg.access_codes);
    assert_eq!(s.teacher_code_limit, DEFAULT_TEACHER_CODE_LIMIT);
    assert_eq!(s.default_expiry_days, 1);

    let cfg = crate::config::parse_config("[access_codes]\ndefaultExpiryDays = 900").unwrap();
    assert_eq!(AccessCodeSettings::load(&MemoryStore::new(), &cfg.access_codes).default_expiry_days, 365);
  }

  #[test]
  fn save_then_load() {
    let store = MemoryStore::new();
    let s = AccessCodeSettings { require_description: true, teacher_code_limit: 7, ..Default::default() };
    s.save(&store);
    assert_eq!(AccessCodeSettings::load(&store, &AccessCodeSettings::default()), s);
  }
}
