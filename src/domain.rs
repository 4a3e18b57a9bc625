//! Domain models held by the dashboard: teachers, students, classrooms,
//! access codes, activity logs and authored content.
//!
//! These are the local (camelCase) shapes the frontend and the local cache
//! see. Remote snake_case rows live in `rows`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
  pub id: String,
  pub name: String,
  #[serde(default)] pub email: String,
  #[serde(default)] pub phone: String,
  #[serde(default)] pub school: String,
  #[serde(default)] pub subjects: Vec<String>,
  #[serde(default)] pub grades: Vec<u8>,
  pub created_at: DateTime<Utc>,
}

/// Partial profile edit; `None` keeps the current value.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPatch {
  pub name: Option<String>,
  pub email: Option<String>,
  pub phone: Option<String>,
  pub school: Option<String>,
  pub subjects: Option<Vec<String>>,
  pub grades: Option<Vec<u8>>,
}

impl TeacherPatch {
  pub fn apply(self, t: &mut Teacher) {
    if let Some(v) = self.name { t.name = v; }
    if let Some(v) = self.email { t.email = v; }
    if let Some(v) = self.phone { t.phone = v; }
    if let Some(v) = self.school { t.school = v; }
    if let Some(v) = self.subjects { t.subjects = v; }
    if let Some(v) = self.grades { t.grades = v; }
  }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
  pub score: u32,
  pub streak: u32,
  pub words_learned: u32,
  pub study_sessions: u32,
  /// Minutes.
  pub total_study_time: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
  pub id: String,
  pub title: String,
  #[serde(default)] pub description: String,
  pub earned_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Student {
  pub id: String,
  pub teacher_id: String,
  pub name: String,
  #[serde(default)] pub student_number: String,
  pub grade: u8,
  #[serde(default)] pub parent_email: String,
  #[serde(default)] pub notes: String,
  #[serde(default)] pub progress: Progress,
  #[serde(default)] pub achievements: Vec<Achievement>,
  #[serde(default)] pub last_active: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

/// Body of the add-student form.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
  pub name: String,
  #[serde(default)] pub student_number: String,
  pub grade: u8,
  #[serde(default)] pub parent_email: String,
  #[serde(default)] pub notes: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
  pub name: Option<String>,
  pub student_number: Option<String>,
  pub grade: Option<u8>,
  pub parent_email: Option<String>,
  pub notes: Option<String>,
}

impl StudentPatch {
  pub fn apply(self, s: &mut Student) {
    if let Some(v) = self.name { s.name = v; }
    if let Some(v) = self.student_number { s.student_number = v; }
    if let Some(v) = self.grade { s.grade = v; }
    if let Some(v) = self.parent_email { s.parent_email = v; }
    if let Some(v) = self.notes { s.notes = v; }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoom {
  pub id: String,
  pub teacher_id: String,
  pub name: String,
  pub grade: u8,
  #[serde(default)] pub student_ids: Vec<String>,
  #[serde(default)] pub description: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoomInput {
  pub name: String,
  pub grade: u8,
  #[serde(default)] pub student_ids: Vec<String>,
  #[serde(default)] pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessCode {
  pub id: String,
  pub teacher_id: String,
  pub code: String,
  pub grade: u8,
  #[serde(default)] pub description: String,
  #[serde(default)] pub expires_at: Option<DateTime<Utc>>,
  /// `None` means unlimited.
  #[serde(default)] pub max_usage: Option<u32>,
  #[serde(default)] pub usage_count: u32,
  #[serde(default = "default_true")] pub is_active: bool,
  #[serde(default)] pub class_id: Option<String>,
  #[serde(default)] pub student_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

fn default_true() -> bool { true }

/// Body of the create-code modal. `code: None` asks for a generated one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccessCode {
  #[serde(default)] pub code: Option<String>,
  pub grade: u8,
  #[serde(default)] pub description: String,
  #[serde(default)] pub expires_at: Option<DateTime<Utc>>,
  /// Fill a missing expiry from the configured default period.
  #[serde(default)] pub use_default_expiry: bool,
  #[serde(default)] pub max_usage: Option<u32>,
  #[serde(default)] pub class_id: Option<String>,
  #[serde(default)] pub student_id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCodePatch {
  pub code: Option<String>,
  pub grade: Option<u8>,
  pub description: Option<String>,
  /// `Some(None)` clears the expiry.
  #[serde(default, with = "double_option")]
  pub expires_at: Option<Option<DateTime<Utc>>>,
  #[serde(default, with = "double_option")]
  pub max_usage: Option<Option<u32>>,
  pub is_active: Option<bool>,
}

/// Distinguishes an absent field from an explicit `null` in patches.
mod double_option {
  use serde::{Deserialize, Deserializer};

  pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
  where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
  {
    Option::<T>::deserialize(de).map(Some)
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CodeStatus {
  Active,
  Inactive,
  Expired,
  Exhausted,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentActivity {
  pub id: String,
  pub student_id: String,
  pub teacher_id: String,
  pub activity_type: String,
  #[serde(default)] pub title: String,
  pub score: u32,
  /// Minutes.
  pub time_spent: u32,
  #[serde(default)] pub words_studied: u32,
  pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyWord {
  #[serde(default)] pub id: String,
  pub word: String,
  pub translation: String,
  #[serde(default)] pub example: String,
  pub grade: u8,
  #[serde(default)] pub unit: u32,
  #[serde(default)] pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GrammarRule {
  #[serde(default)] pub id: String,
  pub title: String,
  pub explanation: String,
  #[serde(default)] pub examples: Vec<String>,
  pub grade: u8,
  #[serde(default)] pub unit: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MathProblem {
  #[serde(default)] pub id: String,
  pub question: String,
  pub answer: String,
  #[serde(default)] pub choices: Vec<String>,
  #[serde(default)] pub difficulty: String,
  pub grade: u8,
  #[serde(default)] pub topic: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
  #[serde(default)] pub id: String,
  pub skill: String,
  pub prompt: String,
  pub options: Vec<String>,
  pub correct_index: usize,
  pub grade: u8,
  #[serde(default)] pub explanation: String,
}
