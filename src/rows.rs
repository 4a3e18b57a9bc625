//! Remote (snake_case) row shapes and their mapping to the local records.
//!
//! Each `Record` impl names its cache key prefix, remote table and owner
//! column, then maps field by field. Student progress and achievements live
//! in the `user_progress` and `achievements` tables remotely and are nested
//! in the student locally.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::*;
use crate::remote;
use crate::sync::{CompanionRow, Record};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TeacherRow {
  pub id: String,
  pub name: String,
  #[serde(default)] pub email: Option<String>,
  #[serde(default)] pub phone: Option<String>,
  #[serde(default)] pub school: Option<String>,
  #[serde(default)] pub subjects: Vec<String>,
  #[serde(default)] pub grades: Vec<u8>,
  pub created_at: DateTime<Utc>,
}

impl Record for Teacher {
  const ENTITY: &'static str = "teacher";
  const TABLE: &'static str = remote::TEACHERS;
  const OWNER_COLUMN: &'static str = "id";
  type Row = TeacherRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, _owner_id: &str) -> TeacherRow {
    TeacherRow {
      id: self.id.clone(),
      name: self.name.clone(),
      email: Some(self.email.clone()),
      phone: Some(self.phone.clone()),
      school: Some(self.school.clone()),
      subjects: self.subjects.clone(),
      grades: self.grades.clone(),
      created_at: self.created_at,
    }
  }

  fn from_row(r: TeacherRow) -> Self {
    Teacher {
      id: r.id,
      name: r.name,
      email: r.email.unwrap_or_default(),
      phone: r.phone.unwrap_or_default(),
      school: r.school.unwrap_or_default(),
      subjects: r.subjects,
      grades: r.grades,
      created_at: r.created_at,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentRow {
  pub id: String,
  pub teacher_id: String,
  pub name: String,
  #[serde(default)] pub student_number: Option<String>,
  pub grade: u8,
  #[serde(default)] pub parent_email: Option<String>,
  #[serde(default)] pub notes: Option<String>,
  #[serde(default)] pub last_active: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

/// One row per student; the row id is the student id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressRow {
  pub id: String,
  pub student_id: String,
  pub teacher_id: String,
  #[serde(default)] pub score: u32,
  #[serde(default)] pub streak: u32,
  #[serde(default)] pub words_learned: u32,
  #[serde(default)] pub study_sessions: u32,
  #[serde(default)] pub total_study_time: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AchievementRow {
  pub id: String,
  pub student_id: String,
  pub teacher_id: String,
  pub title: String,
  #[serde(default)] pub description: Option<String>,
  pub earned_at: DateTime<Utc>,
}

fn companion<T: Serialize>(table: &'static str, id: &str, row: &T) -> Option<CompanionRow> {
  match serde_json::to_value(row) {
    Ok(row) => Some(CompanionRow { table, id: id.to_string(), row }),
    Err(e) => {
      warn!(target: "sync", %table, %id, error = %e, "Failed to encode companion row");
      None
    }
  }
}

/// Rows of `rows` whose `student_id` is `student`.
fn rows_for<T: DeserializeOwned>(rows: &[Value], student: &str) -> Vec<T> {
  rows
    .iter()
    .filter(|r| r.get("student_id").and_then(Value::as_str) == Some(student))
    .filter_map(|r| serde_json::from_value(r.clone()).ok())
    .collect()
}

impl Record for Student {
  const ENTITY: &'static str = "students";
  const TABLE: &'static str = remote::STUDENTS;
  const OWNER_COLUMN: &'static str = "teacher_id";
  const COMPANION_TABLES: &'static [&'static str] = &[remote::USER_PROGRESS, remote::ACHIEVEMENTS];
  type Row = StudentRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> StudentRow {
    StudentRow {
      id: self.id.clone(),
      teacher_id: owner_id.to_string(),
      name: self.name.clone(),
      student_number: Some(self.student_number.clone()),
      grade: self.grade,
      parent_email: Some(self.parent_email.clone()),
      notes: Some(self.notes.clone()),
      last_active: self.last_active,
      created_at: self.created_at,
    }
  }

  fn from_row(r: StudentRow) -> Self {
    Student {
      id: r.id,
      teacher_id: r.teacher_id,
      name: r.name,
      student_number: r.student_number.unwrap_or_default(),
      grade: r.grade,
      parent_email: r.parent_email.unwrap_or_default(),
      notes: r.notes.unwrap_or_default(),
      progress: Progress::default(),
      achievements: Vec::new(),
      last_active: r.last_active,
      created_at: r.created_at,
    }
  }

  fn companion_rows(&self, owner_id: &str) -> Vec<CompanionRow> {
    let progress = ProgressRow {
      id: self.id.clone(),
      student_id: self.id.clone(),
      teacher_id: owner_id.to_string(),
      score: self.progress.score,
      streak: self.progress.streak,
      words_learned: self.progress.words_learned,
      study_sessions: self.progress.study_sessions,
      total_study_time: self.progress.total_study_time,
    };
    let mut out: Vec<CompanionRow> = companion(remote::USER_PROGRESS, &self.id, &progress).into_iter().collect();
    out.extend(self.achievements.iter().filter_map(|a| {
      let row = AchievementRow {
        id: a.id.clone(),
        student_id: self.id.clone(),
        teacher_id: owner_id.to_string(),
        title: a.title.clone(),
        description: Some(a.description.clone()),
        earned_at: a.earned_at,
      };
      companion(remote::ACHIEVEMENTS, &a.id, &row)
    }));
    out
  }

  fn attach_companions(&mut self, table: &str, rows: &[Value]) {
    match table {
      remote::USER_PROGRESS => {
        if let Some(p) = rows_for::<ProgressRow>(rows, &self.id).into_iter().next() {
          self.progress = Progress {
            score: p.score,
            streak: p.streak,
            words_learned: p.words_learned,
            study_sessions: p.study_sessions,
            total_study_time: p.total_study_time,
          };
        }
      }
      remote::ACHIEVEMENTS => {
        self.achievements = rows_for::<AchievementRow>(rows, &self.id)
          .into_iter()
          .map(|a| Achievement {
            id: a.id,
            title: a.title,
            description: a.description.unwrap_or_default(),
            earned_at: a.earned_at,
          })
          .collect();
      }
      _ => {}
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityRow {
  pub id: String,
  pub student_id: String,
  pub teacher_id: String,
  pub activity_type: String,
  #[serde(default)] pub title: Option<String>,
  pub score: u32,
  pub time_spent: u32,
  #[serde(default)] pub words_studied: u32,
  pub completed_at: DateTime<Utc>,
}

impl Record for StudentActivity {
  const ENTITY: &'static str = "activities";
  const TABLE: &'static str = remote::STUDENT_ACTIVITIES;
  const OWNER_COLUMN: &'static str = "teacher_id";
  type Row = ActivityRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> ActivityRow {
    ActivityRow {
      id: self.id.clone(),
      student_id: self.student_id.clone(),
      teacher_id: owner_id.to_string(),
      activity_type: self.activity_type.clone(),
      title: Some(self.title.clone()),
      score: self.score,
      time_spent: self.time_spent,
      words_studied: self.words_studied,
      completed_at: self.completed_at,
    }
  }

  fn from_row(r: ActivityRow) -> Self {
    StudentActivity {
      id: r.id,
      student_id: r.student_id,
      teacher_id: r.teacher_id,
      activity_type: r.activity_type,
      title: r.title.unwrap_or_default(),
      score: r.score,
      time_spent: r.time_spent,
      words_studied: r.words_studied,
      completed_at: r.completed_at,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassRoomRow {
  pub id: String,
  pub teacher_id: String,
  pub name: String,
  pub grade: u8,
  #[serde(default)] pub student_ids: Vec<String>,
  #[serde(default)] pub description: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Record for ClassRoom {
  const ENTITY: &'static str = "classrooms";
  const TABLE: &'static str = remote::CLASS_ROOMS;
  const OWNER_COLUMN: &'static str = "teacher_id";
  type Row = ClassRoomRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> ClassRoomRow {
    ClassRoomRow {
      id: self.id.clone(),
      teacher_id: owner_id.to_string(),
      name: self.name.clone(),
      grade: self.grade,
      student_ids: self.student_ids.clone(),
      description: Some(self.description.clone()),
      created_at: self.created_at,
    }
  }

  fn from_row(r: ClassRoomRow) -> Self {
    ClassRoom {
      id: r.id,
      teacher_id: r.teacher_id,
      name: r.name,
      grade: r.grade,
      student_ids: r.student_ids,
      description: r.description.unwrap_or_default(),
      created_at: r.created_at,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessCodeRow {
  pub id: String,
  pub teacher_id: String,
  pub code: String,
  pub grade: u8,
  #[serde(default)] pub description: Option<String>,
  #[serde(default)] pub expires_at: Option<DateTime<Utc>>,
  #[serde(default)] pub max_usage: Option<u32>,
  #[serde(default)] pub usage_count: u32,
  #[serde(default = "row_true")] pub is_active: bool,
  #[serde(default)] pub class_id: Option<String>,
  #[serde(default)] pub student_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

fn row_true() -> bool { true }

impl Record for AccessCode {
  const ENTITY: &'static str = "access-codes";
  const TABLE: &'static str = remote::ACCESS_CODES;
  const OWNER_COLUMN: &'static str = "teacher_id";
  type Row = AccessCodeRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> AccessCodeRow {
    AccessCodeRow {
      id: self.id.clone(),
      teacher_id: owner_id.to_string(),
      code: self.code.clone(),
      grade: self.grade,
      description: Some(self.description.clone()),
      expires_at: self.expires_at,
      max_usage: self.max_usage,
      usage_count: self.usage_count,
      is_active: self.is_active,
      class_id: self.class_id.clone(),
      student_id: self.student_id.clone(),
      created_at: self.created_at,
    }
  }

  fn from_row(r: AccessCodeRow) -> Self {
    AccessCode {
      id: r.id,
      teacher_id: r.teacher_id,
      code: r.code,
      grade: r.grade,
      description: r.description.unwrap_or_default(),
      expires_at: r.expires_at,
      max_usage: r.max_usage,
      usage_count: r.usage_count,
      is_active: r.is_active,
      class_id: r.class_id,
      student_id: r.student_id,
      created_at: r.created_at,
    }
  }
}

// Authored content. The owner column records which editor wrote the entry.

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VocabularyRow {
  pub id: String,
  pub author_id: String,
  pub word: String,
  pub translation: String,
  #[serde(default)] pub example: Option<String>,
  pub grade: u8,
  #[serde(default)] pub unit: u32,
  #[serde(default)] pub topic: Option<String>,
}

impl Record for VocabularyWord {
  const ENTITY: &'static str = "vocabulary";
  const TABLE: &'static str = remote::VOCABULARY_WORDS;
  const OWNER_COLUMN: &'static str = "author_id";
  type Row = VocabularyRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> VocabularyRow {
    VocabularyRow {
      id: self.id.clone(),
      author_id: owner_id.to_string(),
      word: self.word.clone(),
      translation: self.translation.clone(),
      example: Some(self.example.clone()),
      grade: self.grade,
      unit: self.unit,
      topic: Some(self.topic.clone()),
    }
  }

  fn from_row(r: VocabularyRow) -> Self {
    VocabularyWord {
      id: r.id,
      word: r.word,
      translation: r.translation,
      example: r.example.unwrap_or_default(),
      grade: r.grade,
      unit: r.unit,
      topic: r.topic.unwrap_or_default(),
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrammarRow {
  pub id: String,
  pub author_id: String,
  pub title: String,
  pub explanation: String,
  #[serde(default)] pub examples: Vec<String>,
  pub grade: u8,
  #[serde(default)] pub unit: u32,
}

impl Record for GrammarRule {
  const ENTITY: &'static str = "grammar";
  const TABLE: &'static str = remote::GRAMMAR_RULES;
  const OWNER_COLUMN: &'static str = "author_id";
  type Row = GrammarRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> GrammarRow {
    GrammarRow {
      id: self.id.clone(),
      author_id: owner_id.to_string(),
      title: self.title.clone(),
      explanation: self.explanation.clone(),
      examples: self.examples.clone(),
      grade: self.grade,
      unit: self.unit,
    }
  }

  fn from_row(r: GrammarRow) -> Self {
    GrammarRule {
      id: r.id,
      title: r.title,
      explanation: r.explanation,
      examples: r.examples,
      grade: r.grade,
      unit: r.unit,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MathProblemRow {
  pub id: String,
  pub author_id: String,
  pub question: String,
  pub answer: String,
  #[serde(default)] pub choices: Vec<String>,
  #[serde(default)] pub difficulty: Option<String>,
  pub grade: u8,
  #[serde(default)] pub topic: Option<String>,
}

impl Record for MathProblem {
  const ENTITY: &'static str = "math-problems";
  const TABLE: &'static str = remote::MATH_PROBLEMS;
  const OWNER_COLUMN: &'static str = "author_id";
  type Row = MathProblemRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> MathProblemRow {
    MathProblemRow {
      id: self.id.clone(),
      author_id: owner_id.to_string(),
      question: self.question.clone(),
      answer: self.answer.clone(),
      choices: self.choices.clone(),
      difficulty: Some(self.difficulty.clone()),
      grade: self.grade,
      topic: Some(self.topic.clone()),
    }
  }

  fn from_row(r: MathProblemRow) -> Self {
    MathProblem {
      id: r.id,
      question: r.question,
      answer: r.answer,
      choices: r.choices,
      difficulty: r.difficulty.unwrap_or_default(),
      grade: r.grade,
      topic: r.topic.unwrap_or_default(),
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestionRow {
  pub id: String,
  pub author_id: String,
  pub skill: String,
  pub prompt: String,
  pub options: Vec<String>,
  pub correct_index: usize,
  pub grade: u8,
  #[serde(default)] pub explanation: Option<String>,
}

impl Record for QuizQuestion {
  const ENTITY: &'static str = "quiz-questions";
  const TABLE: &'static str = remote::QUIZ_QUESTIONS;
  const OWNER_COLUMN: &'static str = "author_id";
  type Row = QuizQuestionRow;

  fn id(&self) -> &str { &self.id }

  fn to_row(&self, owner_id: &str) -> QuizQuestionRow {
    QuizQuestionRow {
      id: self.id.clone(),
      author_id: owner_id.to_string(),
      skill: self.skill.clone(),
      prompt: self.prompt.clone(),
      options: self.options.clone(),
      correct_index: self.correct_index,
      grade: self.grade,
      explanation: Some(self.explanation.clone()),
    }
  }

  fn from_row(r: QuizQuestionRow) -> Self {
    QuizQuestion {
      id: r.id,
      skill: r.skill,
      prompt: r.prompt,
      options: r.options,
      correct_index: r.correct_index,
      grade: r.grade,
      explanation: r.explanation.unwrap_or_default(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn student_progress_and_achievements_split_into_companion_rows() {
    let row: StudentRow = serde_json::from_value(json!({
      "id": "s1",
      "teacher_id": "t1",
      "name": "Omar",
      "grade": 5,
      "created_at": "2024-09-01T08:00:00Z"
    })).unwrap();
    let mut s = Student::from_row(row);
    assert_eq!(s.student_number, "");

    s.attach_companions(remote::USER_PROGRESS, &[
      json!({ "id": "s2", "student_id": "s2", "teacher_id": "t1", "score": 9 }),
      json!({ "id": "s1", "student_id": "s1", "teacher_id": "t1", "score": 420, "words_learned": 33 }),
    ]);
    s.attach_companions(remote::ACHIEVEMENTS, &[json!({
      "id": "a1",
      "student_id": "s1",
      "teacher_id": "t1",
      "title": "On Fire",
      "earned_at": "2024-09-03T08:00:00Z"
    })]);
    assert_eq!(s.progress.score, 420);
    assert_eq!(s.progress.words_learned, 33);
    assert_eq!(s.achievements.len(), 1);
    assert_eq!(s.achievements[0].title, "On Fire");

    let back = serde_json::to_value(s.to_row("t1")).unwrap();
    assert!(back.get("score").is_none());
    assert!(back.get("achievements").is_none());

    let companions = s.companion_rows("t1");
    assert_eq!(companions.len(), 2);
    assert_eq!(companions[0].table, remote::USER_PROGRESS);
    assert_eq!(companions[0].row["words_learned"], 33);
    assert_eq!(companions[1].table, remote::ACHIEVEMENTS);
    assert_eq!(companions[1].row["student_id"], "s1");
  }

  #[test]
  fn access_code_row_defaults_active() {
    let row: AccessCodeRow = serde_json::from_value(json!({
      "id": "c1",
      "teacher_id": "t1",
      "code": "ABCD2345",
      "grade": 3,
      "created_at": "2024-09-01T08:00:00Z"
    })).unwrap();
    let c = AccessCode::from_row(row);
    assert!(c.is_active);
    assert_eq!(c.max_usage, None);
  }
}
