//! Authored learning content: vocabulary, grammar rules, math problems and
//! quiz questions.
//!
//! Each dataset is the built-in list overlaid with what an author has saved
//! remotely. An authored record replaces the built-in one with the same id in
//! place; new ids are appended after the built-ins.

use serde::Deserialize;
use tracing::{info, instrument};

use crate::domain::{GrammarRule, MathProblem, QuizQuestion, VocabularyWord};
use crate::error::DashboardError;
use crate::notify::NoticeKind;
use crate::seeds::{builtin_grammar, builtin_math_problems, builtin_quiz_questions, builtin_vocabulary, random_id};
use crate::state::AppState;
use crate::sync::{Record, SyncedCollection};

/// Query filters; unset fields match everything.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ContentFilter {
  pub grade: Option<u8>,
  pub unit: Option<u32>,
  pub topic: Option<String>,
  pub skill: Option<String>,
}

/// A content dataset the library can serve.
pub trait Content: Record {
  const LABEL: &'static str;

  fn builtin() -> Vec<Self>;
  fn collection(state: &AppState) -> &SyncedCollection<Self>;
  fn set_id(&mut self, id: String);
  fn matches(&self, filter: &ContentFilter) -> bool;
  fn validate(&self) -> Result<(), DashboardError>;
}

fn eq_ignore_case(want: &Option<String>, have: &str) -> bool {
  want.as_deref().map_or(true, |w| w.eq_ignore_ascii_case(have))
}

fn check_grade(grade: u8) -> Result<(), DashboardError> {
  if (1..=12).contains(&grade) {
    Ok(())
  } else {
    Err(DashboardError::InvalidState(format!("grade {grade} is outside 1-12")))
  }
}

fn require(value: &str, field: &'static str) -> Result<(), DashboardError> {
  if value.trim().is_empty() {
    Err(DashboardError::MissingField(field))
  } else {
    Ok(())
  }
}

impl Content for VocabularyWord {
  const LABEL: &'static str = "Word";

  fn builtin() -> Vec<Self> { builtin_vocabulary() }
  fn collection(state: &AppState) -> &SyncedCollection<Self> { &state.vocabulary }
  fn set_id(&mut self, id: String) { self.id = id; }

  fn matches(&self, f: &ContentFilter) -> bool {
    f.grade.map_or(true, |g| g == self.grade)
      && f.unit.map_or(true, |u| u == self.unit)
      && eq_ignore_case(&f.topic, &self.topic)
      && f.skill.as_deref().map_or(true, |s| s == "vocabulary")
  }

  fn validate(&self) -> Result<(), DashboardError> {
    require(&self.word, "word")?;
    require(&self.translation, "translation")?;
    check_grade(self.grade)
  }
}

impl Content for GrammarRule {
  const LABEL: &'static str = "Grammar rule";

  fn builtin() -> Vec<Self> { builtin_grammar() }
  fn collection(state: &AppState) -> &SyncedCollection<Self> { &state.grammar }
  fn set_id(&mut self, id: String) { self.id = id; }

  fn matches(&self, f: &ContentFilter) -> bool {
    f.grade.map_or(true, |g| g == self.grade)
      && f.unit.map_or(true, |u| u == self.unit)
      && f.topic.is_none()
      && f.skill.as_deref().map_or(true, |s| s == "grammar")
  }

  fn validate(&self) -> Result<(), DashboardError> {
    require(&self.title, "title")?;
    require(&self.explanation, "explanation")?;
    check_grade(self.grade)
  }
}

impl Content for MathProblem {
  const LABEL: &'static str = "Math problem";

  fn builtin() -> Vec<Self> { builtin_math_problems() }
  fn collection(state: &AppState) -> &SyncedCollection<Self> { &state.math_problems }
  fn set_id(&mut self, id: String) { self.id = id; }

  fn matches(&self, f: &ContentFilter) -> bool {
    f.grade.map_or(true, |g| g == self.grade)
      && f.unit.is_none()
      && eq_ignore_case(&f.topic, &self.topic)
      && f.skill.as_deref().map_or(true, |s| s == "math")
  }

  fn validate(&self) -> Result<(), DashboardError> {
    require(&self.question, "question")?;
    require(&self.answer, "answer")?;
    if !self.choices.is_empty() && !self.choices.contains(&self.answer) {
      return Err(DashboardError::InvalidState("answer must be one of the choices".into()));
    }
    check_grade(self.grade)
  }
}

impl Content for QuizQuestion {
  const LABEL: &'static str = "Question";

  fn builtin() -> Vec<Self> { builtin_quiz_questions() }
  fn collection(state: &AppState) -> &SyncedCollection<Self> { &state.quiz_questions }
  fn set_id(&mut self, id: String) { self.id = id; }

  fn matches(&self, f: &ContentFilter) -> bool {
    f.grade.map_or(true, |g| g == self.grade)
      && f.unit.is_none()
      && f.topic.is_none()
      && eq_ignore_case(&f.skill, &self.skill)
  }

  fn validate(&self) -> Result<(), DashboardError> {
    require(&self.skill, "skill")?;
    require(&self.prompt, "prompt")?;
    if self.options.len() < 2 {
      return Err(DashboardError::InvalidState("a question needs at least two options".into()));
    }
    if self.correct_index >= self.options.len() {
      return Err(DashboardError::InvalidState(format!(
        "correctIndex {} is out of range for {} options",
        self.correct_index,
        self.options.len()
      )));
    }
    check_grade(self.grade)
  }
}

/// Built-in list overlaid with `authored`.
pub fn merge_with_builtin<R: Content>(builtin: Vec<R>, authored: Vec<R>) -> Vec<R> {
  let mut out = builtin;
  for rec in authored {
    match out.iter_mut().find(|b| b.id() == rec.id()) {
      Some(slot) => *slot = rec,
      None => out.push(rec),
    }
  }
  out
}

/// One dataset as seen by one author.
pub struct ContentLibrary<'a, R: Content> {
  state: &'a AppState,
  items: &'a SyncedCollection<R>,
}

impl<'a, R: Content> ContentLibrary<'a, R> {
  pub fn of(state: &'a AppState) -> Self {
    Self { state, items: R::collection(state) }
  }

  async fn authored(&self, author: &str) -> Vec<R> {
    self.items.ensure_loaded(author, Vec::new).await
  }

  pub async fn list(&self, author: &str, filter: &ContentFilter) -> Vec<R> {
    merge_with_builtin(R::builtin(), self.authored(author).await)
      .into_iter()
      .filter(|r| r.matches(filter))
      .collect()
  }

  pub async fn get(&self, author: &str, id: &str) -> Option<R> {
    merge_with_builtin(R::builtin(), self.authored(author).await)
      .into_iter()
      .find(|r| r.id() == id)
  }

  /// Save a new record; an empty id gets a generated one.
  #[instrument(level = "info", skip(self, record), fields(kind = R::ENTITY, %author))]
  pub async fn create(&self, author: &str, mut record: R) -> Result<R, DashboardError> {
    record.validate()?;
    let authored = self.authored(author).await;
    if record.id().is_empty() {
      record.set_id(self.state.with_rng(|rng| random_id(rng)));
    }
    if authored.iter().any(|r| r.id() == record.id()) {
      return Err(DashboardError::InvalidState(format!("{} {} already exists", R::LABEL, record.id())));
    }
    let saved = self.items.create(author, record).await;
    info!(target: "classdesk", kind = R::ENTITY, id = %saved.id(), "Content created");
    self.state.notices().push(NoticeKind::Success, format!("{} saved", R::LABEL));
    Ok(saved)
  }

  /// Replace the record with `id`. Editing a built-in stores an authored
  /// override under the same id.
  #[instrument(level = "info", skip(self, record), fields(kind = R::ENTITY, %author, %id))]
  pub async fn update(&self, author: &str, id: &str, mut record: R) -> Result<R, DashboardError> {
    record.set_id(id.to_string());
    record.validate()?;
    let authored = self.authored(author).await;
    let saved = if authored.iter().any(|r| r.id() == id) {
      let replacement = record.clone();
      self
        .items
        .update(author, id, move |r| *r = replacement)
        .await
        .ok_or_else(|| DashboardError::NotFound(format!("{} {id}", R::LABEL)))?
    } else if R::builtin().iter().any(|r| r.id() == id) {
      self.items.create(author, record).await
    } else {
      return Err(DashboardError::NotFound(format!("{} {id}", R::LABEL)));
    };
    self.state.notices().push(NoticeKind::Success, format!("{} updated", R::LABEL));
    Ok(saved)
  }

  /// Delete an authored record. Built-ins cannot be deleted; deleting an
  /// override brings the built-in back.
  pub async fn delete(&self, author: &str, id: &str) -> Result<R, DashboardError> {
    self.authored(author).await;
    let removed = self.items.delete(author, id).await.ok_or_else(|| {
      if R::builtin().iter().any(|r| r.id() == id) {
        DashboardError::InvalidState(format!("built-in {} {id} cannot be deleted", R::LABEL))
      } else {
        DashboardError::NotFound(format!("{} {id}", R::LABEL))
      }
    })?;
    self.state.notices().push(NoticeKind::Success, format!("{} deleted", R::LABEL));
    Ok(removed)
  }
}

/// Questions for one runner skill, in dataset order.
pub async fn questions_for_skill(state: &AppState, author: &str, skill: &str) -> Vec<QuizQuestion> {
  let filter = ContentFilter { skill: Some(skill.to_string()), ..Default::default() };
  ContentLibrary::<QuizQuestion>::of(state).list(author, &filter).await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::tests::test_state;

  fn word(id: &str, word: &str, grade: u8) -> VocabularyWord {
    VocabularyWord {
      id: id.into(),
      word: word.into(),
      translation: "x".into(),
      example: String::new(),
      grade,
      unit: 1,
      topic: "food".into(),
    }
  }

  #[test]
  fn authored_overrides_in_place_and_new_ids_append() {
    let merged = merge_with_builtin(
      vec![word("a", "one", 1), word("b", "two", 1)],
      vec![word("c", "three", 1), word("a", "ONE", 1)],
    );
    let words: Vec<&str> = merged.iter().map(|w| w.word.as_str()).collect();
    assert_eq!(words, vec!["ONE", "two", "three"]);
  }

  #[tokio::test]
  async fn edit_builtin_then_delete_restores_it() {
    let state = test_state();
    let lib = ContentLibrary::<VocabularyWord>::of(&state);
    let original = lib.get("ed", "v-apple").await.unwrap();

    let mut edited = original.clone();
    edited.example = "An apple a day.".into();
    lib.update("ed", "v-apple", edited).await.unwrap();
    assert_eq!(lib.get("ed", "v-apple").await.unwrap().example, "An apple a day.");
    assert_eq!(lib.list("ed", &ContentFilter::default()).await.len(), builtin_vocabulary().len());

    lib.delete("ed", "v-apple").await.unwrap();
    assert_eq!(lib.get("ed", "v-apple").await.unwrap(), original);
    assert!(lib.delete("ed", "v-apple").await.is_err());
  }

  #[tokio::test]
  async fn create_assigns_id_and_filters_apply() {
    let state = test_state();
    let lib = ContentLibrary::<VocabularyWord>::of(&state);
    let saved = lib.create("ed", word("", "bread", 7)).await.unwrap();
    assert!(!saved.id.is_empty());

    let grade7 = lib.list("ed", &ContentFilter { grade: Some(7), ..Default::default() }).await;
    assert_eq!(grade7, vec![saved]);
    let food = lib.list("ed", &ContentFilter { topic: Some("FOOD".into()), ..Default::default() }).await;
    assert!(food.len() >= 2);
  }

  #[tokio::test]
  async fn quiz_validation() {
    let state = test_state();
    let lib = ContentLibrary::<QuizQuestion>::of(&state);
    let bad = QuizQuestion {
      id: String::new(),
      skill: "grammar".into(),
      prompt: "Pick one".into(),
      options: vec!["a".into(), "b".into()],
      correct_index: 2,
      grade: 3,
      explanation: String::new(),
    };
    assert!(matches!(lib.create("ed", bad).await, Err(DashboardError::InvalidState(_))));
    assert_eq!(questions_for_skill(&state, "ed", "vocabulary").await.len(), 3);
    assert!(questions_for_skill(&state, "ed", "astronomy").await.is_empty());
  }
}
