//! Test-exercise runner: a timed quiz over one skill's questions.
//!
//! ```text
//! SkillSelection -> Loading -> QuestionActive <-> AnswerShown -> TestComplete
//!                       \-> Error (no questions for the skill)
//! ```
//!
//! Time only moves through `tick`. A question left unanswered when its timer
//! runs out gets a `None` answer, the streak resets, and the runner moves on
//! by itself once the advance delay has passed.
//!
//! Sessions live in `AppState::runners`. Every client call touches its
//! session; the clock drops finished sessions after a short grace period and
//! any session left untouched past the idle window.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::config::RunnerConfig;
use crate::content::questions_for_skill;
use crate::domain::QuizQuestion;
use crate::error::DashboardError;
use crate::seeds::random_id;
use crate::state::AppState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerPhase {
  SkillSelection,
  Loading,
  QuestionActive,
  AnswerShown,
  TestComplete,
  Error,
}

#[derive(Clone, Debug)]
pub struct TestRunner {
  pub id: String,
  phase: RunnerPhase,
  skill: Option<String>,
  questions: Vec<QuizQuestion>,
  index: usize,
  score: u32,
  streak: u32,
  answers: Vec<Option<usize>>,
  time_left: Duration,
  /// Set when the current answer came from a timeout.
  advance_in: Option<Duration>,
  error: Option<String>,
  question_time: Duration,
  advance_delay: Duration,
  /// Time since a client last touched the session.
  idle: Duration,
}

/// Client-facing snapshot. The correct option is only revealed once the
/// question has been answered.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunnerView {
  pub id: String,
  pub phase: RunnerPhase,
  pub skill: Option<String>,
  pub index: usize,
  pub total: usize,
  pub prompt: Option<String>,
  pub options: Vec<String>,
  pub score: u32,
  pub streak: u32,
  pub seconds_left: u64,
  pub last_answer: Option<usize>,
  pub correct_index: Option<usize>,
  pub explanation: Option<String>,
  pub percentage: Option<u32>,
  pub error: Option<String>,
}

impl TestRunner {
  pub fn new(id: impl Into<String>, config: &RunnerConfig) -> Self {
    let question_time = Duration::from_secs(config.question_seconds);
    Self {
      id: id.into(),
      phase: RunnerPhase::SkillSelection,
      skill: None,
      questions: Vec::new(),
      index: 0,
      score: 0,
      streak: 0,
      answers: Vec::new(),
      time_left: question_time,
      advance_in: None,
      error: None,
      question_time,
      advance_delay: Duration::from_millis(config.advance_delay_ms),
      idle: Duration::ZERO,
    }
  }

  pub fn phase(&self) -> RunnerPhase { self.phase }
  pub fn score(&self) -> u32 { self.score }
  pub fn streak(&self) -> u32 { self.streak }
  pub fn index(&self) -> usize { self.index }
  pub fn answers(&self) -> &[Option<usize>] { &self.answers }
  pub fn time_left(&self) -> Duration { self.time_left }

  pub fn is_complete(&self) -> bool {
    self.phase == RunnerPhase::TestComplete
  }

  pub fn touch(&mut self) {
    self.idle = Duration::ZERO;
  }

  /// Whether the clock should drop this session.
  pub fn is_stale(&self, config: &RunnerConfig) -> bool {
    let finished = matches!(self.phase, RunnerPhase::TestComplete | RunnerPhase::Error);
    (finished && self.idle >= Duration::from_secs(config.finished_session_secs))
      || self.idle >= Duration::from_secs(config.idle_session_secs)
  }

  /// Rounded share of correct answers, 0 with no questions.
  pub fn percentage(&self) -> u32 {
    if self.questions.is_empty() {
      return 0;
    }
    (self.score as f64 * 100.0 / self.questions.len() as f64).round() as u32
  }

  fn expect_phase(&self, want: RunnerPhase, op: &str) -> Result<(), DashboardError> {
    if self.phase == want {
      Ok(())
    } else {
      Err(DashboardError::InvalidState(format!("cannot {op} while {:?}", self.phase)))
    }
  }

  pub fn select_skill(&mut self, skill: &str) -> Result<(), DashboardError> {
    self.expect_phase(RunnerPhase::SkillSelection, "select a skill")?;
    self.skill = Some(skill.to_string());
    self.phase = RunnerPhase::Loading;
    Ok(())
  }

  pub fn questions_loaded(&mut self, questions: Vec<QuizQuestion>) -> Result<(), DashboardError> {
    self.expect_phase(RunnerPhase::Loading, "load questions")?;
    if questions.is_empty() {
      self.phase = RunnerPhase::Error;
      self.error = Some(format!("No questions available for {}", self.skill.as_deref().unwrap_or("this skill")));
      return Ok(());
    }
    self.questions = questions;
    self.start_question(0);
    Ok(())
  }

  fn start_question(&mut self, index: usize) {
    self.index = index;
    self.time_left = self.question_time;
    self.advance_in = None;
    self.phase = RunnerPhase::QuestionActive;
  }

  /// Submit `choice` for the current question; returns whether it was right.
  pub fn answer(&mut self, choice: Option<usize>) -> Result<bool, DashboardError> {
    self.expect_phase(RunnerPhase::QuestionActive, "answer")?;
    Ok(self.record_answer(choice))
  }

  fn record_answer(&mut self, choice: Option<usize>) -> bool {
    let correct = match (choice, self.questions.get(self.index)) {
      (Some(i), Some(q)) => i == q.correct_index,
      _ => false,
    };
    if correct {
      self.score += 1;
      self.streak += 1;
    } else {
      self.streak = 0;
    }
    self.answers.push(choice);
    self.phase = RunnerPhase::AnswerShown;
    correct
  }

  pub fn next(&mut self) -> Result<(), DashboardError> {
    self.expect_phase(RunnerPhase::AnswerShown, "advance")?;
    self.advance();
    Ok(())
  }

  fn advance(&mut self) {
    if self.index + 1 < self.questions.len() {
      self.start_question(self.index + 1);
    } else {
      self.advance_in = None;
      self.phase = RunnerPhase::TestComplete;
    }
  }

  /// Advance the clock by `elapsed`.
  pub fn tick(&mut self, elapsed: Duration) {
    self.idle = self.idle.saturating_add(elapsed);
    match self.phase {
      RunnerPhase::QuestionActive => {
        self.time_left = self.time_left.saturating_sub(elapsed);
        if self.time_left.is_zero() {
          debug!(target: "runner", id = %self.id, index = self.index, "Question timed out");
          self.record_answer(None);
          self.advance_in = Some(self.advance_delay);
        }
      }
      RunnerPhase::AnswerShown => {
        if let Some(left) = self.advance_in {
          let left = left.saturating_sub(elapsed);
          if left.is_zero() {
            self.advance();
          } else {
            self.advance_in = Some(left);
          }
        }
      }
      _ => {}
    }
  }

  /// Back to skill selection with a clean slate.
  pub fn restart(&mut self) {
    let config = RunnerConfig {
      question_seconds: self.question_time.as_secs(),
      advance_delay_ms: self.advance_delay.as_millis() as u64,
      ..RunnerConfig::default()
    };
    *self = Self::new(std::mem::take(&mut self.id), &config);
  }

  pub fn view(&self) -> RunnerView {
    let question = match self.phase {
      RunnerPhase::QuestionActive | RunnerPhase::AnswerShown => self.questions.get(self.index),
      _ => None,
    };
    let revealed = self.phase == RunnerPhase::AnswerShown;
    RunnerView {
      id: self.id.clone(),
      phase: self.phase,
      skill: self.skill.clone(),
      index: self.index,
      total: self.questions.len(),
      prompt: question.map(|q| q.prompt.clone()),
      options: question.map(|q| q.options.clone()).unwrap_or_default(),
      score: self.score,
      streak: self.streak,
      seconds_left: self.time_left.as_secs(),
      last_answer: if revealed { self.answers.last().copied().flatten() } else { None },
      correct_index: question.filter(|_| revealed).map(|q| q.correct_index),
      explanation: question.filter(|_| revealed).map(|q| q.explanation.clone()),
      percentage: self.is_complete().then(|| self.percentage()),
      error: self.error.clone(),
    }
  }
}

/// Open a session and load `skill` into it.
#[instrument(level = "info", skip(state), fields(%author, %skill))]
pub async fn start_session(state: &AppState, author: &str, skill: &str) -> Result<RunnerView, DashboardError> {
  let id = state.with_rng(|rng| random_id(rng));
  let runner = TestRunner::new(id.clone(), &state.config.runner);
  state.runners.write().await.insert(id.clone(), runner);
  info!(target: "runner", %id, "Runner session started");
  choose_skill(state, &id, author, skill).await
}

/// Select `skill` on a session waiting in skill selection and load its
/// questions. The session lock is not held while questions load.
pub async fn choose_skill(state: &AppState, id: &str, author: &str, skill: &str) -> Result<RunnerView, DashboardError> {
  with_session(state, id, |r| r.select_skill(skill)).await?;
  let questions = questions_for_skill(state, author, skill).await;
  debug!(target: "runner", %id, %skill, questions = questions.len(), "Questions loaded");
  with_session(state, id, |r| r.questions_loaded(questions)).await
}

/// Run `f` against session `id` and return its fresh view.
pub async fn with_session<T>(
  state: &AppState,
  id: &str,
  f: impl FnOnce(&mut TestRunner) -> Result<T, DashboardError>,
) -> Result<RunnerView, DashboardError> {
  let mut runners = state.runners.write().await;
  let runner = runners
    .get_mut(id)
    .ok_or_else(|| DashboardError::NotFound(format!("runner session {id}")))?;
  runner.touch();
  f(runner)?;
  Ok(runner.view())
}

pub async fn end_session(state: &AppState, id: &str) -> Result<(), DashboardError> {
  state
    .runners
    .write()
    .await
    .remove(id)
    .map(|_| ())
    .ok_or_else(|| DashboardError::NotFound(format!("runner session {id}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::seeds::builtin_quiz_questions;
  use crate::state::tests::test_state;

  fn vocabulary() -> Vec<QuizQuestion> {
    builtin_quiz_questions().into_iter().filter(|q| q.skill == "vocabulary").collect()
  }

  fn loaded() -> TestRunner {
    let mut r = TestRunner::new("r1", &RunnerConfig::default());
    r.select_skill("vocabulary").unwrap();
    r.questions_loaded(vocabulary()).unwrap();
    r
  }

  #[test]
  fn all_correct_completes_with_full_marks() {
    let mut r = loaded();
    for q in vocabulary() {
      assert!(r.answer(Some(q.correct_index)).unwrap());
      r.next().unwrap();
    }
    assert_eq!(r.score(), 3);
    assert_eq!(r.streak(), 3);
    assert_eq!(r.percentage(), 100);
    assert!(r.is_complete());
    assert_eq!(r.view().percentage, Some(100));
  }

  #[test]
  fn wrong_answer_resets_streak_and_rounds_percentage() {
    let mut r = loaded();
    let qs = vocabulary();
    r.answer(Some(qs[0].correct_index)).unwrap();
    r.next().unwrap();
    r.answer(Some((qs[1].correct_index + 1) % qs[1].options.len())).unwrap();
    assert_eq!(r.streak(), 0);
    r.next().unwrap();
    r.answer(Some(qs[2].correct_index)).unwrap();
    r.next().unwrap();
    assert_eq!(r.percentage(), 67);
  }

  #[test]
  fn timeout_submits_null_and_advances_after_delay() {
    let mut r = loaded();
    let qs = vocabulary();
    r.answer(Some(qs[0].correct_index)).unwrap();
    r.next().unwrap();
    assert_eq!(r.streak(), 1);

    for _ in 0..59 {
      r.tick(Duration::from_secs(1));
    }
    assert_eq!(r.phase(), RunnerPhase::QuestionActive);
    assert_eq!(r.time_left(), Duration::from_secs(1));

    r.tick(Duration::from_secs(1));
    assert_eq!(r.phase(), RunnerPhase::AnswerShown);
    assert_eq!(r.answers(), &[Some(qs[0].correct_index), None]);
    assert_eq!(r.streak(), 0);

    r.tick(Duration::from_secs(1));
    assert_eq!(r.phase(), RunnerPhase::AnswerShown);
    r.tick(Duration::from_secs(1));
    assert_eq!(r.phase(), RunnerPhase::QuestionActive);
    assert_eq!(r.index(), 2);
    assert_eq!(r.time_left(), Duration::from_secs(60));
  }

  #[test]
  fn manual_answer_waits_for_next() {
    let mut r = loaded();
    r.answer(Some(0)).unwrap();
    r.tick(Duration::from_secs(30));
    assert_eq!(r.phase(), RunnerPhase::AnswerShown);
    assert!(r.answer(Some(0)).is_err());
  }

  #[test]
  fn empty_question_set_is_an_error_and_restart_clears_it() {
    let mut r = TestRunner::new("r2", &RunnerConfig::default());
    r.select_skill("astronomy").unwrap();
    r.questions_loaded(Vec::new()).unwrap();
    assert_eq!(r.phase(), RunnerPhase::Error);
    assert!(r.view().error.is_some());
    r.restart();
    assert_eq!(r.phase(), RunnerPhase::SkillSelection);
    assert_eq!(r.id, "r2");
  }

  #[test]
  fn view_hides_correct_option_until_answered() {
    let mut r = loaded();
    assert_eq!(r.view().correct_index, None);
    r.answer(None).unwrap();
    assert!(r.view().correct_index.is_some());
  }

  #[tokio::test]
  async fn sessions_tick_through_app_state() {
    let state = test_state();
    let view = start_session(&state, "t1", "reading").await.unwrap();
    assert_eq!(view.total, 1);
    assert_eq!(view.phase, RunnerPhase::QuestionActive);

    state.tick(Duration::from_secs(60)).await;
    state.tick(Duration::from_secs(2)).await;
    let view = with_session(&state, &view.id, |_| Ok(())).await.unwrap();
    assert_eq!(view.phase, RunnerPhase::TestComplete);
    assert_eq!(view.percentage, Some(0));

    end_session(&state, &view.id).await.unwrap();
    assert!(with_session(&state, &view.id, |_| Ok(())).await.is_err());
  }

  #[tokio::test]
  async fn clock_drops_finished_and_idle_sessions() {
    let state = test_state();
    let limits = state.config.runner.clone();
    let failed = start_session(&state, "t1", "astronomy").await.unwrap();
    assert_eq!(failed.phase, RunnerPhase::Error);
    let active = start_session(&state, "t1", "vocabulary").await.unwrap();

    state.tick(Duration::from_secs(limits.finished_session_secs)).await;
    assert!(with_session(&state, &failed.id, |_| Ok(())).await.is_err());
    with_session(&state, &active.id, |_| Ok(())).await.unwrap();

    state.tick(Duration::from_secs(limits.idle_session_secs - 1)).await;
    with_session(&state, &active.id, |_| Ok(())).await.unwrap();
    state.tick(Duration::from_secs(limits.idle_session_secs)).await;
    assert!(with_session(&state, &active.id, |_| Ok(())).await.is_err());
    assert!(state.runners.read().await.is_empty());
  }
}
