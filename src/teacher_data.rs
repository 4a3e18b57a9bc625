//! Teacher-side data: profile, students, classrooms, activity logs, and the
//! aggregate views the dashboard renders.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::csv::parse_student_import;
use crate::domain::*;
use crate::error::DashboardError;
use crate::notify::NoticeKind;
use crate::seeds::{random_id, sample_activities, sample_classrooms, sample_students, sample_teacher};
use crate::state::AppState;
use crate::sync::Origin;

/// Students seen within this window count as active.
const ACTIVE_WINDOW_DAYS: i64 = 7;
const RECENT_ACTIVITY_COUNT: usize = 5;
const TOP_STUDENT_COUNT: usize = 3;

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
  pub total_students: usize,
  pub active_students: usize,
  pub average_score: f64,
  pub total_words_learned: u64,
  /// Minutes.
  pub total_study_time: u64,
  pub total_sessions: u64,
  pub activities_this_week: usize,
  pub recent_activities: Vec<StudentActivity>,
  pub top_students: Vec<Student>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
  pub teacher: Teacher,
  pub students: Vec<Student>,
  pub activities: Vec<StudentActivity>,
  pub classrooms: Vec<ClassRoom>,
  pub stats: DashboardStats,
  pub students_origin: Origin,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
  pub added: usize,
  pub skipped: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
  pub student: Student,
  pub activity_count: usize,
  pub average_score: f64,
  pub total_time_spent: u64,
  pub words_studied: u64,
  pub by_type: BTreeMap<String, usize>,
  pub recent: Vec<StudentActivity>,
}

pub fn dashboard_stats(students: &[Student], activities: &[StudentActivity], now: DateTime<Utc>) -> DashboardStats {
  let active_since = now - Duration::days(ACTIVE_WINDOW_DAYS);
  let average_score = if students.is_empty() {
    0.0
  } else {
    students.iter().map(|s| s.progress.score as f64).sum::<f64>() / students.len() as f64
  };

  let mut recent = activities.to_vec();
  recent.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
  recent.truncate(RECENT_ACTIVITY_COUNT);

  let mut top = students.to_vec();
  top.sort_by(|a, b| b.progress.score.cmp(&a.progress.score));
  top.truncate(TOP_STUDENT_COUNT);

  DashboardStats {
    total_students: students.len(),
    active_students: students.iter().filter(|s| s.last_active.is_some_and(|t| t >= active_since)).count(),
    average_score: (average_score * 10.0).round() / 10.0,
    total_words_learned: students.iter().map(|s| s.progress.words_learned as u64).sum(),
    total_study_time: students.iter().map(|s| s.progress.total_study_time as u64).sum(),
    total_sessions: students.iter().map(|s| s.progress.study_sessions as u64).sum(),
    activities_this_week: activities.iter().filter(|a| a.completed_at >= active_since).count(),
    recent_activities: recent,
    top_students: top,
  }
}

fn generate_students(state: &AppState, teacher_id: &str) -> Vec<Student> {
  let n = state.config.sample.students;
  state.with_rng(|rng| sample_students(teacher_id, n, Utc::now(), rng))
}

pub async fn current_students(state: &AppState, teacher_id: &str) -> Vec<Student> {
  state.students.ensure_loaded(teacher_id, || generate_students(state, teacher_id)).await
}

pub async fn current_activities(state: &AppState, teacher_id: &str) -> Vec<StudentActivity> {
  if let Some(list) = state.activities.items(teacher_id).await {
    return list;
  }
  let students = current_students(state, teacher_id).await;
  let n = state.config.sample.activities;
  state
    .activities
    .load(teacher_id, || state.with_rng(|rng| sample_activities(&students, n, Utc::now(), rng)))
    .await
    .0
}

pub async fn current_classrooms(state: &AppState, teacher_id: &str) -> Vec<ClassRoom> {
  if let Some(list) = state.classrooms.items(teacher_id).await {
    return list;
  }
  let students = current_students(state, teacher_id).await;
  state
    .classrooms
    .load(teacher_id, || state.with_rng(|rng| sample_classrooms(teacher_id, &students, Utc::now(), rng)))
    .await
    .0
}

/// Profile for `teacher_id`, creating it remotely on first sight.
#[instrument(level = "info", skip(state), fields(%teacher_id))]
pub async fn load_profile(state: &AppState, teacher_id: &str) -> (Teacher, Origin) {
  let (list, origin) = state
    .teachers
    .load(teacher_id, || vec![state.with_rng(|rng| sample_teacher(teacher_id, Utc::now(), rng))])
    .await;
  if let Some(t) = list.into_iter().next() {
    return (t, origin);
  }
  let t = state.with_rng(|rng| sample_teacher(teacher_id, Utc::now(), rng));
  (state.teachers.create(teacher_id, t).await, Origin::Generated)
}

pub async fn update_profile(state: &AppState, teacher_id: &str, patch: TeacherPatch) -> Result<Teacher, DashboardError> {
  if state.teachers.items(teacher_id).await.map_or(true, |l| l.is_empty()) {
    load_profile(state, teacher_id).await;
  }
  if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
    return Err(DashboardError::MissingField("name"));
  }
  let updated = state
    .teachers
    .update(teacher_id, teacher_id, |t| patch.apply(t))
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("teacher {teacher_id}")))?;
  state.notices().push(NoticeKind::Success, "Profile saved");
  Ok(updated)
}

/// Full reload of everything the dashboard shows.
#[instrument(level = "info", skip(state), fields(%teacher_id))]
pub async fn load_dashboard(state: &AppState, teacher_id: &str) -> Dashboard {
  let (teacher, _) = load_profile(state, teacher_id).await;
  let (students, students_origin) = state.students.load(teacher_id, || generate_students(state, teacher_id)).await;
  let n = state.config.sample.activities;
  let (activities, _) = state
    .activities
    .load(teacher_id, || state.with_rng(|rng| sample_activities(&students, n, Utc::now(), rng)))
    .await;
  let (classrooms, _) = state
    .classrooms
    .load(teacher_id, || state.with_rng(|rng| sample_classrooms(teacher_id, &students, Utc::now(), rng)))
    .await;
  let stats = dashboard_stats(&students, &activities, Utc::now());
  info!(target: "classdesk", %teacher_id, students = stats.total_students, active = stats.active_students, ?students_origin, "Dashboard loaded");
  Dashboard { teacher, students, activities, classrooms, stats, students_origin }
}

fn validate_student(name: &str, grade: u8) -> Result<(), DashboardError> {
  if name.trim().is_empty() {
    return Err(DashboardError::MissingField("name"));
  }
  if !(1..=12).contains(&grade) {
    return Err(DashboardError::InvalidState(format!("grade {grade} is outside 1-12")));
  }
  Ok(())
}

fn new_student_record(state: &AppState, teacher_id: &str, input: NewStudent, now: DateTime<Utc>) -> Student {
  Student {
    id: state.with_rng(|rng| random_id(rng)),
    teacher_id: teacher_id.to_string(),
    name: input.name.trim().to_string(),
    student_number: input.student_number.trim().to_string(),
    grade: input.grade,
    parent_email: input.parent_email.trim().to_string(),
    notes: input.notes,
    progress: Progress::default(),
    achievements: Vec::new(),
    last_active: None,
    created_at: now,
  }
}

#[instrument(level = "info", skip(state, input), fields(%teacher_id))]
pub async fn add_student(state: &AppState, teacher_id: &str, input: NewStudent) -> Result<Student, DashboardError> {
  validate_student(&input.name, input.grade)?;
  current_students(state, teacher_id).await;
  let record = new_student_record(state, teacher_id, input, Utc::now());
  let student = state.students.create(teacher_id, record).await;
  state.notices().push(NoticeKind::Success, format!("{} added", student.name));
  Ok(student)
}

pub async fn update_student(state: &AppState, teacher_id: &str, id: &str, patch: StudentPatch) -> Result<Student, DashboardError> {
  current_students(state, teacher_id).await;
  let current = state
    .students
    .get(teacher_id, id)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("student {id}")))?;
  validate_student(
    patch.name.as_deref().unwrap_or(&current.name),
    patch.grade.unwrap_or(current.grade),
  )?;
  let updated = state
    .students
    .update(teacher_id, id, |s| patch.apply(s))
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("student {id}")))?;
  state.notices().push(NoticeKind::Success, format!("{} updated", updated.name));
  Ok(updated)
}

/// Delete a student and drop its id from every classroom roster.
#[instrument(level = "info", skip(state), fields(%teacher_id, %id))]
pub async fn delete_student(state: &AppState, teacher_id: &str, id: &str) -> Result<Student, DashboardError> {
  current_students(state, teacher_id).await;
  let removed = state
    .students
    .delete(teacher_id, id)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("student {id}")))?;
  current_classrooms(state, teacher_id).await;
  state
    .classrooms
    .update_where(teacher_id, |room| {
      let before = room.student_ids.len();
      room.student_ids.retain(|sid| sid != id);
      room.student_ids.len() != before
    })
    .await;
  state.notices().push(NoticeKind::Success, format!("{} deleted", removed.name));
  Ok(removed)
}

/// Bulk import from the CSV template. Malformed rows are skipped silently
/// (counted in the report, never reported individually).
#[instrument(level = "info", skip(state, text), fields(%teacher_id, bytes = text.len()))]
pub async fn import_students_csv(state: &AppState, teacher_id: &str, text: &str) -> ImportReport {
  let parsed = parse_student_import(text);
  current_students(state, teacher_id).await;
  let now = Utc::now();
  let records: Vec<Student> = parsed
    .students
    .into_iter()
    .map(|s| new_student_record(state, teacher_id, s, now))
    .collect();
  let report = ImportReport { added: records.len(), skipped: parsed.skipped };
  state.students.create_many(teacher_id, records).await;
  info!(target: "classdesk", %teacher_id, added = report.added, skipped = report.skipped, "Student import finished");
  state.notices().push(NoticeKind::Success, format!("Imported {} students", report.added));
  report
}

fn validate_classroom(input: &ClassRoomInput) -> Result<(), DashboardError> {
  if input.name.trim().is_empty() {
    return Err(DashboardError::MissingField("name"));
  }
  if !(1..=12).contains(&input.grade) {
    return Err(DashboardError::InvalidState(format!("grade {} is outside 1-12", input.grade)));
  }
  Ok(())
}

pub async fn add_classroom(state: &AppState, teacher_id: &str, input: ClassRoomInput) -> Result<ClassRoom, DashboardError> {
  validate_classroom(&input)?;
  current_classrooms(state, teacher_id).await;
  let room = ClassRoom {
    id: state.with_rng(|rng| random_id(rng)),
    teacher_id: teacher_id.to_string(),
    name: input.name.trim().to_string(),
    grade: input.grade,
    student_ids: input.student_ids,
    description: input.description,
    created_at: Utc::now(),
  };
  let room = state.classrooms.create(teacher_id, room).await;
  state.notices().push(NoticeKind::Success, format!("Class {} created", room.name));
  Ok(room)
}

pub async fn update_classroom(state: &AppState, teacher_id: &str, id: &str, input: ClassRoomInput) -> Result<ClassRoom, DashboardError> {
  validate_classroom(&input)?;
  current_classrooms(state, teacher_id).await;
  let room = state
    .classrooms
    .update(teacher_id, id, |r| {
      r.name = input.name.trim().to_string();
      r.grade = input.grade;
      r.student_ids = input.student_ids;
      r.description = input.description;
    })
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("class {id}")))?;
  state.notices().push(NoticeKind::Success, format!("Class {} updated", room.name));
  Ok(room)
}

pub async fn delete_classroom(state: &AppState, teacher_id: &str, id: &str) -> Result<ClassRoom, DashboardError> {
  current_classrooms(state, teacher_id).await;
  let room = state
    .classrooms
    .delete(teacher_id, id)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("class {id}")))?;
  state.notices().push(NoticeKind::Success, format!("Class {} deleted", room.name));
  Ok(room)
}

pub async fn student_report(state: &AppState, teacher_id: &str, student_id: &str) -> Result<StudentReport, DashboardError> {
  current_students(state, teacher_id).await;
  let student = state
    .students
    .get(teacher_id, student_id)
    .await
    .ok_or_else(|| DashboardError::NotFound(format!("student {student_id}")))?;
  let mut mine: Vec<StudentActivity> = current_activities(state, teacher_id)
    .await
    .into_iter()
    .filter(|a| a.student_id == student_id)
    .collect();
  mine.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));

  let mut by_type = BTreeMap::new();
  for a in &mine {
    *by_type.entry(a.activity_type.clone()).or_insert(0) += 1;
  }
  let average_score = if mine.is_empty() {
    0.0
  } else {
    mine.iter().map(|a| a.score as f64).sum::<f64>() / mine.len() as f64
  };
  Ok(StudentReport {
    student,
    activity_count: mine.len(),
    average_score: (average_score * 10.0).round() / 10.0,
    total_time_spent: mine.iter().map(|a| a.time_spent as u64).sum(),
    words_studied: mine.iter().map(|a| a.words_studied as u64).sum(),
    by_type,
    recent: mine.into_iter().take(RECENT_ACTIVITY_COUNT).collect(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::tests::{set_remote_offline, test_state};

  fn input(name: &str, grade: u8) -> NewStudent {
    NewStudent { name: name.into(), grade, ..Default::default() }
  }

  #[tokio::test]
  async fn first_load_creates_teacher_and_placeholder_data() {
    let state = test_state();
    let dash = load_dashboard(&state, "t1").await;
    assert_eq!(dash.teacher.id, "t1");
    assert_eq!(dash.students_origin, Origin::Generated);
    assert_eq!(dash.students.len(), state.config.sample.students);
    assert_eq!(dash.stats.total_students, dash.students.len());

    let again = load_dashboard(&state, "t1").await;
    assert_eq!(again.students_origin, Origin::Remote);
    let ids = |l: &[Student]| {
      let mut v: Vec<String> = l.iter().map(|s| s.id.clone()).collect();
      v.sort();
      v
    };
    assert_eq!(ids(&again.students), ids(&dash.students));
  }

  #[tokio::test]
  async fn progress_and_achievements_live_in_their_own_tables() {
    use crate::remote::{RemoteStore, ACHIEVEMENTS, USER_PROGRESS};
    use serde_json::Value;

    let state = test_state();
    let dash = load_dashboard(&state, "t1").await;
    let snapshot = |l: &[Student]| {
      let mut v: Vec<(String, Progress, Vec<Achievement>)> =
        l.iter().map(|s| (s.id.clone(), s.progress.clone(), s.achievements.clone())).collect();
      v.sort_by(|a, b| a.0.cmp(&b.0));
      v
    };
    let (again, origin) = state.students.load("t1", Vec::new).await;
    assert_eq!(origin, Origin::Remote);
    assert_eq!(snapshot(&again), snapshot(&dash.students));

    let remote = state.sync.remote.clone().unwrap();
    let RemoteStore::Memory(m) = remote.as_ref() else { unreachable!() };
    let rows_of = |rows: Vec<Value>, id: &str| rows.into_iter().filter(|r| r["student_id"] == id).collect::<Vec<_>>();

    let kept = &dash.students[1].id;
    state.students.update("t1", kept, |s| s.progress.score = 999).await.unwrap();
    let progress = rows_of(m.dump(USER_PROGRESS).await, kept);
    assert_eq!(progress.len(), 1);
    assert_eq!(progress[0]["score"], 999);

    let gone = &dash.students[0].id;
    delete_student(&state, "t1", gone).await.unwrap();
    assert!(rows_of(m.dump(USER_PROGRESS).await, gone).is_empty());
    assert!(rows_of(m.dump(ACHIEVEMENTS).await, gone).is_empty());
  }

  #[tokio::test]
  async fn import_adds_exactly_the_valid_rows() {
    let state = test_state();
    state.students.load("t1", Vec::new).await;
    let csv = "name,number,grade,email,notes\nA,1,2\nB,2,3,b@x.test,\n,3,3\nC\n";
    let report = import_students_csv(&state, "t1", csv).await;
    assert_eq!(report, ImportReport { added: 2, skipped: 2 });
    assert_eq!(current_students(&state, "t1").await.len(), 2);
  }

  #[tokio::test]
  async fn offline_mutations_keep_cache_in_step() {
    let state = test_state();
    state.students.load("t1", Vec::new).await;
    state.classrooms.load("t1", Vec::new).await;
    set_remote_offline(&state, true);

    let a = add_student(&state, "t1", input("Ali", 3)).await.unwrap();
    let b = add_student(&state, "t1", input("Huda", 3)).await.unwrap();
    add_classroom(&state, "t1", ClassRoomInput {
      name: "3A".into(),
      grade: 3,
      student_ids: vec![a.id.clone(), b.id.clone()],
      description: String::new(),
    }).await.unwrap();
    update_student(&state, "t1", &b.id, StudentPatch { grade: Some(4), ..Default::default() }).await.unwrap();
    delete_student(&state, "t1", &a.id).await.unwrap();

    let students = current_students(&state, "t1").await;
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].grade, 4);
    assert_eq!(state.students.cached("t1").unwrap(), students);

    let rooms = current_classrooms(&state, "t1").await;
    assert_eq!(rooms[0].student_ids, vec![b.id.clone()]);
    assert_eq!(state.classrooms.cached("t1").unwrap(), rooms);
  }

  #[tokio::test]
  async fn validation_rejects_before_mutation() {
    let state = test_state();
    state.students.load("t1", Vec::new).await;
    assert_eq!(add_student(&state, "t1", input("  ", 3)).await.unwrap_err(), DashboardError::MissingField("name"));
    assert!(add_student(&state, "t1", input("Zaid", 13)).await.is_err());
    assert!(current_students(&state, "t1").await.is_empty());
  }

  #[test]
  fn stats_window_and_rounding() {
    let now = Utc::now();
    let mk = |score: u32, days: Option<i64>| Student {
      id: format!("s{score}"),
      teacher_id: "t".into(),
      name: "x".into(),
      student_number: String::new(),
      grade: 1,
      parent_email: String::new(),
      notes: String::new(),
      progress: Progress { score, words_learned: 10, ..Default::default() },
      achievements: vec![],
      last_active: days.map(|d| now - Duration::days(d)),
      created_at: now,
    };
    let students = vec![mk(10, Some(1)), mk(20, Some(10)), mk(31, None)];
    let stats = dashboard_stats(&students, &[], now);
    assert_eq!(stats.active_students, 1);
    assert_eq!(stats.average_score, 20.3);
    assert_eq!(stats.total_words_learned, 30);
    assert_eq!(stats.top_students[0].progress.score, 31);
  }

  #[tokio::test]
  async fn report_aggregates_one_student() {
    let state = test_state();
    let dash = load_dashboard(&state, "t1").await;
    let sid = &dash.activities[0].student_id;
    let report = student_report(&state, "t1", sid).await.unwrap();
    let expected = dash.activities.iter().filter(|a| &a.student_id == sid).count();
    assert_eq!(report.activity_count, expected);
    assert_eq!(report.by_type.values().sum::<usize>(), expected);
  }
}
