//! HTTP endpoint handlers. These are thin wrappers that forward to the service
//! modules; validation failures come back as `DashboardError` responses.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument};

use crate::access_codes::{
  add_access_code, current_codes, delete_access_code, load_codes, redeem_code, set_code_active, suggest_code,
  update_access_code,
};
use crate::content::{Content, ContentFilter, ContentLibrary};
use crate::csv::{export_access_codes, export_report, export_students, import_template};
use crate::domain::*;
use crate::error::DashboardError;
use crate::listing::{filter_codes, filter_students, paginate, sort_codes, sort_students, Page};
use crate::protocol::*;
use crate::runner::{choose_skill, end_session, start_session, with_session, RunnerView};
use crate::settings::AccessCodeSettings;
use crate::state::AppState;
use crate::teacher_data::*;
use crate::util::file_slug;

type ApiResult<T> = Result<Json<T>, DashboardError>;

fn csv_response(name: &str, body: String) -> Response {
  let disposition = format!("attachment; filename=\"{}.csv\"", file_slug(name));
  (
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    body,
  )
    .into_response()
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, remote: state.sync.remote.is_some() })
}

// Teacher profile and dashboard

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> impl IntoResponse {
  let (teacher, origin) = load_profile(&state, &teacher_id).await;
  info!(target: "classdesk", %teacher_id, ?origin, "HTTP profile served");
  Json(teacher)
}

pub async fn http_put_profile(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Json(patch): Json<TeacherPatch>,
) -> ApiResult<Teacher> {
  Ok(Json(update_profile(&state, &teacher_id, patch).await?))
}

pub async fn http_get_dashboard(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> impl IntoResponse {
  Json(load_dashboard(&state, &teacher_id).await)
}

// Students

#[instrument(level = "info", skip(state, q), fields(search = %q.search, grade = ?q.grade))]
pub async fn http_list_students(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Query(q): Query<StudentQuery>,
) -> Json<Page<Student>> {
  let mut students = filter_students(current_students(&state, &teacher_id).await, &q.search, q.grade);
  if let Some(key) = q.sort {
    sort_students(&mut students, key, q.dir);
  }
  Json(paginate(students, q.page.unwrap_or(1), q.per_page.unwrap_or(DEFAULT_PER_PAGE)))
}

pub async fn http_post_student(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Json(body): Json<NewStudent>,
) -> Result<(StatusCode, Json<Student>), DashboardError> {
  let student = add_student(&state, &teacher_id, body).await?;
  Ok((StatusCode::CREATED, Json(student)))
}

pub async fn http_put_student(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
  Json(patch): Json<StudentPatch>,
) -> ApiResult<Student> {
  Ok(Json(update_student(&state, &teacher_id, &id, patch).await?))
}

pub async fn http_delete_student(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
) -> ApiResult<Student> {
  Ok(Json(delete_student(&state, &teacher_id, &id).await?))
}

pub async fn http_get_student_report(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
) -> ApiResult<StudentReport> {
  Ok(Json(student_report(&state, &teacher_id, &id).await?))
}

/// Body is the raw CSV text.
#[instrument(level = "info", skip(state, body), fields(bytes = body.len()))]
pub async fn http_post_student_import(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  body: String,
) -> Json<ImportReport> {
  Json(import_students_csv(&state, &teacher_id, &body).await)
}

pub async fn http_get_student_export(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> Response {
  let students = current_students(&state, &teacher_id).await;
  csv_response(&format!("students-{teacher_id}"), export_students(&students))
}

pub async fn http_get_import_template() -> Response {
  csv_response("students-template", import_template())
}

// Classrooms and activities

pub async fn http_list_classrooms(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> Json<Vec<ClassRoom>> {
  Json(current_classrooms(&state, &teacher_id).await)
}

pub async fn http_post_classroom(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Json(body): Json<ClassRoomInput>,
) -> Result<(StatusCode, Json<ClassRoom>), DashboardError> {
  let room = add_classroom(&state, &teacher_id, body).await?;
  Ok((StatusCode::CREATED, Json(room)))
}

pub async fn http_put_classroom(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
  Json(body): Json<ClassRoomInput>,
) -> ApiResult<ClassRoom> {
  Ok(Json(update_classroom(&state, &teacher_id, &id, body).await?))
}

pub async fn http_delete_classroom(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
) -> ApiResult<ClassRoom> {
  Ok(Json(delete_classroom(&state, &teacher_id, &id).await?))
}

pub async fn http_list_activities(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
) -> Json<Vec<StudentActivity>> {
  let mut activities = current_activities(&state, &teacher_id).await;
  activities.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
  Json(activities)
}

pub async fn http_get_report_export(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> Response {
  let students = current_students(&state, &teacher_id).await;
  let activities = current_activities(&state, &teacher_id).await;
  let body = export_report(&activities, |id| {
    students.iter().find(|s| s.id == id).map(|s| s.name.as_str())
  });
  csv_response(&format!("report-{teacher_id}"), body)
}

// Access codes

#[instrument(level = "info", skip(state, q), fields(search = %q.search, status = ?q.status))]
pub async fn http_list_codes(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Query(q): Query<CodeQuery>,
) -> Json<Page<AccessCode>> {
  let codes = current_codes(&state, &teacher_id).await;
  let mut codes = filter_codes(codes, &q.search, q.grade, q.status, Utc::now());
  if let Some(key) = q.sort {
    sort_codes(&mut codes, key, q.dir);
  }
  Json(paginate(codes, q.page.unwrap_or(1), q.per_page.unwrap_or(DEFAULT_PER_PAGE)))
}

pub async fn http_reload_codes(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
) -> Json<CollectionOut<AccessCode>> {
  let (items, origin) = load_codes(&state, &teacher_id).await;
  Json(CollectionOut { items, origin })
}

#[instrument(level = "info", skip(state, body), fields(grade = body.grade, custom = body.code.is_some()))]
pub async fn http_post_code(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Json(body): Json<NewAccessCode>,
) -> Result<(StatusCode, Json<AccessCode>), DashboardError> {
  let code = add_access_code(&state, &teacher_id, body).await?;
  Ok((StatusCode::CREATED, Json(code)))
}

pub async fn http_get_generated_code(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
) -> Json<GeneratedCodeOut> {
  Json(GeneratedCodeOut { code: suggest_code(&state, &teacher_id).await })
}

pub async fn http_get_code_export(State(state): State<Arc<AppState>>, Path(teacher_id): Path<String>) -> Response {
  let codes = current_codes(&state, &teacher_id).await;
  csv_response(&format!("access-codes-{teacher_id}"), export_access_codes(&codes, Utc::now()))
}

pub async fn http_put_code(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
  Json(patch): Json<AccessCodePatch>,
) -> ApiResult<AccessCode> {
  Ok(Json(update_access_code(&state, &teacher_id, &id, patch).await?))
}

pub async fn http_post_code_active(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
  Json(body): Json<ActiveIn>,
) -> ApiResult<AccessCode> {
  Ok(Json(set_code_active(&state, &teacher_id, &id, body.active).await?))
}

pub async fn http_delete_code(
  State(state): State<Arc<AppState>>,
  Path((teacher_id, id)): Path<(String, String)>,
) -> ApiResult<AccessCode> {
  Ok(Json(delete_access_code(&state, &teacher_id, &id).await?))
}

pub async fn http_post_redeem(
  State(state): State<Arc<AppState>>,
  Path(teacher_id): Path<String>,
  Json(body): Json<RedeemIn>,
) -> ApiResult<AccessCode> {
  Ok(Json(redeem_code(&state, &teacher_id, &body.code).await?))
}

// Settings

pub async fn http_get_code_settings(State(state): State<Arc<AppState>>) -> Json<AccessCodeSettings> {
  Json(state.code_settings())
}

/// Partial update: keys present in the body overwrite the current settings.
#[instrument(level = "info", skip(state, body))]
pub async fn http_put_code_settings(State(state): State<Arc<AppState>>, Json(body): Json<Value>) -> Json<AccessCodeSettings> {
  let settings = state.code_settings().merge(Some(&body));
  state.save_code_settings(&settings);
  info!(target: "classdesk", limit = settings.teacher_code_limit, custom = settings.allow_teacher_custom_codes, "Access-code settings saved");
  Json(settings)
}

// Content datasets

pub async fn http_list_content<R: Content>(
  State(state): State<Arc<AppState>>,
  Query(author): Query<AuthorQuery>,
  Query(filter): Query<ContentFilter>,
) -> Json<Vec<R>> {
  Json(ContentLibrary::<R>::of(&state).list(author.author(), &filter).await)
}

pub async fn http_get_content<R: Content>(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(author): Query<AuthorQuery>,
) -> ApiResult<R> {
  ContentLibrary::<R>::of(&state)
    .get(author.author(), &id)
    .await
    .map(Json)
    .ok_or_else(|| DashboardError::NotFound(format!("{} {id}", R::LABEL)))
}

pub async fn http_post_content<R: Content>(
  State(state): State<Arc<AppState>>,
  Query(author): Query<AuthorQuery>,
  Json(body): Json<R>,
) -> Result<(StatusCode, Json<R>), DashboardError> {
  let saved = ContentLibrary::<R>::of(&state).create(author.author(), body).await?;
  Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn http_put_content<R: Content>(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(author): Query<AuthorQuery>,
  Json(body): Json<R>,
) -> ApiResult<R> {
  Ok(Json(ContentLibrary::<R>::of(&state).update(author.author(), &id, body).await?))
}

pub async fn http_delete_content<R: Content>(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Query(author): Query<AuthorQuery>,
) -> ApiResult<R> {
  Ok(Json(ContentLibrary::<R>::of(&state).delete(author.author(), &id).await?))
}

// Notifications

pub async fn http_list_notifications(State(state): State<Arc<AppState>>) -> Json<NotificationsOut> {
  Json(NotificationsOut { items: state.notices().active(Utc::now()) })
}

pub async fn http_delete_notification(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> StatusCode {
  if state.notices().dismiss(id) { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND }
}

// Test-exercise runner sessions

#[instrument(level = "info", skip(state, body), fields(skill = %body.skill))]
pub async fn http_post_runner(
  State(state): State<Arc<AppState>>,
  Json(body): Json<RunnerStartIn>,
) -> Result<(StatusCode, Json<RunnerView>), DashboardError> {
  let author = body.author.as_deref().unwrap_or(SHARED_AUTHOR);
  let view = start_session(&state, author, &body.skill).await?;
  Ok((StatusCode::CREATED, Json(view)))
}

pub async fn http_get_runner(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<RunnerView> {
  Ok(Json(with_session(&state, &id, |_| Ok(())).await?))
}

pub async fn http_post_runner_skill(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<RunnerStartIn>,
) -> ApiResult<RunnerView> {
  let author = body.author.as_deref().unwrap_or(SHARED_AUTHOR);
  Ok(Json(choose_skill(&state, &id, author, &body.skill).await?))
}

pub async fn http_post_runner_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<RunnerAnswerIn>,
) -> ApiResult<RunnerView> {
  Ok(Json(with_session(&state, &id, |r| r.answer(body.choice)).await?))
}

pub async fn http_post_runner_next(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<RunnerView> {
  Ok(Json(with_session(&state, &id, |r| r.next()).await?))
}

pub async fn http_post_runner_restart(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<RunnerView> {
  Ok(Json(with_session(&state, &id, |r| {
    r.restart();
    Ok(())
  }).await?))
}

pub async fn http_delete_runner(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<StatusCode, DashboardError> {
  end_session(&state, &id).await?;
  Ok(StatusCode::NO_CONTENT)
}
