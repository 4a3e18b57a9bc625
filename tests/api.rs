//! Router-level tests: drive the full Axum app in-process with
//! `tower::ServiceExt::oneshot`, backed by in-memory remote and local stores.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use classdesk::config::AppConfig;
use classdesk::remote::{MemoryRemote, RemoteStore};
use classdesk::routes::build_router;
use classdesk::seeds::builtin_quiz_questions;
use classdesk::state::AppState;
use classdesk::storage::MemoryStore;

fn app() -> Router {
  let mut config = AppConfig::default();
  config.sample.seed = Some(5);
  config.sample.access_codes = 0;
  let state = AppState::from_parts(config, Some(RemoteStore::Memory(MemoryRemote::new())), Arc::new(MemoryStore::new()));
  build_router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      req = req.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
  (status, value)
}

async fn send_text(app: &Router, method: &str, uri: &str, text: &str) -> (StatusCode, String, Option<String>) {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "text/csv")
    .body(Body::from(text.to_string()))
    .unwrap();
  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let content_type = res
    .headers()
    .get(header::CONTENT_TYPE)
    .and_then(|v| v.to_str().ok())
    .map(str::to_string);
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
}

#[tokio::test]
async fn health() {
  let app = app();
  let (status, body) = send(&app, "GET", "/api/v1/health", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn code_limit_is_enforced_with_configured_value() {
  let app = app();
  let (status, settings) = send(&app, "PUT", "/api/v1/settings/access-codes", Some(json!({ "teacherCodeLimit": 2 }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(settings["teacherCodeLimit"], 2);

  for _ in 0..2 {
    let (status, _) = send(&app, "POST", "/api/v1/teachers/t1/access-codes", Some(json!({ "grade": 3 }))).await;
    assert_eq!(status, StatusCode::CREATED);
  }
  let (status, body) = send(&app, "POST", "/api/v1/teachers/t1/access-codes", Some(json!({ "grade": 3 }))).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(body["error"].as_str().unwrap().contains('2'));

  let (_, page) = send(&app, "GET", "/api/v1/teachers/t1/access-codes?sort=created_at&dir=desc", None).await;
  assert_eq!(page["total"], 2);
}

#[tokio::test]
async fn duplicate_custom_code_conflicts() {
  let app = app();
  let body = json!({ "grade": 2, "code": "abcd2345" });
  let (status, created) = send(&app, "POST", "/api/v1/teachers/t1/access-codes", Some(body.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["code"], "ABCD2345");
  let (status, _) = send(&app, "POST", "/api/v1/teachers/t1/access-codes", Some(body)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn validation_errors_are_json() {
  let app = app();
  let (status, body) = send(&app, "POST", "/api/v1/teachers/t1/students", Some(json!({ "name": " ", "grade": 3 }))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["error"], "Missing required field: name");
}

#[tokio::test]
async fn import_then_export_roster() {
  let app = app();
  let (_, page) = send(&app, "GET", "/api/v1/teachers/t2/students?perPage=100", None).await;
  let before = page["total"].as_u64().unwrap();

  let csv = "name,number,grade,email,notes\nZuleika,10,4,z@x.test,\nOmar,11,5\nbad row\n";
  let (status, report, _) = send_text(&app, "POST", "/api/v1/teachers/t2/students/import", csv).await;
  assert_eq!(status, StatusCode::OK);
  let report: Value = serde_json::from_str(&report).unwrap();
  assert_eq!(report, json!({ "added": 2, "skipped": 1 }));

  let (_, page) = send(&app, "GET", "/api/v1/teachers/t2/students?search=zuleika", None).await;
  assert_eq!(page["total"], 1);
  let (_, page) = send(&app, "GET", "/api/v1/teachers/t2/students?perPage=100", None).await;
  assert_eq!(page["total"].as_u64().unwrap(), before + 2);

  let (status, body, content_type) = send_text(&app, "GET", "/api/v1/teachers/t2/students/export", "").await;
  assert_eq!(status, StatusCode::OK);
  assert!(content_type.unwrap().starts_with("text/csv"));
  assert!(body.starts_with('\u{feff}'));
  assert!(body.contains("Zuleika,10,4"));
}

#[tokio::test]
async fn runner_session_scores_all_correct() {
  let app = app();
  let (status, view) = send(&app, "POST", "/api/v1/runner", Some(json!({ "skill": "vocabulary" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(view["phase"], "question_active");
  assert_eq!(view["total"], 3);
  let id = view["id"].as_str().unwrap().to_string();

  let answers: Vec<usize> = builtin_quiz_questions()
    .into_iter()
    .filter(|q| q.skill == "vocabulary")
    .map(|q| q.correct_index)
    .collect();
  for choice in answers {
    let (status, shown) = send(&app, "POST", &format!("/api/v1/runner/{id}/answer"), Some(json!({ "choice": choice }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shown["phase"], "answer_shown");
    send(&app, "POST", &format!("/api/v1/runner/{id}/next"), None).await;
  }

  let (_, done) = send(&app, "GET", &format!("/api/v1/runner/{id}"), None).await;
  assert_eq!(done["phase"], "test_complete");
  assert_eq!(done["score"], 3);
  assert_eq!(done["percentage"], 100);

  let (status, _) = send(&app, "POST", &format!("/api/v1/runner/{id}/next"), None).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_skill_lands_in_error_phase() {
  let app = app();
  let (status, view) = send(&app, "POST", "/api/v1/runner", Some(json!({ "skill": "astronomy" }))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(view["phase"], "error");
  assert!(view["error"].is_string());
}

#[tokio::test]
async fn authored_content_overrides_builtin() {
  let app = app();
  let word = json!({
    "word": "apple",
    "translation": "تفاحة",
    "example": "Green apples are sour.",
    "grade": 1,
    "unit": 1,
    "topic": "food"
  });
  let (status, saved) = send(&app, "PUT", "/api/v1/content/vocabulary/v-apple?author=ed", Some(word)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(saved["id"], "v-apple");

  let (_, mine) = send(&app, "GET", "/api/v1/content/vocabulary/v-apple?author=ed", None).await;
  assert_eq!(mine["example"], "Green apples are sour.");
  let (_, shared) = send(&app, "GET", "/api/v1/content/vocabulary/v-apple", None).await;
  assert_ne!(shared["example"], "Green apples are sour.");

  let (_, grade1) = send(&app, "GET", "/api/v1/content/vocabulary?author=ed&grade=1", None).await;
  assert!(grade1.as_array().unwrap().iter().all(|w| w["grade"] == 1));
}

#[tokio::test]
async fn notifications_can_be_dismissed() {
  let app = app();
  send(&app, "POST", "/api/v1/teachers/t3/classrooms", Some(json!({ "name": "4B", "grade": 4 }))).await;
  let (_, list) = send(&app, "GET", "/api/v1/notifications", None).await;
  let items = list["items"].as_array().unwrap();
  let notice = items.iter().find(|n| n["kind"] == "success").unwrap();
  let id = notice["id"].as_u64().unwrap();

  let (status, _) = send(&app, "DELETE", &format!("/api/v1/notifications/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = send(&app, "DELETE", &format!("/api/v1/notifications/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}
