//! Router assembly: HTTP endpoints, static files, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::content::Content;
use crate::domain::{GrammarRule, MathProblem, QuizQuestion, VocabularyWord};
use crate::state::AppState;

pub mod http;

/// CRUD routes for one content dataset under `/api/v1/content/<name>`.
fn content_routes<R: Content>(router: Router<Arc<AppState>>, name: &str) -> Router<Arc<AppState>> {
    router
        .route(
            &format!("/api/v1/content/{name}"),
            get(http::http_list_content::<R>).post(http::http_post_content::<R>),
        )
        .route(
            &format!("/api/v1/content/{name}/:id"),
            get(http::http_get_content::<R>)
                .put(http::http_put_content::<R>)
                .delete(http::http_delete_content::<R>),
        )
}

/// Build the application router with:
/// - REST API under `/api/v1/...`, teacher-scoped routes under
///   `/api/v1/teachers/:teacher_id/...`
/// - Static frontend from `./static` with index fallback
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    let router = Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Teacher profile + dashboard
        .route(
            "/api/v1/teachers/:teacher_id/profile",
            get(http::http_get_profile).put(http::http_put_profile),
        )
        .route("/api/v1/teachers/:teacher_id/dashboard", get(http::http_get_dashboard))
        // Students
        .route(
            "/api/v1/teachers/:teacher_id/students",
            get(http::http_list_students).post(http::http_post_student),
        )
        .route("/api/v1/teachers/:teacher_id/students/import", post(http::http_post_student_import))
        .route("/api/v1/teachers/:teacher_id/students/export", get(http::http_get_student_export))
        .route(
            "/api/v1/teachers/:teacher_id/students/:id",
            put(http::http_put_student).delete(http::http_delete_student),
        )
        .route("/api/v1/teachers/:teacher_id/students/:id/report", get(http::http_get_student_report))
        .route("/api/v1/students/import-template", get(http::http_get_import_template))
        // Classrooms + activities
        .route(
            "/api/v1/teachers/:teacher_id/classrooms",
            get(http::http_list_classrooms).post(http::http_post_classroom),
        )
        .route(
            "/api/v1/teachers/:teacher_id/classrooms/:id",
            put(http::http_put_classroom).delete(http::http_delete_classroom),
        )
        .route("/api/v1/teachers/:teacher_id/activities", get(http::http_list_activities))
        .route("/api/v1/teachers/:teacher_id/activities/export", get(http::http_get_report_export))
        // Access codes
        .route(
            "/api/v1/teachers/:teacher_id/access-codes",
            get(http::http_list_codes).post(http::http_post_code),
        )
        .route("/api/v1/teachers/:teacher_id/access-codes/reload", post(http::http_reload_codes))
        .route("/api/v1/teachers/:teacher_id/access-codes/generate", get(http::http_get_generated_code))
        .route("/api/v1/teachers/:teacher_id/access-codes/export", get(http::http_get_code_export))
        .route("/api/v1/teachers/:teacher_id/access-codes/redeem", post(http::http_post_redeem))
        .route(
            "/api/v1/teachers/:teacher_id/access-codes/:id",
            put(http::http_put_code).delete(http::http_delete_code),
        )
        .route("/api/v1/teachers/:teacher_id/access-codes/:id/active", post(http::http_post_code_active))
        // Admin settings
        .route(
            "/api/v1/settings/access-codes",
            get(http::http_get_code_settings).put(http::http_put_code_settings),
        )
        // Notifications
        .route("/api/v1/notifications", get(http::http_list_notifications))
        .route("/api/v1/notifications/:id", axum::routing::delete(http::http_delete_notification))
        // Test-exercise runner
        .route("/api/v1/runner", post(http::http_post_runner))
        .route("/api/v1/runner/:id", get(http::http_get_runner).delete(http::http_delete_runner))
        .route("/api/v1/runner/:id/skill", post(http::http_post_runner_skill))
        .route("/api/v1/runner/:id/answer", post(http::http_post_runner_answer))
        .route("/api/v1/runner/:id/next", post(http::http_post_runner_next))
        .route("/api/v1/runner/:id/restart", post(http::http_post_runner_restart));

    let router = content_routes::<VocabularyWord>(router, "vocabulary");
    let router = content_routes::<GrammarRule>(router, "grammar");
    let router = content_routes::<MathProblem>(router, "math-problems");
    let router = content_routes::<QuizQuestion>(router, "quiz-questions");

    router
        // State + HTTP tracing + CORS
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
