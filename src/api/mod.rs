mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::Engine;

pub fn create_router(engine: Engine) -> Router {
    let api = Router::new()
        // Employees
        .route("/employees", get(handlers::list_employees))
        .route("/employees", post(handlers::create_employee))
        .route("/employees/{id}", get(handlers::get_employee))
        .route("/employees/{id}", delete(handlers::delete_employee))
        .route("/employees/{id}/profile", get(handlers::get_employee_profile))
        .route("/employees/{id}/projects", get(handlers::list_employee_projects))
        .route(
            "/employees/{id}/projects/{project_id}",
            put(handlers::join_project),
        )
        .route(
            "/employees/{id}/projects/{project_id}",
            delete(handlers::leave_project),
        )
        .route("/employees/{id}/enrollments", post(handlers::enroll_course))
        .route(
            "/employees/{id}/course-completions",
            post(handlers::complete_course),
        )
        .route("/employees/{id}/withdraw", post(handlers::withdraw))
        // Projects
        .route("/projects", get(handlers::list_projects))
        .route("/projects", post(handlers::create_project))
        .route("/projects/{id}", get(handlers::get_project))
        .route("/projects/{id}", put(handlers::update_project))
        .route("/projects/{id}", delete(handlers::delete_project))
        .route("/projects/{id}/assignees", put(handlers::set_assignees))
        .route("/projects/{id}/status", put(handlers::override_status))
        .route("/projects/{id}/complete", post(handlers::complete_project))
        // Courses
        .route("/courses", get(handlers::list_courses))
        .route("/courses", post(handlers::create_course))
        .route("/courses/{id}", get(handlers::get_course))
        // Maintenance
        .route("/consistency", get(handlers::check_consistency))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}
