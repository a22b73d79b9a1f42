use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::{ConsistencyReport, Engine, EngineError};
use crate::models::*;
use crate::reports::{self, EmployeeProfile};

type ApiResult<T> = Result<T, (StatusCode, String)>;

// ============================================================
// Error Handling
// ============================================================

/// Map an engine error to a response.
///
/// Store failures are logged server-side and returned as a generic message.
/// A partial sync returns its full body so the caller can see which records
/// were written and re-issue the request.
fn engine_error(e: EngineError) -> (StatusCode, String) {
    match e {
        EngineError::NotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        EngineError::Conflict(_) => {
            tracing::warn!("{}", e);
            (StatusCode::CONFLICT, e.to_string())
        }
        EngineError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        EngineError::PartialSync(failure) => {
            tracing::error!("{}", failure);
            let body = serde_json::to_string(&failure).unwrap_or_else(|_| failure.to_string());
            (StatusCode::INTERNAL_SERVER_ERROR, body)
        }
        EngineError::Store(e) => internal_error(e),
    }
}

/// Report a malformed JSON body as 400 instead of axum's 422.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| (StatusCode::BAD_REQUEST, rejection.body_text()))
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Employees
// ============================================================

pub async fn list_employees(State(engine): State<Engine>) -> ApiResult<Json<Vec<Employee>>> {
    engine.list_employees().map(Json).map_err(engine_error)
}

pub async fn create_employee(
    State(engine): State<Engine>,
    payload: Result<Json<CreateEmployeeInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let input = json_body(payload)?;
    engine
        .create_employee(input)
        .map(|e| (StatusCode::CREATED, Json(e)))
        .map_err(engine_error)
}

pub async fn get_employee(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    engine.load_employee(&id).map(Json).map_err(engine_error)
}

pub async fn delete_employee(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    engine.delete_employee(&id).map_err(engine_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_employee_profile(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<Json<EmployeeProfile>> {
    reports::employee_profile(engine.store(), &id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Employee not found".to_string()))
}

/// Open projects only; completed ones show up in the profile.
pub async fn list_employee_projects(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Project>>> {
    engine.load_employee(&id).map_err(engine_error)?;
    reports::open_projects_for(engine.store(), &id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn join_project(
    State(engine): State<Engine>,
    Path((id, project_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<MembershipUpdate>> {
    engine
        .reconcile_from_employee_side(&id, project_id, MembershipChange::Add)
        .map(Json)
        .map_err(engine_error)
}

pub async fn leave_project(
    State(engine): State<Engine>,
    Path((id, project_id)): Path<(String, Uuid)>,
) -> ApiResult<Json<MembershipUpdate>> {
    engine
        .reconcile_from_employee_side(&id, project_id, MembershipChange::Remove)
        .map(Json)
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
pub struct CourseRequest {
    pub course_id: Uuid,
}

pub async fn enroll_course(
    State(engine): State<Engine>,
    Path(id): Path<String>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<Json<Employee>> {
    let req = json_body(payload)?;
    engine
        .enroll_course(&id, req.course_id)
        .map(Json)
        .map_err(engine_error)
}

pub async fn complete_course(
    State(engine): State<Engine>,
    Path(id): Path<String>,
    payload: Result<Json<CourseRequest>, JsonRejection>,
) -> ApiResult<Json<CourseCredit>> {
    let req = json_body(payload)?;
    engine
        .credit_course_completion(&id, req.course_id)
        .map(Json)
        .map_err(engine_error)
}

pub async fn withdraw(
    State(engine): State<Engine>,
    Path(id): Path<String>,
) -> ApiResult<Json<Withdrawal>> {
    engine.withdraw(&id).map(Json).map_err(engine_error)
}

// ============================================================
// Projects
// ============================================================

#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    /// Comma-separated statuses, or `all`. Defaults to `current,upcoming`.
    pub status: Option<String>,
}

fn parse_status_filter(raw: Option<&str>) -> ApiResult<Vec<ProjectStatus>> {
    let Some(raw) = raw else {
        return Ok(vec![ProjectStatus::Current, ProjectStatus::Upcoming]);
    };
    if raw.trim() == "all" {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|s| {
            ProjectStatus::from_str(s.trim()).ok_or((
                StatusCode::BAD_REQUEST,
                format!("Unknown project status: {}", s.trim()),
            ))
        })
        .collect()
}

pub async fn list_projects(
    State(engine): State<Engine>,
    Query(query): Query<ListProjectsQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let statuses = parse_status_filter(query.status.as_deref())?;
    engine.list_projects(&statuses).map(Json).map_err(engine_error)
}

pub async fn create_project(
    State(engine): State<Engine>,
    payload: Result<Json<CreateProjectInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let input = json_body(payload)?;
    engine
        .create_project(input)
        .map(|p| (StatusCode::CREATED, Json(p)))
        .map_err(engine_error)
}

pub async fn get_project(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    engine.load_project(id).map(Json).map_err(engine_error)
}

pub async fn update_project(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateProjectInput>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let input = json_body(payload)?;
    engine
        .update_project_details(id, input)
        .map(Json)
        .map_err(engine_error)
}

pub async fn delete_project(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    engine.delete_project(id).map_err(engine_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AssigneesRequest {
    pub employee_ids: Vec<String>,
}

pub async fn set_assignees(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    payload: Result<Json<AssigneesRequest>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let req = json_body(payload)?;
    engine
        .reconcile_assignment(id, &req.employee_ids)
        .map(Json)
        .map_err(engine_error)
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: ProjectStatus,
}

pub async fn override_status(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let req = json_body(payload)?;
    engine
        .override_status(id, req.status)
        .map(Json)
        .map_err(engine_error)
}

pub async fn complete_project(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CompletionReport>> {
    engine.complete_project(id).map(Json).map_err(engine_error)
}

// ============================================================
// Courses
// ============================================================

pub async fn list_courses(State(engine): State<Engine>) -> ApiResult<Json<Vec<Course>>> {
    engine.list_courses().map(Json).map_err(engine_error)
}

pub async fn create_course(
    State(engine): State<Engine>,
    payload: Result<Json<CreateCourseInput>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let input = json_body(payload)?;
    engine
        .create_course(input)
        .map(|c| (StatusCode::CREATED, Json(c)))
        .map_err(engine_error)
}

pub async fn get_course(
    State(engine): State<Engine>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Course>> {
    engine.load_course(id).map(Json).map_err(engine_error)
}

// ============================================================
// Maintenance
// ============================================================

pub async fn check_consistency(
    State(engine): State<Engine>,
) -> ApiResult<Json<ConsistencyReport>> {
    engine.check_consistency().map(Json).map_err(engine_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_defaults_to_open_projects() {
        assert_eq!(
            parse_status_filter(None).unwrap(),
            vec![ProjectStatus::Current, ProjectStatus::Upcoming]
        );
    }

    #[test]
    fn status_filter_parses_lists_and_all() {
        assert_eq!(
            parse_status_filter(Some("completed, current")).unwrap(),
            vec![ProjectStatus::Completed, ProjectStatus::Current]
        );
        assert!(parse_status_filter(Some("all")).unwrap().is_empty());
    }

    #[test]
    fn status_filter_rejects_unknown_values() {
        let (status, _) = parse_status_filter(Some("archived")).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
