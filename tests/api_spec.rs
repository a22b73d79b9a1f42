use axum::http::StatusCode;
use axum_test::TestServer;
use crewledger::api::create_router;
use crewledger::db::Database;
use crewledger::engine::{ConsistencyReport, Engine, PartialSyncFailure};
use crewledger::models::*;
use serde_json::json;

fn setup() -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(Engine::new(db));
    TestServer::new(app).expect("Failed to create test server")
}

async fn create_test_employee(server: &TestServer, id: &str) -> Employee {
    server
        .post("/api/v1/employees")
        .json(&json!({ "id": id, "name": format!("Employee {}", id) }))
        .await
        .json::<Employee>()
}

async fn create_test_project(server: &TestServer, reward: f64) -> Project {
    server
        .post("/api/v1/projects")
        .json(&CreateProjectInput {
            title: "Billing revamp".to_string(),
            code: "PRJ-104".to_string(),
            reward,
            ..Default::default()
        })
        .await
        .json::<Project>()
}

async fn assign(server: &TestServer, project: &Project, ids: &[&str]) -> axum_test::TestResponse {
    server
        .put(&format!("/api/v1/projects/{}/assignees", project.id))
        .json(&json!({ "employee_ids": ids }))
        .await
}

mod employees {
    use super::*;

    #[tokio::test]
    async fn creates_and_fetches_an_employee() {
        let server = setup();

        let response = server
            .post("/api/v1/employees")
            .json(&json!({ "id": "emp001", "name": "Ada", "role": "manager" }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let employee = server.get("/api/v1/employees/emp001").await.json::<Employee>();
        assert_eq!(employee.name, "Ada");
        assert_eq!(employee.role, Role::Manager);
    }

    #[tokio::test]
    async fn returns_404_for_unknown_employee() {
        let server = setup();
        server
            .get("/api/v1/employees/ghost")
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn returns_409_for_duplicate_id() {
        let server = setup();
        create_test_employee(&server, "emp001").await;

        server
            .post("/api/v1/employees")
            .json(&json!({ "id": "emp001", "name": "Again" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn returns_400_for_blank_id() {
        let server = setup();
        server
            .post("/api/v1/employees")
            .json(&json!({ "id": "  ", "name": "Nobody" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn joins_and_leaves_a_project() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        let project = create_test_project(&server, 0.0).await;

        let update = server
            .put(&format!("/api/v1/employees/emp001/projects/{}", project.id))
            .await
            .json::<MembershipUpdate>();
        assert_eq!(update.project.status, ProjectStatus::Current);
        assert!(update.employee.active_projects.contains(&project.id));

        let open = server
            .get("/api/v1/employees/emp001/projects")
            .await
            .json::<Vec<Project>>();
        assert_eq!(open.len(), 1);

        let update = server
            .delete(&format!("/api/v1/employees/emp001/projects/{}", project.id))
            .await
            .json::<MembershipUpdate>();
        assert!(update.project.assigned_employees.is_empty());
    }

    #[tokio::test]
    async fn deletes_an_employee() {
        let server = setup();
        create_test_employee(&server, "emp001").await;

        server
            .delete("/api/v1/employees/emp001")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/employees/emp001")
            .await
            .assert_status_not_found();
    }
}

mod projects {
    use super::*;

    #[tokio::test]
    async fn reconciles_assignees() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        create_test_employee(&server, "emp002").await;
        let project = create_test_project(&server, 0.0).await;

        let response = assign(&server, &project, &["emp001", "emp002", "ghost"]).await;

        response.assert_status_ok();
        let project = response.json::<Project>();
        assert_eq!(project.status, ProjectStatus::Current);
        assert_eq!(project.assigned_employees.len(), 2);
    }

    #[tokio::test]
    async fn lists_open_projects_by_default() {
        let server = setup();
        let done = create_test_project(&server, 0.0).await;
        create_test_project(&server, 0.0).await;
        server
            .post(&format!("/api/v1/projects/{}/complete", done.id))
            .await
            .assert_status_ok();

        let open = server.get("/api/v1/projects").await.json::<Vec<Project>>();
        assert_eq!(open.len(), 1);

        let all = server
            .get("/api/v1/projects")
            .add_query_param("status", "all")
            .await
            .json::<Vec<Project>>();
        assert_eq!(all.len(), 2);

        server
            .get("/api/v1/projects")
            .add_query_param("status", "archived")
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn completes_and_then_rejects_membership_changes() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        create_test_employee(&server, "emp002").await;
        let project = create_test_project(&server, 5000.0).await;
        assign(&server, &project, &["emp001"]).await.assert_status_ok();

        let report = server
            .post(&format!("/api/v1/projects/{}/complete", project.id))
            .await
            .json::<CompletionReport>();
        assert_eq!(report.project.status, ProjectStatus::Completed);
        assert_eq!(report.credited, vec!["emp001"]);

        assign(&server, &project, &["emp002"])
            .await
            .assert_status(StatusCode::CONFLICT);
        server
            .post(&format!("/api/v1/projects/{}/complete", project.id))
            .await
            .assert_status(StatusCode::CONFLICT);

        let employee = server.get("/api/v1/employees/emp001").await.json::<Employee>();
        assert_eq!(employee.balance, 5000.0);
    }

    #[tokio::test]
    async fn rejects_completion_through_status_override() {
        let server = setup();
        let project = create_test_project(&server, 0.0).await;

        server
            .put(&format!("/api/v1/projects/{}/status", project.id))
            .json(&json!({ "status": "completed" }))
            .await
            .assert_status_bad_request();

        let response = server
            .put(&format!("/api/v1/projects/{}/status", project.id))
            .json(&json!({ "status": "current" }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Project>().status, ProjectStatus::Current);
    }

    #[tokio::test]
    async fn returns_400_for_malformed_bodies() {
        let server = setup();
        let project = create_test_project(&server, 0.0).await;

        server
            .put(&format!("/api/v1/projects/{}/assignees", project.id))
            .json(&json!({ "employee_ids": "emp001" }))
            .await
            .assert_status_bad_request();
        server
            .put(&format!("/api/v1/projects/{}/status", project.id))
            .json(&json!({ "status": "archived" }))
            .await
            .assert_status_bad_request();
        server
            .post("/api/v1/projects")
            .json(&json!({ "title": "No code" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn returns_404_for_unknown_project() {
        let server = setup();
        server
            .get(&format!("/api/v1/projects/{}", uuid::Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn deletes_a_project_and_its_references() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        let project = create_test_project(&server, 0.0).await;
        assign(&server, &project, &["emp001"]).await.assert_status_ok();

        server
            .delete(&format!("/api/v1/projects/{}", project.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let employee = server.get("/api/v1/employees/emp001").await.json::<Employee>();
        assert!(employee.active_projects.is_empty());
    }
}

mod rewards {
    use super::*;

    #[tokio::test]
    async fn credits_a_course_once_and_withdraws() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        let course = server
            .post("/api/v1/courses")
            .json(&json!({
                "title": "Ownership in depth",
                "difficulty": "Intermediate",
                "badges": ["X"],
                "reward": 1000.0
            }))
            .await
            .json::<Course>();

        let credit = server
            .post("/api/v1/employees/emp001/course-completions")
            .json(&json!({ "course_id": course.id }))
            .await
            .json::<CourseCredit>();
        assert!(credit.credited);
        assert_eq!(credit.employee.balance, 1000.0);

        let again = server
            .post("/api/v1/employees/emp001/course-completions")
            .json(&json!({ "course_id": course.id }))
            .await
            .json::<CourseCredit>();
        assert!(!again.credited);

        let withdrawal = server
            .post("/api/v1/employees/emp001/withdraw")
            .await
            .json::<Withdrawal>();
        assert_eq!(withdrawal.withdrawn, 1000.0);

        let employee = server.get("/api/v1/employees/emp001").await.json::<Employee>();
        assert_eq!(employee.balance, 0.0);
    }

    #[tokio::test]
    async fn profile_resolves_titles() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        let project = create_test_project(&server, 0.0).await;
        assign(&server, &project, &["emp001"]).await.assert_status_ok();

        let profile = server
            .get("/api/v1/employees/emp001/profile")
            .await
            .json::<serde_json::Value>();

        assert_eq!(profile["active_projects"][0]["title"], "Billing revamp");
        assert_eq!(profile["balance"], 0.0);
    }
}

mod consistency {
    use super::*;

    #[tokio::test]
    async fn reports_a_consistent_store() {
        let server = setup();
        create_test_employee(&server, "emp001").await;
        let project = create_test_project(&server, 0.0).await;
        assign(&server, &project, &["emp001"]).await.assert_status_ok();

        let report = server
            .get("/api/v1/consistency")
            .await
            .json::<ConsistencyReport>();

        assert!(report.is_consistent());
        assert_eq!(report.employees_checked, 1);
        assert_eq!(report.projects_checked, 1);
    }

    #[test]
    fn partial_sync_body_is_json() {
        let body = json!({
            "operation": "reconcile_assignment",
            "project_id": null,
            "applied": [{ "record_id": "emp001", "action": "add_active_project" }],
            "failed": [{ "record_id": "emp002", "action": "add_active_project", "reason": "timed out" }]
        });

        let failure: PartialSyncFailure = serde_json::from_value(body).unwrap();
        assert_eq!(failure.failed[0].reason, "timed out");
    }
}

#[tokio::test]
async fn health_check() {
    let server = setup();
    let response = server.get("/api/v1/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "ok" }));
}
