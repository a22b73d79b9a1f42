//! Entity store abstraction.
//!
//! The engine never assumes the store can write two records atomically.
//! Every method here touches exactly one record, and implementations must
//! make each call atomic for that record: a set operation either lands
//! completely or not at all, and two concurrent set operations on the same
//! record both take effect.
//!
//! "Record missing" is not an error at this layer. Lookups return `None`
//! and updates return `None` (deletes return `false`); the engine turns that into
//! [`crate::engine::EngineError::NotFound`] where it matters.

use std::collections::BTreeSet;

use anyhow::Result;
use uuid::Uuid;

use crate::models::*;

pub trait EntityStore: Send + Sync {
    // Employees

    fn get_employee(&self, id: &str) -> Result<Option<Employee>>;

    /// Employees whose id is in `ids`. Unknown ids are simply absent.
    fn find_employees(&self, ids: &[String]) -> Result<Vec<Employee>>;

    fn get_all_employees(&self) -> Result<Vec<Employee>>;

    /// Employees whose active or completed set contains `project_id`.
    fn employees_referencing_project(&self, project_id: Uuid) -> Result<Vec<Employee>>;

    fn create_employee(&self, input: CreateEmployeeInput) -> Result<Employee>;

    fn delete_employee(&self, id: &str) -> Result<bool>;

    /// Add `project_id` to the active set, dropping any stale completed entry.
    /// Returns the employee as written.
    fn add_active_project(&self, employee_id: &str, project_id: Uuid)
        -> Result<Option<Employee>>;

    /// Remove `project_id` from both the active and completed sets.
    fn pull_project(&self, employee_id: &str, project_id: Uuid) -> Result<Option<Employee>>;

    /// Move `project_id` from active to completed and credit `reward`.
    ///
    /// Returns `Some(false)` without changes if the project is already in the
    /// completed set, `None` if the employee does not exist.
    fn settle_project(&self, employee_id: &str, project_id: Uuid, reward: f64)
        -> Result<Option<bool>>;

    /// Add `course_id` to the enrolled set unless enrolled or completed.
    fn enroll_course(&self, employee_id: &str, course_id: Uuid) -> Result<Option<bool>>;

    /// Move a course to the completed set, append its badges and credit its reward.
    ///
    /// Returns `Some(false)` without changes if the course is already completed.
    fn settle_course(&self, employee_id: &str, settlement: &CourseSettlement)
        -> Result<Option<bool>>;

    /// Set the balance to zero, returning the balance it replaced.
    fn reset_balance(&self, employee_id: &str) -> Result<Option<f64>>;

    // Projects

    fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    /// Projects in any of `statuses`, or all projects when empty.
    fn get_projects(&self, statuses: &[ProjectStatus]) -> Result<Vec<Project>>;

    /// Projects whose assigned set contains `employee_id`.
    fn projects_assigned_to(&self, employee_id: &str) -> Result<Vec<Project>>;

    /// Insert a project with an empty assigned set.
    fn create_project(&self, input: &CreateProjectInput, status: ProjectStatus)
        -> Result<Project>;

    fn update_project_details(&self, id: Uuid, input: UpdateProjectInput)
        -> Result<Option<Project>>;

    // Project writes return the project as written.

    fn set_project_status(&self, id: Uuid, status: ProjectStatus) -> Result<Option<Project>>;

    /// Replace the assigned set and status in one write.
    fn write_assignment(
        &self,
        id: Uuid,
        assigned: &BTreeSet<String>,
        status: ProjectStatus,
    ) -> Result<Option<Project>>;

    /// Add one assignee and run `lifecycle` on the result, in the same write.
    fn add_assignee(
        &self,
        id: Uuid,
        employee_id: &str,
        lifecycle: fn(&mut Project) -> bool,
    ) -> Result<Option<Project>>;

    fn pull_assignee(&self, id: Uuid, employee_id: &str) -> Result<Option<Project>>;

    fn delete_project(&self, id: Uuid) -> Result<bool>;

    // Courses

    fn get_course(&self, id: Uuid) -> Result<Option<Course>>;

    fn get_all_courses(&self) -> Result<Vec<Course>>;

    fn create_course(&self, input: CreateCourseInput) -> Result<Course>;
}
