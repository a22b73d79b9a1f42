//! Assignment and lifecycle consistency engine.
//!
//! Employees and projects each store their half of every assignment. The
//! store can only write one record atomically, so the engine keeps the two
//! halves in agreement by diffing desired state against stored state and
//! applying the delta one record at a time:
//!
//! - [`sync`]: reference sync between `Project::assigned_employees` and
//!   `Employee::active_projects`
//! - [`lifecycle`]: project status transitions and completion
//! - [`rewards`]: course credits and balance withdrawal
//! - [`audit`]: whole-store consistency check
//!
//! Operations are synchronous and request-driven. No lock is held across
//! records, so two callers editing the same project at once can interleave;
//! re-issuing a reconciliation converges.

pub mod audit;
mod error;
pub mod lifecycle;
pub mod rewards;
pub mod sync;

pub use audit::{ConsistencyReport, ReferenceSet, Violation};
pub use error::*;
pub use lifecycle::apply_lifecycle_side_effects;

use uuid::Uuid;

use crate::db::Database;
use crate::models::*;
use crate::store::EntityStore;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

pub struct Engine<S = Database> {
    store: S,
}

impl<S: Clone> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: EntityStore> Engine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ============================================================
    // Lookups
    // ============================================================

    pub fn load_employee(&self, id: &str) -> Result<Employee> {
        self.store
            .get_employee(id)?
            .ok_or_else(|| EngineError::employee_not_found(id))
    }

    pub fn load_project(&self, id: Uuid) -> Result<Project> {
        self.store
            .get_project(id)?
            .ok_or_else(|| EngineError::project_not_found(id))
    }

    pub fn load_course(&self, id: Uuid) -> Result<Course> {
        self.store
            .get_course(id)?
            .ok_or_else(|| EngineError::course_not_found(id))
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        Ok(self.store.get_all_employees()?)
    }

    pub fn list_projects(&self, statuses: &[ProjectStatus]) -> Result<Vec<Project>> {
        Ok(self.store.get_projects(statuses)?)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>> {
        Ok(self.store.get_all_courses()?)
    }

    // ============================================================
    // Record creation
    // ============================================================

    pub fn create_employee(&self, input: CreateEmployeeInput) -> Result<Employee> {
        let id = normalize_id(&input.id)?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::Validation(
                "employee name must not be blank".to_string(),
            ));
        }
        if self.store.get_employee(&id)?.is_some() {
            return Err(EngineError::Conflict(format!(
                "employee {} already exists",
                id
            )));
        }

        let employee = self.store.create_employee(CreateEmployeeInput {
            id,
            name,
            role: input.role,
            tags: input.tags.iter().map(|t| t.trim().to_string()).collect(),
        })?;
        tracing::info!("Registered employee {}", employee.id);
        Ok(employee)
    }

    /// Load a course into the catalog. Courses are never modified afterwards.
    pub fn create_course(&self, input: CreateCourseInput) -> Result<Course> {
        if input.title.trim().is_empty() {
            return Err(EngineError::Validation(
                "course title must not be blank".to_string(),
            ));
        }
        Ok(self.store.create_course(input)?)
    }
}

/// Trim an employee id, rejecting blank ones.
pub(crate) fn normalize_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(EngineError::Validation(
            "employee id must not be blank".to_string(),
        ));
    }
    Ok(id.to_string())
}

/// Reject amounts that can't be credited.
pub(crate) fn validate_reward(reward: f64) -> Result<()> {
    if !reward.is_finite() || reward < 0.0 {
        return Err(EngineError::Validation(format!(
            "reward must be a non-negative number, got {}",
            reward
        )));
    }
    Ok(())
}
