use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person tracked by the ledger.
///
/// The employee side of every relationship is a set of ids stored on the
/// record itself. Project membership is mirrored on [`super::Project`] and
/// kept in step by the engine; nothing else should write `active_projects`
/// or `completed_projects` directly.
///
/// # Invariants
/// - A project id is in at most one of `active_projects` / `completed_projects`.
/// - A course id is in at most one of `enrolled_courses` / `completed_courses`.
/// - `balance` is never negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    /// Externally assigned identifier (e.g. `emp001`).
    pub id: String,
    pub name: String,
    pub role: Role,
    pub tags: Vec<String>,
    pub enrolled_courses: BTreeSet<Uuid>,
    pub completed_courses: BTreeSet<Uuid>,
    /// Badge labels earned from courses. Not deduplicated across courses.
    pub badges: Vec<String>,
    /// Accrued, not yet withdrawn rewards.
    pub balance: f64,
    pub active_projects: BTreeSet<Uuid>,
    pub completed_projects: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of an employee. Carried for callers; the core does not enforce it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Employee,
    Admin,
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Employee => "employee",
            Self::Admin => "admin",
            Self::Manager => "manager",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "employee" => Some(Self::Employee),
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            _ => None,
        }
    }
}

/// Input for registering an employee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEmployeeInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Direction of a single-membership edit made from the employee side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipChange {
    Add,
    Remove,
}

/// Values applied to an employee record when a course is completed.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseSettlement {
    pub course_id: Uuid,
    pub badges: Vec<String>,
    pub reward: f64,
}
