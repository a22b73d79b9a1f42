use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An internal project employees are assigned to.
///
/// `assigned_employees` is the project's half of the assignment relationship;
/// the other half lives in each employee's `active_projects` (or
/// `completed_projects` once the project is completed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    /// External project code (e.g. `PRJ-104`).
    pub code: String,
    pub description: Option<String>,
    pub tasks: Vec<String>,
    pub deadline: Option<String>,
    pub status: ProjectStatus,
    pub assigned_employees: BTreeSet<String>,
    pub tags: Vec<String>,
    /// Amount credited to every assigned employee on completion.
    pub reward: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The lifecycle status of a project.
///
/// - `Upcoming`: Created, nobody working on it yet
/// - `Current`: Has (or has had) assigned employees
/// - `Completing`: Completion started, rewards are being settled
/// - `Completed`: Terminal; membership is frozen
///
/// Membership changes are rejected once a project reaches `Completing`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Upcoming,
    Current,
    Completing,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Current => "current",
            Self::Completing => "completing",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upcoming" => Some(Self::Upcoming),
            "current" => Some(Self::Current),
            "completing" => Some(Self::Completing),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Whether assignment edits are still allowed.
    pub fn accepts_membership_changes(&self) -> bool {
        matches!(self, Self::Upcoming | Self::Current)
    }
}

/// Input for creating a new project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectInput {
    pub title: String,
    pub code: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    pub deadline: Option<String>,
    /// Initial status. Defaults to `Upcoming`, promoted to `Current` if
    /// employees are assigned.
    pub status: Option<ProjectStatus>,
    /// Employee ids to assign. Unknown ids are ignored.
    #[serde(default)]
    pub assigned_employee_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reward: f64,
}

/// Input for updating project details. All fields are optional for partial updates.
///
/// `None` (or `null` in JSON) keeps the stored value, so `description` and
/// `deadline` can be replaced but not cleared; send an empty string instead.
///
/// Membership and status are deliberately absent: they change only through
/// reconciliation and the lifecycle operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProjectInput {
    pub title: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub tasks: Option<Vec<String>>,
    pub deadline: Option<String>,
    pub tags: Option<Vec<String>>,
    pub reward: Option<f64>,
}

/// Outcome of a successful project completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    pub project: Project,
    /// Employees credited by this call.
    pub credited: Vec<String>,
    /// Employees that had already been settled by an earlier, interrupted call.
    pub already_settled: Vec<String>,
    /// Assigned ids with no employee record. Nothing was paid to them.
    pub missing: Vec<String>,
}

/// Both records touched by an employee-side membership edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipUpdate {
    pub employee: super::Employee,
    pub project: Project,
}
