use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of record an id failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employee,
    Project,
    Course,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Employee => "Employee",
            Self::Project => "Project",
            Self::Course => "Course",
        })
    }
}

/// Errors returned by engine operations.
///
/// Every variant is a distinct outcome the caller is expected to handle;
/// the engine never retries or swallows them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The operation is not valid for the project's lifecycle status.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Some single-record writes landed and others did not.
    #[error(transparent)]
    PartialSync(#[from] PartialSyncFailure),

    /// A store call failed. Multi-record operations only report this before
    /// their first write lands; after that they report `PartialSync`.
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn employee_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Employee,
            id: id.into(),
        }
    }

    pub(crate) fn project_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Project,
            id: id.to_string(),
        }
    }

    pub(crate) fn course_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Course,
            id: id.to_string(),
        }
    }
}

/// The multi-record operation that was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    ReconcileAssignment,
    EmployeeSideEdit,
    CompleteProject,
    DeleteProject,
    DeleteEmployee,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReconcileAssignment => "reconcile_assignment",
            Self::EmployeeSideEdit => "employee_side_edit",
            Self::CompleteProject => "complete_project",
            Self::DeleteProject => "delete_project",
            Self::DeleteEmployee => "delete_employee",
        })
    }
}

/// A single-record write issued as part of a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    AddActiveProject,
    PullProject,
    SettleProject,
    AddAssignee,
    PullAssignee,
    WriteAssignment,
    MarkCompleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideUpdate {
    /// Employee id, or project id for project-side writes.
    pub record_id: String,
    pub action: SyncAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedUpdate {
    pub record_id: String,
    pub action: SyncAction,
    pub reason: String,
}

/// One side of a dual-collection update succeeded and the other did not.
///
/// Carries every write that landed and every write that failed. Re-issuing
/// the same operation with the same input converges: the record that acts as
/// the commit point (the project for reconciliation and completion) is
/// only written after all the other writes succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{operation} partially applied: {failed_count} update(s) failed", failed_count = .failed.len())]
pub struct PartialSyncFailure {
    pub operation: SyncOperation,
    pub project_id: Option<Uuid>,
    pub applied: Vec<SideUpdate>,
    pub failed: Vec<FailedUpdate>,
}

/// Collects the outcome of each write while a sync runs.
#[derive(Debug, Default)]
pub(crate) struct SyncLog {
    applied: Vec<SideUpdate>,
    failed: Vec<FailedUpdate>,
}

impl SyncLog {
    pub(crate) fn applied(&mut self, record_id: impl Into<String>, action: SyncAction) {
        self.applied.push(SideUpdate {
            record_id: record_id.into(),
            action,
        });
    }

    pub(crate) fn failed(
        &mut self,
        record_id: impl Into<String>,
        action: SyncAction,
        reason: impl fmt::Display,
    ) {
        let record_id = record_id.into();
        let reason = reason.to_string();
        tracing::warn!("{:?} on {} failed: {}", action, record_id, reason);
        self.failed.push(FailedUpdate {
            record_id,
            action,
            reason,
        });
    }

    /// Record a store call where `Ok(false)` means the record has gone away.
    pub(crate) fn record(
        &mut self,
        record_id: &str,
        action: SyncAction,
        result: anyhow::Result<bool>,
    ) {
        self.record_written(record_id, action, result.map(|ok| ok.then_some(())));
    }

    /// Record a store call that returns the written record, passing it through.
    pub(crate) fn record_written<T>(
        &mut self,
        record_id: &str,
        action: SyncAction,
        result: anyhow::Result<Option<T>>,
    ) -> Option<T> {
        match result {
            Ok(Some(record)) => {
                self.applied(record_id, action);
                Some(record)
            }
            Ok(None) => {
                self.failed(record_id, action, "record no longer exists");
                None
            }
            Err(e) => {
                self.failed(record_id, action, format!("{:#}", e));
                None
            }
        }
    }

    pub(crate) fn has_applied(&self) -> bool {
        !self.applied.is_empty()
    }

    pub(crate) fn has_failed(&self) -> bool {
        !self.failed.is_empty()
    }

    pub(crate) fn into_failure(
        self,
        operation: SyncOperation,
        project_id: Option<Uuid>,
    ) -> PartialSyncFailure {
        PartialSyncFailure {
            operation,
            project_id,
            applied: self.applied,
            failed: self.failed,
        }
    }

    pub(crate) fn finish(
        self,
        operation: SyncOperation,
        project_id: Option<Uuid>,
    ) -> Result<Vec<SideUpdate>, PartialSyncFailure> {
        if !self.has_failed() {
            return Ok(self.applied);
        }
        Err(self.into_failure(operation, project_id))
    }
}
