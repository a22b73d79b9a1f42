//! Project lifecycle: `upcoming → current → completing → completed`.
//!
//! Completion is two-phase. The project is first marked `Completing`, which
//! freezes membership, then every assigned employee is settled (project
//! moved to their completed set and the reward credited), and only then is
//! the project marked `Completed`. Settlement is guarded per employee by the
//! completed set, so an interrupted completion can simply be called again.

use uuid::Uuid;

use super::error::{EngineError, SyncAction, SyncLog, SyncOperation};
use super::{Engine, Result};
use crate::models::*;
use crate::store::EntityStore;

/// Derive status from membership. Returns true if the status changed.
///
/// This is the only place membership drives status: an `Upcoming` project
/// with members becomes `Current`. Nothing moves a project back.
pub fn apply_lifecycle_side_effects(project: &mut Project) -> bool {
    if project.status == ProjectStatus::Upcoming && !project.assigned_employees.is_empty() {
        tracing::info!("Project {} started: upcoming -> current", project.id);
        project.status = ProjectStatus::Current;
        return true;
    }
    false
}

pub(crate) fn ensure_membership_open(project: &Project) -> Result<()> {
    match project.status {
        ProjectStatus::Upcoming | ProjectStatus::Current => Ok(()),
        ProjectStatus::Completing => Err(EngineError::Conflict(format!(
            "project {} is being completed",
            project.id
        ))),
        ProjectStatus::Completed => Err(EngineError::Conflict(format!(
            "project {} is already completed",
            project.id
        ))),
    }
}

impl<S: EntityStore> Engine<S> {
    /// Complete a project and pay every assigned employee its reward.
    ///
    /// Fails with `Conflict` if the project is already completed. If some
    /// employees can't be settled the project stays `Completing` and a
    /// `PartialSync` error lists them; calling again settles only those.
    pub fn complete_project(&self, project_id: Uuid) -> Result<CompletionReport> {
        let project = self.load_project(project_id)?;

        match project.status {
            ProjectStatus::Completed => {
                return Err(EngineError::Conflict(format!(
                    "project {} is already completed",
                    project_id
                )));
            }
            ProjectStatus::Completing => {
                tracing::info!("Resuming completion of project {}", project_id);
            }
            ProjectStatus::Upcoming | ProjectStatus::Current => {
                self.store
                    .set_project_status(project_id, ProjectStatus::Completing)?
                    .ok_or_else(|| EngineError::project_not_found(project_id))?;
            }
        }

        let mut credited = Vec::new();
        let mut already_settled = Vec::new();
        let mut missing = Vec::new();
        let mut log = SyncLog::default();

        for employee_id in &project.assigned_employees {
            match self
                .store
                .settle_project(employee_id, project_id, project.reward)
            {
                Ok(Some(true)) => {
                    log.applied(employee_id.as_str(), SyncAction::SettleProject);
                    credited.push(employee_id.clone());
                }
                Ok(Some(false)) => already_settled.push(employee_id.clone()),
                Ok(None) => {
                    tracing::warn!(
                        "Employee {} assigned to project {} no longer exists, skipping payout",
                        employee_id,
                        project_id
                    );
                    missing.push(employee_id.clone());
                }
                Err(e) => log.failed(
                    employee_id.as_str(),
                    SyncAction::SettleProject,
                    format!("{:#}", e),
                ),
            }
        }
        if log.has_failed() {
            return Err(log
                .into_failure(SyncOperation::CompleteProject, Some(project_id))
                .into());
        }

        // Credits have landed; a failed status write leaves the project in
        // `Completing` and a retry finds every employee already settled.
        let marked = self
            .store
            .set_project_status(project_id, ProjectStatus::Completed);
        let Some(completed) =
            log.record_written(&project_id.to_string(), SyncAction::MarkCompleted, marked)
        else {
            return Err(log
                .into_failure(SyncOperation::CompleteProject, Some(project_id))
                .into());
        };

        tracing::info!(
            "Completed project {}: credited {} employee(s) {} each",
            project_id,
            credited.len(),
            project.reward
        );

        Ok(CompletionReport {
            project: completed,
            credited,
            already_settled,
            missing,
        })
    }

    /// Administrative status edit between `Upcoming` and `Current`.
    ///
    /// Completion has its own operation and can't be reached from here.
    /// A project with members can't be moved back to `Upcoming`, since the
    /// next sync would promote it again.
    pub fn override_status(&self, project_id: Uuid, status: ProjectStatus) -> Result<Project> {
        if !status.accepts_membership_changes() {
            return Err(EngineError::Validation(format!(
                "status {} can only be reached by completing the project",
                status.as_str()
            )));
        }

        let project = self.load_project(project_id)?;
        ensure_membership_open(&project)?;
        if project.status == status {
            return Ok(project);
        }
        if status == ProjectStatus::Upcoming && !project.assigned_employees.is_empty() {
            return Err(EngineError::Conflict(format!(
                "project {} has assigned employees and can't return to upcoming",
                project_id
            )));
        }

        let updated = self
            .store
            .set_project_status(project_id, status)?
            .ok_or_else(|| EngineError::project_not_found(project_id))?;
        tracing::info!(
            "Project {} status overridden: {} -> {}",
            project_id,
            project.status.as_str(),
            status.as_str()
        );
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;

    use super::*;

    fn project(status: ProjectStatus, members: &[&str]) -> Project {
        Project {
            id: Uuid::new_v4(),
            title: "Billing revamp".to_string(),
            code: "PRJ-1".to_string(),
            description: None,
            tasks: vec![],
            deadline: None,
            status,
            assigned_employees: members.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            tags: vec![],
            reward: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upcoming_with_members_becomes_current() {
        let mut p = project(ProjectStatus::Upcoming, &["e1"]);
        assert!(apply_lifecycle_side_effects(&mut p));
        assert_eq!(p.status, ProjectStatus::Current);
    }

    #[test]
    fn upcoming_without_members_stays_upcoming() {
        let mut p = project(ProjectStatus::Upcoming, &[]);
        assert!(!apply_lifecycle_side_effects(&mut p));
        assert_eq!(p.status, ProjectStatus::Upcoming);
    }

    #[test]
    fn current_without_members_is_not_reverted() {
        let mut p = project(ProjectStatus::Current, &[]);
        assert!(!apply_lifecycle_side_effects(&mut p));
        assert_eq!(p.status, ProjectStatus::Current);
    }

    #[test]
    fn membership_is_frozen_from_completing_on() {
        assert!(ensure_membership_open(&project(ProjectStatus::Current, &[])).is_ok());
        assert!(matches!(
            ensure_membership_open(&project(ProjectStatus::Completing, &[])),
            Err(EngineError::Conflict(_))
        ));
        assert!(matches!(
            ensure_membership_open(&project(ProjectStatus::Completed, &[])),
            Err(EngineError::Conflict(_))
        ));
    }
}
