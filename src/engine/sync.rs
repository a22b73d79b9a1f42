//! Reference sync between projects and employees.
//!
//! A project's `assigned_employees` and each employee's `active_projects`
//! describe the same relationship from both ends. Callers state the desired
//! membership for one side; this module diffs it against what is stored and
//! writes only the other side's delta.
//!
//! Writes go to the other side first and to the owning record last. If any
//! other-side write fails, the owning record is left untouched, so issuing
//! the same request again recomputes the same delta and finishes the job.

use std::collections::BTreeSet;

use uuid::Uuid;

use super::error::{EngineError, SyncAction, SyncLog, SyncOperation};
use super::lifecycle::{apply_lifecycle_side_effects, ensure_membership_open};
use super::{normalize_id, validate_reward, Engine, Result};
use crate::models::*;
use crate::store::EntityStore;

/// Membership delta between stored and desired assignment sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentDiff {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl AssignmentDiff {
    pub fn compute(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            added: desired.difference(current).cloned().collect(),
            removed: current.difference(desired).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl<S: EntityStore> Engine<S> {
    /// Make `desired_employee_ids` the complete assignment set of a project.
    ///
    /// Ids that don't resolve to an employee are dropped. Removed employees
    /// lose the project from their active and completed sets, added employees
    /// gain it in their active set. The project is written last, with its
    /// status promoted to `Current` if it was `Upcoming` and now has members.
    ///
    /// Calling this twice with the same set is a no-op the second time.
    pub fn reconcile_assignment(
        &self,
        project_id: Uuid,
        desired_employee_ids: &[String],
    ) -> Result<Project> {
        let requested = normalize_ids(desired_employee_ids)?;
        let project = self.load_project(project_id)?;
        ensure_membership_open(&project)?;

        let desired: BTreeSet<String> = self
            .store
            .find_employees(&requested)?
            .into_iter()
            .map(|e| e.id)
            .collect();
        if desired.len() < requested.len() {
            let dropped: Vec<&String> = requested
                .iter()
                .filter(|id| !desired.contains(*id))
                .collect();
            tracing::debug!(
                "Dropping unknown employee ids for project {}: {:?}",
                project_id,
                dropped
            );
        }

        let diff = AssignmentDiff::compute(&project.assigned_employees, &desired);

        let mut updated = project.clone();
        updated.assigned_employees = desired;
        apply_lifecycle_side_effects(&mut updated);

        if diff.is_empty() && updated.status == project.status {
            tracing::debug!("Assignment for project {} already up to date", project_id);
            return Ok(project);
        }

        let mut log = SyncLog::default();
        for employee_id in &diff.removed {
            // A removed employee that no longer exists holds no reference to clean up.
            let result = self.store.pull_project(employee_id, project_id).map(|_| true);
            log.record(employee_id, SyncAction::PullProject, result);
        }
        for employee_id in &diff.added {
            let result = self
                .store
                .add_active_project(employee_id, project_id)
                .map(|e| e.is_some());
            log.record(employee_id, SyncAction::AddActiveProject, result);
        }

        let project =
            self.commit_project_side(log, SyncOperation::ReconcileAssignment, project_id, || {
                self.store
                    .write_assignment(project_id, &updated.assigned_employees, updated.status)
            })?;

        tracing::info!(
            "Reconciled project {}: +{} -{} ({} assigned, {})",
            project_id,
            diff.added.len(),
            diff.removed.len(),
            updated.assigned_employees.len(),
            updated.status.as_str()
        );
        Ok(project)
    }

    /// Add or remove one employee from a project, starting from the employee.
    ///
    /// The employee record is written first, then the project. Adding runs the
    /// same lifecycle side effects as [`Engine::reconcile_assignment`], inside
    /// the project write. If the project write fails after the employee
    /// write landed, the result is `PartialSync` and re-issuing converges.
    pub fn reconcile_from_employee_side(
        &self,
        employee_id: &str,
        project_id: Uuid,
        change: MembershipChange,
    ) -> Result<MembershipUpdate> {
        let employee_id = normalize_id(employee_id)?;
        let project = self.load_project(project_id)?;
        self.load_employee(&employee_id)?;
        ensure_membership_open(&project)?;

        let (employee_action, project_action) = match change {
            MembershipChange::Add => (SyncAction::AddActiveProject, SyncAction::AddAssignee),
            MembershipChange::Remove => (SyncAction::PullProject, SyncAction::PullAssignee),
        };

        let written = match change {
            MembershipChange::Add => self.store.add_active_project(&employee_id, project_id)?,
            MembershipChange::Remove => self.store.pull_project(&employee_id, project_id)?,
        };
        let Some(employee) = written else {
            return Err(EngineError::employee_not_found(employee_id));
        };

        let mut log = SyncLog::default();
        log.applied(employee_id.as_str(), employee_action);

        let result = match change {
            MembershipChange::Add => {
                self.store
                    .add_assignee(project_id, &employee_id, apply_lifecycle_side_effects)
            }
            MembershipChange::Remove => self.store.pull_assignee(project_id, &employee_id),
        };
        let Some(project) = log.record_written(&project_id.to_string(), project_action, result)
        else {
            return Err(log
                .into_failure(SyncOperation::EmployeeSideEdit, Some(project_id))
                .into());
        };

        tracing::info!(
            "Employee {} {} project {}",
            employee_id,
            match change {
                MembershipChange::Add => "joined",
                MembershipChange::Remove => "left",
            },
            project_id
        );

        Ok(MembershipUpdate { employee, project })
    }

    /// Create a project and assign its initial members.
    ///
    /// The project is inserted with no members and then reconciled, so
    /// creation goes through the same sync path as any later edit.
    pub fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        if input.title.trim().is_empty() {
            return Err(EngineError::Validation(
                "project title must not be blank".to_string(),
            ));
        }
        if input.code.trim().is_empty() {
            return Err(EngineError::Validation(
                "project code must not be blank".to_string(),
            ));
        }
        validate_reward(input.reward)?;

        let status = input.status.unwrap_or_default();
        if !status.accepts_membership_changes() {
            return Err(EngineError::Validation(format!(
                "a project cannot be created as {}",
                status.as_str()
            )));
        }
        let members = normalize_ids(&input.assigned_employee_ids)?;

        let project = self.store.create_project(&input, status)?;
        tracing::info!("Created project {} ({})", project.id, project.code);

        if members.is_empty() {
            return Ok(project);
        }
        self.reconcile_assignment(project.id, &members)
    }

    /// Update descriptive fields. Never touches membership or status.
    pub fn update_project_details(
        &self,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> Result<Project> {
        if let Some(reward) = input.reward {
            validate_reward(reward)?;
            let project = self.load_project(project_id)?;
            if !project.status.accepts_membership_changes() {
                return Err(EngineError::Conflict(format!(
                    "reward of project {} is fixed once completion has started",
                    project_id
                )));
            }
        }
        if input.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(EngineError::Validation(
                "project title must not be blank".to_string(),
            ));
        }

        self.store
            .update_project_details(project_id, input)?
            .ok_or_else(|| EngineError::project_not_found(project_id))
    }

    /// Delete a project after removing it from every employee that references it.
    ///
    /// If any employee can't be cleaned up the project is kept, so retrying
    /// the delete picks up where it stopped.
    pub fn delete_project(&self, project_id: Uuid) -> Result<()> {
        let project = self.load_project(project_id)?;

        let mut holders: BTreeSet<String> = project.assigned_employees.clone();
        holders.extend(
            self.store
                .employees_referencing_project(project_id)?
                .into_iter()
                .map(|e| e.id),
        );

        let mut log = SyncLog::default();
        for employee_id in &holders {
            let result = self.store.pull_project(employee_id, project_id).map(|_| true);
            log.record(employee_id, SyncAction::PullProject, result);
        }
        log.finish(SyncOperation::DeleteProject, Some(project_id))?;

        self.store.delete_project(project_id)?;
        tracing::info!(
            "Deleted project {} and cleared {} employee reference(s)",
            project_id,
            holders.len()
        );
        Ok(())
    }

    /// Delete an employee after removing them from every open project.
    ///
    /// Completed projects keep the employee in their assigned set as a
    /// historical record.
    pub fn delete_employee(&self, employee_id: &str) -> Result<()> {
        let employee_id = normalize_id(employee_id)?;
        self.load_employee(&employee_id)?;

        let mut log = SyncLog::default();
        for project in self.store.projects_assigned_to(&employee_id)? {
            if !project.status.accepts_membership_changes() {
                continue;
            }
            let result = self
                .store
                .pull_assignee(project.id, &employee_id)
                .map(|_| true);
            log.record(&project.id.to_string(), SyncAction::PullAssignee, result);
        }
        log.finish(SyncOperation::DeleteEmployee, None)?;

        if !self.store.delete_employee(&employee_id)? {
            return Err(EngineError::employee_not_found(employee_id));
        }
        tracing::info!("Deleted employee {}", employee_id);
        Ok(())
    }

    /// Run the final project-side write of a sync and return the project as
    /// written.
    ///
    /// Fails with `PartialSync` if any earlier write failed (without writing
    /// the project), or if the project write itself fails after other-side
    /// writes already landed.
    fn commit_project_side(
        &self,
        mut log: SyncLog,
        operation: SyncOperation,
        project_id: Uuid,
        write: impl FnOnce() -> anyhow::Result<Option<Project>>,
    ) -> Result<Project> {
        if log.has_failed() {
            return Err(log.into_failure(operation, Some(project_id)).into());
        }

        let result = write();
        if !log.has_applied() {
            return result?.ok_or_else(|| EngineError::project_not_found(project_id));
        }
        log.record_written(&project_id.to_string(), SyncAction::WriteAssignment, result)
            .ok_or_else(|| log.into_failure(operation, Some(project_id)).into())
    }
}

/// Trim, validate and deduplicate a list of employee ids, keeping first-seen order.
fn normalize_ids(ids: &[String]) -> Result<Vec<String>> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let id = normalize_id(id)?;
        if seen.insert(id.clone()) {
            out.push(id);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn diff_splits_added_and_removed() {
        let diff = AssignmentDiff::compute(&set(&["e1", "e2"]), &set(&["e2", "e3"]));
        assert_eq!(diff.added, set(&["e3"]));
        assert_eq!(diff.removed, set(&["e1"]));
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let diff = AssignmentDiff::compute(&set(&["e1"]), &set(&["e1"]));
        assert!(diff.is_empty());
    }

    #[test]
    fn diff_to_empty_removes_everyone() {
        let diff = AssignmentDiff::compute(&set(&["e1", "e2"]), &set(&[]));
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, set(&["e1", "e2"]));
    }

    #[test]
    fn normalize_ids_trims_and_dedups() {
        let ids = vec![" e2 ".to_string(), "e1".to_string(), "e2".to_string()];
        assert_eq!(normalize_ids(&ids).unwrap(), vec!["e2", "e1"]);
    }

    #[test]
    fn normalize_ids_rejects_blank() {
        let ids = vec!["e1".to_string(), "  ".to_string()];
        assert!(matches!(
            normalize_ids(&ids),
            Err(EngineError::Validation(_))
        ));
    }
}
