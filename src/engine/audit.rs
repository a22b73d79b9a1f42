//! Whole-store consistency check.
//!
//! Reads every employee and project and reports each place where the two
//! halves of an assignment disagree. Nothing is repaired here: the usual fix
//! is to re-issue [`Engine::reconcile_assignment`] for the reported project.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Engine, Result};
use crate::models::*;
use crate::store::EntityStore;

/// Which of an employee's project sets a reference lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSet {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The project lists the employee but the employee lacks the project in
    /// the set its status calls for.
    MissingEmployeeReference {
        project_id: Uuid,
        employee_id: String,
        expected: ReferenceSet,
    },
    /// The employee references the project but the project doesn't list them.
    MissingProjectMember {
        project_id: Uuid,
        employee_id: String,
        found_in: ReferenceSet,
    },
    UnknownEmployee {
        project_id: Uuid,
        employee_id: String,
    },
    UnknownProject {
        employee_id: String,
        project_id: Uuid,
        found_in: ReferenceSet,
    },
    ProjectInBothSets {
        employee_id: String,
        project_id: Uuid,
    },
    CourseInBothSets {
        employee_id: String,
        course_id: Uuid,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub employees_checked: usize,
    pub projects_checked: usize,
    pub violations: Vec<Violation>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<S: EntityStore> Engine<S> {
    /// Check both sides of every assignment.
    ///
    /// A `completing` project accepts its reference in either set, since
    /// settlement moves employees over one at a time. A `completed` project
    /// may list employees that have since been deleted.
    pub fn check_consistency(&self) -> Result<ConsistencyReport> {
        let employees = self.store.get_all_employees()?;
        let projects = self.store.get_projects(&[])?;

        let employees_by_id: HashMap<&str, &Employee> =
            employees.iter().map(|e| (e.id.as_str(), e)).collect();
        let projects_by_id: HashMap<Uuid, &Project> =
            projects.iter().map(|p| (p.id, p)).collect();

        let mut violations = Vec::new();

        for project in &projects {
            for employee_id in &project.assigned_employees {
                let Some(employee) = employees_by_id.get(employee_id.as_str()) else {
                    // Completed projects keep deleted employees as history.
                    if project.status == ProjectStatus::Completed {
                        continue;
                    }
                    violations.push(Violation::UnknownEmployee {
                        project_id: project.id,
                        employee_id: employee_id.clone(),
                    });
                    continue;
                };

                let active = employee.active_projects.contains(&project.id);
                let completed = employee.completed_projects.contains(&project.id);
                let (ok, expected) = match project.status {
                    ProjectStatus::Upcoming | ProjectStatus::Current => {
                        (active, ReferenceSet::Active)
                    }
                    ProjectStatus::Completing => (active || completed, ReferenceSet::Completed),
                    ProjectStatus::Completed => (completed, ReferenceSet::Completed),
                };
                if !ok {
                    violations.push(Violation::MissingEmployeeReference {
                        project_id: project.id,
                        employee_id: employee_id.clone(),
                        expected,
                    });
                }
            }
        }

        for employee in &employees {
            let references = employee
                .active_projects
                .iter()
                .map(|id| (*id, ReferenceSet::Active))
                .chain(
                    employee
                        .completed_projects
                        .iter()
                        .map(|id| (*id, ReferenceSet::Completed)),
                );
            for (project_id, found_in) in references {
                match projects_by_id.get(&project_id) {
                    None => violations.push(Violation::UnknownProject {
                        employee_id: employee.id.clone(),
                        project_id,
                        found_in,
                    }),
                    Some(project) if !project.assigned_employees.contains(&employee.id) => {
                        violations.push(Violation::MissingProjectMember {
                            project_id,
                            employee_id: employee.id.clone(),
                            found_in,
                        })
                    }
                    Some(_) => {}
                }
            }

            for project_id in employee
                .active_projects
                .intersection(&employee.completed_projects)
            {
                violations.push(Violation::ProjectInBothSets {
                    employee_id: employee.id.clone(),
                    project_id: *project_id,
                });
            }
            for course_id in employee
                .enrolled_courses
                .intersection(&employee.completed_courses)
            {
                violations.push(Violation::CourseInBothSets {
                    employee_id: employee.id.clone(),
                    course_id: *course_id,
                });
            }
        }

        if !violations.is_empty() {
            tracing::warn!("Consistency check found {} violation(s)", violations.len());
        }

        Ok(ConsistencyReport {
            employees_checked: employees.len(),
            projects_checked: projects.len(),
            violations,
        })
    }
}
