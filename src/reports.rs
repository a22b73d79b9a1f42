//! Read-side views that resolve stored ids to titles.

use std::collections::BTreeSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::*;
use crate::store::EntityStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleRef {
    pub id: Uuid,
    pub title: String,
}

/// An employee with course and project references resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeProfile {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub badges: Vec<String>,
    pub balance: f64,
    pub enrolled_courses: Vec<TitleRef>,
    pub completed_courses: Vec<TitleRef>,
    pub active_projects: Vec<TitleRef>,
    pub completed_projects: Vec<TitleRef>,
}

/// Build the profile for `employee_id`. References to records that no longer
/// exist are left out.
pub fn employee_profile<S: EntityStore>(
    store: &S,
    employee_id: &str,
) -> Result<Option<EmployeeProfile>> {
    let Some(employee) = store.get_employee(employee_id)? else {
        return Ok(None);
    };

    let course_titles = |ids: &BTreeSet<Uuid>| -> Result<Vec<TitleRef>> {
        let mut refs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(course) = store.get_course(*id)? {
                refs.push(TitleRef {
                    id: course.id,
                    title: course.title,
                });
            }
        }
        Ok(refs)
    };
    let project_titles = |ids: &BTreeSet<Uuid>| -> Result<Vec<TitleRef>> {
        let mut refs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(project) = store.get_project(*id)? {
                refs.push(TitleRef {
                    id: project.id,
                    title: project.title,
                });
            }
        }
        Ok(refs)
    };

    Ok(Some(EmployeeProfile {
        enrolled_courses: course_titles(&employee.enrolled_courses)?,
        completed_courses: course_titles(&employee.completed_courses)?,
        active_projects: project_titles(&employee.active_projects)?,
        completed_projects: project_titles(&employee.completed_projects)?,
        id: employee.id,
        name: employee.name,
        role: employee.role,
        badges: employee.badges,
        balance: employee.balance,
    }))
}

/// Current and upcoming projects the employee is assigned to.
pub fn open_projects_for<S: EntityStore>(store: &S, employee_id: &str) -> Result<Vec<Project>> {
    Ok(store
        .projects_assigned_to(employee_id)?
        .into_iter()
        .filter(|p| p.status.accepts_membership_changes())
        .collect())
}
