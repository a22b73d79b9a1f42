//! Course enrollment, course completion credit and balance withdrawal.

use uuid::Uuid;

use super::{normalize_id, Engine, EngineError, Result};
use crate::models::*;
use crate::store::EntityStore;

impl<S: EntityStore> Engine<S> {
    /// Enroll an employee in a course.
    ///
    /// Enrolling twice, or in a course already completed, changes nothing.
    pub fn enroll_course(&self, employee_id: &str, course_id: Uuid) -> Result<Employee> {
        let employee_id = normalize_id(employee_id)?;
        self.load_course(course_id)?;

        match self.store.enroll_course(&employee_id, course_id)? {
            None => return Err(EngineError::employee_not_found(employee_id)),
            Some(true) => tracing::info!("Employee {} enrolled in course {}", employee_id, course_id),
            Some(false) => tracing::debug!(
                "Employee {} already enrolled in or finished course {}",
                employee_id,
                course_id
            ),
        }
        self.load_employee(&employee_id)
    }

    /// Mark a course completed for an employee, awarding its badges and reward.
    ///
    /// Credits at most once per (employee, course). A repeat call returns
    /// `credited: false` and leaves the record untouched.
    pub fn credit_course_completion(
        &self,
        employee_id: &str,
        course_id: Uuid,
    ) -> Result<CourseCredit> {
        let employee_id = normalize_id(employee_id)?;
        let employee = self.load_employee(&employee_id)?;
        let course = self.load_course(course_id)?;
        if employee.completed_courses.contains(&course_id) {
            tracing::debug!(
                "Course {} already credited to employee {}",
                course_id,
                employee_id
            );
            return Ok(CourseCredit {
                employee,
                credited: false,
                amount: 0.0,
            });
        }

        let settlement = CourseSettlement {
            course_id,
            badges: course.badges.clone(),
            reward: course.reward_amount(),
        };

        let credited = self
            .store
            .settle_course(&employee_id, &settlement)?
            .ok_or_else(|| EngineError::employee_not_found(employee_id.as_str()))?;
        let amount = if credited { settlement.reward } else { 0.0 };
        if credited {
            tracing::info!(
                "Employee {} completed course {} (+{}, {} badge(s))",
                employee_id,
                course_id,
                amount,
                settlement.badges.len()
            );
        }

        Ok(CourseCredit {
            employee: self.load_employee(&employee_id)?,
            credited,
            amount,
        })
    }

    /// Pay out an employee's balance by resetting it to zero.
    pub fn withdraw(&self, employee_id: &str) -> Result<Withdrawal> {
        let employee_id = normalize_id(employee_id)?;
        let withdrawn = self
            .store
            .reset_balance(&employee_id)?
            .ok_or_else(|| EngineError::employee_not_found(employee_id.as_str()))?;

        tracing::info!("Employee {} withdrew {}", employee_id, withdrawn);
        Ok(Withdrawal {
            employee_id,
            withdrawn,
        })
    }
}
