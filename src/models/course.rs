use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A training course. Lookup data: the engine reads courses but never
/// writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    /// Badge labels awarded on completion.
    pub badges: Vec<String>,
    /// Reward as loaded. May be absent or unusable; see [`Course::reward_amount`].
    pub reward: Option<f64>,
}

impl Course {
    /// The reward to credit, coerced to a usable amount.
    ///
    /// Absent, non-finite or negative rewards count as 0.
    pub fn reward_amount(&self) -> f64 {
        match self.reward {
            Some(r) if r.is_finite() && r > 0.0 => r,
            _ => 0.0,
        }
    }
}

/// Input for loading a course into the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub badges: Vec<String>,
    pub reward: Option<f64>,
}

/// Result of a course completion credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseCredit {
    pub employee: super::Employee,
    /// False when the course was already completed and nothing changed.
    pub credited: bool,
    pub amount: f64,
}

/// Result of a balance withdrawal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub employee_id: String,
    /// Balance held before the withdrawal. Zero on a repeated call.
    pub withdrawn: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(reward: Option<f64>) -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "Rust".to_string(),
            difficulty: "Beginner".to_string(),
            tags: vec![],
            badges: vec![],
            reward,
        }
    }

    #[test]
    fn reward_amount_passes_through_valid_values() {
        assert_eq!(course(Some(1000.0)).reward_amount(), 1000.0);
    }

    #[test]
    fn reward_amount_defaults_to_zero() {
        assert_eq!(course(None).reward_amount(), 0.0);
        assert_eq!(course(Some(f64::NAN)).reward_amount(), 0.0);
        assert_eq!(course(Some(f64::INFINITY)).reward_amount(), 0.0);
        assert_eq!(course(Some(-5.0)).reward_amount(), 0.0);
    }
}
