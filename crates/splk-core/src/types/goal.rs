//! UserGoal - a high-priority, time-decaying constraint ("Law").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGoal {
    pub id: String,
    pub content: String,
    pub scope_path: Vec<String>,
    pub priority: i64,
    pub confidence: f32,
    pub expiry: Option<DateTime<Utc>>,
    pub half_life_days: f64,
    pub last_reinforced: DateTime<Utc>,
}

impl UserGoal {
    pub fn new(content: impl Into<String>, scope_path: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            scope_path,
            priority: 10,
            confidence: 0.5,
            expiry: None,
            half_life_days: 7.0,
            last_reinforced: Utc::now(),
        }
    }

    /// `decay_priority() = max(1, floor(priority * 0.5^(days_since_reinforced / half_life_days)))`.
    pub fn decay_priority(&self) -> i64 {
        self.decay_priority_at(Utc::now())
    }

    pub fn decay_priority_at(&self, now: DateTime<Utc>) -> i64 {
        let days = (now - self.last_reinforced).num_seconds() as f64 / 86_400.0;
        let days = days.max(0.0);
        let decayed = self.priority as f64 * 0.5_f64.powf(days / self.half_life_days);
        decayed.floor().max(1.0) as i64
    }

    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.expiry.is_none_or(|e| at < e)
    }

    pub fn reinforce(&mut self) {
        self.last_reinforced = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn decay_matches_formula() {
        let mut goal = UserGoal::new("ship the release", vec!["Backend".to_string()]);
        goal.priority = 10;
        goal.half_life_days = 7.0;
        let now = Utc::now();
        goal.last_reinforced = now - Duration::days(7);
        assert_eq!(goal.decay_priority_at(now), 5);
    }

    #[test]
    fn decay_floors_at_one() {
        let mut goal = UserGoal::new("x", vec![]);
        goal.priority = 1;
        goal.half_life_days = 1.0;
        let now = Utc::now();
        goal.last_reinforced = now - Duration::days(30);
        assert_eq!(goal.decay_priority_at(now), 1);
    }
}
