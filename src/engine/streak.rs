use chrono::{Duration, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
}

impl StreakState {
    /// Registers activity on `today`. Returns the new state and whether anything
    /// changed; a second call on the same day is a no-op.
    pub fn touch(self, today: NaiveDate) -> (Self, bool) {
        match self.last_active_date {
            Some(last) if last == today => (self, false),
            Some(last) if last + Duration::days(1) == today => {
                let current_streak = self.current_streak.saturating_add(1);
                let next = Self {
                    current_streak,
                    longest_streak: self.longest_streak.max(current_streak),
                    last_active_date: Some(today),
                };
                (next, true)
            }
            _ => {
                let next = Self {
                    current_streak: 1,
                    longest_streak: self.longest_streak.max(1),
                    last_active_date: Some(today),
                };
                (next, true)
            }
        }
    }
}
