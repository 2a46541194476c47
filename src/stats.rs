use chrono::{Duration, Local, NaiveDate};

use crate::models::Habit;

/// Days shown by the consistency view.
pub const HISTORY_DAYS: usize = 14;

/// Per-day completion flags for the trailing `days` days ending with
/// `today`, oldest first.
pub fn completion_history(habit: &Habit, days: usize, today: NaiveDate) -> Vec<bool> {
    (0..days)
        .map(|offset| {
            let day = today - Duration::days((days - 1 - offset) as i64);
            habit.is_completed_on(day)
        })
        .collect()
}

/// The trailing two weeks ending today.
pub fn recent_history(habit: &Habit) -> Vec<bool> {
    completion_history(habit, HISTORY_DAYS, Local::now().date_naive())
}
