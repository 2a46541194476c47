use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a habit is tracked: once per calendar day, or against an
/// occurrence target inside the current week.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly { occurrences: u32 },
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::Daily
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub completed_dates: Vec<DateTime<Utc>>,
    // Records written before weekly tracking existed have no frequency
    // field; they are daily habits.
    #[serde(default)]
    pub frequency: Frequency,
}

impl Habit {
    pub fn new(title: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            completed_dates: Vec::new(),
            frequency,
        }
    }

    pub fn daily(title: impl Into<String>) -> Self {
        Self::new(title, Frequency::Daily)
    }

    pub fn is_completed_today(&self) -> bool {
        self.is_completed_on(Local::now().date_naive())
    }

    /// Whether any completion falls on `day` in local time. Completions
    /// are stored in UTC and bucketed by local calendar day.
    pub fn is_completed_on(&self, day: NaiveDate) -> bool {
        self.completed_dates.iter().any(|ts| local_day(ts) == day)
    }

    pub fn completions_this_week(&self) -> usize {
        self.completions_in_week_of(Local::now())
    }

    fn completions_in_week_of(&self, reference: DateTime<Local>) -> usize {
        let week = reference.date_naive().iso_week();
        self.completed_dates
            .iter()
            .filter(|ts| local_day(ts).iso_week() == week)
            .count()
    }

    /// Flip today's completion state.
    ///
    /// A daily habit gains one completion stamped now, or loses every
    /// completion recorded today (a corrupted history can hold more than
    /// one, and clearing them all is the recovery path). A weekly habit
    /// keeps the historical toggle rule: any completion this week means
    /// remove, none means add, regardless of the target. Callers wanting
    /// precise weekly control use [`Habit::add_weekly_completion`] and
    /// [`Habit::remove_weekly_completion`].
    pub fn toggle_completion(&mut self) {
        self.toggle_completion_at(Local::now());
    }

    pub fn toggle_completion_at(&mut self, now: DateTime<Local>) {
        match self.frequency {
            Frequency::Daily => {
                let today = now.date_naive();
                if self.is_completed_on(today) {
                    self.completed_dates.retain(|ts| local_day(ts) != today);
                } else {
                    self.completed_dates.push(now.with_timezone(&Utc));
                }
            }
            Frequency::Weekly { .. } => {
                if self.completions_in_week_of(now) > 0 {
                    self.remove_weekly_completion_at(now);
                } else {
                    self.add_weekly_completion_at(now);
                }
            }
        }
    }

    /// Record one completion for the current week, silently capped at the
    /// weekly target. No-op for daily habits.
    pub fn add_weekly_completion(&mut self) {
        self.add_weekly_completion_at(Local::now());
    }

    pub fn add_weekly_completion_at(&mut self, now: DateTime<Local>) {
        if let Frequency::Weekly { occurrences } = self.frequency {
            if self.completions_in_week_of(now) < occurrences as usize {
                self.completed_dates.push(now.with_timezone(&Utc));
            }
        }
    }

    /// Drop the most recent completion recorded in the current week;
    /// no-op when the week has none.
    pub fn remove_weekly_completion(&mut self) {
        self.remove_weekly_completion_at(Local::now());
    }

    pub fn remove_weekly_completion_at(&mut self, now: DateTime<Local>) {
        let week = now.date_naive().iso_week();
        let latest = self
            .completed_dates
            .iter()
            .enumerate()
            .filter(|&(_, ts)| local_day(ts).iso_week() == week)
            .max_by_key(|&(_, ts)| *ts)
            .map(|(idx, _)| idx);
        if let Some(idx) = latest {
            self.completed_dates.remove(idx);
        }
    }

    /// Apply an edit: the title is trimmed (rejecting an empty result is
    /// the caller's job) and a weekly target is clamped to 1..=7. The
    /// completion history is untouched; switching frequency just changes
    /// the predicate counts are computed under.
    pub fn update(&mut self, title: &str, frequency: Frequency) {
        self.title = title.trim().to_string();
        self.frequency = match frequency {
            Frequency::Weekly { occurrences } => Frequency::Weekly {
                occurrences: occurrences.clamp(1, 7),
            },
            Frequency::Daily => Frequency::Daily,
        };
    }
}

fn local_day(ts: &DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .single()
            .expect("unambiguous local time")
    }

    #[test]
    fn daily_toggle_marks_and_clears_today() {
        let now = at(2024, 6, 10, 12);
        let mut habit = Habit::daily("Read");

        habit.toggle_completion_at(now);
        assert!(habit.is_completed_on(now.date_naive()));
        assert_eq!(habit.completed_dates.len(), 1);

        habit.toggle_completion_at(at(2024, 6, 10, 18));
        assert!(!habit.is_completed_on(now.date_naive()));
        assert!(habit.completed_dates.is_empty());
    }

    #[test]
    fn daily_toggle_clears_duplicate_entries_for_the_day() {
        let now = at(2024, 6, 10, 12);
        let mut habit = Habit::daily("Read");
        habit.completed_dates.push(now.with_timezone(&Utc));
        habit.completed_dates.push(at(2024, 6, 10, 9).with_timezone(&Utc));
        habit.completed_dates.push(at(2024, 6, 9, 9).with_timezone(&Utc));

        habit.toggle_completion_at(now);

        assert_eq!(habit.completed_dates.len(), 1);
        assert!(habit.is_completed_on(at(2024, 6, 9, 9).date_naive()));
    }

    #[test]
    fn daily_toggle_leaves_other_days_alone() {
        let mut habit = Habit::daily("Read");
        habit.toggle_completion_at(at(2024, 6, 9, 12));
        habit.toggle_completion_at(at(2024, 6, 10, 12));
        assert_eq!(habit.completed_dates.len(), 2);
    }

    #[test]
    fn weekly_add_caps_at_target() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 3 });
        for hour in [8, 10, 12, 14] {
            habit.add_weekly_completion_at(at(2024, 6, 10, hour));
        }
        assert_eq!(habit.completions_in_week_of(at(2024, 6, 10, 15)), 3);
        assert_eq!(habit.completed_dates.len(), 3);
    }

    #[test]
    fn weekly_add_is_noop_for_daily_habit() {
        let mut habit = Habit::daily("Read");
        habit.add_weekly_completion_at(at(2024, 6, 10, 8));
        assert!(habit.completed_dates.is_empty());
    }

    #[test]
    fn weekly_counts_reset_across_weeks() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 2 });
        habit.add_weekly_completion_at(at(2024, 6, 5, 8));
        habit.add_weekly_completion_at(at(2024, 6, 6, 8));
        // Next ISO week: the cap no longer applies.
        habit.add_weekly_completion_at(at(2024, 6, 10, 8));
        assert_eq!(habit.completed_dates.len(), 3);
        assert_eq!(habit.completions_in_week_of(at(2024, 6, 10, 9)), 1);
    }

    #[test]
    fn weekly_remove_drops_latest_completion_of_the_week() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 5 });
        habit.add_weekly_completion_at(at(2024, 6, 10, 8));
        habit.add_weekly_completion_at(at(2024, 6, 11, 8));

        habit.remove_weekly_completion_at(at(2024, 6, 12, 8));

        assert_eq!(habit.completed_dates.len(), 1);
        assert!(habit.is_completed_on(at(2024, 6, 10, 8).date_naive()));
    }

    #[test]
    fn weekly_remove_on_empty_week_is_noop() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 2 });
        habit.add_weekly_completion_at(at(2024, 6, 5, 8));
        habit.remove_weekly_completion_at(at(2024, 6, 12, 8));
        assert_eq!(habit.completed_dates.len(), 1);
    }

    #[test]
    fn weekly_toggle_adds_when_week_is_empty_and_removes_otherwise() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 3 });
        let now = at(2024, 6, 10, 8);

        habit.toggle_completion_at(now);
        assert_eq!(habit.completions_in_week_of(now), 1);

        habit.toggle_completion_at(at(2024, 6, 11, 8));
        assert_eq!(habit.completions_in_week_of(now), 0);
    }

    #[test]
    fn update_trims_title_and_clamps_weekly_target() {
        let mut habit = Habit::daily("Read");
        habit.update("  Read more  ", Frequency::Weekly { occurrences: 12 });
        assert_eq!(habit.title, "Read more");
        assert_eq!(habit.frequency, Frequency::Weekly { occurrences: 7 });

        habit.update("Read more", Frequency::Weekly { occurrences: 0 });
        assert_eq!(habit.frequency, Frequency::Weekly { occurrences: 1 });
    }

    #[test]
    fn update_keeps_completion_history_across_frequency_switch() {
        let mut habit = Habit::daily("Read");
        habit.toggle_completion_at(at(2024, 6, 10, 8));
        habit.update("Read", Frequency::Weekly { occurrences: 4 });
        assert_eq!(habit.completed_dates.len(), 1);
        assert_eq!(habit.completions_in_week_of(at(2024, 6, 11, 8)), 1);
    }

    #[test]
    fn record_without_frequency_parses_as_daily() {
        let raw = r#"{"id":"a2f1f81c-9d3e-4b5e-8b27-5a94f04f8c7b","title":"Read","completedDates":[]}"#;
        let habit: Habit = serde_json::from_str(raw).unwrap();
        assert_eq!(habit.frequency, Frequency::Daily);
    }

    #[test]
    fn record_without_id_or_dates_gets_defaults() {
        let raw = r#"{"title":"Read"}"#;
        let habit: Habit = serde_json::from_str(raw).unwrap();
        assert!(habit.completed_dates.is_empty());
        assert_eq!(habit.frequency, Frequency::Daily);
    }

    #[test]
    fn frequency_wire_format() {
        assert_eq!(
            serde_json::to_value(Frequency::Daily).unwrap(),
            serde_json::json!("daily")
        );
        assert_eq!(
            serde_json::to_value(Frequency::Weekly { occurrences: 3 }).unwrap(),
            serde_json::json!({"weekly": {"occurrences": 3}})
        );
    }

    #[test]
    fn habit_record_roundtrip_preserves_timestamps() {
        let mut habit = Habit::new("Gym", Frequency::Weekly { occurrences: 2 });
        habit.add_weekly_completion_at(at(2024, 6, 10, 8));
        let raw = serde_json::to_string(&habit).unwrap();
        assert!(raw.contains("completedDates"));
        let back: Habit = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, habit);
    }
}
