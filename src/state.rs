//! In-memory bot state.
//!
//! The source of truth for every at-most-once guarantee: reminder marks,
//! daily welcome/check-in flags, last-contact timestamps, and the work-end
//! alert schedule. All of it is process-lifetime only; nothing is persisted.
//!
//! Collections sit behind their own `Mutex` so concurrent ticks from the
//! scheduler, webhook handler, and scrape worker can only produce a harmless
//! duplicate send in the worst case, never corruption. The daily reset jobs
//! garbage-collect marks whose day component is no longer today.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;

/// Dedup key for a pushed holiday reminder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReminderKey {
    pub label: String,
    pub threshold: i64,
    pub day: NaiveDate,
}

/// Work-end alert schedule derived from one day's attendance record.
#[derive(Debug, Clone)]
pub struct WorkEndSchedule {
    pub day: NaiveDate,
    pub work_end: NaiveTime,
    /// Minute offsets already fired today.
    sent_offsets: HashSet<i64>,
}

/// Shared mutable state, constructed once at process start.
#[derive(Default)]
pub struct BotState {
    sent_reminders: Mutex<HashSet<ReminderKey>>,
    last_contact: Mutex<HashMap<String, DateTime<Tz>>>,
    care_sent: Mutex<HashSet<NaiveDate>>,
    welcome_sent: Mutex<HashSet<NaiveDate>>,
    work_end: Mutex<Option<WorkEndSchedule>>,
}

impl BotState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a reminder was pushed. Returns `false` if the same
    /// (label, threshold, day) was already marked, i.e. the send must be
    /// skipped.
    pub fn try_mark_reminder(&self, key: ReminderKey) -> bool {
        lock(&self.sent_reminders).insert(key)
    }

    pub fn reminder_mark_count(&self) -> usize {
        lock(&self.sent_reminders).len()
    }

    /// Drop reminder marks from previous days.
    pub fn gc_reminders(&self, today: NaiveDate) {
        lock(&self.sent_reminders).retain(|key| key.day == today);
    }

    /// Record an inbound message from `user_id`.
    pub fn note_contact(&self, user_id: &str, at: DateTime<Tz>) {
        lock(&self.last_contact).insert(user_id.to_string(), at);
    }

    pub fn last_contact(&self, user_id: &str) -> Option<DateTime<Tz>> {
        lock(&self.last_contact).get(user_id).copied()
    }

    /// Returns `true` exactly once per day: the caller owns sending the
    /// check-in for `day`.
    pub fn try_mark_care(&self, day: NaiveDate) -> bool {
        lock(&self.care_sent).insert(day)
    }

    /// Returns `true` exactly once per day for the welcome message.
    pub fn try_mark_welcome(&self, day: NaiveDate) -> bool {
        lock(&self.welcome_sent).insert(day)
    }

    pub fn welcome_mark_count(&self) -> usize {
        lock(&self.welcome_sent).len()
    }

    /// Drop welcome and check-in marks from previous days.
    pub fn gc_daily_marks(&self, today: NaiveDate) {
        lock(&self.welcome_sent).retain(|d| *d == today);
        lock(&self.care_sent).retain(|d| *d == today);
    }

    /// Install today's work-end alert schedule, replacing any earlier one.
    /// Re-installing the same (day, work_end) keeps already-fired offsets so
    /// a midday re-scrape cannot re-arm alerts that were already sent.
    pub fn set_work_end(&self, day: NaiveDate, work_end: NaiveTime) {
        let mut guard = lock(&self.work_end);
        match guard.as_mut() {
            Some(existing) if existing.day == day && existing.work_end == work_end => {}
            _ => {
                *guard = Some(WorkEndSchedule { day, work_end, sent_offsets: HashSet::new() });
            }
        }
    }

    /// Work-end time scheduled for `day`, if a scrape produced one.
    pub fn work_end_for(&self, day: NaiveDate) -> Option<NaiveTime> {
        lock(&self.work_end)
            .as_ref()
            .filter(|s| s.day == day)
            .map(|s| s.work_end)
    }

    /// Claim the given minute offset for `day`. Returns `false` if that
    /// offset already fired or no schedule exists for the day.
    pub fn try_mark_work_end_offset(&self, day: NaiveDate, offset_min: i64) -> bool {
        let mut guard = lock(&self.work_end);
        match guard.as_mut() {
            Some(schedule) if schedule.day == day => schedule.sent_offsets.insert(offset_min),
            _ => false,
        }
    }
}

/// Lock a state collection, recovering from poisoning.
///
/// A panic while holding one of these locks leaves plain collection data
/// behind, which is still safe to read; crashing the whole daemon over it
/// would violate the never-crash propagation policy.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::clock::LOCAL_TZ;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reminder_marks_are_at_most_once() {
        let state = BotState::new();
        let key = ReminderKey { label: "七夕".into(), threshold: 7, day: day(2025, 8, 22) };

        assert!(state.try_mark_reminder(key.clone()));
        assert!(!state.try_mark_reminder(key.clone()));

        // A different threshold on the same day is a separate reminder.
        let other = ReminderKey { threshold: 5, ..key };
        assert!(state.try_mark_reminder(other));
        assert_eq!(state.reminder_mark_count(), 2);
    }

    #[test]
    fn reminder_gc_keeps_only_today() {
        let state = BotState::new();
        state.try_mark_reminder(ReminderKey {
            label: "聖誕節".into(),
            threshold: 3,
            day: day(2025, 12, 22),
        });
        state.try_mark_reminder(ReminderKey {
            label: "聖誕節".into(),
            threshold: 1,
            day: day(2025, 12, 24),
        });

        state.gc_reminders(day(2025, 12, 24));
        assert_eq!(state.reminder_mark_count(), 1);
    }

    #[test]
    fn care_and_welcome_marks_reset_per_day() {
        let state = BotState::new();
        assert!(state.try_mark_care(day(2025, 6, 1)));
        assert!(!state.try_mark_care(day(2025, 6, 1)));
        assert!(state.try_mark_care(day(2025, 6, 2)));

        assert!(state.try_mark_welcome(day(2025, 6, 2)));
        assert!(!state.try_mark_welcome(day(2025, 6, 2)));

        state.gc_daily_marks(day(2025, 6, 3));
        assert_eq!(state.welcome_mark_count(), 0);
        assert!(state.try_mark_care(day(2025, 6, 1)), "old mark was collected");
    }

    #[test]
    fn last_contact_tracks_latest_timestamp() {
        let state = BotState::new();
        let first = LOCAL_TZ.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let later = LOCAL_TZ.with_ymd_and_hms(2025, 6, 1, 21, 0, 0).unwrap();

        assert_eq!(state.last_contact("U-partner"), None);
        state.note_contact("U-partner", first);
        state.note_contact("U-partner", later);
        assert_eq!(state.last_contact("U-partner"), Some(later));
    }

    #[test]
    fn work_end_offsets_fire_at_most_once_per_day() {
        let state = BotState::new();
        let today = day(2025, 9, 16);
        let end = NaiveTime::from_hms_opt(17, 2, 0).unwrap();

        assert!(!state.try_mark_work_end_offset(today, 60), "no schedule yet");

        state.set_work_end(today, end);
        assert!(state.try_mark_work_end_offset(today, 60));
        assert!(!state.try_mark_work_end_offset(today, 60));
        assert!(state.try_mark_work_end_offset(today, 30));

        // Same-day re-scrape with the same result keeps fired offsets.
        state.set_work_end(today, end);
        assert!(!state.try_mark_work_end_offset(today, 60));

        // A changed work end (late punch correction) re-arms the schedule.
        state.set_work_end(today, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert!(state.try_mark_work_end_offset(today, 60));

        // Yesterday's schedule never fires today.
        assert!(!state.try_mark_work_end_offset(day(2025, 9, 17), 60));
    }
}
