//! Read-only session presentation derived from persisted fields.

use serde::Serialize;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::session::{SessionPhase, SessionRecord};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub title: &'static str,
    pub remaining_ms: i64,
    pub total_ms: i64,
    /// Elapsed fraction of the current session, 0.0 ..= 1.0.
    pub progress: f64,
    /// `MM:SS` of the remaining time.
    pub countdown: String,
    /// A running session whose end time is not in the future.
    pub stale: bool,
    pub end_time: Option<i64>,
    pub pomodoros_completed: u64,
    pub today_count: u64,
}

impl SessionView {
    pub fn from_record(record: &SessionRecord, now_ms: i64, today: &str) -> Self {
        let title = match record.phase {
            SessionPhase::Work => "Focusing...",
            SessionPhase::Break => "On a Break",
            SessionPhase::Idle => "Ready",
        };

        let (remaining_ms, total_ms, stale) = match (record.phase, record.end_time) {
            (SessionPhase::Idle, _) => (0, 0, false),
            (_, Some(end)) => {
                let total = record.total_duration.unwrap_or(0).max(0);
                (end.saturating_sub(now_ms).max(0), total, end <= now_ms)
            }
            (_, None) => (0, record.total_duration.unwrap_or(0).max(0), true),
        };

        let progress = if stale {
            1.0
        } else if total_ms > 0 {
            ((total_ms - remaining_ms) as f64 / total_ms as f64).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            phase: record.phase,
            title,
            remaining_ms,
            total_ms,
            progress,
            countdown: format_countdown(remaining_ms),
            stale,
            end_time: record.end_time,
            pomodoros_completed: record.pomodoros_completed,
            today_count: record.completed_on(today),
        }
    }

    pub fn from_store(store: &dyn Store, clock: &dyn Clock) -> Result<Self, StoreError> {
        let record = SessionRecord::load(store)?;
        Ok(Self::from_record(&record, clock.now_ms(), &clock.today()))
    }
}

/// `MM:SS`, minutes unbounded.
pub fn format_countdown(remaining_ms: i64) -> String {
    let secs = remaining_ms.max(0) / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::{keys, MemoryStore, WriteBatch};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000_000;

    fn running(phase: SessionPhase, remaining_ms: i64, total_ms: i64) -> SessionRecord {
        SessionRecord {
            phase,
            end_time: Some(NOW + remaining_ms),
            total_duration: Some(total_ms),
            ..SessionRecord::default()
        }
    }

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(0), "00:00");
        assert_eq!(format_countdown(59_999), "00:59");
        assert_eq!(format_countdown(25 * 60_000), "25:00");
        assert_eq!(format_countdown(-5), "00:00");
    }

    #[test]
    fn idle_view() {
        let view = SessionView::from_record(&SessionRecord::default(), NOW, "2023-11-14");
        assert_eq!(view.title, "Ready");
        assert_eq!(view.countdown, "00:00");
        assert!(!view.stale);
        assert_eq!(view.progress, 0.0);
    }

    #[test]
    fn work_halfway() {
        let view = SessionView::from_record(
            &running(SessionPhase::Work, 10 * 60_000, 20 * 60_000),
            NOW,
            "2023-11-14",
        );
        assert_eq!(view.title, "Focusing...");
        assert_eq!(view.countdown, "10:00");
        assert!((view.progress - 0.5).abs() < f64::EPSILON);
        assert!(!view.stale);
    }

    #[test]
    fn expired_session_is_stale() {
        let view =
            SessionView::from_record(&running(SessionPhase::Break, -1_000, 5 * 60_000), NOW, "x");
        assert_eq!(view.title, "On a Break");
        assert!(view.stale);
        assert_eq!(view.remaining_ms, 0);
        assert_eq!(view.progress, 1.0);
    }

    #[test]
    fn extreme_end_time_does_not_overflow() {
        let mut record = running(SessionPhase::Work, 0, 25 * 60_000);
        record.end_time = Some(i64::MIN);
        let view = SessionView::from_record(&record, NOW, "x");
        assert!(view.stale);
        assert_eq!(view.remaining_ms, 0);

        record.end_time = Some(i64::MAX);
        let view = SessionView::from_record(&record, -NOW, "x");
        assert!(!view.stale);
        assert_eq!(view.progress, 0.0);
        assert_eq!(view.countdown, format_countdown(view.remaining_ms));
    }

    #[test]
    fn corrupt_end_time_in_store_still_renders() {
        let store = MemoryStore::new();
        store
            .apply(
                WriteBatch::new()
                    .set(keys::SESSION_STATE, "WORK")
                    .set(keys::END_TIME, i64::MIN),
            )
            .unwrap();
        let view = SessionView::from_store(&store, &ManualClock::at_ms(NOW)).unwrap();
        assert_eq!(view.phase, SessionPhase::Work);
        assert!(view.stale);
        assert_eq!(view.remaining_ms, 0);
    }

    #[test]
    fn reads_today_from_history() {
        let store = MemoryStore::new();
        let clock = ManualClock::at_ms(NOW);
        store
            .apply(
                WriteBatch::new()
                    .set(keys::POMODORO_HISTORY, json!({ (clock.today()): 3, "2000-01-01": 9 })),
            )
            .unwrap();
        let view = SessionView::from_store(&store, &clock).unwrap();
        assert_eq!(view.today_count, 3);
    }
}
