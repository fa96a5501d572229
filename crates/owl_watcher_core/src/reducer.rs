//! crates/owl_watcher_core/src/reducer.rs
//!
//! Folds raw match records into the ordered list of viewing windows the
//! scheduler walks through. Pure: no I/O, no clock.

use chrono::{DateTime, Utc};

use crate::domain::{MatchRecord, ViewingWindow};

/// Two pending matches whose starts are at least this many whole hours apart
/// belong to different windows.
pub const MERGE_THRESHOLD_HOURS: i64 = 12;

/// How a window's `close` is updated when another match is folded into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosePolicy {
    /// The most recently folded match's `end` wins, even if it is earlier.
    #[default]
    LastWrite,
    /// The window only ever grows.
    Max,
}

/// Reduces `records` with [`ClosePolicy::LastWrite`].
pub fn reduce(records: &[MatchRecord]) -> Vec<ViewingWindow> {
    reduce_with(records, ClosePolicy::LastWrite)
}

/// Reduces `records` (expected in start order) into disjoint viewing windows.
///
/// Only pending matches take part. A match extends the current window when its
/// start lies less than [`MERGE_THRESHOLD_HOURS`] after the window's `open`,
/// otherwise the window is emitted and a new one begins at the match.
pub fn reduce_with(records: &[MatchRecord], policy: ClosePolicy) -> Vec<ViewingWindow> {
    let mut windows = Vec::new();
    let mut current: Option<ViewingWindow> = None;

    for record in records.iter().filter(|r| r.is_pending()) {
        current = Some(match current {
            None => ViewingWindow::new(record.start, record.end),
            Some(window)
                if whole_hours_between(window.open, record.start) >= MERGE_THRESHOLD_HOURS =>
            {
                windows.push(window);
                ViewingWindow::new(record.start, record.end)
            }
            Some(window) => {
                let close = match policy {
                    ClosePolicy::LastWrite => record.end,
                    ClosePolicy::Max => window.close.max(record.end),
                };
                ViewingWindow::new(window.open, close)
            }
        });
    }

    windows.extend(current);
    windows
}

// Whole elapsed hours, truncated toward zero.
fn whole_hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_seconds() / 3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MatchState;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        // 2024-04-01 is a Monday.
        Utc.with_ymd_and_hms(2024, 4, day, hour, minute, 0).unwrap()
    }

    fn pending(start: DateTime<Utc>, end: DateTime<Utc>) -> MatchRecord {
        MatchRecord::new(start, end, MatchState::Pending)
    }

    #[test]
    fn merges_same_day_and_splits_next_day() {
        let records = vec![
            pending(at(1, 10, 0), at(1, 12, 0)),
            pending(at(1, 14, 0), at(1, 16, 0)),
            pending(at(2, 10, 0), at(2, 12, 0)),
        ];

        let windows = reduce(&records);

        assert_eq!(
            windows,
            vec![
                ViewingWindow::new(at(1, 10, 0), at(1, 16, 0)),
                ViewingWindow::new(at(2, 10, 0), at(2, 12, 0)),
            ]
        );
    }

    #[test]
    fn ignores_records_that_are_not_pending() {
        let with_concluded = vec![
            pending(at(1, 10, 0), at(1, 12, 0)),
            MatchRecord::new(at(1, 23, 0), at(2, 1, 0), MatchState::Concluded),
            pending(at(1, 14, 0), at(1, 16, 0)),
        ];
        let without = vec![
            pending(at(1, 10, 0), at(1, 12, 0)),
            pending(at(1, 14, 0), at(1, 16, 0)),
        ];

        assert_eq!(reduce(&with_concluded), reduce(&without));
        assert_eq!(reduce(&with_concluded).len(), 1);
    }

    #[test]
    fn no_pending_records_means_nothing_to_watch() {
        assert!(reduce(&[]).is_empty());

        let finished = vec![
            MatchRecord::new(at(1, 10, 0), at(1, 12, 0), MatchState::Concluded),
            MatchRecord::new(at(1, 13, 0), at(1, 15, 0), MatchState::InProgress),
        ];
        assert!(reduce(&finished).is_empty());
    }

    #[test]
    fn gap_is_measured_in_whole_hours_from_window_open() {
        // 11h59m after the open still truncates to 11 hours.
        let merged = vec![
            pending(at(1, 8, 0), at(1, 9, 0)),
            pending(at(1, 19, 59), at(1, 21, 0)),
        ];
        assert_eq!(reduce(&merged).len(), 1);

        let split = vec![
            pending(at(1, 8, 0), at(1, 9, 0)),
            pending(at(1, 20, 0), at(1, 21, 0)),
        ];
        assert_eq!(reduce(&split).len(), 2);
    }

    #[test]
    fn last_write_close_can_regress() {
        let records = vec![
            pending(at(1, 10, 0), at(1, 18, 0)),
            pending(at(1, 11, 0), at(1, 13, 0)),
        ];

        assert_eq!(reduce(&records), vec![ViewingWindow::new(at(1, 10, 0), at(1, 13, 0))]);
        assert_eq!(
            reduce_with(&records, ClosePolicy::Max),
            vec![ViewingWindow::new(at(1, 10, 0), at(1, 18, 0))]
        );
    }

    #[test]
    fn reducing_expanded_windows_is_idempotent() {
        let records = vec![
            pending(at(1, 10, 0), at(1, 12, 0)),
            pending(at(1, 14, 0), at(1, 16, 0)),
            pending(at(2, 10, 0), at(2, 12, 0)),
            pending(at(3, 18, 0), at(3, 23, 0)),
        ];
        let windows = reduce(&records);

        let expanded: Vec<MatchRecord> = windows.iter().map(|w| pending(w.open, w.close)).collect();

        assert_eq!(reduce(&expanded), windows);
    }

    proptest! {
        #[test]
        fn sequential_matches_reduce_to_ordered_disjoint_windows(
            steps in prop::collection::vec((0i64..36 * 60, 1i64..6 * 60, any::<bool>()), 0..40),
            use_max in any::<bool>(),
        ) {
            // Each match starts some minutes after the previous one ended.
            let mut cursor = at(1, 0, 0);
            let mut records = Vec::new();
            for (gap, length, is_pending) in steps {
                let start = cursor + Duration::minutes(gap);
                let end = start + Duration::minutes(length);
                let state = if is_pending { MatchState::Pending } else { MatchState::Concluded };
                records.push(MatchRecord::new(start, end, state));
                cursor = end;
            }
            let policy = if use_max { ClosePolicy::Max } else { ClosePolicy::LastWrite };

            let windows = reduce_with(&records, policy);

            prop_assert!(windows.len() <= records.iter().filter(|r| r.is_pending()).count());
            for window in &windows {
                prop_assert!(window.open < window.close);
            }
            for pair in windows.windows(2) {
                prop_assert!(pair[0].close <= pair[1].open);
                let gap = whole_hours_between(pair[0].open, pair[1].open);
                prop_assert!(gap >= MERGE_THRESHOLD_HOURS);
            }
        }
    }
}
