//! Due-date and window properties over arbitrary dates and intervals.

mod common;

use chrono::Duration;
use common::{date, task};
use proptest::prelude::*;

proptest! {
    #[test]
    fn never_checked_is_always_due(days in 0i64..20_000, interval in 1u32..400) {
        let today = date(1990, 1, 1) + Duration::days(days);
        prop_assert!(task("a", interval, 0.5, None).is_due(today));
    }

    #[test]
    fn due_exactly_after_interval(days in 0i64..20_000, interval in 1u32..400, offset in -30i64..30) {
        let last = date(1990, 1, 1) + Duration::days(days);
        let t = task("a", interval, 0.5, Some(last));
        let today = last + Duration::days(i64::from(interval) + offset);
        prop_assert_eq!(t.is_due(today), offset > 0);
    }

    #[test]
    fn current_window_is_a_week_ending_today(days in 0i64..20_000) {
        let today = date(1990, 1, 1) + Duration::days(days);
        let w = task("a", 7, 0.5, None).current_window(today);
        prop_assert_eq!(w.end, today);
        prop_assert_eq!(w.start, today - Duration::days(7));
    }
}
