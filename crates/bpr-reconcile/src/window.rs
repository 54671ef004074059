//! Trailing-N-days recency window.
//!
//! Both sides are truncated to their local calendar day before comparing, so
//! the window covers `reference_day - n ..= reference_day` regardless of the
//! time of day. Days after the reference day are outside the window.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Calendar-day test shared by every window variant.
pub fn day_within_trailing(day: NaiveDate, reference_day: NaiveDate, n: u32) -> bool {
    if day > reference_day {
        return false;
    }
    match reference_day.checked_sub_days(Days::new(u64::from(n))) {
        Some(start) => day >= start,
        None => true,
    }
}

/// `date` and `reference` are truncated to midnight in their own zone.
pub fn within_trailing_days<Z: TimeZone>(date: &DateTime<Z>, reference: &DateTime<Z>, n: u32) -> bool {
    day_within_trailing(date.date_naive(), reference.date_naive(), n)
}

// ---------------------------------------------------------------------------
// WindowFilter
// ---------------------------------------------------------------------------

/// A trailing window bound to the business timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowFilter {
    tz: Tz,
    days: u32,
}

impl WindowFilter {
    pub fn new(tz: Tz, days: u32) -> Self {
        Self { tz, days }
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Calendar day of `at` in the business timezone.
    pub fn local_day(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.tz).date_naive()
    }

    pub fn contains(&self, at: DateTime<Utc>, reference: DateTime<Utc>) -> bool {
        within_trailing_days(
            &at.with_timezone(&self.tz),
            &reference.with_timezone(&self.tz),
            self.days,
        )
    }

    /// For records that only carry a calendar date (e.g. a bid date).
    pub fn contains_day(&self, day: NaiveDate, reference: DateTime<Utc>) -> bool {
        day_within_trailing(day, self.local_day(reference), self.days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveTime};

    fn ist(y: i32, m: u32, d: u32, hh: u32, mm: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(y, m, d, hh, mm, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn same_day_is_inside() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        assert!(w.contains(r, r));
    }

    #[test]
    fn six_days_back_is_inside() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        assert!(w.contains(r - Duration::days(6), r));
    }

    #[test]
    fn eight_days_back_is_outside() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        assert!(!w.contains(r - Duration::days(8), r));
        assert!(!w.contains(ist(2026, 10, 8, 23, 59), r));
    }

    #[test]
    fn seventh_day_boundary_is_inside_at_both_ends_of_the_day() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        assert!(w.contains(ist(2026, 10, 9, 0, 0), r));
        assert!(w.contains(ist(2026, 10, 9, 23, 59), r));
    }

    #[test]
    fn future_day_is_outside() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        assert!(!w.contains(ist(2026, 10, 17, 0, 0), r));
    }

    #[test]
    fn truncation_uses_business_timezone() {
        // 20:00 UTC on the 8th is already the 9th in Kolkata.
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        let at = Utc.with_ymd_and_hms(2026, 10, 8, 20, 0, 0).single().unwrap();
        assert!(w.contains(at, r));

        let utc_window = WindowFilter::new(chrono_tz::UTC, 7);
        assert!(!utc_window.contains(at, r));
    }

    #[test]
    fn one_day_window_keeps_yesterday_and_today() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 1);
        let r = ist(2026, 10, 16, 0, 5);
        assert!(w.contains(ist(2026, 10, 15, 0, 0), r));
        assert!(!w.contains(ist(2026, 10, 14, 23, 59), r));
    }

    #[test]
    fn calendar_day_variant_matches_timestamp_variant() {
        let w = WindowFilter::new(chrono_tz::Asia::Kolkata, 7);
        let r = ist(2026, 10, 16, 12, 0);
        let day = NaiveDate::from_ymd_opt(2026, 10, 9).unwrap();
        assert!(w.contains_day(day, r));
        assert!(!w.contains_day(day.pred_opt().unwrap(), r));

        let naive_ref = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_time(NaiveTime::MIN);
        assert!(within_trailing_days(
            &Utc.from_utc_datetime(&naive_ref),
            &Utc.from_utc_datetime(&naive_ref),
            0
        ));
    }
}
