//! Conflict decision between a candidate weekly slot and a doctor's
//! date-specific schedule exceptions.
//!
//! Pure and synchronous: callers fetch the exception snapshot, this module
//! decides. Exceptions are scanned in list order and the first matching block
//! wins. Adjacent windows (one ends exactly when the other starts) are not
//! conflicts.

use std::collections::HashSet;

use chrono::{Datelike, Months, NaiveDate};
use uuid::Uuid;

use crate::models::{
    AvailabilityException, ConflictCheckResult, ExceptionKind, WeeklyAvailability,
};
use crate::weekday::{canonical_weekday, weekday_token};

/// A proposed weekly slot, as submitted: weekday in any supported variant,
/// times as `HH:MM` strings.
#[derive(Debug, Clone, Copy)]
pub struct SlotCandidate<'a> {
    pub weekday: &'a str,
    pub start_time: &'a str,
    pub end_time: &'a str,
}

/// Parse `HH:MM` or `HH:MM:SS` into a minute-of-day count (0..=1439).
///
/// Total over all string inputs: absent components, non-numeric components,
/// or out-of-range hours/minutes give `None`, never a panic or error.
/// Seconds are ignored.
pub fn parse_minute_of_day(raw: &str) -> Option<i32> {
    let mut parts = raw.trim().split(':');
    let hours: i32 = parts.next()?.parse().ok()?;
    let minutes: i32 = parts.next()?.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Render a minute-of-day pair as `HH:MM–HH:MM` for conflict messages.
pub fn format_time_range(start: i32, end: i32) -> String {
    format!(
        "{:02}:{:02}–{:02}:{:02}",
        start / 60,
        start % 60,
        end / 60,
        end % 60
    )
}

/// Last date on which an exception is still actionable for new weekly slots.
pub fn horizon_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_months(Months::new(12))
        .unwrap_or(NaiveDate::MAX)
}

/// Whether `date` falls inside the actionable window `[today, today + 1 year]`,
/// both ends inclusive. Past dates and far-future dates are ignored by the
/// conflict scan.
pub fn within_horizon(date: NaiveDate, today: NaiveDate) -> bool {
    date >= today && date <= horizon_end(today)
}

/// Decide whether a candidate weekly slot collides with any of the doctor's
/// blocking exceptions.
///
/// Scan order is list order; the first matching block (whole-day or window)
/// terminates the scan. Rows that cannot be evaluated (missing or unparsable
/// date, unparsable times) are skipped rather than surfaced. Overlap is
/// half-open: `req_start < ex_end && ex_start < req_end`, so a slot that
/// exactly touches an exception boundary is allowed.
pub fn check_conflicts(
    candidate: &SlotCandidate<'_>,
    exceptions: &[AvailabilityException],
    today: NaiveDate,
) -> ConflictCheckResult {
    let candidate_weekday = canonical_weekday(candidate.weekday);
    let req_start = parse_minute_of_day(candidate.start_time);
    let req_end = parse_minute_of_day(candidate.end_time);

    for exception in exceptions {
        let Some(date) = exception.parsed_date() else {
            continue;
        };
        if !within_horizon(date, today) {
            continue;
        }
        if exception.kind != ExceptionKind::Block {
            continue;
        }
        if weekday_token(date.weekday()) != candidate_weekday {
            continue;
        }

        if exception.is_whole_day() {
            return ConflictCheckResult::whole_day(date, exception.reason.clone());
        }

        let (Some(req_start), Some(req_end)) = (req_start, req_end) else {
            continue;
        };
        let Some(ex_start) = exception.start_time.as_deref().and_then(parse_minute_of_day) else {
            continue;
        };
        let Some(ex_end) = exception.end_time.as_deref().and_then(parse_minute_of_day) else {
            continue;
        };

        if req_start < ex_end && ex_start < req_end {
            return ConflictCheckResult::window(
                date,
                format_time_range(ex_start, ex_end),
                exception.reason.clone(),
            );
        }
    }

    ConflictCheckResult::clear()
}

/// Canonical weekdays already taken by *active* availabilities, excluding the
/// record being edited. Advisory: feeds the UI so taken weekdays can be
/// disabled, it does not reject anything itself.
pub fn weekdays_in_use(
    existing: &[WeeklyAvailability],
    exclude_id: Option<Uuid>,
) -> HashSet<String> {
    existing
        .iter()
        .filter(|availability| availability.active)
        .filter(|availability| exclude_id != Some(availability.id))
        .map(|availability| canonical_weekday(&availability.weekday))
        .collect()
}
