use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("interval end must be after its start")]
    InvertedInterval,
    #[error("interval lasts {minutes} minutes; the minimum is {minimum}")]
    BelowMinimumDuration { minutes: i64, minimum: i64 },
    #[error("all-day events cannot be moved or resized on the timeline")]
    AllDayNotEditable,
    #[error("edit moves the interval outside the representable time range")]
    OutOfRange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_well_formed(&self) -> bool {
        self.end > self.start
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Half-open overlap test; touching intervals do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn shifted(&self, minutes: i64) -> Result<Interval, ValidationError> {
        let offset = minutes_delta(minutes)?;
        Ok(Interval {
            start: add_delta(self.start, offset)?,
            end: add_delta(self.end, offset)?,
        })
    }

    /// Intersection with `bounds`, or `None` when nothing of `self` is left.
    pub fn clamp_to(&self, bounds: &Interval) -> Option<Interval> {
        let start = self.start.max(bounds.start);
        let end = self.end.min(bounds.end);
        if end <= start {
            return None;
        }
        Some(Interval { start, end })
    }

    pub fn validate(&self, minimum_minutes: i64) -> Result<(), ValidationError> {
        if !self.is_well_formed() {
            return Err(ValidationError::InvertedInterval);
        }
        let below_minimum = match Duration::try_minutes(minimum_minutes) {
            Some(minimum) => self.duration() < minimum,
            None => minimum_minutes > 0,
        };
        if below_minimum {
            return Err(ValidationError::BelowMinimumDuration {
                minutes: self.duration_minutes(),
                minimum: minimum_minutes,
            });
        }
        Ok(())
    }
}

/// Minute count as a `Duration`, rejecting counts chrono cannot represent.
pub fn minutes_delta(minutes: i64) -> Result<Duration, ValidationError> {
    Duration::try_minutes(minutes).ok_or(ValidationError::OutOfRange)
}

/// `instant + delta` without overflowing the `DateTime` range.
pub fn add_delta(instant: DateTime<Utc>, delta: Duration) -> Result<DateTime<Utc>, ValidationError> {
    instant
        .checked_add_signed(delta)
        .ok_or(ValidationError::OutOfRange)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub interval: Interval,
    pub is_all_day: bool,
    pub calendar_ref: String,
    pub last_modified: DateTime<Utc>,
}

/// Event payload before the store has assigned an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub interval: Interval,
    pub calendar_ref: Option<String>,
}

impl EventDraft {
    pub fn untitled(interval: Interval) -> Self {
        Self {
            title: String::new(),
            interval,
            calendar_ref: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub interval: Interval,
    pub is_all_day: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResizeEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub event_id: String,
    pub column: usize,
    pub total_columns: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlacedRect {
    pub event_id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacedRect {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn interval(start: &str, end: &str) -> Interval {
        Interval::new(fixed_time(start), fixed_time(end))
    }

    #[test]
    fn interval_validate_rejects_inverted_and_short_ranges() {
        let inverted = interval("2026-02-16T10:00:00Z", "2026-02-16T09:00:00Z");
        assert_eq!(inverted.validate(15), Err(ValidationError::InvertedInterval));

        let empty = interval("2026-02-16T10:00:00Z", "2026-02-16T10:00:00Z");
        assert_eq!(empty.validate(15), Err(ValidationError::InvertedInterval));

        let short = interval("2026-02-16T10:00:00Z", "2026-02-16T10:10:00Z");
        assert_eq!(
            short.validate(15),
            Err(ValidationError::BelowMinimumDuration {
                minutes: 10,
                minimum: 15
            })
        );

        let exact = interval("2026-02-16T10:00:00Z", "2026-02-16T10:15:00Z");
        assert!(exact.validate(15).is_ok());
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let first = interval("2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z");
        let second = interval("2026-02-16T10:00:00Z", "2026-02-16T11:00:00Z");
        let third = interval("2026-02-16T09:59:00Z", "2026-02-16T11:00:00Z");
        assert!(!first.overlaps(&second));
        assert!(first.overlaps(&third));
    }

    #[test]
    fn clamp_to_trims_to_bounds_or_drops() {
        let day = interval("2026-02-16T00:00:00Z", "2026-02-17T00:00:00Z");
        let overnight = interval("2026-02-16T23:00:00Z", "2026-02-17T01:00:00Z");
        assert_eq!(
            overnight.clamp_to(&day),
            Some(interval("2026-02-16T23:00:00Z", "2026-02-17T00:00:00Z"))
        );

        let tomorrow = interval("2026-02-17T08:00:00Z", "2026-02-17T09:00:00Z");
        assert_eq!(tomorrow.clamp_to(&day), None);
    }

    #[test]
    fn shifted_rejects_offsets_outside_the_datetime_range() {
        let meeting = interval("2026-02-16T09:00:00Z", "2026-02-16T10:00:00Z");
        assert_eq!(
            meeting.shifted(90),
            Ok(interval("2026-02-16T10:30:00Z", "2026-02-16T11:30:00Z"))
        );
        assert_eq!(meeting.shifted(i64::MAX), Err(ValidationError::OutOfRange));
        assert_eq!(
            meeting.shifted(200_000_000_000),
            Err(ValidationError::OutOfRange)
        );
        assert_eq!(
            meeting.validate(i64::MAX),
            Err(ValidationError::BelowMinimumDuration {
                minutes: 60,
                minimum: i64::MAX
            })
        );
    }

    #[test]
    fn placed_rect_contains_is_half_open() {
        let rect = PlacedRect {
            event_id: "evt-1".to_string(),
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 40.0,
        };
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(109.9, 59.9));
        assert!(!rect.contains(110.0, 30.0));
        assert!(!rect.contains(50.0, 60.0));
    }

    #[test]
    fn calendar_event_supports_serde_roundtrip() {
        let event = CalendarEvent {
            id: "evt-1".to_string(),
            title: "Standup".to_string(),
            interval: interval("2026-02-16T09:00:00Z", "2026-02-16T09:30:00Z"),
            is_all_day: false,
            calendar_ref: "work".to_string(),
            last_modified: fixed_time("2026-02-15T12:00:00Z"),
        };
        let roundtrip: CalendarEvent =
            serde_json::from_str(&serde_json::to_string(&event).expect("serialize event"))
                .expect("deserialize event");
        assert_eq!(roundtrip, event);
    }
}
