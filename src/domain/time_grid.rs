use crate::domain::models::{Interval, MINUTES_PER_DAY};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const MIN_HOUR_HEIGHT: f64 = 36.0;
pub const MAX_HOUR_HEIGHT: f64 = 120.0;
pub const DEFAULT_HOUR_HEIGHT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourHeightBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for HourHeightBounds {
    fn default() -> Self {
        Self {
            min: MIN_HOUR_HEIGHT,
            max: MAX_HOUR_HEIGHT,
        }
    }
}

impl HourHeightBounds {
    pub fn clamp(&self, hour_height: f64) -> f64 {
        if hour_height.is_nan() {
            return self.min;
        }
        hour_height.clamp(self.min, self.max)
    }
}

/// First instant of `date` in `tz`, as UTC.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    if let Some(local) = tz.from_local_datetime(&midnight).earliest() {
        return local.with_timezone(&Utc);
    }
    // Midnight skipped by a DST jump: the day starts at the first valid local hour.
    (1..=3)
        .filter_map(|hour| {
            tz.from_local_datetime(&(midnight + Duration::hours(hour)))
                .earliest()
        })
        .map(|local| local.with_timezone(&Utc))
        .next()
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

/// Geometry of one day column: minutes since start-of-day against pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    day_start: DateTime<Utc>,
    hour_height: f64,
}

impl TimeGrid {
    pub fn new(day_start: DateTime<Utc>, hour_height: f64) -> Self {
        Self {
            day_start,
            hour_height: HourHeightBounds::default().clamp(hour_height),
        }
    }

    pub fn for_date(date: NaiveDate, tz: Tz, hour_height: f64) -> Self {
        Self::new(start_of_day(date, tz), hour_height)
    }

    pub fn with_hour_height(self, hour_height: f64) -> Self {
        Self::new(self.day_start, hour_height)
    }

    pub fn day_start(&self) -> DateTime<Utc> {
        self.day_start
    }

    pub fn day_end(&self) -> DateTime<Utc> {
        self.day_start + Duration::minutes(MINUTES_PER_DAY)
    }

    pub fn day_bounds(&self) -> Interval {
        Interval::new(self.day_start, self.day_end())
    }

    pub fn hour_height(&self) -> f64 {
        self.hour_height
    }

    pub fn content_height(&self) -> f64 {
        self.pixel_y(MINUTES_PER_DAY as f64)
    }

    pub fn offset_from_date(&self, date: DateTime<Utc>) -> i64 {
        (date - self.day_start).num_minutes()
    }

    pub fn date_from_offset(&self, minutes: i64) -> DateTime<Utc> {
        self.day_start + Duration::minutes(minutes)
    }

    pub fn pixel_y(&self, minutes: f64) -> f64 {
        minutes / 60.0 * self.hour_height
    }

    pub fn pixel_height(&self, duration: Duration) -> f64 {
        self.pixel_y(duration.num_seconds() as f64 / 60.0)
    }

    /// Inverse of [`TimeGrid::pixel_y`], clamped to the day.
    pub fn minutes_at_y(&self, y: f64) -> f64 {
        if y.is_nan() {
            return 0.0;
        }
        let minutes = y / self.hour_height * 60.0;
        minutes.clamp(0.0, MINUTES_PER_DAY as f64)
    }

    pub fn minutes_for_pixels(&self, dy: f64) -> f64 {
        dy / self.hour_height * 60.0
    }

    pub fn now_indicator(&self, now: DateTime<Utc>) -> Option<f64> {
        if now < self.day_start || now >= self.day_end() {
            return None;
        }
        let seconds = (now - self.day_start).num_seconds() as f64;
        Some(self.pixel_y(seconds / 60.0))
    }
}

/// Pinch zoom state. A pinch scales from the height captured when it began,
/// so successive pinches compose multiplicatively instead of drifting per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    hour_height: f64,
    base_height_at_gesture_start: Option<f64>,
    bounds: HourHeightBounds,
}

impl Default for ZoomState {
    fn default() -> Self {
        Self::new(DEFAULT_HOUR_HEIGHT, HourHeightBounds::default())
    }
}

impl ZoomState {
    pub fn new(initial: f64, bounds: HourHeightBounds) -> Self {
        Self {
            hour_height: bounds.clamp(initial),
            base_height_at_gesture_start: None,
            bounds,
        }
    }

    pub fn hour_height(&self) -> f64 {
        self.hour_height
    }

    pub fn bounds(&self) -> HourHeightBounds {
        self.bounds
    }

    pub fn is_pinching(&self) -> bool {
        self.base_height_at_gesture_start.is_some()
    }

    pub fn set_hour_height(&mut self, hour_height: f64) -> f64 {
        self.hour_height = self.bounds.clamp(hour_height);
        self.hour_height
    }

    pub fn begin_pinch(&mut self) {
        if self.base_height_at_gesture_start.is_none() {
            self.base_height_at_gesture_start = Some(self.hour_height);
        }
    }

    pub fn update_pinch(&mut self, scale: f64) -> f64 {
        self.begin_pinch();
        let base = self.base_height_at_gesture_start.unwrap_or(self.hour_height);
        if !scale.is_finite() || scale <= 0.0 {
            return self.hour_height;
        }
        self.set_hour_height(base * scale)
    }

    pub fn end_pinch(&mut self) {
        self.base_height_at_gesture_start = None;
    }

    pub fn cancel_pinch(&mut self) {
        if let Some(base) = self.base_height_at_gesture_start.take() {
            self.hour_height = base;
        }
    }
}
