use crate::application::gesture::{
    GestureSettings, DEFAULT_DRAFT_DURATION_MINUTES, DEFAULT_DRAG_THRESHOLD_PX,
    DEFAULT_LONG_PRESS_MS, DEFAULT_RESIZE_EDGE_PX,
};
use crate::application::mutation::{
    MutationSettings, RetryPolicy, DEFAULT_MINIMUM_DURATION_MINUTES,
};
use crate::domain::layout::DEFAULT_MINIMUM_RENDER_HEIGHT;
use crate::domain::snap::{SnapPolicy, DEFAULT_SNAP_STEP_MINUTES};
use crate::domain::time_grid::{
    HourHeightBounds, ZoomState, DEFAULT_HOUR_HEIGHT, MAX_HOUR_HEIGHT, MIN_HOUR_HEIGHT,
};
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const TIMELINE_JSON: &str = "timeline.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourHeightConfig {
    pub min: f64,
    pub max: f64,
    pub initial: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineConfig {
    pub schema: u8,
    pub timezone: String,
    pub snap_step_minutes: u32,
    pub default_duration_minutes: i64,
    pub minimum_duration_minutes: i64,
    pub hour_height: HourHeightConfig,
    pub minimum_render_height: f64,
    pub drag_threshold_px: f64,
    pub resize_edge_px: f64,
    pub long_press_ms: u64,
    pub retry: RetryConfig,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            schema: 1,
            timezone: "UTC".to_string(),
            snap_step_minutes: DEFAULT_SNAP_STEP_MINUTES,
            default_duration_minutes: DEFAULT_DRAFT_DURATION_MINUTES,
            minimum_duration_minutes: DEFAULT_MINIMUM_DURATION_MINUTES,
            hour_height: HourHeightConfig {
                min: MIN_HOUR_HEIGHT,
                max: MAX_HOUR_HEIGHT,
                initial: DEFAULT_HOUR_HEIGHT,
            },
            minimum_render_height: DEFAULT_MINIMUM_RENDER_HEIGHT,
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            resize_edge_px: DEFAULT_RESIZE_EDGE_PX,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            retry: RetryConfig {
                max_attempts: retry.max_attempts,
                base_delay_ms: retry.base_delay_ms,
            },
        }
    }
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), InfraError> {
        if self.snap_step_minutes == 0 {
            return Err(invalid("snapStepMinutes must be greater than zero"));
        }
        if self.minimum_duration_minutes <= 0 {
            return Err(invalid("minimumDurationMinutes must be greater than zero"));
        }
        if self.default_duration_minutes < self.minimum_duration_minutes {
            return Err(invalid(
                "defaultDurationMinutes must not be below minimumDurationMinutes",
            ));
        }
        let hour_height = &self.hour_height;
        if !(hour_height.min > 0.0 && hour_height.min <= hour_height.max) {
            return Err(invalid("hourHeight.min must be positive and not above hourHeight.max"));
        }
        if hour_height.min < MIN_HOUR_HEIGHT || hour_height.max > MAX_HOUR_HEIGHT {
            return Err(InfraError::InvalidConfig(format!(
                "hourHeight bounds must stay within [{MIN_HOUR_HEIGHT}, {MAX_HOUR_HEIGHT}]"
            )));
        }
        if !(hour_height.min..=hour_height.max).contains(&hour_height.initial) {
            return Err(invalid("hourHeight.initial must lie within [min, max]"));
        }
        if !(self.minimum_render_height > 0.0) {
            return Err(invalid("minimumRenderHeight must be greater than zero"));
        }
        if !(self.drag_threshold_px > 0.0) || !(self.resize_edge_px > 0.0) {
            return Err(invalid("dragThresholdPx and resizeEdgePx must be greater than zero"));
        }
        if self.long_press_ms == 0 {
            return Err(invalid("longPressMs must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.maxAttempts must be at least 1"));
        }
        self.tz()?;
        Ok(())
    }

    pub fn tz(&self) -> Result<Tz, InfraError> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| InfraError::InvalidConfig(format!("unknown timezone: {}", self.timezone)))
    }

    pub fn snap_policy(&self) -> SnapPolicy {
        SnapPolicy::new(self.snap_step_minutes)
    }

    pub fn zoom_state(&self) -> ZoomState {
        ZoomState::new(
            self.hour_height.initial,
            HourHeightBounds {
                min: self.hour_height.min,
                max: self.hour_height.max,
            },
        )
    }

    pub fn gesture_settings(&self) -> GestureSettings {
        GestureSettings {
            drag_threshold_px: self.drag_threshold_px,
            resize_edge_px: self.resize_edge_px,
            long_press_ms: self.long_press_ms,
            default_duration_minutes: self.default_duration_minutes,
        }
    }

    pub fn mutation_settings(&self) -> MutationSettings {
        MutationSettings {
            minimum_duration_minutes: self.minimum_duration_minutes,
            retry_policy: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay_ms: self.retry.base_delay_ms,
            },
        }
    }
}

fn invalid(message: &str) -> InfraError {
    InfraError::InvalidConfig(format!("{TIMELINE_JSON}: {message}"))
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(TIMELINE_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&TimelineConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_timeline_config(config_dir: &Path) -> Result<TimelineConfig, InfraError> {
    let path = config_dir.join(TIMELINE_JSON);
    let config: TimelineConfig = serde_json::from_value(read_config(&path)?)?;
    config.validate()?;
    Ok(config)
}
