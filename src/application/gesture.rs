use crate::domain::layout::DayColumn;
use crate::domain::models::{Interval, PlacedRect, ResizeEdge, MINUTES_PER_DAY};
use crate::domain::snap::SnapPolicy;
use crate::domain::time_grid::ZoomState;

pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 10.0;
pub const DEFAULT_RESIZE_EDGE_PX: f64 = 12.0;
pub const DEFAULT_LONG_PRESS_MS: u64 = 400;
pub const DEFAULT_DRAFT_DURATION_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureSettings {
    pub drag_threshold_px: f64,
    pub resize_edge_px: f64,
    pub long_press_ms: u64,
    pub default_duration_minutes: i64,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            resize_edge_px: DEFAULT_RESIZE_EDGE_PX,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            default_duration_minutes: DEFAULT_DRAFT_DURATION_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Moved,
    Up,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
    pub timestamp_ms: u64,
    pub touch_count: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalePhase {
    Began,
    Changed,
    Ended,
    Cancelled,
}

/// Platform-neutral input, produced by whatever adapter owns the real input stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Pointer(PointerEvent),
    Scale { phase: ScalePhase, scale: f64 },
    /// Frame clock, used to fire long-presses while the pointer is held still.
    Tick { timestamp_ms: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureMode {
    Idle,
    PotentialDrag,
    Dragging,
    Resizing { edge: ResizeEdge },
    RangeSelecting,
    Zooming,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Semantic output of the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureAction {
    OpenEditor {
        event_id: String,
    },
    DragPreview {
        event_id: String,
        delta_minutes: i64,
    },
    Move {
        event_id: String,
        delta_minutes: i64,
    },
    ResizePreview {
        event_id: String,
        edge: ResizeEdge,
        delta_minutes: i64,
    },
    Resize {
        event_id: String,
        edge: ResizeEdge,
        delta_minutes: i64,
    },
    SelectionChanged {
        interval: Interval,
    },
    RangeSelected {
        interval: Interval,
    },
    QuickCreate {
        interval: Interval,
    },
    ZoomChanged {
        hour_height: f64,
    },
}

/// Layout the controller hit-tests against; rebuilt by the caller every frame.
#[derive(Debug, Clone, Copy)]
pub struct GestureContext<'a> {
    pub columns: &'a [DayColumn],
    pub rects: &'a [PlacedRect],
}

/// One pointer interaction, from pointer-down to pointer-up or cancel.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureSession {
    pub mode: GestureMode,
    pub anchor_point: Point,
    pub target_event_id: Option<String>,
    pub start_timestamp_ms: u64,
    anchor_column: usize,
    current_point: Point,
    current_column: usize,
    max_touch_count: u8,
    moved_beyond_threshold: bool,
    long_press_fired: bool,
}

pub struct GestureController {
    settings: GestureSettings,
    snap: SnapPolicy,
    zoom: ZoomState,
    session: Option<GestureSession>,
}

impl GestureController {
    pub fn new(settings: GestureSettings, snap: SnapPolicy, zoom: ZoomState) -> Self {
        Self {
            settings,
            snap,
            zoom,
            session: None,
        }
    }

    pub fn mode(&self) -> GestureMode {
        if self.zoom.is_pinching() {
            return GestureMode::Zooming;
        }
        self.session
            .as_ref()
            .map(|session| session.mode)
            .unwrap_or(GestureMode::Idle)
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn hour_height(&self) -> f64 {
        self.zoom.hour_height()
    }

    pub fn zoom(&self) -> &ZoomState {
        &self.zoom
    }

    /// Drops any in-progress interaction without emitting an action.
    pub fn reset(&mut self) {
        self.session = None;
        self.zoom.cancel_pinch();
    }

    pub fn handle(&mut self, input: &InputEvent, context: &GestureContext<'_>) -> Option<GestureAction> {
        match input {
            InputEvent::Pointer(pointer) => match pointer.phase {
                PointerPhase::Down => self.pointer_down(pointer, context),
                PointerPhase::Moved => self.pointer_moved(pointer, context),
                PointerPhase::Up => self.pointer_up(pointer, context),
                PointerPhase::Cancelled => {
                    self.session = None;
                    None
                }
            },
            InputEvent::Scale { phase, scale } => self.scale(*phase, *scale),
            InputEvent::Tick { timestamp_ms } => self.tick(*timestamp_ms, context),
        }
    }

    /// Current snapped selection and the column it was started in.
    pub fn selection(&self, context: &GestureContext<'_>) -> Option<(usize, Interval)> {
        let session = self.session.as_ref()?;
        if session.mode != GestureMode::RangeSelecting {
            return None;
        }
        let interval = self.selection_interval(session, context)?;
        Some((session.anchor_column, interval))
    }

    fn pointer_down(
        &mut self,
        pointer: &PointerEvent,
        context: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        if self.zoom.is_pinching() {
            return None;
        }
        if let Some(session) = self.session.as_mut() {
            session.max_touch_count = session.max_touch_count.max(pointer.touch_count);
            return None;
        }

        let point = Point {
            x: pointer.x,
            y: pointer.y,
        };
        let column = column_at(context, point.x)?;
        let hit = self.hit_test(context, &point);
        if pointer.touch_count >= 2 && hit.is_some() {
            // Range selection only starts over empty grid.
            return None;
        }

        let (mode, target_event_id) = match hit {
            Some((event_id, Some(edge))) => (GestureMode::Resizing { edge }, Some(event_id)),
            Some((event_id, None)) => (GestureMode::PotentialDrag, Some(event_id)),
            None => (GestureMode::Idle, None),
        };

        self.session = Some(GestureSession {
            mode,
            anchor_point: point,
            target_event_id,
            start_timestamp_ms: pointer.timestamp_ms,
            anchor_column: column,
            current_point: point,
            current_column: column,
            max_touch_count: pointer.touch_count.max(1),
            moved_beyond_threshold: false,
            long_press_fired: false,
        });
        None
    }

    fn pointer_moved(
        &mut self,
        pointer: &PointerEvent,
        context: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        let threshold = self.settings.drag_threshold_px;
        let mut session = self.session.take()?;
        session.current_point = Point {
            x: pointer.x,
            y: pointer.y,
        };
        if let Some(column) = column_at(context, pointer.x) {
            session.current_column = column;
        }
        session.max_touch_count = session.max_touch_count.max(pointer.touch_count);
        if session.anchor_point.distance_to(&session.current_point) > threshold {
            session.moved_beyond_threshold = true;
        }

        let action = match session.mode {
            GestureMode::Idle => {
                if session.long_press_fired {
                    None
                } else if session.moved_beyond_threshold {
                    if session.max_touch_count < 2 {
                        // One-finger pan over empty grid belongs to the scroll view.
                        return None;
                    }
                    session.mode = GestureMode::RangeSelecting;
                    self.selection_interval(&session, context)
                        .map(|interval| GestureAction::SelectionChanged { interval })
                } else {
                    self.fire_long_press(&mut session, pointer.timestamp_ms, context)
                }
            }
            GestureMode::PotentialDrag => {
                if session.moved_beyond_threshold {
                    session.mode = GestureMode::Dragging;
                    self.drag_preview(&session, context)
                } else {
                    None
                }
            }
            GestureMode::Dragging => self.drag_preview(&session, context),
            GestureMode::Resizing { edge } => {
                let delta_minutes = self.vertical_delta(&session, context);
                session
                    .target_event_id
                    .clone()
                    .map(|event_id| GestureAction::ResizePreview {
                        event_id,
                        edge,
                        delta_minutes,
                    })
            }
            GestureMode::RangeSelecting => self
                .selection_interval(&session, context)
                .map(|interval| GestureAction::SelectionChanged { interval }),
            GestureMode::Zooming => None,
        };

        self.session = Some(session);
        action
    }

    fn pointer_up(
        &mut self,
        pointer: &PointerEvent,
        context: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        let mut session = self.session.take()?;
        session.current_point = Point {
            x: pointer.x,
            y: pointer.y,
        };
        if let Some(column) = column_at(context, pointer.x) {
            session.current_column = column;
        }
        if session.anchor_point.distance_to(&session.current_point) > self.settings.drag_threshold_px
        {
            session.moved_beyond_threshold = true;
        }

        match session.mode {
            GestureMode::Idle => {
                if session.long_press_fired {
                    return None;
                }
                self.fire_long_press(&mut session, pointer.timestamp_ms, context)
            }
            GestureMode::PotentialDrag => session
                .target_event_id
                .map(|event_id| GestureAction::OpenEditor { event_id }),
            GestureMode::Dragging => {
                let delta_minutes = self.drag_delta(&session, context);
                let event_id = session.target_event_id?;
                (delta_minutes != 0).then_some(GestureAction::Move {
                    event_id,
                    delta_minutes,
                })
            }
            GestureMode::Resizing { edge } => {
                let delta_minutes = self.vertical_delta(&session, context);
                let event_id = session.target_event_id?;
                if !session.moved_beyond_threshold {
                    return Some(GestureAction::OpenEditor { event_id });
                }
                (delta_minutes != 0).then_some(GestureAction::Resize {
                    event_id,
                    edge,
                    delta_minutes,
                })
            }
            GestureMode::RangeSelecting => self
                .selection_interval(&session, context)
                .map(|interval| GestureAction::RangeSelected { interval }),
            GestureMode::Zooming => None,
        }
    }

    fn tick(&mut self, timestamp_ms: u64, context: &GestureContext<'_>) -> Option<GestureAction> {
        let mut session = self.session.take()?;
        let action = if session.mode == GestureMode::Idle {
            self.fire_long_press(&mut session, timestamp_ms, context)
        } else {
            None
        };
        self.session = Some(session);
        action
    }

    fn scale(&mut self, phase: ScalePhase, scale: f64) -> Option<GestureAction> {
        match phase {
            ScalePhase::Began => {
                let committed = self.session.as_ref().is_some_and(|session| {
                    matches!(
                        session.mode,
                        GestureMode::Dragging
                            | GestureMode::Resizing { .. }
                            | GestureMode::RangeSelecting
                    )
                });
                if committed {
                    return None;
                }
                // Fingers already down belong to the pinch until they lift.
                if let Some(session) = self.session.as_mut() {
                    session.mode = GestureMode::Zooming;
                }
                self.zoom.begin_pinch();
                None
            }
            ScalePhase::Changed => {
                if !self.zoom.is_pinching() {
                    return None;
                }
                let hour_height = self.zoom.update_pinch(scale);
                Some(GestureAction::ZoomChanged { hour_height })
            }
            ScalePhase::Ended => {
                if !self.zoom.is_pinching() {
                    return None;
                }
                self.zoom.end_pinch();
                None
            }
            ScalePhase::Cancelled => {
                if !self.zoom.is_pinching() {
                    return None;
                }
                self.zoom.cancel_pinch();
                Some(GestureAction::ZoomChanged {
                    hour_height: self.zoom.hour_height(),
                })
            }
        }
    }

    fn fire_long_press(
        &self,
        session: &mut GestureSession,
        timestamp_ms: u64,
        context: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        if session.long_press_fired
            || session.moved_beyond_threshold
            || session.max_touch_count > 1
            || session.target_event_id.is_some()
        {
            return None;
        }
        let held_ms = timestamp_ms.saturating_sub(session.start_timestamp_ms);
        if held_ms < self.settings.long_press_ms {
            return None;
        }
        let interval = self.quick_create_interval(session, context)?;
        session.long_press_fired = true;
        Some(GestureAction::QuickCreate { interval })
    }

    fn hit_test(
        &self,
        context: &GestureContext<'_>,
        point: &Point,
    ) -> Option<(String, Option<ResizeEdge>)> {
        let rect = context
            .rects
            .iter()
            .rev()
            .find(|rect| rect.contains(point.x, point.y))?;
        let strip = self.settings.resize_edge_px.min(rect.height / 3.0);
        let edge = if point.y < rect.y + strip {
            Some(ResizeEdge::Top)
        } else if point.y >= rect.y + rect.height - strip {
            Some(ResizeEdge::Bottom)
        } else {
            None
        };
        Some((rect.event_id.clone(), edge))
    }

    fn vertical_delta(&self, session: &GestureSession, context: &GestureContext<'_>) -> i64 {
        let Some(column) = context.columns.get(session.anchor_column) else {
            return 0;
        };
        let dy = session.current_point.y - session.anchor_point.y;
        self.snap.snap(column.grid.minutes_for_pixels(dy))
    }

    /// Snapped vertical delta plus whole-day shift when the pointer crossed columns.
    fn drag_delta(&self, session: &GestureSession, context: &GestureContext<'_>) -> i64 {
        let vertical = self.vertical_delta(session, context);
        let day_shift = match (
            context.columns.get(session.anchor_column),
            context.columns.get(session.current_column),
        ) {
            (Some(anchor), Some(current)) => {
                (current.grid.day_start() - anchor.grid.day_start()).num_minutes()
            }
            _ => 0,
        };
        vertical + day_shift
    }

    fn drag_preview(
        &self,
        session: &GestureSession,
        context: &GestureContext<'_>,
    ) -> Option<GestureAction> {
        let event_id = session.target_event_id.clone()?;
        Some(GestureAction::DragPreview {
            event_id,
            delta_minutes: self.drag_delta(session, context),
        })
    }

    fn selection_interval(
        &self,
        session: &GestureSession,
        context: &GestureContext<'_>,
    ) -> Option<Interval> {
        let grid = context.columns.get(session.anchor_column)?.grid;
        let anchor = self.snap_to_day(grid.minutes_at_y(session.anchor_point.y));
        let current = self.snap_to_day(grid.minutes_at_y(session.current_point.y));
        Some(Interval::new(
            grid.date_from_offset(anchor.min(current)),
            grid.date_from_offset(anchor.max(current)),
        ))
    }

    fn quick_create_interval(
        &self,
        session: &GestureSession,
        context: &GestureContext<'_>,
    ) -> Option<Interval> {
        let grid = context.columns.get(session.anchor_column)?.grid;
        let duration = self
            .settings
            .default_duration_minutes
            .clamp(1, MINUTES_PER_DAY);
        let start = self
            .snap_to_day(grid.minutes_at_y(session.anchor_point.y))
            .min(MINUTES_PER_DAY - duration);
        Some(Interval::new(
            grid.date_from_offset(start),
            grid.date_from_offset(start + duration),
        ))
    }

    fn snap_to_day(&self, minutes: f64) -> i64 {
        self.snap.snap(minutes).clamp(0, MINUTES_PER_DAY)
    }
}

fn column_at(context: &GestureContext<'_>, x: f64) -> Option<usize> {
    context.columns.iter().position(|column| column.contains_x(x))
}
