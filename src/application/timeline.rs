use crate::application::error::TimelineError;
use crate::application::gesture::{
    GestureAction, GestureContext, GestureController, GestureMode, InputEvent,
};
use crate::application::mutation::{
    resized_interval, CommitOutcome, Mutation, MutationCoordinator, Submission,
};
use crate::domain::layout::{layout_reminders, layout_week, DayColumn, DayLayout, IntegrityWarning};
use crate::domain::models::{CalendarEvent, EventDraft, Interval, PlacedRect, Reminder, ResizeEdge};
use crate::domain::time_grid::TimeGrid;
use crate::infrastructure::config::TimelineConfig;
use crate::infrastructure::event_store::EventStore;
use chrono::{DateTime, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use log::info;
use std::sync::Arc;

const LOG_TARGET: &str = "calendar_timeline::timeline";

/// Where the day columns sit in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin_x: f64,
    pub column_width: f64,
}

#[derive(Debug)]
pub enum ViewEvent {
    OpenEditor { event_id: String },
    Submitted(Submission),
    /// The edit was queued over an older queued edit, which is gone.
    Superseded(TimelineError),
    Redraw,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NowIndicator {
    pub column: usize,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionOverlay {
    pub column: usize,
    pub interval: Interval,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub hour_height: f64,
    pub content_height: f64,
    pub columns: Vec<DayColumn>,
    pub event_rects: Vec<PlacedRect>,
    pub reminder_rects: Vec<PlacedRect>,
    pub all_day: Vec<Vec<String>>,
    pub now_indicator: Option<NowIndicator>,
    pub selection: Option<SelectionOverlay>,
    pub warnings: Vec<IntegrityWarning>,
    pub pending: Vec<String>,
}

impl RenderFrame {
    pub fn event_rect(&self, event_id: &str) -> Option<&PlacedRect> {
        self.event_rects.iter().find(|rect| rect.event_id == event_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Preview {
    Move {
        event_id: String,
        delta_minutes: i64,
    },
    Resize {
        event_id: String,
        edge: ResizeEdge,
        delta_minutes: i64,
    },
}

/// One timeline screen: visible days, gesture handling, optimistic edits and layout.
pub struct TimelineView<S>
where
    S: EventStore + 'static,
{
    tz: Tz,
    viewport: Viewport,
    minimum_render_height: f64,
    minimum_duration_minutes: i64,
    visible_dates: Vec<NaiveDate>,
    reminders: Vec<Reminder>,
    controller: GestureController,
    coordinator: MutationCoordinator<S>,
    preview: Option<Preview>,
}

impl<S> TimelineView<S>
where
    S: EventStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        config: &TimelineConfig,
        viewport: Viewport,
        date: NaiveDate,
    ) -> Result<Self, TimelineError> {
        config.validate()?;
        let tz = config.tz()?;
        Ok(Self {
            tz,
            viewport,
            minimum_render_height: config.minimum_render_height,
            minimum_duration_minutes: config.minimum_duration_minutes,
            visible_dates: vec![date],
            reminders: Vec::new(),
            controller: GestureController::new(
                config.gesture_settings(),
                config.snap_policy(),
                config.zoom_state(),
            ),
            coordinator: MutationCoordinator::new(store, config.mutation_settings()),
            preview: None,
        })
    }

    pub fn show_day(&mut self, date: NaiveDate) {
        self.show_dates(vec![date]);
    }

    pub fn show_week(&mut self, first_date: NaiveDate, days: u64) {
        let dates = (0..days.max(1))
            .filter_map(|offset| first_date.checked_add_days(Days::new(offset)))
            .collect();
        self.show_dates(dates);
    }

    pub fn visible_dates(&self) -> &[NaiveDate] {
        &self.visible_dates
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_reminders(&mut self, reminders: Vec<Reminder>) {
        self.reminders = reminders;
    }

    pub fn hour_height(&self) -> f64 {
        self.controller.hour_height()
    }

    pub fn gesture_mode(&self) -> GestureMode {
        self.controller.mode()
    }

    pub fn event(&self, event_id: &str) -> Option<&CalendarEvent> {
        self.coordinator.event(event_id)
    }

    pub fn is_pending(&self, event_id: &str) -> bool {
        self.coordinator.is_pending(event_id)
    }

    pub fn columns(&self) -> Vec<DayColumn> {
        let hour_height = self.controller.hour_height();
        DayColumn::row(
            self.visible_dates
                .iter()
                .map(|date| TimeGrid::for_date(*date, self.tz, hour_height)),
            self.viewport.origin_x,
            self.viewport.column_width,
        )
    }

    /// Loads the visible range from the store. Local copies of events with
    /// outstanding commits survive the reload.
    pub async fn reload(&mut self) -> Result<usize, TimelineError> {
        let Some(range) = self.visible_range() else {
            return Ok(0);
        };
        let events = self
            .coordinator
            .store()
            .load_events(range)
            .await
            .map_err(TimelineError::Load)?;
        let loaded = events.len();
        self.coordinator.replace_events(events);
        info!(
            target: LOG_TARGET,
            "loaded {loaded} events for {} day(s) from {}",
            self.visible_dates.len(),
            range.start.to_rfc3339()
        );
        Ok(loaded)
    }

    pub fn handle_input(&mut self, input: &InputEvent) -> Result<Option<ViewEvent>, TimelineError> {
        let columns = self.columns();
        let layouts = layout_week(
            &self.coordinator.events(),
            &columns,
            self.minimum_render_height,
        );
        let rects: Vec<PlacedRect> = layouts
            .iter()
            .flat_map(|layout| layout.rects.iter().cloned())
            .collect();
        let context = GestureContext {
            columns: &columns,
            rects: &rects,
        };

        let action = self.controller.handle(input, &context);
        if !matches!(
            self.controller.mode(),
            GestureMode::Dragging | GestureMode::Resizing { .. }
        ) {
            self.preview = None;
        }

        let Some(action) = action else {
            return Ok(None);
        };
        let mutation = match action {
            GestureAction::OpenEditor { event_id } => {
                return Ok(Some(ViewEvent::OpenEditor { event_id }));
            }
            GestureAction::DragPreview {
                event_id,
                delta_minutes,
            } => {
                self.preview = Some(Preview::Move {
                    event_id,
                    delta_minutes,
                });
                return Ok(Some(ViewEvent::Redraw));
            }
            GestureAction::ResizePreview {
                event_id,
                edge,
                delta_minutes,
            } => {
                self.preview = Some(Preview::Resize {
                    event_id,
                    edge,
                    delta_minutes,
                });
                return Ok(Some(ViewEvent::Redraw));
            }
            GestureAction::SelectionChanged { .. } | GestureAction::ZoomChanged { .. } => {
                return Ok(Some(ViewEvent::Redraw));
            }
            GestureAction::Move {
                event_id,
                delta_minutes,
            } => Mutation::Move {
                event_id,
                delta_minutes,
            },
            GestureAction::Resize {
                event_id,
                edge,
                delta_minutes,
            } => Mutation::Resize {
                event_id,
                edge,
                delta_minutes,
            },
            GestureAction::RangeSelected { interval } => Mutation::RangeSelect { interval },
            GestureAction::QuickCreate { interval } => Mutation::Create {
                draft: EventDraft::untitled(interval),
            },
        };
        self.submit(mutation).map(Some)
    }

    /// Edits that do not come from a gesture, such as the editor sheet or a delete button.
    pub fn submit(&mut self, mutation: Mutation) -> Result<ViewEvent, TimelineError> {
        match self.coordinator.submit(mutation)? {
            Submission::Queued {
                event_id,
                replaced_pending: true,
            } => Ok(ViewEvent::Superseded(TimelineError::GestureConflict {
                event_id,
            })),
            submission => Ok(ViewEvent::Submitted(submission)),
        }
    }

    pub fn delete_event(&mut self, event_id: &str) -> Result<ViewEvent, TimelineError> {
        self.submit(Mutation::Delete {
            event_id: event_id.to_string(),
        })
    }

    pub fn poll_outcomes(&mut self) -> Vec<CommitOutcome> {
        self.coordinator.poll_outcomes()
    }

    pub async fn next_outcome(&mut self) -> Option<CommitOutcome> {
        self.coordinator.next_outcome().await
    }

    /// Tears the view down: the gesture is dropped and outstanding commits are aborted.
    pub fn shutdown(&mut self) {
        self.controller.reset();
        self.preview = None;
        self.coordinator.shutdown();
    }

    pub fn render(&self, now: DateTime<Utc>) -> RenderFrame {
        let columns = self.columns();
        let events = self.previewed_events();
        let layouts = layout_week(&events, &columns, self.minimum_render_height);

        let reminder_layouts: Vec<DayLayout> = columns
            .iter()
            .map(|column| layout_reminders(&self.reminders, column, self.minimum_render_height))
            .collect();

        let mut warnings: Vec<IntegrityWarning> = Vec::new();
        for warning in layouts
            .iter()
            .chain(reminder_layouts.iter())
            .flat_map(|layout| layout.warnings.iter())
        {
            if !warnings.contains(warning) {
                warnings.push(warning.clone());
            }
        }

        let now_indicator = columns.iter().enumerate().find_map(|(column, day)| {
            day.grid
                .now_indicator(now)
                .map(|y| NowIndicator { column, y })
        });

        let mut pending: Vec<String> = events
            .iter()
            .filter(|event| self.coordinator.is_pending(&event.id))
            .map(|event| event.id.clone())
            .collect();
        pending.sort();

        RenderFrame {
            hour_height: self.controller.hour_height(),
            content_height: columns
                .first()
                .map(|column| column.grid.content_height())
                .unwrap_or_default(),
            event_rects: layouts
                .iter()
                .flat_map(|layout| layout.rects.iter().cloned())
                .collect(),
            reminder_rects: reminder_layouts
                .iter()
                .flat_map(|layout| layout.rects.iter().cloned())
                .collect(),
            all_day: layouts.iter().map(|layout| layout.all_day.clone()).collect(),
            now_indicator,
            selection: self.selection_overlay(&columns),
            warnings,
            pending,
            columns,
        }
    }

    fn show_dates(&mut self, dates: Vec<NaiveDate>) {
        self.controller.reset();
        self.preview = None;
        self.visible_dates = dates;
    }

    fn visible_range(&self) -> Option<Interval> {
        let columns = self.columns();
        let first = columns.first()?;
        let last = columns.last()?;
        Some(Interval::new(first.grid.day_start(), last.grid.day_end()))
    }

    fn previewed_events(&self) -> Vec<CalendarEvent> {
        let mut events = self.coordinator.events();
        let Some(preview) = &self.preview else {
            return events;
        };
        let target = match preview {
            Preview::Move { event_id, .. } | Preview::Resize { event_id, .. } => event_id,
        };
        if let Some(event) = events.iter_mut().find(|event| &event.id == target) {
            let previewed = match preview {
                Preview::Move { delta_minutes, .. } => event.interval.shifted(*delta_minutes),
                Preview::Resize {
                    edge,
                    delta_minutes,
                    ..
                } => resized_interval(
                    &event.interval,
                    *edge,
                    *delta_minutes,
                    self.minimum_duration_minutes,
                ),
            };
            if let Ok(interval) = previewed {
                event.interval = interval;
            }
        }
        events
    }

    fn selection_overlay(&self, columns: &[DayColumn]) -> Option<SelectionOverlay> {
        let context = GestureContext {
            columns,
            rects: &[],
        };
        let (column, interval) = self.controller.selection(&context)?;
        let day = columns.get(column)?;
        Some(SelectionOverlay {
            column,
            interval,
            x: day.frame.x,
            y: day.grid.pixel_height(interval.start - day.grid.day_start()),
            width: day.frame.width,
            height: day.grid.pixel_height(interval.duration()),
        })
    }
}
