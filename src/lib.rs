//! Day and week calendar timeline engine: time grid geometry, snapping,
//! overlap layout, a gesture state machine and optimistic event edits.

pub mod application {
    pub mod bootstrap;
    pub mod error;
    pub mod gesture;
    pub mod mutation;
    pub mod timeline;
}

pub mod domain {
    pub mod layout;
    pub mod models;
    pub mod snap;
    pub mod time_grid;
}

pub mod infrastructure {
    pub mod config;
    pub mod error;
    pub mod event_store;
    pub mod logging;
}

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::error::TimelineError;
pub use application::gesture::{
    GestureAction, GestureContext, GestureController, GestureMode, GestureSettings, InputEvent,
    PointerEvent, PointerPhase, ScalePhase,
};
pub use application::mutation::{
    CommitOutcome, Mutation, MutationCoordinator, MutationSettings, RetryPolicy, Submission,
};
pub use application::timeline::{RenderFrame, TimelineView, ViewEvent, Viewport};
pub use domain::layout::{assign_columns, layout_day, layout_reminders, layout_week, DayColumn, DayLayout};
pub use domain::models::{
    CalendarEvent, EventDraft, Interval, PlacedRect, Placement, Reminder, ResizeEdge,
    ValidationError,
};
pub use domain::snap::SnapPolicy;
pub use domain::time_grid::{TimeGrid, ZoomState};
pub use infrastructure::config::{load_timeline_config, TimelineConfig};
pub use infrastructure::error::InfraError;
pub use infrastructure::event_store::{EventStore, InMemoryEventStore};
pub use infrastructure::logging::init_logging;
