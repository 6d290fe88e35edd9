use crate::domain::models::ValidationError;
use crate::infrastructure::error::InfraError;
use thiserror::Error;

/// Errors surfaced to the timeline view. None of them is fatal to the view.
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid edit: {0}")]
    Validation(#[from] ValidationError),
    #[error("could not save event {event_id}: {source}")]
    Collaborator {
        event_id: String,
        #[source]
        source: InfraError,
    },
    #[error("a newer edit replaced the pending edit for event {event_id}")]
    GestureConflict { event_id: String },
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("could not load events: {0}")]
    Load(#[source] InfraError),
    #[error("timeline configuration error: {0}")]
    Config(#[from] InfraError),
}

impl TimelineError {
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Collaborator { event_id, .. } | Self::GestureConflict { event_id } => {
                Some(event_id)
            }
            Self::UnknownEvent(event_id) => Some(event_id),
            Self::Validation(_) | Self::Load(_) | Self::Config(_) => None,
        }
    }
}
