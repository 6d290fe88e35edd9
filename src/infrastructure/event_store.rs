use crate::domain::models::{CalendarEvent, EventDraft, Interval};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

const DEFAULT_CALENDAR_REF: &str = "default";

/// Backing calendar store. Implementations live outside the engine
/// (local database, remote provider sync); the engine only awaits these calls.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn load_events(&self, range: Interval) -> Result<Vec<CalendarEvent>, InfraError>;

    async fn create_event(&self, draft: &EventDraft) -> Result<CalendarEvent, InfraError>;

    async fn update_event(&self, event: &CalendarEvent) -> Result<(), InfraError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<HashMap<String, CalendarEvent>>,
    next_id: AtomicU64,
}

impl InMemoryEventStore {
    pub fn with_events(events: impl IntoIterator<Item = CalendarEvent>) -> Self {
        let store = Self::default();
        if let Ok(mut stored) = store.events.lock() {
            stored.extend(events.into_iter().map(|event| (event.id.clone(), event)));
        }
        store
    }

    pub fn get(&self, event_id: &str) -> Result<Option<CalendarEvent>, InfraError> {
        Ok(self.lock()?.get(event_id.trim()).cloned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CalendarEvent>>, InfraError> {
        self.events
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("event store lock poisoned: {error}")))
    }

    fn normalized_id(event_id: &str) -> Result<String, InfraError> {
        let normalized = event_id.trim();
        if normalized.is_empty() {
            return Err(InfraError::Rejected("event id must not be empty".to_string()));
        }
        Ok(normalized.to_string())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_events(&self, range: Interval) -> Result<Vec<CalendarEvent>, InfraError> {
        let events = self.lock()?;
        let mut visible: Vec<CalendarEvent> = events
            .values()
            .filter(|event| {
                // Malformed rows are returned so layout can report them.
                event.interval.overlaps(&range)
                    || (!event.interval.is_well_formed()
                        && event.interval.start >= range.start
                        && event.interval.start < range.end)
            })
            .cloned()
            .collect();
        visible.sort_by(|left, right| {
            left.interval
                .start
                .cmp(&right.interval.start)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(visible)
    }

    async fn create_event(&self, draft: &EventDraft) -> Result<CalendarEvent, InfraError> {
        if !draft.interval.is_well_formed() {
            return Err(InfraError::Rejected(
                "event end must be after its start".to_string(),
            ));
        }
        let sequence = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let event = CalendarEvent {
            id: format!("evt-{sequence}"),
            title: draft.title.clone(),
            interval: draft.interval,
            is_all_day: false,
            calendar_ref: draft
                .calendar_ref
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_CALENDAR_REF)
                .to_string(),
            last_modified: Utc::now(),
        };
        self.lock()?.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn update_event(&self, event: &CalendarEvent) -> Result<(), InfraError> {
        let event_id = Self::normalized_id(&event.id)?;
        let mut events = self.lock()?;
        let Some(stored) = events.get_mut(&event_id) else {
            return Err(InfraError::NotFound(event_id));
        };
        *stored = event.clone();
        stored.last_modified = Utc::now();
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), InfraError> {
        let event_id = Self::normalized_id(event_id)?;
        match self.lock()?.remove(&event_id) {
            Some(_) => Ok(()),
            None => Err(InfraError::NotFound(event_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_event(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: format!("Event {id}"),
            interval: Interval::new(fixed_time(start), fixed_time(end)),
            is_all_day: false,
            calendar_ref: "work".to_string(),
            last_modified: fixed_time("2026-02-15T00:00:00Z"),
        }
    }

    fn monday() -> Interval {
        Interval::new(
            fixed_time("2026-02-16T00:00:00Z"),
            fixed_time("2026-02-17T00:00:00Z"),
        )
    }

    #[tokio::test]
    async fn load_events_returns_overlapping_events_in_start_order() {
        let store = InMemoryEventStore::with_events([
            sample_event("late", "2026-02-16T15:00:00Z", "2026-02-16T16:00:00Z"),
            sample_event("early", "2026-02-16T08:00:00Z", "2026-02-16T09:00:00Z"),
            sample_event("other-day", "2026-02-18T08:00:00Z", "2026-02-18T09:00:00Z"),
            sample_event("broken", "2026-02-16T11:00:00Z", "2026-02-16T10:00:00Z"),
        ]);

        let loaded = store.load_events(monday()).await.expect("load events");
        let ids: Vec<&str> = loaded.iter().map(|event| event.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "broken", "late"]);
    }

    #[tokio::test]
    async fn create_assigns_id_and_default_calendar() {
        let store = InMemoryEventStore::default();
        let draft = EventDraft::untitled(Interval::new(
            fixed_time("2026-02-16T14:00:00Z"),
            fixed_time("2026-02-16T15:00:00Z"),
        ));

        let created = store.create_event(&draft).await.expect("create event");
        assert_eq!(created.id, "evt-1");
        assert_eq!(created.calendar_ref, DEFAULT_CALENDAR_REF);
        assert_eq!(
            store.get("evt-1").expect("read store"),
            Some(created.clone())
        );
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_event() {
        let store = InMemoryEventStore::with_events([sample_event(
            "evt-9",
            "2026-02-16T09:00:00Z",
            "2026-02-16T10:00:00Z",
        )]);

        let mut moved = sample_event("evt-9", "2026-02-16T10:00:00Z", "2026-02-16T11:00:00Z");
        store.update_event(&moved).await.expect("update existing");
        let stored = store.get("evt-9").expect("read store").expect("event exists");
        assert_eq!(stored.interval, moved.interval);

        moved.id = "missing".to_string();
        assert!(matches!(
            store.update_event(&moved).await,
            Err(InfraError::NotFound(_))
        ));

        store.delete_event("evt-9").await.expect("delete existing");
        assert!(matches!(
            store.delete_event("evt-9").await,
            Err(InfraError::NotFound(_))
        ));
        assert!(matches!(
            store.delete_event("  ").await,
            Err(InfraError::Rejected(_))
        ));
    }
}
