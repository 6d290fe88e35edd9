use crate::application::error::TimelineError;
use crate::domain::models::{
    add_delta, minutes_delta, CalendarEvent, EventDraft, Interval, ResizeEdge, ValidationError,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_store::EventStore;
use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration as TokioDuration};

const LOG_TARGET: &str = "calendar_timeline::mutation";
const DRAFT_ID_PREFIX: &str = "draft-";

pub const DEFAULT_MINIMUM_DURATION_MINUTES: i64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationSettings {
    pub minimum_duration_minutes: i64,
    pub retry_policy: RetryPolicy,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            minimum_duration_minutes: DEFAULT_MINIMUM_DURATION_MINUTES,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// An edit intent coming out of a gesture or an editor.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Move {
        event_id: String,
        delta_minutes: i64,
    },
    Resize {
        event_id: String,
        edge: ResizeEdge,
        delta_minutes: i64,
    },
    Create {
        draft: EventDraft,
    },
    /// Creates an untitled event over the selection; too-short selections are dropped.
    RangeSelect {
        interval: Interval,
    },
    Delete {
        event_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Dispatched {
        event_id: String,
    },
    /// Another commit for the same event is outstanding; this intent waits behind it.
    Queued {
        event_id: String,
        replaced_pending: bool,
    },
    Discarded,
}

#[derive(Debug)]
pub enum CommitOutcome {
    Confirmed {
        event_id: String,
    },
    Created {
        draft_id: String,
        event: CalendarEvent,
    },
    Deleted {
        event_id: String,
    },
    RolledBack {
        event_id: String,
        error: TimelineError,
        dropped_pending: bool,
    },
}

#[derive(Debug, Clone)]
enum Request {
    Create(EventDraft),
    Update(CalendarEvent),
    Delete(String),
}

impl Request {
    fn kind(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    /// Re-targets an intent queued against a draft onto the event the store
    /// created. Only the locally edited fields survive; everything else comes
    /// from the stored record.
    fn rebase(self, stored: &CalendarEvent) -> Self {
        match self {
            Self::Update(edited) => Self::Update(CalendarEvent {
                title: edited.title,
                interval: edited.interval,
                ..stored.clone()
            }),
            Self::Delete(_) => Self::Delete(stored.id.clone()),
            create @ Self::Create(_) => create,
        }
    }
}

#[derive(Debug)]
enum Response {
    Created(CalendarEvent),
    Updated,
    Deleted,
}

#[derive(Debug)]
struct Completion {
    key: String,
    revision: u64,
    result: Result<Response, InfraError>,
}

struct InFlight {
    revision: u64,
    snapshot: Option<CalendarEvent>,
    sent: Option<CalendarEvent>,
    handle: JoinHandle<()>,
}

/// Applies edits optimistically and commits them to the event store.
///
/// At most one commit per event id is outstanding. Intents arriving meanwhile
/// are applied locally and queued; a newer queued intent replaces an older
/// one. Every commit carries a revision, and responses whose revision is no
/// longer the outstanding one are ignored.
///
/// Commits are spawned on the ambient tokio runtime, so `submit` must be
/// called from within one.
pub struct MutationCoordinator<S>
where
    S: EventStore + 'static,
{
    store: Arc<S>,
    settings: MutationSettings,
    events: HashMap<String, CalendarEvent>,
    in_flight: HashMap<String, InFlight>,
    queued: HashMap<String, Request>,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    next_revision: u64,
    next_draft: u64,
}

impl<S> MutationCoordinator<S>
where
    S: EventStore + 'static,
{
    pub fn new(store: Arc<S>, settings: MutationSettings) -> Self {
        let (completions_tx, completions_rx) = unbounded_channel();
        Self {
            store,
            settings,
            events: HashMap::new(),
            in_flight: HashMap::new(),
            queued: HashMap::new(),
            completions_tx,
            completions_rx,
            next_revision: 0,
            next_draft: 0,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn event(&self, event_id: &str) -> Option<&CalendarEvent> {
        self.events.get(event_id)
    }

    /// Local view of all events, optimistic edits included, in start order.
    pub fn events(&self) -> Vec<CalendarEvent> {
        let mut events: Vec<CalendarEvent> = self.events.values().cloned().collect();
        events.sort_by(|left, right| {
            left.interval
                .start
                .cmp(&right.interval.start)
                .then_with(|| left.id.cmp(&right.id))
        });
        events
    }

    pub fn is_pending(&self, event_id: &str) -> bool {
        self.in_flight.contains_key(event_id) || self.queued.contains_key(event_id)
    }

    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Replaces the local view with freshly loaded events, keeping the local
    /// copy of any event that still has an outstanding commit.
    pub fn replace_events(&mut self, events: Vec<CalendarEvent>) {
        let pending: Vec<(String, Option<CalendarEvent>)> = self
            .in_flight
            .keys()
            .chain(self.queued.keys())
            .map(|key| (key.clone(), self.events.get(key).cloned()))
            .collect();

        self.events = events
            .into_iter()
            .map(|event| (event.id.clone(), event))
            .collect();
        for (key, local) in pending {
            self.apply_local(&key, local);
        }
    }

    pub fn submit(&mut self, mutation: Mutation) -> Result<Submission, TimelineError> {
        let minimum = self.settings.minimum_duration_minutes;
        let (key, next_state, request) = match mutation {
            Mutation::Move {
                event_id,
                delta_minutes,
            } => {
                let current = self.editable(&event_id)?;
                let interval = current.interval.shifted(delta_minutes)?;
                interval.validate(minimum)?;
                let updated = CalendarEvent {
                    interval,
                    ..current.clone()
                };
                (event_id, Some(updated.clone()), Request::Update(updated))
            }
            Mutation::Resize {
                event_id,
                edge,
                delta_minutes,
            } => {
                let current = self.editable(&event_id)?;
                let interval = resized_interval(&current.interval, edge, delta_minutes, minimum)?;
                interval.validate(minimum)?;
                let updated = CalendarEvent {
                    interval,
                    ..current.clone()
                };
                (event_id, Some(updated.clone()), Request::Update(updated))
            }
            Mutation::Create { draft } => {
                draft.interval.validate(minimum)?;
                self.prepare_create(draft)
            }
            Mutation::RangeSelect { interval } => {
                if interval.validate(minimum).is_err() {
                    debug!(
                        target: LOG_TARGET,
                        "discarding range selection shorter than {minimum} minutes"
                    );
                    return Ok(Submission::Discarded);
                }
                self.prepare_create(EventDraft::untitled(interval))
            }
            Mutation::Delete { event_id } => {
                if !self.events.contains_key(&event_id) {
                    return Err(TimelineError::UnknownEvent(event_id));
                }
                (event_id.clone(), None, Request::Delete(event_id))
            }
        };

        if self.in_flight.contains_key(&key) {
            self.apply_local(&key, next_state);
            let replaced_pending = self.queued.insert(key.clone(), request).is_some();
            if replaced_pending {
                info!(
                    target: LOG_TARGET,
                    "newer edit replaced queued edit for event_id={key}"
                );
            }
            return Ok(Submission::Queued {
                event_id: key,
                replaced_pending,
            });
        }

        let snapshot = self.events.get(&key).cloned();
        self.apply_local(&key, next_state);
        self.dispatch(key.clone(), request, snapshot);
        Ok(Submission::Dispatched { event_id: key })
    }

    /// Applies every completion that has already arrived. Never blocks.
    pub fn poll_outcomes(&mut self) -> Vec<CommitOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(outcome) = self.apply_completion(completion) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Waits for the next outstanding commit to settle; `None` once nothing is outstanding.
    pub async fn next_outcome(&mut self) -> Option<CommitOutcome> {
        while !self.in_flight.is_empty() {
            let completion = self.completions_rx.recv().await?;
            if let Some(outcome) = self.apply_completion(completion) {
                return Some(outcome);
            }
        }
        None
    }

    /// Aborts every outstanding commit. Responses that still arrive are ignored.
    pub fn shutdown(&mut self) {
        let aborted = self.in_flight.len();
        for (_, in_flight) in self.in_flight.drain() {
            in_flight.handle.abort();
        }
        self.queued.clear();
        if aborted > 0 {
            info!(target: LOG_TARGET, "aborted {aborted} outstanding commits");
        }
    }

    fn editable(&self, event_id: &str) -> Result<&CalendarEvent, TimelineError> {
        let event = self
            .events
            .get(event_id)
            .ok_or_else(|| TimelineError::UnknownEvent(event_id.to_string()))?;
        if event.is_all_day {
            return Err(ValidationError::AllDayNotEditable.into());
        }
        Ok(event)
    }

    fn prepare_create(&mut self, draft: EventDraft) -> (String, Option<CalendarEvent>, Request) {
        self.next_draft += 1;
        let key = format!("{DRAFT_ID_PREFIX}{}", self.next_draft);
        let local = CalendarEvent {
            id: key.clone(),
            title: draft.title.clone(),
            interval: draft.interval,
            is_all_day: false,
            calendar_ref: draft.calendar_ref.clone().unwrap_or_default(),
            last_modified: Utc::now(),
        };
        (key, Some(local), Request::Create(draft))
    }

    fn apply_local(&mut self, key: &str, state: Option<CalendarEvent>) {
        match state {
            Some(event) => {
                self.events.insert(key.to_string(), event);
            }
            None => {
                self.events.remove(key);
            }
        }
    }

    fn dispatch(&mut self, key: String, request: Request, snapshot: Option<CalendarEvent>) {
        self.next_revision += 1;
        let revision = self.next_revision;
        let sent = match &request {
            Request::Update(event) => Some(event.clone()),
            Request::Create(_) | Request::Delete(_) => None,
        };
        info!(
            target: LOG_TARGET,
            "dispatching {} for event_id={key} revision={revision}",
            request.kind()
        );

        let store = Arc::clone(&self.store);
        let retry_policy = self.settings.retry_policy.clone();
        let completions = self.completions_tx.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = execute_with_retry(store.as_ref(), &request, &retry_policy).await;
            let _ = completions.send(Completion {
                key: task_key,
                revision,
                result,
            });
        });

        self.in_flight.insert(
            key,
            InFlight {
                revision,
                snapshot,
                sent,
                handle,
            },
        );
    }

    fn apply_completion(&mut self, completion: Completion) -> Option<CommitOutcome> {
        let Completion {
            key,
            revision,
            result,
        } = completion;
        let is_current = self
            .in_flight
            .get(&key)
            .is_some_and(|in_flight| in_flight.revision == revision);
        if !is_current {
            debug!(
                target: LOG_TARGET,
                "ignoring stale response for event_id={key} revision={revision}"
            );
            return None;
        }
        let in_flight = self.in_flight.remove(&key)?;

        match result {
            Ok(Response::Created(stored)) => {
                info!(
                    target: LOG_TARGET,
                    "created event_id={} from draft_id={key}",
                    stored.id
                );
                self.events.remove(&key);
                match self.queued.remove(&key) {
                    Some(request) => {
                        let request = request.rebase(&stored);
                        if let Request::Update(rebased) = &request {
                            self.events.insert(stored.id.clone(), rebased.clone());
                        }
                        self.dispatch(stored.id.clone(), request, Some(stored.clone()));
                    }
                    None => {
                        self.events.insert(stored.id.clone(), stored.clone());
                    }
                }
                Some(CommitOutcome::Created {
                    draft_id: key,
                    event: stored,
                })
            }
            Ok(response) => {
                info!(
                    target: LOG_TARGET,
                    "confirmed commit for event_id={key} revision={revision}"
                );
                if let Some(request) = self.queued.remove(&key) {
                    self.dispatch(key.clone(), request, in_flight.sent);
                }
                Some(match response {
                    Response::Deleted => CommitOutcome::Deleted { event_id: key },
                    Response::Updated | Response::Created(_) => {
                        CommitOutcome::Confirmed { event_id: key }
                    }
                })
            }
            Err(error) => {
                let dropped_pending = self.queued.remove(&key).is_some();
                self.apply_local(&key, in_flight.snapshot);
                warn!(
                    target: LOG_TARGET,
                    "rolled back event_id={key} revision={revision}: {error}"
                );
                Some(CommitOutcome::RolledBack {
                    event_id: key.clone(),
                    error: TimelineError::Collaborator {
                        event_id: key,
                        source: error,
                    },
                    dropped_pending,
                })
            }
        }
    }
}

impl<S> Drop for MutationCoordinator<S>
where
    S: EventStore + 'static,
{
    fn drop(&mut self) {
        for in_flight in self.in_flight.values() {
            in_flight.handle.abort();
        }
    }
}

/// Moves one edge by `delta_minutes`. The touched edge always lands where the
/// pointer put it; when that leaves less than `minimum_minutes`, the untouched
/// edge is pushed along to keep the minimum duration.
pub fn resized_interval(
    interval: &Interval,
    edge: ResizeEdge,
    delta_minutes: i64,
    minimum_minutes: i64,
) -> Result<Interval, ValidationError> {
    let delta = minutes_delta(delta_minutes)?;
    let minimum = minutes_delta(minimum_minutes.max(1))?;
    match edge {
        ResizeEdge::Top => {
            let start = add_delta(interval.start, delta)?;
            let earliest_end = add_delta(start, minimum)?;
            Ok(Interval::new(start, interval.end.max(earliest_end)))
        }
        ResizeEdge::Bottom => {
            let end = add_delta(interval.end, delta)?;
            let latest_start = add_delta(end, -minimum)?;
            Ok(Interval::new(interval.start.min(latest_start), end))
        }
    }
}

async fn execute_with_retry<S>(
    store: &S,
    request: &Request,
    retry_policy: &RetryPolicy,
) -> Result<Response, InfraError>
where
    S: EventStore + ?Sized,
{
    let max_attempts = retry_policy.max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        match execute(store, request).await {
            Ok(response) => return Ok(response),
            Err(error) if error.is_transient() && attempt + 1 < max_attempts => {
                let delay = retry_policy
                    .base_delay_ms
                    .saturating_mul(2u64.saturating_pow(attempt as u32));
                warn!(
                    target: LOG_TARGET,
                    "retrying {} in {delay}ms after transient failure: {error}",
                    request.kind()
                );
                sleep(TokioDuration::from_millis(delay)).await;
                attempt = attempt.saturating_add(1);
            }
            Err(error) => return Err(error),
        }
    }
}

async fn execute<S>(store: &S, request: &Request) -> Result<Response, InfraError>
where
    S: EventStore + ?Sized,
{
    match request {
        Request::Create(draft) => store.create_event(draft).await.map(Response::Created),
        Request::Update(event) => store.update_event(event).await.map(|()| Response::Updated),
        Request::Delete(event_id) => store
            .delete_event(event_id)
            .await
            .map(|()| Response::Deleted),
    }
}
