use crate::domain::models::{CalendarEvent, Interval, PlacedRect, Placement, Reminder};
use crate::domain::time_grid::TimeGrid;
use chrono::{DateTime, Utc};
use log::warn;

pub const DEFAULT_MINIMUM_RENDER_HEIGHT: f64 = 20.0;

/// Horizontal extent of one day column in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnFrame {
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayColumn {
    pub grid: TimeGrid,
    pub frame: ColumnFrame,
}

impl DayColumn {
    /// Lays grids side by side starting at `origin_x`.
    pub fn row(
        grids: impl IntoIterator<Item = TimeGrid>,
        origin_x: f64,
        column_width: f64,
    ) -> Vec<DayColumn> {
        grids
            .into_iter()
            .enumerate()
            .map(|(index, grid)| DayColumn {
                grid,
                frame: ColumnFrame {
                    x: origin_x + index as f64 * column_width,
                    width: column_width,
                },
            })
            .collect()
    }

    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.frame.x && x < self.frame.x + self.frame.width
    }
}

/// A stored interval that cannot be laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub event_id: String,
    pub interval: Interval,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayLayout {
    pub placements: Vec<Placement>,
    pub rects: Vec<PlacedRect>,
    pub all_day: Vec<String>,
    pub warnings: Vec<IntegrityWarning>,
}

impl DayLayout {
    pub fn placement(&self, event_id: &str) -> Option<&Placement> {
        self.placements
            .iter()
            .find(|placement| placement.event_id == event_id)
    }

    pub fn rect(&self, event_id: &str) -> Option<&PlacedRect> {
        self.rects.iter().find(|rect| rect.event_id == event_id)
    }
}

struct Slot<'a> {
    id: &'a str,
    interval: Interval,
}

/// Clusters overlapping intervals and assigns each one a column.
///
/// Intervals are swept in `(start, end)` order. An interval joins the open
/// cluster while it starts before the latest end seen in that cluster; inside a
/// cluster it takes the first column whose last end is `<=` its start. Every
/// member of a cluster reports the number of columns that cluster opened.
pub fn assign_columns<'a>(items: impl IntoIterator<Item = (&'a str, Interval)>) -> Vec<Placement> {
    sweep_columns(items)
        .into_iter()
        .map(|(_, placement)| placement)
        .collect()
}

/// Column sweep that keeps each placement paired with the interval it was
/// computed from.
fn sweep_columns<'a>(
    items: impl IntoIterator<Item = (&'a str, Interval)>,
) -> Vec<(Interval, Placement)> {
    let mut slots: Vec<Slot<'a>> = items
        .into_iter()
        .map(|(id, interval)| Slot { id, interval })
        .collect();
    slots.sort_by(|left, right| {
        left.interval
            .start
            .cmp(&right.interval.start)
            .then(left.interval.end.cmp(&right.interval.end))
            .then_with(|| left.id.cmp(right.id))
    });

    let mut placements = Vec::with_capacity(slots.len());
    let mut cluster: Vec<(&Slot<'a>, usize)> = Vec::new();
    let mut column_ends: Vec<DateTime<Utc>> = Vec::new();
    let mut cluster_end: Option<DateTime<Utc>> = None;

    for slot in &slots {
        let joins = cluster_end.is_some_and(|end| slot.interval.start < end);
        if !joins {
            close_cluster(&mut cluster, &mut column_ends, &mut placements);
        }

        let column = match column_ends
            .iter()
            .position(|end| *end <= slot.interval.start)
        {
            Some(column) => {
                column_ends[column] = slot.interval.end;
                column
            }
            None => {
                column_ends.push(slot.interval.end);
                column_ends.len() - 1
            }
        };
        cluster.push((slot, column));
        cluster_end = Some(match cluster_end {
            Some(end) if joins => end.max(slot.interval.end),
            _ => slot.interval.end,
        });
    }
    close_cluster(&mut cluster, &mut column_ends, &mut placements);

    placements
}

fn close_cluster(
    cluster: &mut Vec<(&Slot<'_>, usize)>,
    column_ends: &mut Vec<DateTime<Utc>>,
    placements: &mut Vec<(Interval, Placement)>,
) {
    let total_columns = column_ends.len().max(1);
    placements.extend(cluster.drain(..).map(|(slot, column)| {
        (
            slot.interval,
            Placement {
                event_id: slot.id.to_string(),
                column,
                total_columns,
            },
        )
    }));
    column_ends.clear();
}

/// Lays out the timed events of one day column. All-day events are listed
/// separately and malformed intervals are skipped with a warning.
pub fn layout_day(
    events: &[CalendarEvent],
    column: &DayColumn,
    minimum_render_height: f64,
) -> DayLayout {
    let day = column.grid.day_bounds();
    let mut layout = DayLayout::default();
    let mut all_day: Vec<(&str, &str)> = Vec::new();
    let mut timed: Vec<(&str, Interval)> = Vec::new();

    for event in events {
        if !event.interval.is_well_formed() {
            if event.interval.start >= day.start && event.interval.start < day.end {
                warn!(
                    target: "calendar_timeline::layout",
                    "excluding event_id={} from layout: end {} is not after start {}",
                    event.id,
                    event.interval.end.to_rfc3339(),
                    event.interval.start.to_rfc3339()
                );
                layout.warnings.push(IntegrityWarning {
                    event_id: event.id.clone(),
                    interval: event.interval,
                });
            }
            continue;
        }
        if event.is_all_day {
            if event.interval.overlaps(&day) {
                all_day.push((event.title.as_str(), event.id.as_str()));
            }
            continue;
        }
        if let Some(clamped) = event.interval.clamp_to(&day) {
            timed.push((event.id.as_str(), clamped));
        }
    }

    all_day.sort();
    layout.all_day = all_day.into_iter().map(|(_, id)| id.to_string()).collect();

    for (interval, placement) in sweep_columns(timed) {
        layout.rects.push(place_rect(
            &placement,
            &interval,
            column,
            minimum_render_height,
        ));
        layout.placements.push(placement);
    }
    layout
}

/// Lays out each day column independently; clusters never span columns.
pub fn layout_week(
    events: &[CalendarEvent],
    columns: &[DayColumn],
    minimum_render_height: f64,
) -> Vec<DayLayout> {
    columns
        .iter()
        .map(|column| layout_day(events, column, minimum_render_height))
        .collect()
}

/// Timed reminders always render single-column at full width and are never
/// clustered with events or with each other.
pub fn layout_reminders(
    reminders: &[Reminder],
    column: &DayColumn,
    minimum_render_height: f64,
) -> DayLayout {
    let day = column.grid.day_bounds();
    let mut layout = DayLayout::default();

    for reminder in reminders {
        if !reminder.interval.is_well_formed() {
            if reminder.interval.start >= day.start && reminder.interval.start < day.end {
                warn!(
                    target: "calendar_timeline::layout",
                    "excluding reminder_id={} from layout: malformed interval",
                    reminder.id
                );
                layout.warnings.push(IntegrityWarning {
                    event_id: reminder.id.clone(),
                    interval: reminder.interval,
                });
            }
            continue;
        }
        if reminder.is_all_day {
            if reminder.interval.overlaps(&day) {
                layout.all_day.push(reminder.id.clone());
            }
            continue;
        }
        let Some(clamped) = reminder.interval.clamp_to(&day) else {
            continue;
        };
        let placement = Placement {
            event_id: reminder.id.clone(),
            column: 0,
            total_columns: 1,
        };
        layout.rects.push(place_rect(
            &placement,
            &clamped,
            column,
            minimum_render_height,
        ));
        layout.placements.push(placement);
    }

    layout
}

fn place_rect(
    placement: &Placement,
    interval: &Interval,
    column: &DayColumn,
    minimum_render_height: f64,
) -> PlacedRect {
    let slot_width = column.frame.width / placement.total_columns.max(1) as f64;
    let grid = &column.grid;
    PlacedRect {
        event_id: placement.event_id.clone(),
        x: column.frame.x + placement.column as f64 * slot_width,
        y: grid.pixel_height(interval.start - grid.day_start()),
        width: slot_width,
        height: grid
            .pixel_height(interval.duration())
            .max(minimum_render_height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day_column() -> DayColumn {
        DayColumn {
            grid: TimeGrid::new(fixed_time("2026-02-16T00:00:00Z"), 60.0),
            frame: ColumnFrame {
                x: 0.0,
                width: 300.0,
            },
        }
    }

    fn sample_event(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: format!("Event {id}"),
            interval: Interval::new(
                fixed_time(&format!("2026-02-16T{start}:00Z")),
                fixed_time(&format!("2026-02-16T{end}:00Z")),
            ),
            is_all_day: false,
            calendar_ref: "work".to_string(),
            last_modified: fixed_time("2026-02-15T00:00:00Z"),
        }
    }

    #[test]
    fn overlapping_pair_shares_cluster_and_lone_event_is_full_width() {
        let events = vec![
            sample_event("a", "09:00", "10:00"),
            sample_event("b", "09:30", "10:30"),
            sample_event("c", "11:00", "11:30"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);

        let a = layout.placement("a").expect("a placed");
        let b = layout.placement("b").expect("b placed");
        let c = layout.placement("c").expect("c placed");
        assert_eq!((a.column, a.total_columns), (0, 2));
        assert_eq!((b.column, b.total_columns), (1, 2));
        assert_eq!((c.column, c.total_columns), (0, 1));

        let rect_b = layout.rect("b").expect("b rect");
        assert_eq!(rect_b.x, 150.0);
        assert_eq!(rect_b.width, 150.0);
        assert_eq!(rect_b.y, 9.5 * 60.0);
        assert_eq!(rect_b.height, 60.0);
        assert_eq!(layout.rect("c").expect("c rect").width, 300.0);
    }

    #[test]
    fn column_is_reused_once_previous_event_ends() {
        let events = vec![
            sample_event("a", "09:00", "10:00"),
            sample_event("b", "09:30", "10:30"),
            sample_event("c", "10:00", "11:00"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);

        let c = layout.placement("c").expect("c placed");
        assert_eq!(c.column, 0);
        assert_eq!(c.total_columns, 2);
        assert_eq!(layout.placement("a").expect("a placed").total_columns, 2);
    }

    #[test]
    fn touching_events_form_separate_clusters() {
        let events = vec![
            sample_event("a", "09:00", "10:00"),
            sample_event("b", "10:00", "11:00"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert!(layout
            .placements
            .iter()
            .all(|placement| placement.column == 0 && placement.total_columns == 1));
    }

    #[test]
    fn chained_overlaps_open_three_columns() {
        let events = vec![
            sample_event("a", "09:00", "12:00"),
            sample_event("b", "09:15", "10:00"),
            sample_event("c", "09:30", "10:30"),
            sample_event("d", "10:00", "10:45"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        let columns: HashMap<&str, (usize, usize)> = layout
            .placements
            .iter()
            .map(|placement| {
                (
                    placement.event_id.as_str(),
                    (placement.column, placement.total_columns),
                )
            })
            .collect();
        assert_eq!(columns["a"], (0, 3));
        assert_eq!(columns["b"], (1, 3));
        assert_eq!(columns["c"], (2, 3));
        assert_eq!(columns["d"], (1, 3));
    }

    #[test]
    fn each_rect_uses_its_own_interval_when_ids_repeat() {
        let events = vec![
            sample_event("recurring", "09:00", "10:00"),
            sample_event("recurring", "14:00", "15:30"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);

        let geometry: Vec<(f64, f64)> = layout
            .rects
            .iter()
            .map(|rect| (rect.y, rect.height))
            .collect();
        assert_eq!(geometry, vec![(540.0, 60.0), (840.0, 90.0)]);
        assert_eq!(layout.placements.len(), 2);
    }

    #[test]
    fn short_events_keep_minimum_render_height() {
        let events = vec![sample_event("a", "09:00", "09:05")];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert_eq!(
            layout.rect("a").expect("a rect").height,
            DEFAULT_MINIMUM_RENDER_HEIGHT
        );
    }

    #[test]
    fn all_day_events_are_listed_separately() {
        let mut holiday = sample_event("holiday", "00:00", "23:59");
        holiday.is_all_day = true;
        holiday.title = "Holiday".to_string();
        let mut offsite = sample_event("offsite", "00:00", "23:59");
        offsite.is_all_day = true;
        offsite.title = "Company offsite".to_string();
        let events = vec![holiday, offsite, sample_event("a", "09:00", "10:00")];

        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert_eq!(layout.all_day, vec!["offsite".to_string(), "holiday".to_string()]);
        assert_eq!(layout.placements.len(), 1);
    }

    #[test]
    fn malformed_intervals_are_reported_and_skipped() {
        let events = vec![
            sample_event("broken", "10:00", "09:00"),
            sample_event("a", "09:00", "10:00"),
        ];
        let layout = layout_day(&events, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert_eq!(layout.warnings.len(), 1);
        assert_eq!(layout.warnings[0].event_id, "broken");
        assert!(layout.placement("broken").is_none());
        assert_eq!(layout.placement("a").expect("a placed").total_columns, 1);
    }

    #[test]
    fn overnight_events_are_clamped_to_the_day() {
        let mut overnight = sample_event("late", "23:00", "23:30");
        overnight.interval.end = fixed_time("2026-02-17T02:00:00Z");
        let mut tomorrow = sample_event("tomorrow", "09:00", "10:00");
        tomorrow.interval = tomorrow.interval.shifted(24 * 60).expect("shift by a day");

        let layout = layout_day(
            &[overnight, tomorrow],
            &day_column(),
            DEFAULT_MINIMUM_RENDER_HEIGHT,
        );
        let rect = layout.rect("late").expect("late rect");
        assert_eq!(rect.y, 23.0 * 60.0);
        assert_eq!(rect.height, 60.0);
        assert!(layout.placement("tomorrow").is_none());
    }

    #[test]
    fn reminders_render_single_column() {
        let reminders = vec![
            Reminder {
                id: "r1".to_string(),
                title: "Call back".to_string(),
                interval: Interval::new(
                    fixed_time("2026-02-16T09:00:00Z"),
                    fixed_time("2026-02-16T09:30:00Z"),
                ),
                is_all_day: false,
            },
            Reminder {
                id: "r2".to_string(),
                title: "Pay invoice".to_string(),
                interval: Interval::new(
                    fixed_time("2026-02-16T09:15:00Z"),
                    fixed_time("2026-02-16T09:45:00Z"),
                ),
                is_all_day: false,
            },
        ];
        let layout = layout_reminders(&reminders, &day_column(), DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert_eq!(layout.rects.len(), 2);
        assert!(layout
            .rects
            .iter()
            .all(|rect| rect.x == 0.0 && rect.width == 300.0));
    }

    #[test]
    fn week_columns_are_laid_out_independently() {
        let monday = TimeGrid::new(fixed_time("2026-02-16T00:00:00Z"), 60.0);
        let tuesday = TimeGrid::new(fixed_time("2026-02-17T00:00:00Z"), 60.0);
        let columns = DayColumn::row([monday, tuesday], 40.0, 100.0);

        let mut tuesday_event = sample_event("t", "09:00", "10:00");
        tuesday_event.interval = tuesday_event
            .interval
            .shifted(24 * 60)
            .expect("shift by a day");
        let events = vec![
            sample_event("a", "09:00", "10:00"),
            sample_event("b", "09:30", "10:30"),
            tuesday_event,
        ];

        let layouts = layout_week(&events, &columns, DEFAULT_MINIMUM_RENDER_HEIGHT);
        assert_eq!(layouts.len(), 2);
        assert_eq!(layouts[0].placements.len(), 2);
        let tuesday_rect = layouts[1].rect("t").expect("tuesday rect");
        assert_eq!(tuesday_rect.x, 140.0);
        assert_eq!(tuesday_rect.width, 100.0);
        assert_eq!(tuesday_rect.y, 9.0 * 60.0);
    }

    fn arbitrary_intervals() -> impl Strategy<Value = Vec<(i64, i64)>> {
        prop::collection::vec((0i64..1380, 1i64..240), 0..40)
    }

    fn find(parent: &mut Vec<usize>, index: usize) -> usize {
        let mut root = index;
        while parent[root] != root {
            root = parent[root];
        }
        parent[index] = root;
        root
    }

    proptest! {
        #[test]
        fn overlapping_events_never_share_a_column(raw in arbitrary_intervals()) {
            let day_start = fixed_time("2026-02-16T00:00:00Z");
            let ids: Vec<String> = (0..raw.len()).map(|index| format!("evt-{index}")).collect();
            let intervals: Vec<Interval> = raw
                .iter()
                .map(|(start, length)| Interval::new(
                    day_start + Duration::minutes(*start),
                    day_start + Duration::minutes(start + length),
                ))
                .collect();
            let placements = assign_columns(
                ids.iter().map(String::as_str).zip(intervals.iter().copied()),
            );
            prop_assert_eq!(placements.len(), raw.len());

            let by_id: HashMap<&str, &Placement> = placements
                .iter()
                .map(|placement| (placement.event_id.as_str(), placement))
                .collect();

            let mut parent: Vec<usize> = (0..raw.len()).collect();
            for left in 0..raw.len() {
                let left_placement = by_id[ids[left].as_str()];
                prop_assert!(left_placement.column < left_placement.total_columns);
                for right in (left + 1)..raw.len() {
                    if intervals[left].overlaps(&intervals[right]) {
                        let right_placement = by_id[ids[right].as_str()];
                        prop_assert_ne!(left_placement.column, right_placement.column);
                        prop_assert_eq!(left_placement.total_columns, right_placement.total_columns);
                        let (a, b) = (find(&mut parent, left), find(&mut parent, right));
                        parent[a] = b;
                    }
                }
            }

            let mut clusters: HashMap<usize, Vec<&Placement>> = HashMap::new();
            for index in 0..raw.len() {
                let root = find(&mut parent, index);
                clusters.entry(root).or_default().push(by_id[ids[index].as_str()]);
            }
            for members in clusters.values() {
                let total = members[0].total_columns;
                prop_assert!(members.iter().all(|member| member.total_columns == total));
                let mut used: Vec<usize> = members.iter().map(|member| member.column).collect();
                used.sort_unstable();
                used.dedup();
                prop_assert_eq!(used.len(), total);
            }
        }
    }
}
