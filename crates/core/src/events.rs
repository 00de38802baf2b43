//! Event collector: the ordered per-track event lists the scheduler consumes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::layout::layout_track;
use crate::model::{EventBinding, EventId, TimelineEvent, Track};

/// Allocator for event and marker ids, shared by every track of a run so
/// ids stay unique across queues, injections and concurrently running
/// per-track loops.
#[derive(Debug, Default, Clone)]
pub struct EventIds {
    next: Arc<AtomicU64>,
}

impl EventIds {
    pub fn next_id(&self) -> EventId {
        EventId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Lay out `track` and return its events sorted by position, followed by
/// the synthetic `EndOfAnimation` at the track's total width.
///
/// Ties keep discovery order.
pub fn collect_track_events(
    track: &mut Track,
    config: &Config,
    ids: &EventIds,
) -> Vec<TimelineEvent> {
    let mut events = layout_track(track, config, ids);
    sort_by_position(&mut events);

    let width = track.width();
    events.push(TimelineEvent {
        id: ids.next_id(),
        track: track.id,
        position: width,
        relative: width,
        owner: track.tree.root(),
        span: None,
        binding: EventBinding::end_of_animation(),
    });
    events
}

/// Stable ascending sort by absolute position.
pub fn sort_by_position(events: &mut [TimelineEvent]) {
    events.sort_by(|a, b| a.position.total_cmp(&b.position));
}

/// Concatenate per-track lists (in track order) and sort globally.
pub fn merge_queues(queues: Vec<Vec<TimelineEvent>>) -> Vec<TimelineEvent> {
    let mut merged: Vec<TimelineEvent> = queues.into_iter().flatten().collect();
    sort_by_position(&mut merged);
    merged
}
