use std::collections::BTreeMap;

use futures_util::future::join_all;
use stepreel_protocol::{AnimProperty, AnimTarget, Easing, MarkerKind, RenderCommand};
use tokio::time::sleep;

use super::sink::{CommandSink, ResumeSignal};
use super::{CaptionChange, ConsumedEvent, RunReport, SchedulerError};
use crate::config::{Config, millis};
use crate::events::EventIds;
use crate::model::{EventKind, PauseLength, RunState, Suspend, TimelineEvent, Track, TrackId};

/// A track together with its live scroll position (distance the "now"
/// cursor has travelled from the start of the root frame).
#[derive(Debug)]
pub(super) struct Lane<'a> {
    pub(super) track: &'a mut Track,
    pub(super) position: f64,
    pub(super) finished: bool,
}

impl<'a> Lane<'a> {
    pub(super) fn new(track: &'a mut Track) -> Self {
        Self {
            track,
            position: 0.0,
            finished: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Mode {
    All,
    Exclusive(TrackId),
}

/// One scheduler over one event queue.
///
/// Synchronous runs drive every lane from the merged queue; independent runs
/// build one loop per track and join them.
pub(super) struct EventLoop<'a> {
    pub(super) config: &'a Config,
    pub(super) sink: &'a CommandSink,
    pub(super) ids: &'a EventIds,
    pub(super) resume: Option<&'a ResumeSignal>,
    pub(super) lanes: Vec<Lane<'a>>,
    pub(super) queue: Vec<TimelineEvent>,
    /// Track the captions belong to; `None` for the shared caption.
    scope: Option<TrackId>,
    mode: Mode,
    paused: BTreeMap<TrackId, u64>,
    caption: Option<String>,
    report: RunReport,
}

impl<'a> EventLoop<'a> {
    pub(super) fn new(
        config: &'a Config,
        sink: &'a CommandSink,
        ids: &'a EventIds,
        resume: Option<&'a ResumeSignal>,
        lanes: Vec<Lane<'a>>,
        queue: Vec<TimelineEvent>,
        scope: Option<TrackId>,
    ) -> Result<Self, SchedulerError> {
        let event_loop = Self {
            config,
            sink,
            ids,
            resume,
            lanes,
            queue,
            scope,
            mode: Mode::All,
            paused: BTreeMap::new(),
            caption: None,
            report: RunReport::default(),
        };
        for event in &event_loop.queue {
            let lane = event_loop.lane_index(event)?;
            if event_loop.lanes[lane].track.tree.frame(event.owner).is_none() {
                return Err(SchedulerError::UnknownNode {
                    event: event.id,
                    node: event.owner,
                });
            }
        }
        Ok(event_loop)
    }

    pub(super) fn lane_index(&self, event: &TimelineEvent) -> Result<usize, SchedulerError> {
        self.lanes
            .iter()
            .position(|lane| lane.track.id == event.track)
            .ok_or(SchedulerError::UnknownTrack {
                event: event.id,
                track: event.track,
            })
    }

    pub(super) async fn run(mut self) -> Result<RunReport, SchedulerError> {
        self.set_caption(RunState::Running.caption());

        while let Some(event) = self.next_event()? {
            let owner = self.lane_index(&event)?;
            let running = self.running_lanes();
            self.advance(owner, &running, &event).await;
            self.record(&event);
            tracing::debug!(
                id = event.id.0,
                track = event.track.0,
                kind = ?event.kind(),
                position = event.position,
                "event reached"
            );

            if *event.kind() == EventKind::EndOfAnimation {
                self.lanes[owner].finished = true;
                if self.lanes.iter().all(|lane| lane.finished) {
                    self.finish();
                    break;
                }
                if self.mode == Mode::Exclusive(event.track) {
                    self.mode = Mode::All;
                }
                continue;
            }

            let traits = event.kind().traits();
            let remain: Vec<usize> = match traits.suspend {
                Suspend::All => Vec::new(),
                Suspend::Thread | Suspend::None => {
                    running.iter().copied().filter(|&i| i != owner).collect()
                }
            };
            match traits.suspend {
                Suspend::All => {
                    let all: Vec<usize> = (0..self.lanes.len())
                        .filter(|&i| !self.lanes[i].finished)
                        .collect();
                    for lane in all {
                        self.mark_paused(lane);
                    }
                    self.set_caption("Paused".to_string());
                }
                Suspend::Thread => self.mark_paused(owner),
                Suspend::None => {}
            }

            match traits.pause {
                PauseLength::None => {}
                PauseLength::Short => self.hold(self.config.short_pause_ms, &remain).await,
                PauseLength::Normal => self.hold(self.config.normal_pause_ms, &remain).await,
                PauseLength::Permanent => self.hold_permanent(&remain).await,
            }

            if let Some(spec) = event.binding.injection.as_deref() {
                self.inject(&event, spec, &remain).await?;
            }

            match event.kind() {
                EventKind::SetFilter(name) => {
                    let text = format!("Filter: {name}");
                    self.show_banner(event.track, text, self.config.banner_ms, &remain)
                        .await;
                }
                EventKind::SkippedBreakpoint => {
                    let text = "Condition check".to_string();
                    self.show_banner(event.track, text, self.config.tooltip_ms, &remain)
                        .await;
                }
                _ => {}
            }

            let next = &event.binding.next;
            if *next == RunState::ExecutionEnd {
                self.finish();
                break;
            }
            if next.is_exclusive() {
                self.mode = Mode::Exclusive(event.track);
                self.clear_paused(Some(event.track));
            } else {
                self.mode = Mode::All;
                self.clear_paused(None);
            }
            tracing::debug!(track = event.track.0, state = ?next, "run state switched");
            self.set_caption(next.caption());
        }

        self.report.final_positions = self
            .lanes
            .iter()
            .map(|lane| (lane.track.id, lane.position))
            .collect();
        Ok(self.report)
    }

    /// Pop the next event in world order.
    ///
    /// Keys are re-derived every step from each lane's live position, so
    /// events whose offsets were changed by an injection interleave with
    /// other tracks the way they appear on screen.
    fn next_event(&mut self) -> Result<Option<TimelineEvent>, SchedulerError> {
        let queue = std::mem::take(&mut self.queue);
        let mut keyed = Vec::with_capacity(queue.len());
        for event in queue {
            let lane = &self.lanes[self.lane_index(&event)?];
            if lane.finished {
                tracing::warn!(
                    id = event.id.0,
                    track = event.track.0,
                    position = event.position,
                    "event behind the end of its track dropped"
                );
                continue;
            }
            keyed.push((event.position - lane.position, event));
        }
        keyed.sort_by(|(ka, a), (kb, b)| {
            ka.total_cmp(kb).then_with(|| {
                let end_a = *a.kind() == EventKind::EndOfAnimation;
                let end_b = *b.kind() == EventKind::EndOfAnimation;
                end_a.cmp(&end_b)
            })
        });
        self.queue = keyed.into_iter().map(|(_, event)| event).collect();

        if self.queue.is_empty() {
            return Ok(None);
        }
        let index = match self.mode {
            Mode::All => 0,
            Mode::Exclusive(track) => self
                .queue
                .iter()
                .position(|event| event.track == track)
                .unwrap_or(0),
        };
        Ok(Some(self.queue.remove(index)))
    }

    fn running_lanes(&self) -> Vec<usize> {
        (0..self.lanes.len())
            .filter(|&i| {
                let lane = &self.lanes[i];
                !lane.finished
                    && match self.mode {
                        Mode::All => true,
                        Mode::Exclusive(track) => lane.track.id == track,
                    }
            })
            .collect()
    }

    /// Move every running lane by the distance separating the owner from
    /// `event`, at constant speed.
    async fn advance(&mut self, owner: usize, running: &[usize], event: &TimelineEvent) {
        let delta = (event.position - self.lanes[owner].position).max(0.0);
        let mut moves: Vec<(usize, f64)> = running.iter().map(|&i| (i, delta)).collect();
        if !running.contains(&owner) {
            // An exclusive mode left over from a finished lane.
            moves.push((owner, delta));
        }
        let waits = self.scroll(&moves);
        join_all(waits.into_iter().map(|ms| sleep(millis(ms)))).await;
    }

    /// Emit scroll animations for `moves` and commit the new positions.
    /// Returns the animation durations.
    pub(super) fn scroll(&mut self, moves: &[(usize, f64)]) -> Vec<f64> {
        let mut waits = Vec::with_capacity(moves.len());
        for &(index, distance) in moves {
            if distance <= 0.0 {
                continue;
            }
            let lane = &mut self.lanes[index];
            let from = self.config.cursor_x - lane.position;
            let duration_ms = self.config.travel_ms(distance);
            self.sink.emit(RenderCommand::Animate {
                target: AnimTarget::Track(lane.track.id.0),
                property: AnimProperty::X,
                from,
                to: from - distance,
                duration_ms,
                easing: Easing::Linear,
            });
            lane.position += distance;
            waits.push(duration_ms);
        }
        waits
    }

    /// Scroll `remain` lanes for as long as `ms` lasts, each stopping at its
    /// own next pending event.
    pub(super) fn drift(&mut self, ms: f64, remain: &[usize]) -> Vec<f64> {
        let reach = self.config.distance_in(ms);
        let moves: Vec<(usize, f64)> = remain
            .iter()
            .map(|&i| (i, reach.min(self.room_ahead(i))))
            .collect();
        self.scroll(&moves)
    }

    fn room_ahead(&self, lane: usize) -> f64 {
        let Lane {
            track, position, ..
        } = &self.lanes[lane];
        self.queue
            .iter()
            .filter(|event| event.track == track.id)
            .map(|event| event.position - position)
            .fold(f64::INFINITY, f64::min)
            .max(0.0)
    }

    /// Wait `ms` while `remain` lanes keep moving.
    pub(super) async fn hold(&mut self, ms: f64, remain: &[usize]) {
        let mut waits = self.drift(ms, remain);
        waits.push(ms);
        join_all(waits.into_iter().map(|ms| sleep(millis(ms)))).await;
    }

    async fn hold_permanent(&mut self, remain: &[usize]) {
        let ms = self.config.permanent_pause_ms;
        match self.resume {
            Some(signal) => {
                let waits = self.drift(ms, remain);
                tracing::debug!("waiting for resume");
                futures_util::join!(
                    signal.wait(),
                    join_all(waits.into_iter().map(|ms| sleep(millis(ms))))
                );
            }
            None => self.hold(ms, remain).await,
        }
    }

    async fn show_banner(&mut self, track: TrackId, text: String, ms: f64, remain: &[usize]) {
        self.sink.emit(RenderCommand::ShowBanner {
            track: track.0,
            text,
            duration_ms: ms,
        });
        self.hold(ms, remain).await;
    }

    fn mark_paused(&mut self, lane: usize) {
        let Lane {
            track, position, ..
        } = &self.lanes[lane];
        if self.paused.contains_key(&track.id) {
            return;
        }
        let id = self.ids.next_id().0;
        self.sink.emit(RenderCommand::AddMarker {
            id,
            track: track.id.0,
            parent: None,
            x: *position,
            kind: MarkerKind::Paused,
        });
        self.paused.insert(track.id, id);
    }

    /// Remove pause markers; only `track`'s when given.
    fn clear_paused(&mut self, track: Option<TrackId>) {
        let removed: Vec<u64> = match track {
            Some(track) => self.paused.remove(&track).into_iter().collect(),
            None => std::mem::take(&mut self.paused).into_values().collect(),
        };
        for id in removed {
            self.sink.emit(RenderCommand::RemoveMarker { id });
        }
    }

    fn set_caption(&mut self, text: String) {
        if self.caption.as_deref() == Some(text.as_str()) {
            return;
        }
        self.sink.emit(RenderCommand::SetCaption {
            track: self.scope.map(|t| t.0),
            text: text.clone(),
        });
        self.report.captions.push(CaptionChange {
            track: self.scope,
            text: text.clone(),
            at_ms: self.sink.now_ms(),
        });
        self.caption = Some(text);
    }

    fn finish(&mut self) {
        self.clear_paused(None);
        self.set_caption(RunState::ExecutionEnd.caption());
    }

    fn record(&mut self, event: &TimelineEvent) {
        self.report.consumed.push(ConsumedEvent {
            id: event.id,
            track: event.track,
            kind: event.kind().clone(),
            position: event.position,
            at_ms: self.sink.now_ms(),
            positions: self
                .lanes
                .iter()
                .map(|lane| (lane.track.id, lane.position))
                .collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::super::{RunReport, Timeline};
    use super::*;
    use crate::model::{EventBinding, FrameSpec, Scenario, TrackSpec};

    fn config() -> Config {
        Config {
            char_width: 0.0,
            text_shift: 0.0,
            marker_width: 0.0,
            speed: 100.0,
            normal_pause_ms: 1000.0,
            short_pause_ms: 200.0,
            ..Config::default()
        }
    }

    fn bind(kind: EventKind, next: RunState) -> EventBinding {
        EventBinding::new(kind, next)
    }

    async fn play(scenario: &Scenario) -> RunReport {
        let timeline = Timeline::prepare(scenario, config()).unwrap();
        let (sink, _rx) = CommandSink::channel();
        timeline.run(&sink, None).await.unwrap()
    }

    fn stray_event(track: TrackId, owner: crate::model::NodeId) -> TimelineEvent {
        TimelineEvent {
            id: crate::model::EventId(99),
            track,
            position: 5.0,
            relative: 5.0,
            owner,
            span: None,
            binding: bind(EventKind::Breakpoint, RunState::Running),
        }
    }

    fn lone_track() -> Track {
        let spec = TrackSpec::new(FrameSpec::build("main", |f| {
            f.span(10.0);
        }));
        Track::from_spec(TrackId(0), &spec, 0.0)
    }

    #[test]
    fn event_for_an_unknown_track_is_rejected() {
        let config = config();
        let (sink, _rx) = CommandSink::channel();
        let ids = EventIds::default();
        let mut track = lone_track();
        let root = track.tree.root();
        let built = EventLoop::new(
            &config,
            &sink,
            &ids,
            None,
            vec![Lane::new(&mut track)],
            vec![stray_event(TrackId(7), root)],
            None,
        );
        assert!(matches!(
            built,
            Err(SchedulerError::UnknownTrack {
                track: TrackId(7),
                ..
            })
        ));
    }

    #[test]
    fn event_owned_by_a_span_is_rejected() {
        let config = config();
        let (sink, _rx) = CommandSink::channel();
        let ids = EventIds::default();
        let mut track = lone_track();
        let root = track.tree.root();
        let span = track.tree.frame(root).unwrap().children[0];
        assert!(track.tree.span(span).is_some());
        let built = EventLoop::new(
            &config,
            &sink,
            &ids,
            None,
            vec![Lane::new(&mut track)],
            vec![stray_event(TrackId(0), span)],
            None,
        );
        assert!(matches!(
            built,
            Err(SchedulerError::UnknownNode { node, .. }) if node == span
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn single_track_consumes_in_position_order() {
        let scenario = Scenario::new(
            "order",
            vec![TrackSpec::new(FrameSpec::build("main", |f| {
                f.span_with(20.0, bind(EventKind::SteppingEnd, RunState::Running));
                f.span_with(20.0, bind(EventKind::Breakpoint, RunState::Running));
                f.span(20.0);
            }))],
        );
        let report = play(&scenario).await;
        let positions: Vec<f64> = report.consumed.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![10.0, 30.0, 60.0]);
        assert_eq!(report.consumed[2].kind, EventKind::EndOfAnimation);
        assert_eq!(report.final_position(TrackId(0)), Some(60.0));
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_time_follows_speed() {
        let scenario = Scenario::new(
            "speed",
            vec![TrackSpec::new(FrameSpec::build("main", |f| {
                f.span(50.0);
            }))],
        );
        let report = play(&scenario).await;
        // 50 px at 100 px/s.
        assert!((report.elapsed_ms - 500.0).abs() < 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_all_freezes_every_lane() {
        let scenario = Scenario::new(
            "all",
            vec![
                TrackSpec::new(FrameSpec::build("a", |f| {
                    f.span_with(20.0, bind(EventKind::Breakpoint, RunState::Running));
                    f.span(100.0);
                })),
                TrackSpec::new(FrameSpec::build("b", |f| {
                    f.span(200.0);
                })),
            ],
        );
        let report = play(&scenario).await;
        let hit = &report.consumed[0];
        assert_eq!(hit.kind, EventKind::Breakpoint);
        assert_eq!(hit.position_of(TrackId(1)), Some(10.0));
        // Nothing moved during the pause, so both lanes are still in step
        // when the first track ends.
        let end_a = report
            .consumed
            .iter()
            .find(|c| c.track == TrackId(0) && c.kind == EventKind::EndOfAnimation)
            .unwrap();
        assert_eq!(end_a.position_of(TrackId(1)), Some(120.0));
    }

    #[tokio::test(start_paused = true)]
    async fn thread_pause_lets_other_lanes_run() {
        let scenario = Scenario::new(
            "thread",
            vec![
                TrackSpec::new(FrameSpec::build("a", |f| {
                    f.span_with(20.0, bind(EventKind::ThreadBreakpoint, RunState::Running));
                    f.span(100.0);
                })),
                TrackSpec::new(FrameSpec::build("b", |f| {
                    f.span(400.0);
                })),
            ],
        );
        let report = play(&scenario).await;
        let end_a = report
            .consumed
            .iter()
            .find(|c| c.track == TrackId(0) && c.kind == EventKind::EndOfAnimation)
            .unwrap();
        // One second at 100 px/s while the first track was held.
        assert_eq!(end_a.position_of(TrackId(1)), Some(220.0));
    }

    #[tokio::test(start_paused = true)]
    async fn drifting_lane_stops_at_its_next_event() {
        let scenario = Scenario::new(
            "cap",
            vec![
                TrackSpec::new(FrameSpec::build("a", |f| {
                    f.span_with(20.0, bind(EventKind::ThreadBreakpoint, RunState::Running));
                    f.span(100.0);
                })),
                TrackSpec::new(FrameSpec::build("b", |f| {
                    f.span(20.0);
                    f.span_with(20.0, bind(EventKind::SteppingEnd, RunState::Running));
                    f.span(400.0);
                })),
            ],
        );
        let report = play(&scenario).await;
        let step = report
            .consumed
            .iter()
            .find(|c| c.kind == EventKind::SteppingEnd)
            .unwrap();
        // B could have drifted 100 px but stops at its own event (30).
        assert_eq!(step.position_of(TrackId(1)), Some(30.0));
        assert_eq!(step.position_of(TrackId(0)), Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn exclusive_resume_freezes_other_lanes() {
        let scenario = Scenario::new(
            "exclusive",
            vec![
                TrackSpec::new(FrameSpec::build("a", |f| {
                    f.span_with(20.0, bind(EventKind::Breakpoint, RunState::ResumeThread));
                    f.span_with(40.0, bind(EventKind::Breakpoint, RunState::Running));
                    f.span(20.0);
                })),
                TrackSpec::new(FrameSpec::build("b", |f| {
                    f.span(200.0);
                })),
            ],
        );
        let report = play(&scenario).await;
        let second = &report.consumed[1];
        assert_eq!(second.track, TrackId(0));
        assert_eq!(second.position_of(TrackId(0)), Some(40.0));
        assert_eq!(second.position_of(TrackId(1)), Some(10.0));
        assert!(report.caption_texts().contains(&"Running"));
    }

    #[tokio::test(start_paused = true)]
    async fn execution_end_stops_early() {
        let scenario = Scenario::new(
            "stop",
            vec![TrackSpec::new(FrameSpec::build("main", |f| {
                f.span_with(20.0, bind(EventKind::SteppingEnd, RunState::ExecutionEnd));
                f.span_with(20.0, bind(EventKind::Breakpoint, RunState::Running));
            }))],
        );
        let report = play(&scenario).await;
        assert_eq!(report.consumed.len(), 1);
        assert_eq!(report.caption_texts().last(), Some(&"Done"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_filter_shows_banner() {
        let scenario = Scenario::new(
            "filter",
            vec![TrackSpec::new(FrameSpec::build("main", |f| {
                f.span_with(
                    20.0,
                    bind(EventKind::SetFilter("Coroutine#2".into()), RunState::Running),
                );
            }))],
        );
        let timeline = Timeline::prepare(&scenario, config()).unwrap();
        let (sink, mut rx) = CommandSink::channel();
        timeline.run(&sink, None).await.unwrap();
        let banner = super::super::drain(&mut rx)
            .into_iter()
            .find_map(|c| match c.command {
                RenderCommand::ShowBanner { text, .. } => Some(text),
                _ => None,
            });
        assert_eq!(banner.as_deref(), Some("Filter: Coroutine#2"));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_markers_are_added_and_removed() {
        let scenario = Scenario::new(
            "markers",
            vec![
                TrackSpec::new(FrameSpec::build("a", |f| {
                    f.span_with(20.0, bind(EventKind::Breakpoint, RunState::Running));
                })),
                TrackSpec::new(FrameSpec::build("b", |f| {
                    f.span(40.0);
                })),
            ],
        );
        let timeline = Timeline::prepare(&scenario, config()).unwrap();
        let (sink, mut rx) = CommandSink::channel();
        timeline.run(&sink, None).await.unwrap();
        let commands = super::super::drain(&mut rx);
        let added: Vec<u64> = commands
            .iter()
            .filter_map(|c| match c.command {
                RenderCommand::AddMarker {
                    id,
                    kind: MarkerKind::Paused,
                    ..
                } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(added.len(), 2);
        for id in added {
            assert!(
                commands
                    .iter()
                    .any(|c| c.command == RenderCommand::RemoveMarker { id })
            );
        }
    }
}
