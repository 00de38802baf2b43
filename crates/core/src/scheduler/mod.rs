//! Timeline scheduler.
//!
//! Drives every track's scroll position toward its next event, handles the
//! pause, optional sub-call injection and run-state switch each event asks
//! for, and streams the resulting scene commands to a [`CommandSink`].
//!
//! Each step forks a bounded set of timed waits (one per animation that is
//! running concurrently) and joins them before the next event is looked at.
//! Nothing runs in parallel; "concurrent" tracks are just animations that
//! share a join point.

mod event_loop;
mod injection;
mod sink;

use futures_util::future::join_all;
use stepreel_protocol::{MarkerKind, RenderCommand};
use thiserror::Error;

use crate::config::Config;
use crate::events::{EventIds, collect_track_events, merge_queues};
use crate::layout::{frame_commands, node_key};
use crate::model::{
    EventId, EventKind, NodeId, Scenario, ScenarioError, TimelineEvent, Track, TrackId,
};

use event_loop::{EventLoop, Lane};
pub use sink::{CommandSink, ResumeSignal, drain};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scenario: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("event {event:?} belongs to unknown track {track:?}")]
    UnknownTrack { event: EventId, track: TrackId },
    #[error("event {event:?} references node {node:?} which is not a frame of its track")]
    UnknownNode { event: EventId, node: NodeId },
}

/// A laid-out scenario, ready to be played.
#[derive(Debug)]
pub struct Timeline {
    name: String,
    config: Config,
    tracks: Vec<Track>,
    queues: Vec<Vec<TimelineEvent>>,
    synchronous: bool,
    ids: EventIds,
}

impl Timeline {
    /// Build the call trees, lay every track out and collect its events.
    pub fn prepare(scenario: &Scenario, config: Config) -> Result<Self, SchedulerError> {
        scenario.validate()?;
        let ids = EventIds::default();
        let mut tracks = Vec::with_capacity(scenario.tracks.len());
        let mut queues = Vec::with_capacity(scenario.tracks.len());
        for (index, spec) in scenario.tracks.iter().enumerate() {
            let mut track = Track::from_spec(TrackId(index as u32), spec, config.track_y(index));
            queues.push(collect_track_events(&mut track, &config, &ids));
            tracks.push(track);
        }
        tracing::debug!(
            scenario = %scenario.name,
            tracks = tracks.len(),
            events = queues.iter().map(Vec::len).sum::<usize>(),
            "timeline prepared"
        );
        Ok(Self {
            name: scenario.name.clone(),
            config,
            tracks,
            queues,
            synchronous: scenario.synchronous,
            ids,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Per-track event queues, each sorted and ending in `EndOfAnimation`.
    pub fn queues(&self) -> &[Vec<TimelineEvent>] {
        &self.queues
    }

    pub fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    /// Commands building the initial scene: track strips, frame containers
    /// and breakpoint markers.
    pub fn setup_commands(&self) -> Vec<RenderCommand> {
        let mut commands = Vec::new();
        for track in &self.tracks {
            commands.push(RenderCommand::CreateTrack {
                track: track.id.0,
                x: self.config.cursor_x,
                y: track.y,
                height: self.config.thread_height,
                label: track.name.clone(),
            });
            commands.extend(frame_commands(
                track,
                track.tree.root(),
                &self.config,
                1.0,
            ));
        }
        for event in self.queues.iter().flatten() {
            if event.kind().traits().breakpoint {
                commands.push(breakpoint_marker(event));
            }
        }
        commands
    }

    /// Play the timeline to completion.
    ///
    /// Permanent pauses wait for `resume` when given, otherwise for the
    /// configured `permanent_pause_ms` timer.
    pub async fn run(
        mut self,
        sink: &CommandSink,
        resume: Option<ResumeSignal>,
    ) -> Result<RunReport, SchedulerError> {
        for command in self.setup_commands() {
            sink.emit(command);
        }

        let config = &self.config;
        let ids = &self.ids;
        let resume = resume.as_ref();
        let queues = std::mem::take(&mut self.queues);

        let reports = if self.synchronous {
            let lanes = self.tracks.iter_mut().map(Lane::new).collect();
            let event_loop = EventLoop::new(config, sink, ids, resume, lanes, merge_queues(queues), None)?;
            vec![event_loop.run().await?]
        } else {
            let loops = self
                .tracks
                .iter_mut()
                .zip(queues)
                .map(|(track, queue)| {
                    let scope = Some(track.id);
                    EventLoop::new(config, sink, ids, resume, vec![Lane::new(track)], queue, scope)
                })
                .collect::<Result<Vec<_>, _>>()?;
            join_all(loops.into_iter().map(EventLoop::run))
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut report = RunReport {
            elapsed_ms: sink.now_ms(),
            ..RunReport::default()
        };
        for part in reports {
            report.consumed.extend(part.consumed);
            report.captions.extend(part.captions);
            report.final_positions.extend(part.final_positions);
        }
        report.consumed.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        report.captions.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        report.final_positions.sort_by_key(|(track, _)| *track);
        report.tracks = self.tracks;
        tracing::info!(
            scenario = %self.name,
            events = report.consumed.len(),
            elapsed_ms = report.elapsed_ms,
            "timeline finished"
        );
        Ok(report)
    }
}

pub(crate) fn breakpoint_marker(event: &TimelineEvent) -> RenderCommand {
    RenderCommand::AddMarker {
        id: event.id.0,
        track: event.track.0,
        parent: Some(node_key(event.track, event.owner)),
        x: event.relative,
        kind: MarkerKind::Breakpoint,
    }
}

/// One event as the scheduler consumed it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedEvent {
    pub id: EventId,
    pub track: TrackId,
    pub kind: EventKind,
    /// Live position at consumption, including injection shifts.
    pub position: f64,
    pub at_ms: f64,
    /// Scroll position of every track driven by the same queue.
    pub positions: Vec<(TrackId, f64)>,
}

impl ConsumedEvent {
    pub fn position_of(&self, track: TrackId) -> Option<f64> {
        self.positions
            .iter()
            .find(|(t, _)| *t == track)
            .map(|(_, p)| *p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionChange {
    pub track: Option<TrackId>,
    pub text: String,
    pub at_ms: f64,
}

/// What happened during a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub consumed: Vec<ConsumedEvent>,
    pub captions: Vec<CaptionChange>,
    pub final_positions: Vec<(TrackId, f64)>,
    /// Tracks with their layout as it stood at the end (injections applied).
    pub tracks: Vec<Track>,
    pub elapsed_ms: f64,
}

impl RunReport {
    pub fn caption_texts(&self) -> Vec<&str> {
        self.captions.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn final_position(&self, track: TrackId) -> Option<f64> {
        self.final_positions
            .iter()
            .find(|(t, _)| *t == track)
            .map(|(_, p)| *p)
    }
}
