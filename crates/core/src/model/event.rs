use serde::{Deserialize, Serialize};

use super::call_tree::NodeId;
use super::scenario::FrameSpec;
use super::track::TrackId;

/// Debugger-visible moments a span can be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Suspend-all breakpoint.
    Breakpoint,
    /// Suspend-all breakpoint that waits for the user to resume.
    PermanentBreakpoint,
    /// Breakpoint that suspends only the hitting thread.
    ThreadBreakpoint,
    PermanentThreadBreakpoint,
    /// Conditional breakpoint whose condition evaluated to false: the thread
    /// stops just long enough to check it.
    SkippedBreakpoint,
    SteppingEnd,
    /// The debugger switched its stepping filter to the named coroutine.
    SetFilter(String),
    /// An injected evaluation returned.
    EvaluationEnd,
    /// Synthetic marker at the very end of a track.
    EndOfAnimation,
}

/// Which tracks an event stalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspend {
    /// True debugger suspend-all: every track is marked paused, nothing keeps
    /// running while the event is handled.
    All,
    /// Technical, thread-local stop: only the owning track pauses.
    Thread,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseLength {
    None,
    Short,
    Normal,
    /// Waits for an external resume (or the unbounded timer).
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTraits {
    pub suspend: Suspend,
    pub breakpoint: bool,
    pub pause: PauseLength,
}

impl EventTraits {
    pub fn is_paused(&self) -> bool {
        self.suspend != Suspend::None
    }

    pub fn is_technical(&self) -> bool {
        self.suspend == Suspend::Thread
    }
}

impl EventKind {
    pub fn traits(&self) -> EventTraits {
        let (suspend, breakpoint, pause) = match self {
            Self::Breakpoint => (Suspend::All, true, PauseLength::Normal),
            Self::PermanentBreakpoint => (Suspend::All, true, PauseLength::Permanent),
            Self::ThreadBreakpoint => (Suspend::Thread, true, PauseLength::Normal),
            Self::PermanentThreadBreakpoint => (Suspend::Thread, true, PauseLength::Permanent),
            Self::SkippedBreakpoint => (Suspend::Thread, true, PauseLength::Short),
            Self::SteppingEnd => (Suspend::All, false, PauseLength::Normal),
            Self::SetFilter(_) => (Suspend::All, false, PauseLength::Normal),
            Self::EvaluationEnd => (Suspend::Thread, false, PauseLength::Short),
            Self::EndOfAnimation => (Suspend::None, false, PauseLength::None),
        };
        EventTraits {
            suspend,
            breakpoint,
            pause,
        }
    }
}

/// What the scheduler switches to once an event has been handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    SteppingOver(String),
    /// Resume only the event-owning track; every other track freezes until
    /// that track reaches its next event.
    ResumeThread,
    /// Like `ResumeThread`, captioned as an evaluation.
    Evaluation,
    ExecutionEnd,
}

impl RunState {
    pub fn caption(&self) -> String {
        match self {
            Self::Running | Self::ResumeThread => "Running".to_string(),
            Self::SteppingOver(target) => format!("Stepping Over {target}"),
            Self::Evaluation => "Evaluation".to_string(),
            Self::ExecutionEnd => "Done".to_string(),
        }
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::ResumeThread | Self::Evaluation)
    }
}

/// Event attached to a self-execution span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBinding {
    pub kind: EventKind,
    pub next: RunState,
    /// Sub-call spliced into the owning frame when the event fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection: Option<Box<FrameSpec>>,
    /// Fired when the injected sub-call finishes. Defaults to
    /// [`EventBinding::evaluation_end`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_injection_end: Option<Box<EventBinding>>,
}

impl EventBinding {
    pub fn new(kind: EventKind, next: RunState) -> Self {
        Self {
            kind,
            next,
            injection: None,
            on_injection_end: None,
        }
    }

    pub fn with_injection(mut self, frame: FrameSpec) -> Self {
        self.injection = Some(Box::new(frame));
        self
    }

    pub fn with_injection_end(mut self, binding: EventBinding) -> Self {
        self.on_injection_end = Some(Box::new(binding));
        self
    }

    pub fn evaluation_end() -> Self {
        Self::new(EventKind::EvaluationEnd, RunState::ResumeThread)
    }

    pub(crate) fn end_of_animation() -> Self {
        Self::new(EventKind::EndOfAnimation, RunState::ExecutionEnd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub u64);

/// A binding resolved to a position on its track.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEvent {
    pub id: EventId,
    pub track: TrackId,
    /// Offset from the start of the track's root frame.
    pub position: f64,
    /// Offset from the start of `owner`.
    pub relative: f64,
    /// Frame containing the originating span.
    pub owner: NodeId,
    /// The originating span; `None` for synthetic events.
    pub span: Option<NodeId>,
    pub binding: EventBinding,
}

impl TimelineEvent {
    pub fn kind(&self) -> &EventKind {
        &self.binding.kind
    }
}
