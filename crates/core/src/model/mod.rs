pub mod call_tree;
pub mod event;
pub mod scenario;
pub mod track;

pub use call_tree::{CallTree, FrameNode, Node, NodeId, SpanNode};
pub use event::{
    EventBinding, EventId, EventKind, EventTraits, PauseLength, RunState, Suspend, TimelineEvent,
};
pub use scenario::{
    AreaSpec, FrameKind, FrameSpec, Scenario, ScenarioError, SpanSpec, TrackSpec, parse_scenario,
};
pub use track::{Track, TrackId};
