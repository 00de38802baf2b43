use serde::{Deserialize, Serialize};

use crate::theme::ThemeToken;
use crate::types::{Easing, NodeKey, Rect};

/// A single imperative scene instruction.
///
/// The scheduler emits a stream of these; a renderer replays them without
/// knowing anything about how the timeline was scheduled. Geometry of a
/// frame is relative to its parent frame (or to the track origin for roots).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Create the horizontal strip one track scrolls through. `x` is the
    /// initial horizontal origin of the track's root frame.
    CreateTrack {
        track: u32,
        x: f64,
        y: f64,
        height: f64,
        label: Option<String>,
    },

    /// Create a frame container (background shape plus label).
    CreateFrame {
        key: NodeKey,
        parent: Option<NodeKey>,
        rect: Rect,
        color: ThemeToken,
        label: String,
        edges: Option<BoundaryEdges>,
        opacity: f64,
    },

    /// Animate one numeric property from `from` to `to`.
    Animate {
        target: AnimTarget,
        property: AnimProperty,
        from: f64,
        to: f64,
        duration_ms: f64,
        easing: Easing,
    },

    /// Place a marker. `parent` pins it inside a frame (x relative to that
    /// frame); otherwise x is relative to the track origin.
    AddMarker {
        id: u64,
        track: u32,
        parent: Option<NodeKey>,
        x: f64,
        kind: MarkerKind,
    },

    RemoveMarker { id: u64 },

    /// Replace the state caption. `track` is set when tracks are scheduled
    /// independently and each carries its own caption.
    SetCaption { track: Option<u32>, text: String },

    /// A transient caption or tooltip that disappears after `duration_ms`.
    ShowBanner {
        track: u32,
        text: String,
        duration_ms: f64,
    },
}

/// What an `Animate` command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimTarget {
    /// The whole track strip (its horizontal scroll origin).
    Track(u32),
    Frame(NodeKey),
    Marker(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimProperty {
    X,
    Width,
    Opacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerKind {
    Breakpoint,
    Paused,
}

/// How one side of a coroutine boundary frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeStyle {
    /// The coroutine starts (or finishes) at this edge.
    Solid,
    /// The coroutine continues in another segment.
    Dashed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryEdges {
    pub coroutine: String,
    pub open: EdgeStyle,
    pub close: EdgeStyle,
}

/// A command stamped with the scheduler clock time it was issued at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedCommand {
    pub at_ms: f64,
    pub command: RenderCommand,
}

impl TimedCommand {
    /// End of the command's effect on the timeline (start for instantaneous
    /// commands).
    pub fn end_ms(&self) -> f64 {
        match &self.command {
            RenderCommand::Animate { duration_ms, .. }
            | RenderCommand::ShowBanner { duration_ms, .. } => self.at_ms + duration_ms,
            _ => self.at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animate_end_includes_duration() {
        let cmd = TimedCommand {
            at_ms: 100.0,
            command: RenderCommand::Animate {
                target: AnimTarget::Track(0),
                property: AnimProperty::X,
                from: 0.0,
                to: -50.0,
                duration_ms: 250.0,
                easing: Easing::Linear,
            },
        };
        assert!((cmd.end_ms() - 350.0).abs() < f64::EPSILON);
    }

    #[test]
    fn instant_commands_end_at_start() {
        let cmd = TimedCommand {
            at_ms: 42.0,
            command: RenderCommand::RemoveMarker { id: 3 },
        };
        assert!((cmd.end_ms() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn command_serializes_with_variant_tag() {
        let cmd = RenderCommand::SetCaption {
            track: None,
            text: "Paused".into(),
        };
        let json = serde_json::to_string(&cmd).unwrap_or_default();
        assert!(json.contains("SetCaption"));
        assert!(json.contains("Paused"));
        let back: RenderCommand =
            serde_json::from_str(&json).unwrap_or(RenderCommand::RemoveMarker { id: 0 });
        assert_eq!(back, cmd);
    }
}
