//! Layout engine: turns a call tree into horizontal extents.
//!
//! A frame is as wide as its label (plus `text_shift` padding) followed by
//! its children in order: spans contribute their extent, sub-frames their
//! own computed width. Widths and offsets are written back into the
//! [`CallTree`] so the scheduler can mutate them live during injection.
//! Every bound span met on the way becomes a [`TimelineEvent`] centered in
//! its span.

use stepreel_protocol::{BoundaryEdges, EdgeStyle, NodeKey, Rect, RenderCommand, ThemeToken};

use crate::config::Config;
use crate::events::EventIds;
use crate::model::{
    CallTree, EventBinding, FrameKind, Node, NodeId, TimelineEvent, Track, TrackId,
};

enum Child {
    Span(f64, Option<EventBinding>),
    Frame,
}

/// Lay out `frame`, whose start sits `offset` from the track origin.
///
/// Returns the frame width and appends discovered events to `events` in
/// discovery (pre-order) order.
pub fn layout_frame(
    tree: &mut CallTree,
    frame: NodeId,
    offset: f64,
    config: &Config,
    track: TrackId,
    ids: &EventIds,
    events: &mut Vec<TimelineEvent>,
) -> f64 {
    let Some(node) = tree.frame(frame) else {
        return 0.0;
    };
    let children = node.children.clone();
    let mut running = config.label_width(&node.label) + config.text_shift;

    for child in children {
        let kind = match tree.node(child) {
            Some(Node::Span(span)) => Child::Span(span.extent, span.binding.clone()),
            Some(Node::Frame(_)) => Child::Frame,
            None => continue,
        };
        match kind {
            Child::Span(extent, binding) => {
                if let Some(binding) = binding {
                    let relative = running + extent / 2.0;
                    events.push(TimelineEvent {
                        id: ids.next_id(),
                        track,
                        position: offset + relative,
                        relative,
                        owner: frame,
                        span: Some(child),
                        binding,
                    });
                }
                running += extent;
            }
            Child::Frame => {
                let width = layout_frame(tree, child, offset + running, config, track, ids, events);
                if let Some(sub) = tree.frame_mut(child) {
                    sub.x = running;
                }
                running += width;
            }
        }
    }

    if let Some(node) = tree.frame_mut(frame) {
        node.width = running;
    }
    running
}

/// Lay out a whole track from its root. Events come back unsorted.
pub fn layout_track(track: &mut Track, config: &Config, ids: &EventIds) -> Vec<TimelineEvent> {
    let mut events = Vec::new();
    let root = track.tree.root();
    layout_frame(&mut track.tree, root, 0.0, config, track.id, ids, &mut events);
    events
}

/// Commands creating the containers for `from` and everything below it.
pub fn frame_commands(
    track: &Track,
    from: NodeId,
    config: &Config,
    opacity: f64,
) -> Vec<RenderCommand> {
    let tree = &track.tree;
    let mut commands = Vec::new();
    for id in tree.frames_preorder(from) {
        let Some(frame) = tree.frame(id) else {
            continue;
        };
        let y = if frame.parent.is_some() {
            config.y_shift / 2.0
        } else {
            0.0
        };
        let (color, edges) = match &frame.kind {
            FrameKind::Normal => (ThemeToken::for_depth(frame.depth), None),
            FrameKind::Evaluation => (ThemeToken::EvaluationFrame, None),
            FrameKind::CoroutineBoundary {
                coroutine,
                open,
                close,
            } => (
                ThemeToken::for_depth(frame.depth),
                Some(BoundaryEdges {
                    coroutine: coroutine.clone(),
                    open: edge_style(*open),
                    close: edge_style(*close),
                }),
            ),
        };
        commands.push(RenderCommand::CreateFrame {
            key: node_key(track.id, id),
            parent: frame.parent.map(|p| node_key(track.id, p)),
            rect: Rect::new(frame.x, y, frame.width, config.frame_height(frame.depth)),
            color,
            label: frame.label.clone(),
            edges,
            opacity,
        });
    }
    commands
}

fn edge_style(solid: bool) -> EdgeStyle {
    if solid { EdgeStyle::Solid } else { EdgeStyle::Dashed }
}

pub fn node_key(track: TrackId, node: NodeId) -> NodeKey {
    NodeKey::new(track.0, node.0)
}
