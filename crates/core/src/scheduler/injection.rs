//! Splicing a sub-call into a frame that is already on screen.
//!
//! The injected subtree is laid out where the event sits, every container
//! from the owning frame up to the root is widened to make room, and the
//! pending events behind the injection point are re-indexed.

use futures_util::future::join_all;
use stepreel_protocol::{AnimProperty, AnimTarget, Easing, RenderCommand};
use tokio::time::sleep;

use super::event_loop::EventLoop;
use super::{SchedulerError, breakpoint_marker};
use crate::config::millis;
use crate::events::sort_by_position;
use crate::layout::{frame_commands, layout_frame, node_key};
use crate::model::{EventBinding, FrameSpec, NodeId, TimelineEvent, TrackId};

fn animate(
    target: AnimTarget,
    property: AnimProperty,
    from: f64,
    to: f64,
    duration_ms: f64,
) -> RenderCommand {
    RenderCommand::Animate {
        target,
        property,
        from,
        to,
        duration_ms,
        easing: Easing::EaseInOut,
    }
}

impl EventLoop<'_> {
    pub(super) async fn inject(
        &mut self,
        event: &TimelineEvent,
        spec: &FrameSpec,
        remain: &[usize],
    ) -> Result<(), SchedulerError> {
        let lane = self.lane_index(event)?;
        let config = self.config;
        let track = event.track;
        let owner = event.owner;
        if self.lanes[lane].track.tree.frame(owner).is_none() {
            return Err(SchedulerError::UnknownNode {
                event: event.id,
                node: owner,
            });
        }

        let start = event.relative + config.marker_width;
        let mut discovered = Vec::new();
        let tree = &mut self.lanes[lane].track.tree;
        let injected = tree.instantiate(spec, owner);
        let extend = layout_frame(
            tree,
            injected,
            event.position + config.marker_width,
            config,
            track,
            self.ids,
            &mut discovered,
        );
        if let Some(frame) = tree.frame_mut(injected) {
            frame.x = start;
        }

        self.widen(track, lane, owner, event.relative, extend);
        let mut waits = self.drift(config.widen_ms, remain);
        waits.push(config.widen_ms);
        join_all(waits.into_iter().map(|ms| sleep(millis(ms)))).await;

        let tree = &mut self.lanes[lane].track.tree;
        let index = event
            .span
            .and_then(|span| tree.child_index(owner, span))
            .map_or_else(
                || tree.frame(owner).map_or(0, |f| f.children.len()),
                |i| i + 1,
            );
        tree.attach(owner, index, injected);

        let track_ref = &*self.lanes[lane].track;
        for command in frame_commands(track_ref, injected, config, 0.0) {
            self.sink.emit(command);
        }
        for id in track_ref.tree.frames_preorder(injected) {
            self.sink.emit(animate(
                AnimTarget::Frame(node_key(track, id)),
                AnimProperty::Opacity,
                0.0,
                1.0,
                config.fade_ms,
            ));
        }
        self.hold(config.fade_ms, remain).await;

        let mut shifted = 0;
        for pending in self.queue.iter_mut() {
            if pending.track == track && pending.position > event.position {
                pending.position += extend;
                shifted += 1;
            }
        }

        sort_by_position(&mut discovered);
        let binding = event
            .binding
            .on_injection_end
            .as_deref()
            .cloned()
            .unwrap_or_else(EventBinding::evaluation_end);
        // The completion never lands past the owner's end, so the track's
        // end marker stays last in its queue.
        let tree = &self.lanes[lane].track.tree;
        let owner_start = event.position - event.relative;
        let owner_end = owner_start + tree.frame(owner).map_or(0.0, |f| f.width);
        let position = (event.position + config.marker_width + extend).min(owner_end);
        discovered.push(TimelineEvent {
            id: self.ids.next_id(),
            track,
            position,
            relative: position - owner_start,
            owner,
            span: None,
            binding,
        });
        for added in &discovered {
            if added.kind().traits().breakpoint {
                self.sink.emit(breakpoint_marker(added));
            }
        }

        tracing::info!(
            track = track.0,
            frame = %spec.label,
            extend,
            shifted,
            added = discovered.len(),
            "sub-call injected"
        );
        self.queue.extend(discovered);
        Ok(())
    }

    /// Walk from `owner` up to the root, growing every container by
    /// `extend` and pushing back whatever sits after the injection point.
    ///
    /// `pivot` is the injection point in the current container's
    /// coordinates; one level up it becomes the start of the child just
    /// left.
    fn widen(&mut self, track: TrackId, lane: usize, owner: NodeId, pivot: f64, extend: f64) {
        let duration = self.config.widen_ms;
        let mut pivot = pivot;
        let mut current = Some(owner);
        while let Some(id) = current {
            let tree = &mut self.lanes[lane].track.tree;
            let Some(frame) = tree.frame_mut(id) else {
                tracing::warn!(track = track.0, node = id.0, "widening walk left the frame chain");
                break;
            };
            let width = frame.width;
            frame.width += extend;
            let x = frame.x;
            let parent = frame.parent;
            let children = frame.children.clone();
            self.sink.emit(animate(
                AnimTarget::Frame(node_key(track, id)),
                AnimProperty::Width,
                width,
                width + extend,
                duration,
            ));

            for child in children {
                let Some(sibling) = tree.frame_mut(child) else {
                    continue;
                };
                if sibling.x <= pivot {
                    continue;
                }
                let from = sibling.x;
                sibling.x += extend;
                self.sink.emit(animate(
                    AnimTarget::Frame(node_key(track, child)),
                    AnimProperty::X,
                    from,
                    from + extend,
                    duration,
                ));
            }

            for pending in self
                .queue
                .iter_mut()
                .filter(|e| e.track == track && e.owner == id && e.relative > pivot)
            {
                let from = pending.relative;
                pending.relative += extend;
                if pending.kind().traits().breakpoint {
                    self.sink.emit(animate(
                        AnimTarget::Marker(pending.id.0),
                        AnimProperty::X,
                        from,
                        from + extend,
                        duration,
                    ));
                }
            }

            pivot = x;
            current = parent;
        }
    }
}
