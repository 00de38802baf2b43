//! Retained scene built from the command stream.
//!
//! A [`Stage`] replays [`TimedCommand`]s into tracks, frame containers and
//! markers whose animated properties are kept as tweens, so the scene can be
//! sampled at any instant with [`Stage::snapshot`]. Renderers only ever see
//! the absolute geometry of a [`Snapshot`].

use std::collections::BTreeMap;

use stepreel_protocol::{
    AnimProperty, AnimTarget, BoundaryEdges, Easing, MarkerKind, NodeKey, Point, Rect,
    RenderCommand, ThemeToken, TimedCommand,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tween {
    from: f64,
    to: f64,
    start_ms: f64,
    duration_ms: f64,
    easing: Easing,
}

impl Tween {
    fn sample(&self, t_ms: f64) -> f64 {
        if self.duration_ms <= 0.0 {
            return self.to;
        }
        let progress = self.easing.apply((t_ms - self.start_ms) / self.duration_ms);
        self.from + (self.to - self.from) * progress
    }
}

/// A numeric property: its initial value plus the tweens applied to it, in
/// issue order.
#[derive(Debug, Clone, PartialEq)]
struct Animated {
    base: f64,
    tweens: Vec<Tween>,
}

impl Animated {
    fn new(base: f64) -> Self {
        Self {
            base,
            tweens: Vec::new(),
        }
    }

    fn value_at(&self, t_ms: f64) -> f64 {
        self.tweens
            .iter()
            .rev()
            .find(|tween| tween.start_ms <= t_ms)
            .map_or(self.base, |tween| tween.sample(t_ms))
    }

    fn push(&mut self, tween: Tween) {
        self.tweens.push(tween);
    }
}

#[derive(Debug, Clone)]
struct TrackState {
    y: f64,
    height: f64,
    label: Option<String>,
    origin: Animated,
}

#[derive(Debug, Clone)]
struct FrameState {
    parent: Option<NodeKey>,
    x: Animated,
    y: f64,
    width: Animated,
    height: f64,
    color: ThemeToken,
    label: String,
    edges: Option<BoundaryEdges>,
    opacity: Animated,
    created_ms: f64,
}

#[derive(Debug, Clone)]
struct MarkerState {
    track: u32,
    parent: Option<NodeKey>,
    x: Animated,
    kind: MarkerKind,
    created_ms: f64,
    removed_ms: Option<f64>,
}

#[derive(Debug, Clone)]
struct Caption {
    track: Option<u32>,
    text: String,
    at_ms: f64,
}

#[derive(Debug, Clone)]
struct Banner {
    track: u32,
    text: String,
    start_ms: f64,
    duration_ms: f64,
}

/// One drawable item with absolute coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Placed {
    Track {
        track: u32,
        y: f64,
        height: f64,
        label: Option<String>,
    },
    Frame {
        key: NodeKey,
        rect: Rect,
        color: ThemeToken,
        label: String,
        edges: Option<BoundaryEdges>,
        opacity: f64,
    },
    Marker {
        id: u64,
        track: u32,
        x: f64,
        y: f64,
        height: f64,
        kind: MarkerKind,
    },
    Cursor {
        x: f64,
    },
    Caption {
        track: Option<u32>,
        text: String,
        at: Point,
    },
    Banner {
        track: u32,
        text: String,
        at: Point,
    },
}

/// The scene at one instant, in paint order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub t_ms: f64,
    pub items: Vec<Placed>,
}

impl Snapshot {
    pub fn frames(&self) -> impl Iterator<Item = (&NodeKey, &Rect, &str)> {
        self.items.iter().filter_map(|item| match item {
            Placed::Frame {
                key, rect, label, ..
            } => Some((key, rect, label.as_str())),
            _ => None,
        })
    }

    pub fn frame(&self, label: &str) -> Option<&Rect> {
        self.frames()
            .find(|(_, _, l)| *l == label)
            .map(|(_, rect, _)| rect)
    }

    pub fn captions(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            Placed::Caption { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stage {
    cursor_x: Option<f64>,
    tracks: BTreeMap<u32, TrackState>,
    frames: BTreeMap<NodeKey, FrameState>,
    /// Creation order; parents always precede their children.
    frame_order: Vec<NodeKey>,
    markers: BTreeMap<u64, MarkerState>,
    captions: Vec<Caption>,
    banners: Vec<Banner>,
    end_ms: f64,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time the last known animation settles.
    pub fn end_ms(&self) -> f64 {
        self.end_ms
    }

    pub fn extend<'c>(&mut self, commands: impl IntoIterator<Item = &'c TimedCommand>) {
        for command in commands {
            self.apply(command);
        }
    }

    pub fn apply(&mut self, timed: &TimedCommand) {
        let at = timed.at_ms;
        self.end_ms = self.end_ms.max(timed.end_ms());
        match &timed.command {
            RenderCommand::CreateTrack {
                track,
                x,
                y,
                height,
                label,
            } => {
                if self.cursor_x.is_none() {
                    self.cursor_x = Some(*x);
                }
                self.tracks.insert(
                    *track,
                    TrackState {
                        y: *y,
                        height: *height,
                        label: label.clone(),
                        origin: Animated::new(*x),
                    },
                );
            }
            RenderCommand::CreateFrame {
                key,
                parent,
                rect,
                color,
                label,
                edges,
                opacity,
            } => {
                if !self.frames.contains_key(key) {
                    self.frame_order.push(*key);
                }
                self.frames.insert(
                    *key,
                    FrameState {
                        parent: *parent,
                        x: Animated::new(rect.x),
                        y: rect.y,
                        width: Animated::new(rect.w),
                        height: rect.h,
                        color: *color,
                        label: label.clone(),
                        edges: edges.clone(),
                        opacity: Animated::new(*opacity),
                        created_ms: at,
                    },
                );
            }
            RenderCommand::Animate {
                target,
                property,
                from,
                to,
                duration_ms,
                easing,
            } => {
                let tween = Tween {
                    from: *from,
                    to: *to,
                    start_ms: at,
                    duration_ms: *duration_ms,
                    easing: *easing,
                };
                if let Some(value) = self.property_mut(*target, *property) {
                    value.push(tween);
                } else {
                    tracing::trace!(?target, ?property, "animation for unknown target");
                }
            }
            RenderCommand::AddMarker {
                id,
                track,
                parent,
                x,
                kind,
            } => {
                self.markers.insert(
                    *id,
                    MarkerState {
                        track: *track,
                        parent: *parent,
                        x: Animated::new(*x),
                        kind: *kind,
                        created_ms: at,
                        removed_ms: None,
                    },
                );
            }
            RenderCommand::RemoveMarker { id } => {
                if let Some(marker) = self.markers.get_mut(id) {
                    marker.removed_ms = Some(at);
                }
            }
            RenderCommand::SetCaption { track, text } => self.captions.push(Caption {
                track: *track,
                text: text.clone(),
                at_ms: at,
            }),
            RenderCommand::ShowBanner {
                track,
                text,
                duration_ms,
            } => self.banners.push(Banner {
                track: *track,
                text: text.clone(),
                start_ms: at,
                duration_ms: *duration_ms,
            }),
        }
    }

    fn property_mut(&mut self, target: AnimTarget, property: AnimProperty) -> Option<&mut Animated> {
        match (target, property) {
            (AnimTarget::Track(track), AnimProperty::X) => {
                self.tracks.get_mut(&track).map(|t| &mut t.origin)
            }
            (AnimTarget::Frame(key), property) => {
                let frame = self.frames.get_mut(&key)?;
                Some(match property {
                    AnimProperty::X => &mut frame.x,
                    AnimProperty::Width => &mut frame.width,
                    AnimProperty::Opacity => &mut frame.opacity,
                })
            }
            (AnimTarget::Marker(id), AnimProperty::X) => {
                self.markers.get_mut(&id).map(|m| &mut m.x)
            }
            _ => None,
        }
    }

    /// Absolute top-left of `key` at `t_ms`.
    fn frame_origin(&self, key: NodeKey, t_ms: f64) -> Option<Point> {
        let mut x = 0.0;
        let mut y = 0.0;
        let mut current = Some(key);
        while let Some(k) = current {
            let frame = self.frames.get(&k)?;
            x += frame.x.value_at(t_ms);
            y += frame.y;
            current = frame.parent;
        }
        let track = self.tracks.get(&key.track)?;
        Some(Point::new(x + track.origin.value_at(t_ms), y + track.y))
    }

    pub fn snapshot(&self, t_ms: f64) -> Snapshot {
        let mut items = Vec::new();

        for (id, track) in &self.tracks {
            items.push(Placed::Track {
                track: *id,
                y: track.y,
                height: track.height,
                label: track.label.clone(),
            });
        }

        for key in &self.frame_order {
            let Some(frame) = self.frames.get(key) else {
                continue;
            };
            if frame.created_ms > t_ms {
                continue;
            }
            let Some(origin) = self.frame_origin(*key, t_ms) else {
                continue;
            };
            items.push(Placed::Frame {
                key: *key,
                rect: Rect::new(origin.x, origin.y, frame.width.value_at(t_ms), frame.height),
                color: frame.color,
                label: frame.label.clone(),
                edges: frame.edges.clone(),
                opacity: frame.opacity.value_at(t_ms),
            });
        }

        for (id, marker) in &self.markers {
            let visible = marker.created_ms <= t_ms && marker.removed_ms.is_none_or(|r| r > t_ms);
            if !visible {
                continue;
            }
            let Some(track) = self.tracks.get(&marker.track) else {
                continue;
            };
            let base = match marker.parent {
                Some(parent) => self.frame_origin(parent, t_ms).map(|p| p.x),
                None => Some(track.origin.value_at(t_ms)),
            };
            let Some(base) = base else {
                continue;
            };
            items.push(Placed::Marker {
                id: *id,
                track: marker.track,
                x: base + marker.x.value_at(t_ms),
                y: track.y,
                height: track.height,
                kind: marker.kind,
            });
        }

        if let Some(x) = self.cursor_x {
            items.push(Placed::Cursor { x });
        }

        let mut latest: BTreeMap<Option<u32>, &Caption> = BTreeMap::new();
        for caption in self.captions.iter().filter(|c| c.at_ms <= t_ms) {
            latest.insert(caption.track, caption);
        }
        for (scope, caption) in latest {
            let at = match scope.and_then(|t| self.tracks.get(&t)) {
                Some(track) => Point::new(8.0, track.y - 6.0),
                None => Point::new(8.0, 20.0),
            };
            items.push(Placed::Caption {
                track: scope,
                text: caption.text.clone(),
                at,
            });
        }

        for banner in &self.banners {
            let shown = banner.start_ms <= t_ms && t_ms < banner.start_ms + banner.duration_ms;
            if !shown {
                continue;
            }
            let Some(track) = self.tracks.get(&banner.track) else {
                continue;
            };
            items.push(Placed::Banner {
                track: banner.track,
                text: banner.text.clone(),
                at: Point::new(self.cursor_x.unwrap_or(0.0), track.y + track.height + 16.0),
            });
        }

        Snapshot { t_ms, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(at_ms: f64, command: RenderCommand) -> TimedCommand {
        TimedCommand { at_ms, command }
    }

    fn frame(node: u32, parent: Option<u32>, x: f64, w: f64) -> RenderCommand {
        RenderCommand::CreateFrame {
            key: NodeKey::new(0, node),
            parent: parent.map(|p| NodeKey::new(0, p)),
            rect: Rect::new(x, if parent.is_some() { 5.0 } else { 0.0 }, w, 50.0),
            color: ThemeToken::FrameDepth0,
            label: format!("f{node}"),
            edges: None,
            opacity: 1.0,
        }
    }

    fn scene() -> Vec<TimedCommand> {
        vec![
            at(
                0.0,
                RenderCommand::CreateTrack {
                    track: 0,
                    x: 100.0,
                    y: 200.0,
                    height: 60.0,
                    label: None,
                },
            ),
            at(0.0, frame(0, None, 0.0, 300.0)),
            at(0.0, frame(1, Some(0), 40.0, 100.0)),
            at(
                0.0,
                RenderCommand::Animate {
                    target: AnimTarget::Track(0),
                    property: AnimProperty::X,
                    from: 100.0,
                    to: 0.0,
                    duration_ms: 1000.0,
                    easing: Easing::Linear,
                },
            ),
        ]
    }

    #[test]
    fn children_are_placed_relative_to_parents() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        let snap = stage.snapshot(0.0);
        let child = snap.frame("f1").unwrap();
        assert!((child.x - 140.0).abs() < 1e-9);
        assert!((child.y - 205.0).abs() < 1e-9);
    }

    #[test]
    fn track_scroll_is_interpolated() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        let root = *stage.snapshot(500.0).frame("f0").unwrap();
        assert!((root.x - 50.0).abs() < 1e-9);
        let root = *stage.snapshot(5000.0).frame("f0").unwrap();
        assert!(root.x.abs() < 1e-9);
        assert!((stage.end_ms() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn later_tweens_take_over() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        stage.apply(&at(
            2000.0,
            RenderCommand::Animate {
                target: AnimTarget::Frame(NodeKey::new(0, 1)),
                property: AnimProperty::Width,
                from: 100.0,
                to: 200.0,
                duration_ms: 100.0,
                easing: Easing::EaseInOut,
            },
        ));
        assert!((stage.snapshot(1500.0).frame("f1").unwrap().w - 100.0).abs() < 1e-9);
        assert!((stage.snapshot(2050.0).frame("f1").unwrap().w - 150.0).abs() < 1e-9);
        assert!((stage.snapshot(3000.0).frame("f1").unwrap().w - 200.0).abs() < 1e-9);
    }

    #[test]
    fn frames_appear_when_created() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        stage.apply(&at(700.0, frame(2, Some(0), 200.0, 20.0)));
        assert!(stage.snapshot(600.0).frame("f2").is_none());
        assert!(stage.snapshot(700.0).frame("f2").is_some());
    }

    #[test]
    fn removed_markers_disappear() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        stage.apply(&at(
            100.0,
            RenderCommand::AddMarker {
                id: 9,
                track: 0,
                parent: Some(NodeKey::new(0, 1)),
                x: 10.0,
                kind: MarkerKind::Paused,
            },
        ));
        stage.apply(&at(300.0, RenderCommand::RemoveMarker { id: 9 }));
        let count = |t: f64| {
            stage
                .snapshot(t)
                .items
                .iter()
                .filter(|i| matches!(i, Placed::Marker { .. }))
                .count()
        };
        assert_eq!(count(50.0), 0);
        assert_eq!(count(200.0), 1);
        assert_eq!(count(400.0), 0);
    }

    #[test]
    fn latest_caption_per_scope_wins() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        stage.apply(&at(
            10.0,
            RenderCommand::SetCaption {
                track: None,
                text: "Running".into(),
            },
        ));
        stage.apply(&at(
            20.0,
            RenderCommand::SetCaption {
                track: None,
                text: "Paused".into(),
            },
        ));
        assert_eq!(stage.snapshot(15.0).captions().collect::<Vec<_>>(), vec!["Running"]);
        assert_eq!(stage.snapshot(25.0).captions().collect::<Vec<_>>(), vec!["Paused"]);
    }

    #[test]
    fn banners_expire() {
        let mut stage = Stage::new();
        stage.extend(&scene());
        stage.apply(&at(
            100.0,
            RenderCommand::ShowBanner {
                track: 0,
                text: "Filter: Coroutine#1".into(),
                duration_ms: 50.0,
            },
        ));
        let banners = |t: f64| {
            stage
                .snapshot(t)
                .items
                .iter()
                .filter(|i| matches!(i, Placed::Banner { .. }))
                .count()
        };
        assert_eq!(banners(120.0), 1);
        assert_eq!(banners(200.0), 0);
    }
}
