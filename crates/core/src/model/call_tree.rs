use super::event::EventBinding;
use super::scenario::{AreaSpec, FrameKind, FrameSpec};

/// Handle of a node inside one track's [`CallTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Time a frame spends executing itself between sub-calls.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanNode {
    pub extent: f64,
    pub binding: Option<EventBinding>,
    pub parent: NodeId,
}

/// A call frame together with its live layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameNode {
    pub label: String,
    pub kind: FrameKind,
    /// Spans and sub-frames in chronological order.
    pub children: Vec<NodeId>,
    pub depth: u32,
    pub parent: Option<NodeId>,
    /// Top-level ancestor on this track (cached, see [`CallTree::assign_depths`]).
    pub root: NodeId,
    /// Offset from the start of the parent frame.
    pub x: f64,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Span(SpanNode),
    Frame(FrameNode),
}

/// Arena of frames and spans for one track.
///
/// Back references (`parent`, `root`) are plain handles. They are written
/// when nodes are created and recomputed by [`CallTree::assign_depths`]
/// after any structural change.
#[derive(Debug, Clone, PartialEq)]
pub struct CallTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl CallTree {
    pub fn from_spec(spec: &FrameSpec) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.root = tree.push_frame(spec, None);
        tree.assign_depths(tree.root, 0);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn frame(&self, id: NodeId) -> Option<&FrameNode> {
        match self.nodes.get(id.index()) {
            Some(Node::Frame(frame)) => Some(frame),
            _ => None,
        }
    }

    pub fn frame_mut(&mut self, id: NodeId) -> Option<&mut FrameNode> {
        match self.nodes.get_mut(id.index()) {
            Some(Node::Frame(frame)) => Some(frame),
            _ => None,
        }
    }

    pub fn span(&self, id: NodeId) -> Option<&SpanNode> {
        match self.nodes.get(id.index()) {
            Some(Node::Span(span)) => Some(span),
            _ => None,
        }
    }

    /// Total width of the track, valid after layout.
    pub fn width(&self) -> f64 {
        self.frame(self.root).map_or(0.0, |f| f.width)
    }

    fn push_frame(&mut self, spec: &FrameSpec, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::Frame(FrameNode {
            label: spec.label.clone(),
            kind: spec.kind.clone(),
            children: Vec::with_capacity(spec.children.len()),
            depth: 0,
            parent,
            root: id,
            x: 0.0,
            width: 0.0,
        }));

        let mut children = Vec::with_capacity(spec.children.len());
        for area in &spec.children {
            let child = match area {
                AreaSpec::Span(span) => {
                    let child = NodeId(self.nodes.len() as u32);
                    self.nodes.push(Node::Span(SpanNode {
                        extent: span.extent,
                        binding: span.binding.clone(),
                        parent: id,
                    }));
                    child
                }
                AreaSpec::Frame(sub) => self.push_frame(sub, Some(id)),
            };
            children.push(child);
        }
        if let Some(frame) = self.frame_mut(id) {
            frame.children = children;
        }
        id
    }

    /// Create the nodes for `spec` under `parent` without linking it into
    /// the parent's children yet. Depth and root are assigned immediately.
    pub fn instantiate(&mut self, spec: &FrameSpec, parent: NodeId) -> NodeId {
        let id = self.push_frame(spec, Some(parent));
        let depth = self.frame(parent).map_or(0, |f| f.depth + 1);
        self.assign_depths(id, depth);
        id
    }

    /// Link a previously instantiated frame into `parent` at `index`.
    pub fn attach(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if let Some(frame) = self.frame_mut(parent) {
            let index = index.min(frame.children.len());
            frame.children.insert(index, child);
        }
        if let Some(frame) = self.frame_mut(child) {
            frame.parent = Some(parent);
        }
    }

    /// Pre-order walk from `from`, setting `depth`, `parent` and `root` of
    /// every frame below it. Idempotent on an unchanged tree.
    pub fn assign_depths(&mut self, from: NodeId, depth: u32) {
        let root = match self.frame(from) {
            Some(frame) => match frame.parent {
                Some(parent) => self.frame(parent).map_or(from, |p| p.root),
                None => from,
            },
            None => return,
        };

        let mut stack = vec![(from, depth)];
        while let Some((id, depth)) = stack.pop() {
            let Some(frame) = self.frame_mut(id) else {
                continue;
            };
            frame.depth = depth;
            frame.root = root;
            let children = frame.children.clone();
            for child in children.into_iter().rev() {
                match self.nodes.get_mut(child.index()) {
                    Some(Node::Frame(sub)) => {
                        sub.parent = Some(id);
                        stack.push((child, depth + 1));
                    }
                    Some(Node::Span(span)) => span.parent = id,
                    None => {}
                }
            }
        }
    }

    /// Frames below (and including) `from` in pre-order.
    pub fn frames_preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(frame) = self.frame(id) else {
                continue;
            };
            out.push(id);
            for child in frame.children.iter().rev() {
                if self.frame(*child).is_some() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    /// Position of `child` within `parent`'s children.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.frame(parent)?
            .children
            .iter()
            .position(|c| *c == child)
    }
}
