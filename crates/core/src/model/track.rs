use super::call_tree::CallTree;
use super::scenario::TrackSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u32);

/// One concurrently visualized execution context (a thread or coroutine
/// carrier in the illustrated program).
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: Option<String>,
    /// Vertical position of the strip.
    pub y: f64,
    pub tree: CallTree,
}

impl Track {
    pub fn from_spec(id: TrackId, spec: &TrackSpec, y: f64) -> Self {
        Self {
            id,
            name: spec.name.clone(),
            y: spec.y.unwrap_or(y),
            tree: CallTree::from_spec(&spec.root),
        }
    }

    pub fn width(&self) -> f64 {
        self.tree.width()
    }
}
