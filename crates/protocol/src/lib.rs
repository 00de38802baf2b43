pub mod commands;
pub mod theme;
pub mod types;

pub use commands::{
    AnimProperty, AnimTarget, BoundaryEdges, EdgeStyle, MarkerKind, RenderCommand, TimedCommand,
};
pub use theme::ThemeToken;
pub use types::{Easing, NodeKey, Point, Rect};
