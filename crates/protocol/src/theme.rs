use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    // Call frames, cycled by depth
    FrameDepth0,
    FrameDepth1,
    FrameDepth2,
    EvaluationFrame,
    FrameStroke,
    FrameLabel,

    TrackBackground,
    TrackLabel,

    // Coroutine boundary edges
    CoroutineEdge,

    BreakpointMarker,
    PausedMarker,
    NowCursor,

    CaptionText,
    BannerBackground,
    BannerText,

    Background,
}

impl ThemeToken {
    /// Palette entry for a normal frame at the given nesting depth.
    pub fn for_depth(depth: u32) -> Self {
        match depth % 3 {
            0 => Self::FrameDepth0,
            1 => Self::FrameDepth1,
            _ => Self::FrameDepth2,
        }
    }
}
