use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::EventBinding;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scenario has no tracks")]
    NoTracks,
    #[error("track {track}: span under `{frame}` has invalid extent {extent}")]
    InvalidExtent {
        track: usize,
        frame: String,
        extent: f64,
    },
    #[error("unknown built-in scenario `{0}`")]
    UnknownBuiltin(String),
}

/// How a frame is presented and what it stands for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameKind {
    #[default]
    Normal,
    /// A call injected by the debugger (expression evaluation).
    Evaluation,
    /// One segment of a coroutine's execution on this track. `open`/`close`
    /// are true when the coroutine starts/finishes at that edge.
    CoroutineBoundary {
        coroutine: String,
        open: bool,
        close: bool,
    },
}

/// Authoring form of a call frame. Instantiated into a
/// [`CallTree`](super::CallTree) before layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub label: String,
    #[serde(default)]
    pub kind: FrameKind,
    #[serde(default)]
    pub children: Vec<AreaSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaSpec {
    Span(SpanSpec),
    Frame(FrameSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSpec {
    pub extent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<EventBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSpec {
    #[serde(default)]
    pub name: Option<String>,
    /// Vertical position of the strip; laid out automatically when absent.
    #[serde(default)]
    pub y: Option<f64>,
    pub root: FrameSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Merge every track's events into one globally ordered queue. When
    /// false each track advances autonomously.
    #[serde(default = "default_synchronous")]
    pub synchronous: bool,
    pub tracks: Vec<TrackSpec>,
}

fn default_synchronous() -> bool {
    true
}

impl Scenario {
    pub fn new(name: impl Into<String>, tracks: Vec<TrackSpec>) -> Self {
        Self {
            name: name.into(),
            synchronous: true,
            tracks,
        }
    }

    pub fn independent(mut self) -> Self {
        self.synchronous = false;
        self
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.tracks.is_empty() {
            return Err(ScenarioError::NoTracks);
        }
        for (index, track) in self.tracks.iter().enumerate() {
            validate_frame(index, &track.root)?;
        }
        Ok(())
    }
}

fn validate_frame(track: usize, frame: &FrameSpec) -> Result<(), ScenarioError> {
    for child in &frame.children {
        match child {
            AreaSpec::Span(span) => {
                if !span.extent.is_finite() || span.extent < 0.0 {
                    return Err(ScenarioError::InvalidExtent {
                        track,
                        frame: frame.label.clone(),
                        extent: span.extent,
                    });
                }
                let mut binding = span.binding.as_ref();
                while let Some(b) = binding {
                    if let Some(injected) = &b.injection {
                        validate_frame(track, injected)?;
                    }
                    binding = b.on_injection_end.as_deref();
                }
            }
            AreaSpec::Frame(sub) => validate_frame(track, sub)?,
        }
    }
    Ok(())
}

/// Parse and validate a JSON scenario.
pub fn parse_scenario(data: &[u8]) -> Result<Scenario, ScenarioError> {
    let scenario: Scenario = serde_json::from_slice(data)?;
    scenario.validate()?;
    Ok(scenario)
}

// --- Builder ---

impl FrameSpec {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: FrameKind::Normal,
            children: Vec::new(),
        }
    }

    /// Build a frame by filling its children in chronological order.
    pub fn build(label: impl Into<String>, fill: impl FnOnce(&mut FrameSpec)) -> Self {
        let mut frame = Self::new(label);
        fill(&mut frame);
        frame
    }

    pub fn with_kind(mut self, kind: FrameKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn span(&mut self, extent: f64) -> &mut Self {
        self.children.push(AreaSpec::Span(SpanSpec {
            extent,
            binding: None,
        }));
        self
    }

    pub fn span_with(&mut self, extent: f64, binding: EventBinding) -> &mut Self {
        self.children.push(AreaSpec::Span(SpanSpec {
            extent,
            binding: Some(binding),
        }));
        self
    }

    pub fn frame(&mut self, label: impl Into<String>, fill: impl FnOnce(&mut FrameSpec)) -> &mut Self {
        self.children.push(AreaSpec::Frame(Self::build(label, fill)));
        self
    }

    pub fn frame_of_kind(
        &mut self,
        label: impl Into<String>,
        kind: FrameKind,
        fill: impl FnOnce(&mut FrameSpec),
    ) -> &mut Self {
        self.children
            .push(AreaSpec::Frame(Self::build(label, fill).with_kind(kind)));
        self
    }
}

impl TrackSpec {
    pub fn new(root: FrameSpec) -> Self {
        Self {
            name: None,
            y: None,
            root,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, y: f64) -> Self {
        self.y = Some(y);
        self
    }
}
