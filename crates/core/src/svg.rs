//! SVG renderer: converts a stage [`Snapshot`] into a standalone SVG string.

use stepreel_protocol::{EdgeStyle, MarkerKind, ThemeToken};

use crate::playback::{Placed, Snapshot};

const MARKER_WIDTH: f64 = 6.0;

/// Render a snapshot as an SVG document string.
///
/// `width` and `height` define the SVG viewBox dimensions.
pub fn render_svg(snapshot: &Snapshot, width: f64, height: f64) -> String {
    let mut svg = String::with_capacity(snapshot.items.len() * 200);
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" style="font-family:system-ui,-apple-system,sans-serif">"#,
    ));
    svg.push_str(&format!(
        r#"<rect width="{width}" height="{height}" fill="{}"/>"#,
        resolve_color(ThemeToken::Background),
    ));

    for item in &snapshot.items {
        match item {
            Placed::Track {
                y, height: h, label, ..
            } => {
                svg.push_str(&format!(
                    r#"<rect x="0" y="{y}" width="{width}" height="{h}" fill="{}"/>"#,
                    resolve_color(ThemeToken::TrackBackground),
                ));
                if let Some(label) = label {
                    svg.push_str(&format!(
                        r#"<text x="4" y="{}" font-size="12" fill="{}">{}</text>"#,
                        y + h + 14.0,
                        resolve_color(ThemeToken::TrackLabel),
                        escape_xml(label),
                    ));
                }
            }
            Placed::Frame {
                rect,
                color,
                label,
                edges,
                opacity,
                ..
            } => {
                if *opacity <= 0.0 {
                    continue;
                }
                svg.push_str(&format!(
                    r#"<g opacity="{opacity}"><rect x="{}" y="{}" width="{}" height="{}" rx="4" fill="{}" stroke="{}" stroke-width="1.5"/>"#,
                    rect.x,
                    rect.y,
                    rect.w,
                    rect.h,
                    resolve_color(*color),
                    resolve_color(ThemeToken::FrameStroke),
                ));
                if let Some(edges) = edges {
                    for (x, style) in [(rect.x, edges.open), (rect.right(), edges.close)] {
                        let dash = match style {
                            EdgeStyle::Solid => "",
                            EdgeStyle::Dashed => r#" stroke-dasharray="4 3""#,
                        };
                        svg.push_str(&format!(
                            r#"<line x1="{x}" y1="{}" x2="{x}" y2="{}" stroke="{}" stroke-width="3"{dash}/>"#,
                            rect.y,
                            rect.y + rect.h,
                            resolve_color(ThemeToken::CoroutineEdge),
                        ));
                    }
                    svg.push_str(&format!(
                        "<title>{}</title>",
                        escape_xml(&edges.coroutine)
                    ));
                }
                if !label.is_empty() {
                    svg.push_str(&format!(
                        r#"<text x="{}" y="{}" font-size="{}" fill="{}" style="pointer-events:none">{}</text>"#,
                        rect.x + 4.0,
                        rect.y + rect.h * 0.6,
                        (rect.h * 0.4).max(8.0),
                        resolve_color(ThemeToken::FrameLabel),
                        escape_xml(label),
                    ));
                }
                svg.push_str("</g>");
            }
            Placed::Marker {
                x,
                y,
                height: h,
                kind,
                ..
            } => {
                let token = match kind {
                    MarkerKind::Breakpoint => ThemeToken::BreakpointMarker,
                    MarkerKind::Paused => ThemeToken::PausedMarker,
                };
                svg.push_str(&format!(
                    r#"<rect x="{}" y="{y}" width="{MARKER_WIDTH}" height="{h}" rx="3" fill="{}"/>"#,
                    x - MARKER_WIDTH / 2.0,
                    resolve_color(token),
                ));
            }
            Placed::Cursor { x } => {
                svg.push_str(&format!(
                    r#"<line x1="{x}" y1="0" x2="{x}" y2="{height}" stroke="{}" stroke-width="2" stroke-opacity="0.5"/>"#,
                    resolve_color(ThemeToken::NowCursor),
                ));
            }
            Placed::Caption { text, at, .. } => {
                svg.push_str(&format!(
                    r#"<text x="{}" y="{}" font-size="16" fill="{}">{}</text>"#,
                    at.x,
                    at.y,
                    resolve_color(ThemeToken::CaptionText),
                    escape_xml(text),
                ));
            }
            Placed::Banner { text, at, .. } => {
                let w = text.chars().count() as f64 * 8.0 + 16.0;
                svg.push_str(&format!(
                    r#"<rect x="{}" y="{}" width="{w}" height="22" rx="4" fill="{}"/><text x="{}" y="{}" font-size="13" fill="{}">{}</text>"#,
                    at.x - w / 2.0,
                    at.y - 15.0,
                    resolve_color(ThemeToken::BannerBackground),
                    at.x - w / 2.0 + 8.0,
                    at.y,
                    resolve_color(ThemeToken::BannerText),
                    escape_xml(text),
                ));
            }
        }
    }

    svg.push_str("</svg>");
    svg
}

fn resolve_color(token: ThemeToken) -> &'static str {
    match token {
        ThemeToken::FrameDepth0 => "#ffa500",
        ThemeToken::FrameDepth1 => "#3f51b5",
        ThemeToken::FrameDepth2 => "#006400",
        ThemeToken::EvaluationFrame => "#8e24aa",
        ThemeToken::FrameStroke | ThemeToken::FrameLabel => "#ffffff",
        ThemeToken::TrackBackground => "#8a2be2",
        ThemeToken::TrackLabel | ThemeToken::CaptionText => "#ececec",
        ThemeToken::CoroutineEdge => "#ffd600",
        ThemeToken::BreakpointMarker => "#e53935",
        ThemeToken::PausedMarker => "#fdd835",
        ThemeToken::NowCursor => "#ffffff",
        ThemeToken::BannerBackground => "#424242",
        ThemeToken::BannerText => "#fafafa",
        ThemeToken::Background => "#2b2b2b",
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
