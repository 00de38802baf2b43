use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Block,
};
use stepreel_core::scheduler::drain;
use stepreel_core::{Config, Placed, ResumeSignal, Snapshot, Stage};
use stepreel_protocol::{EdgeStyle, MarkerKind, ThemeToken, TimedCommand};
use tokio::sync::mpsc::UnboundedReceiver;

const FRAME_INTERVAL: Duration = Duration::from_millis(33);

fn theme_to_color(token: ThemeToken) -> Color {
    match token {
        ThemeToken::FrameDepth0 => Color::Rgb(255, 165, 0),
        ThemeToken::FrameDepth1 => Color::Blue,
        ThemeToken::FrameDepth2 => Color::Rgb(0, 100, 0),
        ThemeToken::EvaluationFrame => Color::Magenta,
        ThemeToken::FrameStroke | ThemeToken::FrameLabel => Color::White,
        ThemeToken::TrackBackground => Color::Rgb(138, 43, 226),
        ThemeToken::TrackLabel | ThemeToken::CaptionText => Color::Gray,
        ThemeToken::CoroutineEdge => Color::Yellow,
        ThemeToken::BreakpointMarker => Color::Red,
        ThemeToken::PausedMarker => Color::LightYellow,
        ThemeToken::NowCursor => Color::White,
        ThemeToken::BannerBackground => Color::DarkGray,
        ThemeToken::BannerText => Color::White,
        ThemeToken::Background => Color::Rgb(43, 43, 43),
    }
}

/// Maps scene pixels onto terminal cells.
struct Grid {
    area: Rect,
    sx: f64,
    sy: f64,
}

impl Grid {
    fn new(area: Rect, config: &Config) -> Self {
        Self {
            area,
            sx: f64::from(area.width) / config.window_width,
            sy: f64::from(area.height) / config.window_height,
        }
    }

    fn col(&self, x: f64) -> Option<u16> {
        let col = (x * self.sx).floor();
        (col >= 0.0 && col < f64::from(self.area.width)).then(|| self.area.x + col as u16)
    }

    fn row(&self, y: f64) -> Option<u16> {
        let row = (y * self.sy).floor();
        (row >= 0.0 && row < f64::from(self.area.height)).then(|| self.area.y + row as u16)
    }

    /// Columns covered by `[x, x + w)`, clipped to the area.
    fn cols(&self, x: f64, w: f64) -> std::ops::Range<u16> {
        let max = f64::from(self.area.width);
        let start = (x * self.sx).floor().clamp(0.0, max) as u16;
        let end = ((x + w) * self.sx).ceil().clamp(0.0, max) as u16;
        self.area.x + start..self.area.x + end
    }

    fn rows(&self, y: f64, h: f64) -> std::ops::Range<u16> {
        let max = f64::from(self.area.height);
        let start = (y * self.sy).floor().clamp(0.0, max) as u16;
        let end = ((y + h) * self.sy).ceil().clamp(0.0, max) as u16;
        self.area.y + start..self.area.y + end.max(start + 1).min(max as u16)
    }
}

fn put_text(buf: &mut Buffer, grid: &Grid, x: u16, y: u16, text: &str, style: Style) {
    let right = grid.area.x + grid.area.width;
    for (i, ch) in text.chars().enumerate() {
        let cx = x.saturating_add(i as u16);
        if cx >= right {
            break;
        }
        buf[(cx, y)].set_char(ch).set_style(style);
    }
}

fn draw_snapshot(buf: &mut Buffer, grid: &Grid, snapshot: &Snapshot) {
    for item in &snapshot.items {
        match item {
            Placed::Track { y, height, .. } => {
                let bg = theme_to_color(ThemeToken::TrackBackground);
                for row in grid.rows(*y, *height) {
                    for col in grid.area.x..grid.area.x + grid.area.width {
                        buf[(col, row)].set_char(' ').set_bg(bg);
                    }
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
                if *opacity < 0.5 {
                    continue;
                }
                let bg = theme_to_color(*color);
                let cols = grid.cols(rect.x, rect.w);
                let rows = grid.rows(rect.y, rect.h);
                for row in rows.clone() {
                    for col in cols.clone() {
                        buf[(col, row)].set_char(' ').set_bg(bg);
                    }
                }
                if let Some(edges) = edges {
                    let edge = Style::default()
                        .fg(theme_to_color(ThemeToken::CoroutineEdge))
                        .bg(bg);
                    let sides = [
                        (cols.start, edges.open),
                        (cols.end.saturating_sub(1), edges.close),
                    ];
                    for (col, style) in sides {
                        if cols.is_empty() {
                            break;
                        }
                        let ch = match style {
                            EdgeStyle::Solid => '┃',
                            EdgeStyle::Dashed => '┆',
                        };
                        for row in rows.clone() {
                            buf[(col, row)].set_char(ch).set_style(edge);
                        }
                    }
                }
                if !cols.is_empty() && !rows.is_empty() && !label.is_empty() {
                    let width = usize::from(cols.end - cols.start);
                    let text: String = label.chars().take(width.saturating_sub(1)).collect();
                    let style = Style::default()
                        .fg(theme_to_color(ThemeToken::FrameLabel))
                        .bg(bg);
                    put_text(buf, grid, cols.start + 1, rows.start, &text, style);
                }
            }
            Placed::Marker {
                x, y, height, kind, ..
            } => {
                let Some(col) = grid.col(*x) else {
                    continue;
                };
                let (token, ch) = match kind {
                    MarkerKind::Breakpoint => (ThemeToken::BreakpointMarker, '●'),
                    MarkerKind::Paused => (ThemeToken::PausedMarker, '▌'),
                };
                let fg = theme_to_color(token);
                for row in grid.rows(*y, *height) {
                    buf[(col, row)].set_char(ch).set_fg(fg);
                }
            }
            Placed::Cursor { x } => {
                let Some(col) = grid.col(*x) else {
                    continue;
                };
                let fg = theme_to_color(ThemeToken::NowCursor);
                for row in grid.area.y..grid.area.y + grid.area.height {
                    buf[(col, row)].set_char('│').set_fg(fg);
                }
            }
            Placed::Caption { text, at, .. } => {
                let (Some(col), Some(row)) = (grid.col(at.x), grid.row(at.y)) else {
                    continue;
                };
                let style = Style::default().fg(theme_to_color(ThemeToken::CaptionText));
                put_text(buf, grid, col, row, text, style);
            }
            Placed::Banner { text, at, .. } => {
                let half = (text.chars().count() as f64 / 2.0) / grid.sx;
                let (Some(col), Some(row)) = (grid.col((at.x - half).max(0.0)), grid.row(at.y))
                else {
                    continue;
                };
                let style = Style::default()
                    .fg(theme_to_color(ThemeToken::BannerText))
                    .bg(theme_to_color(ThemeToken::BannerBackground));
                put_text(buf, grid, col, row, &format!(" {text} "), style);
            }
        }
    }
}

/// Replay the scheduler's command stream until the user quits.
///
/// `space` releases a permanent pause, `q`/`Esc` quits.
pub fn play(
    mut rx: UnboundedReceiver<TimedCommand>,
    resume: &ResumeSignal,
    config: &Config,
    title: &str,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let started = Instant::now();
    let mut stage = Stage::new();

    loop {
        let received = drain(&mut rx);
        stage.extend(&received);
        let now_ms = started.elapsed().as_secs_f64() * 1000.0;
        let snapshot = stage.snapshot(now_ms);

        terminal.draw(|frame| {
            let area = frame.area();

            let header_area = Rect::new(0, 0, area.width, 1);
            let header = Block::default()
                .title(format!(" stepreel: {title} | space resume | q quit "))
                .style(Style::default().fg(Color::White).bg(Color::DarkGray));
            frame.render_widget(header, header_area);

            let content_area = Rect::new(0, 1, area.width, area.height.saturating_sub(1));
            let background = Block::default()
                .style(Style::default().bg(theme_to_color(ThemeToken::Background)));
            frame.render_widget(background, content_area);

            let grid = Grid::new(content_area, config);
            draw_snapshot(frame.buffer_mut(), &grid, &snapshot);
        })?;

        if event::poll(FRAME_INTERVAL)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Char(' ') => {
                    tracing::debug!("resume requested");
                    resume.resume();
                }
                _ => {}
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}
