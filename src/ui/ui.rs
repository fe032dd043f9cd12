use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};
use ratatui_image::{picker::Picker, protocol::StatefulProtocol, Resize, StatefulImage};

use crate::backend::cache::Bitmap;
use crate::ui::player::PlaybackState;
use crate::ui::render::RenderSink;
use crate::viewer::ViewerStatus;

#[derive(Clone, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
    Failed,
}

pub struct App {
    pub state: AppState,
    pub message: String,
    pub picker: Option<Picker>,
    pub frame: Option<StatefulProtocol>,
    pub surface: Option<(u32, u32)>,
    dirty: bool,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        let picker = Picker::from_query_stdio().ok();

        Self {
            state: AppState::Loading,
            message: "Initializing...".to_string(),
            picker,
            frame: None,
            surface: None,
            dirty: true,
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.message = message.to_string();
        self.dirty = true;
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
        self.dirty = true;
    }

    pub fn set_failed(&mut self, message: String) {
        self.state = AppState::Failed;
        self.message = message;
        self.dirty = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl RenderSink for App {
    fn draw(&mut self, _position: usize, bitmap: &Bitmap) {
        self.surface = Some((bitmap.width(), bitmap.height()));
        self.frame = self
            .picker
            .as_ref()
            .map(|picker| picker.new_resize_protocol(bitmap.as_ref().clone()));
        self.dirty = true;
    }
}

pub fn ui(f: &mut Frame, app: &mut App, status: Option<&ViewerStatus>) {
    match (app.state.clone(), status) {
        (AppState::Ready, Some(status)) => draw_viewer(f, app, status),
        (AppState::Failed, _) => {
            draw_message(f, "Failed to load images", &app.message, Color::Red)
        }
        _ => draw_message(f, "Loading...", &app.message, Color::Cyan),
    }
}

fn draw_message(f: &mut Frame, headline: &str, message: &str, color: Color) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("dashview")
        .border_style(Style::default().fg(color));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let headline = Paragraph::new(Line::from(Span::styled(
        headline.to_string(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    f.render_widget(headline, center_layout[1]);

    let message = Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_viewer(f: &mut Frame, app: &mut App, status: &ViewerStatus) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // image
            Constraint::Length(3), // slider
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_image(f, root[0], app, status);
    draw_slider(f, root[1], status);
    draw_footer(f, root[2], status);
}

/// Date and pixel size of the frame on screen, plus the requested date
/// while it is still loading.
fn image_title(status: &ViewerStatus, surface: Option<(u32, u32)>) -> String {
    let mut title = match (status.rendered_label.as_deref(), surface) {
        (Some(label), Some((w, h))) => format!("{label}  {w}x{h}"),
        (Some(label), None) => label.to_string(),
        (None, _) => "dashview".to_string(),
    };
    if status.rendered != Some(status.requested) {
        if let Some(wanted) = status.label.as_deref() {
            title.push_str(&format!("  → {wanted}"));
        }
    }
    title
}

fn fetch_summary(status: &ViewerStatus) -> String {
    let mut summary = format!(
        "cached {}/{}  fetching {}  ",
        status.cached, status.len, status.in_flight
    );
    if status.stats.failed > 0 || status.stats.cancelled > 0 {
        summary.push_str(&format!(
            "failed {}  cancelled {}  ",
            status.stats.failed, status.stats.cancelled
        ));
    }
    summary
}

fn draw_image(f: &mut Frame, area: Rect, app: &mut App, status: &ViewerStatus) {
    let title = image_title(status, app.surface);
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    if status.len == 0 {
        let empty = Paragraph::new("No images to show")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, inner);
        return;
    }

    match app.frame.as_mut() {
        Some(state) => {
            let image_widget = StatefulImage::new().resize(Resize::Scale(None));
            f.render_stateful_widget(image_widget, inner, state);
        }
        None => {
            let text = if app.picker.is_none() && status.rendered.is_some() {
                "Terminal does not support images"
            } else {
                "Loading..."
            };
            let placeholder = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled(text, Style::default().fg(Color::DarkGray))),
            ])
            .alignment(Alignment::Center);
            f.render_widget(placeholder, inner);
        }
    }

    let stale = status.rendered.is_some_and(|shown| shown != status.requested);
    if stale && inner.width > 12 {
        let badge = Paragraph::new(Span::styled(
            " loading… ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        ));
        f.render_widget(badge, Rect::new(inner.x, inner.y, 10, 1));
    }
}

fn draw_slider(f: &mut Frame, area: Rect, status: &ViewerStatus) {
    let ratio = if status.len == 0 {
        0.0
    } else {
        (status.requested + 1) as f64 / status.len as f64
    };
    let label = if status.len == 0 {
        String::from("0 of 0")
    } else {
        format!("{} of {}", status.requested + 1, status.len)
    };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Yellow).bg(Color::Black))
        .ratio(ratio.clamp(0.0, 1.0))
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_footer(f: &mut Frame, area: Rect, status: &ViewerStatus) {
    let (symbol, color) = match status.playback {
        PlaybackState::Autoplaying => ("▶", Color::Green),
        PlaybackState::Scrubbing => ("⇄", Color::Yellow),
        PlaybackState::Idle => ("⏸", Color::DarkGray),
    };

    let text = Line::from(vec![
        Span::styled(
            format!("{symbol} "),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{}ms  ", status.period.as_millis())),
        Span::styled(fetch_summary(status), Style::default().fg(Color::DarkGray)),
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(": step  "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(": scrub  "),
        Span::styled("space", Style::default().fg(Color::Yellow)),
        Span::raw(": play  "),
        Span::styled("+/-", Style::default().fg(Color::Yellow)),
        Span::raw(": speed  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(": quit"),
    ]);

    let p = Paragraph::new(text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}
