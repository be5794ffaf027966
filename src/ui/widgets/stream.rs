use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::config::{self, clamp_time_window};
use crate::feed::session::SessionState;
use crate::feed::timeline::Timeline;
use crate::ui::sentiment_style;

/// Cells a full-scale (5.0) sentiment bar occupies.
const BAR_SCALE: usize = 20;

/// Which stream control is being edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamInput {
    Keyword,
    TimeWindow,
}

/// The live news sentiment stream card: keyword and time-window controls,
/// the streaming indicator, the timeline bars, and the average badge.
#[derive(Debug)]
pub struct StreamPanel {
    pub keyword: String,
    pub time_window_secs: u64,
    pub state: SessionState,
    pub error: Option<String>,
    window_input: String,
    editing: Option<StreamInput>,
    display_window: usize,
}

impl StreamPanel {
    pub fn new(keyword: String, time_window_secs: u64, display_window: usize) -> Self {
        Self {
            keyword,
            time_window_secs: clamp_time_window(time_window_secs),
            state: SessionState::Idle,
            error: None,
            window_input: String::new(),
            editing: None,
            display_window,
        }
    }

    pub fn start_editing(&mut self, input: StreamInput) {
        if input == StreamInput::TimeWindow {
            self.window_input = self.time_window_secs.to_string();
        }
        self.editing = Some(input);
    }

    pub fn is_editing(&self) -> bool {
        self.editing.is_some()
    }

    pub fn add_char(&mut self, c: char) {
        match self.editing {
            Some(StreamInput::Keyword) => self.keyword.push(c),
            Some(StreamInput::TimeWindow) => {
                if c.is_ascii_digit() && self.window_input.len() < 2 {
                    self.window_input.push(c);
                }
            }
            None => {}
        }
    }

    pub fn delete_char(&mut self) {
        match self.editing {
            Some(StreamInput::Keyword) => {
                self.keyword.pop();
            }
            Some(StreamInput::TimeWindow) => {
                self.window_input.pop();
            }
            None => {}
        }
    }

    /// Commit whatever is being edited. A window that does not parse falls
    /// back to the default.
    pub fn finish_editing(&mut self) {
        if self.editing == Some(StreamInput::TimeWindow) {
            self.time_window_secs = match self.window_input.parse() {
                Ok(secs) => clamp_time_window(secs),
                Err(_) => config::Config::default().time_window_secs,
            };
        }
        self.editing = None;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, selected: bool, timeline: &Timeline) {
        let border_style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let block = Block::default()
            .title(" Live News Sentiment Stream ")
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(inner);

        frame.render_widget(Paragraph::new(self.controls_line()), rows[0]);
        frame.render_widget(Paragraph::new(self.hint_line()), rows[1]);
        frame.render_widget(Paragraph::new(self.status_line()), rows[2]);
        self.render_timeline(frame, rows[3], timeline);
        frame.render_widget(Paragraph::new(Self::average_line(timeline)), rows[4]);
    }

    fn field_style(&self, input: StreamInput) -> Style {
        if self.editing == Some(input) {
            Style::default().fg(Color::Yellow)
        } else if self.state == SessionState::Streaming || self.state == SessionState::Stopping {
            // Controls are frozen while a stream is active.
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::White)
        }
    }

    fn controls_line(&self) -> Line<'_> {
        let window_text = if self.editing == Some(StreamInput::TimeWindow) {
            self.window_input.clone()
        } else {
            self.time_window_secs.to_string()
        };
        Line::from(vec![
            Span::styled("Keyword: ", Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("[{}]", self.keyword),
                self.field_style(StreamInput::Keyword),
            ),
            Span::raw("   "),
            Span::styled("Time Window: ", Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("[{window_text}]s"),
                self.field_style(StreamInput::TimeWindow),
            ),
        ])
    }

    fn hint_line(&self) -> Line<'static> {
        let hint = if self.is_editing() {
            "Enter/Esc done editing"
        } else {
            match self.state {
                SessionState::Streaming => "s stop stream",
                SessionState::Stopping => "stopping...",
                SessionState::Idle | SessionState::Stopped => "k keyword | w window | s start",
            }
        };
        Line::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    }

    fn status_line(&self) -> Line<'_> {
        match self.state {
            SessionState::Streaming => Line::from(vec![
                Span::styled("● ", Style::default().fg(Color::Green)),
                Span::styled(
                    format!("Streaming news for \"{}\"...", self.keyword),
                    Style::default().fg(Color::Green),
                ),
            ]),
            SessionState::Stopping => Line::from(Span::styled(
                "Stopping stream...",
                Style::default().fg(Color::Yellow),
            )),
            SessionState::Stopped => match &self.error {
                Some(error) => Line::from(Span::styled(
                    format!("Stream error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                None => Line::from(Span::styled(
                    "Stream stopped",
                    Style::default().fg(Color::DarkGray),
                )),
            },
            SessionState::Idle => Line::from(Span::styled(
                "No stream yet",
                Style::default().fg(Color::DarkGray),
            )),
        }
    }

    fn render_timeline(&self, frame: &mut Frame, area: Rect, timeline: &Timeline) {
        let snapshot = timeline.snapshot(self.display_window);
        if snapshot.recent.is_empty() {
            return;
        }

        let items: Vec<ListItem> = snapshot
            .recent
            .iter()
            .map(|event| {
                let (color, _) = sentiment_style(event.sentiment);
                let width = ((event.sentiment / 5.0) * BAR_SCALE as f64).round() as usize;
                let bar = "█".repeat(width.min(BAR_SCALE));
                ListItem::new(Line::from(vec![
                    Span::styled(
                        event.received_at.format("%H:%M:%S ").to_string(),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(bar, Style::default().fg(color)),
                    Span::raw(" "),
                    Span::styled(
                        format!(
                            "{} articles | Sentiment: {:.2}",
                            event.message_count, event.sentiment
                        ),
                        Style::default().fg(Color::White),
                    ),
                ]))
            })
            .collect();

        frame.render_widget(List::new(items), area);
    }

    fn average_line(timeline: &Timeline) -> Line<'static> {
        match timeline.average() {
            Some(average) => {
                let (color, _) = sentiment_style(average);
                Line::from(vec![
                    Span::styled("Average Sentiment: ", Style::default().fg(Color::Cyan)),
                    Span::styled(
                        format!(" {average:.2}/5 "),
                        Style::default()
                            .bg(color)
                            .fg(Color::Black)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(
                        format!(" over {} samples", timeline.len()),
                        Style::default().fg(Color::DarkGray),
                    ),
                ])
            }
            None => Line::from(""),
        }
    }
}
