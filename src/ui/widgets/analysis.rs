use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::backend::TextAnalysisResult;
use crate::ui::sentiment_style;

/// The single-shot text analysis card.
#[derive(Debug, Default)]
pub struct AnalysisPanel {
    input: String,
    editing: bool,
    loading: bool,
    result: Option<TextAnalysisResult>,
}

impl AnalysisPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_editing(&mut self) {
        self.editing = true;
    }

    pub fn stop_editing(&mut self) {
        self.editing = false;
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn add_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn delete_char(&mut self) {
        self.input.pop();
    }

    /// The text to submit, or `None` while the input is blank or a request
    /// is already outstanding (the trigger stays disabled until the result
    /// lands).
    pub fn submission(&self) -> Option<String> {
        if self.loading || self.input.trim().is_empty() {
            None
        } else {
            Some(self.input.clone())
        }
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
        self.result = None;
    }

    pub fn set_result(&mut self, result: TextAnalysisResult) {
        self.loading = false;
        self.result = Some(result);
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, selected: bool) {
        let border_style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::White)
        };
        let block = Block::default()
            .title(" Text Sentiment Analysis ")
            .borders(Borders::ALL)
            .border_style(border_style);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(1),
                Constraint::Min(1),
            ])
            .split(inner);

        let input_style = if self.editing {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut shown = self.input.clone();
        if self.editing {
            shown.push('▏');
        }
        let input = Paragraph::new(shown)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(input_style)
                    .title(" Text "),
            );
        frame.render_widget(input, rows[0]);

        let hint = if self.editing {
            "Enter analyze | Esc stop editing"
        } else {
            "e edit text | Enter analyze"
        };
        frame.render_widget(
            Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
            rows[1],
        );

        self.render_result(frame, rows[2]);
    }

    fn render_result(&self, frame: &mut Frame, area: Rect) {
        if self.loading {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "Analyzing...",
                    Style::default().fg(Color::Cyan),
                )),
                area,
            );
            return;
        }

        let result = match &self.result {
            Some(result) => result,
            None => return,
        };

        if let Some(error) = &result.error {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                ))
                .wrap(Wrap { trim: false }),
                area,
            );
        } else if let Some(score) = result.score {
            let (color, label) = sentiment_style(score);
            let line = Line::from(vec![
                Span::styled(
                    format!(" {score:.1}/5 "),
                    Style::default()
                        .bg(color)
                        .fg(Color::Black)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::styled(label, Style::default().fg(color)),
            ]);
            frame.render_widget(Paragraph::new(line), area);
        } else {
            // No parseable score: show the backend's words as-is.
            frame.render_widget(
                Paragraph::new(result.raw.as_str()).wrap(Wrap { trim: false }),
                area,
            );
        }
    }
}
