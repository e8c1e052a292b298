use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Widget, Wrap};

use crate::ui::line_input::LineInput;
use crate::ui::theme::Theme;

/// What a modal dialog asks of the student.
pub enum DialogBody<'a> {
    /// A yes/no question.
    Confirm(&'a str),
    /// A message that only needs acknowledging.
    Alert(&'a str),
    /// A one-line answer.
    Prompt { label: &'a str, input: &'a LineInput },
}

pub struct Dialog<'a> {
    pub title: &'a str,
    pub body: DialogBody<'a>,
    pub hint: &'a str,
    pub theme: &'a Theme,
}

impl Widget for &Dialog<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let border = match self.body {
            DialogBody::Alert(_) => colors.warning(),
            _ => colors.accent(),
        };
        Clear.render(area, buf);
        let block = Block::bordered()
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let text_style = Style::default().fg(colors.fg());
        let lines = match &self.body {
            DialogBody::Confirm(message) | DialogBody::Alert(message) => {
                vec![Line::from(""), Line::from(Span::styled(format!(" {message}"), text_style))]
            }
            DialogBody::Prompt { label, input } => {
                let cursor_style = Style::default().fg(colors.bg()).bg(colors.accent());
                let mut field = input.area().render_lines(text_style, cursor_style, true);
                let mut lines = vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        format!(" {label}"),
                        Style::default().fg(colors.text_muted()),
                    )),
                ];
                if let Some(first) = field.first_mut() {
                    first.spans.insert(0, Span::styled(" > ", Style::default().fg(colors.accent())));
                }
                lines.append(&mut field);
                if input.completion_error {
                    lines.push(Line::from(Span::styled(
                        " ✗",
                        Style::default().fg(colors.error()),
                    )));
                }
                lines
            }
        };
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(layout[0], buf);

        Paragraph::new(Line::from(Span::styled(
            format!(" {}", self.hint),
            Style::default()
                .fg(colors.text_muted())
                .add_modifier(Modifier::ITALIC),
        )))
        .render(layout[1], buf);
    }
}
