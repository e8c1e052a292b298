use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Widget, Wrap};

use crate::ui::components::markup_view;
use crate::ui::theme::Theme;

/// Overlay showing the learning-analysis report.
pub struct ReportView<'a> {
    pub html: &'a str,
    pub title: &'a str,
    pub hint: &'a str,
    pub scroll: u16,
    pub theme: &'a Theme,
}

impl Widget for &ReportView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        Clear.render(area, buf);
        let block = Block::bordered()
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(colors.accent()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        Paragraph::new(markup_view::styled_lines(self.html, colors, layout[0].width))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .render(layout[0], buf);
        Paragraph::new(Line::from(Span::styled(
            format!(" {}", self.hint),
            Style::default().fg(colors.text_muted()),
        )))
        .render(layout[1], buf);
    }
}
