use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

use crate::markup::{self, LineKind};
use crate::ui::theme::ThemeColors;

/// AI markup as styled terminal lines.
pub fn styled_lines(source: &str, colors: &ThemeColors, rule_width: u16) -> Vec<Line<'static>> {
    markup::to_lines(source)
        .into_iter()
        .map(|line| match line.kind {
            LineKind::Heading => Line::from(Span::styled(
                line.text,
                Style::default()
                    .fg(colors.heading())
                    .add_modifier(Modifier::BOLD),
            )),
            LineKind::Bullet => Line::from(vec![
                Span::styled("  • ", Style::default().fg(colors.bullet())),
                Span::styled(line.text, Style::default().fg(colors.fg())),
            ]),
            LineKind::Body => Line::from(Span::styled(line.text, Style::default().fg(colors.fg()))),
            LineKind::Rule => Line::from(Span::styled(
                "─".repeat(rule_width as usize),
                Style::default().fg(colors.border()),
            )),
        })
        .collect()
}
