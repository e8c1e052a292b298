use chrono::DateTime;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};
use rust_i18n::t;

use crate::store::schema::SavedProblem;
use crate::ui::theme::Theme;

/// Saved problems, newest first, two rows per entry.
pub struct LibraryList<'a> {
    pub problems: &'a [SavedProblem],
    pub selected: usize,
    pub theme: &'a Theme,
}

const ROWS_PER_ENTRY: usize = 2;

fn saved_date(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// First visible entry so that `selected` stays on screen.
pub fn first_visible(selected: usize, visible_entries: usize) -> usize {
    if visible_entries == 0 {
        return selected;
    }
    selected.saturating_sub(visible_entries - 1)
}

impl Widget for &LibraryList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let block = Block::bordered()
            .title(format!(" {} ({}) ", t!("panel.library"), self.problems.len()))
            .border_style(Style::default().fg(colors.accent()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        if self.problems.is_empty() {
            Paragraph::new(Line::from(Span::styled(
                format!(" {}", t!("panel.empty_library")),
                Style::default().fg(colors.text_muted()),
            )))
            .render(inner, buf);
            return;
        }

        let visible = inner.height as usize / ROWS_PER_ENTRY;
        let start = first_visible(self.selected, visible);
        let mut lines = Vec::new();
        for (i, problem) in self.problems.iter().enumerate().skip(start).take(visible) {
            let is_selected = i == self.selected;
            let row_style = if is_selected {
                Style::default().bg(colors.selection_bg())
            } else {
                Style::default()
            };
            let star = if problem.is_favorite { "★ " } else { "  " };
            let indicator = if is_selected { ">" } else { " " };
            lines.push(
                Line::from(vec![
                    Span::styled(format!("{indicator} "), Style::default().fg(colors.accent())),
                    Span::styled(star, Style::default().fg(colors.favorite())),
                    Span::styled(
                        problem.title.clone(),
                        Style::default().fg(colors.fg()).add_modifier(if is_selected {
                            Modifier::BOLD
                        } else {
                            Modifier::empty()
                        }),
                    ),
                ])
                .style(row_style),
            );
            let mut meta = vec![Span::styled(
                format!("    {}", saved_date(problem.timestamp)),
                Style::default().fg(colors.text_muted()),
            )];
            for tag in &problem.tags {
                meta.push(Span::raw(" "));
                meta.push(Span::styled(
                    format!("#{tag}"),
                    Style::default().fg(colors.highlight()),
                ));
            }
            lines.push(Line::from(meta).style(row_style));
        }
        Paragraph::new(lines).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_scrolls_into_view() {
        assert_eq!(first_visible(0, 5), 0);
        assert_eq!(first_visible(4, 5), 0);
        assert_eq!(first_visible(7, 5), 3);
        assert_eq!(first_visible(3, 0), 3);
    }

    #[test]
    fn dates_render_from_millis() {
        assert_eq!(saved_date(0), "1970-01-01");
        assert_eq!(saved_date(1_700_000_000_000), "2023-11-14");
    }
}
