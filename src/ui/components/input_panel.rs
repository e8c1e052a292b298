use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};
use rust_i18n::t;

use crate::session::problem::ProblemSession;
use crate::ui::text_area::TextArea;
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputField {
    Problem,
    Verification,
}

/// Problem entry column: typed text, the attached image and, once
/// recognized, the editable verification text.
pub struct InputPanel<'a> {
    pub session: &'a ProblemSession,
    pub problem: &'a TextArea,
    pub verification: &'a TextArea,
    pub focus: Option<InputField>,
    pub theme: &'a Theme,
}

impl InputPanel<'_> {
    fn editor_block(&self, title: String, field: InputField) -> Block<'static> {
        let colors = &self.theme.colors;
        let border = if self.focus == Some(field) {
            colors.border_focused()
        } else {
            colors.border()
        };
        Block::bordered()
            .title(title)
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(colors.bg()))
    }

    fn render_editor(&self, area: TextAreaView<'_>, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let focused = self.focus == Some(area.field);
        let block = self.editor_block(area.title, area.field);
        let inner = block.inner(area.rect);
        block.render(area.rect, buf);

        let text_style = Style::default().fg(colors.fg());
        let cursor_style = Style::default().fg(colors.bg()).bg(colors.accent());
        let lines = area.editor.render_lines(text_style, cursor_style, focused);
        let (cursor_line, _) = area.editor.cursor_position();
        let scroll = cursor_line.saturating_sub(inner.height.saturating_sub(1) as usize) as u16;
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .render(inner, buf);
    }
}

struct TextAreaView<'a> {
    rect: Rect,
    title: String,
    field: InputField,
    editor: &'a TextArea,
}

impl Widget for &InputPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let affordances = self.session.affordances();

        let constraints = if affordances.verification_editor {
            vec![
                Constraint::Percentage(45),
                Constraint::Length(3),
                Constraint::Min(4),
            ]
        } else {
            vec![Constraint::Min(4), Constraint::Length(3), Constraint::Length(2)]
        };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        self.render_editor(
            TextAreaView {
                rect: layout[0],
                title: format!(" {} ", t!("panel.input")),
                field: InputField::Problem,
                editor: self.problem,
            },
            buf,
        );

        let image_block = Block::bordered()
            .title(format!(" {} ", t!("panel.image")))
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        let image_inner = image_block.inner(layout[1]);
        image_block.render(layout[1], buf);
        let image_line = match self.session.selected_image() {
            Some(image) => Line::from(vec![
                Span::styled("▣ ", Style::default().fg(colors.accent())),
                Span::styled(image.preview.clone(), Style::default().fg(colors.fg())),
                Span::styled(
                    format!("  {} KB", image.size_bytes.div_ceil(1024)),
                    Style::default().fg(colors.text_muted()),
                ),
            ]),
            None => Line::from(Span::styled(
                t!("panel.no_image").to_string(),
                Style::default().fg(colors.text_muted()),
            )),
        };
        Paragraph::new(image_line).render(image_inner, buf);

        if affordances.verification_editor {
            self.render_editor(
                TextAreaView {
                    rect: layout[2],
                    title: format!(" {} ", t!("panel.verification")),
                    field: InputField::Verification,
                    editor: self.verification,
                },
                buf,
            );
        } else if affordances.verify_button {
            let style = if affordances.verify_enabled {
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text_muted())
            };
            let label = if self.session.is_verifying() {
                t!("status.verifying").to_string()
            } else {
                t!("hint.verify").to_string()
            };
            Paragraph::new(Line::from(Span::styled(format!(" {label}"), style)))
                .render(layout[2], buf);
        }
    }
}
