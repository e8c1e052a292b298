use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};
use rust_i18n::t;

use crate::session::problem::{LoadingState, ProblemSession};
use crate::ui::components::markup_view;
use crate::ui::theme::Theme;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputTab {
    Solution,
    Drills,
}

/// Speech state shown next to the tabs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioStatus {
    Silent,
    Generating,
    Playing,
}

pub struct SolutionView<'a> {
    pub session: &'a ProblemSession,
    pub tab: OutputTab,
    pub scroll: u16,
    pub audio: AudioStatus,
    pub focused: bool,
    pub theme: &'a Theme,
}

impl SolutionView<'_> {
    fn tab_line(&self) -> Line<'static> {
        let colors = &self.theme.colors;
        let tab_span = |label: String, active: bool| {
            let style = if active {
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(colors.text_muted())
            };
            Span::styled(format!(" {label} "), style)
        };

        let mut spans = vec![
            tab_span(t!("panel.solution").to_string(), self.tab == OutputTab::Solution),
            Span::styled("│", Style::default().fg(colors.border())),
            tab_span(t!("panel.drills").to_string(), self.tab == OutputTab::Drills),
        ];
        let audio = match self.audio {
            AudioStatus::Silent => None,
            AudioStatus::Generating => Some(t!("status.speech_generating").to_string()),
            AudioStatus::Playing => Some(format!("♪ {}", t!("status.speech_playing"))),
        };
        if let Some(audio) = audio {
            spans.push(Span::styled(
                format!("   {audio}"),
                Style::default().fg(colors.highlight()),
            ));
        }
        if self.session.is_generating_drills() {
            spans.push(Span::styled(
                format!("   {}", t!("status.drills_pending")),
                Style::default().fg(colors.highlight()),
            ));
        }
        Line::from(spans)
    }

    fn body_lines(&self, width: u16) -> Vec<Line<'static>> {
        let colors = &self.theme.colors;
        let muted = |text: String| vec![Line::from(Span::styled(text, Style::default().fg(colors.text_muted())))];

        if self.session.loading_state() == LoadingState::Analyzing {
            return vec![Line::from(Span::styled(
                t!("status.analyzing").to_string(),
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            ))];
        }

        match self.tab {
            OutputTab::Solution if self.session.solution().is_empty() => {
                muted(t!("panel.empty_solution").to_string())
            }
            OutputTab::Solution => markup_view::styled_lines(self.session.solution(), colors, width),
            OutputTab::Drills if self.session.drills().is_empty() => {
                if self.session.is_generating_drills() {
                    muted(t!("status.drills_pending").to_string())
                } else {
                    muted(t!("hint.drills").to_string())
                }
            }
            OutputTab::Drills => markup_view::styled_lines(self.session.drills(), colors, width),
        }
    }
}

impl Widget for &SolutionView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let border = if self.focused {
            colors.border_focused()
        } else {
            colors.border()
        };
        let block = Block::bordered()
            .title(self.tab_line())
            .border_style(Style::default().fg(border))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let error = self.session.error();
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(if error.is_some() { 2 } else { 0 }),
                Constraint::Min(1),
            ])
            .split(inner);

        if let Some(operation) = error {
            let banner = Line::from(Span::styled(
                format!(" ✗ {}", operation.failure_message()),
                Style::default()
                    .fg(colors.error())
                    .add_modifier(Modifier::BOLD),
            ));
            Paragraph::new(banner).render(layout[0], buf);
        }

        Paragraph::new(self.body_lines(layout[1].width))
            .wrap(Wrap { trim: false })
            .scroll((self.scroll, 0))
            .render(layout[1], buf);
    }
}
