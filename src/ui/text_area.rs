use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::style::Style;
use ratatui::text::{Line, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputResult {
    Continue,
    Changed,
    Submit,
    Cancel,
}

/// Editable text buffer. In multi-line mode Enter inserts a newline and
/// Up/Down move between lines; single-line mode treats Enter as submit.
pub struct TextArea {
    text: String,
    /// Cursor position as a char index.
    cursor: usize,
    multiline: bool,
}

impl TextArea {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            cursor: text.chars().count(),
            multiline: false,
        }
    }

    pub fn multiline(text: &str) -> Self {
        Self {
            multiline: true,
            ..Self::new(text)
        }
    }

    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replace the whole content and park the cursor at the end.
    pub fn set_value(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.char_len();
    }

    fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    fn char_to_byte(&self, char_idx: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.text.len())
    }

    /// (line, column) of the cursor, both in chars.
    pub fn cursor_position(&self) -> (usize, usize) {
        let mut line = 0;
        let mut col = 0;
        for ch in self.text.chars().take(self.cursor) {
            if ch == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    /// Char index of the first char on the line holding `idx`.
    fn line_start(&self, idx: usize) -> usize {
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = idx.min(chars.len());
        while pos > 0 && chars[pos - 1] != '\n' {
            pos -= 1;
        }
        pos
    }

    fn line_end(&self, idx: usize) -> usize {
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = idx.min(chars.len());
        while pos < chars.len() && chars[pos] != '\n' {
            pos += 1;
        }
        pos
    }

    pub fn insert_char(&mut self, ch: char) {
        let byte_offset = self.char_to_byte(self.cursor);
        self.text.insert(byte_offset, ch);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        for ch in s.chars().filter(|c| *c != '\r') {
            if ch == '\n' && !self.multiline {
                continue;
            }
            self.insert_char(ch);
        }
    }

    fn remove_range(&mut self, from: usize, to: usize) {
        let start = self.char_to_byte(from);
        let end = self.char_to_byte(to);
        self.text.replace_range(start..end, "");
        self.cursor = from;
    }

    fn delete_word_back(&mut self) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut pos = self.cursor;
        while pos > 0 && chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        while pos > 0 && !chars[pos - 1].is_whitespace() {
            pos -= 1;
        }
        self.remove_range(pos, self.cursor);
    }

    fn move_vertical(&mut self, down: bool) {
        let (_, col) = self.cursor_position();
        let start = self.line_start(self.cursor);
        let end = self.line_end(self.cursor);
        let target_start = if down {
            if end >= self.char_len() {
                return;
            }
            end + 1
        } else {
            if start == 0 {
                return;
            }
            self.line_start(start - 1)
        };
        let target_end = self.line_end(target_start);
        self.cursor = (target_start + col).min(target_end);
    }

    pub fn handle(&mut self, key: KeyEvent) -> InputResult {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let before = self.text.len();
        match key.code {
            KeyCode::Esc => return InputResult::Cancel,
            KeyCode::Enter if self.multiline && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.insert_char('\n');
            }
            KeyCode::Enter => return InputResult::Submit,
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.char_len()),
            KeyCode::Up if self.multiline => self.move_vertical(false),
            KeyCode::Down if self.multiline => self.move_vertical(true),
            KeyCode::Home => self.cursor = self.line_start(self.cursor),
            KeyCode::End => self.cursor = self.line_end(self.cursor),
            KeyCode::Char('a') if ctrl => self.cursor = self.line_start(self.cursor),
            KeyCode::Char('e') if ctrl => self.cursor = self.line_end(self.cursor),
            KeyCode::Backspace if self.cursor > 0 => {
                self.remove_range(self.cursor - 1, self.cursor);
            }
            KeyCode::Delete if self.cursor < self.char_len() => {
                let at = self.cursor;
                self.remove_range(at, at + 1);
            }
            KeyCode::Char('u') if ctrl => {
                let start = self.line_start(self.cursor);
                self.remove_range(start, self.cursor);
            }
            KeyCode::Char('w') if ctrl => self.delete_word_back(),
            KeyCode::Char(ch) if !ctrl => self.insert_char(ch),
            _ => {}
        }
        if self.text.len() != before {
            InputResult::Changed
        } else {
            InputResult::Continue
        }
    }

    /// Styled lines with the cursor drawn as a reversed cell when `focused`.
    pub fn render_lines(&self, style: Style, cursor_style: Style, focused: bool) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let mut spans: Vec<Span<'static>> = Vec::new();
        let mut run = String::new();
        let mut idx = 0;

        for ch in self.text.chars() {
            let at_cursor = focused && idx == self.cursor;
            if ch == '\n' {
                if !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), style));
                }
                if at_cursor {
                    spans.push(Span::styled(" ", cursor_style));
                }
                lines.push(Line::from(std::mem::take(&mut spans)));
            } else if at_cursor {
                if !run.is_empty() {
                    spans.push(Span::styled(std::mem::take(&mut run), style));
                }
                spans.push(Span::styled(ch.to_string(), cursor_style));
            } else {
                run.push(ch);
            }
            idx += 1;
        }
        if !run.is_empty() {
            spans.push(Span::styled(run, style));
        }
        if focused && self.cursor >= idx {
            spans.push(Span::styled(" ", cursor_style));
        }
        lines.push(Line::from(spans));
        lines
    }
}
