use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutTier {
    Wide,   // ≥100 cols: input and output side by side
    Narrow, // <100 cols: input stacked above output
}

impl LayoutTier {
    pub fn from_area(area: Rect) -> Self {
        if area.width >= 100 {
            LayoutTier::Wide
        } else {
            LayoutTier::Narrow
        }
    }
}

/// Screen split for the workspace. `input` is `None` while focus mode hides
/// the input column.
pub struct AppLayout {
    pub header: Rect,
    pub input: Option<Rect>,
    pub output: Rect,
    pub footer: Rect,
    pub tier: LayoutTier,
}

impl AppLayout {
    pub fn new(area: Rect, show_input: bool, footer_lines: u16) -> Self {
        let tier = LayoutTier::from_area(area);

        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(6),
                Constraint::Length(footer_lines.max(1)),
            ])
            .split(area);

        let (input, output) = if !show_input {
            (None, vertical[1])
        } else {
            let (direction, constraints) = match tier {
                LayoutTier::Wide => (
                    Direction::Horizontal,
                    [Constraint::Percentage(40), Constraint::Percentage(60)],
                ),
                LayoutTier::Narrow => (
                    Direction::Vertical,
                    [Constraint::Percentage(45), Constraint::Percentage(55)],
                ),
            };
            let split = Layout::default()
                .direction(direction)
                .constraints(constraints)
                .split(vertical[1]);
            (Some(split[0]), split[1])
        };

        Self {
            header: vertical[0],
            input,
            output,
            footer: vertical[2],
            tier,
        }
    }
}

pub fn pack_hint_lines(hints: &[&str], width: usize) -> Vec<String> {
    if width == 0 || hints.is_empty() {
        return Vec::new();
    }

    let prefix = " ";
    let separator = "  ";
    let mut out: Vec<String> = Vec::new();
    let mut current = prefix.to_string();
    let mut has_hint = false;

    for hint in hints.iter().filter(|h| !h.is_empty()) {
        let candidate = if has_hint {
            format!("{current}{separator}{hint}")
        } else {
            format!("{current}{hint}")
        };
        if display_width(&candidate) <= width {
            current = candidate;
        } else {
            if has_hint {
                out.push(current);
            }
            current = format!("{prefix}{hint}");
        }
        has_hint = true;
    }

    if has_hint {
        out.push(current);
    }
    out
}

/// Terminal columns taken by `text`, counting CJK characters as two.
pub fn display_width(text: &str) -> usize {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            let wide = (0x1100..=0x115f).contains(&cp)
                || (0x2e80..=0xa4cf).contains(&cp)
                || (0xac00..=0xd7a3).contains(&cp)
                || (0xf900..=0xfaff).contains(&cp)
                || (0xfe30..=0xfe4f).contains(&cp)
                || (0xff00..=0xff60).contains(&cp)
                || (0xffe0..=0xffe6).contains(&cp);
            if wide { 2 } else { 1 }
        })
        .sum()
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    const MIN_POPUP_WIDTH: u16 = 48;
    const MIN_POPUP_HEIGHT: u16 = 7;

    let requested_w = area.width.saturating_mul(percent_x.min(100)) / 100;
    let requested_h = area.height.saturating_mul(percent_y.min(100)) / 100;

    let target_w = requested_w.max(MIN_POPUP_WIDTH).min(area.width);
    let target_h = requested_h.max(MIN_POPUP_HEIGHT).min(area.height);

    let left = area
        .x
        .saturating_add((area.width.saturating_sub(target_w)) / 2);
    let top = area
        .y
        .saturating_add((area.height.saturating_sub(target_h)) / 2);

    Rect::new(left, top, target_w, target_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_screens_put_columns_side_by_side() {
        let layout = AppLayout::new(Rect::new(0, 0, 120, 40), true, 2);
        let input = layout.input.unwrap();
        assert_eq!(layout.tier, LayoutTier::Wide);
        assert_eq!(input.y, layout.output.y);
        assert!(input.x < layout.output.x);
        assert_eq!(layout.footer.height, 2);
    }

    #[test]
    fn narrow_screens_stack_columns() {
        let layout = AppLayout::new(Rect::new(0, 0, 80, 40), true, 1);
        let input = layout.input.unwrap();
        assert_eq!(layout.tier, LayoutTier::Narrow);
        assert!(input.y < layout.output.y);
    }

    #[test]
    fn focus_mode_gives_output_the_whole_body() {
        let area = Rect::new(0, 0, 120, 40);
        let layout = AppLayout::new(area, false, 1);
        assert!(layout.input.is_none());
        assert_eq!(layout.output.width, 120);
    }

    #[test]
    fn hints_wrap_by_display_width() {
        let lines = pack_hint_lines(&["[^R] 识别", "[^S] 解析", "[^Q] 退出"], 22);
        assert_eq!(lines, vec![" [^R] 识别  [^S] 解析", " [^Q] 退出"]);
        assert!(pack_hint_lines(&["a"], 0).is_empty());
    }

    #[test]
    fn display_width_counts_cjk_double() {
        assert_eq!(display_width("ab"), 2);
        assert_eq!(display_width("识别"), 4);
        assert_eq!(display_width("，"), 2);
    }

    #[test]
    fn centered_rect_clamps_to_area() {
        let area = Rect::new(0, 0, 40, 5);
        let rect = centered_rect(50, 50, area);
        assert_eq!(rect, Rect::new(0, 0, 40, 5));
    }
}
