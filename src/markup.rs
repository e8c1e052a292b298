//! Flattening of the HTML fragments the AI service returns into terminal lines.

use html2text::render::text_renderer::TrivialDecorator;
use scraper::{ElementRef, Html};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Heading,
    Bullet,
    Body,
    Rule,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupLine {
    pub kind: LineKind,
    pub text: String,
}

struct LineBuilder {
    lines: Vec<MarkupLine>,
    current: String,
    kind: LineKind,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            current: String::new(),
            kind: LineKind::Body,
        }
    }

    fn push_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.current.is_empty() && !self.current.ends_with(' ') {
                    self.current.push(' ');
                }
            } else {
                self.current.push(ch);
            }
        }
    }

    fn flush(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.lines.push(MarkupLine {
                kind: self.kind,
                text: text.to_string(),
            });
        }
        self.current.clear();
        self.kind = LineKind::Body;
    }

    fn gap(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| !l.text.is_empty()) {
            self.lines.push(MarkupLine {
                kind: LineKind::Body,
                text: String::new(),
            });
        }
    }

    fn rule(&mut self) {
        self.flush();
        self.lines.push(MarkupLine {
            kind: LineKind::Rule,
            text: String::new(),
        });
    }

    fn finish(mut self) -> Vec<MarkupLine> {
        self.flush();
        while self
            .lines
            .last()
            .is_some_and(|l| l.kind == LineKind::Body && l.text.is_empty())
        {
            self.lines.pop();
        }
        self.lines
    }
}

fn looks_like_html(text: &str) -> bool {
    let mut rest = text;
    while let Some(pos) = rest.find('<') {
        let after = &rest[pos + 1..];
        if after.starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!') {
            return true;
        }
        rest = after;
    }
    false
}

/// Text content of `source` with character references resolved.
pub fn decode_entities(source: &str) -> String {
    Html::parse_fragment(source).root_element().text().collect()
}

fn open_tag(name: &str, out: &mut LineBuilder) {
    match name {
        "br" | "div" | "tr" => out.flush(),
        "hr" => out.rule(),
        "li" => {
            out.flush();
            out.kind = LineKind::Bullet;
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            out.gap();
            out.kind = LineKind::Heading;
        }
        "p" | "ul" | "ol" | "table" | "blockquote" | "section" => out.gap(),
        _ => {}
    }
}

fn close_tag(name: &str, out: &mut LineBuilder) {
    match name {
        "div" | "tr" | "li" => out.flush(),
        "td" | "th" => out.push_text(" | "),
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "table" | "blockquote"
        | "section" => out.gap(),
        _ => {}
    }
}

fn walk(element: ElementRef<'_>, out: &mut LineBuilder) {
    for child in element.children() {
        if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if matches!(name, "script" | "style") {
                continue;
            }
            open_tag(name, out);
            walk(child, out);
            close_tag(name, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_text(text);
        }
    }
}

pub fn to_lines(source: &str) -> Vec<MarkupLine> {
    if !looks_like_html(source) {
        return source
            .lines()
            .map(|l| MarkupLine {
                kind: LineKind::Body,
                text: decode_entities(l.trim_end()),
            })
            .collect();
    }

    let fragment = Html::parse_fragment(source);
    let mut out = LineBuilder::new();
    walk(fragment.root_element(), &mut out);
    out.finish()
}

const NARRATION_WIDTH: usize = 1000;

fn is_rule(line: &str) -> bool {
    line.chars().all(|c| matches!(c, '-' | '─' | '━' | '='))
}

/// Text with all markup removed, one block per line.
pub fn to_plain_text(source: &str) -> String {
    let rendered = html2text::from_read_with_decorator(
        source.as_bytes(),
        NARRATION_WIDTH,
        TrivialDecorator::new(),
    );
    rendered
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_rule(l))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[MarkupLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn headings_paragraphs_and_lists() {
        let html = "<h2>步骤 1</h2><p>Use the <b>present perfect</b>.</p><ul><li>have done</li><li>has gone</li></ul>";
        let lines = to_lines(html);
        assert_eq!(
            texts(&lines),
            vec!["步骤 1", "", "Use the present perfect.", "", "have done", "has gone"]
        );
        assert_eq!(lines[0].kind, LineKind::Heading);
        assert_eq!(lines[4].kind, LineKind::Bullet);
    }

    #[test]
    fn whitespace_collapses_and_br_breaks() {
        let lines = to_lines("<p>a\n   b<br/>c</p>");
        assert_eq!(texts(&lines), vec!["a b", "c"]);
    }

    #[test]
    fn style_and_script_are_skipped() {
        let lines = to_lines("<style>.x{color:red}</style><p>shown</p><script>alert(1)</script>");
        assert_eq!(texts(&lines), vec!["shown"]);
    }

    #[test]
    fn plain_text_keeps_line_breaks() {
        let lines = to_lines("1. She ___ to school.\nA. go  B. goes");
        assert_eq!(texts(&lines), vec!["1. She ___ to school.", "A. go  B. goes"]);
    }

    #[test]
    fn comparison_is_not_mistaken_for_markup() {
        assert!(!looks_like_html("x < 3 and y > 2"));
        assert!(looks_like_html("<p>x</p>"));
    }

    #[test]
    fn entities_decode() {
        assert_eq!(decode_entities("a &lt; b &amp;&amp; c&#39;s &#x4e2d;"), "a < b && c's 中");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        let lines = to_lines("x &gt; 1");
        assert_eq!(texts(&lines), vec!["x > 1"]);
    }

    #[test]
    fn comparison_inside_markup_keeps_text() {
        let lines = to_lines("<p>If 3 < 5 and 7 > 2, then x = 1.</p>");
        assert_eq!(texts(&lines), vec!["If 3 < 5 and 7 > 2, then x = 1."]);
    }

    #[test]
    fn table_cells_are_separated() {
        let lines = to_lines("<table><tr><td>go</td><td>went</td></tr></table>");
        assert_eq!(texts(&lines), vec!["go | went |"]);
    }

    #[test]
    fn narration_keeps_comparisons() {
        let text = to_plain_text("<p>If 3 < 5 and 7 > 2, then x = 1.</p>");
        assert!(text.contains("3 < 5"), "{text}");
        assert!(text.contains("7 > 2"), "{text}");
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn narration_drops_markup_and_rules() {
        let text = to_plain_text("<h2>Rules</h2><hr><ol><li>one</li><li>two</li></ol>");
        assert!(text.contains("Rules"));
        assert!(text.contains("one"));
        assert!(text.contains("two"));
        assert!(!text.contains('<'));
        assert!(text.lines().all(|l| !l.trim().is_empty() && !is_rule(l)));
    }
}
