use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use unicode_width::UnicodeWidthStr;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";

/// Renders assistant markdown into styled terminal lines. Inline emphasis,
/// headings and lists go through pulldown-cmark; fenced code blocks are
/// syntax-highlighted with syntect.
pub fn render_markdown(text: &str, width: usize) -> Vec<Line<'static>> {
    let mut renderer = MarkdownRenderer::new(width.max(8));
    let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH);
    for event in parser {
        renderer.handle(event);
    }
    renderer.finish()
}

struct MarkdownRenderer {
    width: usize,
    lines: Vec<Line<'static>>,
    // Pending inline chunks for the current block, flushed and wrapped on
    // block end.
    chunks: Vec<(String, Style)>,
    bold: usize,
    italic: usize,
    in_code_block: bool,
    code_language: String,
    code_buffer: String,
    list_stack: Vec<Option<u64>>,
    item_prefix: Option<String>,
    heading: bool,
}

impl MarkdownRenderer {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            chunks: Vec::new(),
            bold: 0,
            italic: 0,
            in_code_block: false,
            code_language: String::new(),
            code_buffer: String::new(),
            list_stack: Vec::new(),
            item_prefix: None,
            heading: false,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_buffer.push_str(&text);
                } else {
                    let style = self.current_style();
                    self.chunks.push((text.to_string(), style));
                }
            }
            Event::Code(code) => {
                self.chunks.push((code.to_string(), inline_code_style()));
            }
            Event::SoftBreak => {
                self.chunks.push((" ".to_string(), self.current_style()));
            }
            Event::HardBreak => self.flush_block(false),
            Event::Rule => {
                self.flush_block(false);
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(self.width.min(24)),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { .. } => {
                self.flush_block(false);
                self.heading = true;
            }
            Tag::CodeBlock(kind) => {
                self.flush_block(false);
                self.in_code_block = true;
                self.code_language = match kind {
                    CodeBlockKind::Fenced(lang) => lang.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
            }
            Tag::List(start) => {
                self.flush_block(false);
                self.list_stack.push(start);
            }
            Tag::Item => {
                self.flush_block(false);
                let prefix = match self.list_stack.last_mut() {
                    Some(Some(n)) => {
                        let p = format!("{}. ", n);
                        *n += 1;
                        p
                    }
                    _ => "• ".to_string(),
                };
                self.item_prefix = Some(prefix);
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::BlockQuote(_) => self.flush_block(false),
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush_block(true),
            TagEnd::Heading(_) => {
                self.flush_block(true);
                self.heading = false;
            }
            TagEnd::CodeBlock => {
                self.emit_code_block();
                self.in_code_block = false;
                self.code_buffer.clear();
                self.code_language.clear();
            }
            TagEnd::List(_) => {
                self.list_stack.pop();
                self.flush_block(false);
            }
            TagEnd::Item => self.flush_block(false),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            _ => {}
        }
    }

    fn current_style(&self) -> Style {
        let mut style = Style::default();
        if self.heading {
            style = style.fg(Color::Cyan).add_modifier(Modifier::BOLD);
        }
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }

    /// Greedy word-wraps the pending inline chunks into lines of at most
    /// `width` cells, preserving per-word styles.
    fn flush_block(&mut self, trailing_blank: bool) {
        let chunks = std::mem::take(&mut self.chunks);
        let prefix = self.item_prefix.take();

        let mut words: Vec<(String, Style)> = Vec::new();
        for (text, style) in &chunks {
            for word in text.split_whitespace() {
                words.push((word.to_string(), *style));
            }
        }

        if words.is_empty() {
            return;
        }

        let indent_width = prefix.as_deref().map_or(0, UnicodeWidthStr::width);
        let mut spans: Vec<Span> = Vec::new();
        let mut line_width = 0;
        let mut first_line = true;

        if let Some(p) = &prefix {
            spans.push(Span::styled(
                p.clone(),
                Style::default().fg(Color::DarkGray),
            ));
            line_width = indent_width;
        }

        for (word, style) in words {
            let word_width = word.width();
            let sep = usize::from(line_width > indent_width || (line_width > 0 && prefix.is_none()));
            if line_width + sep + word_width > self.width && !spans.is_empty() {
                self.lines.push(Line::from(std::mem::take(&mut spans)));
                if prefix.is_some() || !first_line {
                    spans.push(Span::raw(" ".repeat(indent_width)));
                }
                first_line = false;
                line_width = indent_width;
            } else if sep == 1 {
                spans.push(Span::styled(" ".to_string(), style));
                line_width += 1;
            }
            spans.push(Span::styled(word, style));
            line_width += word_width;
        }

        if !spans.is_empty() {
            self.lines.push(Line::from(spans));
        }
        if trailing_blank {
            self.lines.push(Line::from(""));
        }
    }

    fn emit_code_block(&mut self) {
        let code = std::mem::take(&mut self.code_buffer);
        let lines = highlight_code(&code, &self.code_language);
        self.lines.extend(lines);
        self.lines.push(Line::from(""));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_block(false);
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

fn inline_code_style() -> Style {
    Style::default()
        .fg(Color::Rgb(209, 154, 102))
        .add_modifier(Modifier::BOLD)
}

/// Highlights one fenced code block; unknown languages fall back to plain
/// text.
fn highlight_code(code: &str, language: &str) -> Vec<Line<'static>> {
    let syntax = SYNTAX_SET
        .find_syntax_by_token(language.trim())
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
    let theme = &THEME_SET.themes[CODE_THEME];
    let mut highlighter = HighlightLines::new(syntax, theme);

    let mut lines = Vec::new();
    for code_line in code.lines() {
        let mut spans = vec![Span::styled("▎ ", Style::default().fg(Color::DarkGray))];
        match highlighter.highlight_line(code_line, &SYNTAX_SET) {
            Ok(ranges) => {
                for (style, piece) in ranges {
                    let fg = style.foreground;
                    spans.push(Span::styled(
                        piece.to_string(),
                        Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                    ));
                }
            }
            Err(_) => spans.push(Span::raw(code_line.to_string())),
        }
        lines.push(Line::from(spans));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered_text(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_plain_paragraph() {
        let lines = render_markdown("hello world", 40);
        assert_eq!(rendered_text(&lines), vec!["hello world"]);
    }

    #[test]
    fn test_paragraph_wraps_at_width() {
        let lines = render_markdown("one two three four", 9);
        let text = rendered_text(&lines);
        assert!(text.len() > 1);
        for line in &text {
            assert!(line.len() <= 9, "line too wide: {:?}", line);
        }
    }

    #[test]
    fn test_bold_span_is_styled() {
        let lines = render_markdown("a **bold** word", 40);
        let bold = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "bold")
            .expect("bold span");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_fenced_code_block_has_rail() {
        let lines = render_markdown("```rust\nlet x = 1;\n```", 40);
        let text = rendered_text(&lines);
        assert!(text.iter().any(|l| l.starts_with("▎ ") && l.contains("let x")));
    }

    #[test]
    fn test_bullet_list_prefixes() {
        let lines = render_markdown("- first\n- second", 40);
        let text = rendered_text(&lines);
        assert_eq!(text, vec!["• first", "• second"]);
    }

    #[test]
    fn test_ordered_list_numbers() {
        let lines = render_markdown("1. one\n2. two", 40);
        let text = rendered_text(&lines);
        assert_eq!(text, vec!["1. one", "2. two"]);
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain() {
        let lines = render_markdown("```glorbnax\nwat\n```", 40);
        let text = rendered_text(&lines);
        assert!(text.iter().any(|l| l.contains("wat")));
    }
}
