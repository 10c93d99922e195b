use crate::markdown::render_markdown;
use crate::transcript::{Message, Sender};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use textwrap::wrap;

const USER_LABEL: &str = "you";
const ASSISTANT_LABEL: &str = "gemini";

/// Renders one transcript message as a bubble: timestamp header, railed
/// body, footer. User text is wrapped plain text; assistant text goes
/// through the markdown renderer.
pub fn render_message(message: &Message, area: Rect) -> Vec<Line<'static>> {
    let style = base_style(message);
    let indent = indent_for(message);
    let mut lines = Vec::new();

    lines.push(header_line(message, style, indent));

    let wrap_width = (area.width as usize).saturating_sub(indent.len() + 4).max(8);
    match message.sender {
        Sender::User => {
            for wrapped in wrap(&message.text, wrap_width) {
                lines.push(Line::from(vec![
                    Span::styled(indent.to_string(), style),
                    Span::styled("│ ".to_string(), style),
                    Span::styled(wrapped.to_string(), style),
                ]));
            }
        }
        Sender::Assistant => {
            if message.is_generating && message.text.is_empty() {
                lines.push(Line::from(vec![
                    Span::styled(indent.to_string(), style),
                    Span::styled("│ ".to_string(), style),
                    Span::styled(
                        "Thinking...".to_string(),
                        style.add_modifier(Modifier::ITALIC | Modifier::DIM),
                    ),
                ]));
            } else {
                for body_line in render_markdown(&message.text, wrap_width) {
                    let mut spans = vec![
                        Span::styled(indent.to_string(), style),
                        Span::styled("│ ".to_string(), style),
                    ];
                    spans.extend(body_line.spans);
                    lines.push(Line::from(spans));
                }
            }
        }
    }

    lines.push(Line::from(vec![
        Span::styled(indent.to_string(), style),
        Span::styled("╰─".to_string(), style),
    ]));

    lines
}

fn base_style(message: &Message) -> Style {
    let mut style = Style::default().fg(match message.sender {
        Sender::User => Color::Rgb(255, 223, 128),
        Sender::Assistant => Color::Rgb(144, 238, 144),
    });
    if message.is_generating {
        style = style.add_modifier(Modifier::DIM);
    }
    style
}

fn indent_for(message: &Message) -> &'static str {
    match message.sender {
        Sender::User => "  ",
        Sender::Assistant => "",
    }
}

fn header_line(message: &Message, style: Style, indent: &'static str) -> Line<'static> {
    let label = match message.sender {
        Sender::User => USER_LABEL,
        Sender::Assistant => ASSISTANT_LABEL,
    };
    let marker = if message.is_generating { "◌" } else { "●" };

    Line::from(vec![
        Span::styled(indent.to_string(), style),
        Span::styled("┌─".to_string(), style),
        Span::styled(
            message.timestamp.format("%H:%M").to_string(),
            style.add_modifier(Modifier::DIM),
        ),
        Span::styled(" ".to_string(), style),
        Span::styled(label.to_string(), style.add_modifier(Modifier::BOLD)),
        Span::styled(" ".to_string(), style),
        Span::styled(marker.to_string(), style),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Transcript;

    fn area() -> Rect {
        Rect::new(0, 0, 60, 20)
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_empty_generating_message_shows_thinking() {
        let mut transcript = Transcript::new();
        let id = transcript.begin_assistant();
        let lines = render_message(transcript.get(id).unwrap(), area());

        assert!(lines.iter().any(|l| line_text(l).contains("Thinking...")));
    }

    #[test]
    fn test_user_message_is_indented_and_railed() {
        let mut transcript = Transcript::new();
        let id = transcript.push_user("hello there");
        let lines = render_message(transcript.get(id).unwrap(), area());

        // header, one body line, footer
        assert_eq!(lines.len(), 3);
        assert!(line_text(&lines[1]).starts_with("  │ "));
        assert!(line_text(&lines[1]).contains("hello there"));
    }

    #[test]
    fn test_assistant_markdown_body_keeps_rail() {
        let mut transcript = Transcript::new();
        let id = transcript.push_assistant("plain **bold** text");
        let lines = render_message(transcript.get(id).unwrap(), area());

        assert!(line_text(&lines[1]).starts_with("│ "));
        assert!(line_text(&lines[1]).contains("bold"));
    }

    #[test]
    fn test_long_user_text_wraps() {
        let mut transcript = Transcript::new();
        let id = transcript.push_user("word ".repeat(40).trim().to_string());
        let lines = render_message(transcript.get(id).unwrap(), Rect::new(0, 0, 30, 20));

        // More body lines than header + footer alone.
        assert!(lines.len() > 3);
    }
}
