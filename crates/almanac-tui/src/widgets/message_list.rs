//! Message list widget for the scrolling transcript

use crate::theme::Theme;
use crate::widgets::markdown::render_markdown;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Modifier,
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};

/// Who a transcript entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A single entry in the rendered transcript
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Rendered in the error style
    pub is_error: bool,
    /// Still receiving fragments; rendered with a trailing cursor
    pub is_streaming: bool,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create a streaming assistant message
    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            is_error: false,
            is_streaming: true,
        }
    }

    /// Create a system notice
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create an inline error notice
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            is_error: true,
            is_streaming: false,
        }
    }
}

/// Widget for displaying the transcript
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
}

impl<'a> MessageList<'a> {
    /// Create a new message list
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
        }
    }

    /// Set scroll offset
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    fn render_message(&self, msg: &ChatMessage, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (role_text, role_style, prefix) = match msg.role {
            MessageRole::User => ("You", self.theme.accent_bold(), "▶ "),
            MessageRole::Assistant => (
                "Assistant",
                self.theme.success_style().add_modifier(Modifier::BOLD),
                "◀ ",
            ),
            MessageRole::System => ("Notice", self.theme.dim_style(), "● "),
        };

        // Streaming replies carry a trailing cursor in the header
        let header = if msg.is_streaming {
            format!("{}{} ▌", prefix, role_text)
        } else {
            format!("{}{}", prefix, role_text)
        };
        lines.push(Line::from(Span::styled(header, role_style)));

        let content_width = width.saturating_sub(2);

        if msg.role == MessageRole::Assistant && !msg.is_error {
            if msg.content.is_empty() && msg.is_streaming {
                lines.push(Line::from(Span::styled(
                    "  thinking...",
                    self.theme.warning_style(),
                )));
            } else {
                // Assistant replies are markdown (timetables, bold conflicts)
                for line in render_markdown(&msg.content, self.theme, content_width) {
                    let mut indented = vec![Span::raw("  ")];
                    indented.extend(
                        line.spans
                            .into_iter()
                            .map(|s| Span::styled(s.content.into_owned(), s.style)),
                    );
                    lines.push(Line::from(indented));
                }
            }
        } else {
            let content_style = if msg.is_error {
                self.theme.error_style()
            } else if msg.role == MessageRole::System {
                self.theme.dim_style()
            } else {
                self.theme.base_style()
            };

            for line in textwrap::wrap(&msg.content, content_width.max(1)) {
                lines.push(Line::from(Span::styled(
                    format!("  {}", line),
                    content_style,
                )));
            }
        }

        lines.push(Line::from(""));
        lines
    }
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let width = area.width as usize;
        let mut all_lines: Vec<Line> = Vec::new();
        for msg in self.messages {
            all_lines.extend(self.render_message(msg, width));
        }

        let visible: Vec<Line> = all_lines
            .into_iter()
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}

/// Calculate the total rendered height of the transcript.
/// Must mirror the rendering logic above.
pub fn calculate_message_height(messages: &[ChatMessage], width: usize) -> usize {
    let theme = Theme::dark();
    let content_width = width.saturating_sub(2);
    let mut total = 0;

    for msg in messages {
        // Role header
        total += 1;

        if msg.role == MessageRole::Assistant && !msg.is_error {
            if msg.content.is_empty() && msg.is_streaming {
                total += 1;
            } else {
                total += render_markdown(&msg.content, &theme, content_width).len();
            }
        } else {
            total += textwrap::wrap(&msg.content, content_width.max(1)).len();
        }

        // Separator
        total += 1;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_counts_header_and_separator() {
        let messages = vec![ChatMessage::user("hello")];
        // header + one content line + separator
        assert_eq!(calculate_message_height(&messages, 80), 3);
    }

    #[test]
    fn test_height_wraps_long_user_message() {
        let messages = vec![ChatMessage::user("a ".repeat(100))];
        assert!(calculate_message_height(&messages, 40) > 3);
    }

    #[test]
    fn test_empty_streaming_reply_shows_one_line() {
        let messages = vec![ChatMessage::assistant_streaming("")];
        assert_eq!(calculate_message_height(&messages, 80), 3);
    }
}
