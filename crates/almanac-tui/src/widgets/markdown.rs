//! Markdown rendering for assistant replies.
//!
//! Replies are timetables and conflict warnings: headings, lists, bold
//! spans. Code blocks are kept for the occasional preformatted table.

use crate::theme::Theme;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

/// Convert markdown text to styled ratatui lines
pub fn render_markdown<'a>(text: &str, theme: &Theme, width: usize) -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = Vec::new();
    let mut current_line: Vec<Span<'a>> = Vec::new();
    let mut current_style = theme.base_style();
    let mut in_code_block = false;
    let mut code_block_content = String::new();
    let mut list_depth: usize = 0;

    for event in Parser::new(text) {
        match event {
            Event::Start(tag) => match tag {
                Tag::Heading { level, .. } => {
                    flush(&mut lines, &mut current_line);
                    current_style = match level {
                        pulldown_cmark::HeadingLevel::H1 => theme
                            .accent_style()
                            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                        pulldown_cmark::HeadingLevel::H2 => {
                            theme.accent_style().add_modifier(Modifier::BOLD)
                        }
                        _ => theme.accent_style(),
                    };
                }
                Tag::Paragraph => {
                    flush(&mut lines, &mut current_line);
                }
                Tag::CodeBlock(_) => {
                    in_code_block = true;
                    code_block_content.clear();
                    flush(&mut lines, &mut current_line);
                }
                Tag::List(_) => {
                    list_depth += 1;
                }
                Tag::Item => {
                    flush(&mut lines, &mut current_line);
                    let indent = "  ".repeat(list_depth.saturating_sub(1));
                    current_line.push(Span::styled(format!("{}• ", indent), theme.dim_style()));
                }
                Tag::Emphasis => {
                    current_style = current_style.add_modifier(Modifier::ITALIC);
                }
                Tag::Strong => {
                    // Conflict warnings arrive as bold text
                    current_style = current_style
                        .add_modifier(Modifier::BOLD)
                        .fg(theme.warning);
                }
                Tag::Link { .. } => {
                    current_style = Style::default().fg(theme.link);
                }
                _ => {}
            },
            Event::End(tag_end) => match tag_end {
                TagEnd::Heading(_) => {
                    flush(&mut lines, &mut current_line);
                    current_style = theme.base_style();
                }
                TagEnd::Paragraph => {
                    flush(&mut lines, &mut current_line);
                    lines.push(Line::from(""));
                }
                TagEnd::CodeBlock => {
                    in_code_block = false;
                    let code_style = theme.code_style().add_modifier(Modifier::DIM);
                    for code_line in code_block_content.lines() {
                        let display_line = if code_line.len() > width.saturating_sub(4) {
                            format!("  {}…", &code_line[..width.saturating_sub(5)])
                        } else {
                            format!("  {}", code_line)
                        };
                        lines.push(Line::from(Span::styled(display_line, code_style)));
                    }
                    lines.push(Line::from(""));
                }
                TagEnd::List(_) => {
                    list_depth = list_depth.saturating_sub(1);
                    if list_depth == 0 {
                        lines.push(Line::from(""));
                    }
                }
                TagEnd::Item => {
                    flush(&mut lines, &mut current_line);
                }
                TagEnd::Emphasis | TagEnd::Strong | TagEnd::Link => {
                    current_style = theme.base_style();
                }
                _ => {}
            },
            Event::Text(text) => {
                if in_code_block {
                    code_block_content.push_str(&text);
                } else {
                    current_line.push(Span::styled(text.to_string(), current_style));
                }
            }
            Event::Code(code) => {
                let code_style = theme.code_style().add_modifier(Modifier::BOLD);
                current_line.push(Span::styled(format!("`{}`", code), code_style));
            }
            Event::SoftBreak => {
                current_line.push(Span::raw(" "));
            }
            Event::HardBreak => {
                flush(&mut lines, &mut current_line);
            }
            _ => {}
        }
    }

    flush(&mut lines, &mut current_line);

    // Remove trailing empty lines
    while lines.last().is_some_and(|l| {
        l.spans.is_empty() || (l.spans.len() == 1 && l.spans[0].content.is_empty())
    }) {
        lines.pop();
    }

    lines
}

fn flush<'a>(lines: &mut Vec<Line<'a>>, current_line: &mut Vec<Span<'a>>) {
    if !current_line.is_empty() {
        lines.push(Line::from(std::mem::take(current_line)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_text() {
        let theme = Theme::dark();
        let lines = render_markdown("Hello, world!", &theme, 80);
        assert!(!lines.is_empty());
    }

    #[test]
    fn test_bold_conflict_warning_is_styled() {
        let theme = Theme::dark();
        let lines = render_markdown("**Conflict: 10:00 overlaps 10:30**", &theme, 80);

        let bold_span = lines
            .iter()
            .flat_map(|l| l.spans.iter())
            .find(|s| s.content.contains("Conflict"))
            .expect("conflict text rendered");
        assert!(bold_span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_list_items_get_bullets() {
        let theme = Theme::dark();
        let lines = render_markdown("- Mon 10:00 standup\n- Mon 10:30 review", &theme, 80);

        let bullets = lines
            .iter()
            .filter(|l| l.spans.first().is_some_and(|s| s.content.contains("•")))
            .count();
        assert_eq!(bullets, 2);
    }

    #[test]
    fn test_code_block() {
        let theme = Theme::dark();
        let lines = render_markdown("```\n10:00 | standup\n```", &theme, 80);
        assert!(!lines.is_empty());
    }
}
