use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthChar;

use cvr_chat_core::state::LoadingPlaceholder;
use cvr_chat_core::{Entry, Transcript};

use crate::app::{App, Focus};

const RESTART_LABEL: &str = " ↻ Start New Conversation ";

/// How one style class is drawn.
struct ClassStyle {
    label: &'static str,
    label_style: Style,
    body_style: Style,
}

fn class_style(class: &str) -> ClassStyle {
    let assistant = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
    match class {
        "user-msg" => ClassStyle {
            label: "You:",
            label_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            body_style: Style::default(),
        },
        "bot-msg error" => ClassStyle {
            label: "Assistant:",
            label_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            body_style: Style::default().fg(Color::Red),
        },
        LoadingPlaceholder::CLASS_NAME => ClassStyle {
            label: "Assistant:",
            label_style: assistant,
            body_style: Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        },
        _ => ClassStyle {
            label: "Assistant:",
            label_style: assistant,
            body_style: Style::default(),
        },
    }
}

/// Text exactly as received, except control characters that would drive the terminal.
pub fn display_text(text: &str) -> String {
    text.chars()
        .flat_map(|c| match c {
            '\n' => vec!['\n'],
            '\t' => vec![' '; 4],
            c if c.is_control() => vec![char::REPLACEMENT_CHARACTER],
            c => vec![c],
        })
        .collect()
}

/// Columns a character of the input field occupies once passed through [`display_text`].
fn display_width(c: char) -> usize {
    match c {
        '\t' => 4,
        c if c.is_control() => 1,
        c => c.width().unwrap_or(0),
    }
}

/// The part of `input` that fits in `inner_width` columns with the cursor in view,
/// and the cursor's column within it.
pub fn input_viewport(input: &str, cursor: usize, inner_width: usize) -> (String, u16) {
    let chars: Vec<char> = input.chars().collect();
    let cursor = cursor.min(chars.len());

    // Walk back from the cursor, keeping one column free for the cursor itself
    let budget = inner_width.saturating_sub(1);
    let mut start = cursor;
    let mut cursor_col = 0;
    while start > 0 {
        let w = display_width(chars[start - 1]);
        if cursor_col + w > budget {
            break;
        }
        cursor_col += w;
        start -= 1;
    }

    let mut end = start;
    let mut used = 0;
    while end < chars.len() {
        let w = display_width(chars[end]);
        if used + w > inner_width {
            break;
        }
        used += w;
        end += 1;
    }

    let visible: String = chars[start..end].iter().collect();
    (display_text(&visible), cursor_col as u16)
}

/// The transcript body as drawn inside the conversation block.
fn transcript_paragraph(transcript: &Transcript, animation_frame: u8) -> Paragraph<'static> {
    let lines: Vec<Line> = transcript
        .entries()
        .iter()
        .flat_map(|entry| entry_lines(entry, animation_frame))
        .collect();

    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false })
}

/// Lines the transcript occupies at `wrap_width` columns, wrapped the way [`render`] wraps them.
pub fn transcript_line_count(transcript: &Transcript, wrap_width: u16) -> u16 {
    let count = transcript_paragraph(transcript, 0).line_count(wrap_width.max(1));
    u16::try_from(count).unwrap_or(u16::MAX)
}

fn entry_lines(entry: &Entry, animation_frame: u8) -> Vec<Line<'static>> {
    let style = class_style(entry.class_name());
    let mut lines = vec![Line::from(Span::styled(style.label, style.label_style))];

    match entry {
        Entry::Loading(placeholder) => {
            // Animated ellipsis: cycles through ".", "..", "..."
            let base = placeholder.text().trim_end_matches('.');
            let dots = ".".repeat((animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("{}{}", base, dots),
                style.body_style,
            )));
        }
        Entry::Message(msg) => {
            for line in display_text(msg.text()).lines() {
                lines.push(Line::from(Span::styled(line.to_string(), style.body_style)));
            }
        }
    }

    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, restart_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_restart_button(app, frame, restart_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" INEC CVR Assistant ", Style::default().fg(Color::Green).bold()),
        Span::styled(
            format!("v{} ", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(app.backend_url.clone(), Style::default().fg(Color::Gray)),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::Black));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let inner = block.inner(area);
    app.chat_width = inner.width;
    app.chat_height = inner.height;
    app.follow_transcript();

    let chat = transcript_paragraph(app.client.transcript(), app.animation_frame)
        .block(block)
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_restart_button(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::RestartButton;
    let style = if focused {
        Style::default().bg(Color::Green).fg(Color::Black).bold()
    } else {
        Style::default().fg(Color::Green)
    };

    let width = (RESTART_LABEL.chars().count() as u16).min(area.width);
    let button_area = Rect::new(
        area.x + (area.width - width) / 2,
        area.y,
        width,
        area.height,
    );
    app.restart_area = Some(button_area);

    let button = Paragraph::new(Span::styled(RESTART_LABEL, style)).alignment(Alignment::Center);
    frame.render_widget(button, button_area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == Focus::Input;
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let title = if app.is_waiting() {
        " Message (waiting for reply) "
    } else {
        " Message "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible, cursor_col) = input_viewport(&app.input, app.cursor, inner_width);

    let input = Paragraph::new(visible).block(block);
    frame.render_widget(input, area);

    if focused && inner_width > 0 {
        frame.set_cursor_position((area.x + 1 + cursor_col, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let key_style = Style::default().fg(Color::Cyan);
    let mut spans = vec![
        Span::styled(" Enter", key_style),
        Span::raw(" send  "),
        Span::styled("Tab", key_style),
        Span::raw(" focus  "),
        Span::styled("Ctrl+R", key_style),
        Span::raw(" restart  "),
        Span::styled("Esc", key_style),
        Span::raw(" quit"),
    ];
    if app.restart_task.is_some() {
        spans.push(Span::styled("  restarting...", Style::default().fg(Color::DarkGray)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use ratatui::{backend::TestBackend, Terminal};

    use super::*;
    use cvr_chat_core::{ChatBackend, ChatClient, ChatError, ResetError, Role};

    struct SilentBackend;

    #[async_trait]
    impl ChatBackend for SilentBackend {
        async fn chat(&self, _message: &str) -> Result<String, ChatError> {
            Ok(String::new())
        }

        async fn reset(&self) -> Result<(), ResetError> {
            Ok(())
        }
    }

    fn screen_rows(terminal: &Terminal<TestBackend>) -> Vec<String> {
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect()
    }

    #[test]
    fn test_display_text_is_verbatim_for_markup() {
        let text = "**Step 1:** <b>Visit</b> &amp; register";
        assert_eq!(display_text(text), text);
    }

    #[test]
    fn test_display_text_neutralises_control_characters() {
        assert_eq!(display_text("a\x1b[31mb"), "a\u{FFFD}[31mb");
        assert_eq!(display_text("a\tb\nc"), "a    b\nc");
    }

    #[test]
    fn test_line_count_wraps_long_lines() {
        let mut transcript = Transcript::new();
        transcript.push(Role::User, "abcdefghij"); // 10 chars
        assert_eq!(transcript_line_count(&transcript, 10), 3);
        assert_eq!(transcript_line_count(&transcript, 4), 5);

        transcript.push(Role::Bot, "one\n\ntwo");
        assert_eq!(transcript_line_count(&transcript, 10), 3 + 5);
    }

    #[test]
    fn test_entry_lines_use_class_labels() {
        let mut transcript = Transcript::new();
        transcript.push(Role::BotError, "oops");
        transcript.show_placeholder();

        let error = entry_lines(&transcript.entries()[0], 0);
        assert_eq!(error[0].spans[0].content, "Assistant:");
        assert_eq!(error[1].spans[0].content, "oops");
        assert_eq!(error[1].spans[0].style.fg, Some(Color::Red));

        let loading = entry_lines(&transcript.entries()[1], 2);
        assert_eq!(loading[1].spans[0].content, "Thinking...");
    }

    #[test]
    fn test_line_count_follows_word_wrapping() {
        let mut transcript = Transcript::new();
        // Two six-letter words never share a ten-column line
        transcript.push(Role::Bot, "aaaaaa bbbbbb cccccc");
        assert_eq!(transcript_line_count(&transcript, 10), 1 + 3 + 1);
    }

    #[test]
    fn test_newest_reply_is_on_screen_after_word_wrap() {
        let client = ChatClient::new(Arc::new(SilentBackend), "Hello!");
        let mut app = App::new(client, "http://test");
        let mut input = "Hi".to_string();
        let pending = app.client.submit(&mut input).unwrap();
        app.client.complete(
            pending.id,
            Ok("aaaaaa bbbbbb cccccc dddddd eeeeee ffffff gggggg hhhhhh iiiiii ENDMRK".to_string()),
        );

        // 12 columns leaves a 10-column transcript interior
        let mut terminal = Terminal::new(TestBackend::new(12, 14)).unwrap();
        terminal.draw(|frame| render(&mut app, frame)).unwrap();

        let rows = screen_rows(&terminal);
        assert!(
            rows.iter().any(|row| row.contains("ENDMRK")),
            "last line of the reply is off screen: {:#?}",
            rows
        );
    }

    #[test]
    fn test_input_viewport_scrolls_to_cursor() {
        assert_eq!(input_viewport("hello", 5, 10), ("hello".to_string(), 5));
        assert_eq!(input_viewport("abcdefghij", 10, 5), ("ghij".to_string(), 4));
        assert_eq!(input_viewport("abcdefghij", 0, 5), ("abcde".to_string(), 0));
    }

    #[test]
    fn test_input_viewport_uses_display_width() {
        assert_eq!(input_viewport("日本語", 3, 10), ("日本語".to_string(), 6));
        assert_eq!(input_viewport("日本語です", 5, 5), ("です".to_string(), 4));
        assert_eq!(input_viewport("a🎉b", 2, 10), ("a🎉b".to_string(), 3));
    }
}
