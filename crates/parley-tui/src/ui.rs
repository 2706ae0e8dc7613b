use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Margin, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use parley_core::{Message, Sender, Transport};
use crate::app::{App, Screen};
use crate::markdown::{renderer_for, slice_columns, text_width};

const BACK_LABEL: &str = "[Back to Home]";
const NEW_SESSION_LABEL: &str = "[New Session]";
const MAX_INPUT_ROWS: usize = 5;

pub fn render<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: body, footer
    let [body_area, footer_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    match app.screen {
        Screen::Landing => render_landing(app, frame, body_area),
        Screen::Chat => render_chat(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_landing<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    app.new_session_area = None;
    app.back_area = None;
    app.send_area = None;
    app.chat_area = None;

    let [_, title_area, tagline_area, _, button_row, _, endpoint_area, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(3),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);

    let title = Paragraph::new(Line::from(Span::styled(
        "Talk to your Platform",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(title, title_area);

    let tagline = Paragraph::new("Get instant answers and assistance from your AI platform assistant")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    frame.render_widget(tagline, tagline_area);

    let [_, button_area, _] = Layout::horizontal([
        Constraint::Fill(1),
        Constraint::Length(22),
        Constraint::Fill(1),
    ])
    .areas(button_row);
    app.start_button_area = Some(button_area);

    let (label, style) = if app.is_transitioning() {
        ("Starting...", Style::default().fg(Color::Gray))
    } else {
        ("Start Chatting", Style::default().fg(Color::White).bold())
    };
    let border_color = if app.is_transitioning() { Color::DarkGray } else { Color::Blue };
    let button = Paragraph::new(Span::styled(label, style))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    frame.render_widget(button, button_area);

    let endpoint = Paragraph::new(format!("Assistant endpoint: {}", app.endpoint))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(endpoint, endpoint_area);
}

fn render_chat<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    app.start_button_area = None;

    let input_rows = app
        .conversation
        .draft()
        .split('\n')
        .count()
        .clamp(1, MAX_INPUT_ROWS) as u16;

    let [header_area, chat_area, input_area] = Layout::vertical([
        Constraint::Length(2),
        Constraint::Min(0),
        Constraint::Length(input_rows + 2),
    ])
    .areas(area);

    render_chat_header(app, frame, header_area);
    render_messages(app, frame, chat_area);
    render_input(app, frame, input_area);
}

fn render_chat_header<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    let header_style = Style::default().bg(Color::Blue).fg(Color::White);
    frame.render_widget(Block::default().style(header_style), area);

    let [top, bottom] = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(area);

    let [title_area, back_area, _, new_area, _] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(BACK_LABEL.len() as u16),
        Constraint::Length(1),
        Constraint::Length(NEW_SESSION_LABEL.len() as u16),
        Constraint::Length(1),
    ])
    .areas(top);

    app.back_area = Some(back_area);
    app.new_session_area = Some(new_area);

    let title = Paragraph::new(Span::styled(" AI Assistant", Style::default().bold()));
    frame.render_widget(title, title_area);

    let button_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let back_style = if app.is_transitioning() {
        button_style.fg(Color::Gray)
    } else {
        button_style
    };
    frame.render_widget(Paragraph::new(Span::styled(BACK_LABEL, back_style)), back_area);
    frame.render_widget(Paragraph::new(Span::styled(NEW_SESSION_LABEL, button_style)), new_area);

    let session = Line::from(vec![
        Span::styled("Session: ", Style::default().bold()),
        Span::raw(app.conversation.id().to_string()),
        Span::raw(" "),
    ]);
    let [status_area, session_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(session.width() as u16),
    ])
    .areas(bottom);

    let status_line = Span::styled(" Online • Ready to help", Style::default().fg(Color::Gray));
    frame.render_widget(Paragraph::new(status_line), status_area);
    frame.render_widget(Paragraph::new(session).alignment(Alignment::Right), session_area);
}

fn message_header(message: &Message) -> Line<'static> {
    let (label, color) = match message.sender {
        Sender::User => ("You", Color::Cyan),
        Sender::Bot => ("Assistant", Color::Yellow),
    };
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!(" · {}", message.time_label()), Style::default().fg(Color::DarkGray)),
    ])
}

/// Every line of the transcript, wrapped to `width`
fn transcript_lines(messages: &[Message], awaiting: bool, animation_frame: u8, width: usize) -> Vec<Line<'static>> {
    let bubble_width = (width * 3 / 4).clamp(10.min(width), width.max(1));
    let mut lines: Vec<Line<'static>> = Vec::new();

    for message in messages {
        let renderer = renderer_for(message.sender);
        let body = renderer.render(&message.text, bubble_width);
        match message.sender {
            Sender::User => {
                lines.push(message_header(message).alignment(Alignment::Right));
                // Use cyan text to match the "You" label
                lines.extend(body.into_iter().map(|line| {
                    line.style(Style::default().fg(Color::Cyan)).alignment(Alignment::Right)
                }));
            }
            Sender::Bot => {
                lines.push(message_header(message));
                lines.extend(body);
            }
        }
        lines.push(Line::default());
    }

    if awaiting {
        lines.push(Line::from(Span::styled(
            "Assistant",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Bouncing dots: the bright one moves each tick
        let dots: Vec<Span<'static>> = (0..3u8)
            .map(|i| {
                let color = if i == animation_frame { Color::White } else { Color::DarkGray };
                Span::styled("● ", Style::default().fg(color))
            })
            .collect();
        lines.push(Line::from(dots));
    }

    lines
}

fn render_messages<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");
    let inner = block.inner(area);
    app.chat_height = inner.height;

    let lines = transcript_lines(
        app.conversation.messages(),
        app.conversation.is_awaiting(),
        app.animation_frame,
        inner.width as usize,
    );

    let total_lines = lines.len().min(u16::MAX as usize) as u16;
    app.max_chat_scroll = total_lines.saturating_sub(inner.height);
    app.chat_scroll = if app.follow_bottom {
        app.max_chat_scroll
    } else {
        app.chat_scroll.min(app.max_chat_scroll)
    };

    let paragraph = Paragraph::new(lines)
        .block(block)
        .scroll((app.chat_scroll, 0));
    frame.render_widget(paragraph, area);

    if total_lines > inner.height {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("^"))
            .end_symbol(Some("v"));

        let mut scrollbar_state = ScrollbarState::new(app.max_chat_scroll as usize)
            .position(app.chat_scroll as usize);

        frame.render_stateful_widget(
            scrollbar,
            area.inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
    }
}

/// Row and display column of the cursor inside a possibly multi-line draft
fn cursor_row_col(draft: &str, cursor: usize) -> (usize, usize) {
    let before: String = draft.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before.rsplit('\n').next().map(text_width).unwrap_or(0);
    (row, col)
}

fn render_input<T: Transport + Clone + 'static>(app: &mut App<T>, frame: &mut Frame, area: Rect) {
    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(10),
    ])
    .areas(area);
    app.send_area = Some(send_area);

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message ");
    let inner = input_block.inner(input_area);

    let draft = app.conversation.draft();
    let inner_width = inner.width as usize;
    let inner_height = (inner.height as usize).max(1);
    let (row, col) = cursor_row_col(draft, app.draft_cursor);

    // Keep the cursor visible: vertical offset by rows, horizontal by columns
    let row_offset = row.saturating_sub(inner_height - 1);
    let col_offset = if inner_width == 0 {
        0
    } else if col >= inner_width {
        col - inner_width + 1
    } else {
        0
    };

    let input = if draft.is_empty() {
        Paragraph::new(Span::styled(
            "Type your message here...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let visible: Vec<Line> = draft
            .split('\n')
            .skip(row_offset)
            .take(inner_height)
            .map(|line| Line::from(slice_columns(line, col_offset, inner_width)))
            .collect();
        // Use cyan text to match the "You" style - visible in both light and dark terminals
        Paragraph::new(visible).style(Style::default().fg(Color::Cyan))
    };
    frame.render_widget(input.block(input_block), input_area);

    if !app.is_transitioning() {
        frame.set_cursor_position((
            inner.x + (col - col_offset) as u16,
            inner.y + (row - row_offset) as u16,
        ));
    }

    let enabled = app.conversation.can_submit();
    let (border_color, label_style) = if enabled {
        (Color::Green, Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
    } else {
        (Color::DarkGray, Style::default().fg(Color::DarkGray))
    };
    let send = Paragraph::new(Span::styled("Send", label_style))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    frame.render_widget(send, send_area);
}

fn render_footer<T: Transport + Clone + 'static>(app: &App<T>, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.screen {
        Screen::Landing => (" HOME ", Style::default().bg(Color::Blue).fg(Color::White)),
        Screen::Chat if app.conversation.is_awaiting() => {
            (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
        }
        Screen::Chat => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hints = match app.screen {
        Screen::Landing => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" start ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ],
        Screen::Chat => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Alt+Enter ", key_style),
            Span::styled(" newline ", label_style),
            Span::styled(" ^N ", key_style),
            Span::styled(" new session ", label_style),
            Span::styled(" ^O ", key_style),
            Span::styled(" open links ", label_style),
            Span::styled(" PgUp/PgDn ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" home ", label_style),
            Span::styled(" ^C ", key_style),
            Span::styled(" quit ", label_style),
        ],
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];
    spans.extend(hints);
    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {}", status), Style::default().fg(Color::Yellow)));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_cursor_row_col() {
        assert_eq!(cursor_row_col("", 0), (0, 0));
        assert_eq!(cursor_row_col("hello", 3), (0, 3));
        assert_eq!(cursor_row_col("ab\ncde", 5), (1, 2));
        assert_eq!(cursor_row_col("ab\n", 3), (1, 0));
        assert_eq!(cursor_row_col("你好a", 2), (0, 4));
        assert_eq!(cursor_row_col("x\n✅✅", 4), (1, 4));
    }

    #[test]
    fn test_transcript_layout() {
        let messages = vec![Message::bot("**Hi**"), Message::user("Hello")];
        let lines = transcript_lines(&messages, false, 0, 40);

        assert!(text(&lines[0]).starts_with("Assistant · "));
        assert_eq!(text(&lines[1]), "Hi");
        assert_eq!(text(&lines[2]), "");
        assert!(text(&lines[3]).starts_with("You · "));
        assert_eq!(lines[3].alignment, Some(Alignment::Right));
        assert_eq!(text(&lines[4]), "Hello");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_typing_indicator_only_while_awaiting() {
        let messages = vec![Message::bot("Hi")];
        let idle = transcript_lines(&messages, false, 0, 40);
        let waiting = transcript_lines(&messages, true, 1, 40);

        assert_eq!(waiting.len(), idle.len() + 2);
        let dots = waiting.last().unwrap();
        assert_eq!(dots.spans.len(), 3);
        assert_eq!(dots.spans[1].style.fg, Some(Color::White));
        assert_eq!(dots.spans[0].style.fg, Some(Color::DarkGray));
    }
}
