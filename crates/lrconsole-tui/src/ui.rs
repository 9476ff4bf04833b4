use chrono::{DateTime, Local, Utc};
use lrconsole_core::{Origin, StatusFeed};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{speaker, App, UPLOAD_PREFIX};

/// Shown while the transcript is empty.
const EXAMPLE_COMMANDS: [&str; 4] = [
    "adjust exposure to 1.5",
    "apply preset warm sunset",
    "export photo",
    "help",
];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_status_bar(app, frame, status_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Lightroom Console ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            app.console.config().base_url.clone(),
            Style::default().fg(Color::Gray),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Transcript ");

    let chat = transcript_paragraph(app)
        .block(block)
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

/// The wrapped transcript body. Scroll limits are measured on this same
/// paragraph so they agree with what gets drawn.
pub fn transcript_paragraph(app: &App) -> Paragraph<'static> {
    let transcript = app.console.transcript();
    let processing = app.console.is_processing();

    let text = if transcript.is_empty() && !processing {
        help_text()
    } else {
        let mut lines: Vec<Line<'static>> = Vec::new();

        for message in transcript {
            let time = message
                .created_at()
                .with_timezone(&Local)
                .format("%H:%M")
                .to_string();
            let speaker_style = match message.origin() {
                Origin::User => Style::default().fg(Color::Cyan),
                Origin::System if message.is_error() => Style::default().fg(Color::Red),
                Origin::System => Style::default().fg(Color::Yellow),
            };
            lines.push(Line::from(vec![
                Span::styled(time, Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(
                    format!("{}:", speaker(message.origin())),
                    speaker_style.add_modifier(Modifier::BOLD),
                ),
            ]));

            let body_style = if message.is_error() {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            if message.text().is_empty() {
                lines.push(Line::default());
            }
            for line in message.text().lines() {
                lines.push(Line::styled(line.to_string(), body_style));
            }
            lines.push(Line::default());
        }

        if processing {
            lines.push(Line::from(Span::styled(
                format!("{}:", speaker(Origin::System)),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Processing{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    Paragraph::new(text).wrap(Wrap { trim: true })
}

fn help_text() -> Text<'static> {
    let hint = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::styled("Type a command for the agent and press Enter, for example:", hint),
        Line::default(),
    ];
    for example in EXAMPLE_COMMANDS {
        lines.push(Line::from(vec![
            Span::styled("  > ", hint),
            Span::styled(example, Style::default().fg(Color::Cyan)),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::styled(
        format!("{}<path> sends a file to the agent.", UPLOAD_PREFIX),
        hint,
    ));
    Text::from(lines)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let title = if app.console.is_processing() {
        " Command (waiting for the agent) "
    } else {
        " Command (Enter to send, Esc to quit) "
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(title);

    // Keep the cursor inside the box by scrolling long input horizontally
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    let cursor_x = (app.cursor - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_status_bar(app: &App, frame: &mut Frame, area: Rect) {
    let feed = app.console.status();
    let label_style = Style::default().fg(Color::Gray);

    let mut spans = vec![connection_badge(&feed), Span::raw(" ")];

    if let Some(snapshot) = feed.snapshot() {
        if let Some(state) = &snapshot.processing_state {
            spans.push(Span::styled(format!("{} ", state), label_style));
        }
        if let Some(last) = &snapshot.last_command {
            spans.push(Span::styled(format!("| last: {} ", last), label_style));
        }
        if let Some(error) = &snapshot.error_message {
            spans.push(Span::styled(
                format!("| {} ", error),
                Style::default().fg(Color::Red),
            ));
        }
    }

    if feed.is_stale() {
        spans.push(Span::styled(
            " stale ",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ));
        spans.push(Span::raw(" "));
        if let Some(at) = feed.refreshed_at() {
            spans.push(Span::styled(last_refresh_label(at), label_style));
        }
    }

    if let Some(upload) = &app.upload {
        spans.push(Span::styled(
            format!(
                "uploading {} {:.0}% ",
                upload.file_name,
                upload.fraction * 100.0
            ),
            Style::default().fg(Color::Magenta),
        ));
    }

    if let Some(notice) = &app.notice {
        spans.push(Span::styled(notice.clone(), Style::default().fg(Color::White)));
    }

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(status, area);
}

fn last_refresh_label(at: DateTime<Utc>) -> String {
    format!("last ok {} ", at.with_timezone(&Local).format("%H:%M:%S"))
}

fn connection_badge(feed: &StatusFeed) -> Span<'static> {
    if feed.snapshot().is_none() && feed.last_error().is_none() {
        Span::styled(
            " CONNECTING ",
            Style::default().bg(Color::Blue).fg(Color::White),
        )
    } else if feed.is_disconnected() {
        Span::styled(
            " DISCONNECTED ",
            Style::default().bg(Color::Red).fg(Color::White),
        )
    } else {
        Span::styled(
            " CONNECTED ",
            Style::default().bg(Color::Green).fg(Color::Black),
        )
    }
}
