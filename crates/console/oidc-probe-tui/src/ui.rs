use crate::app::{AppScreen, AppState, SettingsField, TokenSlot};
use oidc_probe_agent::SessionSnapshot;
use oidc_probe_core::{LogEntry, LogLevel, decode_jwt, time_left};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};

pub fn draw(frame: &mut Frame, app: &AppState, snapshot: &SessionSnapshot, refreshing: bool) {
    match app.screen {
        AppScreen::Console => draw_console_screen(frame, app, snapshot, refreshing),
        AppScreen::Settings => draw_settings_screen(frame, app),
    }
}

fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Success => Color::Green,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::Event => Color::Magenta,
        LogLevel::Info => Color::Cyan,
    }
}

fn draw_console_screen(
    frame: &mut Frame,
    app: &AppState,
    snapshot: &SessionSnapshot,
    refreshing: bool,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(2),
        ])
        .split(frame.area());

    draw_header(frame, app, snapshot, refreshing, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(main_chunks[0]);

    draw_status_card(frame, snapshot, left_chunks[0]);
    draw_token_panels(frame, app, snapshot, left_chunks[1]);
    draw_log_panel(frame, app, main_chunks[1]);

    // Footer
    let keys = if snapshot.is_authenticated {
        "q quit | s settings | Tab token | y copy | r refresh | o logout | i silent logout | x remove user | c clear log"
    } else {
        "q quit | s settings | l login (redirect) | p login (popup) | c clear log"
    };
    let footer = Paragraph::new(keys)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[2]);
}

fn draw_header(
    frame: &mut Frame,
    app: &AppState,
    snapshot: &SessionSnapshot,
    refreshing: bool,
    area: Rect,
) {
    let mut spans = vec![
        Span::styled(
            " OIDC Probe ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(
                "{} | client: {}",
                app.settings.authority, app.settings.client_id
            ),
            Style::default().fg(Color::Gray),
        ),
    ];
    if snapshot.is_loading {
        spans.push(Span::styled(
            "  [loading]",
            Style::default().fg(Color::Yellow),
        ));
    }
    if refreshing {
        spans.push(Span::styled(
            "  [refreshing]",
            Style::default().fg(Color::Yellow),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Thick),
    );
    frame.render_widget(header, area);
}

fn draw_status_card(frame: &mut Frame, snapshot: &SessionSnapshot, area: Rect) {
    let (status_text, border_color) = if snapshot.is_authenticated {
        ("AUTHENTICATED", Color::Green)
    } else {
        ("NOT AUTHENTICATED", Color::Red)
    };

    let mut lines = vec![Line::from(vec![
        Span::raw("Status:     "),
        Span::styled(
            status_text,
            Style::default()
                .fg(border_color)
                .add_modifier(Modifier::BOLD),
        ),
    ])];

    // Countdown recomputed on every draw so it ticks with the poll loop.
    if let Some(expires_at) = snapshot.user.as_ref().and_then(|u| u.expires_at) {
        let left = time_left(expires_at);
        let color = if left.is_expired() {
            Color::Red
        } else if left.is_expiring_soon() {
            Color::Yellow
        } else {
            Color::Green
        };
        lines.push(Line::from(vec![
            Span::raw("Expires in: "),
            Span::styled(left.text, Style::default().fg(color)),
        ]));
    }

    if let Some(user) = &snapshot.user {
        lines.push(Line::from(vec![
            Span::raw("User:       "),
            Span::styled(
                user.email().unwrap_or("(no email claim)").to_string(),
                Style::default().fg(Color::White),
            ),
        ]));
    }

    if let Some(url) = &snapshot.pending_url {
        lines.push(Line::from(vec![
            Span::styled("Open in browser: ", Style::default().fg(Color::Yellow)),
            Span::styled(url.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }

    let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .title(" Session ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color)),
    );
    frame.render_widget(card, area);
}

fn token_value(snapshot: &SessionSnapshot, slot: TokenSlot) -> Option<String> {
    let user = snapshot.user.as_ref()?;
    match slot {
        TokenSlot::Access => Some(user.access_token.clone()),
        TokenSlot::Id => user.id_token.clone(),
        TokenSlot::Refresh => user.refresh_token.clone(),
    }
}

/// Claims surfaced by name in the decoded view; everything else stays in
/// the raw payload dump.
const PROFILE_CLAIMS: &[&str] = &[
    "sub",
    "given_name",
    "family_name",
    "email",
    "preferred_username",
    "exp",
    "iat",
];

fn draw_token_panels(frame: &mut Frame, app: &AppState, snapshot: &SessionSnapshot, area: Rect) {
    let token_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    // The two unselected slots collapse to availability lines; the
    // selected one takes the remaining space for its decoded view.
    let mut compact = 0;
    for slot in [TokenSlot::Access, TokenSlot::Id, TokenSlot::Refresh] {
        if slot == app.selected_token {
            continue;
        }
        draw_compact_token(frame, snapshot, slot, token_chunks[compact]);
        compact += 1;
    }
    draw_selected_token(frame, snapshot, app.selected_token, token_chunks[2]);
}

fn draw_compact_token(frame: &mut Frame, snapshot: &SessionSnapshot, slot: TokenSlot, area: Rect) {
    let body = match token_value(snapshot, slot) {
        Some(token) => {
            let head = token.chars().take(40).collect::<String>();
            format!("{head}...")
        }
        None => "(not present)".to_string(),
    };
    let widget = Paragraph::new(body)
        .style(Style::default().fg(Color::DarkGray))
        .block(
            Block::default()
                .title(format!(" {} ", slot.label()))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
    frame.render_widget(widget, area);
}

fn draw_selected_token(frame: &mut Frame, snapshot: &SessionSnapshot, slot: TokenSlot, area: Rect) {
    let mut lines = Vec::new();

    match token_value(snapshot, slot) {
        None => lines.push(Line::from(Span::styled(
            "(not present)",
            Style::default().fg(Color::DarkGray),
        ))),
        Some(token) => {
            match decode_jwt(&token) {
                Some(decoded) => {
                    for claim in PROFILE_CLAIMS {
                        if let Some(value) = decoded.payload.get(*claim) {
                            lines.push(Line::from(vec![
                                Span::styled(
                                    format!("{claim:<20}"),
                                    Style::default().fg(Color::Cyan),
                                ),
                                Span::raw(render_claim(value)),
                            ]));
                        }
                    }
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        "header",
                        Style::default().fg(Color::Yellow),
                    )));
                    lines.extend(json_lines(&decoded.header));
                    lines.push(Line::from(Span::styled(
                        "payload",
                        Style::default().fg(Color::Yellow),
                    )));
                    lines.extend(json_lines(&serde_json::Value::Object(decoded.payload)));
                }
                None => lines.push(Line::from(Span::styled(
                    "opaque token (not a decodable JWT)",
                    Style::default().fg(Color::DarkGray),
                ))),
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                token,
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let widget = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(format!(" {} ", slot.label()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(widget, area);
}

fn render_claim(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json_lines(value: &serde_json::Value) -> Vec<Line<'static>> {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    rendered
        .lines()
        .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Gray))))
        .collect()
}

fn draw_log_panel(frame: &mut Frame, app: &AppState, area: Rect) {
    let log_block = Block::default()
        .title(format!(" Log ({}) ", app.log.len()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded);
    let log_area = log_block.inner(area);
    frame.render_widget(log_block, area);

    let mut lines: Vec<Line> = Vec::new();
    for entry in app.log.entries() {
        lines.push(log_line(entry));
        if let Some(data) = &entry.data {
            lines.push(Line::from(Span::styled(
                format!("      {data}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let scroll = lines.len().saturating_sub(log_area.height as usize) as u16;
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(widget, log_area);
}

fn log_line(entry: &LogEntry) -> Line<'static> {
    let color = level_color(entry.level);
    Line::from(vec![
        Span::styled(
            format!("[{}] ", entry.time.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(format!("{} ", entry.level.icon()), Style::default().fg(color)),
        Span::styled(entry.message.clone(), Style::default().fg(color)),
    ])
}

fn draw_settings_screen(frame: &mut Frame, app: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ])
        .split(frame.area());

    let form_block = Block::default()
        .title(" OIDC Settings ")
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(form_block.clone(), chunks[1]);

    let inner_area = form_block.inner(chunks[1]);
    let form_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(inner_area);

    let fields = [
        (SettingsField::Authority, "Authority", app.form.authority.as_str()),
        (SettingsField::ClientId, "Client ID", app.form.client_id.as_str()),
        (SettingsField::Scope, "Scope", app.form.scope.as_str()),
        (
            SettingsField::RedirectUri,
            "Redirect URI",
            app.form.redirect_uri.as_str(),
        ),
    ];

    for (idx, (field, label, value)) in fields.iter().enumerate() {
        let style = if app.form.focus == *field {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let widget = Paragraph::new(format!("{label:<13}{value}")).style(style);
        frame.render_widget(widget, form_chunks[idx]);

        if app.form.focus == *field {
            frame.set_cursor_position((
                form_chunks[idx].x + 13 + value.len() as u16,
                form_chunks[idx].y,
            ));
        }
    }

    let instructions = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled(
                "Tab",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" to switch fields | "),
            Span::styled(
                "Enter",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" to save & reconnect"),
        ]),
        Line::from(vec![
            Span::raw("Press "),
            Span::styled(
                "Ctrl+S",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" to save only | "),
            Span::styled(
                "Ctrl+R",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" to reset to defaults | "),
            Span::styled(
                "Esc",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(" to discard"),
        ]),
    ])
    .style(Style::default().fg(Color::Gray))
    .alignment(Alignment::Center);
    frame.render_widget(instructions, form_chunks[4]);
}
