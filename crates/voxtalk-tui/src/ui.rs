use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Tabs};
use ratatui::Frame;
use voxtalk_core::TranscriptRole;

use crate::app::{AgentActivity, App, Tab};

pub fn draw(frame: &mut Frame, app: &App) {
    let [tabs_area, main_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]).areas(frame.area());

    draw_tabs(frame, app, tabs_area);

    match app.tab {
        Tab::Conversation => draw_conversation(frame, app, main_area),
        Tab::Logs => draw_logs(frame, app, main_area),
    }
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["1:Conversation", "2:Logs"];
    let selected = match app.tab {
        Tab::Conversation => 0,
        Tab::Logs => 1,
    };
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("voxtalk"))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn draw_conversation(frame: &mut Frame, app: &App, area: Rect) {
    let [status_area, transcript_area] =
        Layout::vertical([Constraint::Length(4), Constraint::Fill(1)]).areas(area);

    draw_status(frame, app, status_area);
    draw_transcript(frame, app, transcript_area);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let link_str = if app.link.connected {
        Span::styled("connected", Style::default().fg(Color::Green))
    } else {
        Span::styled("disconnected", Style::default().fg(Color::Red))
    };
    let mic_str = if app.link.mic_muted {
        Span::styled("muted", Style::default().fg(Color::Red))
    } else {
        Span::raw("live")
    };
    let activity_style = match app.activity {
        AgentActivity::Speaking => Style::default().fg(Color::Cyan),
        AgentActivity::Thinking => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    };

    let mut lines = vec![Line::from(vec![
        Span::raw("link: "),
        link_str,
        Span::raw("  mic: "),
        mic_str,
        Span::raw("  agent: "),
        Span::styled(app.activity.label(), activity_style),
    ])];
    if let Some(notice) = &app.notice {
        lines.push(Line::from(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Status (m=mute, q=quit)");
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_transcript(frame: &mut Frame, app: &App, area: Rect) {
    let visible_height = area.height.saturating_sub(2) as usize;
    let total = app.transcript.len();
    let start = total.saturating_sub(visible_height);

    let items: Vec<ListItem> = app
        .transcript
        .iter()
        .skip(start)
        .map(|line| {
            let role_style = match line.role {
                TranscriptRole::User => Style::default().fg(Color::Green),
                TranscriptRole::Assistant => Style::default().fg(Color::Cyan),
                TranscriptRole::Other(_) => Style::default().fg(Color::DarkGray),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{}: ", line.role), role_style.add_modifier(Modifier::BOLD)),
                Span::raw(line.content.as_str()),
            ]))
        })
        .collect();

    let list =
        List::new(items).block(Block::default().borders(Borders::ALL).title("Transcript"));
    frame.render_widget(list, area);
}

fn draw_logs(frame: &mut Frame, app: &App, area: Rect) {
    let logs = app.logs.lock().unwrap();
    let total = logs.len();

    let visible_height = area.height.saturating_sub(2) as usize; // account for borders
    let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
    let end = total.saturating_sub(scroll);
    let start = end.saturating_sub(visible_height);

    let items: Vec<ListItem> = logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|line| {
            let level_style = match line.level {
                tracing::Level::ERROR => Style::default().fg(Color::Red),
                tracing::Level::WARN => Style::default().fg(Color::Yellow),
                tracing::Level::INFO => Style::default().fg(Color::Green),
                _ => Style::default().fg(Color::DarkGray),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:5} ", line.level), level_style),
                Span::styled(
                    format!("{}: ", line.target),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(line.text.as_str()),
            ]))
        })
        .collect();

    let title = if app.log_auto_scroll {
        "Logs (auto-scroll)"
    } else {
        "Logs (Up/Down=scroll, G=bottom)"
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}
