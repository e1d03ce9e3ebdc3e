use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Gauge, Paragraph, Row, Table, TableState, Wrap,
};

use super::super::Settings;
use super::super::episode::{
    EpisodeSummary, LATEST_RELEASES, format_duration, format_published_date, plain_text,
    truncate,
};
use super::super::player::PlayerState;
use super::{FeedState, PlayerControl};

const ACCENT: Color = Color::Rgb(4, 211, 97);
const MUTED: Color = Color::Rgb(185, 195, 210);

pub(super) fn draw_tui(
    frame: &mut Frame,
    settings: &Settings,
    feed: &FeedState,
    table_state: &mut TableState,
    player: &PlayerState,
    status: &str,
) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let queue_text = match player.current_episode() {
        Some(_) => format!("queue {}/{}", player.current_index() + 1, player.queue().len()),
        None => "queue empty".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "PODCASTR",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            format!("{} episodes", feed.episodes().len()),
            Style::default().fg(MUTED),
        ),
        Span::raw("   "),
        Span::styled(queue_text, Style::default().fg(MUTED)),
        Span::raw("   "),
        Span::styled(
            truncate(&settings.api_url, 40),
            Style::default().fg(Color::Rgb(159, 117, 255)),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Podcastr"));
    frame.render_widget(header, chunks[0]);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);
    let player_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    draw_library(frame, feed, table_state, player, body_chunks[0]);
    let selected = table_state
        .selected()
        .and_then(|idx| feed.episodes().get(idx));
    draw_now_playing(frame, player, selected, player_chunks[0]);

    let progress_seconds = player.progress_seconds();
    let duration_seconds = player
        .current_episode()
        .map(|episode| episode.duration_seconds)
        .unwrap_or(0);
    let ratio = if duration_seconds == 0 {
        0.0
    } else {
        (progress_seconds as f64 / duration_seconds as f64).clamp(0.0, 1.0)
    };
    let progress = Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(ACCENT)
                .bg(Color::Rgb(40, 30, 70))
                .add_modifier(Modifier::BOLD),
        )
        .label(format!(
            "{} / {}",
            format_duration(progress_seconds),
            format_duration(duration_seconds)
        ))
        .ratio(ratio);
    frame.render_widget(progress, player_chunks[1]);

    let controls = Paragraph::new(controls_line(player))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    let status_widget = Paragraph::new(status.to_string())
        .style(status_style(status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);
}

fn draw_library(
    frame: &mut Frame,
    feed: &FeedState,
    table_state: &mut TableState,
    player: &PlayerState,
    area: Rect,
) {
    let episodes = match feed {
        FeedState::Ready(episodes) if !episodes.is_empty() => episodes,
        _ => {
            let text = match feed {
                FeedState::Loading => "Loading episodes...".to_string(),
                FeedState::Failed(err) => format!("Could not load episodes.\n\n{err}\n\nPress r to retry."),
                FeedState::Ready(_) => "No episodes published yet.".to_string(),
            };
            let placeholder = Paragraph::new(text)
                .style(Style::default().fg(MUTED))
                .wrap(Wrap { trim: true })
                .block(panel_block("Library"));
            frame.render_widget(placeholder, area);
            return;
        }
    };

    let playing_url = player
        .current_episode()
        .map(|episode| episode.media_url.as_str());
    let rows: Vec<Row> = episodes
        .iter()
        .enumerate()
        .map(|(position, summary)| {
            let episode = &summary.episode;
            let marker = if Some(episode.media_url.as_str()) == playing_url {
                "♪"
            } else if position < LATEST_RELEASES {
                "★"
            } else {
                " "
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(episode.title.clone()),
                Cell::from(episode.members.clone()),
                Cell::from(format_published_date(&summary.published_at)),
                Cell::from(format_duration(episode.duration_seconds)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Percentage(44),
            Constraint::Percentage(30),
            Constraint::Length(10),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["", "Title", "Members", "Published", "Duration"]).style(
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block("Library"))
    .row_highlight_style(
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, area, table_state);
}

fn draw_now_playing(
    frame: &mut Frame,
    player: &PlayerState,
    selected: Option<&EpisodeSummary>,
    area: Rect,
) {
    let text = match (player.current_episode(), selected) {
        (Some(episode), _) => format!(
            "Title\n{}\n\nMembers\n{}\n\nCover\n{}\n\nState\n{}",
            truncate(&episode.title, 48),
            truncate(&episode.members, 48),
            truncate(&episode.thumbnail_url, 48),
            playback_summary(player),
        ),
        (None, Some(summary)) => format!(
            "{}\n{} · {}\n\n{}\n\nEnter plays the list from here, p plays it alone.",
            truncate(&summary.episode.title, 48),
            format_published_date(&summary.published_at),
            format_duration(summary.episode.duration_seconds),
            truncate(&plain_text(&summary.description), 280),
        ),
        (None, None) => "Pick an episode to listen to.\n\nEnter plays the list from the selection, p plays it alone.".to_string(),
    };
    let panel = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: true })
        .block(panel_block("Now Playing"));
    frame.render_widget(panel, area);
}

fn playback_summary(player: &PlayerState) -> String {
    let mut parts = vec![if player.is_playing() { "playing" } else { "paused" }];
    if player.is_shuffling() {
        parts.push("shuffle");
    }
    if player.is_looping() {
        parts.push("loop");
    }
    parts.join(" · ")
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn control_style(control: PlayerControl, player: &PlayerState) -> Style {
    if !control.is_enabled(player) {
        Style::default()
            .bg(Color::Rgb(40, 44, 52))
            .fg(Color::Rgb(110, 115, 125))
    } else if control.is_active(player) {
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242))
    }
}

fn controls_line(player: &PlayerState) -> Line<'static> {
    let mut spans = Vec::new();
    for control in PlayerControl::ALL {
        spans.push(Span::styled(
            format!(" {} [{}] ", control.label(player), control.key_hint()),
            control_style(control, player),
        ));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(
        "  ←/→ seek  Enter play list  p play one  x stop  r reload  q quit",
        Style::default().fg(MUTED),
    ));
    Line::from(spans)
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}
