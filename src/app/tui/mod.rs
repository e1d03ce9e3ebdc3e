mod actions;
mod render;
mod session;

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::TableState;

use crate::db::Database;
use crate::paths::mpv_socket_path;

use super::Settings;
use super::episode::EpisodeSummary;
use super::history::{ListenRecorder, finish_listening};
use super::player::{AudioBinding, MpvDevice, PlayerState, PlayerStore};

use self::actions::{
    apply_control, drain_feed_results, play_selection, start_feed_fetch, status_error,
    status_info,
};
use self::render::draw_tui;
use self::session::TuiSession;

const TICK: Duration = Duration::from_millis(100);
const SEEK_STEP_SECS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerControl {
    Shuffle,
    Previous,
    PlayPause,
    Next,
    Loop,
}

impl PlayerControl {
    pub(crate) const ALL: [Self; 5] = [
        Self::Shuffle,
        Self::Previous,
        Self::PlayPause,
        Self::Next,
        Self::Loop,
    ];

    pub(crate) fn label(self, state: &PlayerState) -> &'static str {
        match self {
            Self::Shuffle => "SHUFFLE",
            Self::Previous => "PREV",
            Self::PlayPause if state.is_playing() => "PAUSE",
            Self::PlayPause => "PLAY",
            Self::Next => "NEXT",
            Self::Loop => "LOOP",
        }
    }

    pub(crate) fn key_hint(self) -> &'static str {
        match self {
            Self::Shuffle => "s",
            Self::Previous => "b",
            Self::PlayPause => "space",
            Self::Next => "n",
            Self::Loop => "l",
        }
    }

    /// Nothing works without an episode; shuffling a single episode is pointless.
    pub(crate) fn is_enabled(self, state: &PlayerState) -> bool {
        if state.current_episode().is_none() {
            return false;
        }
        match self {
            Self::Shuffle => state.queue().len() > 1,
            Self::Previous => state.has_previous(),
            Self::Next => state.has_next(),
            Self::PlayPause | Self::Loop => true,
        }
    }

    pub(crate) fn is_active(self, state: &PlayerState) -> bool {
        match self {
            Self::Shuffle => state.is_shuffling(),
            Self::Loop => state.is_looping(),
            Self::PlayPause => state.is_playing(),
            Self::Previous | Self::Next => false,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) enum FeedState {
    Loading,
    Ready(Vec<EpisodeSummary>),
    Failed(String),
}

impl FeedState {
    pub(super) fn episodes(&self) -> &[EpisodeSummary] {
        match self {
            Self::Ready(episodes) => episodes,
            Self::Loading | Self::Failed(_) => &[],
        }
    }
}

#[derive(Debug)]
pub(super) struct FeedFetchResult {
    pub(super) episodes: Result<Vec<EpisodeSummary>, String>,
    pub(super) warnings: Vec<String>,
}

pub(crate) fn run_tui(settings: &Settings, db: Database) -> Result<()> {
    let device = MpvDevice::spawn(&settings.player_bin, mpv_socket_path())
        .context("audio output unavailable; install mpv or pass --player-bin")?;
    let mut binding = AudioBinding::new(device);

    let db = Rc::new(db);
    let mut store = PlayerStore::new();
    let recorder = ListenRecorder::new(Rc::clone(&db)).attach(&mut store);
    let dirty = Rc::new(Cell::new(true));
    let dirty_on_change = Rc::clone(&dirty);
    store.subscribe(move |_| dirty_on_change.set(true));

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let (feed_tx, feed_rx) = mpsc::channel::<FeedFetchResult>();
    let mut feed = FeedState::Loading;
    let mut table_state = TableState::default();
    let mut status = status_info(&format!("Loading episodes from {}...", settings.api_url));
    start_feed_fetch(settings, &feed_tx);

    loop {
        if let Some(message) = drain_feed_results(&feed_rx, &mut feed, &mut table_state) {
            status = message;
            dirty.set(true);
        }
        binding.pump(&mut store);
        if let Some(reason) = binding.take_failure() {
            status = status_error(&format!("Playback failed: {reason}"));
            dirty.set(true);
        }

        if dirty.replace(false) {
            terminal.draw(|frame| {
                draw_tui(frame, settings, &feed, &mut table_state, store.state(), &status)
            })?;
        }

        if !event::poll(TICK)? {
            continue;
        }
        let input = event::read()?;
        dirty.set(true);
        let Event::Key(key) = input else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let episode_count = feed.episodes().len();
        match key.code {
            KeyCode::Char('q') => break,
            KeyCode::Up => {
                if let Some(selected) = table_state.selected() {
                    table_state.select(Some(selected.saturating_sub(1)));
                }
            }
            KeyCode::Down => {
                if let Some(selected) = table_state.selected()
                    && episode_count > 0
                {
                    table_state.select(Some((selected + 1).min(episode_count - 1)));
                }
            }
            KeyCode::Enter | KeyCode::Char('p') => {
                let single = key.code == KeyCode::Char('p');
                status = play_selection(&feed, &table_state, &mut store, single);
                binding.sync(&mut store);
            }
            KeyCode::Char(' ') => {
                status = apply_control(PlayerControl::PlayPause, &mut store);
                binding.sync(&mut store);
            }
            KeyCode::Char('n') => {
                status = apply_control(PlayerControl::Next, &mut store);
                binding.sync(&mut store);
            }
            KeyCode::Char('b') => {
                status = apply_control(PlayerControl::Previous, &mut store);
                binding.sync(&mut store);
            }
            KeyCode::Char('s') => {
                status = apply_control(PlayerControl::Shuffle, &mut store);
                binding.sync(&mut store);
            }
            KeyCode::Char('l') => {
                status = apply_control(PlayerControl::Loop, &mut store);
                binding.sync(&mut store);
            }
            KeyCode::Left | KeyCode::Right => {
                if store.state().current_episode().is_none() {
                    status = status_error("Nothing is playing.");
                    continue;
                }
                let delta = if key.code == KeyCode::Left {
                    -SEEK_STEP_SECS
                } else {
                    SEEK_STEP_SECS
                };
                binding.seek_by(delta, &mut store);
            }
            KeyCode::Char('x') => {
                store.clear();
                binding.sync(&mut store);
                status = status_info("Stopped.");
            }
            KeyCode::Char('r') => {
                feed = FeedState::Loading;
                status = status_info("Reloading episodes...");
                start_feed_fetch(settings, &feed_tx);
            }
            _ => {}
        }
    }

    finish_listening(&db, &mut store, recorder);
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}
