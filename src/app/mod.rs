mod episode;
mod history;
mod player;
mod tui;

#[cfg(test)]
mod tests;

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::cli::{Cli, Command};
use crate::db::{Database, ListenEntry};
use crate::paths::{database_file_path, mpv_socket_path};

use self::episode::{
    EpisodeSummary, LATEST_RELEASES, fetch_episodes, format_duration, format_listened_at,
    format_published_date, playable_queue, truncate,
};
use self::history::{ListenRecorder, finish_listening};
use self::player::{AudioBinding, MpvDevice, PlayerStore};

const DEFAULT_API_URL: &str = "http://localhost:3333";
const API_URL_ENV: &str = "PODCASTR_API_URL";
const PLAYER_BIN_ENV: &str = "PODCASTR_PLAYER_BIN";
const HEADLESS_TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) api_url: String,
    pub(crate) player_bin: PathBuf,
    pub(crate) limit: u32,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            api_url: resolve_api_url(cli.api_url.as_deref(), env::var_os(API_URL_ENV)),
            player_bin: resolve_player_bin(cli.player_bin.as_deref(), env::var_os(PLAYER_BIN_ENV)),
            limit: cli.limit.max(1),
        }
    }
}

pub(crate) fn resolve_api_url(flag: Option<&str>, env_value: Option<OsString>) -> String {
    let chosen = match (flag, env_value) {
        (Some(flag), _) if !flag.trim().is_empty() => flag.trim().to_string(),
        (_, Some(value)) if !value.is_empty() => value.to_string_lossy().trim().to_string(),
        _ => DEFAULT_API_URL.to_string(),
    };
    chosen.trim_end_matches('/').to_string()
}

pub(crate) fn resolve_player_bin(flag: Option<&str>, env_value: Option<OsString>) -> PathBuf {
    match (flag, env_value) {
        (Some(flag), _) if !flag.is_empty() => PathBuf::from(flag),
        (_, Some(value)) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from("mpv"),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_cli(&cli);
    tracing::info!(api_url = %settings.api_url, player = %settings.player_bin.display(), "starting");

    match cli.command {
        Some(Command::List) => run_list(&settings)?,
        Some(Command::Play { index, single }) => run_play(&settings, index, single)?,
        Some(Command::History) => run_history(&open_db()?)?,
        Some(Command::Tui) | None => tui::run_tui(&settings, open_db()?)?,
    }

    Ok(())
}

fn load_episodes(settings: &Settings) -> Result<Vec<EpisodeSummary>> {
    let outcome = fetch_episodes(&settings.api_url, settings.limit)?;
    for warning in &outcome.warnings {
        eprintln!("Warning: {warning}");
    }
    Ok(outcome.episodes)
}

fn run_list(settings: &Settings) -> Result<()> {
    let episodes = load_episodes(settings)?;
    if episodes.is_empty() {
        println!("No episodes published yet at {}.", settings.api_url);
        return Ok(());
    }

    for (position, summary) in episodes.iter().enumerate() {
        if position == 0 {
            println!("Latest releases");
        } else if position == LATEST_RELEASES {
            println!("\nAll episodes");
        }
        if position == 0 || position == LATEST_RELEASES {
            println!(
                "{:<4} {:<44} {:<30} {:<10} {:<8}",
                "#", "TITLE", "MEMBERS", "PUBLISHED", "DURATION"
            );
        }
        let episode = &summary.episode;
        println!(
            "{:<4} {:<44} {:<30} {:<10} {:<8}",
            position + 1,
            truncate(&episode.title, 44),
            truncate(&episode.members, 30),
            format_published_date(&summary.published_at),
            format_duration(episode.duration_seconds)
        );
    }
    Ok(())
}

fn run_play(settings: &Settings, index: usize, single: bool) -> Result<()> {
    let episodes = load_episodes(settings)?;
    if index == 0 || index > episodes.len() {
        bail!(
            "episode {index} does not exist; choose 1..={}",
            episodes.len()
        );
    }

    let db = Rc::new(open_db()?);
    let mut store = PlayerStore::new();
    let recorder = ListenRecorder::new(Rc::clone(&db)).attach(&mut store);

    let device = MpvDevice::spawn(&settings.player_bin, mpv_socket_path())?;
    let mut binding = AudioBinding::new(device);

    if single {
        store.play_single(episodes[index - 1].episode.clone());
    } else {
        store.play_queue(playable_queue(&episodes), index - 1);
    }
    binding.sync(&mut store);

    let outcome = binding.play_until_cleared(&mut store, HEADLESS_TICK, |state| {
        if let Some(episode) = state.current_episode() {
            println!(
                "Now playing [{}/{}]: {} ({})",
                state.current_index() + 1,
                state.queue().len(),
                episode.title,
                format_duration(episode.duration_seconds)
            );
        }
    });
    finish_listening(&db, &mut store, recorder);
    outcome?;
    println!("Queue finished.");
    Ok(())
}

fn run_history(db: &Database) -> Result<()> {
    let entries = db.list_history()?;
    if entries.is_empty() {
        println!("Nothing listened to yet. Run `podcastr` and pick an episode.");
        return Ok(());
    }

    println!(
        "{:<44} {:<28} {:<20} {:<18} {}",
        "TITLE", "MEMBERS", "PROGRESS", "LAST PLAYED", "MEDIA"
    );
    for entry in &entries {
        println!("{}", history_row(entry));
    }
    Ok(())
}

pub(crate) fn history_row(entry: &ListenEntry) -> String {
    format!(
        "{:<44} {:<28} {:<20} {:<18} {}",
        truncate(&entry.title, 44),
        truncate(&entry.members, 28),
        format!(
            "{} / {}",
            format_duration(entry.progress_seconds),
            format_duration(entry.duration_seconds)
        ),
        format_listened_at(&entry.last_played_at),
        entry.media_url
    )
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
