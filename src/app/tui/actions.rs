use std::sync::mpsc;

use ratatui::widgets::TableState;

use super::super::Settings;
use super::super::episode::{fetch_episodes, playable_queue, truncate};
use super::super::player::PlayerStore;
use super::{FeedFetchResult, FeedState, PlayerControl};

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(super) fn start_feed_fetch(settings: &Settings, tx: &mpsc::Sender<FeedFetchResult>) {
    let api_url = settings.api_url.clone();
    let limit = settings.limit;
    let tx = tx.clone();
    std::thread::spawn(move || {
        let result = match fetch_episodes(&api_url, limit) {
            Ok(outcome) => FeedFetchResult {
                episodes: Ok(outcome.episodes),
                warnings: outcome.warnings,
            },
            Err(err) => FeedFetchResult {
                episodes: Err(format!("{err:#}")),
                warnings: Vec::new(),
            },
        };
        let _ = tx.send(result);
    });
}

/// Applies finished fetches; returns a status line when something arrived.
pub(super) fn drain_feed_results(
    rx: &mpsc::Receiver<FeedFetchResult>,
    feed: &mut FeedState,
    table_state: &mut TableState,
) -> Option<String> {
    let mut status = None;
    while let Ok(result) = rx.try_recv() {
        for warning in &result.warnings {
            tracing::warn!(%warning, "episode feed");
        }
        status = Some(match result.episodes {
            Ok(episodes) => {
                let message = if episodes.is_empty() {
                    status_info("No episodes published yet.")
                } else if result.warnings.is_empty() {
                    status_info(&format!("Loaded {} episodes.", episodes.len()))
                } else {
                    status_info(&format!(
                        "Loaded {} episodes ({} skipped).",
                        episodes.len(),
                        result.warnings.len()
                    ))
                };
                let selected = table_state
                    .selected()
                    .filter(|idx| *idx < episodes.len())
                    .or((!episodes.is_empty()).then_some(0));
                table_state.select(selected);
                *feed = FeedState::Ready(episodes);
                message
            }
            Err(err) => {
                tracing::error!(error = %err, "episode fetch failed");
                table_state.select(None);
                *feed = FeedState::Failed(err.clone());
                status_error(&format!("Could not load episodes: {err}"))
            }
        });
    }
    status
}

/// Starts the selected episode; by default the whole list is queued behind it.
pub(super) fn play_selection(
    feed: &FeedState,
    table_state: &TableState,
    store: &mut PlayerStore,
    single: bool,
) -> String {
    let episodes = feed.episodes();
    let Some(selected) = table_state.selected().filter(|idx| *idx < episodes.len()) else {
        return status_error("Select an episode first.");
    };
    let title = truncate(&episodes[selected].episode.title, 60);
    tracing::info!(id = %episodes[selected].id, single, "queueing from selection");
    if single {
        store.play_single(episodes[selected].episode.clone());
        status_info(&format!("Playing {title}"))
    } else {
        store.play_queue(playable_queue(episodes), selected);
        status_info(&format!(
            "Playing {title} ({} of {} queued)",
            selected + 1,
            episodes.len()
        ))
    }
}

pub(super) fn apply_control(control: PlayerControl, store: &mut PlayerStore) -> String {
    if !control.is_enabled(store.state()) {
        let reason = match control {
            _ if store.state().current_episode().is_none() => "Nothing is playing.",
            PlayerControl::Shuffle => "Shuffle needs more than one episode in the queue.",
            PlayerControl::Previous => "Already at the first episode.",
            PlayerControl::Next => "No next episode.",
            PlayerControl::PlayPause | PlayerControl::Loop => "Unavailable.",
        };
        return status_info(reason);
    }

    match control {
        PlayerControl::Shuffle => {
            store.toggle_shuffle();
            status_info(if store.state().is_shuffling() {
                "Shuffle on."
            } else {
                "Shuffle off."
            })
        }
        PlayerControl::Loop => {
            store.toggle_loop();
            status_info(if store.state().is_looping() {
                "Loop on."
            } else {
                "Loop off."
            })
        }
        PlayerControl::PlayPause => {
            store.toggle_play();
            status_info(if store.state().is_playing() {
                "Playing."
            } else {
                "Paused."
            })
        }
        PlayerControl::Next => {
            store.play_next();
            now_playing_status(store)
        }
        PlayerControl::Previous => {
            store.play_previous();
            now_playing_status(store)
        }
    }
}

fn now_playing_status(store: &PlayerStore) -> String {
    match store.state().current_episode() {
        Some(episode) => status_info(&format!("Playing {}", truncate(&episode.title, 60))),
        None => status_info("Queue finished."),
    }
}
