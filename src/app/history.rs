use std::rc::Rc;

use crate::db::Database;

use super::player::{ListenerId, PlayerState, PlayerStore};

const PROGRESS_SAVE_INTERVAL_SECS: u64 = 10;

/// Writes what the user listens to into the listening history.
pub(crate) struct ListenRecorder {
    db: Rc<Database>,
    current: Option<TrackedListen>,
}

struct TrackedListen {
    generation: u64,
    media_url: String,
    saved_progress: u64,
    last_progress: u64,
}

impl ListenRecorder {
    pub(crate) fn new(db: Rc<Database>) -> Self {
        Self { db, current: None }
    }

    pub(crate) fn attach(mut self, store: &mut PlayerStore) -> ListenerId {
        store.subscribe(move |state| self.observe(state))
    }

    pub(crate) fn observe(&mut self, state: &PlayerState) {
        let episode = state.current_episode();
        let generation = state.episode_generation();
        let same_listen = episode.is_some()
            && self
                .current
                .as_ref()
                .is_some_and(|tracked| tracked.generation == generation);

        if !same_listen {
            self.flush_previous();
            let Some(episode) = episode else {
                return;
            };
            if let Err(err) = self.db.record_listen(
                &episode.media_url,
                &episode.title,
                &episode.members,
                episode.duration_seconds,
            ) {
                tracing::warn!(error = %format!("{err:#}"), "failed to record listen");
            }
            self.current = Some(TrackedListen {
                generation,
                media_url: episode.media_url.clone(),
                saved_progress: 0,
                last_progress: 0,
            });
            return;
        }

        let Some(tracked) = self.current.as_mut() else {
            return;
        };
        let progress = state.progress_seconds();
        tracked.last_progress = progress;
        if progress.abs_diff(tracked.saved_progress) < PROGRESS_SAVE_INTERVAL_SECS {
            return;
        }
        tracked.saved_progress = progress;
        if let Err(err) = self.db.update_progress(&tracked.media_url, progress) {
            tracing::warn!(error = %format!("{err:#}"), "failed to save listening progress");
        }
    }

    /// Writes the last position of the episode being left, which the
    /// throttled saves may not have caught.
    fn flush_previous(&mut self) {
        let Some(tracked) = self.current.take() else {
            return;
        };
        if tracked.last_progress == tracked.saved_progress {
            return;
        }
        if let Err(err) = self
            .db
            .update_progress(&tracked.media_url, tracked.last_progress)
        {
            tracing::warn!(error = %format!("{err:#}"), "failed to save listening progress");
        }
    }
}

/// Detaches the recorder and stores the exact position playback stopped at.
pub(crate) fn finish_listening(db: &Database, store: &mut PlayerStore, recorder: ListenerId) {
    store.unsubscribe(recorder);
    let state = store.state();
    let Some(episode) = state.current_episode() else {
        return;
    };
    if let Err(err) = db.update_progress(&episode.media_url, state.progress_seconds()) {
        tracing::warn!(error = %format!("{err:#}"), "failed to save final listening progress");
    }
}
