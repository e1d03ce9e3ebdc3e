mod binding;
mod mpv;
mod process;


use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::episode::Episode;

pub(crate) use binding::AudioBinding;
pub(crate) use mpv::MpvDevice;

/// Playback state shared with every view. Only [`PlayerStore`] mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PlayerState {
    queue: Vec<Episode>,
    current_index: usize,
    is_playing: bool,
    is_looping: bool,
    is_shuffling: bool,
    progress_seconds: u64,
    episode_generation: u64,
}

impl PlayerState {
    pub(crate) fn queue(&self) -> &[Episode] {
        &self.queue
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current_index
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub(crate) fn is_looping(&self) -> bool {
        self.is_looping
    }

    pub(crate) fn is_shuffling(&self) -> bool {
        self.is_shuffling
    }

    pub(crate) fn progress_seconds(&self) -> u64 {
        self.progress_seconds
    }

    /// Bumped whenever an episode is (re)started or the queue is cleared.
    pub(crate) fn episode_generation(&self) -> u64 {
        self.episode_generation
    }

    pub(crate) fn current_episode(&self) -> Option<&Episode> {
        self.queue.get(self.current_index)
    }

    pub(crate) fn has_next(&self) -> bool {
        self.is_shuffling || self.current_index + 1 < self.queue.len()
    }

    pub(crate) fn has_previous(&self) -> bool {
        self.current_index > 0
    }

    fn start_episode(&mut self, index: usize) {
        self.current_index = index;
        self.progress_seconds = 0;
        self.episode_generation += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ListenerId(u64);

type Listener = Box<dyn FnMut(&PlayerState)>;

/// Owns the [`PlayerState`] and notifies listeners after each effective command.
pub(crate) struct PlayerStore {
    state: PlayerState,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
    rng: StdRng,
}

impl PlayerStore {
    pub(crate) fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub(crate) fn with_rng(rng: StdRng) -> Self {
        Self {
            state: PlayerState::default(),
            listeners: Vec::new(),
            next_listener_id: 0,
            rng,
        }
    }

    pub(crate) fn state(&self) -> &PlayerState {
        &self.state
    }

    pub(crate) fn subscribe(&mut self, listener: impl FnMut(&PlayerState) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn play_single(&mut self, episode: Episode) {
        self.commit(|state| {
            state.queue = vec![episode];
            state.start_episode(0);
            state.is_playing = true;
            true
        });
    }

    pub(crate) fn play_queue(&mut self, episodes: Vec<Episode>, start_index: usize) {
        if start_index >= episodes.len() {
            tracing::debug!(start_index, len = episodes.len(), "ignoring out-of-range queue start");
            return;
        }
        self.commit(|state| {
            state.queue = episodes;
            state.start_episode(start_index);
            state.is_playing = true;
            true
        });
    }

    pub(crate) fn toggle_play(&mut self) {
        self.commit(|state| {
            if state.queue.is_empty() {
                return false;
            }
            state.is_playing = !state.is_playing;
            true
        });
    }

    pub(crate) fn set_playing_flag(&mut self, playing: bool) {
        self.commit(|state| {
            let changed = state.is_playing != playing;
            state.is_playing = playing;
            changed
        });
    }

    pub(crate) fn toggle_loop(&mut self) {
        self.commit(|state| {
            state.is_looping = !state.is_looping;
            true
        });
    }

    pub(crate) fn toggle_shuffle(&mut self) {
        self.commit(|state| {
            state.is_shuffling = !state.is_shuffling;
            true
        });
    }

    /// Under shuffle any index may come up, the current one included; picking
    /// it again restarts the episode.
    pub(crate) fn play_next(&mut self) {
        let len = self.state.queue.len();
        let shuffle_pick = (self.state.is_shuffling && len > 0).then(|| self.rng.gen_range(0..len));
        self.commit(|state| {
            if let Some(index) = shuffle_pick {
                state.start_episode(index);
                return true;
            }
            if state.is_shuffling || !state.has_next() {
                return false;
            }
            state.start_episode(state.current_index + 1);
            true
        });
    }

    pub(crate) fn play_previous(&mut self) {
        self.commit(|state| {
            if !state.has_previous() {
                return false;
            }
            state.start_episode(state.current_index - 1);
            true
        });
    }

    pub(crate) fn clear(&mut self) {
        self.commit(|state| {
            state.queue.clear();
            state.current_index = 0;
            state.progress_seconds = 0;
            state.episode_generation += 1;
            true
        });
    }

    pub(crate) fn set_progress(&mut self, seconds: u64) {
        self.commit(|state| {
            let changed = state.progress_seconds != seconds;
            state.progress_seconds = seconds;
            changed
        });
    }

    fn commit(&mut self, mutate: impl FnOnce(&mut PlayerState) -> bool) {
        if !mutate(&mut self.state) {
            return;
        }
        for (_, listener) in &mut self.listeners {
            listener(&self.state);
        }
    }
}
