use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};

use super::{PlayerState, PlayerStore};

/// Something the device reported on its own.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceEvent {
    Loaded,
    Started,
    Paused,
    TimeUpdate(f64),
    Ended,
    Failed(String),
}

/// Minimal audio output surface. Requests are fire-and-forget; outcomes
/// come back later through [`PlaybackDevice::poll_events`].
///
/// Apart from `Started` and `Paused`, events describe the most recent
/// `load`. Whatever a device reports about media it has since replaced or
/// stopped must be dropped before it reaches the binding.
pub(crate) trait PlaybackDevice {
    /// Replaces the current media and positions it at 0.
    fn load(&mut self, media_url: &str) -> Result<()>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self) -> Result<()>;
    fn seek(&mut self, seconds: u64) -> Result<()>;
    fn set_looping(&mut self, looping: bool) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn poll_events(&mut self) -> Vec<DeviceEvent>;
    /// Fails once the device can no longer produce events.
    fn ensure_running(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
struct ProgressSubscription {
    generation: u64,
}

/// Keeps a [`PlaybackDevice`] in step with the [`PlayerStore`] and feeds
/// device events back into it. Nothing else talks to the device.
pub(crate) struct AudioBinding<D: PlaybackDevice> {
    device: D,
    bound_generation: u64,
    progress: Option<ProgressSubscription>,
    failure: Option<String>,
    was_playing: bool,
    was_looping: bool,
}

impl<D: PlaybackDevice> AudioBinding<D> {
    pub(crate) fn new(device: D) -> Self {
        Self {
            device,
            bound_generation: 0,
            progress: None,
            failure: None,
            was_playing: false,
            was_looping: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn device(&self) -> &D {
        &self.device
    }

    #[cfg(test)]
    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Applies whatever changed in the store since the last call.
    pub(crate) fn sync(&mut self, store: &mut PlayerStore) {
        let state = store.state();
        let is_playing = state.is_playing();
        let is_looping = state.is_looping();

        if state.episode_generation() != self.bound_generation {
            self.bound_generation = state.episode_generation();
            self.progress = None;
            self.was_looping = is_looping;
            self.was_playing = is_playing;

            let Some(episode) = state.current_episode().cloned() else {
                report("stop", self.device.stop());
                return;
            };

            tracing::info!(title = %episode.title, url = %episode.media_url, "loading episode");
            if let Err(err) = self.device.load(&episode.media_url) {
                tracing::warn!(error = %format!("{err:#}"), "device refused to load episode");
                self.failure = Some(format!("{err:#}"));
                self.was_playing = false;
                store.set_playing_flag(false);
                return;
            }
            report("loop", self.device.set_looping(is_looping));
            report("play", self.device.play());
            return;
        }

        if state.current_episode().is_none() {
            self.was_playing = is_playing;
            self.was_looping = is_looping;
            return;
        }

        if is_looping != self.was_looping {
            self.was_looping = is_looping;
            report("loop", self.device.set_looping(is_looping));
        }
        if is_playing != self.was_playing {
            self.was_playing = is_playing;
            if is_playing {
                report("play", self.device.play());
            } else {
                report("pause", self.device.pause());
            }
        }
    }

    /// Drains device events into the store; returns how many were seen.
    pub(crate) fn pump(&mut self, store: &mut PlayerStore) -> usize {
        let events = self.device.poll_events();
        let count = events.len();
        for event in events {
            self.handle_event(event, store);
        }
        count
    }

    pub(crate) fn handle_event(&mut self, event: DeviceEvent, store: &mut PlayerStore) {
        let has_episode = store.state().current_episode().is_some();
        match event {
            DeviceEvent::Loaded => {
                if has_episode {
                    self.progress = Some(ProgressSubscription {
                        generation: self.bound_generation,
                    });
                }
            }
            DeviceEvent::TimeUpdate(seconds) => {
                if self.is_subscribed(store) {
                    store.set_progress(seconds.max(0.0).floor() as u64);
                }
            }
            DeviceEvent::Started if has_episode => {
                self.was_playing = true;
                store.set_playing_flag(true);
            }
            DeviceEvent::Paused if has_episode => {
                self.was_playing = false;
                store.set_playing_flag(false);
            }
            DeviceEvent::Started | DeviceEvent::Paused => {}
            DeviceEvent::Ended => {
                if !self.is_subscribed(store) {
                    tracing::debug!("ignoring end of a superseded episode");
                    return;
                }
                if store.state().has_next() {
                    store.play_next();
                } else {
                    store.clear();
                }
            }
            DeviceEvent::Failed(reason) => {
                tracing::warn!(%reason, "playback failed");
                self.progress = None;
                self.failure = Some(reason);
                self.was_playing = false;
                store.set_playing_flag(false);
            }
        }
        self.sync(store);
    }

    /// Why the last load failed, if it did since the previous call.
    pub(crate) fn take_failure(&mut self) -> Option<String> {
        self.failure.take()
    }

    /// Pumps events until the queue is cleared, calling `on_episode` once per
    /// started episode. A failed load or a dead device ends the run with an
    /// error instead of waiting for events that will never come.
    pub(crate) fn play_until_cleared(
        &mut self,
        store: &mut PlayerStore,
        tick: Duration,
        mut on_episode: impl FnMut(&PlayerState),
    ) -> Result<()> {
        let mut announced = None;
        loop {
            if let Some(reason) = self.take_failure() {
                let title = store
                    .state()
                    .current_episode()
                    .map(|episode| episode.title.clone())
                    .unwrap_or_default();
                bail!("could not play {title}: {reason}");
            }

            let state = store.state();
            if state.current_episode().is_none() {
                return Ok(());
            }
            if announced != Some(state.episode_generation()) {
                announced = Some(state.episode_generation());
                on_episode(state);
            }

            self.device.ensure_running()?;
            thread::sleep(tick);
            self.pump(store);
        }
    }

    /// Moves playback to `offset` seconds, clamped to the episode length.
    pub(crate) fn seek(&mut self, offset: u64, store: &mut PlayerStore) {
        let Some(episode) = store.state().current_episode() else {
            return;
        };
        let target = if episode.duration_seconds > 0 {
            offset.min(episode.duration_seconds)
        } else {
            offset
        };
        report("seek", self.device.seek(target));
        store.set_progress(target);
    }

    pub(crate) fn seek_by(&mut self, delta_seconds: i64, store: &mut PlayerStore) {
        let current = store.state().progress_seconds();
        let target = current.saturating_add_signed(delta_seconds);
        self.seek(target, store);
    }

    fn is_subscribed(&self, store: &PlayerStore) -> bool {
        self.progress
            .is_some_and(|sub| sub.generation == store.state().episode_generation())
    }
}

fn report(request: &str, result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(error = %format!("{err:#}"), "device {request} request failed");
    }
}
