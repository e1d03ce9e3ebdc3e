use serde_json::Value;

use super::binding::DeviceEvent;

const PAUSE_OBSERVER: u64 = 1;
const TIME_POS_OBSERVER: u64 = 2;

/// One line of mpv's JSON IPC output, reduced to what playback needs.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IpcMessage {
    Reply { request_id: u64, error: String },
    StartFile { entry: Option<i64> },
    FileLoaded,
    EndFile {
        entry: Option<i64>,
        reason: String,
        file_error: Option<String>,
    },
    Pause(bool),
    TimePos(f64),
}

pub(crate) fn parse_ipc_line(line: &str) -> Option<IpcMessage> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let Some(event) = value.get("event") else {
        return Some(IpcMessage::Reply {
            request_id: value.get("request_id")?.as_u64()?,
            error: value.get("error")?.as_str()?.to_string(),
        });
    };
    let entry = value.get("playlist_entry_id").and_then(Value::as_i64);
    match event.as_str()? {
        "start-file" => Some(IpcMessage::StartFile { entry }),
        "file-loaded" => Some(IpcMessage::FileLoaded),
        "end-file" => Some(IpcMessage::EndFile {
            entry,
            reason: value
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            file_error: value
                .get("file_error")
                .and_then(Value::as_str)
                .map(str::to_string),
        }),
        "property-change" => match value.get("name")?.as_str()? {
            "pause" => value.get("data")?.as_bool().map(IpcMessage::Pause),
            "time-pos" => value.get("data")?.as_f64().map(IpcMessage::TimePos),
            _ => None,
        },
        _ => None,
    }
}

/// Ties mpv's playlist entries to `loadfile` requests so that only the most
/// recent load produces device events.
///
/// A replaced file may end with reason `stop` or, if it never started, emit
/// nothing at all. mpv answers a `loadfile` before it starts the new entry,
/// and any entry started earlier belongs to an older load, so the first
/// `start-file` after the reply to the latest request is the one to follow.
#[derive(Debug, Default)]
pub(crate) struct LoadTracker {
    next_request: u64,
    awaiting_reply: Option<u64>,
    awaiting_start: bool,
    current_entry: Option<i64>,
    playing_entry: Option<i64>,
}

impl LoadTracker {
    /// Returns the `request_id` to send with the `loadfile` command.
    pub(crate) fn begin_load(&mut self) -> u64 {
        self.next_request += 1;
        self.awaiting_reply = Some(self.next_request);
        self.awaiting_start = false;
        self.current_entry = None;
        self.next_request
    }

    pub(crate) fn stop(&mut self) {
        self.awaiting_reply = None;
        self.awaiting_start = false;
        self.current_entry = None;
    }

    fn is_following_playback(&self) -> bool {
        self.current_entry.is_some() && self.playing_entry == self.current_entry
    }

    pub(crate) fn translate(&mut self, message: IpcMessage) -> Option<DeviceEvent> {
        match message {
            IpcMessage::Reply { request_id, error } => {
                if self.awaiting_reply != Some(request_id) {
                    return None;
                }
                self.awaiting_reply = None;
                if error == "success" {
                    self.awaiting_start = true;
                    None
                } else {
                    Some(DeviceEvent::Failed(error))
                }
            }
            IpcMessage::StartFile { entry } => {
                self.playing_entry = entry;
                if self.awaiting_start {
                    self.awaiting_start = false;
                    self.current_entry = entry;
                }
                None
            }
            IpcMessage::FileLoaded => self.is_following_playback().then_some(DeviceEvent::Loaded),
            IpcMessage::TimePos(seconds) => self
                .is_following_playback()
                .then_some(DeviceEvent::TimeUpdate(seconds)),
            IpcMessage::EndFile {
                entry,
                reason,
                file_error,
            } => {
                if self.playing_entry == entry {
                    self.playing_entry = None;
                }
                if entry.is_none() || entry != self.current_entry {
                    tracing::debug!(?entry, %reason, "ignoring end of a replaced file");
                    return None;
                }
                self.current_entry = None;
                match reason.as_str() {
                    "eof" => Some(DeviceEvent::Ended),
                    "error" => Some(DeviceEvent::Failed(
                        file_error.unwrap_or_else(|| "unknown error".to_string()),
                    )),
                    _ => None,
                }
            }
            IpcMessage::Pause(true) => Some(DeviceEvent::Paused),
            IpcMessage::Pause(false) => Some(DeviceEvent::Started),
        }
    }
}

#[cfg(unix)]
pub(crate) use unix::MpvDevice;

#[cfg(not(unix))]
pub(crate) use fallback::MpvDevice;

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::io::{BufRead, BufReader, Write};
    use std::os::unix::net::UnixStream;
    use std::path::{Path, PathBuf};
    use std::process::{Child, Command as ProcessCommand, Stdio};
    use std::sync::mpsc::{self, Receiver};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use anyhow::{Context, Result, anyhow, bail};
    use serde_json::{Value, json};

    use super::super::binding::{DeviceEvent, PlaybackDevice};
    use super::super::process::{spawn_detached, terminate};
    use super::{IpcMessage, LoadTracker, PAUSE_OBSERVER, TIME_POS_OBSERVER, parse_ipc_line};

    const CONNECT_ATTEMPTS: usize = 50;
    const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

    /// An idle `mpv` process driven over its IPC socket.
    pub(crate) struct MpvDevice {
        child: Child,
        socket_path: PathBuf,
        writer: UnixStream,
        messages: Receiver<IpcMessage>,
        reader: Option<JoinHandle<()>>,
        tracker: LoadTracker,
    }

    impl MpvDevice {
        pub(crate) fn spawn(binary: &Path, socket_path: PathBuf) -> Result<Self> {
            let _ = fs::remove_file(&socket_path);

            let mut cmd = ProcessCommand::new(binary);
            cmd.arg("--idle=yes")
                .arg("--no-video")
                .arg("--no-terminal")
                .arg("--really-quiet")
                .arg(format!("--input-ipc-server={}", socket_path.display()))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            let mut child = spawn_detached(cmd)
                .with_context(|| format!("failed to launch {}", binary.display()))?;

            let writer = match connect(&socket_path, &mut child) {
                Ok(stream) => stream,
                Err(err) => {
                    abandon_start(&mut child, &socket_path);
                    return Err(err);
                }
            };
            let read_half = match writer.try_clone() {
                Ok(stream) => stream,
                Err(err) => {
                    abandon_start(&mut child, &socket_path);
                    return Err(err).context("failed to clone mpv IPC socket");
                }
            };

            let (tx, messages) = mpsc::channel();
            let reader = thread::spawn(move || {
                for line in BufReader::new(read_half).lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    tracing::trace!(%line, "mpv ipc");
                    if let Some(message) = parse_ipc_line(&line)
                        && tx.send(message).is_err()
                    {
                        break;
                    }
                }
                tracing::debug!("mpv IPC reader finished");
            });

            let mut device = Self {
                child,
                socket_path,
                writer,
                messages,
                reader: Some(reader),
                tracker: LoadTracker::default(),
            };
            device.command(json!(["observe_property", PAUSE_OBSERVER, "pause"]))?;
            device.command(json!(["observe_property", TIME_POS_OBSERVER, "time-pos"]))?;
            tracing::info!(binary = %binary.display(), "mpv ready");
            Ok(device)
        }

        fn command(&mut self, args: Value) -> Result<()> {
            self.send(json!({ "command": args }))
        }

        fn send(&mut self, message: Value) -> Result<()> {
            let line = message.to_string();
            writeln!(self.writer, "{line}").context("failed to write to mpv IPC socket")?;
            self.writer.flush().context("failed to flush mpv IPC socket")
        }
    }

    /// Kills an mpv that never became usable and removes its socket.
    fn abandon_start(child: &mut Child, socket_path: &Path) {
        terminate(child, Duration::from_millis(200));
        let _ = fs::remove_file(socket_path);
    }

    fn connect(socket_path: &Path, child: &mut Child) -> Result<UnixStream> {
        for _ in 0..CONNECT_ATTEMPTS {
            if let Some(status) = child.try_wait().context("failed to poll mpv")? {
                return Err(anyhow!("mpv exited during start-up with {status}"));
            }
            match UnixStream::connect(socket_path) {
                Ok(stream) => return Ok(stream),
                Err(_) => thread::sleep(CONNECT_RETRY_DELAY),
            }
        }
        Err(anyhow!(
            "mpv IPC socket {} never became available",
            socket_path.display()
        ))
    }

    impl PlaybackDevice for MpvDevice {
        fn load(&mut self, media_url: &str) -> Result<()> {
            let request_id = self.tracker.begin_load();
            self.send(json!({
                "command": ["loadfile", media_url, "replace"],
                "request_id": request_id,
            }))
        }

        fn play(&mut self) -> Result<()> {
            self.command(json!(["set_property", "pause", false]))
        }

        fn pause(&mut self) -> Result<()> {
            self.command(json!(["set_property", "pause", true]))
        }

        fn seek(&mut self, seconds: u64) -> Result<()> {
            self.command(json!(["seek", seconds, "absolute"]))
        }

        fn set_looping(&mut self, looping: bool) -> Result<()> {
            let mode = if looping { "inf" } else { "no" };
            self.command(json!(["set_property", "loop-file", mode]))
        }

        fn stop(&mut self) -> Result<()> {
            self.tracker.stop();
            self.command(json!(["stop"]))
        }

        fn poll_events(&mut self) -> Vec<DeviceEvent> {
            let messages: Vec<IpcMessage> = self.messages.try_iter().collect();
            messages
                .into_iter()
                .filter_map(|message| self.tracker.translate(message))
                .collect()
        }

        fn ensure_running(&mut self) -> Result<()> {
            if let Some(status) = self.child.try_wait().context("failed to poll mpv")? {
                bail!("mpv exited unexpectedly with {status}");
            }
            if self.reader.as_ref().is_some_and(JoinHandle::is_finished) {
                bail!("mpv IPC connection closed");
            }
            Ok(())
        }
    }

    impl Drop for MpvDevice {
        fn drop(&mut self) {
            let _ = self.command(json!(["quit"]));
            terminate(&mut self.child, Duration::from_millis(500));
            let _ = self.writer.shutdown(std::net::Shutdown::Both);
            if let Some(reader) = self.reader.take() {
                let _ = reader.join();
            }
            let _ = fs::remove_file(&self.socket_path);
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn abandoned_start_reaps_the_child_and_socket() {
            let socket_path = std::env::temp_dir()
                .join(format!("podcastr-abandon-{}.sock", std::process::id()));
            fs::write(&socket_path, b"").expect("create socket placeholder");
            let mut cmd = ProcessCommand::new("sleep");
            cmd.arg("30");
            let mut child = spawn_detached(cmd).expect("spawn sleep");

            abandon_start(&mut child, &socket_path);

            assert!(child.try_wait().expect("poll child").is_some());
            assert!(!socket_path.exists());
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use std::path::{Path, PathBuf};

    use anyhow::{Result, bail};

    use super::super::binding::{DeviceEvent, PlaybackDevice};

    pub(crate) struct MpvDevice;

    impl MpvDevice {
        pub(crate) fn spawn(_binary: &Path, _socket_path: PathBuf) -> Result<Self> {
            bail!("the mpv audio backend needs Unix domain sockets")
        }
    }

    impl PlaybackDevice for MpvDevice {
        fn load(&mut self, _media_url: &str) -> Result<()> {
            Ok(())
        }

        fn play(&mut self) -> Result<()> {
            Ok(())
        }

        fn pause(&mut self) -> Result<()> {
            Ok(())
        }

        fn seek(&mut self, _seconds: u64) -> Result<()> {
            Ok(())
        }

        fn set_looping(&mut self, _looping: bool) -> Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> Result<()> {
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<DeviceEvent> {
            Vec::new()
        }

        fn ensure_running(&mut self) -> Result<()> {
            Ok(())
        }
    }
}
