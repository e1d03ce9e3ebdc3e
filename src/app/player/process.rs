use std::process::{Child, Command as ProcessCommand};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// Spawns `cmd` in its own process group so keyboard signals sent to the
/// terminal's foreground group never reach it. On Linux the child is also
/// told to exit when we do, even if we never get to run `Drop`.
#[cfg(unix)]
pub(crate) fn spawn_detached(mut cmd: ProcessCommand) -> Result<Child> {
    unsafe {
        cmd.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_IGN);
            libc::signal(libc::SIGTSTP, libc::SIG_IGN);
            exit_with_parent()?;
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    cmd.spawn().context("failed to spawn audio process")
}

#[cfg(target_os = "linux")]
fn exit_with_parent() -> std::io::Result<()> {
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn exit_with_parent() -> std::io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn spawn_detached(mut cmd: ProcessCommand) -> Result<Child> {
    cmd.spawn().context("failed to spawn audio process")
}

/// Asks the child to exit, then kills it if it is still around after `grace`.
pub(crate) fn terminate(child: &mut Child, grace: Duration) {
    request_exit(child);

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(%status, "audio process exited");
                return;
            }
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(None) | Err(_) => break,
        }
    }

    if let Err(err) = child.kill() {
        tracing::warn!(error = %err, "failed to kill audio process");
    }
    let _ = child.wait();
}

#[cfg(unix)]
fn request_exit(child: &Child) {
    unsafe {
        let _ = libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) {}
