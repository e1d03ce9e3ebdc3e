use std::path::PathBuf;

use anyhow::{Context, Result};

fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("unable to resolve data directory")?;
    Ok(base.join("podcastr"))
}

pub fn database_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("podcastr.db"))
}

pub fn log_file_path() -> Result<PathBuf> {
    Ok(data_dir()?.join("podcastr.log"))
}

pub fn mpv_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!("podcastr-mpv-{}.sock", std::process::id()))
}
