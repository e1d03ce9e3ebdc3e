use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "podcastr",
    version,
    about = "Browse a podcast feed and listen from the terminal"
)]
pub struct Cli {
    /// Episode API base URL (overrides PODCASTR_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// mpv binary used for audio output (overrides PODCASTR_PLAYER_BIN)
    #[arg(long, global = true)]
    pub player_bin: Option<String>,

    /// Number of episodes to fetch
    #[arg(long, global = true, default_value_t = 12)]
    pub limit: u32,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Tui,
    List,
    Play {
        /// 1-based position in the episode list
        index: usize,
        /// Queue only this episode instead of the whole list
        #[arg(long)]
        single: bool,
    },
    History,
}
