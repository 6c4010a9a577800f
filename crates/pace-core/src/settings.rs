use clap::Parser;
use std::path::PathBuf;

/// Default location of the subscription document, relative to the working dir.
pub const DEFAULT_DATA_FILE: &str = "data/live_paceman_players_list.json";

/// Default paceman.gg origin.
pub const DEFAULT_API_BASE: &str = "https://paceman.gg";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Live speed-run pace notifications from paceman.gg
#[derive(Parser, Debug, Clone)]
#[command(
    name = "livepace",
    about = "Live speed-run pace notifications from paceman.gg",
    version
)]
pub struct Settings {
    /// Subscription document path
    #[arg(long, env = "LIVEPACE_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    /// paceman.gg base URL
    #[arg(long, env = "LIVEPACE_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Seconds between the end of one poll and the start of the next (1-3600)
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub poll_interval: u64,

    /// Pause between two sends to subscribers of the same player, in ms (0-10000)
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(0..=10_000))]
    pub send_pause_ms: u64,

    /// Webhook that receives `{destination, text}` JSON; prints to stdout when absent
    #[arg(long, env = "LIVEPACE_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Destination id used for commands typed on stdin
    #[arg(long, default_value = "console")]
    pub destination: String,

    /// Accept any player name without asking paceman.gg first
    #[arg(long)]
    pub skip_player_check: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse process arguments and apply `--debug`.
    pub fn load() -> Self {
        Self::resolve(Settings::parse())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Settings::try_parse_from(args).map(Self::resolve)
    }

    fn resolve(mut settings: Settings) -> Settings {
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// `tracing` filter directive for [`Settings::log_level`].
    pub fn tracing_level(&self) -> &'static str {
        match self.log_level.to_uppercase().as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval)
    }

    pub fn send_pause(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.send_pause_ms)
    }
}
