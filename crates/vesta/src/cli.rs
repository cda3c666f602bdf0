//! Clap derive structures for the `vesta` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use vesta_core::ArmMode;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vesta -- talk to a Vesta alarm panel over the local network
#[derive(Debug, Parser)]
#[command(
    name = "vesta",
    version,
    about = "Monitor and arm Vesta alarm panels from the command line",
    long_about = "Polls the panel's local HTTP API for status, enrolled devices and\n\
        the event log, and issues arm-mode commands that are confirmed\n\
        against the polled state.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Panel profile to use
    #[arg(long, short = 'p', env = "VESTA_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Panel host or IP, optionally with :port (overrides profile)
    #[arg(long, short = 'H', env = "VESTA_HOST", global = true)]
    pub host: Option<String>,

    /// Panel username (overrides profile)
    #[arg(long, short = 'u', env = "VESTA_USERNAME", global = true)]
    pub username: Option<String>,

    /// Config file path
    #[arg(long, env = "VESTA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Talk HTTPS to the panel
    #[arg(long, global = true)]
    pub https: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "VESTA_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds, shorter than the tick deadline (overrides profile)
    #[arg(long, env = "VESTA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show arm mode and panel health
    #[command(alias = "st")]
    Status,

    /// List enrolled devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Show the recent event log
    #[command(alias = "ev")]
    Events(EventsArgs),

    /// Poll continuously and print changes as they happen
    Watch(WatchArgs),

    /// Change the arm mode and wait for the panel to confirm it
    Arm(ArmArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Resource Args ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct DevicesArgs {
    /// Only devices currently reporting an active state
    #[arg(long)]
    pub triggered: bool,

    /// Show a single device by id
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Only events attributed to this device
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Show at most this many events (newest first)
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Poll interval, e.g. "5s" (overrides profile)
    #[arg(long, value_parser = humantime_duration)]
    pub interval: Option<std::time::Duration>,
}

#[derive(Debug, Args)]
pub struct ArmArgs {
    /// Target mode
    pub mode: ArmTarget,

    /// Panel area (overrides profile)
    #[arg(long)]
    pub area: Option<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ArmTarget {
    /// Disarm the panel
    #[value(alias = "off")]
    Disarm,
    /// Full arm
    Away,
    /// Perimeter arm while occupied
    #[value(alias = "stay")]
    Home,
    /// Night arm
    Night,
}

impl From<ArmTarget> for ArmMode {
    fn from(target: ArmTarget) -> Self {
        match target {
            ArmTarget::Disarm => Self::Disarmed,
            ArmTarget::Away => Self::ArmedAway,
            ArmTarget::Home => Self::ArmedHome,
            ArmTarget::Night => Self::ArmedNight,
        }
    }
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,

    /// Display the current configuration
    Show,

    /// List configured profiles (* marks the default)
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name
        name: String,
    },

    /// Store the panel password in the system keyring
    SetPassword {
        /// Profile (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Check that the active profile can reach and log in to the panel
    Test,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

fn humantime_duration(raw: &str) -> Result<std::time::Duration, String> {
    let duration = humantime::parse_duration(raw).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("interval must be greater than zero".into());
    }
    Ok(duration)
}
