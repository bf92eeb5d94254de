//! Clap derive structures for the `camsync` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only depends on clap and clap_complete so the build script can include
//! it for man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camsync -- live device state and capture control for camera services
#[derive(Debug, Parser)]
#[command(
    name = "camsync",
    version,
    about = "Control camera capture services from the command line",
    long_about = "Watch live device state, start and stop preview or storage capture,\n\
        adjust exposure and gain, and browse stored captures on a camera\n\
        control service.",
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
    /// Service profile to use
    #[arg(long, short = 'p', env = "CAMSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service URL (overrides profile)
    #[arg(long, short = 'u', env = "CAMSYNC_URL", global = true)]
    pub url: Option<String>,

    /// Service token for privileged operations
    #[arg(long, env = "CAMSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAMSYNC_OUTPUT",
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

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "CAMSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP timeout in seconds (0 = none)
    #[arg(long, env = "CAMSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
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
    /// List discovered devices
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Show per-device status, optionally following live updates
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Select a device (stops preview on the previous one, starts it here)
    Select(KeyArg),

    /// Start or stop live preview
    Preview(RunArgs),

    /// Start or stop storage capture
    Storage(RunArgs),

    /// Capture a single image
    Capture(KeyArg),

    /// Set the storage save interval
    Interval(IntervalArgs),

    /// Read or change exposure and gain
    Settings(SettingsArgs),

    /// Grab one preview frame from the live channel
    Frame(FrameArgs),

    /// Browse and manage stored captures
    #[command(alias = "fs")]
    Files(FilesArgs),

    /// Restart the control service (needs a service token)
    Restart,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct KeyArg {
    /// Device key as reported by `camsync devices`
    pub key: String,
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Keep running and print state changes and events as they arrive
    #[arg(long, short = 'w')]
    pub watch: bool,
}

// ── Preview / Storage ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommand,
}

#[derive(Debug, Subcommand)]
pub enum RunCommand {
    /// Start
    Start(KeyArg),
    /// Stop
    Stop(KeyArg),
}

// ── Interval ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct IntervalArgs {
    /// Device key
    pub key: String,

    /// Seconds between stored images (must be positive)
    pub seconds: f64,
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show exposure and gain with their device ranges
    Get(KeyArg),

    /// Change exposure and/or gain
    Set(SettingsSetArgs),
}

#[derive(Debug, Args)]
pub struct SettingsSetArgs {
    /// Device key
    pub key: String,

    /// Manual exposure value
    #[arg(long)]
    pub exposure: Option<f64>,

    /// Switch exposure auto mode on or off
    #[arg(long, value_name = "BOOL")]
    pub exposure_auto: Option<bool>,

    /// Manual gain value
    #[arg(long)]
    pub gain: Option<f64>,

    /// Switch gain auto mode on or off
    #[arg(long, value_name = "BOOL")]
    pub gain_auto: Option<bool>,
}

// ── Frame ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FrameArgs {
    /// Device key
    pub key: String,

    /// Write the image to this file
    #[arg(long, short = 'O', conflicts_with = "data_uri")]
    pub out: Option<PathBuf>,

    /// Print the frame as a data: URI
    #[arg(long)]
    pub data_uri: bool,

    /// Seconds to wait for a frame
    #[arg(long, default_value = "10")]
    pub wait: u64,
}

// ── Files ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub command: FilesCommand,
}

#[derive(Debug, Subcommand)]
pub enum FilesCommand {
    /// List a folder (root when omitted)
    Ls {
        #[arg(default_value = "")]
        path: String,
    },

    /// Delete a file
    Rm { path: String },

    /// Delete a folder and everything in it
    Rmdir { path: String },

    /// Download a folder as an archive
    Download {
        path: String,

        /// Output file (defaults to <folder>.zip)
        #[arg(long, short = 'O')]
        out: Option<PathBuf>,
    },

    /// Follow a folder and re-list it when new captures land there
    Watch {
        #[arg(default_value = "")]
        path: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive setup wizard
    Init,

    /// Show the resolved configuration (tokens redacted)
    Show,

    /// Print the config file path
    Path,

    /// List profiles
    Profiles,

    /// Set the default profile
    Use { name: String },

    /// Store the active profile's service token in the system keyring
    SetToken,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
