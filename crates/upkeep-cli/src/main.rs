use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod context;
mod dispatch;
mod logging;
mod render;

use dispatch::{is_relaunch, run_cli, run_relaunch};

#[derive(Parser, Debug)]
#[command(name = "upkeep")]
#[command(about = "Self-update and settings management", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to upkeep.toml; defaults to the file next to the executable.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LogFormat::Human, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare the running version with the published manifest.
    Check,
    /// Download, verify and install the latest version.
    Update {
        #[arg(long)]
        yes: bool,
    },
    /// Show release notes.
    Log,
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    Visibility {
        #[command(subcommand)]
        command: VisibilityCommands,
    },
    /// Reconcile state left by a previous update, given the launch arguments.
    Startup {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    Get { key: String },
    Set { key: String, value: String },
    Delete { key: String },
    List,
}

#[derive(Subcommand, Debug)]
enum VisibilityCommands {
    Get {
        name: String,
    },
    Set {
        name: String,
        #[arg(action = clap::ArgAction::Set, value_parser = parse_visible)]
        visible: bool,
    },
    List,
}

fn parse_visible(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "show" => Ok(true),
        "0" | "false" | "off" | "hide" => Ok(false),
        other => Err(format!("expected show/hide, true/false or 1/0, got '{other}'")),
    }
}

fn main() -> Result<()> {
    // The external updater relaunches with bare `updated <timestamp>`.
    let launch_args = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    if is_relaunch(&launch_args) {
        logging::init(LogFormat::Human);
        return run_relaunch(&launch_args);
    }

    let cli = Cli::parse();
    logging::init(cli.log_format);
    run_cli(cli)
}
