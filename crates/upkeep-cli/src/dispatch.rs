use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Result};
use tracing::info;
use upkeep_core::UpdateLogEntry;
use upkeep_resolver::{LogSource, ManifestSource, UpdateCheck};
use upkeep_updater::{classify_launch, LaunchKind, StartupState, UpdateEvent, UpdateTime, Updater};

use crate::context::AppContext;
use crate::render::{version_status_badge, TerminalProgress, TerminalRenderer};
use crate::{Cli, Commands, SettingsCommands, VisibilityCommands};

pub(crate) fn is_relaunch(args: &[String]) -> bool {
    matches!(classify_launch(args), LaunchKind::AfterUpdate(_))
}

/// Startup after the external updater finished; no subcommand is involved.
pub(crate) fn run_relaunch(args: &[String]) -> Result<()> {
    let context = AppContext::load(None, args)?;
    let (status, message) = describe_startup(&context.startup);
    TerminalRenderer::current().print_status(status, &message);
    Ok(())
}

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let renderer = TerminalRenderer::current();
    let launch_args: &[String] = match &cli.command {
        Commands::Startup { args } => args.as_slice(),
        _ => &[],
    };
    let context = AppContext::load(cli.config.as_deref(), launch_args)?;

    match cli.command {
        Commands::Check => {
            let check = run_check(&context)?;
            print_check(renderer, &context, &check);
        }
        Commands::Update { yes } => {
            let check = run_check(&context)?;
            print_check(renderer, &context, &check);
            if !check.update_available() {
                return Ok(());
            }
            if !yes && !confirm_update(&check)? {
                renderer.print_status("cancelled", "update skipped");
                return Ok(());
            }
            run_update(renderer, &context, check)?;
        }
        Commands::Log => {
            let resolver = context.resolver()?;
            let result = resolver.fetch_update_log(
                &context.update_log_url()?,
                context.config.bundled_update_log.as_deref(),
            )?;
            if result.source != LogSource::Remote {
                renderer.print_status(
                    "info",
                    &format!("showing {} release notes", log_source_label(result.source)),
                );
            }
            for entry in &result.log.entries {
                renderer.print_section(&entry.version);
                renderer.print_lines(&format_log_entry(entry));
            }
            if !result.log.rejected.is_empty() {
                renderer.print_status(
                    "warn",
                    &format!("{} malformed entries skipped", result.log.rejected.len()),
                );
            }
        }
        Commands::Settings { command } => match command {
            SettingsCommands::Get { key } => match context.store.get(&key)? {
                Some(value) => println!("{value}"),
                None => bail!("setting '{key}' not found"),
            },
            SettingsCommands::Set { key, value } => {
                context.store.set(&key, &value)?;
                renderer.print_status("ok", &format!("{key} = {value}"));
            }
            SettingsCommands::Delete { key } => {
                if !context.store.delete(&key)? {
                    bail!("setting '{key}' not found");
                }
                renderer.print_status("ok", &format!("{key} deleted"));
            }
            SettingsCommands::List => {
                let lines = context
                    .store
                    .all()?
                    .into_iter()
                    .map(|(key, value)| format!("{key} = {value}"))
                    .collect::<Vec<_>>();
                renderer.print_lines(&lines);
            }
        },
        Commands::Visibility { command } => match command {
            VisibilityCommands::Get { name } => match context.store.visibility(&name)? {
                Some(visible) => println!("{}", visibility_label(visible)),
                None => bail!("no visibility flag named '{name}'"),
            },
            VisibilityCommands::Set { name, visible } => {
                context.store.set_visibility(&name, visible)?;
                renderer.print_status("ok", &format!("{name} {}", visibility_label(visible)));
            }
            VisibilityCommands::List => {
                let lines = context
                    .store
                    .visibility_all()?
                    .into_iter()
                    .map(|(name, visible)| format!("{name} = {}", visibility_label(visible)))
                    .collect::<Vec<_>>();
                renderer.print_lines(&lines);
            }
        },
        Commands::Startup { .. } => {
            let (status, message) = describe_startup(&context.startup);
            renderer.print_status(status, &message);
        }
    }

    Ok(())
}

pub(crate) fn describe_startup(state: &StartupState) -> (&'static str, String) {
    match (state.just_updated, &state.update_time) {
        (true, UpdateTime::At(time)) => ("done", format!("updated at {time}")),
        (true, UpdateTime::Unknown) => ("done", "updated at an unknown time".to_string()),
        (false, time) => (
            "info",
            format!("normal launch; last update {}", time.display()),
        ),
    }
}

fn run_check(context: &AppContext) -> Result<UpdateCheck> {
    let resolver = context.resolver()?;
    Ok(resolver.check_for_update(&context.update_url()?, &context.config.current_version)?)
}

fn print_check(renderer: TerminalRenderer, context: &AppContext, check: &UpdateCheck) {
    renderer.print_status(version_status_badge(check.status), check.status.message());
    renderer.print_lines(&format_check_details(
        check,
        &context.config.current_version,
    ));
}

pub(crate) fn format_check_details(check: &UpdateCheck, current_version: &str) -> Vec<String> {
    let mut lines = vec![
        format!("installed: {current_version}"),
        format!("published: {}", check.manifest.latest_version),
    ];
    if check.source == ManifestSource::Cached {
        lines.push("manifest: offline, using cached copy".to_string());
    }
    if check.update_available() && check.manifest.is_mandatory() {
        lines.push("this update is mandatory".to_string());
    }
    if let Some(size) = check.manifest.download_size {
        lines.push(format!("download size: {}", indicatif::HumanBytes(size)));
    }
    if let Some(notes) = check
        .manifest
        .release_notes
        .as_deref()
        .filter(|notes| !notes.trim().is_empty())
    {
        lines.push(format!("notes: {}", notes.trim()));
    }
    lines
}

pub(crate) fn format_log_entry(entry: &UpdateLogEntry) -> Vec<String> {
    let mut lines = Vec::with_capacity(entry.changes.len() + 1);
    if let Some(time) = entry.update_time.as_deref() {
        lines.push(format!("released {time}"));
    }
    lines.extend(entry.changes.iter().map(|change| format!("- {change}")));
    lines
}

fn log_source_label(source: LogSource) -> &'static str {
    match source {
        LogSource::Remote => "remote",
        LogSource::Cached => "cached",
        LogSource::Bundled => "bundled",
    }
}

fn visibility_label(visible: bool) -> &'static str {
    if visible {
        "shown"
    } else {
        "hidden"
    }
}

fn confirm_update(check: &UpdateCheck) -> Result<bool> {
    if !io::stdin().is_terminal() {
        bail!("refusing to update without --yes when stdin is not a terminal");
    }
    print!("Install {}? [y/N] ", check.manifest.latest_version);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn run_update(renderer: TerminalRenderer, context: &AppContext, check: UpdateCheck) -> Result<()> {
    let updater = Updater::from_config(&context.config, context.store.clone())?;
    let handle = updater.begin(check.manifest)?;

    let mut progress: Option<TerminalProgress> = None;
    for event in &handle.events {
        match event {
            UpdateEvent::Started { version, mode, .. } => {
                renderer.print_status("info", &format!("updating to {version} ({})", mode.as_str()));
            }
            UpdateEvent::Reusing { path } => {
                renderer.print_status("info", &format!("reusing {}", path.display()));
            }
            UpdateEvent::Progress(update) => {
                progress
                    .get_or_insert_with(|| renderer.start_progress("download", update.total))
                    .set(&update);
            }
            UpdateEvent::Verifying { .. } => {
                if let Some(bar) = progress.take() {
                    bar.finish_success();
                }
                renderer.print_status("info", "verifying checksum");
            }
            UpdateEvent::Retrying {
                attempt,
                attempts,
                reason,
            } => {
                if let Some(bar) = progress.take() {
                    bar.finish_abandon();
                }
                renderer.print_status("warn", &format!("attempt {attempt}/{attempts} failed: {reason}"));
            }
            UpdateEvent::Installing { mode } => {
                renderer.print_status("info", &format!("installing ({})", mode.as_str()));
            }
            UpdateEvent::Finished(status) => {
                renderer.print_status("done", &status.message());
            }
            UpdateEvent::Failed(failure) => {
                if let Some(bar) = progress.take() {
                    bar.finish_abandon();
                }
                renderer.print_status(failure.status(), &failure.to_string());
            }
        }
    }

    let status = handle.wait()?;
    if status.exit_host() {
        info!(version = %status.version, "exiting so the update can replace this process");
        std::process::exit(0);
    }
    Ok(())
}
