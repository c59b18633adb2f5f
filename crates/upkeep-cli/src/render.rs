use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use upkeep_core::VersionStatus;
use upkeep_updater::DownloadProgress;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    total: Option<u64>,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty()),
    )
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!();
        }
        println!("{}", render_section_line(self.style, title));
    }

    pub(crate) fn start_progress(self, label: &str, total: Option<u64>) -> TerminalProgress {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = match total {
                Some(total) => ProgressBar::new(total.max(1)),
                None => ProgressBar::new_spinner(),
            };
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<10} [{bar:24.cyan/blue}] {bytes:>10}/{total_bytes:10} {bytes_per_sec:>12} {elapsed_precise}",
            ) {
                progress_bar.set_style(style.tick_chars("<^>v ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        TerminalProgress {
            style: self.style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

impl TerminalProgress {
    pub(crate) fn set(&mut self, progress: &DownloadProgress) {
        self.current = progress.downloaded;
        if progress.total.is_some() {
            self.total = progress.total;
        }

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };
        if let Some(total) = self.total {
            progress_bar.set_length(total.max(1));
        }
        progress_bar.set_position(self.current);
    }

    pub(crate) fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    pub(crate) fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn render_section_line(style: OutputStyle, title: &str) -> String {
    let line = format!("== {title} ==");
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(section_style(), &line),
    }
}

pub(crate) fn version_status_badge(status: VersionStatus) -> &'static str {
    match status {
        VersionStatus::UpdateAvailable => "update",
        VersionStatus::AheadOfRemote => "ahead",
        VersionStatus::UpToDate => "ok",
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("{status}: {message}"),
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(status_style(status), &format!("[{status}]"))
        ),
    }
}

pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: Option<u64>,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let (bar, percent) = match total {
        Some(total) => {
            let safe_total = total.max(1);
            let bounded_current = current.min(safe_total);
            let filled = ((bounded_current as u128 * width as u128) / safe_total as u128) as usize;
            (
                format!(
                    "{}{}",
                    "=".repeat(filled),
                    "-".repeat(width.saturating_sub(filled))
                ),
                format!("{:>3}%", (bounded_current * 100) / safe_total),
            )
        }
        None => ("?".repeat(width), "  ?%".to_string()),
    };
    let counts = match total {
        Some(total) => format!("{}/{}", HumanBytes(current), HumanBytes(total)),
        None => HumanBytes(current).to_string(),
    };
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {} {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" | "done" => AnsiColor::BrightGreen,
        "update" | "ahead" | "warn" | "cancelled" => AnsiColor::BrightYellow,
        "info" => AnsiColor::BrightCyan,
        _ => AnsiColor::BrightRed,
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
