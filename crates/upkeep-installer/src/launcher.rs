use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use tracing::info;

/// Starts a detached child process and reports its pid once it is running.
pub trait ProcessLauncher {
    fn launch(&mut self, program: &Path, args: &[OsString]) -> Result<u32>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn launch(&mut self, program: &Path, args: &[OsString]) -> Result<u32> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to launch {}", program.display()))?;
        let pid = child.id();
        info!(program = %program.display(), pid, "launched detached process");
        Ok(pid)
    }
}
