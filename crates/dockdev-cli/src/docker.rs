//! Container runtime gateway. Every imperative docker interaction goes
//! through here; exit status is the sole signal of success.

use crate::prompt;
use crate::style;
use anyhow::Result;
use dockdev_core::config::COMPOSE_FILE;
use dockdev_core::error::ProvisionError;
use std::path::Path;
use std::process::{Command, Output};
use std::time::Duration;
use tracing::{debug, warn};

fn docker() -> Command {
    Command::new("docker")
}

fn tool_failure(tool: &str, output: &Output) -> ProvisionError {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    ProvisionError::ToolFailure {
        tool: tool.to_string(),
        output: combined.trim().to_string(),
    }
}

/// Probes whether the container runtime is reachable.
#[must_use]
pub fn probe() -> bool {
    docker()
        .arg("info")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// Verifies the runtime is reachable. When it is not and we are attached
/// to a terminal, offers to start it and re-probes; otherwise fails with
/// `RuntimeUnavailable`.
pub fn ensure_running(interactive: bool) -> Result<()> {
    if probe() {
        return Ok(());
    }

    if interactive && prompt::confirm("Docker is not running. Try to start it?", true)? {
        start_runtime()?;
        return Ok(());
    }

    Err(ProvisionError::RuntimeUnavailable.into())
}

/// Attempts to start the runtime and waits for it to come up. Under WSL
/// this launches Docker Desktop on the Windows side; elsewhere there is
/// nothing we can reliably start for the user.
fn start_runtime() -> Result<()> {
    let desktop = Path::new("/mnt/c/Program Files/Docker/Docker/Docker Desktop.exe");
    if !desktop.exists() {
        warn!("no known way to start the container runtime on this host");
        return Err(ProvisionError::RuntimeUnavailable.into());
    }

    println!("{} Starting Docker Desktop...", style::DOT);
    let status = Command::new("cmd.exe")
        .args([
            "/c",
            "start",
            "\"Docker Desktop\"",
            r"C:\Program Files\Docker\Docker\Docker Desktop.exe",
        ])
        .status();
    if !status.map(|s| s.success()).unwrap_or(false) {
        return Err(ProvisionError::RuntimeUnavailable.into());
    }

    for attempt in 1..=30u32 {
        std::thread::sleep(Duration::from_secs(2));
        debug!("waiting for the runtime ({attempt}/30)");
        if probe() {
            println!("{} Docker is now running.", style::CHECK);
            return Ok(());
        }
    }
    Err(ProvisionError::RuntimeUnavailable.into())
}

/// Brings up the services defined in `dir` (detached, idempotent).
pub fn compose_up(dir: &Path) -> Result<()> {
    let output = docker()
        .args(["compose", "up", "-d"])
        .current_dir(dir)
        .output()
        .map_err(|_| ProvisionError::RuntimeUnavailable)?;
    if !output.status.success() {
        return Err(tool_failure("docker compose up", &output).into());
    }
    Ok(())
}

/// Brings down the services defined in `dir`. A known harmless compose
/// warning is filtered out of the surfaced output.
pub fn compose_down(dir: &Path) -> Result<()> {
    if !dir.join(COMPOSE_FILE).exists() {
        anyhow::bail!("no {} in {}", COMPOSE_FILE, dir.display());
    }

    let output = docker()
        .args(["compose", "down"])
        .current_dir(dir)
        .output()
        .map_err(|_| ProvisionError::RuntimeUnavailable)?;

    for line in String::from_utf8_lossy(&output.stderr).lines() {
        if line.contains("No resource found to remove") {
            continue;
        }
        debug!("compose: {line}");
    }

    if !output.status.success() {
        return Err(tool_failure("docker compose down", &output).into());
    }
    Ok(())
}

/// Executes a command inside a named running container.
pub fn exec(container: &str, args: &[&str]) -> Result<Output> {
    let output = docker()
        .arg("exec")
        .arg(container)
        .args(args)
        .output()
        .map_err(|_| ProvisionError::RuntimeUnavailable)?;
    Ok(output)
}

/// Restarts a named container.
pub fn restart(container: &str) -> Result<()> {
    let output = docker()
        .args(["restart", container])
        .output()
        .map_err(|_| ProvisionError::RuntimeUnavailable)?;
    if !output.status.success() {
        return Err(tool_failure("docker restart", &output).into());
    }
    Ok(())
}
