//! Reverse-proxy gateway: reload the running proxy's configuration, or
//! restart the container when a reload is refused.

use crate::docker;
use anyhow::{Context, Result};
use dockdev_core::config::REVERSE_PROXY_CONTAINER;
use std::time::Duration;
use tracing::warn;

/// Reloads the proxy configuration; falls back to restarting the
/// container. Fails only when both fail.
pub fn reload_or_restart() -> Result<()> {
    let reload = docker::exec(REVERSE_PROXY_CONTAINER, &["nginx", "-s", "reload"])?;
    if reload.status.success() {
        return Ok(());
    }

    warn!("proxy reload failed, restarting the container instead");
    docker::restart(REVERSE_PROXY_CONTAINER)
        .context("failed to reload or restart the reverse proxy")?;

    // Give the restarted container a moment before anything talks to it.
    std::thread::sleep(Duration::from_secs(2));
    Ok(())
}
