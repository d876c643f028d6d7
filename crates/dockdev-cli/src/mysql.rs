//! Shared-database gateway: readiness polling and privilege grants, both
//! executed inside the shared database container.

use crate::docker;
use anyhow::Result;
use dockdev_core::config::SHARED_MYSQL_CONTAINER;
use dockdev_core::error::ProvisionError;
use std::time::Duration;
use tracing::debug;

const READY_ATTEMPTS: u32 = 30;
const READY_INTERVAL: Duration = Duration::from_secs(2);

/// Polls the database with a trivial query until it answers, bounded at
/// `READY_ATTEMPTS` tries.
///
/// # Errors
///
/// `DependencyTimeout` once the retry budget is spent.
pub fn wait_ready(root_password: &str) -> Result<()> {
    let password_flag = format!("-p{root_password}");
    for attempt in 1..=READY_ATTEMPTS {
        let probe = docker::exec(
            SHARED_MYSQL_CONTAINER,
            &["mysql", "-uroot", &password_flag, "-e", "SELECT 1;"],
        )?;
        if probe.status.success() {
            return Ok(());
        }
        debug!("waiting for MySQL ({attempt}/{READY_ATTEMPTS})");
        std::thread::sleep(READY_INTERVAL);
    }

    Err(ProvisionError::DependencyTimeout {
        service: SHARED_MYSQL_CONTAINER.to_string(),
        attempts: READY_ATTEMPTS,
    }
    .into())
}

/// Grants the application user full privileges.
pub fn grant_privileges(root_password: &str, user: &str) -> Result<()> {
    let password_flag = format!("-p{root_password}");
    let sql = format!("GRANT ALL PRIVILEGES ON *.* TO '{user}'@'%' WITH GRANT OPTION;");
    let output = docker::exec(
        SHARED_MYSQL_CONTAINER,
        &["mysql", "-uroot", &password_flag, "-e", &sql],
    )?;
    if !output.status.success() {
        return Err(ProvisionError::ToolFailure {
            tool: "mysql grant".to_string(),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }
    Ok(())
}
