//! The remove workflow: best-effort teardown of everything creation set
//! up. Every step is attempted regardless of earlier failures and the
//! outcome of each is collected into a report.

use crate::style;
use crate::{docker, prompt, proxy, trust};
use anyhow::Result;
use dockdev_core::config::{self, Config, Layout, COMPOSE_FILE};
use dockdev_core::lock::WorkflowLock;
use dockdev_core::{hosts, ipmap};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Ok,
    Skipped,
    Warned,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub name: &'static str,
    pub status: StepStatus,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub domain: String,
    pub steps: Vec<StepReport>,
}

impl CleanupReport {
    fn record(&mut self, name: &'static str, status: StepStatus, detail: impl Into<String>) {
        self.steps.push(StepReport {
            name,
            status,
            detail: detail.into(),
        });
    }
}

pub struct RemoveOptions {
    pub assume_yes: bool,
    pub json: bool,
}

pub enum RemoveOutcome {
    Aborted,
    Done(CleanupReport),
}

/// Tears down `domain`. Nothing in here is fatal: a step that cannot
/// complete is recorded as a warning and the teardown moves on, so a
/// half-broken project can always be removed.
pub fn run(layout: &Layout, domain: &str, opts: &RemoveOptions) -> Result<RemoveOutcome> {
    if !opts.assume_yes
        && prompt::is_terminal()
        && !prompt::confirm(&format!("Remove {domain} and all of its data?"), false)?
    {
        return Ok(RemoveOutcome::Aborted);
    }

    let mut report = CleanupReport {
        domain: domain.to_string(),
        steps: Vec::new(),
    };

    let project_dir = layout.project_dir(domain);
    stop_containers(&project_dir, &mut report);
    remove_project_dir(&project_dir, &mut report);
    remove_certificates(layout, domain, &mut report);
    remove_trusted_cert(domain, &mut report);

    let site_removed = prune_workspace_state(layout, domain, &mut report);
    remove_hosts_entry(layout, domain, &mut report);

    if !site_removed {
        report.record("proxy reload", StepStatus::Skipped, "nothing to reload");
    } else if !docker::probe() {
        report.record(
            "proxy reload",
            StepStatus::Warned,
            "runtime unreachable, reload skipped",
        );
    } else {
        match proxy::reload_or_restart() {
            Ok(()) => report.record("proxy reload", StepStatus::Ok, "configuration reloaded"),
            Err(e) => report.record("proxy reload", StepStatus::Warned, format!("{e:#}")),
        }
    }

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(RemoveOutcome::Done(report))
}

fn stop_containers(project_dir: &Path, report: &mut CleanupReport) {
    if !project_dir.join(COMPOSE_FILE).exists() {
        report.record("stop containers", StepStatus::Skipped, "no manifest");
        return;
    }
    if !docker::probe() {
        report.record(
            "stop containers",
            StepStatus::Warned,
            "container runtime unreachable, containers may be left running",
        );
        return;
    }
    match docker::compose_down(project_dir) {
        Ok(()) => report.record("stop containers", StepStatus::Ok, "compose down"),
        Err(e) => report.record("stop containers", StepStatus::Warned, format!("{e:#}")),
    }
}

/// Removes the project tree. Containers sometimes leave root-owned files
/// in data/; when the plain removal hits a permission error we retry the
/// whole tree through sudo.
fn remove_project_dir(project_dir: &Path, report: &mut CleanupReport) {
    if !project_dir.exists() {
        report.record("project directory", StepStatus::Skipped, "not present");
        return;
    }
    match std::fs::remove_dir_all(project_dir) {
        Ok(()) => {
            report.record("project directory", StepStatus::Ok, "removed");
            return;
        }
        Err(e) => debug!("plain removal failed ({e}), retrying with sudo"),
    }

    let status = std::process::Command::new("sudo")
        .arg("rm")
        .arg("-rf")
        .arg(project_dir)
        .status();
    match status {
        Ok(s) if s.success() => {
            report.record("project directory", StepStatus::Ok, "removed (sudo)");
        }
        _ => report.record(
            "project directory",
            StepStatus::Warned,
            format!("could not remove {}", project_dir.display()),
        ),
    }
}

fn remove_certificates(layout: &Layout, domain: &str, report: &mut CleanupReport) {
    let domain_certs = layout.certs_dir().join(domain);
    if !domain_certs.exists() {
        report.record("certificates", StepStatus::Skipped, "not present");
        return;
    }
    match std::fs::remove_dir_all(&domain_certs) {
        Ok(()) => report.record("certificates", StepStatus::Ok, "removed"),
        Err(e) => report.record("certificates", StepStatus::Warned, e.to_string()),
    }
}

fn remove_trusted_cert(domain: &str, report: &mut CleanupReport) {
    if !trust::domain_cert_trusted(domain) {
        report.record("trust store", StepStatus::Skipped, "no trusted certificate");
        return;
    }
    match trust::remove_domain_cert(domain) {
        Ok(()) => report.record("trust store", StepStatus::Ok, "certificate removed"),
        Err(e) => report.record("trust store", StepStatus::Warned, format!("{e:#}")),
    }
}

/// Prunes the IP map and deletes the site config under the workspace
/// lock. Returns whether a site config was actually removed.
fn prune_workspace_state(layout: &Layout, domain: &str, report: &mut CleanupReport) -> bool {
    let _lock = match WorkflowLock::acquire(&layout.lock_path()) {
        Ok(lock) => lock,
        Err(e) => {
            warn!("could not take the workspace lock: {e:#}");
            report.record("ip map", StepStatus::Warned, "workspace lock unavailable");
            report.record("site config", StepStatus::Skipped, "workspace lock unavailable");
            return false;
        }
    };

    match ipmap::prune(&layout.ipmap_path(), domain) {
        Ok(0) => report.record("ip map", StepStatus::Skipped, "no entries"),
        Ok(n) => report.record("ip map", StepStatus::Ok, format!("{n} entr(ies) pruned")),
        Err(e) => report.record("ip map", StepStatus::Warned, format!("{e:#}")),
    }

    let site_conf = layout.site_conf(domain);
    if !site_conf.exists() {
        report.record("site config", StepStatus::Skipped, "not present");
        return false;
    }
    match std::fs::remove_file(&site_conf) {
        Ok(()) => {
            report.record("site config", StepStatus::Ok, "removed");
            true
        }
        Err(e) => {
            report.record("site config", StepStatus::Warned, e.to_string());
            false
        }
    }
}

/// Removes the hosts entry. The hosts path comes from the workspace
/// config when one is loadable; a workspace without `.env` still gets its
/// hosts entry cleaned via the platform default.
fn remove_hosts_entry(layout: &Layout, domain: &str, report: &mut CleanupReport) {
    let hosts_path: PathBuf = match Config::load(&layout.root) {
        Ok(config) => config.hosts_path,
        Err(_) => config::default_hosts_path(),
    };
    match hosts::remove_entry(&hosts_path, domain) {
        Ok(true) => report.record("hosts entry", StepStatus::Ok, "removed"),
        Ok(false) => report.record("hosts entry", StepStatus::Skipped, "not present"),
        Err(e) => report.record("hosts entry", StepStatus::Warned, format!("{e:#}")),
    }
}

fn print_report(report: &CleanupReport) {
    println!("Removed {}:", report.domain);
    for step in &report.steps {
        let mark = match step.status {
            StepStatus::Ok => style::CHECK.to_string(),
            StepStatus::Skipped => style::DOT.to_string(),
            StepStatus::Warned => style::WARN.to_string(),
        };
        println!("  {mark} {}: {}", step.name, step.detail);
    }
}
