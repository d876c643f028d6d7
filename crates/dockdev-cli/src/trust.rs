//! Host trust-store integration. Under WSL this reaches over to the
//! Windows certificate store through certutil; on plain Linux it copies
//! the root CA into the distro's CA anchor directory.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Whether we are running inside WSL with a Windows side to talk to.
#[must_use]
pub fn is_wsl() -> bool {
    Path::new("/proc/sys/fs/binfmt_misc/WSLInterop").exists()
        || Path::new("/mnt/c/Windows").exists()
}

/// Translates a WSL path to its Windows spelling. Returns `None` when
/// wslpath is unavailable or refuses the path, so callers can fall back
/// to the original.
fn wslpath_to_windows(path: &Path) -> Option<String> {
    let output = Command::new("wslpath")
        .arg("-w")
        .arg(path)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let converted = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if converted.is_empty() { None } else { Some(converted) }
}

/// Installs the root CA into the host trust store. Elevation is the
/// host's business: on Windows a UAC prompt appears, on Linux sudo asks.
pub fn install_root_ca(ca_path: &Path) -> Result<()> {
    if is_wsl() {
        install_root_ca_windows(ca_path)
    } else {
        install_root_ca_linux(ca_path)
    }
}

fn install_root_ca_windows(ca_path: &Path) -> Result<()> {
    let windows_path = wslpath_to_windows(ca_path)
        .unwrap_or_else(|| ca_path.display().to_string());
    debug!("installing root CA into the Windows store: {windows_path}");

    let script = format!(
        "Start-Process certutil -ArgumentList '-addstore','Root','{windows_path}' -Verb RunAs -Wait"
    );
    let status = Command::new("powershell.exe")
        .args(["-NoProfile", "-Command", &script])
        .status()
        .context("failed to invoke powershell.exe")?;
    if !status.success() {
        bail!("certutil refused to add the root CA (was the elevation prompt declined?)");
    }
    Ok(())
}

fn install_root_ca_linux(ca_path: &Path) -> Result<()> {
    // Fedora-family first, Debian-family second.
    let candidates: &[(&str, &str, &[&str])] = &[
        (
            "/etc/pki/ca-trust/source/anchors",
            "update-ca-trust",
            &["extract"],
        ),
        (
            "/usr/local/share/ca-certificates",
            "update-ca-certificates",
            &[],
        ),
    ];

    for (anchor_dir, refresh, refresh_args) in candidates {
        if !Path::new(anchor_dir).is_dir() {
            continue;
        }
        let dest = format!("{anchor_dir}/dockdev-root-ca.crt");
        let copied = Command::new("sudo")
            .arg("cp")
            .arg(ca_path)
            .arg(&dest)
            .status()
            .context("failed to invoke sudo cp")?;
        if !copied.success() {
            bail!("could not copy the root CA to {dest}");
        }
        let refreshed = Command::new("sudo")
            .arg(refresh)
            .args(*refresh_args)
            .status()
            .with_context(|| format!("failed to invoke {refresh}"))?;
        if !refreshed.success() {
            bail!("{refresh} failed after installing the root CA");
        }
        return Ok(());
    }

    bail!("no known CA anchor directory on this system; trust the root CA manually")
}

/// Whether a certificate for `domain` sits in the host trust store. Only
/// answerable under WSL; on plain Linux per-domain certificates are never
/// installed host-side, so this is always false there.
#[must_use]
pub fn domain_cert_trusted(domain: &str) -> bool {
    if !is_wsl() {
        return false;
    }
    let output = Command::new("certutil.exe")
        .args(["-store", "Root", domain])
        .output();
    match output {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

/// Removes a per-domain certificate from the Windows store. Best effort:
/// a declined elevation prompt is reported, not fatal.
pub fn remove_domain_cert(domain: &str) -> Result<()> {
    if !is_wsl() {
        return Ok(());
    }
    let script = format!(
        "Start-Process certutil -ArgumentList '-delstore','Root','{domain}' -Verb RunAs -Wait"
    );
    let status = Command::new("powershell.exe")
        .args(["-NoProfile", "-Command", &script])
        .status()
        .context("failed to invoke powershell.exe")?;
    if !status.success() {
        warn!("certutil could not remove the certificate for {domain}");
        bail!("certutil -delstore failed for {domain}");
    }
    Ok(())
}
