//! Name-resolution file read-modify-write.
//!
//! Matching is by exact whitespace-separated token, never by substring:
//! removing `app.test` must not touch `app.test2`.

use anyhow::{Context, Result};
use std::path::Path;

/// The address every project resolves to.
const LOOPBACK: &str = "127.0.0.1";

fn line_has_domain(line: &str, domain: &str) -> bool {
    let body = line.split('#').next().unwrap_or("");
    body.split_whitespace().any(|token| token == domain)
}

/// Appends a `127.0.0.1 <domain>` line unless an entry for the domain is
/// already present. A second insertion attempt leaves the file
/// byte-identical. Returns true when a line was added.
pub fn ensure_entry(path: &Path, domain: &str) -> Result<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    if content.lines().any(|line| line_has_domain(line, domain)) {
        return Ok(false);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!("{LOOPBACK} {domain}\n"));
    std::fs::write(path, updated).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}

/// Removes every line whose host tokens contain the domain exactly,
/// preserving all other lines verbatim. Returns true when anything was
/// removed.
pub fn remove_entry(path: &Path, domain: &str) -> Result<bool> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let kept: Vec<&str> = content
        .lines()
        .filter(|line| !line_has_domain(line, domain))
        .collect();
    let removed = kept.len() != content.lines().count();

    if removed {
        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(path, out)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(removed)
}
