//! Placeholder rendering for the fixed set of project templates.
//!
//! Templates are data, not logic: rendering substitutes `{{field}}` and
//! `{{ip.KEY}}` references from a context and fails fast on anything
//! undefined rather than silently emitting empty content.

use anyhow::{Context as _, Result};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

/// Per-project data context.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub domain: String,
    pub prefix: String,
    pub network: String,
    pub ssl: bool,
    pub ips: BTreeMap<String, Ipv4Addr>,
}

/// Data context for the shared-services manifest.
#[derive(Debug, Clone)]
pub struct SharedContext {
    pub network: String,
    pub reverse_proxy_ip: Option<Ipv4Addr>,
    pub shared_mysql_ip: Option<Ipv4Addr>,
    pub mysql_root_password: String,
    pub mysql_user: String,
    pub mysql_password: String,
}

/// A value source for template fields.
pub trait RenderContext {
    /// Resolves a field reference; `key` is the part after the dot for
    /// `ip.KEY` style references, empty otherwise.
    fn lookup(&self, field: &str, key: &str) -> Option<String>;
}

impl RenderContext for ProjectContext {
    fn lookup(&self, field: &str, key: &str) -> Option<String> {
        match field {
            "domain" => Some(self.domain.clone()),
            "prefix" => Some(self.prefix.clone()),
            "network" => Some(self.network.clone()),
            "ssl" => Some(self.ssl.to_string()),
            "ip" => self.ips.get(key).map(Ipv4Addr::to_string),
            _ => None,
        }
    }
}

impl RenderContext for SharedContext {
    fn lookup(&self, field: &str, _key: &str) -> Option<String> {
        match field {
            "network" => Some(self.network.clone()),
            // Unconfigured optional addresses render empty rather than
            // failing the whole shared manifest.
            "reverse_proxy_ip" => Some(
                self.reverse_proxy_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_default(),
            ),
            "shared_mysql_ip" => Some(
                self.shared_mysql_ip
                    .map(|ip| ip.to_string())
                    .unwrap_or_default(),
            ),
            "mysql_root_password" => Some(self.mysql_root_password.clone()),
            "mysql_user" => Some(self.mysql_user.clone()),
            "mysql_password" => Some(self.mysql_password.clone()),
            _ => None,
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)(?:\.([A-Za-z0-9_-]+))?\s*\}\}").unwrap()
    })
}

/// Renders a template source against a context.
///
/// # Errors
///
/// Any placeholder the context cannot resolve is a hard error naming the
/// reference.
pub fn render_str(source: &str, ctx: &dyn RenderContext) -> Result<String> {
    let mut undefined: Option<String> = None;
    let rendered = placeholder_regex().replace_all(source, |caps: &Captures<'_>| {
        let field = &caps[1];
        let key = caps.get(2).map_or("", |m| m.as_str());
        match ctx.lookup(field, key) {
            Some(value) => value,
            None => {
                if undefined.is_none() {
                    undefined = Some(if key.is_empty() {
                        field.to_string()
                    } else {
                        format!("{field}.{key}")
                    });
                }
                String::new()
            }
        }
    });

    if let Some(reference) = undefined {
        anyhow::bail!("template references undefined field: {reference}");
    }
    Ok(rendered.into_owned())
}

/// Renders the template at `src` and writes the result to `dest`,
/// creating parent directories as needed.
///
/// # Errors
///
/// A missing template source is a hard error.
pub fn render_to_file(src: &Path, dest: &Path, ctx: &dyn RenderContext) -> Result<()> {
    let source = std::fs::read_to_string(src)
        .with_context(|| format!("missing template: {}", src.display()))?;
    let rendered = render_str(&source, ctx)?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(dest, rendered)
        .with_context(|| format!("failed to write {}", dest.display()))
}
