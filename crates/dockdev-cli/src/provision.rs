//! The create workflow: allocate addresses, issue certificates, render
//! the project from its templates, and bring everything up behind the
//! shared reverse proxy.

use crate::style;
use crate::{docker, mysql, proxy, trust};
use anyhow::{Context, Result};
use dockdev_core::config::{
    Config, Layout, COMPOSE_FILE, PROJECT_ASSET_DIRS, SHARED_MYSQL_KEY,
};
use dockdev_core::error::ProvisionError;
use dockdev_core::lock::WorkflowLock;
use dockdev_core::template::{ProjectContext, SharedContext};
use dockdev_core::{cert, config, fsutil, hosts, ipmap, template};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a successful creation hands back to the caller.
pub struct Created {
    pub domain: String,
    pub url: String,
}

/// Creates the environment for `domain`. Fails without touching the IP
/// map when the project already exists; a failure after allocation leaves
/// the allocated entries in place (they belong to the half-created
/// project until `rm` cleans them up).
pub fn run(layout: &Layout, domain: &str, ssl: bool, interactive: bool) -> Result<Created> {
    docker::ensure_running(interactive)?;
    let config = Config::load(&layout.root)?;

    let project_dir = layout.project_dir(domain);
    if project_dir.exists() {
        return Err(ProvisionError::AlreadyExists {
            path: project_dir.clone(),
        }
        .into());
    }

    println!("{} Creating {domain}...", style::ROCKET);
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("failed to create {}", project_dir.display()))?;

    let ips = allocate_addresses(layout, &config, domain)?;
    println!(
        "{} Allocated {} address(es) in {}",
        style::CHECK,
        ips.len(),
        config.network_name
    );

    if ssl {
        provision_certificates(layout, domain, &project_dir)?;
        println!("{} TLS certificate ready", style::CHECK);
    }

    let ctx = ProjectContext {
        domain: domain.to_string(),
        prefix: config::domain_prefix(domain).to_string(),
        network: config.network_name.clone(),
        ssl,
        ips,
    };
    render_project(layout, &project_dir, &ctx)?;
    render_shared(layout, &config)?;
    render_site_conf(layout, domain, ssl, &ctx)?;
    println!("{} Project files rendered", style::CHECK);

    start_services(layout, &config, &project_dir)?;
    println!("{} Containers are up", style::CHECK);

    proxy::reload_or_restart()?;

    if hosts::ensure_entry(&config.hosts_path, domain)? {
        println!("{} Added {domain} to {}", style::CHECK, config.hosts_path.display());
    } else {
        debug!("hosts entry for {domain} already present");
    }

    let url = site_url(layout, domain);
    info!(domain, %url, "project created");
    Ok(Created {
        domain: domain.to_string(),
        url,
    })
}

/// Allocates one address per `{{ip.KEY}}` reference in the project
/// manifest template, persisting each entry as it is chosen. The whole
/// read-allocate-append sequence runs under the workspace lock.
fn allocate_addresses(
    layout: &Layout,
    config: &Config,
    domain: &str,
) -> Result<BTreeMap<String, Ipv4Addr>> {
    let manifest_template = layout.template_dir().join(format!("{COMPOSE_FILE}.tmpl"));
    let source = std::fs::read_to_string(&manifest_template)
        .with_context(|| format!("missing template: {}", manifest_template.display()))?;
    let keys = ipmap::extract_ip_keys(&source);

    let ipmap_path = layout.ipmap_path();
    let _lock = WorkflowLock::acquire(&layout.lock_path())?;

    if let Some(mysql_ip) = config.shared_mysql_ip {
        ipmap::insert_at_top(&ipmap_path, SHARED_MYSQL_KEY, mysql_ip)?;
    }

    let mut used = ipmap::load_used(&ipmap_path)?;
    let mut ips = BTreeMap::new();
    for key in keys {
        let addr = ipmap::find_next_free(config.project_start_ip, &used)?;
        used.insert(addr);
        ipmap::append(&ipmap_path, &ipmap::entry_key(domain, &key), addr)?;
        debug!(%addr, key, "allocated");
        ips.insert(key, addr);
    }
    Ok(ips)
}

/// Ensures the root CA exists (offering it to the host trust store the
/// first time), issues the domain certificate, and copies the pair into
/// the project's ssl directory under the fixed names its containers mount.
fn provision_certificates(layout: &Layout, domain: &str, project_dir: &Path) -> Result<()> {
    let certs_dir = layout.certs_dir();
    if cert::ensure_root_ca(&certs_dir)? {
        println!("{} Generated a new root CA", style::CHECK);
        let ca_path = cert::root_ca_cert_path(&certs_dir);
        if let Err(e) = trust::install_root_ca(&ca_path) {
            warn!("root CA trust installation failed: {e:#}");
            println!(
                "{} Could not install the root CA into the host trust store; \
                 browsers will warn until you trust {} yourself",
                style::WARN,
                ca_path.display()
            );
        }
    }

    let issued = cert::issue_domain_cert(domain, &certs_dir)?;
    let ssl_dir = project_dir.join("ssl");
    std::fs::create_dir_all(&ssl_dir)?;
    std::fs::copy(&issued.cert_path, ssl_dir.join("server.crt"))?;
    std::fs::copy(&issued.key_path, ssl_dir.join("server.key"))?;
    Ok(())
}

/// Renders the project manifest and nginx config and copies the static
/// asset directories from the template tree.
fn render_project(layout: &Layout, project_dir: &Path, ctx: &ProjectContext) -> Result<()> {
    let templates = layout.template_dir();
    template::render_to_file(
        &templates.join(format!("{COMPOSE_FILE}.tmpl")),
        &project_dir.join(COMPOSE_FILE),
        ctx,
    )?;
    template::render_to_file(
        &templates.join("nginx.conf.tmpl"),
        &project_dir.join("conf/nginx/default.conf"),
        ctx,
    )?;
    template::render_to_file(
        &templates.join("app/index.html.tmpl"),
        &project_dir.join("app/index.html"),
        ctx,
    )?;

    for asset in PROJECT_ASSET_DIRS {
        let src = templates.join(asset);
        if src.is_dir() {
            fsutil::copy_dir(&src, &project_dir.join(asset))?;
        } else {
            std::fs::create_dir_all(project_dir.join(asset))?;
        }
    }
    Ok(())
}

/// Materializes the shared-services tree. The manifest is rendered once
/// and then left alone (it may carry operator edits); the proxy config is
/// re-rendered every run so it always matches the current template.
fn render_shared(layout: &Layout, config: &Config) -> Result<()> {
    let templates = layout.template_dir().join("shared-services");
    let shared_dir = layout.shared_dir();
    std::fs::create_dir_all(layout.sites_dir())?;

    let shared_ctx = SharedContext {
        network: config.network_name.clone(),
        reverse_proxy_ip: config.reverse_proxy_ip,
        shared_mysql_ip: config.shared_mysql_ip,
        mysql_root_password: config.mysql_root_password.clone(),
        mysql_user: config.mysql_user.clone(),
        mysql_password: config.mysql_password.clone(),
    };

    let shared_manifest = shared_dir.join(COMPOSE_FILE);
    if !shared_manifest.exists() {
        template::render_to_file(
            &templates.join(format!("{COMPOSE_FILE}.tmpl")),
            &shared_manifest,
            &shared_ctx,
        )?;
    }
    template::render_to_file(
        &templates.join("nginx.conf.tmpl"),
        &shared_dir.join("nginx.conf"),
        &shared_ctx,
    )?;

    let shared_image = templates.join("image");
    if shared_image.is_dir() {
        fsutil::copy_dir(&shared_image, &shared_dir.join("image"))?;
    }
    Ok(())
}

/// Writes the per-domain proxy site config, choosing the TLS or plain
/// variant. An existing file is preserved so operator edits survive.
fn render_site_conf(layout: &Layout, domain: &str, ssl: bool, ctx: &ProjectContext) -> Result<()> {
    let site_conf = layout.site_conf(domain);
    if site_conf.exists() {
        debug!("site config for {domain} already present, keeping it");
        return Ok(());
    }
    let name = if ssl { "site-ssl.conf.tmpl" } else { "site.conf.tmpl" };
    template::render_to_file(&layout.template_dir().join(name), &site_conf, ctx)
}

fn start_services(layout: &Layout, config: &Config, project_dir: &Path) -> Result<()> {
    docker::compose_up(&layout.shared_dir())?;
    if config.shared_mysql_ip.is_some() {
        mysql::wait_ready(&config.mysql_root_password)?;
        mysql::grant_privileges(&config.mysql_root_password, &config.mysql_user)?;
    }
    docker::compose_up(project_dir)
}

/// The URL to open: https when the site config terminates TLS.
fn site_url(layout: &Layout, domain: &str) -> String {
    let tls = std::fs::read_to_string(layout.site_conf(domain))
        .map(|conf| conf.contains("listen 443") || conf.contains(" ssl"))
        .unwrap_or(false);
    let scheme = if tls { "https" } else { "http" };
    format!("{scheme}://{domain}")
}
