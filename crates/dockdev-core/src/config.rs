use crate::error::ProvisionError;
use anyhow::Result;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

/// Container name of the shared reverse proxy.
pub const REVERSE_PROXY_CONTAINER: &str = "nginx-reverse-proxy";
/// Container name of the shared database.
pub const SHARED_MYSQL_CONTAINER: &str = "shared_mysql";
/// Allocation key reserved for the shared database; always the first
/// line of the IP map.
pub const SHARED_MYSQL_KEY: &str = "shared-mysql";
/// File name of a rendered container manifest.
pub const COMPOSE_FILE: &str = "docker-compose.yml";
/// Per-project asset directories copied verbatim from the templates.
pub const PROJECT_ASSET_DIRS: &[&str] = &["image", "conf", "logs", "data"];

/// Everything the workflow reads from the environment, assembled once at
/// process start. No component reads ambient env after this point.
#[derive(Debug, Clone)]
pub struct Config {
    pub network_name: String,
    pub project_start_ip: Ipv4Addr,
    pub shared_mysql_ip: Option<Ipv4Addr>,
    pub reverse_proxy_ip: Option<Ipv4Addr>,
    pub mysql_root_password: String,
    pub mysql_user: String,
    pub mysql_password: String,
    pub hosts_path: PathBuf,
}

impl Config {
    /// Loads `.env` from the workspace root and overlays the process
    /// environment on top of it (process env wins, matching how services
    /// resolve their env layers).
    ///
    /// # Errors
    ///
    /// `ConfigMissing` when `.env` is absent or a required key has no
    /// value in either source.
    pub fn load(root: &Path) -> Result<Self> {
        let env_path = root.join(".env");
        if !env_path.exists() {
            return Err(ProvisionError::ConfigMissing {
                key: env_path.display().to_string(),
            }
            .into());
        }

        let mut vars: HashMap<String, String> = HashMap::new();
        if let Ok(iter) = dotenvy::from_path_iter(&env_path) {
            for (key, value) in iter.flatten() {
                vars.insert(key, value);
            }
        }
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }

        let required = |key: &str| -> Result<String> {
            match vars.get(key) {
                Some(v) if !v.is_empty() => Ok(v.clone()),
                _ => Err(ProvisionError::ConfigMissing {
                    key: key.to_string(),
                }
                .into()),
            }
        };
        let addr = |key: &str, value: &str| -> Result<Ipv4Addr> {
            value.parse().map_err(|_| {
                ProvisionError::ConfigMissing {
                    key: format!("{key} (not a valid IPv4 address: {value})"),
                }
                .into()
            })
        };

        let start = required("PROJECT_START_IP")?;
        let shared_mysql_ip = match vars.get("SHARED_MYSQL_IP") {
            Some(v) if !v.is_empty() => Some(addr("SHARED_MYSQL_IP", v)?),
            _ => None,
        };
        let reverse_proxy_ip = match vars.get("REVERSE_PROXY_IP") {
            Some(v) if !v.is_empty() => Some(addr("REVERSE_PROXY_IP", v)?),
            _ => None,
        };
        let hosts_path = vars
            .get("HOSTS_FILE")
            .map_or_else(default_hosts_path, PathBuf::from);

        Ok(Self {
            network_name: required("NETWORK_NAME")?,
            project_start_ip: addr("PROJECT_START_IP", &start)?,
            shared_mysql_ip,
            reverse_proxy_ip,
            mysql_root_password: required("MYSQL_ROOT_PASSWORD")?,
            mysql_user: required("MYSQL_USER")?,
            mysql_password: required("MYSQL_PASSWORD")?,
            hosts_path,
        })
    }
}

/// Under WSL the name resolution that matters is the Windows hosts file;
/// everywhere else it is /etc/hosts.
#[must_use]
pub fn default_hosts_path() -> PathBuf {
    let windows_hosts = Path::new("/mnt/c/Windows/System32/drivers/etc/hosts");
    if windows_hosts.exists() {
        windows_hosts.to_path_buf()
    } else {
        PathBuf::from("/etc/hosts")
    }
}

/// On-disk layout of one dockdev workspace. All paths derive from the
/// root selected with `-C/--root`; nothing is relative to the process cwd.
#[derive(Debug, Clone)]
pub struct Layout {
    pub root: PathBuf,
}

impl Layout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn ipmap_path(&self) -> PathBuf {
        self.root.join(".ipmap.env")
    }

    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".dockdev.lock")
    }

    #[must_use]
    pub fn template_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    #[must_use]
    pub fn domains_dir(&self) -> PathBuf {
        self.root.join("domains")
    }

    #[must_use]
    pub fn project_dir(&self, domain: &str) -> PathBuf {
        self.domains_dir().join(domain)
    }

    #[must_use]
    pub fn shared_dir(&self) -> PathBuf {
        self.root.join("shared-services")
    }

    #[must_use]
    pub fn certs_dir(&self) -> PathBuf {
        self.shared_dir().join("certs")
    }

    #[must_use]
    pub fn sites_dir(&self) -> PathBuf {
        self.shared_dir().join("sites")
    }

    #[must_use]
    pub fn site_conf(&self, domain: &str) -> PathBuf {
        self.sites_dir().join(format!("{domain}.conf"))
    }
}

/// The text before the first `.` of a domain, used as the project prefix.
#[must_use]
pub fn domain_prefix(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}
