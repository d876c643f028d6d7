//! Persistent IP allocation over a flat `key=address` file.
//!
//! The file is append-only in normal operation; entries are pruned only
//! when a project is deleted. One key (the shared database) is kept as
//! the first line so operators always see it at the top.

use crate::error::ProvisionError;
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::OnceLock;

/// Host numbers that are never handed out: network identifier, gateway,
/// and the two broadcast-adjacent values. The scan bound already excludes
/// 254/255; the check still guards them.
const RESERVED_HOSTS: [u8; 4] = [0, 1, 254, 255];

/// Parses the persisted map into the set of used addresses. A missing
/// file yields an empty set, not an error.
///
/// # Errors
///
/// Returns an error only when the file exists but cannot be read.
pub fn load_used(path: &Path) -> Result<BTreeSet<Ipv4Addr>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let mut used = BTreeSet::new();
    for line in content.lines() {
        if let Some((_, value)) = line.split_once('=') {
            if let Ok(addr) = value.trim().parse::<Ipv4Addr>() {
                used.insert(addr);
            }
        }
    }
    Ok(used)
}

/// Returns the first free address in the /24 of `base`, scanning host
/// numbers upward from `max(2, base host)` through 253.
///
/// # Errors
///
/// `NoCapacity` when the scan exhausts the range.
pub fn find_next_free(base: Ipv4Addr, used: &BTreeSet<Ipv4Addr>) -> Result<Ipv4Addr> {
    let [a, b, c, start] = base.octets();
    let start = start.max(2);

    for host in start..=253 {
        if RESERVED_HOSTS.contains(&host) {
            continue;
        }
        let candidate = Ipv4Addr::new(a, b, c, host);
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(ProvisionError::NoCapacity {
        subnet: format!("{a}.{b}.{c}"),
    }
    .into())
}

/// Appends one `key=address` line, creating the file on first use.
pub fn append(path: &Path, key: &str, addr: Ipv4Addr) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{key}={addr}")?;
    Ok(())
}

/// Inserts `key=address` as the first line, removing any prior entry for
/// the same key. Used exactly once per workspace, for the shared-database
/// key, so that entry is always on top.
pub fn insert_at_top(path: &Path, key: &str, addr: Ipv4Addr) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let mut lines = vec![format!("{key}={addr}")];
    let own_prefix = format!("{key}=");
    lines.extend(
        content
            .lines()
            .filter(|line| !line.starts_with(&own_prefix) && !line.trim().is_empty())
            .map(str::to_string),
    );

    std::fs::write(path, lines.join("\n") + "\n")
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Removes every entry belonging to `domain`: keys equal to the domain
/// or prefixed `domain_`. All other lines are preserved verbatim,
/// including their order. Returns the number of lines removed.
pub fn prune(path: &Path, domain: &str) -> Result<usize> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let exact = format!("{domain}=");
    let prefixed = format!("{domain}_");
    let mut kept = Vec::new();
    let mut removed = 0usize;
    for line in content.lines() {
        if line.starts_with(&exact) || line.starts_with(&prefixed) {
            removed += 1;
        } else {
            kept.push(line);
        }
    }

    if removed > 0 {
        let mut out = kept.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        std::fs::write(path, out).with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(removed)
}

/// The IP-map entry key for one service of a project: the bare domain for
/// the `main` service, `domain_<key>` for every other service.
#[must_use]
pub fn entry_key(domain: &str, service: &str) -> String {
    if service == "main" {
        domain.to_string()
    } else {
        format!("{domain}_{service}")
    }
}

fn ip_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*ip\.([A-Za-z0-9_-]+)\s*\}\}").unwrap())
}

/// Extracts the distinct set of `{{ip.KEY}}` references from a template
/// source, lexicographically sorted. This order is the allocation order,
/// so it decides which address each service receives when addresses are
/// scarce; it must stay deterministic.
#[must_use]
pub fn extract_ip_keys(template_source: &str) -> Vec<String> {
    let set: BTreeSet<String> = ip_key_regex()
        .captures_iter(template_source)
        .map(|c| c[1].to_string())
        .collect();
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn base() -> Ipv4Addr {
        Ipv4Addr::new(10, 10, 0, 2)
    }

    #[test]
    fn load_used_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let used = load_used(&tmp.path().join(".ipmap.env")).unwrap();
        assert!(used.is_empty());
    }

    #[test]
    fn load_used_counts_distinct_addresses_regardless_of_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".ipmap.env");
        std::fs::write(
            &path,
            "\nb=10.10.0.3\n\na=10.10.0.2\nnot a mapping\nc=10.10.0.4\n\n",
        )
        .unwrap();
        assert_eq!(load_used(&path).unwrap().len(), 3);
    }

    #[test]
    fn find_next_free_skips_used_and_reserved() {
        let mut used = BTreeSet::new();
        used.insert(Ipv4Addr::new(10, 10, 0, 2));
        used.insert(Ipv4Addr::new(10, 10, 0, 3));
        assert_eq!(
            find_next_free(base(), &used).unwrap(),
            Ipv4Addr::new(10, 10, 0, 4)
        );
    }

    #[test]
    fn find_next_free_starts_at_two_even_below() {
        let used = BTreeSet::new();
        assert_eq!(
            find_next_free(Ipv4Addr::new(10, 10, 0, 0), &used).unwrap(),
            Ipv4Addr::new(10, 10, 0, 2)
        );
    }

    #[test]
    fn exhausting_the_range_yields_no_capacity() {
        let mut used = BTreeSet::new();
        let mut allocated = 0;
        loop {
            match find_next_free(base(), &used) {
                Ok(addr) => {
                    assert!(used.insert(addr));
                    assert!(!RESERVED_HOSTS.contains(&addr.octets()[3]));
                    allocated += 1;
                }
                Err(e) => {
                    assert!(matches!(
                        e.downcast_ref::<crate::error::ProvisionError>(),
                        Some(crate::error::ProvisionError::NoCapacity { .. })
                    ));
                    break;
                }
            }
        }
        // 2..=253 inclusive
        assert_eq!(allocated, 252);
    }

    #[test]
    fn first_allocations_from_empty_map_are_sequential() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".ipmap.env");
        let mut used = load_used(&path).unwrap();

        let mut got = Vec::new();
        for key in ["cache", "db", "main", "web"] {
            let ip = find_next_free(base(), &used).unwrap();
            used.insert(ip);
            append(&path, &entry_key("app.test", key), ip).unwrap();
            got.push(ip.to_string());
        }
        assert_eq!(got, ["10.10.0.2", "10.10.0.3", "10.10.0.4", "10.10.0.5"]);
        assert_eq!(load_used(&path).unwrap().len(), 4);
    }

    #[test]
    fn insert_at_top_dedupes_and_stays_first() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".ipmap.env");
        append(&path, "app.test", Ipv4Addr::new(10, 10, 0, 5)).unwrap();
        insert_at_top(&path, "shared-mysql", Ipv4Addr::new(10, 10, 0, 100)).unwrap();
        insert_at_top(&path, "shared-mysql", Ipv4Addr::new(10, 10, 0, 101)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            ["shared-mysql=10.10.0.101", "app.test=10.10.0.5"]
        );
    }

    #[test]
    fn prune_removes_exactly_the_domain_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(".ipmap.env");
        std::fs::write(
            &path,
            "shared-mysql=10.10.0.100\n\
             other.test=10.10.0.9\n\
             app.test=10.10.0.5\n\
             app.test_cache=10.10.0.6\n\
             app.test2=10.10.0.7\n",
        )
        .unwrap();

        assert_eq!(prune(&path, "app.test").unwrap(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "shared-mysql=10.10.0.100\nother.test=10.10.0.9\napp.test2=10.10.0.7\n"
        );
    }

    #[test]
    fn extract_ip_keys_is_sorted_and_distinct() {
        let src = r#"
            web: {{ ip.worker }}
            again: {{ip.main}}
            cache: {{ ip.cache }}
            dup: {{ ip.main }}
        "#;
        assert_eq!(extract_ip_keys(src), ["cache", "main", "worker"]);
        assert_eq!(extract_ip_keys(src), extract_ip_keys(src));
    }

    #[test]
    fn entry_key_main_is_bare_domain() {
        assert_eq!(entry_key("app.test", "main"), "app.test");
        assert_eq!(entry_key("app.test", "cache"), "app.test_cache");
    }

    proptest! {
        #[test]
        fn allocation_never_returns_used_or_reserved(
            hosts in proptest::collection::btree_set(2u8..=253, 0..200),
            start in 0u8..=2,
        ) {
            let used: BTreeSet<Ipv4Addr> = hosts
                .into_iter()
                .map(|h| Ipv4Addr::new(10, 10, 0, h))
                .collect();
            let base = Ipv4Addr::new(10, 10, 0, start);

            if used.len() < 252 {
                let got = find_next_free(base, &used).unwrap();
                prop_assert!(!used.contains(&got));
                prop_assert!(!RESERVED_HOSTS.contains(&got.octets()[3]));
                prop_assert!(got.octets()[3] >= 2);
            }
        }

        #[test]
        fn extraction_is_deterministic(keys in proptest::collection::vec("[a-z]{1,8}", 0..10)) {
            let src: String = keys
                .iter()
                .map(|k| format!("{{{{ ip.{k} }}}}\n"))
                .collect();
            let first = extract_ip_keys(&src);
            let second = extract_ip_keys(&src);
            prop_assert_eq!(&first, &second);
            let mut sorted = first.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(first, sorted);
        }
    }
}
