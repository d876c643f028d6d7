//! Interactive prompts. Everything here assumes a terminal; callers check
//! `is_terminal` before reaching for these.

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use dockdev_core::config::{COMPOSE_FILE, Layout};
use std::io::IsTerminal;

#[must_use]
pub fn is_terminal() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

pub fn confirm(message: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(message)
        .default(default)
        .interact()
        .context("confirmation prompt failed")
}

pub fn input_domain() -> Result<String> {
    let domain: String = Input::new()
        .with_prompt("Domain for the new project (e.g. app.test)")
        .validate_with(|value: &String| {
            if value.trim().is_empty() {
                Err("a domain is required")
            } else if value.contains(char::is_whitespace) {
                Err("a domain cannot contain whitespace")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("domain prompt failed")?;
    Ok(domain.trim().to_string())
}

/// Domains with a rendered manifest under `domains/`, sorted.
pub fn list_projects(layout: &Layout) -> Result<Vec<String>> {
    let dir = layout.domains_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut projects = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        if entry.path().join(COMPOSE_FILE).exists() {
            projects.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    projects.sort();
    Ok(projects)
}

/// Lets the user pick an existing project; `None` when there are none.
pub fn select_project(layout: &Layout) -> Result<Option<String>> {
    let projects = list_projects(layout)?;
    if projects.is_empty() {
        return Ok(None);
    }
    let index = Select::new()
        .with_prompt("Which project?")
        .items(&projects)
        .default(0)
        .interact()
        .context("project selection failed")?;
    Ok(Some(projects[index].clone()))
}

pub enum MenuChoice {
    Create,
    Delete,
    Exit,
}

pub fn main_menu() -> Result<MenuChoice> {
    let index = Select::new()
        .with_prompt("What would you like to do?")
        .items(&["Create a project", "Delete a project", "Exit"])
        .default(0)
        .interact()
        .context("menu selection failed")?;
    Ok(match index {
        0 => MenuChoice::Create,
        1 => MenuChoice::Delete,
        _ => MenuChoice::Exit,
    })
}
