mod cli;
mod docker;
mod mysql;
mod prompt;
mod provision;
mod proxy;
mod remove;
mod style;
mod trust;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use dockdev_core::config::Layout;
use remove::{RemoveOptions, RemoveOutcome, StepStatus};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let layout = Layout::new(cli.root.clone());

    let code = match cli.command {
        Some(Commands::Rm { domain, yes, json }) => run_rm(&layout, domain, yes, json),
        None => match cli.domain {
            Some(domain) => run_create(&layout, &domain, !cli.no_ssl),
            None => run_menu(&layout),
        },
    };
    std::process::exit(code);
}

fn run_create(layout: &Layout, domain: &str, ssl: bool) -> i32 {
    match provision::run(layout, domain, ssl, prompt::is_terminal()) {
        Ok(created) => {
            println!("{} {} is ready: {}", style::ROCKET, created.domain, created.url);
            0
        }
        Err(e) => {
            eprintln!("{} {e:#}", style::CROSS);
            1
        }
    }
}

/// Removal always exits 0 once confirmed: a partial teardown is reported
/// step by step, never as a process failure.
fn run_rm(layout: &Layout, domain: Option<String>, yes: bool, json: bool) -> i32 {
    let domain = match domain {
        Some(domain) => domain,
        None => {
            if !prompt::is_terminal() {
                eprintln!("{} a domain is required outside a terminal", style::CROSS);
                return 1;
            }
            match prompt::select_project(layout) {
                Ok(Some(domain)) => domain,
                Ok(None) => {
                    println!("No projects to remove.");
                    return 0;
                }
                Err(e) => {
                    eprintln!("{} {e:#}", style::CROSS);
                    return 1;
                }
            }
        }
    };

    let opts = RemoveOptions {
        assume_yes: yes,
        json,
    };
    match remove::run(layout, &domain, &opts) {
        Ok(RemoveOutcome::Aborted) => {
            println!("Aborted.");
            0
        }
        Ok(RemoveOutcome::Done(report)) => {
            let warned = report
                .steps
                .iter()
                .filter(|step| step.status == StepStatus::Warned)
                .count();
            if warned > 0 {
                eprintln!("{} removal completed with {warned} warning(s)", style::WARN);
            }
            0
        }
        Err(e) => {
            eprintln!("{} {e:#}", style::CROSS);
            1
        }
    }
}

/// Bare invocation: a menu when attached to a terminal, usage otherwise.
fn run_menu(layout: &Layout) -> i32 {
    if !prompt::is_terminal() {
        let _ = Cli::command().print_help();
        return 1;
    }

    loop {
        match menu_round(layout) {
            Ok(true) => continue,
            Ok(false) => return 0,
            Err(e) => {
                eprintln!("{} {e:#}", style::CROSS);
            }
        }
    }
}

fn menu_round(layout: &Layout) -> anyhow::Result<bool> {
    match prompt::main_menu()? {
        prompt::MenuChoice::Create => {
            let domain = prompt::input_domain()?;
            let ssl = prompt::confirm("Enable TLS for this project?", true)?;
            match provision::run(layout, &domain, ssl, true) {
                Ok(created) => {
                    println!("{} {} is ready: {}", style::ROCKET, created.domain, created.url);
                }
                Err(e) => eprintln!("{} {e:#}", style::CROSS),
            }
            Ok(true)
        }
        prompt::MenuChoice::Delete => {
            match prompt::select_project(layout)? {
                Some(domain) => {
                    let opts = RemoveOptions {
                        assume_yes: false,
                        json: false,
                    };
                    if let remove::RemoveOutcome::Aborted = remove::run(layout, &domain, &opts)? {
                        println!("Aborted.");
                    }
                }
                None => println!("No projects to remove."),
            }
            Ok(true)
        }
        prompt::MenuChoice::Exit => Ok(false),
    }
}
