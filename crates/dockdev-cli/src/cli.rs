use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockdev")]
#[command(version)]
#[command(
    about = "Per-domain Docker development environments behind a shared reverse proxy",
    long_about = None
)]
pub struct Cli {
    /// Workspace root holding .env, templates/, domains/ and shared-services/
    #[arg(short = 'C', long = "root", global = true, default_value = ".")]
    pub root: PathBuf,

    /// Domain of the project to create (e.g. app.test)
    pub domain: Option<String>,

    /// Create the project without TLS
    #[arg(long)]
    pub no_ssl: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove an existing project
    #[command(alias = "remove")]
    Rm {
        /// Domain of the project to remove; omit to pick interactively
        domain: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,

        /// Print the cleanup report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_domain_parses_as_creation() {
        let cli = Cli::try_parse_from(["dockdev", "app.test"]).unwrap();
        assert_eq!(cli.domain.as_deref(), Some("app.test"));
        assert!(!cli.no_ssl);
        assert!(cli.command.is_none());
    }

    #[test]
    fn no_ssl_flag_is_accepted() {
        let cli = Cli::try_parse_from(["dockdev", "app.test", "--no-ssl"]).unwrap();
        assert!(cli.no_ssl);
    }

    #[test]
    fn rm_and_remove_both_parse() {
        for verb in ["rm", "remove"] {
            let cli = Cli::try_parse_from(["dockdev", verb, "app.test", "--yes"]).unwrap();
            match cli.command {
                Some(Commands::Rm { domain, yes, json }) => {
                    assert_eq!(domain.as_deref(), Some("app.test"));
                    assert!(yes);
                    assert!(!json);
                }
                _ => panic!("expected Commands::Rm"),
            }
        }
    }

    #[test]
    fn rm_without_domain_parses() {
        let cli = Cli::try_parse_from(["dockdev", "rm"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Rm { domain: None, .. })
        ));
    }

    #[test]
    fn root_flag_applies_everywhere() {
        // The documented order puts -C before the subcommand; trailing
        // must keep working too.
        for argv in [
            ["dockdev", "-C", "/srv/dev", "rm", "a.test"],
            ["dockdev", "rm", "a.test", "-C", "/srv/dev"],
        ] {
            let cli = Cli::try_parse_from(argv).unwrap();
            assert_eq!(cli.root, PathBuf::from("/srv/dev"));
            assert!(matches!(cli.command, Some(Commands::Rm { .. })));
        }

        let cli = Cli::try_parse_from(["dockdev", "-C", "/srv/dev", "app.test"]).unwrap();
        assert_eq!(cli.root, PathBuf::from("/srv/dev"));
        assert_eq!(cli.domain.as_deref(), Some("app.test"));
    }
}
