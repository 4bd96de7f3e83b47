use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `Draftwise` - background analysis and feedback orchestration for writers.
#[derive(Parser, Debug)]
#[command(name = "draftwise")]
#[command(version = "0.1.0")]
#[command(about = "Schedules content analysis and paces feedback while you write.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Read configuration from this file instead of ~/.draftwise/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch a text file and run the assistant on every change until Ctrl-C
    Run {
        /// File to watch
        #[arg(short, long)]
        file: PathBuf,

        /// Document id reported with each edit (defaults to the file name)
        #[arg(long)]
        document: Option<String>,

        /// Quiet period after a file notification before the file is re-read, in milliseconds
        #[arg(long, default_value = "250")]
        debounce_ms: u64,
    },

    /// Print a JSON health snapshot of a freshly started assistant
    Health,

    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_requires_file() {
        assert!(Cli::try_parse_from(["draftwise", "run"]).is_err());

        let cli = Cli::try_parse_from(["draftwise", "-v", "run", "--file", "draft.md"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                file,
                document,
                debounce_ms,
            } => {
                assert_eq!(file, PathBuf::from("draft.md"));
                assert!(document.is_none());
                assert_eq!(debounce_ms, 250);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["draftwise", "health", "--config", "/tmp/d.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/d.toml")));
        assert!(matches!(cli.command, Commands::Health));
    }
}
