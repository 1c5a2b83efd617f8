use std::error::Error;

use clap::{Parser, Subcommand};
use shared::error::CommonError;

use crate::commands::{
    self, environment::EnvironmentParams, run::RunParams, start::StartParams,
};

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "envhub", about = "Store named environments and inject them into processes")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the envhub API server
    Start(StartParams),
    /// Manage environments on a running server
    #[command(name = "env")]
    Environment(EnvironmentParams),
    /// Run a command with an environment's values added to its environment
    Run(RunParams),
    /// Show envhub version
    Version,
}

fn log_error_chain(err: &(dyn Error)) {
    let mut current: Option<&(dyn Error)> = err.source();

    while let Some(e) = current {
        eprintln!("Caused by: {e}");
        current = e.source();
    }
}

fn handle_error(err: &CommonError) -> ! {
    eprintln!("Error: {err}");
    let detail = err.detail();
    if !detail.is_empty() && detail != err.to_string() {
        eprintln!("  {detail}");
    }
    log_error_chain(err);
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let cmd_res = match cli.command {
        Commands::Start(params) => commands::start::cmd_start(params).await,
        Commands::Environment(params) => commands::environment::cmd_environment(params).await,
        Commands::Run(params) => match commands::run::cmd_run(params).await {
            Ok(0) => Ok(()),
            Ok(code) => ::std::process::exit(code),
            Err(e) => Err(e),
        },
        Commands::Version => {
            println!("envhub version: {CLI_VERSION}");
            Ok(())
        }
    };

    if let Err(e) = cmd_res {
        handle_error(&e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::environment::EnvironmentCommands;

    #[test]
    fn test_parses_start_flags() {
        let cli = Cli::try_parse_from([
            "envhub",
            "start",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--base-path",
            "/",
            "--db-conn-string",
            "libsql://./tmp/test.db?mode=local",
        ])
        .unwrap();

        match cli.command {
            Commands::Start(params) => {
                assert_eq!(params.host, "127.0.0.1");
                assert_eq!(params.port, 9000);
                assert_eq!(params.base_path, "/");
                assert_eq!(params.db_conn_string.scheme(), "libsql");
            }
            _ => panic!("expected start command"),
        }
    }

    #[test]
    fn test_parses_env_create_with_pairs() {
        let cli = Cli::try_parse_from([
            "envhub",
            "env",
            "--api-url",
            "http://localhost:1234/api/v1",
            "create",
            "ci",
            "TOKEN=abc",
            "URL=http://x?a=b",
        ])
        .unwrap();

        match cli.command {
            Commands::Environment(params) => {
                assert_eq!(params.api_url, "http://localhost:1234/api/v1");
                match params.command {
                    EnvironmentCommands::Create { name, values } => {
                        assert_eq!(name, "ci");
                        assert_eq!(values.len(), 2);
                        assert_eq!(values[1].key, "URL");
                        assert_eq!(values[1].value, "http://x?a=b");
                    }
                    _ => panic!("expected create"),
                }
            }
            _ => panic!("expected env command"),
        }
    }

    #[test]
    fn test_rejects_pair_without_equals() {
        let res = Cli::try_parse_from(["envhub", "env", "set", "ci", "NOPE"]);
        assert!(res.is_err());
    }

    #[test]
    fn test_parses_run_trailing_command() {
        let cli = Cli::try_parse_from([
            "envhub", "run", "--env", "dev", "--", "printenv", "-0", "TOKEN",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(params) => {
                assert_eq!(params.environment, "dev");
                assert_eq!(params.command, vec!["printenv", "-0", "TOKEN"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_run_requires_a_command() {
        assert!(Cli::try_parse_from(["envhub", "run", "--env", "dev"]).is_err());
    }
}
