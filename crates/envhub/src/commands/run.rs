use std::process::ExitStatus;

use clap::Args;
use envhub_client::config::DEFAULT_BASE_URL;
use shared::command::run_child_process;
use shared::error::CommonError;
use tokio::process::Command;
use tracing::info;

use crate::commands::{client_error, environment::build_client};

#[derive(Args, Debug, Clone)]
pub struct RunParams {
    /// Environment whose values are passed to the command
    #[arg(long = "env", short = 'e')]
    pub environment: String,

    #[arg(long, env = "ENVHUB_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    #[arg(long, env = "ENVHUB_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    /// Command to run, followed by its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Conventional shell exit code for a finished child.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

/// Runs the command with the environment's values layered over the inherited
/// environment and returns its exit code. The envhub process itself is not modified.
pub async fn cmd_run(params: RunParams) -> Result<i32, CommonError> {
    let client = build_client(&params.api_url, params.timeout_secs)?;
    let variables = client
        .resolve(&params.environment)
        .await
        .map_err(client_error)?;

    let Some((program, args)) = params.command.split_first() else {
        return Err(CommonError::invalid_request("no command given"));
    };

    info!(
        environment = %params.environment,
        count = variables.len(),
        "Running {} with environment",
        program
    );

    let mut command = Command::new(program);
    command.args(args);

    let status = run_child_process(program, command, variables).await?;
    Ok(exit_code(status))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exit_code_passthrough() {
        let status = Command::new("sh")
            .arg("-c")
            .arg("exit 7")
            .status()
            .await
            .unwrap();
        assert_eq!(exit_code(status), 7);

        let status = Command::new("sh")
            .arg("-c")
            .arg("kill -TERM $$")
            .status()
            .await
            .unwrap();
        assert_eq!(exit_code(status), 128 + 15);
    }
}
