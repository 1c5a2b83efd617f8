use crate::error::CommonError;
use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tracing::{error, info, warn};

/// Spawns `process` with `extra_env` layered over the inherited environment and
/// waits for it to exit. On Ctrl-C the child is killed and reaped.
pub async fn run_child_process(
    process_name: &str,
    mut process: Command,
    extra_env: BTreeMap<String, String>,
) -> Result<ExitStatus, CommonError> {
    let process = process
        .envs(extra_env)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = process
        .spawn()
        .map_err(|e| anyhow::anyhow!("{process_name} process error: {e}"))?;

    info!("Started {} (pid={:?})", process_name, child.id());

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| {
                CommonError::Unknown(anyhow::anyhow!("{process_name} wait error: {e}"))
            })?;
            if status.success() {
                info!("{} exited cleanly: {:?}", process_name, status);
            } else {
                error!("{} exited with status: {:?}", process_name, status);
            }
            Ok(status)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping {}", process_name);
            child.kill().await?;
            let status = child.wait().await?;
            Ok(status)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn child_sees_extra_env() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("test \"$ENVHUB_TEST_VAR\" = expected");
        let env = BTreeMap::from([("ENVHUB_TEST_VAR".to_string(), "expected".to_string())]);

        let status = run_child_process("sh", cmd, env).await.unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn reports_non_zero_exit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");

        let status = run_child_process("sh", cmd, BTreeMap::new()).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
