use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::smt::{parse_check_response, SmtQuery};
use super::{CheckOutcome, SolverBackend, SolverError, SolverResult};

const GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Runs each query through a fresh `z3 -in -smt2` process.
#[derive(Debug, Clone)]
pub struct Z3Process {
    path: PathBuf,
}

impl Z3Process {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Checks that the binary runs. Returns its version line.
    pub async fn probe(&self) -> SolverResult<String> {
        let output = Command::new(&self.path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| SolverError::Unavailable(format!("failed to execute {:?}: {}", self.path, e)))?;
        if !output.status.success() {
            return Err(SolverError::Unavailable(format!(
                "{:?} --version exited with {}",
                self.path, output.status
            )));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Detected Z3 version: {}", version);
        Ok(version)
    }

    async fn run(&self, script: &str) -> SolverResult<(String, String)> {
        let mut child = Command::new(&self.path)
            .args(["-in", "-smt2"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SolverError::Unavailable(format!("failed to spawn {:?}: {}", self.path, e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SolverError::Internal("z3 stdin not captured".to_string()))?;
        stdin
            .write_all(script.as_bytes())
            .await
            .map_err(|e| SolverError::Internal(format!("failed to write query: {}", e)))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SolverError::Internal(format!("failed to read z3 output: {}", e)))?;
        Ok((
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        ))
    }
}

#[async_trait]
impl SolverBackend for Z3Process {
    fn name(&self) -> &'static str {
        "z3"
    }

    #[tracing::instrument(level = "debug", skip(self, query))]
    async fn check(&self, query: &SmtQuery) -> SolverResult<CheckOutcome> {
        let script = query.to_script();
        debug!("z3 script:\n{}", script);

        let (stdout, stderr) = tokio::time::timeout(query.timeout + GRACE_PERIOD, self.run(&script))
            .await
            .map_err(|_| SolverError::Timeout(query.timeout))??;

        if !stderr.trim().is_empty() {
            warn!("z3 stderr: {}", stderr.trim());
        }
        debug!("z3 stdout: {}", stdout);
        match parse_check_response(&stdout)? {
            // z3 answers `unknown` when its own :timeout fires
            CheckOutcome::Unknown(reason) => {
                warn!("z3 gave up: {}", reason);
                Err(SolverError::Timeout(query.timeout))
            }
            outcome => Ok(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let z3 = Z3Process::new("/nonexistent/z3-binary");
        assert!(matches!(z3.probe().await, Err(SolverError::Unavailable(_))));
        let query = SmtQuery {
            declarations: vec![],
            assertions: vec![],
            timeout: Duration::from_millis(100),
        };
        assert!(matches!(
            z3.check(&query).await,
            Err(SolverError::Unavailable(_))
        ));
    }
}
