use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::Result;
use crate::util::truncate_str;

/// Injectable subprocess port.
///
/// `Err` means the process could not be run at all (missing binary,
/// spawn failure). A non-zero exit status is NOT an error at this
/// layer; callers inspect `Output::status` and apply their own
/// degradation policy.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
}

/// Runs commands against the real system, anchored to a working
/// directory.
pub struct SystemRunner {
    working_dir: PathBuf,
}

impl SystemRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        debug!(program, args = ?args, dir = %self.working_dir.display(), "Running command");

        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                program,
                status = ?output.status.code(),
                stderr = %truncate_str(stderr.trim(), 200),
                "Command exited non-zero"
            );
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = SystemRunner::new(std::env::temp_dir());
        let output = runner.run("echo", &["hello"]).await.unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn test_missing_binary_is_err() {
        let runner = SystemRunner::new(std::env::temp_dir());
        let result = runner.run("definitely-not-a-real-binary-xyz", &[]).await;
        assert!(result.is_err());
    }
}
