use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::Publisher;

pub const DEFAULT_BRANCH: &str = "update-rtr1-config";
pub const DEFAULT_REMOTE: &str = "origin";

/// Commits the configuration file and pushes it to a fixed branch
#[derive(Debug, Clone)]
pub struct GitPublisher {
    /// Repository root path
    repo_path: PathBuf,
    /// Config file, relative to the repository root or absolute
    file: PathBuf,
    branch: String,
    remote: String,
}

impl GitPublisher {
    pub fn new(repo_path: impl AsRef<Path>, file: impl AsRef<Path>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            file: file.as_ref().to_path_buf(),
            branch: DEFAULT_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Check if the directory is a git repository
    pub async fn is_git_repo(&self) -> bool {
        let output = Command::new("git")
            .args(["rev-parse", "--is-inside-work-tree"])
            .current_dir(&self.repo_path)
            .output()
            .await;

        match output {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    async fn run(&self, args: &[&str], action: &str) -> Result<String> {
        debug!("Running git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .await
            .with_context(|| format!("Failed to {}", action))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            return Err(anyhow::anyhow!(
                "Failed to {}: {}{}",
                action,
                stderr.trim(),
                if stdout.contains("nothing to commit") {
                    " (nothing to commit)"
                } else {
                    ""
                }
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Checkout an existing branch
    pub async fn checkout_branch(&self) -> Result<()> {
        info!("Checking out git branch: {}", self.branch);
        self.run(&["checkout", self.branch.as_str()], "checkout git branch")
            .await
            .map(|_| ())
    }

    /// Stage the configuration file
    pub async fn stage_file(&self) -> Result<()> {
        let file = self.file.to_string_lossy();
        info!("Staging {}", file);
        self.run(&["add", &*file], "stage file").await.map(|_| ())
    }

    /// Create a commit with the given message
    pub async fn commit(&self, message: &str) -> Result<()> {
        info!("Creating commit: {}", message);

        match self.run(&["commit", "-m", message], "create commit").await {
            Ok(_) => Ok(()),
            // A save that did not change the file is not a failure
            Err(e) if e.to_string().contains("nothing to commit") => {
                warn!("Nothing to commit: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Push the branch, setting upstream
    pub async fn push(&self) -> Result<()> {
        info!("Pushing {} to {}", self.branch, self.remote);
        self.run(&["push", "-u", self.remote.as_str(), self.branch.as_str()], "push changes")
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, content: &str, commit_message: &str) -> Result<()> {
        if !self.is_git_repo().await {
            return Err(anyhow::anyhow!(
                "Not a git repository: {}",
                self.repo_path.display()
            ));
        }

        debug!(
            "Publishing {} bytes from {}",
            content.len(),
            self.file.display()
        );

        self.checkout_branch().await?;
        self.stage_file().await?;
        self.commit(commit_message).await?;
        self.push().await?;

        Ok(())
    }

    fn name(&self) -> &str {
        "git"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_and_builders() {
        let publisher = GitPublisher::new("/srv/configs", "rtr1_config.txt");
        assert_eq!(publisher.branch(), DEFAULT_BRANCH);
        assert_eq!(publisher.remote(), DEFAULT_REMOTE);

        let publisher = publisher.with_branch("lab").with_remote("upstream");
        assert_eq!(publisher.branch(), "lab");
        assert_eq!(publisher.remote(), "upstream");
        assert_eq!(publisher.name(), "git");
    }

    #[tokio::test]
    async fn test_publish_outside_repository_fails() {
        let dir = tempdir().unwrap();
        let publisher = GitPublisher::new(dir.path(), "rtr1_config.txt");

        let err = publisher
            .publish("hostname rtr1\n", "Update MOTD via web app: x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not a git repository"));
    }
}
