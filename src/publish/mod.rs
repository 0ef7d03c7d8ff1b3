// Publishing of a saved configuration to a downstream system

pub mod git;

use anyhow::Result;
use async_trait::async_trait;

pub use git::GitPublisher;

/// Hands a freshly written configuration off to an external system
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `content`, which is already persisted, under `commit_message`
    async fn publish(&self, content: &str, commit_message: &str) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Commit message describing which fields a save changed
pub fn commit_message(hostname: Option<&str>, motd: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(hostname) = hostname {
        parts.push(format!("Update hostname via web app: {}", hostname));
    }
    if let Some(motd) = motd {
        parts.push(format!("Update MOTD via web app: {}", motd));
    }

    if parts.is_empty() {
        "Update configuration via web app".to_string()
    } else {
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message(None, Some("Hello")),
            "Update MOTD via web app: Hello"
        );
        assert_eq!(
            commit_message(Some("rtr2"), None),
            "Update hostname via web app: rtr2"
        );
        assert_eq!(
            commit_message(Some("rtr2"), Some("Hi")),
            "Update hostname via web app: rtr2; Update MOTD via web app: Hi"
        );
        assert_eq!(commit_message(None, None), "Update configuration via web app");
    }
}
