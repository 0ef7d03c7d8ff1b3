use std::sync::Arc;
use tracing::{error, info};

use crate::engine::{self, FieldUpdate, ParsedFields, BANNER_SENTINEL};
use crate::error::{EditorError, EditorResult};
use crate::publish::{self, Publisher};
use crate::storage::ConfigStore;

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the written document differs from what was on disk
    pub changed: bool,
    /// Whether the document was handed to the publisher
    pub published: bool,
}

/// Fetch/save service wiring the text engine to storage and publishing
#[derive(Clone)]
pub struct ConfigEditor {
    store: ConfigStore,
    publisher: Option<Arc<dyn Publisher>>,
}

impl ConfigEditor {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn can_publish(&self) -> bool {
        self.publisher.is_some()
    }

    /// Current hostname and banner
    pub async fn fetch(&self) -> EditorResult<ParsedFields> {
        let _guard = self.store.lock().await;
        let content = self.read_existing().await?;
        Ok(engine::parse(&content))
    }

    /// Validate `update`, substitute it into the file and write it back
    pub async fn save(&self, update: &FieldUpdate) -> EditorResult<SaveOutcome> {
        validate_update(update)?;

        let _guard = self.store.lock().await;
        let applied = self.write_update(update).await?;
        Ok(SaveOutcome {
            changed: applied.changed,
            published: false,
        })
    }

    /// Save a MOTD change and publish the result under the same lock
    pub async fn save_and_publish(&self, update: &FieldUpdate) -> EditorResult<SaveOutcome> {
        if update.motd.is_none() {
            return Err(EditorError::invalid_argument("MOTD data missing"));
        }
        validate_update(update)?;

        let publisher = self.publisher.as_ref().ok_or(EditorError::PublishDisabled)?;

        let _guard = self.store.lock().await;
        let applied = self.write_update(update).await?;

        let message = publish::commit_message(
            applied.update.hostname.as_deref(),
            applied.update.motd.as_deref(),
        );

        if let Err(e) = publisher.publish(&applied.content, &message).await {
            error!("{} publish failed: {:#}", publisher.name(), e);
            return Err(EditorError::publish_failed(format!("{:#}", e)));
        }

        info!("Published {} via {}", self.store.path().display(), publisher.name());
        Ok(SaveOutcome {
            changed: applied.changed,
            published: true,
        })
    }

    async fn read_existing(&self) -> EditorResult<String> {
        self.store
            .read_async()
            .await?
            .ok_or_else(|| EditorError::config_not_found(self.store.path()))
    }

    /// Caller holds the lock.
    async fn write_update(&self, update: &FieldUpdate) -> EditorResult<Applied> {
        let original = self.read_existing().await?;
        let update = resolve_hostname(update, &original)?;
        let updated = engine::reassemble(&update, &original);

        if updated == original {
            info!(
                "No directive changed in {}, leaving file untouched",
                self.store.path().display()
            );
            return Ok(Applied {
                update,
                content: original,
                changed: false,
            });
        }

        self.store.write_async(updated.clone()).await?;
        info!("Saved {}", self.store.path().display());
        Ok(Applied {
            update,
            content: updated,
            changed: true,
        })
    }
}

/// What a save actually applied, and the resulting document
struct Applied {
    update: FieldUpdate,
    content: String,
    changed: bool,
}

/// An empty hostname echoes the absent directive back and means no change.
/// It is only an error when the document has a hostname to overwrite.
fn resolve_hostname(update: &FieldUpdate, original: &str) -> EditorResult<FieldUpdate> {
    match update.hostname.as_deref() {
        Some("") if engine::parse(original).hostname.is_empty() => Ok(FieldUpdate {
            hostname: None,
            motd: update.motd.clone(),
        }),
        Some("") => Err(EditorError::invalid_argument("hostname must not be empty")),
        _ => Ok(update.clone()),
    }
}

/// Reject updates the engine cannot represent faithfully
pub fn validate_update(update: &FieldUpdate) -> EditorResult<()> {
    if update.is_empty() {
        return Err(EditorError::invalid_argument("no fields to update"));
    }

    if let Some(hostname) = &update.hostname {
        if hostname.chars().any(char::is_whitespace) {
            return Err(EditorError::invalid_argument(
                "hostname must not contain whitespace",
            ));
        }
    }

    if let Some(motd) = &update.motd {
        if motd.contains(BANNER_SENTINEL) {
            return Err(EditorError::invalid_argument(format!(
                "MOTD must not contain the banner delimiter {}",
                BANNER_SENTINEL
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    const DOC: &str = "hostname rtr1\n!\n! some config\n!\nbanner motd ^C\nTest Banner\n^C\n";

    #[derive(Default)]
    struct RecordingPublisher {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, content: &str, commit_message: &str) -> Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("remote rejected"));
            }
            self.calls
                .lock()
                .unwrap()
                .push((content.to_string(), commit_message.to_string()));
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn editor_with(content: Option<&str>) -> (TempDir, ConfigEditor) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rtr1_config.txt");
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        (dir, ConfigEditor::new(ConfigStore::new(path)))
    }

    fn on_disk(editor: &ConfigEditor) -> String {
        editor.store().read().unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_fetch() {
        let (_dir, editor) = editor_with(Some(DOC));
        let fields = editor.fetch().await.unwrap();
        assert_eq!(fields.hostname, "rtr1");
        assert_eq!(fields.motd, "Test Banner");
    }

    #[tokio::test]
    async fn test_fetch_absent_vs_empty() {
        let (_dir, editor) = editor_with(None);
        assert!(matches!(
            editor.fetch().await,
            Err(EditorError::ConfigNotFound { .. })
        ));

        let (_dir, editor) = editor_with(Some(""));
        assert_eq!(editor.fetch().await.unwrap(), ParsedFields::default());
    }

    #[tokio::test]
    async fn test_save_updates_file() {
        let (_dir, editor) = editor_with(Some(DOC));
        let outcome = editor.save(&FieldUpdate::new("rtr2", "Hello")).await.unwrap();
        assert!(outcome.changed);
        assert!(!outcome.published);
        assert_eq!(
            on_disk(&editor),
            "hostname rtr2\n!\n! some config\n!\nbanner motd ^C\nHello\n^C\n"
        );
    }

    #[tokio::test]
    async fn test_partial_save_keeps_other_field() {
        let (_dir, editor) = editor_with(Some(DOC));
        editor.save(&FieldUpdate::motd("Only banner")).await.unwrap();
        let fields = editor.fetch().await.unwrap();
        assert_eq!(fields.hostname, "rtr1");
        assert_eq!(fields.motd, "Only banner");
    }

    #[tokio::test]
    async fn test_save_without_directives_is_noop() {
        let (_dir, editor) = editor_with(Some("!\n!\n"));
        let outcome = editor.save(&FieldUpdate::new("x", "y")).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(on_disk(&editor), "!\n!\n");
    }

    #[tokio::test]
    async fn test_save_missing_file() {
        let (_dir, editor) = editor_with(None);
        assert!(matches!(
            editor.save(&FieldUpdate::motd("x")).await,
            Err(EditorError::ConfigNotFound { .. })
        ));
        assert_eq!(editor.store().read().unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_updates_leave_file_alone() {
        let (_dir, editor) = editor_with(Some(DOC));
        for update in [
            FieldUpdate::default(),
            FieldUpdate::hostname(""),
            FieldUpdate::hostname("two words"),
            FieldUpdate::motd("sneaky ^C close"),
        ] {
            assert!(matches!(
                editor.save(&update).await,
                Err(EditorError::InvalidArgument { .. })
            ));
        }
        assert_eq!(on_disk(&editor), DOC);
    }

    #[tokio::test]
    async fn test_empty_hostname_without_directive() {
        let (_dir, editor) = editor_with(Some("!\nbanner motd ^C\nold\n^C\n"));
        let fields = editor.fetch().await.unwrap();
        assert_eq!(fields.hostname, "");

        let outcome = editor
            .save(&FieldUpdate::new(fields.hostname, "new banner"))
            .await
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(on_disk(&editor), "!\nbanner motd ^C\nnew banner\n^C\n");
    }

    #[tokio::test]
    async fn test_publish_message_skips_absent_hostname() {
        let (_dir, editor) = editor_with(Some("!\nbanner motd ^C\nold\n^C\n"));
        let publisher = Arc::new(RecordingPublisher::default());
        let editor = editor.with_publisher(publisher.clone());

        editor
            .save_and_publish(&FieldUpdate::new("", "new"))
            .await
            .unwrap();
        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls[0].1, "Update MOTD via web app: new");
    }

    #[tokio::test]
    async fn test_save_and_publish() {
        let (_dir, editor) = editor_with(Some(DOC));
        let publisher = Arc::new(RecordingPublisher::default());
        let editor = editor.with_publisher(publisher.clone());
        assert!(editor.can_publish());

        let outcome = editor
            .save_and_publish(&FieldUpdate::motd("Maintenance tonight"))
            .await
            .unwrap();
        assert!(outcome.changed && outcome.published);

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, on_disk(&editor));
        assert_eq!(calls[0].1, "Update MOTD via web app: Maintenance tonight");
    }

    #[tokio::test]
    async fn test_publish_requires_motd_and_publisher() {
        let (_dir, editor) = editor_with(Some(DOC));
        assert!(matches!(
            editor.save_and_publish(&FieldUpdate::motd("x")).await,
            Err(EditorError::PublishDisabled)
        ));

        let editor = editor.with_publisher(Arc::new(RecordingPublisher::default()));
        assert!(matches!(
            editor.save_and_publish(&FieldUpdate::hostname("r")).await,
            Err(EditorError::InvalidArgument { .. })
        ));
        assert_eq!(on_disk(&editor), DOC);
    }

    #[tokio::test]
    async fn test_publish_failure_is_reported_after_write() {
        let (_dir, editor) = editor_with(Some(DOC));
        let editor = editor.with_publisher(Arc::new(RecordingPublisher {
            fail: true,
            ..Default::default()
        }));

        match editor.save_and_publish(&FieldUpdate::motd("New")).await {
            Err(EditorError::PublishFailed { message }) => {
                assert!(message.contains("remote rejected"))
            }
            other => panic!("expected publish failure, got {:?}", other),
        }
        assert_eq!(editor.fetch().await.unwrap().motd, "New");
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_serialized() {
        let (_dir, editor) = editor_with(Some(DOC));
        let mut handles = Vec::new();
        for i in 0..8 {
            let editor = editor.clone();
            handles.push(tokio::spawn(async move {
                editor
                    .save(&FieldUpdate::motd(format!("banner {}", i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = on_disk(&editor);
        assert_eq!(content.matches("banner motd ^C").count(), 1);
        assert!(engine::parse(&content).motd.starts_with("banner "));
    }
}
