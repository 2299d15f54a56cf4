//! Events emitted while importing, and the sinks that receive them.
//!
//! Event names match what the front end listens for:
//! * `dropbox-progress` - after every registered file
//! * `dropbox-complete` - batch finished
//! * `dropbox-error` - batch failed
//! * `dropbox-notice` - banner or toast to show
//! * `dropbox-refreshed` - directory cache rebuilt

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::{CollisionCode, ImportError};

// ============================================================================
// Payloads
// ============================================================================

/// Progress of an upload batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    /// Files fully registered so far
    pub count: usize,
    /// Files entering the pipeline, fixed at batch start
    pub total: usize,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.count == self.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportProgressEvent {
    pub operation_id: String,
    /// Name of the file that just completed
    pub current_file: String,
    pub progress: UploadProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportCompleteEvent {
    pub operation_id: String,
    pub files_uploaded: usize,
    pub folders_created: usize,
    pub files_archived: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportErrorEvent {
    pub operation_id: String,
    pub error: ImportError,
    /// Files that stayed committed before the failure
    pub files_uploaded: usize,
}

/// Something the user must see: a dismissible banner or a transient toast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Banner for fetch and conflict-query failures
    UnexpectedError { message: String },
    /// Banner for a failed upload batch
    UploadError { message: String },
    /// Toast after a failed attempt that will be retried
    UploadRetry {
        file_name: String,
        attempt: u32,
        max_attempts: u32,
    },
    /// Toast for a refused create, rename, move or unarchive
    NameCollision { code: CollisionCode, name: String },
}

impl Notice {
    /// Banners stay until dismissed, toasts go away on their own.
    pub fn is_banner(&self) -> bool {
        matches!(self, Notice::UnexpectedError { .. } | Notice::UploadError { .. })
    }

    /// Banner for a batch-level failure.
    pub fn for_error(err: &ImportError) -> Notice {
        match err {
            ImportError::Upload { .. } | ImportError::FolderCreation { .. } => Notice::UploadError {
                message: err.user_message(),
            },
            ImportError::NameCollision { code, name } => Notice::NameCollision {
                code: *code,
                name: name.clone(),
            },
            _ => Notice::UnexpectedError {
                message: err.user_message(),
            },
        }
    }
}

/// Every event the engine emits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ImportEvent {
    #[serde(rename = "dropbox-progress")]
    Progress(ImportProgressEvent),
    #[serde(rename = "dropbox-complete")]
    Complete(ImportCompleteEvent),
    #[serde(rename = "dropbox-error")]
    Error(ImportErrorEvent),
    #[serde(rename = "dropbox-notice")]
    Notice(Notice),
    #[serde(rename = "dropbox-refreshed")]
    Refreshed { directories: usize },
}

// ============================================================================
// Sinks
// ============================================================================

/// Receives engine events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ImportEvent);
}

/// Writes events to the log. Used when no front end is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ImportEvent) {
        match &event {
            ImportEvent::Progress(p) => log::debug!(
                "dropbox-progress: operation_id={}, file={}, {}/{}",
                p.operation_id,
                p.current_file,
                p.progress.count,
                p.progress.total
            ),
            ImportEvent::Complete(c) => log::info!(
                "dropbox-complete: operation_id={}, uploaded={}, folders={}, archived={}",
                c.operation_id,
                c.files_uploaded,
                c.folders_created,
                c.files_archived
            ),
            ImportEvent::Error(e) => log::error!("dropbox-error: operation_id={}, {}", e.operation_id, e.error),
            ImportEvent::Notice(notice) => log::warn!("dropbox-notice: {:?}", notice),
            ImportEvent::Refreshed { directories } => log::debug!("dropbox-refreshed: {} directories", directories),
        }
    }
}

/// Forwards events to a tokio channel, e.g. a bridge to the UI.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ImportEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ImportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ImportEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("ChannelSink: receiver dropped, event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_uses_event_names() {
        let event = ImportEvent::Progress(ImportProgressEvent {
            operation_id: "op".into(),
            current_file: "a.png".into(),
            progress: UploadProgress { count: 1, total: 3 },
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "dropbox-progress");
        assert_eq!(value["payload"]["progress"]["total"], 3);
        assert_eq!(value["payload"]["currentFile"], "a.png");
    }

    #[test]
    fn test_notice_for_error() {
        let upload = ImportError::Upload {
            file_name: "a".into(),
            attempts: 3,
            message: "x".into(),
        };
        assert!(matches!(Notice::for_error(&upload), Notice::UploadError { .. }));
        assert!(Notice::for_error(&upload).is_banner());

        let fetch = ImportError::Fetch { message: "x".into() };
        assert!(matches!(Notice::for_error(&fetch), Notice::UnexpectedError { .. }));

        let retry = Notice::UploadRetry {
            file_name: "a".into(),
            attempt: 1,
            max_attempts: 3,
        };
        assert!(!retry.is_banner());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(ImportEvent::Refreshed { directories: 4 });
        assert_eq!(rx.recv().await, Some(ImportEvent::Refreshed { directories: 4 }));
    }
}
