//! Shared helpers for unit tests.

use std::sync::Mutex;

use crate::events::{EventSink, ImportEvent, Notice, UploadProgress};
use crate::types::{AssetScope, DirectoryRecord, DroppedFile, FileRecord, RecordId};

/// Routes `log` output through the test harness. Safe to call from every test.
pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn scope() -> AssetScope {
    AssetScope::project("project-1", "main")
}

pub(crate) fn dir(id: &str, name: &str, parent: Option<&str>) -> DirectoryRecord {
    FileRecord {
        id: RecordId::from(id),
        file_name: name.to_string(),
        folder: parent.map(RecordId::from),
        is_directory: true,
        archived: false,
        created_at: None,
        created_by: None,
    }
}

pub(crate) fn archived_dir(id: &str, name: &str, parent: Option<&str>) -> DirectoryRecord {
    DirectoryRecord {
        archived: true,
        ..dir(id, name, parent)
    }
}

pub(crate) fn dropped(name: &str, relative_path: Option<&str>) -> DroppedFile {
    let file = DroppedFile::new(name, format!("contents of {name}").into_bytes());
    match relative_path {
        Some(path) => file.with_relative_path(path),
        None => file,
    }
}

/// Keeps every emitted event for later assertions.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<ImportEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<ImportEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn progress(&self) -> Vec<UploadProgress> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::Progress(p) => Some(p.progress),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ImportEvent) {
        self.events.lock().unwrap().push(event);
    }
}
