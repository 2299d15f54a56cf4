//! In-memory asset store for tests and local tooling.
//!
//! Records every call it receives and can be told to fail upcoming calls, so
//! the retry and abort paths can be exercised without a server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use super::{AssetStore, collect_directory_pages};
use crate::errors::StoreError;
use crate::poison::IgnorePoison;
use crate::types::{AssetScope, Destination, DroppedFile, FilePage, FileQuery, FileRecord, RecordId, StagedRef};

/// A call received by the store, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    ListFiles { file_name: Option<String>, folder: Option<Destination> },
    CreateFolder { parent: Destination, name: String },
    StageBinary { file_name: String },
    RegisterFile { destination: Destination, file_name: String },
    Archive { id: RecordId, archived: bool },
    Move { id: RecordId, destination: Destination },
    Rename { id: RecordId, name: String },
}

/// How many upcoming calls of each kind should fail. `u32::MAX` means always.
#[derive(Debug, Default)]
struct FailurePlan {
    listing: u32,
    create_folder: u32,
    stage: u32,
    register: u32,
}

fn take_failure(counter: &mut u32) -> bool {
    match *counter {
        0 => false,
        u32::MAX => true,
        _ => {
            *counter -= 1;
            true
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<FileRecord>,
    staged: HashMap<String, Bytes>,
    calls: Vec<StoreCall>,
    failures: FailurePlan,
}

/// Asset store that keeps every record in memory.
#[derive(Debug)]
pub struct InMemoryAssetStore {
    state: Mutex<StoreState>,
    page_size: usize,
}

impl Default for InMemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<FileRecord>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                records,
                ..StoreState::default()
            }),
            page_size: 100,
        }
    }

    /// Largest page `list_files` returns, whatever limit the query asks for.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock_ignore_poison()
    }

    /// Adds a folder record directly, bypassing the call log.
    pub fn add_folder(&self, name: &str, parent: Option<&RecordId>) -> FileRecord {
        let record = new_record(name, parent.cloned(), true);
        self.lock().records.push(record.clone());
        record
    }

    /// Adds a file record directly, bypassing the call log.
    pub fn add_file(&self, name: &str, folder: Option<&RecordId>) -> FileRecord {
        let record = new_record(name, folder.cloned(), false);
        self.lock().records.push(record.clone());
        record
    }

    pub fn records(&self) -> Vec<FileRecord> {
        self.lock().records.clone()
    }

    pub fn record(&self, id: &RecordId) -> Option<FileRecord> {
        self.lock().records.iter().find(|r| &r.id == id).cloned()
    }

    /// Bytes staged under a reference, if any.
    pub fn staged_bytes(&self, reference: &str) -> Option<Bytes> {
        self.lock().staged.get(reference).cloned()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn fail_listing(&self, times: u32) {
        self.lock().failures.listing = times;
    }

    pub fn fail_create_folder(&self, times: u32) {
        self.lock().failures.create_folder = times;
    }

    pub fn fail_stage(&self, times: u32) {
        self.lock().failures.stage = times;
    }

    pub fn fail_register(&self, times: u32) {
        self.lock().failures.register = times;
    }

    fn folder_exists(state: &StoreState, destination: &Destination) -> bool {
        match destination {
            Destination::Root => true,
            Destination::Folder(id) => state.records.iter().any(|r| &r.id == id && r.is_directory),
        }
    }

    fn update(&self, id: &RecordId, call: StoreCall, apply: impl FnOnce(&mut FileRecord)) -> Result<FileRecord, StoreError> {
        let mut state = self.lock();
        state.calls.push(call);
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        apply(record);
        Ok(record.clone())
    }
}

fn new_record(name: &str, folder: Option<RecordId>, is_directory: bool) -> FileRecord {
    FileRecord {
        id: RecordId::new(Uuid::new_v4().simple().to_string()),
        file_name: name.to_string(),
        folder,
        is_directory,
        archived: false,
        created_at: Some(Utc::now()),
        created_by: Some("in-memory".to_string()),
    }
}

impl AssetStore for InMemoryAssetStore {
    async fn load_directories(&self, scope: &AssetScope) -> Result<Vec<FileRecord>, StoreError> {
        collect_directory_pages(self, scope, self.page_size).await
    }

    async fn list_files(&self, _scope: &AssetScope, query: &FileQuery) -> Result<FilePage, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::ListFiles {
            file_name: query.file_name.clone(),
            folder: query.folder.clone(),
        });
        if take_failure(&mut state.failures.listing) {
            return Err(StoreError::Http {
                status: 500,
                message: "listing failed".to_string(),
            });
        }

        let matching: Vec<&FileRecord> = state.records.iter().filter(|r| query.matches(r)).collect();
        let total = matching.len();
        let limit = if query.limit == 0 { self.page_size } else { query.limit.min(self.page_size) };
        let items = matching.into_iter().skip(query.offset).take(limit).cloned().collect();
        Ok(FilePage {
            items,
            offset: query.offset,
            total,
        })
    }

    async fn create_folder(
        &self,
        _scope: &AssetScope,
        parent: &Destination,
        name: &str,
    ) -> Result<FileRecord, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::CreateFolder {
            parent: parent.clone(),
            name: name.to_string(),
        });
        if take_failure(&mut state.failures.create_folder) {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        if !Self::folder_exists(&state, parent) {
            return Err(StoreError::NotFound(parent.to_string()));
        }
        let record = new_record(name, parent.folder_id().cloned(), true);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn stage_binary(&self, file: &DroppedFile) -> Result<StagedRef, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::StageBinary {
            file_name: file.name.clone(),
        });
        if take_failure(&mut state.failures.stage) {
            return Err(StoreError::Transport("staging timed out".to_string()));
        }
        let reference = Uuid::new_v4().simple().to_string();
        state.staged.insert(reference.clone(), file.content.clone());
        Ok(StagedRef {
            reference,
            file_name: file.name.clone(),
        })
    }

    async fn register_file(
        &self,
        _scope: &AssetScope,
        destination: &Destination,
        staged: &StagedRef,
    ) -> Result<FileRecord, StoreError> {
        let mut state = self.lock();
        state.calls.push(StoreCall::RegisterFile {
            destination: destination.clone(),
            file_name: staged.file_name.clone(),
        });
        if take_failure(&mut state.failures.register) {
            return Err(StoreError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        if !state.staged.contains_key(&staged.reference) {
            return Err(StoreError::NotFound(format!("staged reference {}", staged.reference)));
        }
        if !Self::folder_exists(&state, destination) {
            return Err(StoreError::NotFound(destination.to_string()));
        }
        let record = new_record(&staged.file_name, destination.folder_id().cloned(), false);
        state.records.push(record.clone());
        Ok(record)
    }

    async fn archive_file(&self, id: &RecordId, archived: bool) -> Result<FileRecord, StoreError> {
        let call = StoreCall::Archive {
            id: id.clone(),
            archived,
        };
        self.update(id, call, |record| record.archived = archived)
    }

    async fn move_file(&self, id: &RecordId, destination: &Destination) -> Result<FileRecord, StoreError> {
        if !Self::folder_exists(&self.lock(), destination) {
            return Err(StoreError::NotFound(destination.to_string()));
        }
        let call = StoreCall::Move {
            id: id.clone(),
            destination: destination.clone(),
        };
        self.update(id, call, |record| record.folder = destination.folder_id().cloned())
    }

    async fn rename_file(&self, id: &RecordId, name: &str) -> Result<FileRecord, StoreError> {
        let call = StoreCall::Rename {
            id: id.clone(),
            name: name.to_string(),
        };
        self.update(id, call, |record| record.file_name = name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> AssetScope {
        AssetScope::project("p1", "main")
    }

    #[tokio::test]
    async fn test_load_directories_pages_through_everything() {
        let store = InMemoryAssetStore::new().with_page_size(2);
        let a = store.add_folder("a", None);
        store.add_folder("b", Some(&a.id));
        store.add_folder("c", None);
        store.add_file("readme.txt", None);

        let dirs = store.load_directories(&scope()).await.unwrap();
        assert_eq!(dirs.len(), 3);
        assert!(dirs.iter().all(|d| d.is_directory));
        // 2 + 1 directories: a full page then a short one
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::ListFiles { .. })), 2);
    }

    #[tokio::test]
    async fn test_failure_plan_counts_down() {
        let store = InMemoryAssetStore::new();
        store.fail_stage(1);
        let file = DroppedFile::new("a.txt", b"abc".to_vec());
        assert!(store.stage_binary(&file).await.is_err());
        let staged = store.stage_binary(&file).await.unwrap();
        assert_eq!(store.staged_bytes(&staged.reference).unwrap().as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_register_requires_existing_folder() {
        let store = InMemoryAssetStore::new();
        let file = DroppedFile::new("a.txt", b"abc".to_vec());
        let staged = store.stage_binary(&file).await.unwrap();
        let missing = Destination::Folder(RecordId::from("nope"));
        let err = store.register_file(&scope(), &missing, &staged).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_operations() {
        let store = InMemoryAssetStore::new();
        let folder = store.add_folder("docs", None);
        let file = store.add_file("a.txt", None);

        let moved = store
            .move_file(&file.id, &Destination::Folder(folder.id.clone()))
            .await
            .unwrap();
        assert_eq!(moved.folder, Some(folder.id.clone()));

        let renamed = store.rename_file(&file.id, "b.txt").await.unwrap();
        assert_eq!(renamed.file_name, "b.txt");

        let archived = store.archive_file(&file.id, true).await.unwrap();
        assert!(archived.archived);
    }
}
