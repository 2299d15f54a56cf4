//! `AssetStore` trait for the content-graph API the engine talks to.
//!
//! Implementations:
//! - `HttpAssetStore`: the real API over HTTP
//! - `InMemoryAssetStore`: in-memory store for tests and local tooling
//!
//! Every method is one request/response round trip; the engine never assumes
//! anything about how the remote side persists records.

use std::future::Future;

use crate::errors::StoreError;
use crate::types::{
    AssetScope, Destination, DroppedFile, FilePage, FileQuery, FileRecord, NameCmp, NameMatch, RecordId, StagedRef,
};

mod http;
mod in_memory;

pub use http::HttpAssetStore;
pub use in_memory::{InMemoryAssetStore, StoreCall};


/// Trait for content-graph API operations.
pub trait AssetStore: Send + Sync {
    /// All directories of the scope, archived included.
    fn load_directories(&self, scope: &AssetScope) -> impl Future<Output = Result<Vec<FileRecord>, StoreError>> + Send;

    /// One filtered page of files and folders.
    fn list_files(
        &self,
        scope: &AssetScope,
        query: &FileQuery,
    ) -> impl Future<Output = Result<FilePage, StoreError>> + Send;

    /// Creates one folder named `name` inside `parent`.
    fn create_folder(
        &self,
        scope: &AssetScope,
        parent: &Destination,
        name: &str,
    ) -> impl Future<Output = Result<FileRecord, StoreError>> + Send;

    /// Uploads raw bytes and returns a reference for `register_file`.
    fn stage_binary(&self, file: &DroppedFile) -> impl Future<Output = Result<StagedRef, StoreError>> + Send;

    /// Creates the persisted file entry for staged bytes.
    fn register_file(
        &self,
        scope: &AssetScope,
        destination: &Destination,
        staged: &StagedRef,
    ) -> impl Future<Output = Result<FileRecord, StoreError>> + Send;

    /// Soft-deletes (`archived = true`) or restores a file or folder.
    fn archive_file(&self, id: &RecordId, archived: bool) -> impl Future<Output = Result<FileRecord, StoreError>> + Send;

    fn move_file(
        &self,
        id: &RecordId,
        destination: &Destination,
    ) -> impl Future<Output = Result<FileRecord, StoreError>> + Send;

    fn rename_file(&self, id: &RecordId, name: &str) -> impl Future<Output = Result<FileRecord, StoreError>> + Send;
}

/// Non-archived entries named `name` directly inside `folder`.
///
/// This is the one duplicate lookup shared by drop planning and the
/// create/rename/move/unarchive checks. Reads every page of matches.
pub async fn load_existing_files<S: AssetStore>(
    store: &S,
    scope: &AssetScope,
    name: &str,
    folder: &Destination,
    name_match: NameMatch,
) -> Result<Vec<FileRecord>, StoreError> {
    let name_cmp = NameCmp::from(name_match);
    let existing = collect_pages(store, scope, FileQuery::existing(name, folder, name_match)).await?;
    Ok(existing
        .into_iter()
        .filter(|record| !record.archived && name_cmp.matches(&record.file_name, name))
        .collect())
}

/// Pages through `list_files` until every directory is loaded.
pub(crate) async fn collect_directory_pages<S: AssetStore>(
    store: &S,
    scope: &AssetScope,
    page_size: usize,
) -> Result<Vec<FileRecord>, StoreError> {
    collect_pages(store, scope, FileQuery::directories(0, page_size.max(1))).await
}

/// Follows `query` from its offset until the reported total is reached.
///
/// The server may return fewer items than `query.limit`; only an empty page
/// or reaching `total` ends the walk.
async fn collect_pages<S: AssetStore>(
    store: &S,
    scope: &AssetScope,
    mut query: FileQuery,
) -> Result<Vec<FileRecord>, StoreError> {
    let mut records = Vec::new();
    loop {
        let page = store.list_files(scope, &query).await?;
        let received = page.items.len();
        records.extend(page.items);
        query.offset += received;
        if received == 0 || query.offset >= page.total {
            break;
        }
    }
    Ok(records)
}
