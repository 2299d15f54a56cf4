//! Import session: one project Dropbox, its directory cache, and its batches.
//!
//! A batch goes plan → prompt (only when something collides) → archive
//! duplicates (Overwrite only) → materialize folders and upload. Only one
//! batch runs at a time. After any batch that changed something, the
//! directory list is fetched again and the cached tree and index replaced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::errors::ImportError;
use crate::events::{EventSink, ImportCompleteEvent, ImportErrorEvent, ImportEvent, Notice};
use crate::file_ops::FileOps;
use crate::materializer::FolderMaterializer;
use crate::path_index::PathIndex;
use crate::planner::{self, DropPlan, PlannedFile};
use crate::poison::{IgnorePoison, IgnorePoisonRw};
use crate::prompt::{ConflictDecision, ConflictPrompt, ConflictResolver, PromptState};
use crate::store::AssetStore;
use crate::tree::DirectoryTree;
use crate::types::{AssetScope, Destination, DroppedFile, FileRecord, RecordId};
use crate::upload::UploadPipeline;

/// Tree and index built from one directory fetch.
#[derive(Debug)]
pub struct DirectorySnapshot {
    pub tree: DirectoryTree,
    pub index: PathIndex,
    pub fetched_at: DateTime<Utc>,
}

/// What one batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub operation_id: String,
    /// `None` when nothing collided and no prompt was shown
    pub decision: Option<ConflictDecision>,
    pub uploaded: Vec<FileRecord>,
    pub folders_created: Vec<FileRecord>,
    pub archived: Vec<FileRecord>,
}

impl ImportSummary {
    pub fn is_cancelled(&self) -> bool {
        self.decision == Some(ConflictDecision::Cancel)
    }
}

/// Held while a batch runs; clears the busy flag on drop.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ImportError> {
        if flag.swap(true, Ordering::AcqRel) {
            log::warn!("ImportSession: batch refused, another one is in flight");
            return Err(ImportError::Busy);
        }
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Held while the conflict prompt is open. Dismissing the batch before a
/// decision is applied (a dropped future) puts the prompt back to Idle.
struct OpenPrompt<'a> {
    prompt: &'a Mutex<ConflictPrompt>,
    decided: bool,
}

impl<'a> OpenPrompt<'a> {
    fn open(prompt: &'a Mutex<ConflictPrompt>, duplicates: Vec<FileRecord>) -> Result<Self, ImportError> {
        prompt.lock_ignore_poison().open(duplicates).map_err(|e| {
            log::warn!("ImportSession: {}", e);
            ImportError::Busy
        })?;
        Ok(Self { prompt, decided: false })
    }

    fn decide(mut self, decision: ConflictDecision) {
        self.decided = true;
        if let Err(e) = self.prompt.lock_ignore_poison().decide(decision) {
            log::warn!("ImportSession: {}", e);
        }
    }
}

impl Drop for OpenPrompt<'_> {
    fn drop(&mut self) {
        if !self.decided && self.prompt.lock_ignore_poison().dismiss() {
            log::info!("ImportSession: prompt abandoned without a decision, back to idle");
        }
    }
}

pub struct ImportSession<S: AssetStore> {
    store: S,
    scope: AssetScope,
    config: ImportConfig,
    sink: Arc<dyn EventSink>,
    cache: RwLock<Option<Arc<DirectorySnapshot>>>,
    busy: AtomicBool,
    prompt: Mutex<ConflictPrompt>,
}

impl<S: AssetStore> ImportSession<S> {
    pub fn new(store: S, scope: AssetScope, config: ImportConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            scope,
            config,
            sink,
            cache: RwLock::new(None),
            busy: AtomicBool::new(false),
            prompt: Mutex::new(ConflictPrompt::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn scope(&self) -> &AssetScope {
        &self.scope
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn prompt_state(&self) -> PromptState {
        self.prompt.lock_ignore_poison().state().clone()
    }

    /// The cached snapshot, if one was fetched.
    pub fn snapshot(&self) -> Option<Arc<DirectorySnapshot>> {
        self.cache.read_ignore_poison().clone()
    }

    /// Fetches the directory list and replaces the cached tree and index.
    pub async fn refresh(&self) -> Result<Arc<DirectorySnapshot>, ImportError> {
        let directories = match self.store.load_directories(&self.scope).await {
            Ok(directories) => directories,
            Err(e) => {
                log::error!("ImportSession: loading directories failed: {}", e);
                return Err(self.fail(ImportError::Fetch { message: e.to_string() }));
            }
        };

        let tree = match DirectoryTree::build(&directories) {
            Ok(tree) => tree,
            Err(e) => {
                log::error!("ImportSession: {}", e);
                return Err(self.fail(e.into()));
            }
        };
        let index = PathIndex::build(&tree);
        let snapshot = Arc::new(DirectorySnapshot {
            tree,
            index,
            fetched_at: Utc::now(),
        });
        log::debug!(
            "ImportSession: cached {} directories, {} indexed paths",
            snapshot.tree.len(),
            snapshot.index.len()
        );
        *self.cache.write_ignore_poison() = Some(Arc::clone(&snapshot));
        self.sink.emit(ImportEvent::Refreshed {
            directories: snapshot.tree.len(),
        });
        Ok(snapshot)
    }

    async fn current_snapshot(&self) -> Result<Arc<DirectorySnapshot>, ImportError> {
        match self.snapshot() {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh().await,
        }
    }

    /// Classifies a drop against the cached hierarchy. Read-only.
    pub async fn plan_drop(&self, destination: &Destination, files: Vec<DroppedFile>) -> Result<DropPlan, ImportError> {
        let snapshot = self.current_snapshot().await?;
        planner::plan_drop(
            &self.store,
            &self.scope,
            &snapshot.index,
            destination,
            files,
            self.config.file_name_cmp,
        )
        .await
        .map_err(|e| self.fail(e))
    }

    /// Applies a conflict decision to a plan made earlier.
    pub async fn materialize_and_upload(
        &self,
        plan: &DropPlan,
        decision: ConflictDecision,
    ) -> Result<ImportSummary, ImportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let operation_id = Uuid::new_v4().to_string();
        self.run_batch(&operation_id, plan, Some(decision)).await
    }

    /// Plans a drop, asks `resolver` when something collides, then uploads.
    pub async fn import_drop<R: ConflictResolver>(
        &self,
        destination: &Destination,
        files: Vec<DroppedFile>,
        resolver: &R,
    ) -> Result<ImportSummary, ImportError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let operation_id = Uuid::new_v4().to_string();
        log::info!(
            "ImportSession: operation_id={}, {} files dropped onto {}",
            operation_id,
            files.len(),
            destination
        );

        let plan = self.plan_drop(destination, files).await?;
        let decision = if plan.has_conflicts() {
            let prompt = OpenPrompt::open(&self.prompt, plan.duplicates.clone())?;
            let decision = resolver.resolve(&plan.duplicates).await;
            prompt.decide(decision);
            log::info!("ImportSession: operation_id={}, decision {:?}", operation_id, decision);
            Some(decision)
        } else {
            None
        };

        self.run_batch(&operation_id, &plan, decision).await
    }

    async fn run_batch(
        &self,
        operation_id: &str,
        plan: &DropPlan,
        decision: Option<ConflictDecision>,
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary {
            operation_id: operation_id.to_string(),
            decision,
            ..ImportSummary::default()
        };

        let files: Vec<&PlannedFile> = match decision {
            Some(ConflictDecision::Cancel) => {
                log::info!("ImportSession: operation_id={} cancelled, nothing changed", operation_id);
                return Ok(summary);
            }
            Some(ConflictDecision::Skip) => plan.safe().collect(),
            Some(ConflictDecision::Overwrite) | None => plan.files.iter().collect(),
        };

        let result = self.execute(operation_id, plan, decision, files, &mut summary).await;
        let mutated = !summary.archived.is_empty() || !summary.uploaded.is_empty() || !summary.folders_created.is_empty();

        match &result {
            Ok(()) => self.sink.emit(ImportEvent::Complete(ImportCompleteEvent {
                operation_id: operation_id.to_string(),
                files_uploaded: summary.uploaded.len(),
                folders_created: summary.folders_created.len(),
                files_archived: summary.archived.len(),
            })),
            Err(err) => {
                self.sink.emit(ImportEvent::Error(ImportErrorEvent {
                    operation_id: operation_id.to_string(),
                    error: err.clone(),
                    files_uploaded: summary.uploaded.len(),
                }));
                self.sink.emit(ImportEvent::Notice(Notice::for_error(err)));
            }
        }

        if mutated && let Err(e) = self.refresh().await {
            log::warn!("ImportSession: refresh after operation_id={} failed: {}", operation_id, e);
        }
        result.map(|()| summary)
    }

    async fn execute(
        &self,
        operation_id: &str,
        plan: &DropPlan,
        decision: Option<ConflictDecision>,
        files: Vec<&PlannedFile>,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        if decision == Some(ConflictDecision::Overwrite) {
            for duplicate in &plan.duplicates {
                log::debug!("ImportSession: archiving '{}' ({})", duplicate.file_name, duplicate.id);
                let archived = self.store.archive_file(&duplicate.id, true).await?;
                summary.archived.push(archived);
            }
        }

        if files.is_empty() {
            log::info!("ImportSession: operation_id={} has nothing to upload", operation_id);
            return Ok(());
        }

        let snapshot = self.current_snapshot().await?;
        let mut materializer = FolderMaterializer::new(&snapshot.index);
        let pipeline = UploadPipeline::new(&self.store, &self.scope, &self.config, &*self.sink, operation_id);
        let report = pipeline
            .run(&mut materializer, &plan.destination_fqdn, &plan.destination, &files)
            .await;
        summary.uploaded = report.uploaded.clone();
        summary.folders_created = report.folders_created.clone();
        report.into_result().map(|_| ())
    }

    fn fail(&self, err: ImportError) -> ImportError {
        self.sink.emit(ImportEvent::Notice(Notice::for_error(&err)));
        err
    }

    // ========================================================================
    // Single-entry operations
    // ========================================================================

    pub async fn create_folder(&self, parent: &Destination, name: &str) -> Result<FileRecord, ImportError> {
        let created = self.file_ops().create_folder(parent, name).await?;
        self.refresh_after_change().await;
        Ok(created)
    }

    pub async fn rename(&self, record: &FileRecord, new_name: &str) -> Result<FileRecord, ImportError> {
        let renamed = self.file_ops().rename(record, new_name).await?;
        if record.is_directory {
            self.refresh_after_change().await;
        }
        Ok(renamed)
    }

    pub async fn move_to(&self, record: &FileRecord, destination: &Destination) -> Result<FileRecord, ImportError> {
        let moved = self.file_ops().move_to(record, destination).await?;
        if record.is_directory {
            self.refresh_after_change().await;
        }
        Ok(moved)
    }

    pub async fn set_archived(&self, record: &FileRecord, archived: bool) -> Result<FileRecord, ImportError> {
        let updated = self.file_ops().set_archived(record, archived).await?;
        if record.is_directory {
            self.refresh_after_change().await;
        }
        Ok(updated)
    }

    fn file_ops(&self) -> FileOps<'_, S> {
        FileOps::new(&self.store, &self.scope, &*self.sink, self.config.file_name_cmp)
    }

    /// Looks up a directory by id in the cached tree.
    pub fn cached_directory(&self, id: &RecordId) -> Option<FileRecord> {
        self.snapshot()
            .and_then(|snapshot| snapshot.tree.get(id).and_then(|node| node.record.clone()))
    }

    async fn refresh_after_change(&self) {
        if let Err(e) = self.refresh().await {
            log::warn!("ImportSession: refresh after change failed: {}", e);
        }
    }
}
