//! Sequential stage-and-register pipeline with bounded retry.

use std::time::Duration;

use crate::config::ImportConfig;
use crate::errors::{ImportError, StoreError};
use crate::events::{EventSink, ImportEvent, ImportProgressEvent, Notice, UploadProgress};
use crate::materializer::FolderMaterializer;
use crate::planner::PlannedFile;
use crate::store::AssetStore;
use crate::types::{AssetScope, Destination, DroppedFile, FileRecord};

/// What a pipeline run committed, and why it stopped early if it did.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub uploaded: Vec<FileRecord>,
    pub folders_created: Vec<FileRecord>,
    pub failure: Option<ImportError>,
}

impl UploadReport {
    pub fn into_result(self) -> Result<Self, ImportError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

pub struct UploadPipeline<'a, S: AssetStore> {
    store: &'a S,
    scope: &'a AssetScope,
    config: &'a ImportConfig,
    sink: &'a dyn EventSink,
    operation_id: &'a str,
}

impl<'a, S: AssetStore> UploadPipeline<'a, S> {
    pub fn new(
        store: &'a S,
        scope: &'a AssetScope,
        config: &'a ImportConfig,
        sink: &'a dyn EventSink,
        operation_id: &'a str,
    ) -> Self {
        Self {
            store,
            scope,
            config,
            sink,
            operation_id,
        }
    }

    /// Uploads `files` in order below `base`.
    ///
    /// Stops at the first file that fails on every attempt, or at the first
    /// folder that can't be created. Files uploaded before that stay.
    pub async fn run(
        &self,
        materializer: &mut FolderMaterializer,
        base_fqdn: &str,
        base: &Destination,
        files: &[&PlannedFile],
    ) -> UploadReport {
        let mut progress = UploadProgress {
            count: 0,
            total: files.len(),
        };
        let mut report = UploadReport::default();
        log::info!(
            "UploadPipeline: starting operation_id={}, {} files",
            self.operation_id,
            progress.total
        );

        for planned in files {
            let destination = match materializer
                .resolve(self.store, self.scope, base_fqdn, base, &planned.folder_segments)
                .await
            {
                Ok(destination) => destination,
                Err(err) => {
                    report.failure = Some(err);
                    break;
                }
            };

            match self.upload_with_retry(&planned.file, &destination).await {
                Ok(record) => {
                    progress.count += 1;
                    log::debug!(
                        "UploadPipeline: registered '{}' as {} ({}/{})",
                        record.file_name,
                        record.id,
                        progress.count,
                        progress.total
                    );
                    self.sink.emit(ImportEvent::Progress(ImportProgressEvent {
                        operation_id: self.operation_id.to_string(),
                        current_file: planned.file.name.clone(),
                        progress,
                    }));
                    report.uploaded.push(record);
                }
                Err(err) => {
                    report.failure = Some(err);
                    break;
                }
            }
        }

        report.folders_created = materializer.created().to_vec();
        if let Some(err) = &report.failure {
            log::error!(
                "UploadPipeline: operation_id={} stopped after {}/{} files: {}",
                self.operation_id,
                progress.count,
                progress.total,
                err
            );
        }
        report
    }

    async fn upload_with_retry(&self, file: &DroppedFile, destination: &Destination) -> Result<FileRecord, ImportError> {
        let max_attempts = self.config.max_upload_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.try_upload(file, destination).await {
                Ok(record) => return Ok(record),
                Err(err) => err,
            };
            if attempt >= max_attempts {
                return Err(ImportError::Upload {
                    file_name: file.name.clone(),
                    attempts: attempt,
                    message: err.to_string(),
                });
            }

            log::warn!(
                "UploadPipeline: attempt {}/{} for '{}' failed (retryable={}): {}",
                attempt,
                max_attempts,
                file.name,
                err.is_retryable(),
                err
            );
            self.sink.emit(ImportEvent::Notice(Notice::UploadRetry {
                file_name: file.name.clone(),
                attempt,
                max_attempts,
            }));
            if self.config.retry_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
            }
        }
    }

    async fn try_upload(&self, file: &DroppedFile, destination: &Destination) -> Result<FileRecord, StoreError> {
        let staged = self.store.stage_binary(file).await?;
        self.store.register_file(self.scope, destination, &staged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_index::PathIndex;
    use crate::store::{InMemoryAssetStore, StoreCall};
    use crate::test_support::{RecordingSink, dropped, init_logging, scope};

    fn planned(name: &str, segments: &[&str]) -> PlannedFile {
        PlannedFile {
            file: dropped(name, None),
            folder_segments: segments.iter().map(|s| s.to_string()).collect(),
            collisions: Vec::new(),
        }
    }

    async fn run(store: &InMemoryAssetStore, config: &ImportConfig, sink: &RecordingSink, files: &[PlannedFile]) -> UploadReport {
        let scope = scope();
        let pipeline = UploadPipeline::new(store, &scope, config, sink, "op-1");
        let mut materializer = FolderMaterializer::new(&PathIndex::default());
        let refs: Vec<&PlannedFile> = files.iter().collect();
        pipeline.run(&mut materializer, "", &Destination::Root, &refs).await
    }

    fn registrations(store: &InMemoryAssetStore) -> usize {
        store.count_calls(|c| matches!(c, StoreCall::RegisterFile { .. }))
    }

    #[tokio::test]
    async fn test_progress_counts_up_to_total() {
        let store = InMemoryAssetStore::new();
        let sink = RecordingSink::default();
        let files = vec![planned("a.txt", &[]), planned("b.txt", &["Docs"]), planned("c.txt", &[])];

        let report = run(&store, &ImportConfig::default(), &sink, &files).await;

        assert!(report.failure.is_none());
        assert_eq!(report.uploaded.len(), 3);
        assert_eq!(report.folders_created.len(), 1);
        let counts: Vec<(usize, usize)> = sink.progress().iter().map(|p| (p.count, p.total)).collect();
        assert_eq!(counts, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn test_always_failing_file_is_tried_exactly_max_attempts() {
        init_logging();
        let store = InMemoryAssetStore::new();
        store.fail_register(u32::MAX);
        let sink = RecordingSink::default();

        let report = run(&store, &ImportConfig::default(), &sink, &[planned("a.txt", &[])]).await;

        assert_eq!(registrations(&store), 3);
        assert_eq!(
            report.failure,
            Some(ImportError::Upload {
                file_name: "a.txt".to_string(),
                attempts: 3,
                message: "HTTP 502: bad gateway".to_string(),
            })
        );
        // Two retry toasts, no toast after the final attempt
        let retries = sink
            .notices()
            .into_iter()
            .filter(|n| matches!(n, Notice::UploadRetry { .. }))
            .count();
        assert_eq!(retries, 2);
        assert!(sink.progress().is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_is_retried_and_counted() {
        init_logging();
        let store = InMemoryAssetStore::new();
        store.fail_stage(1);
        let sink = RecordingSink::default();

        let report = run(&store, &ImportConfig::default(), &sink, &[planned("a.txt", &[])]).await;

        assert!(report.failure.is_none());
        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(
            sink.notices(),
            vec![Notice::UploadRetry {
                file_name: "a.txt".to_string(),
                attempt: 1,
                max_attempts: 3,
            }]
        );
        assert_eq!(sink.progress(), vec![UploadProgress { count: 1, total: 1 }]);
    }

    #[tokio::test]
    async fn test_failure_stops_batch_and_keeps_earlier_files() {
        let store = InMemoryAssetStore::new();
        let sink = RecordingSink::default();
        let config = ImportConfig {
            max_upload_attempts: 1,
            ..ImportConfig::default()
        };
        let files = vec![planned("a.txt", &[]), planned("b.txt", &[]), planned("c.txt", &[])];

        // a.txt stages fine, then every later stage fails
        let scope = scope();
        let pipeline = UploadPipeline::new(&store, &scope, &config, &sink, "op-2");
        let mut materializer = FolderMaterializer::new(&PathIndex::default());
        let first = [&files[0]];
        let report = pipeline.run(&mut materializer, "", &Destination::Root, &first).await;
        assert!(report.failure.is_none());

        store.fail_stage(u32::MAX);
        let rest: Vec<&PlannedFile> = files[1..].iter().collect();
        let report = pipeline.run(&mut materializer, "", &Destination::Root, &rest).await;

        assert!(matches!(report.failure, Some(ImportError::Upload { attempts: 1, .. })));
        assert!(report.uploaded.is_empty());
        assert_eq!(store.records().len(), 1);
        // c.txt was never attempted
        assert_eq!(
            store.count_calls(|c| matches!(c, StoreCall::StageBinary { file_name } if file_name == "c.txt")),
            0
        );
    }

    #[tokio::test]
    async fn test_folder_creation_failure_is_not_retried() {
        let store = InMemoryAssetStore::new();
        store.fail_create_folder(1);
        let sink = RecordingSink::default();

        let report = run(&store, &ImportConfig::default(), &sink, &[planned("a.txt", &["Docs"])]).await;

        assert!(matches!(report.failure, Some(ImportError::FolderCreation { .. })));
        assert_eq!(store.count_calls(|c| matches!(c, StoreCall::CreateFolder { .. })), 1);
        assert_eq!(registrations(&store), 0);
    }
}
