//! HTTP client for the content-graph API.
//!
//! Endpoints (relative to `StoreConfig::base_url`):
//! * `GET  /projects/{project}/branches/{branch}/files` - filtered file page
//! * `POST /projects/{project}/branches/{branch}/files` - create folder or register staged file
//! * `PUT  /staging/{fileName}` - raw bytes, returns `{ "reference": ... }`
//! * `PATCH /files/{id}` - archive/restore, move or rename

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use super::{AssetStore, collect_directory_pages};
use crate::config::StoreConfig;
use crate::errors::StoreError;
use crate::types::{AssetScope, Destination, DroppedFile, FilePage, FileQuery, FileRecord, RecordId, StagedRef};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateFolderRequest<'a> {
    file_name: &'a str,
    folder: Option<&'a RecordId>,
    is_directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_id: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterFileRequest<'a> {
    staged_reference: &'a str,
    file_name: &'a str,
    folder: Option<&'a RecordId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct StageResponse {
    reference: String,
}

/// Partial update sent to `PATCH /files/{id}`.
#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct FilePatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    archived: Option<bool>,
    /// `Some(None)` moves to the root
    #[serde(skip_serializing_if = "Option::is_none")]
    folder: Option<Option<&'a RecordId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_name: Option<&'a str>,
}

/// Asset store backed by the content-graph REST API.
#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: Client,
    base_url: Url,
    directory_page_size: usize,
}

impl HttpAssetStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(format!("Failed to create HTTP client: {e}")))?;
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Parse(format!("Invalid API base URL '{}': {e}", config.base_url)))?;
        Ok(Self {
            client,
            base_url,
            directory_page_size: config.directory_page_size,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::Parse(format!("API base URL cannot have a path: {}", self.base_url)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    fn files_url(&self, scope: &AssetScope) -> Result<Url, StoreError> {
        self.url(&["projects", &scope.project_id, "branches", &scope.branch_id, "files"])
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, StoreError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Transport(format!("{what}: request timed out"))
            } else {
                StoreError::Transport(format!("{what}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => StoreError::NotFound(format!("{what}: {body}")),
                StatusCode::CONFLICT => StoreError::Conflict(format!("{what}: {body}")),
                _ => StoreError::Http {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(format!("{what}: {e}")))?;
        log::trace!("HttpAssetStore {what}: raw response body: {body}");
        serde_json::from_str(&body).map_err(|e| StoreError::Parse(format!("{what}: {e}")))
    }

    async fn patch(&self, id: &RecordId, patch: &FilePatch<'_>, what: &str) -> Result<FileRecord, StoreError> {
        let url = self.url(&["files", id.as_str()])?;
        self.send(self.client.patch(url).json(patch), what).await
    }
}

/// Query string for a file page request.
pub(crate) fn query_params(scope: &AssetScope, query: &FileQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(asset_id) = &scope.asset_id {
        params.push(("assetId", asset_id.clone()));
    }
    match &query.folder {
        Some(Destination::Root) => params.push(("folder", "root".to_string())),
        Some(Destination::Folder(id)) => params.push(("folder", id.to_string())),
        None => {}
    }
    if let Some(archived) = query.archived {
        params.push(("archived", archived.to_string()));
    }
    if let Some(name) = &query.file_name {
        params.push(("fileName", name.clone()));
        params.push(("nameCmp", query.name_cmp.as_query_value().to_string()));
    }
    if query.directories_only {
        params.push(("isDirectory", "true".to_string()));
    }
    params.push(("offset", query.offset.to_string()));
    if query.limit > 0 {
        params.push(("limit", query.limit.to_string()));
    }
    params
}

impl AssetStore for HttpAssetStore {
    async fn load_directories(&self, scope: &AssetScope) -> Result<Vec<FileRecord>, StoreError> {
        collect_directory_pages(self, scope, self.directory_page_size).await
    }

    async fn list_files(&self, scope: &AssetScope, query: &FileQuery) -> Result<FilePage, StoreError> {
        let mut url = self.files_url(scope)?;
        url.query_pairs_mut().extend_pairs(query_params(scope, query));
        self.send(self.client.get(url), "list_files").await
    }

    async fn create_folder(
        &self,
        scope: &AssetScope,
        parent: &Destination,
        name: &str,
    ) -> Result<FileRecord, StoreError> {
        let url = self.files_url(scope)?;
        let body = CreateFolderRequest {
            file_name: name,
            folder: parent.folder_id(),
            is_directory: true,
            asset_id: scope.asset_id.as_deref(),
        };
        self.send(self.client.post(url).json(&body), "create_folder").await
    }

    async fn stage_binary(&self, file: &DroppedFile) -> Result<StagedRef, StoreError> {
        let url = self.url(&["staging", &file.name])?;
        let request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(file.content.clone());
        let response: StageResponse = self.send(request, "stage_binary").await?;
        Ok(StagedRef {
            reference: response.reference,
            file_name: file.name.clone(),
        })
    }

    async fn register_file(
        &self,
        scope: &AssetScope,
        destination: &Destination,
        staged: &StagedRef,
    ) -> Result<FileRecord, StoreError> {
        let url = self.files_url(scope)?;
        let body = RegisterFileRequest {
            staged_reference: &staged.reference,
            file_name: &staged.file_name,
            folder: destination.folder_id(),
            asset_id: scope.asset_id.as_deref(),
        };
        self.send(self.client.post(url).json(&body), "register_file").await
    }

    async fn archive_file(&self, id: &RecordId, archived: bool) -> Result<FileRecord, StoreError> {
        let patch = FilePatch {
            archived: Some(archived),
            ..FilePatch::default()
        };
        self.patch(id, &patch, "archive_file").await
    }

    async fn move_file(&self, id: &RecordId, destination: &Destination) -> Result<FileRecord, StoreError> {
        let patch = FilePatch {
            folder: Some(destination.folder_id()),
            ..FilePatch::default()
        };
        self.patch(id, &patch, "move_file").await
    }

    async fn rename_file(&self, id: &RecordId, name: &str) -> Result<FileRecord, StoreError> {
        let patch = FilePatch {
            file_name: Some(name),
            ..FilePatch::default()
        };
        self.patch(id, &patch, "rename_file").await
    }
}
