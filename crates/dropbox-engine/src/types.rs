//! Type definitions shared across the import engine.
//!
//! Contains record types mirrored from the content-graph API, the dropped-file
//! payload, and the destination sum type.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

/// Opaque id of a record owned by the content-graph API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The project/branch/asset triple every API call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetScope {
    pub project_id: String,
    pub branch_id: String,
    /// Set when the Dropbox belongs to a single asset rather than the whole project
    #[serde(default)]
    pub asset_id: Option<String>,
}

impl AssetScope {
    pub fn project(project_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            branch_id: branch_id.into(),
            asset_id: None,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// A file or folder entry in the project Dropbox.
///
/// Folders and files share one record shape on the wire; folders have
/// `is_directory` set. `folder` is the parent folder, `None` for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: RecordId,
    pub file_name: String,
    #[serde(default)]
    pub folder: Option<RecordId>,
    #[serde(default)]
    pub is_directory: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Directory records are file records with `is_directory` set.
pub type DirectoryRecord = FileRecord;

impl FileRecord {
    /// The folder this record lives in, as a destination.
    pub fn parent_destination(&self) -> Destination {
        Destination::from(self.folder.clone())
    }
}

/// Where a file or folder goes: the project root or a specific folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Destination {
    #[default]
    Root,
    Folder(RecordId),
}

impl Destination {
    pub fn folder_id(&self) -> Option<&RecordId> {
        match self {
            Destination::Root => None,
            Destination::Folder(id) => Some(id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Destination::Root)
    }
}

impl From<Option<RecordId>> for Destination {
    fn from(folder: Option<RecordId>) -> Self {
        match folder {
            Some(id) => Destination::Folder(id),
            None => Destination::Root,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Root => f.write_str("<root>"),
            Destination::Folder(id) => write!(f, "folder {}", id),
        }
    }
}

// ============================================================================
// Dropped files
// ============================================================================

/// A file handed to the engine by a drop or file-picker event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    /// `/segment/.../filename` from a folder drop; `None` when dropped directly
    pub relative_path: Option<String>,
    pub content: Bytes,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            relative_path: None,
            content: content.into(),
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Opaque reference returned by the staging endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedRef {
    pub reference: String,
    /// File name the bytes were staged under
    pub file_name: String,
}

// ============================================================================
// Listing
// ============================================================================

/// How `file_name` filters compare names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameCmp {
    #[default]
    Exact,
    CaseInsensitive,
    Prefix,
}

impl NameCmp {
    pub fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            NameCmp::Exact => candidate == wanted,
            NameCmp::CaseInsensitive => candidate.to_lowercase() == wanted.to_lowercase(),
            NameCmp::Prefix => candidate.to_lowercase().starts_with(&wanted.to_lowercase()),
        }
    }

    pub fn as_query_value(self) -> &'static str {
        match self {
            NameCmp::Exact => "eq",
            NameCmp::CaseInsensitive => "ieq",
            NameCmp::Prefix => "prefix",
        }
    }
}

/// How a dropped or renamed name is compared against existing entries when
/// looking for collisions. Only whole-name comparisons count as a duplicate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    #[default]
    Exact,
    CaseInsensitive,
}

impl From<NameMatch> for NameCmp {
    fn from(name_match: NameMatch) -> Self {
        match name_match {
            NameMatch::Exact => NameCmp::Exact,
            NameMatch::CaseInsensitive => NameCmp::CaseInsensitive,
        }
    }
}

/// Page size for duplicate lookups.
pub const EXISTING_PAGE_SIZE: usize = 100;

/// Filters for a file page request. `None` fields are not filtered on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileQuery {
    pub folder: Option<Destination>,
    pub archived: Option<bool>,
    pub file_name: Option<String>,
    pub name_cmp: NameCmp,
    pub directories_only: bool,
    pub offset: usize,
    pub limit: usize,
}

impl FileQuery {
    /// First page of non-archived entries named `name` directly inside `folder`.
    pub fn existing(name: &str, folder: &Destination, name_match: NameMatch) -> Self {
        Self {
            folder: Some(folder.clone()),
            archived: Some(false),
            file_name: Some(name.to_string()),
            name_cmp: name_match.into(),
            directories_only: false,
            offset: 0,
            limit: EXISTING_PAGE_SIZE,
        }
    }

    /// One page of directories, archived included.
    pub fn directories(offset: usize, limit: usize) -> Self {
        Self {
            directories_only: true,
            offset,
            limit,
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        if self.directories_only && !record.is_directory {
            return false;
        }
        if let Some(archived) = self.archived
            && record.archived != archived
        {
            return false;
        }
        if let Some(folder) = &self.folder
            && record.folder.as_ref() != folder.folder_id()
        {
            return false;
        }
        if let Some(name) = &self.file_name
            && !self.name_cmp.matches(&record.file_name, name)
        {
            return false;
        }
        true
    }
}

/// One page of a file listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub items: Vec<FileRecord>,
    pub offset: usize,
    /// Total matching entries across all pages
    pub total: usize,
}
