//! Error types for the import engine and its collaborator.

use serde::{Deserialize, Serialize};

use crate::types::RecordId;

// ============================================================================
// Collaborator errors
// ============================================================================

/// Error type for content-graph API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Record not found
    NotFound(String),
    /// The API refused the change because of a conflicting record
    Conflict(String),
    /// Non-success HTTP status
    Http { status: u16, message: String },
    /// Connection failed or timed out
    Transport(String),
    /// Response body could not be parsed
    Parse(String),
}

impl StoreError {
    /// Returns true if the call may succeed if repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::Conflict(_) | Self::Parse(_) => false,
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::Conflict(what) => write!(f, "Conflict: {what}"),
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

// ============================================================================
// Tree errors
// ============================================================================

/// The directory list does not form a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeError {
    /// Following parent pointers from `directory_id` revisits a directory
    Cycle { directory_id: RecordId },
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle { directory_id } => write!(f, "Directory {directory_id} is part of a parent cycle"),
        }
    }
}

impl std::error::Error for TreeError {}

// ============================================================================
// Prompt errors
// ============================================================================

/// Invalid transition of the conflict prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptError {
    /// A prompt is already awaiting a decision
    AlreadyOpen,
    /// No prompt is awaiting a decision
    NotOpen,
}

impl std::fmt::Display for PromptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyOpen => write!(f, "A conflict prompt is already open"),
            Self::NotOpen => write!(f, "No conflict prompt is open"),
        }
    }
}

impl std::error::Error for PromptError {}

// ============================================================================
// Notice codes
// ============================================================================

/// Codes of the dedicated name-collision toasts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionCode {
    DropboxFileExists,
    DropboxMoveConflict,
    DropboxUnarchiveConflict,
}

impl CollisionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DropboxFileExists => "DROPBOX_FILE_EXISTS",
            Self::DropboxMoveConflict => "DROPBOX_MOVE_CONFLICT",
            Self::DropboxUnarchiveConflict => "DROPBOX_UNARCHIVE_CONFLICT",
        }
    }
}

// ============================================================================
// Import errors
// ============================================================================

/// Errors that end an import batch or a file operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImportError {
    /// Directory list or file page could not be loaded
    Fetch { message: String },
    /// Existing-file lookup failed while planning
    ConflictQuery { file_name: String, message: String },
    /// Stage or register failed on every attempt
    Upload {
        file_name: String,
        attempts: u32,
        message: String,
    },
    /// A folder implied by a relative path could not be created
    FolderCreation { name: String, message: String },
    /// Target name is taken by another non-archived entry
    NameCollision { code: CollisionCode, name: String },
    /// Destination folder is unknown, archived or below an archived folder
    DestinationUnavailable { folder_id: RecordId },
    /// The directory list contains a parent cycle
    CorruptHierarchy { directory_id: RecordId },
    /// Another batch is still in flight
    Busy,
    /// Any other collaborator failure
    Store { message: String },
}

impl ImportError {
    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Fetch { .. } | ImportError::ConflictQuery { .. } | ImportError::Store { .. } => {
                "An unexpected error occurred. Refresh the page and try again.".to_string()
            }
            ImportError::Upload { file_name, .. } => {
                format!("There was an error uploading \"{}\". Please try again.", file_name)
            }
            ImportError::FolderCreation { name, .. } => {
                format!("There was an error creating the folder \"{}\". Please try again.", name)
            }
            ImportError::NameCollision { code, name } => match code {
                CollisionCode::DropboxFileExists => format!("A file named \"{}\" already exists here.", name),
                CollisionCode::DropboxMoveConflict => {
                    format!("The destination already contains a file named \"{}\".", name)
                }
                CollisionCode::DropboxUnarchiveConflict => {
                    format!("Can't restore \"{}\": a file with that name already exists.", name)
                }
            },
            ImportError::DestinationUnavailable { .. } => {
                "The selected folder is no longer available. Choose another folder.".to_string()
            }
            ImportError::CorruptHierarchy { .. } => {
                "The folder structure could not be loaded. Contact support.".to_string()
            }
            ImportError::Busy => "Wait for the current upload to finish.".to_string(),
        }
    }
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { message } => write!(f, "Fetch failed: {message}"),
            Self::ConflictQuery { file_name, message } => {
                write!(f, "Conflict lookup for '{file_name}' failed: {message}")
            }
            Self::Upload {
                file_name,
                attempts,
                message,
            } => write!(f, "Upload of '{file_name}' failed after {attempts} attempts: {message}"),
            Self::FolderCreation { name, message } => write!(f, "Creating folder '{name}' failed: {message}"),
            Self::NameCollision { code, name } => write!(f, "{}: '{name}'", code.as_str()),
            Self::DestinationUnavailable { folder_id } => write!(f, "Destination {folder_id} is unavailable"),
            Self::CorruptHierarchy { directory_id } => {
                write!(f, "Directory hierarchy is corrupt at {directory_id}")
            }
            Self::Busy => write!(f, "Another import is in progress"),
            Self::Store { message } => write!(f, "Store error: {message}"),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<TreeError> for ImportError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::Cycle { directory_id } => ImportError::CorruptHierarchy { directory_id },
        }
    }
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        ImportError::Store {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retryable() {
        assert!(StoreError::Transport("reset".into()).is_retryable());
        assert!(
            StoreError::Http {
                status: 503,
                message: "busy".into()
            }
            .is_retryable()
        );
        assert!(
            !StoreError::Http {
                status: 404,
                message: "gone".into()
            }
            .is_retryable()
        );
        assert!(!StoreError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_collision_code_serialization() {
        let json = serde_json::to_string(&CollisionCode::DropboxMoveConflict).unwrap();
        assert_eq!(json, r#""DROPBOX_MOVE_CONFLICT""#);
        assert_eq!(CollisionCode::DropboxUnarchiveConflict.as_str(), "DROPBOX_UNARCHIVE_CONFLICT");
    }

    #[test]
    fn test_tree_error_converts_to_corrupt_hierarchy() {
        let err: ImportError = TreeError::Cycle {
            directory_id: RecordId::from("d1"),
        }
        .into();
        assert_eq!(
            err,
            ImportError::CorruptHierarchy {
                directory_id: RecordId::from("d1")
            }
        );
    }

    #[test]
    fn test_import_error_tagged_serialization() {
        let err = ImportError::Upload {
            file_name: "a.png".into(),
            attempts: 3,
            message: "HTTP 500".into(),
        };
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["type"], "upload");
        assert_eq!(value["attempts"], 3);
    }

    #[test]
    fn test_user_message_mentions_file() {
        let err = ImportError::NameCollision {
            code: CollisionCode::DropboxFileExists,
            name: "notes.txt".into(),
        };
        assert!(err.user_message().contains("notes.txt"));
    }
}
