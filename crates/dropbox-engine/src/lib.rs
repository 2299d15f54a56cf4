// Deny unused code to catch dead code early
#![deny(unused)]
// Warn on unused dependencies
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::sync::Arc when Arc is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

//! Hierarchical file-drop import for the project Dropbox.
//!
//! Rebuilds the folder hierarchy from the flat directory list, maps dropped
//! folder trees onto it, detects name collisions, lets the user decide how
//! to resolve them, and uploads with bounded retry and progress events.
//!
//! Entry point is [`ImportSession`], generic over an [`AssetStore`].

pub mod config;
pub mod errors;
pub mod events;
pub mod file_ops;
pub mod materializer;
pub mod path_index;
pub mod planner;
mod poison;
pub mod prompt;
pub mod session;
pub mod store;
pub mod tree;
pub mod types;
pub mod upload;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tree_test;

pub use config::{ImportConfig, StoreConfig};
pub use errors::{CollisionCode, ImportError, PromptError, StoreError, TreeError};
pub use events::{ChannelSink, EventSink, ImportEvent, LogSink, Notice, UploadProgress};
pub use planner::DropPlan;
pub use prompt::{ChannelResolver, ConflictDecision, ConflictRequest, ConflictResolver, FixedResolver};
pub use session::{DirectorySnapshot, ImportSession, ImportSummary};
pub use store::{AssetStore, HttpAssetStore, InMemoryAssetStore};
pub use types::{AssetScope, Destination, DirectoryRecord, DroppedFile, FileRecord, NameMatch, RecordId};
