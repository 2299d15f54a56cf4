//! Conflict prompt state and the resolvers that answer it.
//!
//! ```text
//! Idle --open--> AwaitingDecision --Overwrite--> Overwritten
//!                                 --Skip-------> Skipped
//!                                 --Cancel-----> Idle
//! ```

use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::errors::PromptError;
use crate::types::FileRecord;

/// The user's answer to a conflict prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictDecision {
    /// Archive every duplicate, then upload all dropped files
    Overwrite,
    /// Upload only the files that don't collide
    Skip,
    /// Do nothing
    Cancel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PromptState {
    #[default]
    Idle,
    AwaitingDecision {
        duplicates: Vec<FileRecord>,
    },
    Overwritten,
    Skipped,
}

#[derive(Debug, Default)]
pub struct ConflictPrompt {
    state: PromptState,
}

impl ConflictPrompt {
    pub fn state(&self) -> &PromptState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, PromptState::AwaitingDecision { .. })
    }

    /// Opens the prompt for a new set of duplicates.
    pub fn open(&mut self, duplicates: Vec<FileRecord>) -> Result<(), PromptError> {
        if self.is_open() {
            return Err(PromptError::AlreadyOpen);
        }
        self.state = PromptState::AwaitingDecision { duplicates };
        Ok(())
    }

    /// Applies a decision and returns the duplicates it was made for.
    pub fn decide(&mut self, decision: ConflictDecision) -> Result<Vec<FileRecord>, PromptError> {
        let next = match decision {
            ConflictDecision::Overwrite => PromptState::Overwritten,
            ConflictDecision::Skip => PromptState::Skipped,
            ConflictDecision::Cancel => PromptState::Idle,
        };
        match std::mem::replace(&mut self.state, next) {
            PromptState::AwaitingDecision { duplicates } => Ok(duplicates),
            previous => {
                self.state = previous;
                Err(PromptError::NotOpen)
            }
        }
    }

    /// Returns an open prompt to Idle, as Cancel would. No-op otherwise.
    pub fn dismiss(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.state = PromptState::Idle;
        true
    }
}

/// Supplies the decision for a set of duplicates.
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, duplicates: &[FileRecord]) -> impl Future<Output = ConflictDecision> + Send;
}

/// Always answers the same way. Used by tooling and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub ConflictDecision);

impl ConflictResolver for FixedResolver {
    async fn resolve(&self, _duplicates: &[FileRecord]) -> ConflictDecision {
        self.0
    }
}

/// A pending question for whoever shows the prompt.
#[derive(Debug)]
pub struct ConflictRequest {
    pub duplicates: Vec<FileRecord>,
    pub reply: oneshot::Sender<ConflictDecision>,
}

/// Forwards each prompt over a channel and waits for the reply.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    tx: mpsc::Sender<ConflictRequest>,
}

impl ChannelResolver {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<ConflictRequest>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

impl ConflictResolver for ChannelResolver {
    async fn resolve(&self, duplicates: &[FileRecord]) -> ConflictDecision {
        let (reply, answer) = oneshot::channel();
        let request = ConflictRequest {
            duplicates: duplicates.to_vec(),
            reply,
        };
        if self.tx.send(request).await.is_err() {
            log::warn!("ChannelResolver: nobody is listening for prompts, cancelling");
            return ConflictDecision::Cancel;
        }
        answer.await.unwrap_or_else(|_| {
            log::debug!("ChannelResolver: prompt dismissed without an answer");
            ConflictDecision::Cancel
        })
    }
}
