//! Pipeline stages and the outbound progress event stream
//!
//! Events are fire-and-forget. A full or closed channel drops the event and
//! the pipeline carries on; sequence numbers still advance so consumers can
//! spot gaps.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use codeforge_utils::logging::log_transition;

/// State of one pipeline run.
///
/// `Succeeded` and `Failed` are terminal and exactly one of them is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Generating,
    Validating,
    Fixing,
    Succeeded,
    Failed,
}

impl Stage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Fixing => "fixing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Edges of the pipeline state machine. Any live stage may fail.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        match (self, next) {
            (s, Self::Failed) => !s.is_terminal(),
            (Self::Planning | Self::Fixing, Self::Generating)
            | (Self::Generating, Self::Validating)
            | (Self::Validating, Self::Succeeded | Self::Fixing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle notification for a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub request_id: String,
    /// Strictly increasing per request, starting at 0
    pub seq: u64,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Sending half of the progress stream.
///
/// Cloning is cheap; one emitter can serve many concurrent requests since
/// every event carries its request id.
#[derive(Debug, Clone, Default)]
pub struct ProgressEmitter {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressEmitter {
    /// Bounded stream; events beyond `capacity` unread are dropped
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    #[must_use]
    pub fn from_sender(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Emitter that discards everything
    #[must_use]
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Returns whether the event was queued
    pub fn emit(&self, event: ProgressEvent) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(e) => {
                trace!(error = %e, "Progress event dropped");
                false
            }
        }
    }
}

/// Per-run view of the emitter that stamps ids and tracks the current stage
#[derive(Debug)]
pub(crate) struct RunProgress {
    emitter: ProgressEmitter,
    request_id: String,
    next_seq: u64,
    stage: Option<Stage>,
}

impl RunProgress {
    pub(crate) fn new(emitter: ProgressEmitter, request_id: &str) -> Self {
        Self {
            emitter,
            request_id: request_id.to_string(),
            next_seq: 0,
            stage: None,
        }
    }

    pub(crate) const fn stage(&self) -> Option<Stage> {
        self.stage
    }

    /// Move to `next`, log the transition and announce it
    pub(crate) fn enter(&mut self, next: Stage, message: impl Into<String>) {
        let from = self.stage.map_or("start", |s| s.as_str());
        let allowed = match self.stage {
            None => matches!(next, Stage::Planning | Stage::Failed),
            Some(current) => current.can_transition_to(next),
        };
        if !allowed {
            tracing::warn!(
                request_id = %self.request_id,
                from,
                to = next.as_str(),
                "Unexpected pipeline transition"
            );
        }
        log_transition(&self.request_id, from, next.as_str());
        self.stage = Some(next);
        self.notify(None, message);
    }

    /// Announce progress within the current stage
    pub(crate) fn notify(&mut self, chunk_index: Option<usize>, message: impl Into<String>) {
        let Some(stage) = self.stage else {
            return;
        };
        let event = ProgressEvent {
            request_id: self.request_id.clone(),
            seq: self.next_seq,
            stage,
            chunk_index,
            message: message.into(),
            timestamp: Utc::now(),
        };
        self.next_seq += 1;
        self.emitter.emit(event);
    }
}
