//! Operation results
//!
//! Every card operation returns an [`OperationResult`]: a status flag, an
//! ordered human-readable log, and a single summarizing error message when
//! something went wrong. The struct serializes to the JSON shape the front
//! end consumes.

use serde::Serialize;

/// Outcome flag for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Error,
}

/// Structured outcome of one card operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub status: OperationStatus,
    /// Progress/audit lines in unit order
    pub log: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-block dump, indexed by block number; None marks an unread block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump: Option<Vec<Option<String>>>,
    /// Blocks successfully cleared (best-effort wipe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared: Option<u32>,
    /// Blocks that failed to clear (best-effort wipe)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<u32>,
    /// Lock number read from the card
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_no: Option<u8>,
    /// Next lock number when auto-increment was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_lock_no: Option<u32>,
}

impl OperationResult {
    pub fn new() -> Self {
        Self {
            status: OperationStatus::Success,
            log: Vec::new(),
            error: None,
            dump: None,
            cleared: None,
            failed: None,
            lock_no: None,
            next_lock_no: None,
        }
    }

    /// Append a progress line
    pub fn log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    /// Mark the operation failed with a summarizing message
    ///
    /// The log collected so far is kept for the audit trail.
    pub fn fail(mut self, error: impl ToString) -> Self {
        self.status = OperationStatus::Error;
        self.error = Some(error.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }
}

impl Default for OperationResult {
    fn default() -> Self {
        Self::new()
    }
}
