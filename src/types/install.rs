//! Install-job progress, state machine, and event types.

use serde::{Deserialize, Serialize};

/// One progress report from the install transport.
///
/// `bytes_completed` is cumulative for the whole transfer. `bytes_total`
/// may be absent while the transport has not yet resolved the full size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Cumulative bytes transferred so far.
    pub bytes_completed: u64,
    /// Total expected bytes, when known.
    pub bytes_total: Option<u64>,
    /// Transport-reported phase label (e.g. `"pulling manifest"`).
    pub phase: String,
}

/// Install-job lifecycle states.
///
/// `Requested → Streaming → {Completed, Failed, Cancelled}`; the absence
/// of a job record for a model name is the idle state. Terminal records
/// are retired from the active-job index, freeing the name for a future
/// install attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Admission passed; no progress received yet.
    Requested,
    /// Progress events are arriving.
    Streaming,
    /// Transfer finished successfully.
    Completed,
    /// Transfer failed; the snapshot carries the reason.
    Failed,
    /// Transfer cancelled by the user.
    Cancelled,
}

impl JobState {
    /// Whether the state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Point-in-time view of an install job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Target model name (the job identity).
    pub model: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Cumulative bytes transferred; non-decreasing over the job's life.
    pub bytes_completed: u64,
    /// Total expected bytes, when known.
    pub bytes_total: Option<u64>,
    /// Last transport-reported phase label.
    pub phase: String,
    /// Whether cancellation has been requested.
    pub cancel_requested: bool,
    /// Failure reason, set only in the `Failed` state.
    pub failure: Option<String>,
}

impl JobSnapshot {
    pub(crate) fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            state: JobState::Requested,
            bytes_completed: 0,
            bytes_total: None,
            phase: String::new(),
            cancel_requested: false,
            failure: None,
        }
    }

    /// The terminal event for this snapshot, if it is in a terminal state.
    pub(crate) fn terminal_event(&self) -> Option<InstallEvent> {
        match self.state {
            JobState::Completed => Some(InstallEvent::Completed),
            JobState::Failed => Some(InstallEvent::Failed {
                reason: self.failure.clone().unwrap_or_default(),
            }),
            JobState::Cancelled => Some(InstallEvent::Cancelled),
            JobState::Requested | JobState::Streaming => None,
        }
    }

    /// The progress event for this snapshot.
    pub(crate) fn progress_event(&self) -> InstallEvent {
        InstallEvent::Progress {
            bytes_completed: self.bytes_completed,
            bytes_total: self.bytes_total,
            phase: self.phase.clone(),
        }
    }
}

/// Consumer-facing install notification.
///
/// A subscription yields zero or more `Progress` events (throttled,
/// non-decreasing in `bytes_completed`) followed by exactly one terminal
/// event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstallEvent {
    /// Throttled progress update.
    Progress {
        /// Cumulative bytes transferred.
        bytes_completed: u64,
        /// Total expected bytes, when known.
        bytes_total: Option<u64>,
        /// Last transport-reported phase label.
        phase: String,
    },
    /// The install finished successfully.
    Completed,
    /// The install failed; `reason` is an opaque transport message.
    Failed {
        /// Opaque failure description.
        reason: String,
    },
    /// The install was cancelled by the user.
    Cancelled,
}

impl InstallEvent {
    /// Whether this event terminates the subscription.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstallEvent::Progress { .. })
    }
}
