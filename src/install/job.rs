//! Install-job handle and shared state.

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::JobSnapshot;

/// State shared between the job driver, the manager's admission map, and
/// every handle issued for the job.
///
/// The driver task is the only writer of terminal states; `progress`
/// retains the final snapshot, so handles and late subscribers observe
/// the terminal state even after the record is retired from the
/// active-job map.
pub(crate) struct JobShared {
    pub(crate) model: String,
    pub(crate) progress: watch::Sender<JobSnapshot>,
    pub(crate) cancel: watch::Sender<bool>,
}

impl JobShared {
    pub(crate) fn new(model: &str) -> Arc<Self> {
        let (progress, _) = watch::channel(JobSnapshot::new(model));
        let (cancel, _) = watch::channel(false);
        Arc::new(Self {
            model: model.to_string(),
            progress,
            cancel,
        })
    }
}

/// Handle to one install job.
///
/// Cheap to clone; all clones observe the same job. Handles stay valid
/// after the job reaches a terminal state.
#[derive(Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub(crate) fn new(shared: Arc<JobShared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<JobShared> {
        &self.shared
    }

    /// The target model name (the job identity).
    pub fn model(&self) -> &str {
        &self.shared.model
    }

    /// The job's last known progress.
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.progress.borrow().clone()
    }

    /// Whether the job has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.shared.progress.borrow().state.is_terminal()
    }

    /// Request cancellation.
    ///
    /// Best-effort and idempotent: the flag signals the driver to abort
    /// the transfer at its next checkpoint. Against a job already in a
    /// terminal state this is a no-op.
    pub fn cancel(&self) {
        self.shared.progress.send_modify(|snap| {
            if !snap.state.is_terminal() {
                snap.cancel_requested = true;
            }
        });
        self.shared.cancel.send_replace(true);
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.snapshot();
        f.debug_struct("JobHandle")
            .field("model", &self.shared.model)
            .field("state", &snap.state)
            .field("bytes_completed", &snap.bytes_completed)
            .finish()
    }
}
