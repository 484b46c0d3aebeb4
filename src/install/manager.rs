//! Install-job admission, progress delivery, and cancellation.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::job::{JobHandle, JobShared};
use crate::telemetry;
use crate::traits::{InstallTransport, ProgressStream};
use crate::types::{InstallEvent, JobSnapshot, JobState, ProgressEvent};

/// Configuration for the install manager.
///
/// ```rust
/// # use muninn::InstallConfig;
/// # use std::time::Duration;
/// let config = InstallConfig::new().progress_interval(Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Minimum spacing between consumer-facing progress emissions.
    /// Default: 2 seconds.
    pub progress_interval: Duration,
    /// How long a cancelled transfer may take to acknowledge before the
    /// job is forced to `Cancelled`. Default: 5 seconds.
    pub cancel_grace: Duration,
    /// Buffered events per subscription. Default: 16.
    pub event_buffer: usize,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(2),
            cancel_grace: Duration::from_secs(5),
            event_buffer: 16,
        }
    }
}

impl InstallConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum spacing between progress emissions.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Set the cancellation acknowledgement grace period.
    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    /// Set the per-subscription event buffer size.
    pub fn event_buffer(mut self, n: usize) -> Self {
        self.event_buffer = n.max(1);
        self
    }
}

/// Outcome of an install admission check.
#[derive(Debug, Clone)]
pub enum Admission {
    /// A new job was created; the transfer runs in the background.
    Started(JobHandle),
    /// A job for this model is already in progress. The handle exposes
    /// its last known progress; no new job was started.
    Duplicate(JobHandle),
}

impl Admission {
    /// The job handle, whichever way admission went.
    pub fn handle(&self) -> &JobHandle {
        match self {
            Admission::Started(h) | Admission::Duplicate(h) => h,
        }
    }

    /// Whether admission was rejected because of a live job.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Admission::Duplicate(_))
    }
}

/// Finite, non-restartable sequence of install notifications.
pub type InstallEventStream = Pin<Box<dyn Stream<Item = InstallEvent> + Send>>;

/// Terminal outcome computed by the driver task.
enum Terminal {
    Completed,
    Failed(String),
    Cancelled,
}

impl Terminal {
    fn apply(&self, snap: &mut JobSnapshot) {
        match self {
            Terminal::Completed => snap.state = JobState::Completed,
            Terminal::Failed(reason) => {
                snap.state = JobState::Failed;
                snap.failure = Some(reason.clone());
            }
            Terminal::Cancelled => snap.state = JobState::Cancelled,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Terminal::Completed => "completed",
            Terminal::Failed(_) => "failed",
            Terminal::Cancelled => "cancelled",
        }
    }
}

/// Owns the lifecycle of "install model" operations.
///
/// Core invariant: at most one live job per model name, enforced by an
/// admission check-and-insert under a single lock on the job map.
/// Progress updates arrive on the driver task and only ever mutate the
/// existing job record; terminal records are retired from the map,
/// freeing the name for a future attempt while issued handles keep
/// observing the terminal state.
pub struct InstallManager {
    transport: Arc<dyn InstallTransport>,
    config: InstallConfig,
    jobs: Arc<Mutex<HashMap<String, Arc<JobShared>>>>,
}

impl InstallManager {
    /// Create a manager over the given transport.
    pub fn new(transport: Arc<dyn InstallTransport>, config: &InstallConfig) -> Self {
        Self {
            transport,
            config: config.clone(),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Admit an install request for `model`.
    ///
    /// Returns immediately; the transfer itself runs on a background
    /// task. A second request while a job for the same name is live is
    /// answered with [`Admission::Duplicate`] carrying the existing
    /// job's handle.
    pub async fn request_install(&self, model: &str) -> Admission {
        let mut jobs = self.jobs.lock().await;
        if let Some(shared) = jobs.get(model) {
            if !shared.progress.borrow().state.is_terminal() {
                debug!(model, "install already in progress");
                metrics::counter!(telemetry::INSTALL_ADMISSIONS_TOTAL, "outcome" => "duplicate")
                    .increment(1);
                return Admission::Duplicate(JobHandle::new(Arc::clone(shared)));
            }
        }

        let shared = JobShared::new(model);
        jobs.insert(model.to_string(), Arc::clone(&shared));
        self.spawn_driver(Arc::clone(&shared));
        info!(model, "install job admitted");
        metrics::counter!(telemetry::INSTALL_ADMISSIONS_TOTAL, "outcome" => "started").increment(1);
        Admission::Started(JobHandle::new(shared))
    }

    /// Request cancellation of the job for `model`, if one is live.
    ///
    /// Returns whether a live job was found. Idempotent; cancelling an
    /// already-terminal or unknown job is a no-op.
    pub async fn cancel_model(&self, model: &str) -> bool {
        let jobs = self.jobs.lock().await;
        match jobs.get(model) {
            Some(shared) => {
                JobHandle::new(Arc::clone(shared)).cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation through a handle. Best-effort, idempotent.
    pub fn cancel(&self, handle: &JobHandle) {
        handle.cancel();
    }

    /// Handle to the live job for `model`, if any.
    pub async fn job(&self, model: &str) -> Option<JobHandle> {
        let jobs = self.jobs.lock().await;
        jobs.get(model)
            .map(|shared| JobHandle::new(Arc::clone(shared)))
    }

    /// Names with a live job, in no particular order.
    pub async fn active_models(&self) -> Vec<String> {
        let jobs = self.jobs.lock().await;
        jobs.keys().cloned().collect()
    }

    /// Subscribe to a job's notifications.
    ///
    /// Yields throttled progress events (at most one per configured
    /// interval, the latest state at each boundary) followed by exactly
    /// one terminal event. Not restartable: a subscription created after
    /// termination yields only the terminal event.
    pub fn subscribe(&self, handle: &JobHandle) -> InstallEventStream {
        let mut rx = handle.shared().progress.subscribe();
        let interval = self.config.progress_interval;
        let (tx, out) = mpsc::channel(self.config.event_buffer);

        tokio::spawn(async move {
            let mut next_emit = Instant::now();

            // Deliver current state first: terminal-only for late
            // subscribers, latest progress for in-flight jobs.
            let snap = rx.borrow_and_update().clone();
            if let Some(term) = snap.terminal_event() {
                let _ = tx.send(term).await;
                return;
            }
            if snap.state == JobState::Streaming {
                if tx.send(snap.progress_event()).await.is_err() {
                    return;
                }
                next_emit = Instant::now() + interval;
            }

            loop {
                if rx.changed().await.is_err() {
                    return;
                }
                // Absorb updates until the throttle boundary; the last
                // one before the boundary is the one emitted. Terminal
                // states are delivered promptly.
                loop {
                    if rx.borrow().state.is_terminal() || Instant::now() >= next_emit {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep_until(next_emit) => {}
                        res = rx.changed() => {
                            if res.is_err() {
                                break;
                            }
                        }
                    }
                }

                let snap = rx.borrow_and_update().clone();
                if let Some(term) = snap.terminal_event() {
                    let _ = tx.send(term).await;
                    return;
                }
                if snap.state == JobState::Requested {
                    continue;
                }
                if tx.send(snap.progress_event()).await.is_err() {
                    return;
                }
                next_emit = Instant::now() + interval;
            }
        });

        Box::pin(ReceiverStream::new(out))
    }

    fn spawn_driver(&self, shared: Arc<JobShared>) {
        let transport = Arc::clone(&self.transport);
        let jobs = Arc::clone(&self.jobs);
        let grace = self.config.cancel_grace;

        tokio::spawn(async move {
            let mut cancel_rx = shared.cancel.subscribe();
            let terminal = drive(transport.as_ref(), &shared, &mut cancel_rx, grace).await;

            match &terminal {
                Terminal::Completed => info!(model = %shared.model, "install completed"),
                Terminal::Failed(reason) => {
                    warn!(model = %shared.model, reason = %reason, "install failed");
                }
                Terminal::Cancelled => info!(model = %shared.model, "install cancelled"),
            }
            metrics::counter!(telemetry::INSTALLS_TOTAL, "outcome" => terminal.outcome())
                .increment(1);

            // Exactly one terminal snapshot per job; subscribers each
            // deliver it once.
            shared.progress.send_modify(|snap| terminal.apply(snap));

            // Retire the record, freeing the name for a future attempt.
            // Only remove our own entry: admission may already have
            // replaced a terminal record with a fresh job.
            let mut map = jobs.lock().await;
            let is_ours = map
                .get(&shared.model)
                .is_some_and(|current| Arc::ptr_eq(current, &shared));
            if is_ours {
                map.remove(&shared.model);
            }
        });
    }
}

/// Consume the transport stream until a terminal condition.
async fn drive(
    transport: &dyn InstallTransport,
    shared: &JobShared,
    cancel_rx: &mut watch::Receiver<bool>,
    grace: Duration,
) -> Terminal {
    let mut stream = tokio::select! {
        biased;
        _ = cancel_requested(cancel_rx) => return Terminal::Cancelled,
        res = transport.start(&shared.model) => match res {
            Ok(stream) => stream,
            Err(e) => return Terminal::Failed(e.to_string()),
        },
    };

    loop {
        // Cancellation is checked before each progress application: once
        // the flag is set, no further progress reaches the job record.
        tokio::select! {
            biased;
            _ = cancel_requested(cancel_rx) => {
                // Give the transport a grace window to acknowledge; the
                // drop below aborts the transfer regardless.
                let _ = tokio::time::timeout(grace, drain(&mut stream)).await;
                return Terminal::Cancelled;
            }
            item = stream.next() => match item {
                Some(Ok(event)) => apply_progress(shared, event),
                Some(Err(e)) => return Terminal::Failed(e.to_string()),
                None => return Terminal::Completed,
            }
        }
    }
}

/// Apply one progress event to the job record.
///
/// Bytes are clamped non-decreasing; totals are replaced when reported.
fn apply_progress(shared: &JobShared, event: ProgressEvent) {
    shared.progress.send_modify(|snap| {
        if snap.state == JobState::Requested {
            snap.state = JobState::Streaming;
        }
        snap.bytes_completed = snap.bytes_completed.max(event.bytes_completed);
        if event.bytes_total.is_some() {
            snap.bytes_total = event.bytes_total;
        }
        snap.phase = event.phase;
    });
}

/// Resolve when cancellation has been requested.
async fn cancel_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender lives in JobShared, held by the driver; unreachable
            // in practice, but never resolve spuriously.
            std::future::pending::<()>().await;
        }
    }
}

/// Read the remainder of a cancelled transfer without applying progress.
async fn drain(stream: &mut ProgressStream) {
    while let Some(item) = stream.next().await {
        if item.is_err() {
            return;
        }
    }
}
