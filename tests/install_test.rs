//! Tests for install-job admission, progress delivery, and cancellation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use muninn::{
    InstallConfig, InstallEvent, InstallManager, InstallTransport, JobState, MuninnError,
    ProgressEvent, ProgressStream, Result,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ============================================================================
// Scripted transport
// ============================================================================

/// Transport whose progress streams are fed by the test.
///
/// Each `push_stream()` queues one stream for the next `start()` call;
/// closing the returned sender is the success marker.
#[derive(Default)]
struct ScriptedTransport {
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<ProgressEvent>>>>,
}

impl ScriptedTransport {
    fn push_stream(&self) -> mpsc::UnboundedSender<Result<ProgressEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl InstallTransport for ScriptedTransport {
    async fn start(&self, _model: &str) -> Result<ProgressStream> {
        match self.streams.lock().unwrap().pop_front() {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(MuninnError::Http("connection refused".into())),
        }
    }
}

fn progress(bytes: u64, total: Option<u64>, phase: &str) -> ProgressEvent {
    ProgressEvent {
        bytes_completed: bytes,
        bytes_total: total,
        phase: phase.to_string(),
    }
}

fn manager_over(transport: Arc<ScriptedTransport>) -> InstallManager {
    InstallManager::new(transport, &InstallConfig::default())
}

/// Let spawned driver tasks run to quiescence on the current-thread runtime.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test(start_paused = true)]
async fn duplicate_admission_returns_existing_job() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let first = manager.request_install("llava").await;
    assert!(!first.is_duplicate());

    let mut events = manager.subscribe(first.handle());
    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    assert!(matches!(
        events.next().await,
        Some(InstallEvent::Progress { bytes_completed: 10, .. })
    ));

    let second = manager.request_install("llava").await;
    assert!(second.is_duplicate());
    // The duplicate handle exposes the existing job's last known progress.
    assert_eq!(second.handle().snapshot().bytes_completed, 10);

    // Exactly one active record for the name.
    assert_eq!(manager.active_models().await, vec!["llava".to_string()]);

    drop(tx);
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
}

#[tokio::test(start_paused = true)]
async fn terminal_job_frees_the_name() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let mut events = manager.subscribe(admission.handle());

    drop(tx); // success marker
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
    settle().await;
    assert!(manager.active_models().await.is_empty());

    // A fresh install for the same name is admitted.
    let _tx2 = transport.push_stream();
    let again = manager.request_install("llava").await;
    assert!(!again.is_duplicate());
}

#[tokio::test(start_paused = true)]
async fn independent_models_install_concurrently() {
    let transport = Arc::new(ScriptedTransport::default());
    let _tx_a = transport.push_stream();
    let _tx_b = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    assert!(!manager.request_install("llava").await.is_duplicate());
    assert!(!manager.request_install("qwen2.5").await.is_duplicate());

    let mut active = manager.active_models().await;
    active.sort();
    assert_eq!(active, vec!["llava".to_string(), "qwen2.5".to_string()]);
}

// ============================================================================
// Progress delivery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn progress_is_throttled_to_latest_and_monotonic() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let handle = admission.handle().clone();
    let mut events = manager.subscribe(&handle);

    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    let first = events.next().await.unwrap();
    assert!(matches!(first, InstallEvent::Progress { bytes_completed: 10, .. }));

    // A burst inside one throttle interval collapses to the last event.
    for bytes in [20, 30, 40, 50] {
        tx.send(Ok(progress(bytes, Some(100), "pulling"))).unwrap();
    }
    let second = events.next().await.unwrap();
    assert!(matches!(second, InstallEvent::Progress { bytes_completed: 50, .. }));

    drop(tx);
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
    // Exactly one terminal notification; the stream then ends.
    assert_eq!(events.next().await, None);
}

#[tokio::test(start_paused = true)]
async fn progress_bytes_never_decrease() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let mut events = manager.subscribe(admission.handle());

    // A transport hiccup reports a lower byte count mid-stream.
    for bytes in [10, 50, 30, 70] {
        tx.send(Ok(progress(bytes, Some(100), "pulling"))).unwrap();
    }
    drop(tx);

    let mut last = 0;
    let mut terminals = 0;
    while let Some(event) = events.next().await {
        match event {
            InstallEvent::Progress { bytes_completed, .. } => {
                assert!(bytes_completed >= last);
                last = bytes_completed;
            }
            _ => terminals += 1,
        }
    }
    assert_eq!(terminals, 1);
    assert_eq!(admission.handle().snapshot().bytes_completed, 70);
}

#[tokio::test(start_paused = true)]
async fn late_subscription_yields_terminal_only() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    drop(tx);
    settle().await;

    let mut events = manager.subscribe(admission.handle());
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
    assert_eq!(events.next().await, None);
}

// ============================================================================
// Failure
// ============================================================================

#[tokio::test(start_paused = true)]
async fn failure_marker_terminates_job_with_reason() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let mut events = manager.subscribe(admission.handle());

    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    tx.send(Err(MuninnError::Stream("disk full".into()))).unwrap();

    let mut terminal = None;
    while let Some(event) = events.next().await {
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    match terminal {
        Some(InstallEvent::Failed { reason }) => assert!(reason.contains("disk full")),
        other => panic!("unexpected terminal: {other:?}"),
    }
    assert_eq!(admission.handle().snapshot().state, JobState::Failed);
}

#[tokio::test(start_paused = true)]
async fn transport_start_error_fails_the_job() {
    // No scripted stream queued: start() errors.
    let transport = Arc::new(ScriptedTransport::default());
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let mut events = manager.subscribe(admission.handle());

    assert!(matches!(
        events.next().await,
        Some(InstallEvent::Failed { .. })
    ));
    assert_eq!(events.next().await, None);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cancel_reaches_cancelled_within_grace() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let handle = admission.handle().clone();
    let mut events = manager.subscribe(&handle);

    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    assert!(matches!(
        events.next().await,
        Some(InstallEvent::Progress { .. })
    ));

    handle.cancel();
    assert!(handle.snapshot().cancel_requested);

    // The transport never acknowledges (stream stays open); the grace
    // timeout forces the transition.
    let mut terminal = None;
    while let Some(event) = events.next().await {
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    assert_eq!(terminal, Some(InstallEvent::Cancelled));
    assert_eq!(handle.snapshot().state, JobState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn cancel_is_idempotent_and_noop_on_terminal() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let handle = admission.handle().clone();
    let mut events = manager.subscribe(&handle);

    drop(tx); // completes immediately
    assert_eq!(events.next().await, Some(InstallEvent::Completed));
    settle().await;

    // Cancelling a completed job does not alter its terminal state.
    handle.cancel();
    handle.cancel();
    assert_eq!(handle.snapshot().state, JobState::Completed);
    assert!(!handle.snapshot().cancel_requested);

    // By-name cancellation of a retired job is a no-op too.
    assert!(!manager.cancel_model("llava").await);
}

#[tokio::test(start_paused = true)]
async fn cancel_by_name_reaches_live_job() {
    let transport = Arc::new(ScriptedTransport::default());
    let _tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    assert!(manager.cancel_model("llava").await);

    let mut events = manager.subscribe(admission.handle());
    let mut terminal = None;
    while let Some(event) = events.next().await {
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    assert_eq!(terminal, Some(InstallEvent::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn no_progress_after_cancellation_acknowledged() {
    let transport = Arc::new(ScriptedTransport::default());
    let tx = transport.push_stream();
    let manager = manager_over(Arc::clone(&transport));

    let admission = manager.request_install("llava").await;
    let handle = admission.handle().clone();
    let mut events = manager.subscribe(&handle);

    tx.send(Ok(progress(10, Some(100), "pulling"))).unwrap();
    assert!(matches!(
        events.next().await,
        Some(InstallEvent::Progress { .. })
    ));

    handle.cancel();
    // Progress arriving after cancellation is ignored.
    let _ = tx.send(Ok(progress(90, Some(100), "pulling")));

    let mut saw_late_progress = false;
    let mut terminal = None;
    while let Some(event) = events.next().await {
        match event {
            InstallEvent::Progress { bytes_completed, .. } if bytes_completed > 10 => {
                saw_late_progress = true;
            }
            event if event.is_terminal() => terminal = Some(event),
            _ => {}
        }
    }
    assert!(!saw_late_progress);
    assert_eq!(terminal, Some(InstallEvent::Cancelled));
    assert_eq!(handle.snapshot().bytes_completed, 10);
}
