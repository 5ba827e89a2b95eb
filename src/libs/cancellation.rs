//! Cooperative cancellation for blocking workflows.
//!
//! A [`CancelToken`] is a shared flag. Child tokens observe their parent, so
//! cancelling the root (Ctrl-C) reaches every job started below it, while a
//! deadline can cancel one job without touching the rest of the process.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::log_debug;

/// Shared cancellation flag with an optional parent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token cancelled either directly or through `self`.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Sleeps for `duration` in small slices, returning early (with `false`)
    /// as soon as the token is cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(100);
        let mut remaining = duration;
        while !remaining.is_zero() {
            if self.is_cancelled() {
                return false;
            }
            let step = remaining.min(SLICE);
            thread::sleep(step);
            remaining -= step;
        }
        !self.is_cancelled()
    }
}

/// Outcome of [`run_with_deadline`] when the job did not finish in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineOutcome {
    /// The deadline elapsed; the job's token has been cancelled.
    TimedOut,
    /// The parent token was cancelled while waiting.
    Cancelled,
}

/// Runs `work` on a worker thread, bounded by `timeout`.
///
/// The job receives a child of `parent`. On deadline the child is cancelled
/// and `TimedOut` is returned without waiting for the worker; the worker's
/// late result lands in the size-1 channel and is dropped.
pub fn run_with_deadline<T, F>(
    timeout: Duration,
    parent: &CancelToken,
    work: F,
) -> Result<T, DeadlineOutcome>
where
    T: Send + 'static,
    F: FnOnce(CancelToken) -> T + Send + 'static,
{
    let token = parent.child();
    let (sender, receiver) = mpsc::sync_channel(1);
    let worker_token = token.clone();
    thread::spawn(move || {
        let _ = sender.try_send(work(worker_token));
    });

    let poll = Duration::from_millis(200);
    let mut waited = Duration::ZERO;
    loop {
        match receiver.recv_timeout(poll) {
            Ok(value) => return Ok(value),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                // The worker panicked before sending anything.
                token.cancel();
                return Err(DeadlineOutcome::Cancelled);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        waited += poll;
        if parent.is_cancelled() {
            token.cancel();
            return Err(DeadlineOutcome::Cancelled);
        }
        if waited >= timeout {
            log_debug!("[Deadline] job exceeded {:?}, cancelling", timeout);
            token.cancel();
            return Err(DeadlineOutcome::TimedOut);
        }
    }
}

/// Starts the Ctrl-C watcher and returns the root token it cancels.
///
/// The watcher runs `tokio::signal::ctrl_c` on a current-thread runtime in a
/// background thread. If the runtime can't be built the process keeps the
/// default SIGINT behaviour.
pub fn install_interrupt_handler() -> CancelToken {
    let root = CancelToken::new();
    let token = root.clone();
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!("could not start interrupt watcher: {}", e);
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling");
                token.cancel();
            }
        });
    });
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_observes_parent() {
        let root = CancelToken::new();
        let child = root.child();
        assert!(!child.is_cancelled());
        root.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancelling_child_leaves_parent_alone() {
        let root = CancelToken::new();
        let child = root.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        assert!(!token.sleep(Duration::from_secs(5)));
    }

    #[test]
    fn deadline_returns_result_of_fast_job() {
        let root = CancelToken::new();
        let value = run_with_deadline(Duration::from_secs(5), &root, |_| 42);
        assert_eq!(value, Ok(42));
    }

    #[test]
    fn deadline_cancels_slow_job() {
        let root = CancelToken::new();
        let outcome = run_with_deadline(Duration::from_millis(300), &root, |token| {
            token.sleep(Duration::from_secs(30));
        });
        assert_eq!(outcome, Err(DeadlineOutcome::TimedOut));
        assert!(!root.is_cancelled());
    }

    #[test]
    fn deadline_gives_up_on_job_that_ignores_its_token() {
        let root = CancelToken::new();
        let started = std::time::Instant::now();
        let outcome = run_with_deadline(Duration::from_millis(200), &root, |_| {
            thread::sleep(Duration::from_secs(2));
            1
        });
        assert_eq!(outcome, Err(DeadlineOutcome::TimedOut));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn parent_cancelled_while_waiting() {
        let root = CancelToken::new();
        let interrupt = root.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupt.cancel();
        });
        let outcome = run_with_deadline(Duration::from_secs(10), &root, |_| {
            thread::sleep(Duration::from_secs(2));
        });
        assert_eq!(outcome, Err(DeadlineOutcome::Cancelled));
    }

    #[test]
    fn already_cancelled_parent_reaches_the_job() {
        let root = CancelToken::new();
        root.cancel();
        let outcome = run_with_deadline(Duration::from_secs(10), &root, |token| token.is_cancelled());
        assert!(matches!(outcome, Ok(true) | Err(DeadlineOutcome::Cancelled)));
    }
}
