//! Delayed and immediate cancellation of in-flight calls.
//!
//! An [`AbortScheduler`] owns a [`CancellationToken`] and at most one pending
//! timer. `schedule` arms (or re-arms) the timer, `clear` disarms it without
//! cancelling, and `kill` cancels right away. Cancelling is one-way: once the
//! token fires it stays fired, and later `kill` calls do nothing.
//!
//! # Example
//!
//! ```rust
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! use replayfetch::abort::AbortScheduler;
//!
//! let scheduler = AbortScheduler::create(Duration::from_secs(5), false);
//! scheduler.schedule(Some(Duration::from_millis(10)), Some("too slow"));
//! scheduler.signal().cancelled().await;
//! assert_eq!(scheduler.reason().as_deref(), Some("too slow"));
//! # });
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reason recorded when the per-call timeout fires.
pub const TIMEOUT_REASON: &str = "Request timeout exceeded";
/// Reason recorded when a caller cancels by hand.
pub const CANCEL_REASON: &str = "Request cancelled";

type ReasonSlot = Arc<Mutex<Option<String>>>;

/// A cancellation token plus the reason its scheduler recorded when firing.
///
/// Schedulers hand these out through [`AbortScheduler::abort_signal`]. A bare
/// [`CancellationToken`] converts into one with an empty reason.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
    reason: ReasonSlot,
}

impl AbortSignal {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Why the signal fired, if its scheduler recorded a reason.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

impl From<CancellationToken> for AbortSignal {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(Mutex::new(None)),
        }
    }
}

struct Inner {
    token: CancellationToken,
    timeout: Duration,
    default_reason: String,
    reason: ReasonSlot,
    parent_reason: Option<ReasonSlot>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn kill(&self, reason: Option<&str>) -> bool {
        let mut slot = self.reason.lock();
        if self.token.is_cancelled() {
            return false;
        }
        let reason = reason.unwrap_or(&self.default_reason).to_string();
        debug!(reason = %reason, "Aborting request");
        *slot = Some(reason);
        self.token.cancel();
        true
    }
}

/// Arms, disarms and fires a cancellation signal. Clones share state.
#[derive(Clone)]
pub struct AbortScheduler {
    inner: Arc<Inner>,
}

impl AbortScheduler {
    /// Create a scheduler over a fresh token.
    ///
    /// With `auto_start` the timer is armed immediately for `timeout`;
    /// otherwise nothing fires until [`schedule`](Self::schedule) is called.
    pub fn create(timeout: Duration, auto_start: bool) -> Self {
        Self::from_token(CancellationToken::new(), None, timeout, auto_start)
    }

    /// Like [`create`](Self::create), but the token is a child of `parent`:
    /// cancelling `parent` cancels this scheduler's signal too, while this
    /// scheduler's timer never touches `parent`. When `parent` fires, its
    /// recorded reason becomes this scheduler's reason.
    pub fn linked(parent: &AbortSignal, timeout: Duration, auto_start: bool) -> Self {
        Self::from_token(
            parent.token.child_token(),
            Some(Arc::clone(&parent.reason)),
            timeout,
            auto_start,
        )
    }

    fn from_token(
        token: CancellationToken,
        parent_reason: Option<ReasonSlot>,
        timeout: Duration,
        auto_start: bool,
    ) -> Self {
        let scheduler = Self {
            inner: Arc::new(Inner {
                token,
                timeout,
                default_reason: TIMEOUT_REASON.to_string(),
                reason: Arc::new(Mutex::new(None)),
                parent_reason,
                timer: Mutex::new(None),
            }),
        };
        if auto_start {
            scheduler.schedule(None, None);
        }
        scheduler
    }

    /// The signal to hand to the guarded operation.
    pub fn signal(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// The signal together with this scheduler's reason slot, for linking
    /// another scheduler under this one.
    pub fn abort_signal(&self) -> AbortSignal {
        AbortSignal {
            token: self.inner.token.clone(),
            reason: Arc::clone(&self.inner.reason),
        }
    }

    /// Arm a one-shot cancellation after `timeout` (default: the creation
    /// timeout). Replaces any pending timer.
    ///
    /// Requires a running tokio runtime; without one the call is a no-op.
    pub fn schedule(&self, timeout: Option<Duration>, reason: Option<&str>) {
        let delay = timeout.unwrap_or(self.inner.timeout);
        let reason = reason.map(str::to_string);

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No tokio runtime available, abort timer not armed");
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            inner.kill(reason.as_deref());
        });

        if let Some(previous) = self.inner.timer.lock().replace(task) {
            previous.abort();
        }
    }

    /// Cancel now. Returns `true` only for the call that actually fired.
    pub fn kill(&self, reason: Option<&str>) -> bool {
        self.inner.kill(reason)
    }

    /// Disarm the pending timer, if any, without cancelling.
    pub fn clear(&self) {
        if let Some(task) = self.inner.timer.lock().take() {
            task.abort();
        }
    }

    /// Whether a timer is pending.
    pub fn is_armed(&self) -> bool {
        self.inner
            .timer
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Why the signal fired: this scheduler's own reason, else the one its
    /// parent recorded. `None` if it has not fired or nobody recorded one.
    pub fn reason(&self) -> Option<String> {
        let own = self.inner.reason.lock().clone();
        own.or_else(|| {
            self.inner
                .parent_reason
                .as_ref()
                .and_then(|slot| slot.lock().clone())
        })
    }

    /// Scope guard that disarms the timer when dropped.
    pub fn guard(&self) -> TimerGuard<'_> {
        TimerGuard { scheduler: self }
    }
}

/// Disarms its scheduler's timer on drop, so every exit path of the guarded
/// scope releases the timer exactly once.
pub struct TimerGuard<'a> {
    scheduler: &'a AbortScheduler,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.clear();
    }
}
