//! Reusable, cancellable request handles.
//!
//! A [`CancellableRequest`] keeps a base payload and one shared cancellation
//! signal. Each [`exe`](CancellableRequest::exe) merges a per-call override
//! over the base, re-arms the shared timer and sends the request;
//! [`cancel`](CancellableRequest::cancel) aborts whatever is in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::abort::{AbortScheduler, CANCEL_REASON, TIMEOUT_REASON};
use crate::executor::{Failure, RequestExecutor, Success};
use crate::request::RequestPayload;

pub struct CancellableRequest {
    executor: Arc<RequestExecutor>,
    base: RequestPayload,
    timeout: Duration,
    scheduler: Mutex<AbortScheduler>,
    cancelled: AtomicBool,
}

impl CancellableRequest {
    pub fn new(executor: Arc<RequestExecutor>, base: RequestPayload) -> Self {
        let timeout = base.timeout.unwrap_or(executor.defaults().timeout);
        Self {
            executor,
            base,
            timeout,
            scheduler: Mutex::new(AbortScheduler::create(timeout, false)),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Send the base payload merged with `overrides` (override wins).
    ///
    /// A signal spent by an earlier timeout is replaced with a fresh one; a
    /// signal spent by [`cancel`](Self::cancel) is not, so every call after a
    /// cancel fails with an abort.
    pub async fn exe(&self, overrides: RequestPayload) -> Result<Success, Failure> {
        let scheduler = {
            let mut slot = self.scheduler.lock();
            if slot.is_cancelled() && !self.cancelled.load(Ordering::SeqCst) {
                debug!("Re-arming spent request signal");
                *slot = AbortScheduler::create(self.timeout, false);
            }
            slot.clone()
        };

        let mut payload = self.base.merged_with(&overrides);
        let timeout = payload.timeout.unwrap_or(self.timeout);
        payload.options.signal = Some(scheduler.abort_signal());

        scheduler.schedule(Some(timeout), Some(TIMEOUT_REASON));
        let _timer = scheduler.guard();
        self.executor.request(payload).await
    }

    /// Abort the in-flight call, if any, and every later one.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let scheduler = self.scheduler.lock().clone();
        scheduler.clear();
        scheduler.kill(Some(CANCEL_REASON));
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The current shared signal.
    pub fn signal(&self) -> CancellationToken {
        self.scheduler.lock().signal()
    }
}
