//! Cancellation utilities
//!
//! `RequestHandle` is the caller-held token for one in-flight call. Its state
//! moves `Active -> Cancelled` or `Active -> Completed` exactly once; every
//! later transition attempt is a no-op.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;
const COMPLETED: u8 = 2;

/// Lifecycle state of a [`RequestHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Active,
    Cancelled,
    Completed,
}

type CancelHook = Box<dyn FnOnce() + Send + 'static>;

struct HandleInner {
    request_id: String,
    state: AtomicU8,
    token: CancellationToken,
    on_cancel: Mutex<Option<CancelHook>>,
}

/// A handle that can be used to cancel an in-flight one-shot or streaming call.
///
/// Cheap to clone; all clones share the same state. `cancel()` may be called
/// from any thread, any number of times.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<HandleInner>,
}

impl RequestHandle {
    pub(crate) fn new(request_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                request_id: request_id.into(),
                state: AtomicU8::new(ACTIVE),
                token: CancellationToken::new(),
                on_cancel: Mutex::new(None),
            }),
        }
    }

    /// Correlation id of the call (also used in log records).
    pub fn request_id(&self) -> &str {
        &self.inner.request_id
    }

    /// Request cancellation.
    ///
    /// Returns `true` when this call performed the `Active -> Cancelled`
    /// transition. The I/O task observing the handle drops its transport
    /// future (closing the connection) and nothing is delivered afterwards.
    pub fn cancel(&self) -> bool {
        if self
            .inner
            .state
            .compare_exchange(ACTIVE, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        tracing::debug!(request_id = %self.inner.request_id, "request cancelled");
        self.inner.token.cancel();
        let hook = self
            .inner
            .on_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    pub fn state(&self) -> HandleState {
        match self.inner.state.load(Ordering::Acquire) {
            ACTIVE => HandleState::Active,
            CANCELLED => HandleState::Cancelled,
            _ => HandleState::Completed,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == HandleState::Active
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == HandleState::Cancelled
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.inner.token.cancelled()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Claim the terminal delivery. Only the first caller (and only while the
    /// handle is still active) gets `true`.
    pub(crate) fn try_complete(&self) -> bool {
        let won = self
            .inner
            .state
            .compare_exchange(ACTIVE, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if won {
            // The cancel hook can never fire now; release what it captured.
            self.inner
                .on_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        won
    }

    /// Install a hook that runs once when `cancel()` wins the transition.
    ///
    /// If the handle was already cancelled the hook runs immediately; if it
    /// already completed the hook is dropped.
    pub(crate) fn on_cancel<F>(&self, hook: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let run_now = {
            let mut slot = self
                .inner
                .on_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match self.state() {
                HandleState::Active => {
                    *slot = Some(Box::new(hook));
                    None
                }
                HandleState::Cancelled => Some(hook),
                HandleState::Completed => None,
            }
        };
        if let Some(hook) = run_now {
            hook();
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("request_id", &self.inner.request_id)
            .field("state", &self.state())
            .finish()
    }
}

/// Cancels the wrapped handle when dropped, unless disarmed.
pub(crate) struct CancelOnDrop {
    handle: Option<RequestHandle>,
}

impl CancelOnDrop {
    pub(crate) fn new(handle: RequestHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub(crate) fn disarm(&mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
    }
}
