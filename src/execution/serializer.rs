//! Execution serializer
//!
//! A single FIFO queue drained by one dedicated thread. Every result delivery
//! (one-shot completions, stream frames, stream terminals) is submitted here,
//! so deliveries never run concurrently with each other and frames of one
//! session are delivered in arrival order. Submitting never blocks.
//!
//! Jobs carry a guard bound to the call's `RequestHandle`:
//! - `WhileActive`: skipped once the handle was cancelled or completed;
//! - `Complete`: runs only if it wins the `active -> completed` transition;
//! - `Unguarded`: always runs.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use once_cell::sync::OnceCell;
use tokio::sync::{mpsc, oneshot};

use crate::error::ClientError;
use crate::utils::cancel::RequestHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) enum Guard {
    WhileActive(RequestHandle),
    Complete(RequestHandle),
    Unguarded,
}

struct Envelope {
    guard: Guard,
    job: Job,
}

/// Ordered delivery queue. Cloning shares the same queue and worker.
#[derive(Clone)]
pub struct ExecutionSerializer {
    name: String,
    tx: mpsc::UnboundedSender<Envelope>,
}

static GLOBAL: OnceCell<ExecutionSerializer> = OnceCell::new();

impl ExecutionSerializer {
    /// Spawn a new queue with its own worker thread. The thread exits once
    /// every clone of the serializer has been dropped and the queue drained.
    pub fn new(name: impl Into<String>) -> Result<Self, ClientError> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let thread_name = name.clone();
        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Some(envelope) = rx.blocking_recv() {
                    run(&thread_name, envelope);
                }
                tracing::debug!(serializer = %thread_name, "execution serializer stopped");
            })
            .map_err(|e| {
                ClientError::InternalError(format!("Failed to spawn serializer thread: {e}"))
            })?;
        Ok(Self { name, tx })
    }

    /// The process-wide serializer shared by clients that are not given
    /// their own.
    pub fn global() -> Result<Self, ClientError> {
        GLOBAL
            .get_or_try_init(|| Self::new("siumai-exec-serializer"))
            .cloned()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue an unconditional job.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Guard::Unguarded, Box::new(job));
    }

    pub(crate) fn submit_guarded<F>(&self, guard: Guard, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(guard, Box::new(job));
    }

    /// Resolves once every job submitted before this call has run (or been
    /// skipped).
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.submit(move || {
            let _ = tx.send(());
        });
        let _ = rx.await;
    }

    fn enqueue(&self, guard: Guard, job: Job) {
        if self.tx.send(Envelope { guard, job }).is_err() {
            tracing::error!(serializer = %self.name, "execution serializer is gone; delivery dropped");
        }
    }
}

fn run(name: &str, envelope: Envelope) {
    let Envelope { guard, job } = envelope;
    let deliver = match &guard {
        Guard::WhileActive(handle) => handle.is_active(),
        Guard::Complete(handle) => handle.try_complete(),
        Guard::Unguarded => true,
    };
    if !deliver {
        if let Guard::WhileActive(handle) | Guard::Complete(handle) = &guard {
            tracing::trace!(request_id = handle.request_id(), "delivery dropped after cancellation");
        }
        return;
    }
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!(serializer = %name, "delivery callback panicked");
    }
}

impl fmt::Debug for ExecutionSerializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionSerializer")
            .field("name", &self.name)
            .finish()
    }
}
