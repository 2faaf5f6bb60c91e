#[cfg(test)]
mod context_test;

use crossbeam_channel::{Sender, unbounded};
use log::{error, trace};
use shared::error::{Error, Result};

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

type Task = Box<dyn FnOnce(&ContextToken) + Send + 'static>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Proof that code runs on a given [`ExecutionContext`]. Only the context
/// thread creates one and hands it to every task it runs.
#[derive(Debug)]
pub struct ContextToken {
    context_id: u64,
    name: String,
}

impl ContextToken {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct Inner {
    id: u64,
    name: String,
    tx: Option<Sender<Task>>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // disconnects the queue, the thread drains what is left and exits
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if thread::current().id() != self.thread_id && handle.join().is_err() {
                error!("execution context {} thread panicked", self.name);
            }
        }
    }
}

/// A named thread running posted tasks one at a time, in posting order.
/// Clones refer to the same thread, which stops once the last clone is
/// dropped.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.inner.name)
            .finish()
    }
}

impl ExecutionContext {
    pub fn new(name: &str) -> Result<Self> {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = unbounded::<Task>();

        let token = ContextToken {
            context_id: id,
            name: name.to_owned(),
        };
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                trace!("execution context {} started", token.name);
                for task in rx.iter() {
                    if catch_unwind(AssertUnwindSafe(|| task(&token))).is_err() {
                        error!("task panicked on execution context {}", token.name);
                    }
                }
                trace!("execution context {} stopped", token.name);
            })?;

        Ok(ExecutionContext {
            inner: Arc::new(Inner {
                id,
                name: name.to_owned(),
                tx: Some(tx),
                thread_id: handle.thread().id(),
                handle: Some(handle),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Whether `token` was issued by this context.
    pub fn owns(&self, token: &ContextToken) -> bool {
        token.context_id == self.inner.id
    }

    /// Panics unless `token` was issued by this context.
    pub fn check(&self, token: &ContextToken) {
        assert!(
            self.owns(token),
            "called on execution context {} instead of {}",
            token.name,
            self.inner.name
        );
    }

    /// Queues `task` without waiting for it.
    pub fn post<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&ContextToken) + Send + 'static,
    {
        let tx = self
            .inner
            .tx
            .as_ref()
            .ok_or_else(|| Error::ErrContextClosed(self.inner.name.clone()))?;
        tx.send(Box::new(task))
            .map_err(|_| Error::ErrContextClosed(self.inner.name.clone()))
    }

    /// Runs `task` on this context and waits for its result. Issuing it
    /// from the context itself would never return, so that panics.
    pub fn invoke<F, R>(&self, task: F) -> Result<R>
    where
        F: FnOnce(&ContextToken) -> R + Send + 'static,
        R: Send + 'static,
    {
        assert!(
            !self.is_current(),
            "blocking invoke issued on its own execution context {}",
            self.inner.name
        );

        let (result_tx, result_rx) = crossbeam_channel::bounded(1);
        self.post(move |token| {
            let _ = result_tx.send(task(token));
        })?;

        result_rx
            .recv()
            .map_err(|_| Error::ErrContextTaskPanicked(self.inner.name.clone()))
    }
}
