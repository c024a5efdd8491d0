//! The execution engine covariant futures are layered on.
//!
//! This crate schedules nothing on its own. Every state machine and every
//! deferred continuation is handed to a [`Spawn`] implementation supplied by
//! the user, e.g. a `futures::executor::ThreadPool`. The engine's own
//! "method builder" is a oneshot result slot whose receiving half is the
//! native, invariant future that covariant futures box and share.

use crate::error::{BuilderError, Failure};
use futures::{
    channel::oneshot,
    future::FutureExt,
    task::{Spawn, SpawnError, SpawnExt},
};
use std::{
    fmt,
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::{Instrument, Span};

/// Handle to the executor computations and continuations run on
#[derive(Clone)]
pub struct Engine {
    spawner: Arc<dyn Spawn + Send + Sync>,
}

impl Engine {
    pub fn new<S>(spawner: S) -> Self
    where
        S: Spawn + Send + Sync + 'static,
    {
        Self {
            spawner: Arc::new(spawner),
        }
    }

    /// Hands a task to the executor.
    pub fn spawn<F>(&self, task: F) -> Result<(), SpawnError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(task)
    }

    /// Whether both handles submit to the same executor.
    pub fn ptr_eq(&self, other: &Engine) -> bool {
        Arc::ptr_eq(&self.spawner, &other.spawner)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("spawner", &Arc::as_ptr(&self.spawner))
            .finish()
    }
}

/// The engine side of an asynchronous invocation.
///
/// Owns the single result slot of one computation. The slot is written at
/// most once: either directly through [`set_result`](Self::set_result) /
/// [`set_exception`](Self::set_exception), or by the driver task that
/// [`start`](Self::start) spawns when the state machine finishes.
pub struct EngineBuilder<T> {
    engine: Engine,
    slot: Option<oneshot::Sender<Result<T, Failure>>>,
}

impl<T> EngineBuilder<T>
where
    T: Send + 'static,
{
    /// Creates a result slot together with the task which observes it.
    pub fn create(engine: Engine) -> (Self, EngineTask<T>) {
        let (sender, receiver) = oneshot::channel();
        let builder = Self {
            engine,
            slot: Some(sender),
        };
        (builder, EngineTask { receiver })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs the state machine on the engine and routes its outcome into the
    /// result slot.
    ///
    /// If the engine refuses the state machine, the slot is completed with
    /// the spawn failure.
    pub fn start<S>(&mut self, state_machine: S, catch_panics: bool, span: Span) -> Result<(), BuilderError>
    where
        S: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        let slot = self.slot.take().ok_or(BuilderError::AlreadyCompleted)?;
        // The slot only moves into the driver once the engine accepted it
        let (hand_over, slot_receiver) = oneshot::channel::<oneshot::Sender<Result<T, Failure>>>();
        let driver = async move {
            let outcome = if catch_panics {
                match AssertUnwindSafe(state_machine).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(Failure::panicked(payload)),
                }
            } else {
                state_machine.await
            };
            if let Err(ref failure) = outcome {
                tracing::debug!(%failure, "state machine failed");
            }
            if let Ok(slot) = slot_receiver.await {
                // Nobody waiting for the result is not an error
                let _ = slot.send(outcome);
            }
        };
        match self.engine.spawn(driver.instrument(span)) {
            Ok(()) => {
                let _ = hand_over.send(slot);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "engine refused state machine");
                // Executors only refuse tasks once they shut down
                let _ = slot.send(Err(Failure::new(SpawnError::shutdown())));
                Err(BuilderError::Spawn(err))
            }
        }
    }

    pub fn set_result(&mut self, value: T) -> Result<(), BuilderError> {
        self.complete(Ok(value))
    }

    pub fn set_exception(&mut self, failure: Failure) -> Result<(), BuilderError> {
        self.complete(Err(failure))
    }

    fn complete(&mut self, outcome: Result<T, Failure>) -> Result<(), BuilderError> {
        let slot = self.slot.take().ok_or(BuilderError::AlreadyCompleted)?;
        let _ = slot.send(outcome);
        Ok(())
    }
}

/// The engine's native future for one computation.
///
/// Resolves with whatever the result slot was completed with, or with
/// [`Failure::abandoned`] if the slot was dropped unset.
#[derive(Debug)]
pub struct EngineTask<T> {
    receiver: oneshot::Receiver<Result<T, Failure>>,
}

impl<T> Future for EngineTask<T> {
    type Output = Result<T, Failure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Failure::abandoned())),
            Poll::Pending => Poll::Pending,
        }
    }
}
