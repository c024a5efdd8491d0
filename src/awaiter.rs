//! The suspension point protocol of covariant futures.
//!
//! An [`Awaiter`] is bound to one computation. It answers whether the
//! computation completed, recovers its typed result, and registers
//! continuations which run once the computation completed. Awaiters also
//! implement [`Future`], so they can be `.await`ed directly.

use crate::{
    context::SchedulingContext,
    erased::{AnyResult, EngineFuture, ErasedFuture},
    error::{CastError, FutureError},
    unit::Unit,
};
use futures::future::FutureExt;
use std::{
    any::Any,
    fmt,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tracing::Span;

/// Recipe for recovering a typed result from its erased representation.
///
/// Which recipe is used is decided once, when the view or awaiter is
/// constructed.
pub enum Unerase<T> {
    /// The concrete result type is known statically and is recovered by a
    /// monomorphized downcast
    Static(fn(&AnyResult) -> Result<T, CastError>),
    /// The conversion was captured as a closure, for results whose concrete
    /// representation is only known where the future was built
    LateBound(Arc<dyn Fn(&AnyResult) -> Result<T, CastError> + Send + Sync>),
}

impl<T> Unerase<T> {
    /// Downcast to exactly `T`.
    pub fn static_cast() -> Self
    where
        T: Any + Clone,
    {
        Unerase::Static(downcast_clone::<T>)
    }

    pub fn late_bound<F>(unerase: F) -> Self
    where
        F: Fn(&AnyResult) -> Result<T, CastError> + Send + Sync + 'static,
    {
        Unerase::LateBound(Arc::new(unerase))
    }

    pub fn apply(&self, result: &AnyResult) -> Result<T, CastError> {
        match self {
            Unerase::Static(unerase) => unerase(result),
            Unerase::LateBound(unerase) => unerase(result),
        }
    }

    /// Post-processes every recovered value with `convert`.
    pub fn map<U, F>(self, convert: F) -> Unerase<U>
    where
        T: 'static,
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        Unerase::late_bound(move |result| self.apply(result).map(&convert))
    }
}

impl Unerase<Unit> {
    /// Accepts any erased result and discards it.
    pub fn unit() -> Self {
        Unerase::late_bound(|_| Ok(Unit))
    }
}

impl<T> Clone for Unerase<T> {
    fn clone(&self) -> Self {
        match self {
            Unerase::Static(unerase) => Unerase::Static(*unerase),
            Unerase::LateBound(unerase) => Unerase::LateBound(unerase.clone()),
        }
    }
}

impl<T> fmt::Debug for Unerase<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unerase::Static(_) => f.write_str("Unerase::Static"),
            Unerase::LateBound(_) => f.write_str("Unerase::LateBound"),
        }
    }
}

fn downcast_clone<T: Any + Clone>(result: &AnyResult) -> Result<T, CastError> {
    (**result)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(CastError::of::<T>)
}

/// Something a continuation can be registered on
pub trait NotifyCompletion {
    /// Registers `continuation` to run exactly once after completion.
    ///
    /// The ambient tracing span flows into the continuation.
    fn on_completed<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static;
}

/// Completion notification which may skip ambient context propagation
pub trait CriticalNotifyCompletion: NotifyCompletion {
    /// Like [`on_completed`](NotifyCompletion::on_completed), without
    /// carrying the ambient tracing span over.
    fn on_completed_priority<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static;
}

/// The awaiter of one covariant future.
///
/// An awaiter is single use: once its result was retrieved, by
/// [`get_result`](Self::get_result) or by awaiting it to completion, it must
/// not be polled again.
#[must_use = "awaiters do nothing unless awaited or given a continuation"]
pub struct Awaiter<T> {
    future: ErasedFuture,
    pending: EngineFuture,
    unerase: Unerase<T>,
    resume_on: Option<SchedulingContext>,
}

impl<T> Awaiter<T> {
    /// Binds an awaiter to `future`.
    ///
    /// With `continue_on_captured_context` set, the scheduling context
    /// current on the calling thread is captured and continuations are
    /// resumed on it.
    pub fn new(future: ErasedFuture, unerase: Unerase<T>, continue_on_captured_context: bool) -> Self {
        let resume_on = if continue_on_captured_context {
            SchedulingContext::current()
        } else {
            None
        };
        Self {
            pending: future.engine_future(),
            future,
            unerase,
            resume_on,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.future.is_completed()
    }

    /// The scheduling context continuations are resumed on, if one was
    /// captured.
    pub fn captured_context(&self) -> Option<&SchedulingContext> {
        self.resume_on.as_ref()
    }

    /// Blocks the calling thread until the computation completed and
    /// returns its result.
    ///
    /// This must not be called from a thread of the executor which drives
    /// the computation, as that might never get to run it.
    pub fn get_result(self) -> Result<T, FutureError> {
        futures::executor::block_on(self)
    }

    /// See [`NotifyCompletion::on_completed`].
    pub fn on_completed<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(continuation, Span::current())
    }

    /// See [`CriticalNotifyCompletion::on_completed_priority`].
    pub fn on_completed_priority<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(continuation, Span::none())
    }

    fn dispatch<F>(&self, continuation: F, span: Span) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static,
    {
        let continuation = move || span.in_scope(continuation);
        let completed = self.future.is_completed();
        match &self.resume_on {
            None if completed => {
                tracing::trace!("running continuation inline");
                continuation();
            }
            Some(context) if completed && context.is_current() => {
                tracing::trace!("running continuation inline on captured context");
                continuation();
            }
            Some(context) => {
                tracing::trace!("posting continuation to captured context");
                let pending = self.pending.clone();
                context.spawn(async move {
                    let _ = pending.await;
                    continuation();
                })?;
            }
            None => {
                tracing::trace!("deferring continuation to engine");
                let pending = self.pending.clone();
                self.future.engine().spawn(async move {
                    let _ = pending.await;
                    continuation();
                })?;
            }
        }
        Ok(())
    }
}

impl<T> Future for Awaiter<T> {
    type Output = Result<T, FutureError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let output = match self.pending.poll_unpin(cx) {
            Poll::Ready(output) => output,
            Poll::Pending => return Poll::Pending,
        };
        Poll::Ready(match output {
            Ok(result) => self.unerase.apply(&result).map_err(|err| {
                tracing::error!(expected = err.expected, "erased result has unexpected type");
                FutureError::Cast(err)
            }),
            Err(failure) => Err(FutureError::Computation(failure)),
        })
    }
}

impl<T> NotifyCompletion for Awaiter<T> {
    fn on_completed<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static,
    {
        Awaiter::on_completed(self, continuation)
    }
}

impl<T> CriticalNotifyCompletion for Awaiter<T> {
    fn on_completed_priority<F>(&self, continuation: F) -> Result<(), FutureError>
    where
        F: FnOnce() + Send + 'static,
    {
        Awaiter::on_completed_priority(self, continuation)
    }
}

impl<T> fmt::Debug for Awaiter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Awaiter")
            .field("future", &self.future)
            .field("unerase", &self.unerase)
            .field("resume_on", &self.resume_on)
            .finish()
    }
}
