//! Scheduling contexts continuations can be resumed on.
//!
//! A thread may install a [`SchedulingContext`] as its current context.
//! Awaiters which are asked to continue on the captured context remember the
//! context current at their creation, and hand their continuation back to it
//! once the awaited computation completes.

use crate::engine::Engine;
use futures::task::SpawnError;
use std::{
    cell::RefCell,
    fmt,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};

thread_local! {
    static CURRENT: RefCell<Option<SchedulingContext>> = RefCell::new(None);
}

/// An executor continuations are posted back to
#[derive(Clone)]
pub struct SchedulingContext {
    engine: Engine,
}

impl SchedulingContext {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// The context installed on the calling thread, if any.
    pub fn current() -> Option<SchedulingContext> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Installs this context as the current one until the guard is dropped.
    pub fn enter(&self) -> ContextGuard {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        ContextGuard {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Whether the calling thread currently runs inside this context.
    pub fn is_current(&self) -> bool {
        CURRENT.with(|current| {
            current
                .borrow()
                .as_ref()
                .map_or(false, |current| current.ptr_eq(self))
        })
    }

    pub fn ptr_eq(&self, other: &SchedulingContext) -> bool {
        self.engine.ptr_eq(&other.engine)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Runs `task` on this context, with the context entered on every poll.
    pub fn spawn<F>(&self, task: F) -> Result<(), SpawnError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.engine.spawn(WithContext {
            context: self.clone(),
            inner: Box::pin(task),
        })
    }
}

impl From<Engine> for SchedulingContext {
    fn from(engine: Engine) -> Self {
        SchedulingContext::new(engine)
    }
}

impl fmt::Debug for SchedulingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingContext")
            .field("engine", &self.engine)
            .finish()
    }
}

/// Restores the previously current context on drop
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    previous: Option<SchedulingContext>,
    // The guard restores thread local state and must stay on its thread
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

struct WithContext<F> {
    context: SchedulingContext,
    inner: Pin<Box<F>>,
}

impl<F: Future<Output = ()>> Future for WithContext<F> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let _guard = self.context.enter();
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::oneshot, executor::ThreadPool};

    fn context() -> SchedulingContext {
        SchedulingContext::new(Engine::new(ThreadPool::new().unwrap()))
    }

    #[test]
    fn guards_nest_and_restore() {
        let outer = context();
        let inner = context();
        assert!(SchedulingContext::current().is_none());
        {
            let _outer = outer.enter();
            assert!(outer.is_current());
            {
                let _inner = inner.enter();
                assert!(inner.is_current());
                assert!(!outer.is_current());
            }
            assert!(outer.is_current());
        }
        assert!(SchedulingContext::current().is_none());
    }

    #[test]
    fn spawned_tasks_run_inside_the_context() {
        let ctx = context();
        let (tx, rx) = oneshot::channel();
        let entered = ctx.clone();
        ctx.spawn(async move {
            let _ = tx.send(entered.is_current());
        })
        .unwrap();
        assert!(futures::executor::block_on(rx).unwrap());
    }
}
