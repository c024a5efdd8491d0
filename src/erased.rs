//! Type erased storage for the result of one computation.
//!
//! The engine's native future is invariant in its result type. To lay
//! covariant views over it, the result is boxed into a single non-generic
//! representation ([`AnyResult`]) exactly once, and the boxed future is
//! shared between all views and awaiters of the computation.

use crate::{
    awaiter::{Awaiter, Unerase},
    engine::{Engine, EngineBuilder, EngineTask},
    error::Failure,
    unit::Unit,
};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::{any::Any, fmt, future::Future, future::IntoFuture, sync::Arc};
use tracing::Span;

/// The boxed result of a computation
pub type AnyResult = Arc<dyn Any + Send + Sync>;

/// What the shared engine future resolves to
pub type ErasedOutput = Result<AnyResult, Failure>;

/// The engine's own future, boxed and shared
pub type EngineFuture = Shared<BoxFuture<'static, ErasedOutput>>;

/// Ownership node of a computation whose result type has been erased.
///
/// Cloning an `ErasedFuture` shares the computation. It never changes which
/// computation it refers to, and lives as long as its longest holder.
#[derive(Clone)]
pub struct ErasedFuture {
    task: EngineFuture,
    engine: Engine,
    continue_on_captured_context: bool,
}

impl ErasedFuture {
    /// Runs `future` on `engine` and erases its result.
    ///
    /// Completion signals and continuations not bound to a captured context
    /// are delivered through `engine`. A panic in `future` fails the
    /// computation. If the engine refuses the future, the computation fails
    /// with the spawn error.
    pub fn box_result<F, T>(engine: Engine, future: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
        T: Any + Send + Sync,
    {
        let (mut slot, task) = EngineBuilder::create(engine.clone());
        // A refusal is already recorded in the slot
        let _ = slot.start(future, true, Span::current());
        Self::from_engine_task(engine, task)
    }

    /// Erases the result of a computation the engine already drives.
    pub fn from_engine_task<T>(engine: Engine, task: EngineTask<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::share(engine, task)
    }

    // Only fed engine-side handles and ready values: polling the result
    // never runs user code
    fn share<F, T>(engine: Engine, future: F) -> Self
    where
        F: Future<Output = Result<T, Failure>> + Send + 'static,
        T: Any + Send + Sync,
    {
        let task = future
            .map(|outcome| outcome.map(|value| Arc::new(value) as AnyResult))
            .boxed()
            .shared();
        Self {
            task,
            engine,
            continue_on_captured_context: true,
        }
    }

    /// An already completed future holding `value`.
    pub fn completed<T>(engine: Engine, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self::share(engine, future::ready(Ok(value)))
    }

    /// An already failed future.
    pub fn failed(engine: Engine, failure: Failure) -> Self {
        Self::share::<_, Unit>(engine, future::ready(Err(failure)))
    }

    /// Sets whether awaiters created without explicit configuration resume
    /// on the captured scheduling context.
    pub fn with_continue_on_captured_context(mut self, continue_on_captured_context: bool) -> Self {
        self.continue_on_captured_context = continue_on_captured_context;
        self
    }

    pub fn continues_on_captured_context(&self) -> bool {
        self.continue_on_captured_context
    }

    /// Whether the computation has finished, successfully or not.
    ///
    /// Once this returned `true` it keeps doing so.
    pub fn is_completed(&self) -> bool {
        self.output().is_some()
    }

    /// The outcome of the computation, if it is available yet.
    pub(crate) fn output(&self) -> Option<ErasedOutput> {
        if let Some(output) = self.task.peek() {
            return Some(output.clone());
        }
        // Polling the handle only checks the engine's result channel
        self.task.clone().now_or_never()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// A handle to the engine's future for this computation.
    pub fn engine_future(&self) -> EngineFuture {
        self.task.clone()
    }

    pub fn into_engine_future(self) -> EngineFuture {
        self.task
    }

    /// Whether both handles refer to the same computation.
    pub fn ptr_eq(&self, other: &ErasedFuture) -> bool {
        self.task.ptr_eq(&other.task)
    }
}

impl fmt::Debug for ErasedFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedFuture")
            .field("completed", &self.is_completed())
            .field("engine", &self.engine)
            .finish()
    }
}

impl IntoFuture for ErasedFuture {
    type Output = <Awaiter<Unit> as Future>::Output;
    type IntoFuture = Awaiter<Unit>;

    fn into_future(self) -> Self::IntoFuture {
        let continue_on_captured_context = self.continue_on_captured_context;
        Awaiter::new(self, Unerase::unit(), continue_on_captured_context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{
        channel::oneshot,
        executor::{block_on, ThreadPool},
        task::{FutureObj, Spawn, SpawnError},
    };
    use std::{sync::mpsc, thread};

    fn engine() -> Engine {
        Engine::new(ThreadPool::new().unwrap())
    }

    struct Refuse;

    impl Spawn for Refuse {
        fn spawn_obj(&self, _future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
            Err(SpawnError::shutdown())
        }
    }

    #[test]
    fn completion_is_observed_without_awaiting() {
        let engine = engine();
        let (mut slot, task) = EngineBuilder::create(engine.clone());
        let erased = ErasedFuture::from_engine_task(engine, task);
        assert!(!erased.is_completed());
        slot.set_result(3u32).unwrap();
        assert!(erased.is_completed());
        assert!(erased.is_completed());

        let value = erased.output().unwrap().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&3));
    }

    #[test]
    fn completion_query_never_runs_the_body() {
        let (release, gate) = oneshot::channel::<()>();
        let (ran_on, ran_on_rx) = mpsc::channel();
        let erased = ErasedFuture::box_result(engine(), async move {
            let _ = gate.await;
            ran_on.send(thread::current().id()).unwrap();
            Ok::<_, Failure>(1u8)
        });
        for _ in 0..10 {
            assert!(!erased.is_completed());
            let _ = format!("{:?}", erased);
        }
        release.send(()).unwrap();
        let value = block_on(erased.view::<u8>().into_future()).unwrap();
        assert_eq!(value, 1);
        assert_ne!(ran_on_rx.recv().unwrap(), thread::current().id());
    }

    #[test]
    fn panicking_body_fails_instead_of_unwinding_into_queries() {
        let erased = ErasedFuture::box_result(engine(), async {
            if true {
                panic!("body panic");
            }
            Ok::<_, Failure>(1u8)
        });
        for _ in 0..10 {
            let _ = erased.is_completed();
            let _ = format!("{:?}", erased);
        }
        let err = block_on(erased.clone().into_future()).unwrap_err();
        assert!(err.failure().unwrap().is_panic());
        assert!(erased.is_completed());
    }

    #[test]
    fn refused_body_fails_with_the_spawn_error() {
        let erased = ErasedFuture::box_result(Engine::new(Refuse), async { Ok::<_, Failure>(1u8) });
        assert!(erased.is_completed());
        let failure = erased.output().unwrap().unwrap_err();
        assert!(failure.downcast_ref::<SpawnError>().is_some());
    }

    #[test]
    fn clones_share_the_computation() {
        let engine = engine();
        let a = ErasedFuture::completed(engine.clone(), "a");
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ErasedFuture::completed(engine, "a")));
    }

    #[test]
    fn failed_futures_are_completed() {
        let erased = ErasedFuture::failed(engine(), Failure::msg("broken"));
        assert!(erased.is_completed());
        let failure = erased.output().unwrap().unwrap_err();
        assert_eq!(failure.to_string(), "broken");
    }
}
