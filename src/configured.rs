//! Awaiting with an explicit choice of where continuations resume.

use crate::{awaiter::Awaiter, capability::FutureView};
use std::{fmt, future::Future, future::IntoFuture};

/// A future paired with where its continuation should resume.
///
/// Produces a fresh [`Awaiter`] every time one is requested. Both settings
/// of the flag surface the same value or failure; they only differ in the
/// context continuations run on.
///
/// The flag is honored by continuations registered through
/// [`Awaiter::on_completed`] and [`Awaiter::on_completed_priority`]. When
/// the awaitable is `.await`ed instead, the awaiting task resumes wherever
/// its executor polls it, whatever the flag says.
pub struct ConfiguredAwaitable<T> {
    future: FutureView<T>,
    continue_on_captured_context: bool,
}

impl<T> ConfiguredAwaitable<T> {
    pub fn new(future: FutureView<T>, continue_on_captured_context: bool) -> Self {
        Self {
            future,
            continue_on_captured_context,
        }
    }

    pub fn continue_on_captured_context(&self) -> bool {
        self.continue_on_captured_context
    }

    pub fn get_awaiter(&self) -> Awaiter<T> {
        let (erased, unerase) = self.future.parts();
        Awaiter::new(erased.clone(), unerase.clone(), self.continue_on_captured_context)
    }
}

impl<T> Clone for ConfiguredAwaitable<T> {
    fn clone(&self) -> Self {
        Self::new(self.future.clone(), self.continue_on_captured_context)
    }
}

impl<T> IntoFuture for ConfiguredAwaitable<T> {
    type Output = <Awaiter<T> as Future>::Output;
    type IntoFuture = Awaiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        self.get_awaiter()
    }
}

impl<T> fmt::Debug for ConfiguredAwaitable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredAwaitable")
            .field("future", &self.future)
            .field(
                "continue_on_captured_context",
                &self.continue_on_captured_context,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        context::SchedulingContext,
        engine::Engine,
        erased::ErasedFuture,
        error::Failure,
    };
    use futures::executor::{block_on, ThreadPool};

    fn engine() -> Engine {
        Engine::new(ThreadPool::new().unwrap())
    }

    #[test]
    fn flag_controls_context_capture() {
        let future = ErasedFuture::completed(engine(), 11i64).view::<i64>();
        let context = SchedulingContext::new(engine());
        let _guard = context.enter();

        let captured = future.configure_await(true).get_awaiter();
        assert!(captured.captured_context().unwrap().ptr_eq(&context));
        let free = future.configure_await(false).get_awaiter();
        assert!(free.captured_context().is_none());

        assert_eq!(block_on(captured).unwrap(), 11);
        assert_eq!(block_on(free).unwrap(), 11);
    }

    #[test]
    fn each_request_yields_a_fresh_awaiter() {
        let future = ErasedFuture::failed(engine(), Failure::msg("gone")).view::<u8>();
        let configured = future.configure_await(false);
        let first = block_on(configured.get_awaiter()).unwrap_err();
        let second = block_on(configured.get_awaiter()).unwrap_err();
        assert!(first.failure().unwrap().ptr_eq(second.failure().unwrap()));
    }
}
