//! Read-only capabilities over erased futures.
//!
//! [`AnyFuture`] is the result-less capability every covariant future
//! provides. [`TypedFuture<T>`] adds access to a result of type `T`. Both
//! only ever hand values out, never take a `T` in, which is what allows a
//! future of a derived result to stand in for a future of its base:
//! [`FutureView::upcast`] and [`FutureView::upcast_with`] re-type a view
//! without touching the computation underneath.

use crate::{
    awaiter::{Awaiter, Unerase},
    configured::ConfiguredAwaitable,
    erased::ErasedFuture,
    error::FutureError,
    unit::Unit,
};
use futures::future::{BoxFuture, FutureExt};
use std::{any::Any, fmt, future::Future, future::IntoFuture};

/// A computation whose result, if any, is not exposed
pub trait AnyFuture {
    /// The storage node this capability projects.
    fn as_erased(&self) -> &ErasedFuture;

    fn is_completed(&self) -> bool {
        self.as_erased().is_completed()
    }

    /// Awaits completion, discarding the result.
    fn get_awaiter(&self) -> Awaiter<Unit> {
        let erased = self.as_erased();
        Awaiter::new(
            erased.clone(),
            Unerase::unit(),
            erased.continues_on_captured_context(),
        )
    }

    fn configure_await(&self, continue_on_captured_context: bool) -> ConfiguredAwaitable<Unit> {
        ConfiguredAwaitable::new(self.as_erased().untyped(), continue_on_captured_context)
    }

    /// Converts into a plain boxed future, for use with APIs that know
    /// nothing about covariant futures.
    fn as_task(&self) -> BoxFuture<'static, Result<Unit, FutureError>> {
        self.configure_await(false).into_future().boxed()
    }
}

/// A computation producing a `T`
pub trait TypedFuture<T: 'static>: AnyFuture {
    /// The typed view over this computation.
    fn view(&self) -> FutureView<T>;

    fn get_awaiter_typed(&self) -> Awaiter<T> {
        self.view().get_awaiter()
    }

    fn configure_await_typed(&self, continue_on_captured_context: bool) -> ConfiguredAwaitable<T> {
        ConfiguredAwaitable::new(self.view(), continue_on_captured_context)
    }

    fn as_task_typed(&self) -> BoxFuture<'static, Result<T, FutureError>> {
        self.view().into_engine_future()
    }
}

/// Typed, read-only projection of an [`ErasedFuture`].
///
/// The view holds no state of its own besides the recipe for recovering a
/// `T` from the erased result. Whether the stored value actually is a `T`
/// is only checked when the result is extracted.
pub struct FutureView<T> {
    erased: ErasedFuture,
    unerase: Unerase<T>,
}

impl<T> FutureView<T> {
    pub fn new(erased: ErasedFuture, unerase: Unerase<T>) -> Self {
        Self { erased, unerase }
    }

    pub fn is_completed(&self) -> bool {
        self.erased.is_completed()
    }

    /// Awaiter resuming according to the future's default context setting.
    pub fn get_awaiter(&self) -> Awaiter<T> {
        Awaiter::new(
            self.erased.clone(),
            self.unerase.clone(),
            self.erased.continues_on_captured_context(),
        )
    }

    pub fn configure_await(&self, continue_on_captured_context: bool) -> ConfiguredAwaitable<T> {
        ConfiguredAwaitable::new(self.clone(), continue_on_captured_context)
    }

    pub fn erased(&self) -> &ErasedFuture {
        &self.erased
    }

    pub(crate) fn parts(&self) -> (&ErasedFuture, &Unerase<T>) {
        (&self.erased, &self.unerase)
    }

    /// Views the same computation as a future of a base type.
    pub fn upcast<U>(self) -> FutureView<U>
    where
        T: Into<U> + 'static,
        U: 'static,
    {
        self.upcast_with(<T as Into<U>>::into)
    }

    /// Like [`upcast`](Self::upcast), for conversions `Into` can't express,
    /// such as `Arc<Concrete>` to `Arc<dyn Trait>`.
    pub fn upcast_with<U>(self, convert: fn(T) -> U) -> FutureView<U>
    where
        T: 'static,
        U: 'static,
    {
        FutureView {
            erased: self.erased,
            unerase: self.unerase.map(convert),
        }
    }

    /// Converts into a plain boxed future.
    pub fn into_engine_future(self) -> BoxFuture<'static, Result<T, FutureError>>
    where
        T: 'static,
    {
        self.configure_await(false).into_future().boxed()
    }
}

impl ErasedFuture {
    /// Views the erased result as a `T`.
    ///
    /// Nothing is checked here: awaiting the view fails with a cast error if
    /// the computation did not produce a `T`.
    pub fn view<T>(&self) -> FutureView<T>
    where
        T: Any + Clone,
    {
        FutureView::new(self.clone(), Unerase::static_cast())
    }

    /// The result-less view of this computation.
    pub fn untyped(&self) -> FutureView<Unit> {
        FutureView::new(self.clone(), Unerase::unit())
    }
}

impl<T> Clone for FutureView<T> {
    fn clone(&self) -> Self {
        Self::new(self.erased.clone(), self.unerase.clone())
    }
}

impl<T> From<FutureView<T>> for ErasedFuture {
    fn from(view: FutureView<T>) -> Self {
        view.erased
    }
}

impl AnyFuture for ErasedFuture {
    fn as_erased(&self) -> &ErasedFuture {
        self
    }
}

impl<T> AnyFuture for FutureView<T> {
    fn as_erased(&self) -> &ErasedFuture {
        &self.erased
    }
}

impl<T: 'static> TypedFuture<T> for FutureView<T> {
    fn view(&self) -> FutureView<T> {
        self.clone()
    }
}

impl<T> IntoFuture for FutureView<T> {
    type Output = <Awaiter<T> as Future>::Output;
    type IntoFuture = Awaiter<T>;

    fn into_future(self) -> Self::IntoFuture {
        let continue_on_captured_context = self.erased.continues_on_captured_context();
        Awaiter::new(self.erased, self.unerase, continue_on_captured_context)
    }
}

impl<T> fmt::Debug for FutureView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureView")
            .field("result", &std::any::type_name::<T>())
            .field("erased", &self.erased)
            .field("unerase", &self.unerase)
            .finish()
    }
}
