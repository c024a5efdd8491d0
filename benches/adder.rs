use async_trait::async_trait;
use covariant_futures::{run_typed, Engine, ErasedFuture, Failure, FutureView};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

const NR_YIELDS: usize = 0;

#[derive(Default)]
pub struct NoTraitAdder {
    pub current: u32,
}

impl NoTraitAdder {
    pub async fn add_obj(&mut self, a: u32, b: u32) -> u32 {
        let result = a + b;
        Yielder::new(NR_YIELDS).await;
        self.current = result;
        result
    }
}

#[async_trait]
pub trait AsyncTraitAdder {
    async fn add_obj(&self, a: u32, b: u32) -> u32;
}

#[derive(Default)]
pub struct AsyncTraitAdderImpl;

#[async_trait]
impl AsyncTraitAdder for AsyncTraitAdderImpl {
    async fn add_obj(&self, a: u32, b: u32) -> u32 {
        Yielder::new(NR_YIELDS).await;
        a + b
    }
}

pub trait BoxPinFutureTraitAdder {
    fn add_obj(&self, a: u32, b: u32) -> Pin<Box<dyn Future<Output = u32> + Send>>;
}

#[derive(Default)]
pub struct BoxPinFutureTraitAdderImpl;

impl BoxPinFutureTraitAdder for BoxPinFutureTraitAdderImpl {
    fn add_obj(&self, a: u32, b: u32) -> Pin<Box<dyn Future<Output = u32> + Send>> {
        Box::pin(async move {
            Yielder::new(NR_YIELDS).await;
            a + b
        })
    }
}

/// Adds and hands out the sum as a future of a wider integer.
///
/// Implementations only need to produce a `u32`; the trait surface is
/// `u64`, which the covariant view converts to on extraction.
pub trait CovariantAdder {
    fn add_obj(&self, a: u32, b: u32) -> FutureView<u64>;
}

/// Hands the body straight to the engine, without a builder.
pub struct BoxedCovariantAdder {
    engine: Engine,
}

impl BoxedCovariantAdder {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

impl CovariantAdder for BoxedCovariantAdder {
    fn add_obj(&self, a: u32, b: u32) -> FutureView<u64> {
        ErasedFuture::box_result(self.engine.clone(), async move {
            Yielder::new(NR_YIELDS).await;
            Ok::<_, Failure>(a + b)
        })
        .view::<u32>()
        .upcast()
    }
}

/// Runs the body on the engine through a builder.
pub struct SpawnedCovariantAdder {
    engine: Engine,
}

impl SpawnedCovariantAdder {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

impl CovariantAdder for SpawnedCovariantAdder {
    fn add_obj(&self, a: u32, b: u32) -> FutureView<u64> {
        run_typed(self.engine.clone(), async move {
            Yielder::new(NR_YIELDS).await;
            Ok::<_, Failure>(a + b)
        })
        .expect("engine accepts state machines")
        .upcast()
    }
}

/// A Future which yields to the executor for a given amount of iterations
/// and resolves after this
pub struct Yielder {
    iter: usize,
}

impl Yielder {
    pub fn new(iter: usize) -> Yielder {
        Yielder { iter }
    }
}

impl Future for Yielder {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.iter == 0 {
            Poll::Ready(())
        } else {
            self.iter -= 1;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}
