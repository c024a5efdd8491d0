//! Benchmarks for awaiting covariant futures against native futures

#[cfg(not(target_env = "msvc"))]
use jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use covariant_futures::Engine;
use criterion::{criterion_group, criterion_main, Benchmark, Criterion};
use futures::executor::ThreadPool;
mod adder;
use adder::{
    AsyncTraitAdder, AsyncTraitAdderImpl, BoxPinFutureTraitAdder, BoxPinFutureTraitAdderImpl,
    CovariantAdder, BoxedCovariantAdder, NoTraitAdder, SpawnedCovariantAdder,
};

const ADDER_ITERATIONS: usize = 50;

fn adder_benches(c: &mut Criterion) {
    let engine = Engine::new(ThreadPool::new().expect("thread pool"));
    let boxed_engine = engine.clone();

    c.bench(
        "adder benches",
        Benchmark::new("no trait", |b| {
            b.iter(|| {
                let mut adder = NoTraitAdder::default();
                futures::executor::block_on(async {
                    for _ in 0..ADDER_ITERATIONS {
                        assert_eq!(25, adder.add_obj(5, 20).await);
                        assert_eq!(25, adder.current);
                    }
                });
            });
        })
        .with_function("async trait obj", |b| {
            b.iter(|| {
                futures::executor::block_on(async {
                    let adder = AsyncTraitAdderImpl::default();
                    for _ in 0..ADDER_ITERATIONS {
                        assert_eq!(25, adder.add_obj(5, 20).await);
                    }
                });
            });
        })
        .with_function("box pin future trait obj", |b| {
            b.iter(|| {
                futures::executor::block_on(async {
                    let adder = BoxPinFutureTraitAdderImpl::default();
                    for _ in 0..ADDER_ITERATIONS {
                        assert_eq!(25, adder.add_obj(5, 20).await);
                    }
                });
            });
        })
        .with_function("boxed covariant future", move |b| {
            let adder = BoxedCovariantAdder::new(boxed_engine.clone());
            b.iter(|| {
                futures::executor::block_on(async {
                    for _ in 0..ADDER_ITERATIONS {
                        assert_eq!(25, adder.add_obj(5, 20).await.unwrap());
                    }
                });
            });
        })
        .with_function("spawned covariant future", move |b| {
            let adder = SpawnedCovariantAdder::new(engine.clone());
            b.iter(|| {
                futures::executor::block_on(async {
                    for _ in 0..ADDER_ITERATIONS {
                        assert_eq!(25, adder.add_obj(5, 20).await.unwrap());
                    }
                });
            });
        }),
    );
}

criterion_group! {
    name = bench_group;
    config = Criterion::default();
    targets = adder_benches
}
criterion_main!(bench_group);
