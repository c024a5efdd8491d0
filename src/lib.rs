//! Covariant futures.
//!
//! The future an async body compiles to is tied to exactly one output type,
//! so a future of a derived result can't be handed out where a future of its
//! base is expected. This crate stores the result of every computation in a
//! single type erased form, and lays read-only typed views over it. Because
//! the views only ever produce their result type, they can be re-typed to any
//! base the result converts into, while still sharing one computation.
//!
//! ```ignore
//! let child = run_typed(engine.clone(), async { Ok(Arc::new(Child)) })?;
//! let parent = child.upcast_with(|c: Arc<Child>| -> Arc<dyn Parent> { c });
//! let value = parent.await?;
//! ```

mod awaiter;
pub use awaiter::{Awaiter, CriticalNotifyCompletion, NotifyCompletion, Unerase};
mod builder;
pub use builder::{
    run, run_typed, run_with_config, BuilderState, FutureBuilder, TypedFutureBuilder,
};
mod capability;
pub use capability::{AnyFuture, FutureView, TypedFuture};
mod config;
pub use config::BuilderConfig;
mod configured;
pub use configured::ConfiguredAwaitable;
mod context;
pub use context::{ContextGuard, SchedulingContext};
mod engine;
pub use engine::{Engine, EngineBuilder, EngineTask};
mod erased;
pub use erased::{AnyResult, EngineFuture, ErasedFuture, ErasedOutput};
mod error;
pub use error::{BuilderError, CastError, Failure, FutureError};
mod unit;
pub use unit::Unit;
