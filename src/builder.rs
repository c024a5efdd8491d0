//! Builders driving one asynchronous invocation each.
//!
//! A builder wraps the engine's own [`EngineBuilder`] and publishes a
//! covariant future for the invocation as soon as it is created. All state
//! progression is delegated to the engine; the builder only adds the boxing
//! of the result and keeps track of which step of its life it is in:
//!
//! - Constructed -> Running (`start`)
//! - Constructed -> CompletedSuccess / CompletedFailure (`set_result`,
//!   `set_exception`)
//! - Constructed -> CompletedFailure, when the engine refuses to `start`
//! - Running -> CompletedSuccess / CompletedFailure, once the state machine
//!   finishes
//!
//! [`run`] and [`run_typed`] are the entry points which turn an async block
//! into a covariant future in one step.

use crate::{
    awaiter::{CriticalNotifyCompletion, NotifyCompletion},
    capability::FutureView,
    config::BuilderConfig,
    engine::{Engine, EngineBuilder},
    erased::ErasedFuture,
    error::{BuilderError, Failure, FutureError},
    unit::Unit,
};
use futures::future::{BoxFuture, FutureExt};
use std::{any::Any, fmt, future::Future};

/// Where in its life a builder is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuilderState {
    /// The published future exists, nothing runs yet
    Constructed,
    /// The state machine was handed to the engine
    Running,
    CompletedSuccess,
    CompletedFailure,
}

impl BuilderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BuilderState::CompletedSuccess | BuilderState::CompletedFailure
        )
    }
}

/// Builder for an invocation producing a `T`
pub struct TypedFutureBuilder<T> {
    engine_builder: EngineBuilder<T>,
    task: FutureView<T>,
    state: BuilderState,
    state_machine: Option<BoxFuture<'static, Result<T, Failure>>>,
    config: BuilderConfig,
}

impl<T> TypedFutureBuilder<T>
where
    T: Any + Clone + Send + Sync,
{
    pub fn create(engine: Engine) -> Self {
        Self::with_config(engine, BuilderConfig::default())
    }

    pub fn with_config(engine: Engine, config: BuilderConfig) -> Self {
        let (engine_builder, engine_task) = EngineBuilder::create(engine.clone());
        let task = ErasedFuture::from_engine_task(engine, engine_task)
            .with_continue_on_captured_context(config.continue_on_captured_context)
            .view::<T>();
        tracing::debug!(
            invocation = config.name.as_deref().unwrap_or("anonymous"),
            result = std::any::type_name::<T>(),
            "created future builder"
        );
        Self {
            engine_builder,
            task,
            state: BuilderState::Constructed,
            state_machine: None,
            config,
        }
    }

    /// The future published for this invocation.
    ///
    /// Every call returns a view of the same computation.
    pub fn task(&self) -> FutureView<T> {
        self.task.clone()
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn state(&self) -> BuilderState {
        if self.state != BuilderState::Running {
            return self.state;
        }
        match self.task.erased().output() {
            Some(Ok(_)) => BuilderState::CompletedSuccess,
            Some(Err(_)) => BuilderState::CompletedFailure,
            None => BuilderState::Running,
        }
    }

    /// Hands the state machine to the engine.
    ///
    /// Its output completes the published future. From here on the running
    /// state machine owns the result slot.
    pub fn start<S>(&mut self, state_machine: S) -> Result<(), BuilderError>
    where
        S: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        self.check_constructed("start")?;
        let invocation = self.config.name.as_deref().unwrap_or("anonymous");
        let span = tracing::debug_span!("state_machine", invocation);
        if let Err(err) = self
            .engine_builder
            .start(state_machine, self.config.catch_panics, span)
        {
            // The published future already holds the refusal
            self.state = BuilderState::CompletedFailure;
            return Err(err);
        }
        self.state = BuilderState::Running;
        tracing::debug!(invocation, "started state machine");
        Ok(())
    }

    /// Attaches a state machine to be started later by
    /// [`start_attached`](Self::start_attached).
    pub fn set_state_machine<S>(&mut self, state_machine: S) -> Result<(), BuilderError>
    where
        S: Future<Output = Result<T, Failure>> + Send + 'static,
    {
        self.check_constructed("set_state_machine")?;
        if self.state_machine.is_some() {
            tracing::warn!("state machine attached twice");
            return Err(BuilderError::AlreadyStarted);
        }
        self.state_machine = Some(state_machine.boxed());
        Ok(())
    }

    pub fn start_attached(&mut self) -> Result<(), BuilderError> {
        self.check_constructed("start_attached")?;
        let state_machine = self
            .state_machine
            .take()
            .ok_or(BuilderError::NoStateMachine)?;
        self.start(state_machine)
    }

    pub fn set_result(&mut self, value: T) -> Result<(), BuilderError> {
        self.check_constructed("set_result")?;
        self.engine_builder.set_result(value)?;
        self.state = BuilderState::CompletedSuccess;
        tracing::debug!("result set");
        Ok(())
    }

    pub fn set_exception(&mut self, failure: Failure) -> Result<(), BuilderError> {
        self.check_constructed("set_exception")?;
        tracing::debug!(%failure, "failure set");
        self.engine_builder.set_exception(failure)?;
        self.state = BuilderState::CompletedFailure;
        Ok(())
    }

    /// Schedules `resume` for when `awaiter` completes.
    pub fn await_on_completed<A, F>(&self, awaiter: &A, resume: F) -> Result<(), FutureError>
    where
        A: NotifyCompletion,
        F: FnOnce() + Send + 'static,
    {
        awaiter.on_completed(resume)
    }

    /// Like [`await_on_completed`](Self::await_on_completed), without
    /// ambient span propagation.
    pub fn await_unsafe_on_completed<A, F>(&self, awaiter: &A, resume: F) -> Result<(), FutureError>
    where
        A: CriticalNotifyCompletion,
        F: FnOnce() + Send + 'static,
    {
        awaiter.on_completed_priority(resume)
    }

    fn check_constructed(&self, operation: &'static str) -> Result<(), BuilderError> {
        let error = match self.state {
            BuilderState::Constructed => return Ok(()),
            BuilderState::Running => BuilderError::AlreadyStarted,
            BuilderState::CompletedSuccess | BuilderState::CompletedFailure => {
                BuilderError::AlreadyCompleted
            }
        };
        tracing::warn!(operation, state = ?self.state, "builder used out of sequence");
        Err(error)
    }
}

impl<T> fmt::Debug for TypedFutureBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedFutureBuilder")
            .field("state", &self.state)
            .field("task", &self.task)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for an invocation without a result.
///
/// The result slot is completed with [`Unit`], so result-less invocations
/// run through the same machinery as typed ones.
#[derive(Debug)]
pub struct FutureBuilder {
    inner: TypedFutureBuilder<Unit>,
}

impl FutureBuilder {
    pub fn create(engine: Engine) -> Self {
        Self::with_config(engine, BuilderConfig::default())
    }

    pub fn with_config(engine: Engine, config: BuilderConfig) -> Self {
        Self {
            inner: TypedFutureBuilder::with_config(engine, config),
        }
    }

    /// The future published for this invocation.
    pub fn task(&self) -> ErasedFuture {
        self.inner.task().into()
    }

    pub fn state(&self) -> BuilderState {
        self.inner.state()
    }

    pub fn start<S>(&mut self, state_machine: S) -> Result<(), BuilderError>
    where
        S: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.inner.start(state_machine.map(|outcome| outcome.map(Unit::from)))
    }

    pub fn set_state_machine<S>(&mut self, state_machine: S) -> Result<(), BuilderError>
    where
        S: Future<Output = Result<(), Failure>> + Send + 'static,
    {
        self.inner
            .set_state_machine(state_machine.map(|outcome| outcome.map(Unit::from)))
    }

    pub fn start_attached(&mut self) -> Result<(), BuilderError> {
        self.inner.start_attached()
    }

    pub fn set_result(&mut self) -> Result<(), BuilderError> {
        self.inner.set_result(Unit)
    }

    pub fn set_exception(&mut self, failure: Failure) -> Result<(), BuilderError> {
        self.inner.set_exception(failure)
    }

    pub fn await_on_completed<A, F>(&self, awaiter: &A, resume: F) -> Result<(), FutureError>
    where
        A: NotifyCompletion,
        F: FnOnce() + Send + 'static,
    {
        self.inner.await_on_completed(awaiter, resume)
    }

    pub fn await_unsafe_on_completed<A, F>(&self, awaiter: &A, resume: F) -> Result<(), FutureError>
    where
        A: CriticalNotifyCompletion,
        F: FnOnce() + Send + 'static,
    {
        self.inner.await_unsafe_on_completed(awaiter, resume)
    }
}

/// Runs a result-less async body on `engine` and returns its future.
pub fn run<S>(engine: Engine, body: S) -> Result<ErasedFuture, BuilderError>
where
    S: Future<Output = Result<(), Failure>> + Send + 'static,
{
    let mut builder = FutureBuilder::create(engine);
    builder.start(body)?;
    Ok(builder.task())
}

/// Runs an async body producing a `T` on `engine` and returns its future.
pub fn run_typed<T, S>(engine: Engine, body: S) -> Result<FutureView<T>, BuilderError>
where
    T: Any + Clone + Send + Sync,
    S: Future<Output = Result<T, Failure>> + Send + 'static,
{
    run_with_config(engine, BuilderConfig::default(), body)
}

/// [`run_typed`] with explicit builder settings.
pub fn run_with_config<T, S>(
    engine: Engine,
    config: BuilderConfig,
    body: S,
) -> Result<FutureView<T>, BuilderError>
where
    T: Any + Clone + Send + Sync,
    S: Future<Output = Result<T, Failure>> + Send + 'static,
{
    let mut builder = TypedFutureBuilder::with_config(engine, config);
    builder.start(body)?;
    Ok(builder.task())
}
