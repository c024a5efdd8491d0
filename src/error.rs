//! Failures which surface out of covariant futures and their builders.
//!
//! Nothing in this crate recovers from any of these locally. A failed
//! computation, a failed un-erasure or a refused spawn is handed to the
//! nearest awaiting continuation exactly as it occurred.

use futures::task::SpawnError;
use std::{any::Any, error::Error, fmt, sync::Arc};
use thiserror::Error;

/// The failure of an asynchronous computation.
///
/// A `Failure` is cheap to clone: all clones share the original error, so
/// every awaiter of the same future observes the identical failure.
#[derive(Clone)]
pub struct Failure(Arc<dyn Error + Send + Sync + 'static>);

impl Failure {
    /// Wraps an arbitrary error.
    pub fn new<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Failure(Arc::new(error))
    }

    /// Creates a failure which only carries a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Failure::new(Message(message.into()))
    }

    /// Turns the payload of a panicking computation into a failure.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        Failure::new(Panicked(message))
    }

    /// The failure reported when the result slot of a computation was
    /// dropped before it got completed.
    pub fn abandoned() -> Self {
        Failure::new(Abandoned)
    }

    /// Returns the wrapped error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: Error + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether both failures originate from the same error value.
    pub fn ptr_eq(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the computation panicked.
    pub fn is_panic(&self) -> bool {
        self.downcast_ref::<Panicked>().is_some()
    }

    /// Whether the computation was dropped before completion.
    pub fn is_abandoned(&self) -> bool {
        self.downcast_ref::<Abandoned>().is_some()
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Failure").field(&self.0).finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for Failure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

#[derive(Debug, Error)]
#[error("computation panicked: {0}")]
struct Panicked(String);

#[derive(Debug, Error)]
#[error("computation was abandoned before completion")]
struct Abandoned;

/// The erased result of a computation could not be recovered as the
/// requested type.
///
/// This only happens when the type a future was built with and the type it
/// is awaited as disagree, which is a programming error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("erased result is not a `{expected}`")]
pub struct CastError {
    /// Name of the type the result was requested as
    pub expected: &'static str,
}

impl CastError {
    pub fn of<T: ?Sized>() -> Self {
        CastError {
            expected: std::any::type_name::<T>(),
        }
    }
}

/// Errors which surface when awaiting a covariant future
#[derive(Debug, Error)]
pub enum FutureError {
    /// The computation itself failed
    #[error(transparent)]
    Computation(Failure),
    /// The result could not be un-erased
    #[error(transparent)]
    Cast(#[from] CastError),
    /// A continuation could not be handed to its scheduling context
    #[error("failed to schedule continuation: {0}")]
    Spawn(#[from] SpawnError),
}

impl From<Failure> for FutureError {
    fn from(failure: Failure) -> Self {
        FutureError::Computation(failure)
    }
}

impl FutureError {
    /// Returns the failure of the computation, if that is what happened.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            FutureError::Computation(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Builder methods invoked out of sequence
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("the state machine was already started")]
    AlreadyStarted,
    #[error("the result was already set")]
    AlreadyCompleted,
    #[error("no state machine was attached")]
    NoStateMachine,
    #[error("failed to start state machine: {0}")]
    Spawn(#[from] SpawnError),
}
