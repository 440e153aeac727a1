//! AsyncStateCell - a replay-latest holder for the lifecycle of one async operation
//!
//! `AsyncStateCell<T, E>` stores the current [`AsyncState`] of an operation and
//! pushes every transition to its subscribers. A subscriber receives the
//! current state at subscription time, then each later transition in the
//! order it happened.
//!
//! # Delivery
//!
//! Every subscriber owns an unbounded queue. Transitions are never coalesced
//! for a live subscriber, so an observer that polls slowly still sees the full
//! `Loading -> Loaded -> Idle` pulse. Subscribers whose stream was dropped are
//! pruned on the next transition.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::errors::ReactiveError;

/// Lifecycle of one asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsyncState<T, E> {
    /// No operation in flight
    Idle,
    /// Operation started, result pending
    Loading,
    /// Operation finished with a value
    Loaded(T),
    /// Operation failed
    Error(E),
}

impl<T, E> AsyncState<T, E> {
    /// Payload-free discriminant of this state.
    pub fn phase(&self) -> StatePhase {
        match self {
            Self::Idle => StatePhase::Idle,
            Self::Loading => StatePhase::Loading,
            Self::Loaded(_) => StatePhase::Loaded,
            Self::Error(_) => StatePhase::Error,
        }
    }

    /// Check if no operation is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Check if an operation is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The loaded value, if any.
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// The failure cause, if any.
    pub fn error(&self) -> Option<&E> {
        match self {
            Self::Error(cause) => Some(cause),
            _ => None,
        }
    }

    /// Transform the loaded value, keeping the phase.
    pub fn map<U, F>(self, f: F) -> AsyncState<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Idle => AsyncState::Idle,
            Self::Loading => AsyncState::Loading,
            Self::Loaded(value) => AsyncState::Loaded(f(value)),
            Self::Error(cause) => AsyncState::Error(cause),
        }
    }
}

impl<T, E> Default for AsyncState<T, E> {
    fn default() -> Self {
        Self::Idle
    }
}

/// Discriminant of an [`AsyncState`], used in transition errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatePhase {
    /// See [`AsyncState::Idle`]
    Idle,
    /// See [`AsyncState::Loading`]
    Loading,
    /// See [`AsyncState::Loaded`]
    Loaded,
    /// See [`AsyncState::Error`]
    Error,
}

impl StatePhase {
    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct CellInner<T, E> {
    state: AsyncState<T, E>,
    subscribers: Vec<mpsc::UnboundedSender<AsyncState<T, E>>>,
}

impl<T: Clone, E: Clone> CellInner<T, E> {
    fn publish(&mut self, next: AsyncState<T, E>) {
        self.subscribers
            .retain(|subscriber| subscriber.send(next.clone()).is_ok());
        self.state = next;
    }
}

/// A replay-latest broadcast cell holding the state of one async operation.
///
/// The cell enforces the `Idle -> Loading -> (Loaded | Error) -> Idle` cycle:
/// - `start()` is only valid from `Idle`
/// - `succeed()` / `fail()` are only valid from `Loading`
/// - `reset()` is always valid
///
/// Invalid transitions leave the cell untouched and return
/// [`ReactiveError::InvalidTransition`].
///
/// The cell is not `Clone`. Its owner mutates it; observers only receive a
/// [`StateStream`] from [`observe`](Self::observe).
pub struct AsyncStateCell<T, E> {
    inner: Mutex<CellInner<T, E>>,
}

impl<T, E> AsyncStateCell<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Create a new cell in the `Idle` state.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CellInner {
                state: AsyncState::Idle,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Move `Idle -> Loading`.
    pub fn start(&self) -> Result<(), ReactiveError> {
        self.transition(AsyncState::Loading, |from| from == StatePhase::Idle)
    }

    /// Move `Loading -> Loaded(value)`.
    pub fn succeed(&self, value: T) -> Result<(), ReactiveError> {
        self.transition(AsyncState::Loaded(value), |from| {
            from == StatePhase::Loading
        })
    }

    /// Move `Loading -> Error(cause)`.
    pub fn fail(&self, cause: E) -> Result<(), ReactiveError> {
        self.transition(AsyncState::Error(cause), |from| {
            from == StatePhase::Loading
        })
    }

    /// Move to `Idle` from any state.
    ///
    /// The transition is published even if the cell is already idle.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        tracing::trace!(from = %inner.state.phase(), to = %StatePhase::Idle, "async state reset");
        inner.publish(AsyncState::Idle);
    }

    /// Subscribe to the state of this cell.
    ///
    /// The returned stream yields the current state first, then every later
    /// transition in order. It never ends while the cell is alive.
    pub fn observe(&self) -> StateStream<T, E> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // The receiver is held locally, so this send cannot fail.
        let _ = tx.send(inner.state.clone());
        inner.subscribers.push(tx);
        StateStream { receiver: rx }
    }

    /// Get the current state.
    pub fn current(&self) -> AsyncState<T, E> {
        self.inner.lock().state.clone()
    }

    /// Number of subscribers that were alive at the last transition.
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|subscriber| !subscriber.is_closed());
        inner.subscribers.len()
    }

    fn transition(
        &self,
        next: AsyncState<T, E>,
        allowed: fn(StatePhase) -> bool,
    ) -> Result<(), ReactiveError> {
        let mut inner = self.inner.lock();
        let from = inner.state.phase();
        let to = next.phase();
        if !allowed(from) {
            tracing::warn!(%from, %to, "rejected async state transition");
            return Err(ReactiveError::invalid_transition(from, to));
        }
        tracing::trace!(%from, %to, "async state transition");
        inner.publish(next);
        Ok(())
    }
}

impl<T, E> Default for AsyncStateCell<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for AsyncStateCell<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AsyncStateCell")
            .field("state", &inner.state)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

/// Subscription to an [`AsyncStateCell`].
///
/// Dropping the stream unsubscribes it.
#[derive(Debug)]
pub struct StateStream<T, E> {
    receiver: mpsc::UnboundedReceiver<AsyncState<T, E>>,
}

impl<T, E> Stream for StateStream<T, E> {
    type Item = AsyncState<T, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
