//! # Reactive Primitives for Asynchronous Operation Tracking
//!
//! This crate provides the reactive building blocks used by screen
//! coordinators to publish the lifecycle of asynchronous operations and to
//! fuse several independently-updating sources into one view.
//!
//! ## Core Types
//!
//! - [`AsyncState<T, E>`]: The lifecycle of one asynchronous operation
//!   (`Idle`, `Loading`, `Loaded`, `Error`).
//!
//! - [`AsyncStateCell<T, E>`]: A replay-latest broadcast holder of an
//!   `AsyncState`. New subscribers receive the current state immediately,
//!   then every later transition in order.
//!
//! - [`StreamCombiner<T, E>`]: An N-ary "combine latest" stream that emits the
//!   latest value of every source whenever any source emits.
//!
//! - [`TaskRegistry`] / [`CancellationToken`]: Ownership of background work
//!   and cooperative cancellation for tasks tied to an owner's lifetime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use reporting_reactive::{AsyncState, AsyncStateCell};
//!
//! let cell: AsyncStateCell<u32, String> = AsyncStateCell::new();
//! let mut states = cell.observe();
//!
//! cell.start()?;
//! cell.succeed(7)?;
//! cell.reset();
//!
//! // states yields: Idle, Loading, Loaded(7), Idle
//! ```

mod async_state;
mod combine;
mod errors;
mod task;

pub use async_state::{AsyncState, AsyncStateCell, StatePhase, StateStream};
pub use combine::StreamCombiner;
pub use errors::ReactiveError;
pub use task::{CancellationToken, TaskRegistry};
