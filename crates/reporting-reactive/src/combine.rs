//! StreamCombiner - N-ary "combine latest" over independently emitting sources
//!
//! Each source owns one slot holding its most recent value. Whenever any
//! source emits, its slot is overwritten and, once every slot is filled, the
//! combiner yields a fresh `Vec` with the latest value of every source in
//! source order.
//!
//! ## Semantics
//!
//! - **Cold-start gating**: nothing is emitted until every source has
//!   produced at least one value.
//! - **One emission per upstream emission** after gating; ties resolve in
//!   arrival order.
//! - **Errors** are forwarded once, then the combined stream ends.
//! - **Completion**: a source that completes without ever emitting ends the
//!   combined stream. Otherwise its last value stays in its slot and the
//!   combined stream ends when all sources have completed.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, SelectAll};
use futures::{ready, Stream, StreamExt};

/// Item flowing from one source into the combiner.
enum SourceEvent<T, E> {
    Item(Result<T, E>),
    Completed,
}

type IndexedSource<T, E> = BoxStream<'static, (usize, SourceEvent<T, E>)>;

/// Combine-latest stream over `N` homogeneous sources.
///
/// Heterogeneous sources are combined by mapping each of them into a common
/// enum before handing them to the combiner, then projecting the emitted slot
/// vector back into a typed record.
///
/// # Example
///
/// ```rust,ignore
/// let combined = StreamCombiner::new(vec![a.boxed(), b.boxed(), c.boxed()]);
/// // yields Ok(vec![a_latest, b_latest, c_latest]) on every source emission
/// ```
pub struct StreamCombiner<T, E> {
    sources: SelectAll<IndexedSource<T, E>>,
    /// Latest value per source, indexed by source position
    slots: Vec<Option<T>>,
    filled: usize,
    terminated: bool,
}

impl<T, E> StreamCombiner<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    /// Combine the given sources. Slot order follows the order of `sources`.
    pub fn new(sources: Vec<BoxStream<'static, Result<T, E>>>) -> Self {
        let arity = sources.len();
        let indexed = sources.into_iter().enumerate().map(|(index, source)| {
            source
                .map(move |item| (index, SourceEvent::Item(item)))
                .chain(stream::once(async move { (index, SourceEvent::Completed) }))
                .boxed()
        });

        Self {
            sources: stream::select_all(indexed),
            slots: vec![None; arity],
            filled: 0,
            terminated: arity == 0,
        }
    }

    /// Number of sources.
    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    /// Check if every source has produced at least one value.
    pub fn is_primed(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn store(&mut self, index: usize, value: T) {
        if self.slots[index].replace(value).is_none() {
            self.filled += 1;
        }
    }

    fn snapshot(&self) -> Vec<T> {
        self.slots.iter().flatten().cloned().collect()
    }
}

// Slots are plain values; nothing is structurally pinned.
impl<T, E> Unpin for StreamCombiner<T, E> {}

impl<T, E> Stream for StreamCombiner<T, E>
where
    T: Clone + Send + 'static,
    E: Send + 'static,
{
    type Item = Result<Vec<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.terminated {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.sources.poll_next_unpin(cx)) {
                Some((index, SourceEvent::Item(Ok(value)))) => {
                    this.store(index, value);
                    if this.is_primed() {
                        return Poll::Ready(Some(Ok(this.snapshot())));
                    }
                }
                Some((index, SourceEvent::Item(Err(err)))) => {
                    tracing::debug!(source = index, "combined source failed, terminating");
                    this.terminated = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Some((index, SourceEvent::Completed)) => {
                    if this.slots[index].is_none() {
                        tracing::debug!(
                            source = index,
                            "combined source completed before emitting, terminating"
                        );
                        this.terminated = true;
                        return Poll::Ready(None);
                    }
                }
                None => {
                    this.terminated = true;
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl<T, E> fmt::Debug for StreamCombiner<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCombiner")
            .field("arity", &self.slots.len())
            .field("filled", &self.filled)
            .field("terminated", &self.terminated)
            .finish()
    }
}
