use crate::{IntersectionKind, Segment};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// One detected intersection. `first.id < second.id` always holds, so a pair
/// has a single possible representation.
#[derive(Debug, Clone, Copy)]
pub struct IntersectionEvent<'a> {
    pub first: &'a Segment,
    pub second: &'a Segment,
    pub kind: IntersectionKind,
}

/// Shared accumulators for one collision pass: a monotonic counter plus the
/// append-only event list. Any number of build tasks may record into it
/// concurrently; the order of events across branches is unspecified.
#[derive(Debug, Default)]
pub struct CollisionReport<'a> {
    collisions: AtomicUsize,
    events: Mutex<Vec<IntersectionEvent<'a>>>,
}

impl<'a> CollisionReport<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, event: IntersectionEvent<'a>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.collisions.load(Ordering::Relaxed)
    }

    /// Drain the accumulated events, leaving the report empty. The counter
    /// is reset along with the list so the report can be reused next step.
    pub fn take_events(&self) -> Vec<IntersectionEvent<'a>> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        self.collisions.store(0, Ordering::Relaxed);
        mem::take(&mut *events)
    }

    pub fn into_events(self) -> Vec<IntersectionEvent<'a>> {
        self.events
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
