//! Event Bus - Publish/subscribe switchboard with fixed dispatch order
//!
//! Subscriptions are partitioned into four buckets by the shape of their
//! filters, and every dispatch walks the buckets in one fixed order:
//!
//! ```text
//! 1. same name, any target        (name-wide listeners)
//! 2. same name, same target       (the common per-drawable binding)
//! 3. any name,  any target        (relays, loggers)
//! 4. any name,  same target       (per-drawable taps)
//! ```
//!
//! Within a bucket, subscription order is delivery order. A subscription
//! lives in exactly one bucket, so no handler ever runs twice for one
//! dispatch.
//!
//! Handlers run outside any internal borrow, so they may freely subscribe,
//! unsubscribe, and dispatch again. Nested dispatch is cut off at
//! [`MAX_DISPATCH_DEPTH`] to turn handler feedback loops into an error
//! instead of a stack overflow.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};

use super::{Event, EventName, NameFilter, Target, TargetFilter};

/// Nested dispatch levels allowed before [`EventBus::dispatch`] refuses.
pub const MAX_DISPATCH_DEPTH: u32 = 32;

// =============================================================================
// Subscriptions
// =============================================================================

/// Handle naming one subscription on one bus. Allocated monotonically per
/// bus; never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Rc<dyn Fn(&Event)>;

struct Subscription {
    name: NameFilter,
    target: TargetFilter,
    handler: Handler,
}

/// The four buckets plus the handler table. Bucket vecs hold ids in
/// subscription order; `subscriptions` owns the filters and handlers.
#[derive(Default)]
struct DispatchTable {
    /// Bucket 1: same name, any target.
    by_name: HashMap<EventName, Vec<SubscriptionId>>,
    /// Bucket 2: same name, same target.
    by_name_and_target: HashMap<(EventName, Target), Vec<SubscriptionId>>,
    /// Bucket 3: any name, any target.
    relays: Vec<SubscriptionId>,
    /// Bucket 4: any name, same target.
    by_target: HashMap<Target, Vec<SubscriptionId>>,
    subscriptions: HashMap<SubscriptionId, Subscription>,
}

impl DispatchTable {
    fn insert(&mut self, id: SubscriptionId, sub: Subscription) {
        match (sub.name, sub.target) {
            (NameFilter::Name(name), TargetFilter::Any) => {
                self.by_name.entry(name).or_default().push(id);
            }
            (NameFilter::Name(name), TargetFilter::At(target)) => {
                self.by_name_and_target
                    .entry((name, target))
                    .or_default()
                    .push(id);
            }
            (NameFilter::Any, TargetFilter::Any) => {
                self.relays.push(id);
            }
            (NameFilter::Any, TargetFilter::At(target)) => {
                self.by_target.entry(target).or_default().push(id);
            }
        }
        self.subscriptions.insert(id, sub);
    }

    fn remove(&mut self, id: SubscriptionId) {
        let Some(sub) = self.subscriptions.remove(&id) else {
            return;
        };
        match (sub.name, sub.target) {
            (NameFilter::Name(name), TargetFilter::Any) => {
                if let Some(ids) = self.by_name.get_mut(&name) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.by_name.remove(&name);
                    }
                }
            }
            (NameFilter::Name(name), TargetFilter::At(target)) => {
                if let Some(ids) = self.by_name_and_target.get_mut(&(name, target)) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.by_name_and_target.remove(&(name, target));
                    }
                }
            }
            (NameFilter::Any, TargetFilter::Any) => {
                self.relays.retain(|other| *other != id);
            }
            (NameFilter::Any, TargetFilter::At(target)) => {
                if let Some(ids) = self.by_target.get_mut(&target) {
                    ids.retain(|other| *other != id);
                    if ids.is_empty() {
                        self.by_target.remove(&target);
                    }
                }
            }
        }
    }

    /// Matching subscription ids for `event`, in delivery order.
    fn matches(&self, event: &Event) -> Vec<SubscriptionId> {
        let mut out = Vec::new();
        if let Some(ids) = self.by_name.get(&event.name) {
            out.extend_from_slice(ids);
        }
        if let Some(ids) = self.by_name_and_target.get(&(event.name, event.target)) {
            out.extend_from_slice(ids);
        }
        out.extend_from_slice(&self.relays);
        if let Some(ids) = self.by_target.get(&event.target) {
            out.extend_from_slice(ids);
        }
        out
    }
}

// =============================================================================
// Bus
// =============================================================================

struct BusInner {
    table: RefCell<DispatchTable>,
    next_id: Cell<u64>,
    depth: Cell<u32>,
}

/// Restores the pre-dispatch depth on scope exit, panicking handlers
/// included.
struct DepthGuard<'a> {
    depth: &'a Cell<u32>,
    restore: u32,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.restore);
    }
}

/// The switchboard both trees talk through. Cheap to clone; clones share
/// one dispatch table.
///
/// Single-threaded by construction (handlers are `Rc`-held closures); one
/// bus belongs to one UI thread.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        EventBus {
            inner: Rc::new(BusInner {
                table: RefCell::new(DispatchTable::default()),
                next_id: Cell::new(1),
                depth: Cell::new(0),
            }),
        }
    }

    /// Registers `handler` for events matching both filters.
    ///
    /// Plain values convert into filters, so the common forms read
    /// naturally: `subscribe(EventName::Click, button_id, ...)` for a
    /// per-drawable binding, `subscribe(NameFilter::Any, TargetFilter::Any,
    /// ...)` for a relay.
    ///
    /// A subscription made while a dispatch is running is not consulted by
    /// that dispatch; it sees the next one.
    ///
    /// # Returns
    /// The subscription's id, for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(
        &self,
        name: impl Into<NameFilter>,
        target: impl Into<TargetFilter>,
        handler: impl Fn(&Event) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        self.inner.table.borrow_mut().insert(
            id,
            Subscription {
                name: name.into(),
                target: target.into(),
                handler: Rc::new(handler),
            },
        );
        id
    }

    /// Removes one subscription. Unknown (or already removed) ids are a
    /// quiet no-op, so owners can unsubscribe unconditionally on teardown.
    ///
    /// Removing a subscription mid-dispatch also suppresses it for the
    /// remainder of that dispatch if it has not run yet.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.table.borrow_mut().remove(id);
    }

    /// Delivers `event` to every matching subscription, in bucket order
    /// (see module docs), subscription order within each bucket.
    ///
    /// Handlers run with no internal borrow held, so re-entrant bus calls
    /// are fine up to [`MAX_DISPATCH_DEPTH`] nested levels.
    ///
    /// # Returns
    /// `Err(DispatchDepthExceeded)` if called from a handler already
    /// `MAX_DISPATCH_DEPTH` dispatches deep; the event is not delivered.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        let depth = self.inner.depth.get();
        if depth >= MAX_DISPATCH_DEPTH {
            return Err(Error::DispatchDepthExceeded(MAX_DISPATCH_DEPTH));
        }
        log::trace!("dispatch {} -> {:?}", event.name, event.target);

        // Snapshot first: mutations from inside handlers must not disturb
        // this dispatch's delivery list.
        let matched = self.inner.table.borrow().matches(event);

        self.inner.depth.set(depth + 1);
        let _guard = DepthGuard {
            depth: &self.inner.depth,
            restore: depth,
        };
        for id in matched {
            // Re-check liveness at call time; a handler earlier in this
            // dispatch may have unsubscribed this one.
            let handler = self
                .inner
                .table
                .borrow()
                .subscriptions
                .get(&id)
                .map(|sub| Rc::clone(&sub.handler));
            if let Some(handler) = handler {
                handler(event);
            }
        }
        Ok(())
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.table.borrow().subscriptions.len()
    }

    /// Drops every subscription. Meant for teardown; in-flight dispatches
    /// see their remaining handlers vanish.
    pub fn clear(&self) {
        *self.inner.table.borrow_mut() = DispatchTable::default();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .field("depth", &self.inner.depth.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
