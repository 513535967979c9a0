//! Render Sinks - Where the mirrored tree hands off to a real backend
//!
//! The display service forwards every mirrored mutation to a sink. A real
//! backend would turn the calls into markup or draw commands; this crate
//! ships two passive ones: [`NullSink`] for headless operation and
//! [`RecordingSink`] for asserting on the exact operation stream in tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::registry::DrawableId;
use crate::types::StyleMap;

/// Receiver for mirrored tree mutations, called in event arrival order.
///
/// Sinks are passive: they must not dispatch onto the bus from inside a
/// callback (the service is mid-delivery when it calls them). Injecting
/// UI events afterwards is what the service's own methods are for.
pub trait RenderSink {
    /// A mirror was created, with its finalized styles and parent.
    fn create_drawable(
        &mut self,
        id: DrawableId,
        kind: &str,
        styles: &StyleMap,
        parent: Option<DrawableId>,
    ) {
        let _ = (id, kind, styles, parent);
    }

    /// Styles of one mirror changed; `changes` holds only the changed
    /// entries.
    fn update_drawable(&mut self, id: DrawableId, changes: &StyleMap) {
        let _ = (id, changes);
    }

    /// One mirror moved to a new parent (`None` for detached).
    fn reparent_drawable(&mut self, id: DrawableId, parent: Option<DrawableId>) {
        let _ = (id, parent);
    }

    /// One mirror's life ended.
    fn destroy_drawable(&mut self, id: DrawableId) {
        let _ = id;
    }
}

// =============================================================================
// Null Sink
// =============================================================================

/// Sink that ignores everything. The display tree still mirrors faithfully,
/// so headless sessions (tests, scripted runs) behave exactly like rendered
/// ones minus the output.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {}

// =============================================================================
// Recording Sink
// =============================================================================

/// One operation observed by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum SinkOp {
    Create {
        id: DrawableId,
        kind: String,
        parent: Option<DrawableId>,
        styles: StyleMap,
    },
    Update {
        id: DrawableId,
        changes: StyleMap,
    },
    Reparent {
        id: DrawableId,
        parent: Option<DrawableId>,
    },
    Destroy {
        id: DrawableId,
    },
}

/// Sink that appends every operation to a shared log. Clones share the
/// log, so tests keep one handle while the service owns the other.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    ops: Rc<RefCell<Vec<SinkOp>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn ops(&self) -> Vec<SinkOp> {
        self.ops.borrow().clone()
    }

    /// Drains the log, returning what was recorded. Lets a test assert on
    /// one phase at a time.
    pub fn take(&self) -> Vec<SinkOp> {
        self.ops.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.ops.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.borrow().is_empty()
    }
}

impl RenderSink for RecordingSink {
    fn create_drawable(
        &mut self,
        id: DrawableId,
        kind: &str,
        styles: &StyleMap,
        parent: Option<DrawableId>,
    ) {
        self.ops.borrow_mut().push(SinkOp::Create {
            id,
            kind: kind.to_string(),
            parent,
            styles: styles.clone(),
        });
    }

    fn update_drawable(&mut self, id: DrawableId, changes: &StyleMap) {
        self.ops.borrow_mut().push(SinkOp::Update {
            id,
            changes: changes.clone(),
        });
    }

    fn reparent_drawable(&mut self, id: DrawableId, parent: Option<DrawableId>) {
        self.ops.borrow_mut().push(SinkOp::Reparent { id, parent });
    }

    fn destroy_drawable(&mut self, id: DrawableId) {
        self.ops.borrow_mut().push(SinkOp::Destroy { id });
    }
}
