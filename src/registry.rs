//! Linkable Registry - Identity allocation and id-to-drawable lookup
//!
//! Every drawable is assigned a small integer id at construction and keeps
//! it for life. The same id names the logical drawable on the application
//! side and its mirror on the display side; events carry ids, never object
//! references, so the two trees stay decoupled.
//!
//! Ids come from a process-wide counter and are never reused, even after
//! the drawable they named is destroyed. A stale id in a log or a late
//! event therefore never aliases a newer drawable.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

// =============================================================================
// Drawable Ids
// =============================================================================

/// Process-wide id source. Starts at 1 so 0 never names a drawable and can
/// serve as a sentinel in external protocols.
static NEXT_DRAWABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identifier shared by a logical drawable and its display mirror.
///
/// Ids are allocated strictly increasing and never recycled. Two ids
/// allocated in one process are equal only if they came from the same
/// allocation.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(u64);

impl DrawableId {
    /// Allocates a fresh id, strictly greater than every id allocated
    /// before it in this process. Never blocks, never fails.
    #[inline]
    pub fn next() -> Self {
        DrawableId(NEXT_DRAWABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw integer, for logs and external protocols.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DrawableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Id-keyed table of live entries, shared by cheap clone.
///
/// Both sides of the toolkit keep one: the logical tree registers weak
/// drawable handles, the display tree registers its mirrors. The registry
/// enforces the one-entry-per-id rule; everything else (what an entry is,
/// when it dies) belongs to the caller.
pub struct LinkableRegistry<T> {
    entries: Rc<RefCell<HashMap<DrawableId, T>>>,
}

impl<T> Clone for LinkableRegistry<T> {
    fn clone(&self) -> Self {
        LinkableRegistry {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<T> Default for LinkableRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LinkableRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        LinkableRegistry {
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Registers `entry` under `id`.
    ///
    /// # Returns
    /// `Err(DuplicateRegistration)` if the id already has an entry. The
    /// existing entry is left untouched.
    pub fn register(&self, id: DrawableId, entry: T) -> Result<()> {
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&id) {
            return Err(Error::DuplicateRegistration(id));
        }
        entries.insert(id, entry);
        Ok(())
    }

    /// Removes the entry under `id`, if any. Unregistering an absent id is
    /// a no-op, so teardown paths can call this unconditionally.
    pub fn unregister(&self, id: DrawableId) {
        self.entries.borrow_mut().remove(&id);
    }

    /// True if `id` currently has an entry.
    #[inline]
    pub fn contains(&self, id: DrawableId) -> bool {
        self.entries.borrow().contains_key(&id)
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// True if no entries are registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// All registered ids, ascending. Iteration helper for teardown and
    /// diagnostics; the order is stable even though storage is hashed.
    pub fn ids(&self) -> Vec<DrawableId> {
        let mut ids: Vec<DrawableId> = self.entries.borrow().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drops every entry. Ids stay burned; a cleared registry never
    /// re-issues an old id.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

// Lookup hands out clones, so only lookup needs the bound.
impl<T: Clone> LinkableRegistry<T> {
    /// Looks up the entry under `id`.
    ///
    /// # Returns
    /// A clone of the entry, or `Err(NoSuchLinkableId)` if absent.
    pub fn lookup(&self, id: DrawableId) -> Result<T> {
        self.entries
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(Error::NoSuchLinkableId(id))
    }

    /// Looks up the entry under `id`, `None` if absent.
    pub fn lookup_opt(&self, id: DrawableId) -> Option<T> {
        self.entries.borrow().get(&id).cloned()
    }
}

impl<T> fmt::Debug for LinkableRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkableRegistry")
            .field("len", &self.entries.borrow().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
