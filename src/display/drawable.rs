//! Display Drawables - Render-side mirror nodes
//!
//! A mirror is deliberately dumber than its logical counterpart: it keeps
//! the kind name (not the kind), the last styles it was told about, and
//! its place in the mirrored tree. It validates nothing and decides
//! nothing; whatever arrives in events is the truth. That asymmetry is
//! what lets any number of display backends trust the same stream.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::event::SubscriptionId;
use crate::registry::DrawableId;
use crate::types::{StyleMap, StyleValue};

struct DisplayInner {
    id: DrawableId,
    kind_name: String,
    styles: RefCell<StyleMap>,
    parent: RefCell<Option<WeakDisplayDrawable>>,
    children: RefCell<Vec<DisplayDrawable>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

/// Handle to one mirror node. Clones share the node.
#[derive(Clone)]
pub struct DisplayDrawable {
    inner: Rc<DisplayInner>,
}

/// Non-owning handle to a mirror.
#[derive(Clone)]
pub struct WeakDisplayDrawable {
    inner: Weak<DisplayInner>,
}

impl WeakDisplayDrawable {
    pub fn upgrade(&self) -> Option<DisplayDrawable> {
        self.inner.upgrade().map(|inner| DisplayDrawable { inner })
    }
}

impl DisplayDrawable {
    pub(crate) fn new(id: DrawableId, kind_name: String, styles: StyleMap) -> DisplayDrawable {
        DisplayDrawable {
            inner: Rc::new(DisplayInner {
                id,
                kind_name,
                styles: RefCell::new(styles),
                parent: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The linkable id shared with the logical drawable.
    #[inline]
    pub fn id(&self) -> DrawableId {
        self.inner.id
    }

    /// The kind name the `create` event carried.
    #[inline]
    pub fn kind_name(&self) -> &str {
        &self.inner.kind_name
    }

    /// Current value of one style, if set.
    pub fn style(&self, name: &str) -> Option<StyleValue> {
        self.inner.styles.borrow().get(name).cloned()
    }

    /// Snapshot of the mirrored styles.
    pub fn styles(&self) -> StyleMap {
        self.inner.styles.borrow().clone()
    }

    /// Current parent mirror, if linked.
    pub fn parent(&self) -> Option<DisplayDrawable> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(WeakDisplayDrawable::upgrade)
    }

    /// Child mirrors in link order.
    pub fn children(&self) -> Vec<DisplayDrawable> {
        self.inner.children.borrow().clone()
    }

    /// True if both handles name the same mirror.
    #[inline]
    pub fn ptr_eq(&self, other: &DisplayDrawable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakDisplayDrawable {
        WeakDisplayDrawable {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Folds `changes` over the mirrored styles.
    pub(crate) fn apply_changes(&self, changes: &StyleMap) {
        let mut styles = self.inner.styles.borrow_mut();
        for (name, value) in changes {
            styles.insert(name.clone(), value.clone());
        }
    }

    pub(crate) fn add_child(&self, child: DisplayDrawable) {
        self.inner.children.borrow_mut().push(child);
    }

    /// Drops the link to the child mirror with `id`. Absence is logged and
    /// tolerated, mirroring the logical side's behavior.
    pub(crate) fn remove_child(&self, id: DrawableId) {
        let mut children = self.inner.children.borrow_mut();
        let before = children.len();
        children.retain(|child| child.id() != id);
        if children.len() == before {
            log::warn!(
                "display: removing child {} that is not linked under {}",
                id,
                self.id()
            );
        }
    }

    pub(crate) fn set_parent_link(&self, parent: Option<&DisplayDrawable>) {
        *self.inner.parent.borrow_mut() = parent.map(DisplayDrawable::downgrade);
    }

    pub(crate) fn record_subscription(&self, sub: SubscriptionId) {
        self.inner.subscriptions.borrow_mut().push(sub);
    }

    pub(crate) fn take_subscriptions(&self) -> Vec<SubscriptionId> {
        self.inner.subscriptions.borrow_mut().drain(..).collect()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }
}

impl fmt::Debug for DisplayDrawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayDrawable")
            .field("id", &self.id())
            .field("kind", &self.kind_name())
            .field("children", &self.child_count())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for WeakDisplayDrawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(mirror) => write!(f, "WeakDisplayDrawable({})", mirror.id()),
            None => f.write_str("WeakDisplayDrawable(dead)"),
        }
    }
}
