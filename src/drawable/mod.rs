//! Drawable Tree - The logical, application-facing side of the toolkit
//!
//! A [`Drawable`] is a cheap-clone handle to one logical UI node: its kind,
//! its validated styles, its place in the tree, and its event bindings.
//! Drawables never talk to the display side directly; every observable
//! change goes out as an event (`create`, `prop_change`, `parent`,
//! `destroy`) and the display tree rebuilds itself from that stream alone.
//!
//! Parents hold their children strongly and children point back weakly, so
//! a detached subtree is dropped as soon as the application lets go of its
//! handles.

pub mod schema;

mod slot;

pub use schema::{Features, WidgetDef};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::{Error, Result};
use crate::event::{Event, EventBus, EventName, SubscriptionId};
use crate::registry::{DrawableId, LinkableRegistry};
use crate::types::{StyleMap, StyleValue};

// =============================================================================
// Kinds
// =============================================================================

/// The closed set of drawable kinds.
///
/// Built-in kinds carry their schema in static tables; custom kinds carry
/// it in their shared [`WidgetDef`].
#[derive(Clone, Debug)]
pub enum DrawableKind {
    /// The tree root; the app surface itself. Exactly one per session.
    Root,
    /// Vertical container.
    Stack,
    /// Horizontal container.
    Flow,
    /// Push button.
    Button,
    /// Paragraph of text.
    Para,
    /// Single-line text input.
    EditLine,
    /// Filled rectangle.
    Rect,
    /// Application-defined kind, schema supplied at registration.
    Widget(Rc<WidgetDef>),
}

impl DrawableKind {
    /// The kind name, as it appears in events, errors and logs.
    pub fn name(&self) -> &str {
        match self {
            DrawableKind::Root => "root",
            DrawableKind::Stack => "stack",
            DrawableKind::Flow => "flow",
            DrawableKind::Button => "button",
            DrawableKind::Para => "para",
            DrawableKind::EditLine => "edit_line",
            DrawableKind::Rect => "rect",
            DrawableKind::Widget(def) => def.name(),
        }
    }

    /// True if drawables of this kind hold children.
    pub fn is_container(&self) -> bool {
        match self {
            DrawableKind::Root | DrawableKind::Stack | DrawableKind::Flow => true,
            DrawableKind::Widget(def) => def.is_container(),
            _ => false,
        }
    }
}

// =============================================================================
// Draw Context
// =============================================================================

/// Ambient drawing state of one slot: the colors and transform that apply
/// to drawables constructed inside it unless they say otherwise. A child
/// slot starts with a copy of its parent's context, so changes never leak
/// back out.
#[derive(Clone, Debug, Default)]
pub(crate) struct DrawContext {
    pub fill: Option<StyleValue>,
    pub stroke: Option<StyleValue>,
    pub rotate: Option<StyleValue>,
}

impl DrawContext {
    /// The context as `(style name, value)` pairs, for the construction
    /// merge. Entries for styles the receiving kind lacks are skipped by
    /// the caller.
    pub fn entries(&self) -> Vec<(&'static str, StyleValue)> {
        let mut out = Vec::new();
        if let Some(fill) = &self.fill {
            out.push(("fill", fill.clone()));
        }
        if let Some(stroke) = &self.stroke {
            out.push(("stroke", stroke.clone()));
        }
        if let Some(rotate) = &self.rotate {
            out.push(("rotate", rotate.clone()));
        }
        out
    }
}

// =============================================================================
// Handles
// =============================================================================

pub(crate) struct DrawableInner {
    id: DrawableId,
    kind: DrawableKind,
    features: Features,
    styles: RefCell<StyleMap>,
    parent: RefCell<Option<WeakDrawable>>,
    children: RefCell<Vec<Drawable>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    draw_context: RefCell<DrawContext>,
    destroyed: Cell<bool>,
    bus: EventBus,
    registry: LinkableRegistry<WeakDrawable>,
}

/// Handle to one logical drawable. Clones share the node.
#[derive(Clone)]
pub struct Drawable {
    inner: Rc<DrawableInner>,
}

/// Non-owning handle to a drawable; upgrades while any strong handle (or
/// the parent link from its container) keeps the node alive.
#[derive(Clone)]
pub struct WeakDrawable {
    inner: Weak<DrawableInner>,
}

impl WeakDrawable {
    /// The strong handle, if the node is still alive.
    pub fn upgrade(&self) -> Option<Drawable> {
        self.inner.upgrade().map(|inner| Drawable { inner })
    }
}

impl fmt::Debug for WeakDrawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.upgrade() {
            Some(inner) => write!(f, "WeakDrawable({})", inner.id),
            None => f.write_str("WeakDrawable(dead)"),
        }
    }
}

impl fmt::Debug for Drawable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drawable")
            .field("id", &self.id())
            .field("kind", &self.kind_name())
            .field("children", &self.inner.children.borrow().len())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

impl Drawable {
    /// Bare node allocation. Registration, parenting and the `create`
    /// announcement are the session's job; nothing is visible on the bus
    /// until it does them.
    pub(crate) fn new(
        kind: DrawableKind,
        styles: StyleMap,
        features: Features,
        bus: EventBus,
        registry: LinkableRegistry<WeakDrawable>,
    ) -> Drawable {
        Drawable {
            inner: Rc::new(DrawableInner {
                id: DrawableId::next(),
                kind,
                features,
                styles: RefCell::new(styles),
                parent: RefCell::new(None),
                children: RefCell::new(Vec::new()),
                subscriptions: RefCell::new(Vec::new()),
                draw_context: RefCell::new(DrawContext::default()),
                destroyed: Cell::new(false),
                bus,
                registry,
            }),
        }
    }

    /// The linkable id shared with this drawable's display mirror.
    #[inline]
    pub fn id(&self) -> DrawableId {
        self.inner.id
    }

    /// The drawable's kind.
    #[inline]
    pub fn kind(&self) -> &DrawableKind {
        &self.inner.kind
    }

    /// Shorthand for `kind().name()`.
    #[inline]
    pub fn kind_name(&self) -> &str {
        self.inner.kind.name()
    }

    /// True if this kind holds children.
    #[inline]
    pub fn is_container(&self) -> bool {
        self.inner.kind.is_container()
    }

    /// True once [`destroy`](Self::destroy) has run.
    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// True if both handles name the same node.
    #[inline]
    pub fn ptr_eq(&self, other: &Drawable) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A weak handle to this node.
    pub fn downgrade(&self) -> WeakDrawable {
        WeakDrawable {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Current parent, if attached.
    pub fn parent(&self) -> Option<Drawable> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(WeakDrawable::upgrade)
    }

    /// Children in document order (append order).
    pub fn children(&self) -> Vec<Drawable> {
        self.inner.children.borrow().clone()
    }

    // =========================================================================
    // Styles
    // =========================================================================

    /// Current value of one style, if set.
    pub fn style(&self, name: &str) -> Option<StyleValue> {
        self.inner.styles.borrow().get(name).cloned()
    }

    /// Snapshot of every set style.
    pub fn styles(&self) -> StyleMap {
        self.inner.styles.borrow().clone()
    }

    /// Sets one style.
    ///
    /// The value goes through the kind's validator, is stored, and goes out
    /// as a single-entry `prop_change` event. Unknown names, gated features
    /// and rejected values error without storing or announcing anything.
    pub fn set_style(&self, name: &str, value: impl Into<StyleValue>) -> Result<()> {
        let mut changes = StyleMap::new();
        changes.insert(name.to_string(), value.into());
        self.update_styles(changes)
    }

    /// Sets several styles as one change.
    ///
    /// All values are validated before any is stored; one bad entry means
    /// nothing changes. The stored batch goes out as one `prop_change`
    /// event carrying every changed style; an announcement refused at the
    /// dispatch depth cap rolls the batch back, so `Err` always leaves the
    /// styles as they were. An empty batch does nothing.
    pub fn update_styles(&self, changes: StyleMap) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.id()));
        }
        if changes.is_empty() {
            return Ok(());
        }

        let mut validated = StyleMap::with_capacity(changes.len());
        for (name, value) in changes {
            let canonical =
                schema::validate_style(&self.inner.kind, self.inner.features, &name, value)?;
            validated.insert(name, canonical);
        }

        let mut previous = Vec::with_capacity(validated.len());
        {
            let mut styles = self.inner.styles.borrow_mut();
            for (name, value) in &validated {
                previous.push((name.clone(), styles.insert(name.clone(), value.clone())));
            }
        }

        if let Err(err) = self
            .inner
            .bus
            .dispatch(&Event::prop_change(self.id(), validated))
        {
            let mut styles = self.inner.styles.borrow_mut();
            for (name, old) in previous {
                match old {
                    Some(old) => {
                        styles.insert(name, old);
                    }
                    None => {
                        styles.shift_remove(&name);
                    }
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// True if the `hidden` style is set.
    pub fn is_hidden(&self) -> bool {
        self.style("hidden")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Clears the `hidden` style.
    pub fn show(&self) -> Result<()> {
        self.set_style("hidden", false)
    }

    /// Sets the `hidden` style.
    pub fn hide(&self) -> Result<()> {
        self.set_style("hidden", true)
    }

    /// Flips the `hidden` style.
    pub fn toggle(&self) -> Result<()> {
        self.set_style("hidden", !self.is_hidden())
    }

    // =========================================================================
    // Event Bindings
    // =========================================================================

    /// Binds `handler` to `event` on this drawable.
    ///
    /// The subscription targets this drawable's id and is torn down with
    /// the drawable. Binding an event the kind never emits is refused, so
    /// dead handlers are caught at bind time rather than waiting forever.
    pub fn bind(
        &self,
        event: EventName,
        handler: impl Fn(&Event) + 'static,
    ) -> Result<SubscriptionId> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.id()));
        }
        if !schema::event_permitted(&self.inner.kind, event) {
            return Err(Error::EventNotSupported {
                kind: self.kind_name().to_string(),
                event,
            });
        }
        let sub = self.inner.bus.subscribe(event, self.id(), handler);
        self.inner.subscriptions.borrow_mut().push(sub);
        Ok(sub)
    }

    /// Removes one binding made through [`bind`](Self::bind) (or the `on_*`
    /// helpers). Unknown ids are a quiet no-op.
    pub fn unbind(&self, sub: SubscriptionId) {
        self.inner
            .subscriptions
            .borrow_mut()
            .retain(|other| *other != sub);
        self.inner.bus.unsubscribe(sub);
    }

    /// Binds a click handler.
    pub fn on_click(&self, handler: impl Fn() + 'static) -> Result<SubscriptionId> {
        self.bind(EventName::Click, move |_| handler())
    }

    /// Binds a pointer-enter handler.
    pub fn on_hover(&self, handler: impl Fn() + 'static) -> Result<SubscriptionId> {
        self.bind(EventName::Hover, move |_| handler())
    }

    /// Binds a pointer-exit handler.
    pub fn on_leave(&self, handler: impl Fn() + 'static) -> Result<SubscriptionId> {
        self.bind(EventName::Leave, move |_| handler())
    }

    /// Binds a pointer-motion handler; receives coordinates relative to
    /// this drawable.
    pub fn on_motion(&self, handler: impl Fn(f64, f64) + 'static) -> Result<SubscriptionId> {
        self.bind(EventName::Motion, move |ev| {
            if let Some((x, y)) = ev.position() {
                handler(x, y);
            }
        })
    }

    /// Binds a text-change handler; receives the new text.
    ///
    /// For edit lines the logical `text` style has already been synced when
    /// the handler runs, so reading it back agrees with the argument.
    pub fn on_change(&self, handler: impl Fn(&str) + 'static) -> Result<SubscriptionId> {
        self.bind(EventName::Change, move |ev| {
            if let Some(text) = ev.text() {
                handler(text);
            }
        })
    }

    /// Installs the display-to-logical text sync on editable kinds. Must
    /// run at construction, before application bindings, so its handler
    /// sits first in the bucket and user `change` handlers observe the
    /// updated style.
    pub(crate) fn install_text_sync(&self) -> Result<()> {
        if !matches!(self.inner.kind, DrawableKind::EditLine) {
            return Ok(());
        }
        let weak = self.downgrade();
        self.bind(EventName::Change, move |ev| {
            let Some(drawable) = weak.upgrade() else {
                return;
            };
            if let Some(text) = ev.text() {
                if let Err(err) = drawable.set_style("text", text) {
                    log::warn!("edit_line {}: text sync failed: {err}", drawable.id());
                }
            }
        })?;
        Ok(())
    }

    // =========================================================================
    // Tree Links
    // =========================================================================

    /// Moves this drawable under `parent`, or detaches it with `None`.
    ///
    /// The old parent (if any) drops its link first, then the new one gains
    /// it at the end of its children. The move goes out as one `parent`
    /// event; the display tree performs the same relink when it arrives.
    ///
    /// Moving a drawable under itself or one of its descendants is refused
    /// with `ParentCycle`. An announcement refused at the dispatch depth
    /// cap restores the old link, sibling position included, so `Err`
    /// always means nothing moved.
    pub fn set_parent(&self, parent: Option<&Drawable>) -> Result<()> {
        self.reparent(parent, true)
    }

    /// The relink itself, with the announcement optional. Construction
    /// suppresses it because the initial parent already rides inside the
    /// `create` event.
    pub(crate) fn reparent(&self, parent: Option<&Drawable>, announce: bool) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.id()));
        }
        if let Some(parent) = parent {
            if parent.is_destroyed() {
                return Err(Error::Destroyed(parent.id()));
            }
            if !parent.is_container() {
                return Err(Error::NotAContainer {
                    kind: parent.kind_name().to_string(),
                });
            }
            // A drawable may not become its own ancestor.
            let mut ancestor = Some(parent.clone());
            while let Some(node) = ancestor {
                if node.id() == self.id() {
                    return Err(Error::ParentCycle {
                        id: self.id(),
                        parent: parent.id(),
                    });
                }
                ancestor = node.parent();
            }
        }

        let old_parent = self
            .inner
            .parent
            .borrow_mut()
            .take()
            .and_then(|weak| weak.upgrade());
        let old_index = old_parent
            .as_ref()
            .and_then(|old| old.child_position(self.id()));
        if let Some(old) = &old_parent {
            old.remove_child(self);
        }
        if let Some(parent) = parent {
            parent.add_child(self.clone());
            *self.inner.parent.borrow_mut() = Some(parent.downgrade());
        }

        if announce {
            if let Err(err) = self
                .inner
                .bus
                .dispatch(&Event::parent_change(self.id(), parent.map(Drawable::id)))
            {
                // Refused announcement: put the link back where it was.
                if let Some(parent) = parent {
                    parent.remove_child(self);
                }
                *self.inner.parent.borrow_mut() = old_parent.as_ref().map(Drawable::downgrade);
                if let Some(old) = &old_parent {
                    old.restore_child(old_index, self.clone());
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn add_child(&self, child: Drawable) {
        self.inner.children.borrow_mut().push(child);
    }

    fn child_position(&self, id: DrawableId) -> Option<usize> {
        self.inner
            .children
            .borrow()
            .iter()
            .position(|child| child.id() == id)
    }

    /// Re-links `child` at `index` (end of the list if out of range) after
    /// a rolled-back move.
    fn restore_child(&self, index: Option<usize>, child: Drawable) {
        let mut children = self.inner.children.borrow_mut();
        match index {
            Some(index) if index <= children.len() => children.insert(index, child),
            _ => children.push(child),
        }
    }

    /// Drops the link to `child`. A child that is not actually linked is
    /// logged and tolerated: the tree is already in the state the caller
    /// wanted.
    pub(crate) fn remove_child(&self, child: &Drawable) {
        let mut children = self.inner.children.borrow_mut();
        let before = children.len();
        children.retain(|other| other.id() != child.id());
        if children.len() == before {
            log::warn!(
                "drawable {}: removing child {} that is not linked here",
                self.id(),
                child.id()
            );
        }
    }

    // =========================================================================
    // Destruction
    // =========================================================================

    /// Ends this drawable's life, children first.
    ///
    /// The subtree is destroyed bottom-up; each node detaches from its
    /// parent, drops its event bindings, announces its own `destroy`, and
    /// releases its linkable id. Teardown always runs to completion: an
    /// announcement refused at the dispatch depth cap is reported as the
    /// return value once the whole subtree is down, and the display side
    /// misses that `destroy`. Destroying twice is a no-op; every other
    /// operation on a destroyed drawable errors.
    pub fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.replace(true) {
            return Ok(());
        }

        // Teardown is unconditional; the first refused announcement is
        // kept and returned at the end.
        let mut refused = None;
        for child in self.children() {
            if let Err(err) = child.destroy() {
                refused.get_or_insert(err);
            }
        }

        let parent = self.inner.parent.borrow_mut().take();
        if let Some(parent) = parent.and_then(|weak| weak.upgrade()) {
            parent.remove_child(self);
        }

        for sub in self.inner.subscriptions.borrow_mut().drain(..) {
            self.inner.bus.unsubscribe(sub);
        }

        if let Err(err) = self.inner.bus.dispatch(&Event::destroy(self.id())) {
            refused.get_or_insert(err);
        }
        self.inner.registry.unregister(self.id());

        match refused {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    // =========================================================================
    // Draw Context Plumbing
    // =========================================================================

    pub(crate) fn draw_context(&self) -> DrawContext {
        self.inner.draw_context.borrow().clone()
    }

    pub(crate) fn set_draw_context(&self, context: DrawContext) {
        *self.inner.draw_context.borrow_mut() = context;
    }

    pub(crate) fn update_draw_context(&self, apply: impl FnOnce(&mut DrawContext)) {
        apply(&mut self.inner.draw_context.borrow_mut());
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventData, NameFilter, TargetFilter};

    fn setup() -> (EventBus, LinkableRegistry<WeakDrawable>) {
        (EventBus::new(), LinkableRegistry::new())
    }

    fn make(
        kind: DrawableKind,
        bus: &EventBus,
        registry: &LinkableRegistry<WeakDrawable>,
    ) -> Drawable {
        let styles = schema::default_styles(&kind, Features::empty());
        let d = Drawable::new(kind, styles, Features::empty(), bus.clone(), registry.clone());
        registry.register(d.id(), d.downgrade()).unwrap();
        d
    }

    #[test]
    fn test_set_style_validates_stores_and_announces_once() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        bus.subscribe(EventName::PropChange, button.id(), move |ev| {
            seen2.borrow_mut().push(ev.style_changes().cloned());
        });

        button.set_style("text", "OK").unwrap();
        assert_eq!(button.style("text"), Some(StyleValue::from("OK")));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let changes = seen[0].clone().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("text"), Some(&StyleValue::from("OK")));
    }

    #[test]
    fn test_set_style_refuses_unknown_names() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);

        let err = button.set_style("gravity", 9).unwrap_err();
        assert!(matches!(err, Error::NoSuchStyle { .. }));
        assert_eq!(button.style("gravity"), None);
    }

    #[test]
    fn test_update_styles_is_all_or_nothing() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);

        let count = Rc::new(Cell::new(0));
        let count2 = Rc::clone(&count);
        bus.subscribe(EventName::PropChange, button.id(), move |_| {
            count2.set(count2.get() + 1)
        });

        let mut batch = StyleMap::new();
        batch.insert("text".to_string(), StyleValue::from("Go"));
        batch.insert("width".to_string(), StyleValue::Int(-5));
        let err = button.update_styles(batch).unwrap_err();
        assert!(matches!(err, Error::InvalidStyleValue { .. }));

        // Neither style moved, nothing was announced.
        assert_eq!(button.style("text"), Some(StyleValue::from("")));
        assert_eq!(button.style("width"), None);
        assert_eq!(count.get(), 0);

        // A clean batch lands as one event.
        let mut batch = StyleMap::new();
        batch.insert("text".to_string(), StyleValue::from("Go"));
        batch.insert("width".to_string(), StyleValue::Int(80));
        button.update_styles(batch).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_refused_prop_change_rolls_the_styles_back() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);
        button.set_style("text", "before").unwrap();

        // Ride a click feedback loop to the nesting cap, then try to store
        // a batch from the handler that can no longer announce.
        let outcome = Rc::new(RefCell::new(None));
        let bus2 = bus.clone();
        let button2 = button.clone();
        let outcome2 = Rc::clone(&outcome);
        bus.subscribe(EventName::Click, button.id(), move |ev| {
            if bus2.dispatch(ev).is_err() {
                let mut batch = StyleMap::new();
                batch.insert("text".to_string(), StyleValue::from("after"));
                batch.insert("width".to_string(), StyleValue::Int(50));
                outcome2.borrow_mut().replace(button2.update_styles(batch));
            }
        });
        bus.dispatch(&Event::click(button.id())).unwrap();

        assert!(matches!(
            outcome.borrow_mut().take(),
            Some(Err(Error::DispatchDepthExceeded(_)))
        ));
        // Both the overwritten and the freshly added entry rolled back.
        assert_eq!(button.style("text"), Some(StyleValue::from("before")));
        assert_eq!(button.style("width"), None);
    }

    #[test]
    fn test_hidden_helpers() {
        let (bus, registry) = setup();
        let para = make(DrawableKind::Para, &bus, &registry);

        assert!(!para.is_hidden());
        para.hide().unwrap();
        assert!(para.is_hidden());
        para.toggle().unwrap();
        assert!(!para.is_hidden());
        para.show().unwrap();
        assert!(!para.is_hidden());
    }

    #[test]
    fn test_bind_refuses_events_the_kind_never_emits() {
        let (bus, registry) = setup();
        let para = make(DrawableKind::Para, &bus, &registry);

        let err = para.on_click(|| {}).unwrap_err();
        assert!(matches!(
            err,
            Error::EventNotSupported {
                event: EventName::Click,
                ..
            }
        ));
    }

    #[test]
    fn test_click_binding_fires_on_dispatch() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);
        let other = make(DrawableKind::Button, &bus, &registry);

        let clicks = Rc::new(Cell::new(0));
        let clicks2 = Rc::clone(&clicks);
        button.on_click(move || clicks2.set(clicks2.get() + 1)).unwrap();

        bus.dispatch(&Event::click(button.id())).unwrap();
        bus.dispatch(&Event::click(other.id())).unwrap();
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_unbind_detaches_one_handler() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);

        let clicks = Rc::new(Cell::new(0));
        let clicks2 = Rc::clone(&clicks);
        let sub = button
            .on_click(move || clicks2.set(clicks2.get() + 1))
            .unwrap();

        button.unbind(sub);
        bus.dispatch(&Event::click(button.id())).unwrap();
        assert_eq!(clicks.get(), 0);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_reparent_moves_the_link_and_announces() {
        let (bus, registry) = setup();
        let first = make(DrawableKind::Stack, &bus, &registry);
        let second = make(DrawableKind::Stack, &bus, &registry);
        let button = make(DrawableKind::Button, &bus, &registry);

        button.reparent(Some(&first), false).unwrap();
        assert_eq!(first.children().len(), 1);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        bus.subscribe(EventName::Parent, button.id(), move |ev| {
            if let EventData::NewParent(parent) = &ev.data {
                seen2.borrow_mut().push(*parent);
            }
        });

        button.set_parent(Some(&second)).unwrap();
        assert!(first.children().is_empty());
        assert_eq!(second.children().len(), 1);
        assert!(button.parent().unwrap().ptr_eq(&second));
        assert_eq!(*seen.borrow(), vec![Some(second.id())]);

        button.set_parent(None).unwrap();
        assert!(second.children().is_empty());
        assert!(button.parent().is_none());
        assert_eq!(*seen.borrow(), vec![Some(second.id()), None]);
    }

    #[test]
    fn test_reparent_refuses_leaf_parents() {
        let (bus, registry) = setup();
        let para = make(DrawableKind::Para, &bus, &registry);
        let button = make(DrawableKind::Button, &bus, &registry);

        let err = button.set_parent(Some(&para)).unwrap_err();
        assert!(matches!(err, Error::NotAContainer { .. }));
        assert!(button.parent().is_none());
    }

    #[test]
    fn test_reparent_refuses_cycles() {
        let (bus, registry) = setup();
        let outer = make(DrawableKind::Stack, &bus, &registry);
        let mid = make(DrawableKind::Flow, &bus, &registry);
        let inner = make(DrawableKind::Stack, &bus, &registry);
        mid.reparent(Some(&outer), false).unwrap();
        inner.reparent(Some(&mid), false).unwrap();

        // Directly under itself, and under a deeper descendant.
        let err = outer.set_parent(Some(&outer)).unwrap_err();
        assert!(matches!(err, Error::ParentCycle { .. }));
        let err = outer.set_parent(Some(&inner)).unwrap_err();
        assert!(matches!(err, Error::ParentCycle { .. }));

        // Nothing moved.
        assert!(outer.parent().is_none());
        assert!(mid.parent().unwrap().ptr_eq(&outer));
        assert!(inner.parent().unwrap().ptr_eq(&mid));
        assert!(inner.children().is_empty());
    }

    #[test]
    fn test_refused_parent_announcement_restores_the_old_link() {
        let (bus, registry) = setup();
        let first = make(DrawableKind::Stack, &bus, &registry);
        let second = make(DrawableKind::Stack, &bus, &registry);
        let a = make(DrawableKind::Button, &bus, &registry);
        let b = make(DrawableKind::Button, &bus, &registry);
        a.reparent(Some(&first), false).unwrap();
        b.reparent(Some(&first), false).unwrap();

        let outcome = Rc::new(RefCell::new(None));
        let bus2 = bus.clone();
        let a2 = a.clone();
        let second2 = second.clone();
        let outcome2 = Rc::clone(&outcome);
        bus.subscribe(EventName::Click, a.id(), move |ev| {
            if bus2.dispatch(ev).is_err() {
                outcome2.borrow_mut().replace(a2.set_parent(Some(&second2)));
            }
        });
        bus.dispatch(&Event::click(a.id())).unwrap();

        assert!(matches!(
            outcome.borrow_mut().take(),
            Some(Err(Error::DispatchDepthExceeded(_)))
        ));
        // `a` sits where it was, still ahead of its sibling.
        assert!(a.parent().unwrap().ptr_eq(&first));
        assert!(second.children().is_empty());
        let order: Vec<_> = first.children().iter().map(Drawable::id).collect();
        assert_eq!(order, vec![a.id(), b.id()]);
    }

    #[test]
    fn test_remove_absent_child_is_tolerated() {
        let (bus, registry) = setup();
        let stack = make(DrawableKind::Stack, &bus, &registry);
        let stray = make(DrawableKind::Button, &bus, &registry);

        // Logged, not fatal; the stack is unchanged.
        stack.remove_child(&stray);
        assert!(stack.children().is_empty());
    }

    #[test]
    fn test_destroy_cascades_children_first() {
        let (bus, registry) = setup();
        let stack = make(DrawableKind::Stack, &bus, &registry);
        let inner = make(DrawableKind::Flow, &bus, &registry);
        let button = make(DrawableKind::Button, &bus, &registry);
        inner.reparent(Some(&stack), false).unwrap();
        button.reparent(Some(&inner), false).unwrap();

        let order = Rc::new(RefCell::new(Vec::new()));
        let order2 = Rc::clone(&order);
        bus.subscribe(EventName::Destroy, TargetFilter::Any, move |ev| {
            order2.borrow_mut().push(ev.target_drawable());
        });

        stack.destroy().unwrap();
        assert_eq!(
            *order.borrow(),
            vec![Some(button.id()), Some(inner.id()), Some(stack.id())]
        );
        assert!(stack.is_destroyed());
        assert!(inner.is_destroyed());
        assert!(button.is_destroyed());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_destroy_drops_bindings_and_is_idempotent() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);
        button.on_click(|| {}).unwrap();
        button.on_hover(|| {}).unwrap();

        let destroys = Rc::new(Cell::new(0));
        let destroys2 = Rc::clone(&destroys);
        bus.subscribe(EventName::Destroy, button.id(), move |_| {
            destroys2.set(destroys2.get() + 1)
        });

        button.destroy().unwrap();
        assert_eq!(destroys.get(), 1);
        // Only the test's own destroy watcher is left on the bus.
        assert_eq!(bus.subscription_count(), 1);

        // Second destroy: no error, no second announcement.
        button.destroy().unwrap();
        assert_eq!(destroys.get(), 1);

        let err = button.set_style("text", "late").unwrap_err();
        assert!(matches!(err, Error::Destroyed(_)));
        let err = button.on_click(|| {}).unwrap_err();
        assert!(matches!(err, Error::Destroyed(_)));
    }

    #[test]
    fn test_destroy_at_the_dispatch_cap_still_tears_down() {
        let (bus, registry) = setup();
        let button = make(DrawableKind::Button, &bus, &registry);

        let outcome = Rc::new(RefCell::new(None));
        let bus2 = bus.clone();
        let button2 = button.clone();
        let outcome2 = Rc::clone(&outcome);
        button
            .bind(EventName::Click, move |ev| {
                if bus2.dispatch(ev).is_err() {
                    // The bus refuses to nest deeper, so this destroy
                    // cannot announce itself.
                    outcome2.borrow_mut().replace(button2.destroy());
                }
            })
            .unwrap();
        bus.dispatch(&Event::click(button.id())).unwrap();

        let outcome = outcome.borrow_mut().take().unwrap();
        assert!(matches!(outcome, Err(Error::DispatchDepthExceeded(_))));

        // Teardown completed anyway: latched, unbound, unregistered.
        assert!(button.is_destroyed());
        assert_eq!(bus.subscription_count(), 0);
        assert!(!registry.contains(button.id()));

        // And the latch keeps the retry a quiet no-op.
        button.destroy().unwrap();
    }

    #[test]
    fn test_edit_line_sync_runs_before_user_change_handlers() {
        let (bus, registry) = setup();
        let edit = make(DrawableKind::EditLine, &bus, &registry);
        edit.install_text_sync().unwrap();

        let observed = Rc::new(RefCell::new(Vec::new()));
        let observed2 = Rc::clone(&observed);
        let edit2 = edit.clone();
        edit.on_change(move |new_text| {
            // The logical style must already agree with the event payload.
            let style = edit2.style("text").and_then(|v| v.as_str().map(String::from));
            observed2
                .borrow_mut()
                .push((new_text.to_string(), style));
        })
        .unwrap();

        bus.dispatch(&Event::change(edit.id(), "typed")).unwrap();
        assert_eq!(
            *observed.borrow(),
            vec![("typed".to_string(), Some("typed".to_string()))]
        );
    }

    #[test]
    fn test_relay_sees_lifecycle_traffic() {
        let (bus, registry) = setup();
        let names = Rc::new(RefCell::new(Vec::new()));
        let names2 = Rc::clone(&names);
        bus.subscribe(NameFilter::Any, TargetFilter::Any, move |ev| {
            names2.borrow_mut().push(ev.name);
        });

        let stack = make(DrawableKind::Stack, &bus, &registry);
        stack.set_style("margin", 10).unwrap();
        stack.destroy().unwrap();

        assert_eq!(
            *names.borrow(),
            vec![EventName::PropChange, EventName::Destroy]
        );
    }
}
