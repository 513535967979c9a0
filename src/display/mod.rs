//! Display Service - The render side of the toolkit
//!
//! The service watches the bus and maintains a tree of
//! [`DisplayDrawable`] mirrors that tracks the logical tree exactly,
//! using nothing but the four protocol events: one bus-wide `create`
//! subscription, plus `prop_change` / `parent` / `destroy` subscriptions
//! taken out per mirror as it is born and dropped when it dies.
//!
//! Inconsistencies (events for ids it never mirrored, links that are not
//! there) are logged and tolerated rather than raised: by the time an
//! event arrives there is no caller left to hand an error to, and a
//! display that keeps going with a slightly stale tree beats one that
//! stops.
//!
//! Traffic in the other direction - user interface events - enters
//! through the injection methods ([`click`](DisplayService::click),
//! [`change`](DisplayService::change), ...), which real backends call
//! from their input plumbing and tests call directly.

pub mod drawable;
pub mod sink;

pub use drawable::{DisplayDrawable, WeakDisplayDrawable};
pub use sink::{NullSink, RecordingSink, RenderSink, SinkOp};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::drawable::DrawableKind;
use crate::error::Result;
use crate::event::{Event, EventBus, EventData, EventName, SubscriptionId, TargetFilter};
use crate::registry::{DrawableId, LinkableRegistry};

// =============================================================================
// Service
// =============================================================================

struct ServiceInner {
    bus: EventBus,
    registry: LinkableRegistry<DisplayDrawable>,
    sink: RefCell<Box<dyn RenderSink>>,
    root: RefCell<Option<DisplayDrawable>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
}

/// Handle to one display service. Clones share the service.
#[derive(Clone)]
pub struct DisplayService {
    inner: Rc<ServiceInner>,
}

impl DisplayService {
    /// Attaches a service with the given sink to `bus`.
    ///
    /// Attach before opening the session and the mirror tree is complete
    /// from the root down. Attaching later still works, but drawables
    /// created earlier are never mirrored and links to them degrade to
    /// logged warnings.
    pub fn attach(bus: &EventBus, sink: impl RenderSink + 'static) -> DisplayService {
        let inner = Rc::new(ServiceInner {
            bus: bus.clone(),
            registry: LinkableRegistry::new(),
            sink: RefCell::new(Box::new(sink)),
            root: RefCell::new(None),
            subscriptions: RefCell::new(Vec::new()),
        });

        let weak = Rc::downgrade(&inner);
        let sub = bus.subscribe(EventName::Create, TargetFilter::Any, move |ev| {
            if let Some(inner) = weak.upgrade() {
                ServiceInner::handle_create(&inner, ev);
            }
        });
        inner.subscriptions.borrow_mut().push(sub);

        DisplayService { inner }
    }

    /// Attaches with a [`NullSink`]: full mirroring, no output.
    pub fn headless(bus: &EventBus) -> DisplayService {
        Self::attach(bus, NullSink)
    }

    /// Removes every bus subscription this service holds and drops all
    /// mirrors. The service stays usable only as an inert handle.
    pub fn detach(&self) {
        for sub in self.inner.subscriptions.borrow_mut().drain(..) {
            self.inner.bus.unsubscribe(sub);
        }
        for id in self.inner.registry.ids() {
            if let Some(mirror) = self.inner.registry.lookup_opt(id) {
                for sub in mirror.take_subscriptions() {
                    self.inner.bus.unsubscribe(sub);
                }
            }
        }
        self.inner.registry.clear();
        *self.inner.root.borrow_mut() = None;
    }

    /// The mirror of the session root, once its `create` has arrived.
    pub fn root(&self) -> Option<DisplayDrawable> {
        self.inner.root.borrow().clone()
    }

    /// The mirror registered under `id`.
    pub fn drawable(&self, id: DrawableId) -> Result<DisplayDrawable> {
        self.inner.registry.lookup(id)
    }

    /// Like [`drawable`](Self::drawable), `None` instead of an error.
    pub fn drawable_opt(&self, id: DrawableId) -> Option<DisplayDrawable> {
        self.inner.registry.lookup_opt(id)
    }

    /// Number of live mirrors.
    pub fn mirror_count(&self) -> usize {
        self.inner.registry.len()
    }

    // =========================================================================
    // UI Event Injection
    // =========================================================================

    /// Injects a click on `id`, as a backend's input plumbing would.
    pub fn click(&self, id: DrawableId) -> Result<()> {
        self.inner.bus.dispatch(&Event::click(id))
    }

    /// Injects a pointer-enter on `id`.
    pub fn hover(&self, id: DrawableId) -> Result<()> {
        self.inner.bus.dispatch(&Event::hover(id))
    }

    /// Injects a pointer-exit on `id`.
    pub fn leave(&self, id: DrawableId) -> Result<()> {
        self.inner.bus.dispatch(&Event::leave(id))
    }

    /// Injects pointer motion within `id`.
    pub fn motion(&self, id: DrawableId, x: f64, y: f64) -> Result<()> {
        self.inner.bus.dispatch(&Event::motion(id, x, y))
    }

    /// Injects a display-side text change on `id`. For edit lines the
    /// logical `text` style syncs before application handlers run.
    pub fn change(&self, id: DrawableId, text: &str) -> Result<()> {
        self.inner.bus.dispatch(&Event::change(id, text))
    }
}

impl fmt::Debug for DisplayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayService")
            .field("mirrors", &self.mirror_count())
            .field("root", &self.root().map(|mirror| mirror.id()))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Event Handling
// =============================================================================

impl ServiceInner {
    fn handle_create(inner: &Rc<ServiceInner>, ev: &Event) {
        let Some(id) = ev.target_drawable() else {
            log::warn!("display: create event without a target");
            return;
        };
        let EventData::Create {
            kind,
            styles,
            parent,
        } = &ev.data
        else {
            log::warn!("display: create event for {id} without a create payload");
            return;
        };

        let mirror = DisplayDrawable::new(id, kind.name().to_string(), styles.clone());
        if let Err(err) = inner.registry.register(id, mirror.clone()) {
            log::warn!("display: {err}; ignoring duplicate create");
            return;
        }

        if let Some(parent_id) = parent {
            match inner.registry.lookup_opt(*parent_id) {
                Some(parent_mirror) => {
                    parent_mirror.add_child(mirror.clone());
                    mirror.set_parent_link(Some(&parent_mirror));
                }
                None => {
                    log::warn!("display: parent {parent_id} of {id} has no mirror");
                }
            }
        }

        if matches!(kind, DrawableKind::Root) && inner.root.borrow().is_none() {
            *inner.root.borrow_mut() = Some(mirror.clone());
        }

        // The mirror listens for its own updates for as long as it lives.
        let weak = Rc::downgrade(inner);
        let sub = inner.bus.subscribe(EventName::PropChange, id, move |ev| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_prop_change(ev);
            }
        });
        mirror.record_subscription(sub);

        let weak = Rc::downgrade(inner);
        let sub = inner.bus.subscribe(EventName::Parent, id, move |ev| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_parent(ev);
            }
        });
        mirror.record_subscription(sub);

        let weak = Rc::downgrade(inner);
        let sub = inner.bus.subscribe(EventName::Destroy, id, move |ev| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_destroy(ev);
            }
        });
        mirror.record_subscription(sub);

        inner
            .sink
            .borrow_mut()
            .create_drawable(id, kind.name(), styles, *parent);
    }

    fn handle_prop_change(&self, ev: &Event) {
        let Some(id) = ev.target_drawable() else {
            return;
        };
        let Some(changes) = ev.style_changes() else {
            log::warn!("display: prop_change for {id} without styles");
            return;
        };
        let Some(mirror) = self.registry.lookup_opt(id) else {
            log::warn!("display: prop_change for unmirrored {id}");
            return;
        };
        mirror.apply_changes(changes);
        self.sink.borrow_mut().update_drawable(id, changes);
    }

    fn handle_parent(&self, ev: &Event) {
        let Some(id) = ev.target_drawable() else {
            return;
        };
        let EventData::NewParent(parent_id) = &ev.data else {
            log::warn!("display: parent event for {id} without a parent payload");
            return;
        };
        let Some(mirror) = self.registry.lookup_opt(id) else {
            log::warn!("display: parent event for unmirrored {id}");
            return;
        };

        if let Some(old_parent) = mirror.parent() {
            old_parent.remove_child(id);
        }
        mirror.set_parent_link(None);
        if let Some(parent_id) = parent_id {
            match self.registry.lookup_opt(*parent_id) {
                Some(new_parent) => {
                    new_parent.add_child(mirror.clone());
                    mirror.set_parent_link(Some(&new_parent));
                }
                None => {
                    log::warn!("display: new parent {parent_id} of {id} has no mirror");
                }
            }
        }

        self.sink.borrow_mut().reparent_drawable(id, *parent_id);
    }

    fn handle_destroy(&self, ev: &Event) {
        let Some(id) = ev.target_drawable() else {
            return;
        };
        let Some(mirror) = self.registry.lookup_opt(id) else {
            log::warn!("display: destroy for unmirrored {id}");
            return;
        };

        // The logical side destroys children first, so a well-formed
        // stream never gets here with links still in place.
        if mirror.child_count() != 0 {
            log::warn!(
                "display: destroying {id} with {} children still linked",
                mirror.child_count()
            );
        }

        for sub in mirror.take_subscriptions() {
            self.bus.unsubscribe(sub);
        }
        if let Some(parent) = mirror.parent() {
            parent.remove_child(id);
        }
        mirror.set_parent_link(None);
        self.registry.unregister(id);

        let was_root = self
            .root
            .borrow()
            .as_ref()
            .is_some_and(|root| root.id() == id);
        if was_root {
            *self.root.borrow_mut() = None;
        }

        self.sink.borrow_mut().destroy_drawable(id);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::drawable::Features;
    use crate::styles;
    use crate::types::StyleValue;
    use std::cell::Cell;

    fn session() -> (EventBus, DisplayService, RecordingSink, App) {
        let bus = EventBus::new();
        let sink = RecordingSink::new();
        let service = DisplayService::attach(&bus, sink.clone());
        let app = App::new(&bus, Features::empty()).unwrap();
        (bus, service, sink, app)
    }

    #[test]
    fn test_mirror_tree_follows_construction() {
        let (_bus, service, _sink, app) = session();

        let mut button_id = None;
        let stack = app
            .stack(styles! {}, |app| {
                button_id = Some(app.button("go", styles! { "width" => 90 })?.id());
                Ok(())
            })
            .unwrap();
        let button_id = button_id.unwrap();

        assert_eq!(service.mirror_count(), 3);

        let root = service.root().unwrap();
        assert_eq!(root.id(), app.root().id());
        assert_eq!(root.kind_name(), "root");
        assert_eq!(root.children().len(), 1);

        let stack_mirror = service.drawable(stack.id()).unwrap();
        assert!(root.children()[0].ptr_eq(&stack_mirror));
        assert!(stack_mirror.parent().unwrap().ptr_eq(&root));

        let button_mirror = service.drawable(button_id).unwrap();
        assert_eq!(button_mirror.kind_name(), "button");
        assert_eq!(button_mirror.style("text"), Some("go".into()));
        assert_eq!(button_mirror.style("width"), Some(StyleValue::Int(90)));
        assert!(button_mirror.parent().unwrap().ptr_eq(&stack_mirror));
    }

    #[test]
    fn test_sink_receives_the_create_stream() {
        let (_bus, _service, sink, app) = session();
        let root_id = app.root().id();
        sink.take();

        let button = app.button("go", styles! {}).unwrap();

        let ops = sink.take();
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            SinkOp::Create {
                id,
                kind,
                parent,
                styles,
            } => {
                assert_eq!(*id, button.id());
                assert_eq!(kind, "button");
                assert_eq!(*parent, Some(root_id));
                assert_eq!(styles.get("text"), Some(&"go".into()));
                assert_eq!(styles.get("hidden"), Some(&StyleValue::Bool(false)));
            }
            other => panic!("expected a create, got {other:?}"),
        }
    }

    #[test]
    fn test_prop_change_folds_into_the_mirror() {
        let (_bus, service, sink, app) = session();
        let button = app.button("before", styles! {}).unwrap();
        sink.take();

        button.set_style("text", "after").unwrap();

        let mirror = service.drawable(button.id()).unwrap();
        assert_eq!(mirror.style("text"), Some("after".into()));
        // Untouched styles survive the fold.
        assert_eq!(mirror.style("hidden"), Some(StyleValue::Bool(false)));

        assert_eq!(
            sink.take(),
            vec![SinkOp::Update {
                id: button.id(),
                changes: styles! { "text" => "after" },
            }]
        );
    }

    #[test]
    fn test_reparent_relinks_the_mirrors() {
        let (_bus, service, sink, app) = session();
        let first = app.stack(styles! {}, |_| Ok(())).unwrap();
        let second = app.stack(styles! {}, |_| Ok(())).unwrap();
        let button = app.button("go", styles! {}).unwrap();
        button.set_parent(Some(&first)).unwrap();
        sink.take();

        button.set_parent(Some(&second)).unwrap();

        let first_mirror = service.drawable(first.id()).unwrap();
        let second_mirror = service.drawable(second.id()).unwrap();
        let button_mirror = service.drawable(button.id()).unwrap();
        assert!(first_mirror.children().is_empty());
        assert_eq!(second_mirror.children().len(), 1);
        assert!(button_mirror.parent().unwrap().ptr_eq(&second_mirror));

        assert_eq!(
            sink.take(),
            vec![SinkOp::Reparent {
                id: button.id(),
                parent: Some(second.id()),
            }]
        );
    }

    #[test]
    fn test_destroy_unwinds_bottom_up() {
        let (bus, service, sink, app) = session();

        let mut button_id = None;
        let stack = app
            .stack(styles! {}, |app| {
                button_id = Some(app.button("go", styles! {})?.id());
                Ok(())
            })
            .unwrap();
        let button_id = button_id.unwrap();
        sink.take();
        let busy_subscriptions = bus.subscription_count();

        stack.destroy().unwrap();

        assert_eq!(
            sink.take(),
            vec![
                SinkOp::Destroy { id: button_id },
                SinkOp::Destroy { id: stack.id() },
            ]
        );
        assert_eq!(service.mirror_count(), 1);
        assert!(service.drawable(button_id).is_err());
        assert!(service.root().is_some());

        // Three per-mirror subscriptions went away with each mirror.
        assert_eq!(bus.subscription_count(), busy_subscriptions - 6);
    }

    #[test]
    fn test_click_injection_reaches_logical_bindings() {
        let (_bus, service, _sink, app) = session();
        let button = app.button("go", styles! {}).unwrap();

        let clicks = Rc::new(Cell::new(0));
        let clicks2 = Rc::clone(&clicks);
        button.on_click(move || clicks2.set(clicks2.get() + 1)).unwrap();

        service.click(button.id()).unwrap();
        service.click(button.id()).unwrap();
        assert_eq!(clicks.get(), 2);
    }

    #[test]
    fn test_change_injection_syncs_the_edit_line() {
        let (_bus, service, _sink, app) = session();
        let edit = app.edit_line("", styles! {}).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        edit.on_change(move |text| seen2.borrow_mut().push(text.to_string()))
            .unwrap();

        service.change(edit.id(), "hello").unwrap();

        assert_eq!(*seen.borrow(), vec!["hello".to_string()]);
        assert_eq!(edit.style("text"), Some("hello".into()));
        // And the sync's prop_change made it back into the mirror.
        let mirror = service.drawable(edit.id()).unwrap();
        assert_eq!(mirror.style("text"), Some("hello".into()));
    }

    #[test]
    fn test_pointer_injections() {
        let (_bus, service, _sink, app) = session();
        let rect = app.rect(styles! {}).unwrap();

        let hovers = Rc::new(Cell::new(0));
        let hovers2 = Rc::clone(&hovers);
        rect.on_hover(move || hovers2.set(hovers2.get() + 1)).unwrap();

        let leaves = Rc::new(Cell::new(0));
        let leaves2 = Rc::clone(&leaves);
        rect.on_leave(move || leaves2.set(leaves2.get() + 1)).unwrap();

        let moves = Rc::new(RefCell::new(Vec::new()));
        let moves2 = Rc::clone(&moves);
        rect.on_motion(move |x, y| moves2.borrow_mut().push((x, y)))
            .unwrap();

        service.hover(rect.id()).unwrap();
        service.motion(rect.id(), 3.0, 4.0).unwrap();
        service.leave(rect.id()).unwrap();

        assert_eq!(hovers.get(), 1);
        assert_eq!(leaves.get(), 1);
        assert_eq!(*moves.borrow(), vec![(3.0, 4.0)]);
    }

    #[test]
    fn test_late_attach_degrades_to_partial_mirroring() {
        let bus = EventBus::new();
        let app = App::new(&bus, Features::empty()).unwrap();

        // Root and this stack predate the service; they are never mirrored.
        let stack = app.stack(styles! {}, |_| Ok(())).unwrap();

        let service = DisplayService::headless(&bus);
        assert_eq!(service.mirror_count(), 0);
        assert!(service.root().is_none());

        // New drawables mirror fine; the link to the unmirrored slot is
        // logged and skipped.
        let mut para_id = None;
        stack
            .append(&app, |app| {
                para_id = Some(app.para("late", styles! {})?.id());
                Ok(())
            })
            .unwrap();

        let mirror = service.drawable(para_id.unwrap()).unwrap();
        assert_eq!(mirror.kind_name(), "para");
        assert!(mirror.parent().is_none());
        assert_eq!(service.mirror_count(), 1);
    }

    #[test]
    fn test_detach_stops_mirroring() {
        let (bus, service, _sink, app) = session();
        app.button("one", styles! {}).unwrap();
        assert_eq!(service.mirror_count(), 2);

        service.detach();
        assert_eq!(service.mirror_count(), 0);
        assert!(service.root().is_none());
        // Only logical-side state remains on the bus: nothing, since no
        // user bindings were made.
        assert_eq!(bus.subscription_count(), 0);

        app.button("two", styles! {}).unwrap();
        assert_eq!(service.mirror_count(), 0);
    }
}
