//! App Session - Explicit construction context for one drawable tree
//!
//! An [`App`] owns everything ambient about building a UI: the current
//! slot stack, the per-slot draw context, the custom widget table, and the
//! feature switches. Builder closures receive the session as an argument;
//! there is no hidden global state, so two sessions on two buses coexist
//! in one thread without touching each other.
//!
//! Creation methods follow one protocol: resolve the parent slot, merge
//! styles (type defaults, then ambient draw context, then positional
//! argument, then keyword styles), allocate and register the node, link it
//! under its parent, and announce a single `create` event carrying the
//! finalized styles. The display side needs nothing else to mirror the
//! node.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::drawable::{Drawable, DrawableKind, Features, WeakDrawable, WidgetDef, schema};
use crate::error::{Error, Result};
use crate::event::{Event, EventBus};
use crate::registry::{DrawableId, LinkableRegistry};
use crate::types::{StyleMap, StyleValue};

/// Kind names reserved by the built-in schema tables.
const BUILTIN_KIND_NAMES: &[&str] = &[
    "root",
    "stack",
    "flow",
    "button",
    "para",
    "edit_line",
    "rect",
];

// =============================================================================
// Session
// =============================================================================

/// One UI session: a root drawable, its tree, and the machinery to grow
/// it. Created against an externally owned [`EventBus`] so the display
/// side (and any relays) can be wired to the same bus before or after.
pub struct App {
    bus: EventBus,
    registry: LinkableRegistry<WeakDrawable>,
    features: Features,
    root: Drawable,
    slot_stack: RefCell<Vec<Drawable>>,
    widgets: RefCell<HashMap<String, Rc<WidgetDef>>>,
}

impl App {
    /// Opens a session on `bus` with the given feature switches.
    ///
    /// The root drawable is constructed immediately and its `create` event
    /// is the first thing the session puts on the bus, so a display
    /// service attached beforehand mirrors the tree from the very top.
    pub fn new(bus: &EventBus, features: Features) -> Result<App> {
        let registry = LinkableRegistry::new();
        let styles = schema::default_styles(&DrawableKind::Root, features);
        let root = Drawable::new(
            DrawableKind::Root,
            styles.clone(),
            features,
            bus.clone(),
            registry.clone(),
        );
        registry.register(root.id(), root.downgrade())?;
        bus.dispatch(&Event::create(root.id(), DrawableKind::Root, styles, None))?;

        Ok(App {
            bus: bus.clone(),
            registry,
            features,
            slot_stack: RefCell::new(vec![root.clone()]),
            widgets: RefCell::new(HashMap::new()),
            root,
        })
    }

    /// The bus this session announces on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// The session's feature switches.
    pub fn features(&self) -> Features {
        self.features
    }

    /// The root drawable.
    pub fn root(&self) -> Drawable {
        self.root.clone()
    }

    /// The logical drawable registered under `id`.
    ///
    /// # Returns
    /// `Err(NoSuchLinkableId)` if the id was never issued here or its
    /// drawable is gone.
    pub fn drawable(&self, id: DrawableId) -> Result<Drawable> {
        self.registry
            .lookup(id)?
            .upgrade()
            .ok_or(Error::NoSuchLinkableId(id))
    }

    /// Like [`drawable`](Self::drawable), `None` instead of an error.
    pub fn drawable_opt(&self, id: DrawableId) -> Option<Drawable> {
        self.registry.lookup_opt(id).and_then(|weak| weak.upgrade())
    }

    /// Number of live drawables in the session, the root included.
    pub fn drawable_count(&self) -> usize {
        self.registry.len()
    }

    /// The slot new drawables currently land in.
    pub fn current_slot(&self) -> Drawable {
        self.slot_stack
            .borrow()
            .last()
            .cloned()
            .unwrap_or_else(|| self.root.clone())
    }

    /// Runs `build` with `slot` as the current slot. The previous slot is
    /// restored when `build` returns, error or not.
    pub(crate) fn with_slot(
        &self,
        slot: &Drawable,
        build: impl FnOnce(&App) -> Result<()>,
    ) -> Result<()> {
        if slot.is_destroyed() {
            return Err(Error::Destroyed(slot.id()));
        }
        if !slot.is_container() {
            return Err(Error::NotAContainer {
                kind: slot.kind_name().to_string(),
            });
        }
        self.slot_stack.borrow_mut().push(slot.clone());
        let _guard = SlotGuard { app: self };
        build(self)
    }

    // =========================================================================
    // Creation Methods
    // =========================================================================

    /// Creates a vertical container in the current slot and builds its
    /// contents.
    pub fn stack(
        &self,
        styles: StyleMap,
        build: impl FnOnce(&App) -> Result<()>,
    ) -> Result<Drawable> {
        let stack = self.create_drawable(DrawableKind::Stack, StyleMap::new(), styles)?;
        self.with_slot(&stack, build)?;
        Ok(stack)
    }

    /// Creates a horizontal container in the current slot and builds its
    /// contents.
    pub fn flow(
        &self,
        styles: StyleMap,
        build: impl FnOnce(&App) -> Result<()>,
    ) -> Result<Drawable> {
        let flow = self.create_drawable(DrawableKind::Flow, StyleMap::new(), styles)?;
        self.with_slot(&flow, build)?;
        Ok(flow)
    }

    /// Creates a button. `label` is the positional form of the `text`
    /// style; a `text` entry in `styles` overrides it.
    pub fn button(&self, label: impl Into<String>, styles: StyleMap) -> Result<Drawable> {
        self.create_drawable(DrawableKind::Button, positional_text(label), styles)
    }

    /// Creates a paragraph. `text` is positional, same override rule as
    /// [`button`](Self::button).
    pub fn para(&self, text: impl Into<String>, styles: StyleMap) -> Result<Drawable> {
        self.create_drawable(DrawableKind::Para, positional_text(text), styles)
    }

    /// Creates a single-line text input with initial `text`.
    pub fn edit_line(&self, text: impl Into<String>, styles: StyleMap) -> Result<Drawable> {
        self.create_drawable(DrawableKind::EditLine, positional_text(text), styles)
    }

    /// Creates a rectangle.
    pub fn rect(&self, styles: StyleMap) -> Result<Drawable> {
        self.create_drawable(DrawableKind::Rect, StyleMap::new(), styles)
    }

    /// Creates an instance of a registered custom kind. Container widgets
    /// come back empty; fill them with [`Drawable::append`].
    pub fn widget(&self, kind: &str, styles: StyleMap) -> Result<Drawable> {
        let def = self
            .widgets
            .borrow()
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownWidgetKind(kind.to_string()))?;
        self.create_drawable(DrawableKind::Widget(def), StyleMap::new(), styles)
    }

    /// Registers a custom kind for [`widget`](Self::widget). Names must
    /// not collide with built-in kinds or earlier registrations.
    pub fn register_widget(&self, def: WidgetDef) -> Result<()> {
        let name = def.name().to_string();
        if BUILTIN_KIND_NAMES.contains(&name.as_str())
            || self.widgets.borrow().contains_key(&name)
        {
            return Err(Error::DuplicateWidgetRegistration(name));
        }
        self.widgets.borrow_mut().insert(name, Rc::new(def));
        Ok(())
    }

    // =========================================================================
    // Draw Context Commands
    // =========================================================================

    /// Sets the ambient fill color of the current slot. Drawables created
    /// in this slot afterwards start with it unless they say otherwise;
    /// sibling and ancestor slots are unaffected.
    pub fn fill(&self, color: impl Into<StyleValue>) -> Result<()> {
        let canonical = schema::color(color.into()).map_err(|reason| Error::InvalidStyleValue {
            style: "fill".to_string(),
            reason,
        })?;
        self.current_slot()
            .update_draw_context(|ctx| ctx.fill = Some(canonical));
        Ok(())
    }

    /// Clears the ambient fill of the current slot.
    pub fn no_fill(&self) {
        self.current_slot().update_draw_context(|ctx| ctx.fill = None);
    }

    /// Sets the ambient stroke color of the current slot.
    pub fn stroke(&self, color: impl Into<StyleValue>) -> Result<()> {
        let canonical = schema::color(color.into()).map_err(|reason| Error::InvalidStyleValue {
            style: "stroke".to_string(),
            reason,
        })?;
        self.current_slot()
            .update_draw_context(|ctx| ctx.stroke = Some(canonical));
        Ok(())
    }

    /// Clears the ambient stroke of the current slot.
    pub fn no_stroke(&self) {
        self.current_slot()
            .update_draw_context(|ctx| ctx.stroke = None);
    }

    /// Sets the ambient rotation of the current slot, in degrees. Needs
    /// the `TRANSFORMS` feature.
    pub fn rotate(&self, angle: impl Into<StyleValue>) -> Result<()> {
        if !self.features.contains(Features::TRANSFORMS) {
            return Err(Error::UnsupportedFeature {
                style: "rotate".to_string(),
                feature: Features::TRANSFORMS,
            });
        }
        let canonical = schema::degrees(angle.into()).map_err(|reason| {
            Error::InvalidStyleValue {
                style: "rotate".to_string(),
                reason,
            }
        })?;
        self.current_slot()
            .update_draw_context(|ctx| ctx.rotate = Some(canonical));
        Ok(())
    }

    // =========================================================================
    // Construction Protocol
    // =========================================================================

    fn create_drawable(
        &self,
        kind: DrawableKind,
        positional: StyleMap,
        keyword: StyleMap,
    ) -> Result<Drawable> {
        // 1. RESOLVE PARENT
        // Everything except the root lands in the current slot.
        let parent = match kind {
            DrawableKind::Root => None,
            _ => Some(self.current_slot()),
        };
        if let Some(parent) = &parent {
            if parent.is_destroyed() {
                return Err(Error::Destroyed(parent.id()));
            }
        }

        // 2. MERGE STYLES
        // Precedence, lowest to highest: type defaults, ambient draw
        // context, positional argument, keyword styles. Context entries
        // for styles the kind lacks (or that are feature-gated off) are
        // skipped silently; explicit entries get the full validation and
        // its errors.
        let context = parent
            .as_ref()
            .map(Drawable::draw_context)
            .unwrap_or_default();

        let mut styles = schema::default_styles(&kind, self.features);
        for (name, value) in context.entries() {
            let Some(found) = schema::find_style(&kind, name) else {
                continue;
            };
            if let Some(gate) = found.feature {
                if !self.features.contains(gate) {
                    continue;
                }
            }
            styles.insert(name.to_string(), value);
        }
        for (name, value) in positional.into_iter().chain(keyword) {
            let canonical = schema::validate_style(&kind, self.features, &name, value)?;
            styles.insert(name, canonical);
        }

        // 3. ALLOCATE, REGISTER, LINK
        let drawable = Drawable::new(
            kind.clone(),
            styles.clone(),
            self.features,
            self.bus.clone(),
            self.registry.clone(),
        );
        self.registry.register(drawable.id(), drawable.downgrade())?;
        if drawable.is_container() {
            drawable.set_draw_context(context);
        }
        if let Some(parent) = &parent {
            // The initial parent rides inside the create event; a separate
            // parent announcement would make the display link twice.
            drawable.reparent(Some(parent), false)?;
        }

        // 4. ANNOUNCE
        let parent_id = parent.map(|p| p.id());
        self.bus
            .dispatch(&Event::create(drawable.id(), kind, styles, parent_id))?;

        // 5. KIND PLUMBING
        drawable.install_text_sync()?;

        Ok(drawable)
    }
}

fn positional_text(text: impl Into<String>) -> StyleMap {
    let mut positional = StyleMap::new();
    positional.insert("text".to_string(), StyleValue::Text(text.into()));
    positional
}

struct SlotGuard<'a> {
    app: &'a App,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.app.slot_stack.borrow_mut().pop();
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("root", &self.root.id())
            .field("features", &self.features)
            .field("drawables", &self.registry.len())
            .field("slot_depth", &self.slot_stack.borrow().len())
            .field("widgets", &self.widgets.borrow().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
