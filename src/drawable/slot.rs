//! Slot Operations - Reopening and emptying containers
//!
//! Containers (root, stacks, flows, container widgets) are slots: during a
//! session's builder closures they are the ambient construction target,
//! and afterwards they can be reopened with `append`, emptied with
//! `clear`, or swapped wholesale with `replace`.

use crate::app::App;
use crate::error::{Error, Result};

use super::Drawable;

impl Drawable {
    /// Reopens this container and runs `build` with it as the current
    /// slot. Drawables constructed inside land at the end of its children,
    /// after everything already there.
    ///
    /// Only containers accept this; leaves refuse with `NotAContainer`.
    pub fn append(&self, app: &App, build: impl FnOnce(&App) -> Result<()>) -> Result<()> {
        app.with_slot(self, build)
    }

    /// Destroys every child, leaving this container alive and empty. Each
    /// child announces its own `destroy`, so both trees shed the subtree
    /// in lockstep. Every child is torn down even if an announcement is
    /// refused at the dispatch depth cap; the first refusal is returned.
    pub fn clear(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::Destroyed(self.id()));
        }
        if !self.is_container() {
            return Err(Error::NotAContainer {
                kind: self.kind_name().to_string(),
            });
        }
        let mut refused = None;
        for child in self.children() {
            if let Err(err) = child.destroy() {
                refused.get_or_insert(err);
            }
        }
        match refused {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// [`clear`](Self::clear) followed by [`append`](Self::append): the
    /// usual way to rebuild a slot's contents in place.
    pub fn replace(&self, app: &App, build: impl FnOnce(&App) -> Result<()>) -> Result<()> {
        self.clear()?;
        self.append(app, build)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::app::App;
    use crate::drawable::Features;
    use crate::error::Error;
    use crate::event::{EventBus, EventName, TargetFilter};
    use crate::styles;

    #[test]
    fn test_append_adds_after_existing_children() {
        let bus = EventBus::new();
        let app = App::new(&bus, Features::empty()).unwrap();

        let stack = app
            .stack(styles! {}, |app| {
                app.button("first", styles! {})?;
                Ok(())
            })
            .unwrap();
        assert_eq!(stack.children().len(), 1);

        stack
            .append(&app, |app| {
                app.button("second", styles! {})?;
                app.button("third", styles! {})?;
                Ok(())
            })
            .unwrap();

        let labels: Vec<_> = stack
            .children()
            .iter()
            .map(|child| child.style("text").unwrap())
            .collect();
        assert_eq!(
            labels,
            vec!["first".into(), "second".into(), "third".into()]
        );
    }

    #[test]
    fn test_clear_empties_but_keeps_the_slot() {
        let bus = EventBus::new();
        let app = App::new(&bus, Features::empty()).unwrap();

        let stack = app
            .stack(styles! {}, |app| {
                app.para("one", styles! {})?;
                app.para("two", styles! {})?;
                Ok(())
            })
            .unwrap();

        let destroys = Rc::new(RefCell::new(Vec::new()));
        let destroys2 = Rc::clone(&destroys);
        bus.subscribe(EventName::Destroy, TargetFilter::Any, move |ev| {
            destroys2.borrow_mut().push(ev.target_drawable());
        });

        let first_child = stack.children()[0].clone();
        stack.clear().unwrap();
        assert!(stack.children().is_empty());
        assert!(!stack.is_destroyed());
        assert!(first_child.is_destroyed());
        assert!(first_child.parent().is_none());
        assert_eq!(destroys.borrow().len(), 2);

        // Clearing an empty slot is a quiet no-op.
        stack.clear().unwrap();
        assert_eq!(destroys.borrow().len(), 2);
    }

    #[test]
    fn test_replace_swaps_contents() {
        let bus = EventBus::new();
        let app = App::new(&bus, Features::empty()).unwrap();

        let flow = app
            .flow(styles! {}, |app| {
                app.para("old", styles! {})?;
                Ok(())
            })
            .unwrap();

        flow.replace(&app, |app| {
            app.para("new", styles! {})?;
            Ok(())
        })
        .unwrap();

        let children = flow.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].style("text"), Some("new".into()));
    }

    #[test]
    fn test_slot_operations_refuse_leaves() {
        let bus = EventBus::new();
        let app = App::new(&bus, Features::empty()).unwrap();
        let button = app.button("leaf", styles! {}).unwrap();

        let err = button.clear().unwrap_err();
        assert!(matches!(err, Error::NotAContainer { .. }));

        let err = button.append(&app, |_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::NotAContainer { .. }));
    }
}
