//! Lexically scoped environments.
//!
//! An [`Env`] is a shared handle to one frame; frames link to their
//! parent by reference. Function objects capture their definition
//! frame, and every call wraps it in a fresh child, so closures see
//! later package-level bindings without copying.
//!
//! The evaluator walk is single-threaded, so frames are
//! `Rc<RefCell<…>>` rather than anything heavier.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::object::Object;

struct Frame {
    vars: FxHashMap<String, Object>,
    parent: Option<Env>,
}

/// A shared environment frame.
#[derive(Clone)]
pub struct Env(Rc<RefCell<Frame>>);

impl Env {
    pub fn new() -> Env {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            parent: None,
        })))
    }

    /// A child frame enclosing `self`.
    pub fn enclosed(&self) -> Env {
        Env(Rc::new(RefCell::new(Frame {
            vars: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    /// Look a name up through the frame chain.
    pub fn get(&self, name: &str) -> Option<Object> {
        let frame = self.0.borrow();
        if let Some(obj) = frame.vars.get(name) {
            return Some(obj.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Bind in this frame, shadowing any outer binding.
    pub fn set_local(&self, name: impl Into<String>, value: Object) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    /// Rebind in the nearest frame that defines `name`; bind here when
    /// none does.
    pub fn set(&self, name: &str, value: Object) {
        if !self.try_rebind(name, &value) {
            self.set_local(name, value);
        }
    }

    fn try_rebind(&self, name: &str, value: &Object) -> bool {
        let mut frame = self.0.borrow_mut();
        if let Some(slot) = frame.vars.get_mut(name) {
            *slot = value.clone();
            return true;
        }
        let parent = frame.parent.clone();
        drop(frame);
        parent.is_some_and(|p| p.try_rebind(name, value))
    }

    /// Whether this exact frame (not a parent) defines `name`.
    pub fn defines_locally(&self, name: &str) -> bool {
        self.0.borrow().vars.contains_key(name)
    }

    /// Pointer identity of the frame, for cycle checks in debugging
    /// helpers.
    pub fn ptr_eq(&self, other: &Env) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Env {
    fn default() -> Self {
        Env::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_walks_parents() {
        let root = Env::new();
        root.set_local("x", Object::Integer(1));
        let child = root.enclosed();
        assert!(matches!(child.get("x"), Some(Object::Integer(1))));
        assert!(child.get("y").is_none());
    }

    #[test]
    fn test_set_local_shadows() {
        let root = Env::new();
        root.set_local("x", Object::Integer(1));
        let child = root.enclosed();
        child.set_local("x", Object::Integer(2));
        assert!(matches!(child.get("x"), Some(Object::Integer(2))));
        assert!(matches!(root.get("x"), Some(Object::Integer(1))));
    }

    #[test]
    fn test_set_rebinds_in_defining_frame() {
        let root = Env::new();
        root.set_local("x", Object::Integer(1));
        let child = root.enclosed();
        child.set("x", Object::Integer(5));
        assert!(matches!(root.get("x"), Some(Object::Integer(5))));
        assert!(!child.defines_locally("x"));

        // Unknown names bind locally.
        child.set("fresh", Object::Boolean(true));
        assert!(child.defines_locally("fresh"));
        assert!(root.get("fresh").is_none());
    }
}
