//! Intrinsic registry.
//!
//! Keys are `pkgPath.name`, `(pkgPath.Type).Method`, or
//! `(*pkgPath.Type).Method`. The registry is a push/pop stack of maps
//! so nested tools can shadow intrinsics and restore them; lookups walk
//! the stack top-down. A separate *default intrinsic*, when set, is
//! invoked on every call for observation (call tracing).

use std::cell::RefCell;

use rustc_hash::FxHashMap;

use crate::object::IntrinsicFn;

pub struct IntrinsicRegistry {
    stack: RefCell<Vec<FxHashMap<String, IntrinsicFn>>>,
    default: RefCell<Option<IntrinsicFn>>,
}

impl IntrinsicRegistry {
    pub fn new() -> IntrinsicRegistry {
        IntrinsicRegistry {
            stack: RefCell::new(vec![FxHashMap::default()]),
            default: RefCell::new(None),
        }
    }

    /// Register under the topmost registry frame.
    pub fn register(&self, key: impl Into<String>, f: IntrinsicFn) {
        let mut stack = self.stack.borrow_mut();
        if let Some(top) = stack.last_mut() {
            top.insert(key.into(), f);
        }
    }

    pub fn register_default(&self, f: IntrinsicFn) {
        *self.default.borrow_mut() = Some(f);
    }

    pub fn default_intrinsic(&self) -> Option<IntrinsicFn> {
        self.default.borrow().clone()
    }

    /// Topmost registration for `key`.
    pub fn lookup(&self, key: &str) -> Option<IntrinsicFn> {
        let stack = self.stack.borrow();
        stack.iter().rev().find_map(|frame| frame.get(key).cloned())
    }

    /// Push a fresh shadowing frame.
    pub fn push(&self) {
        self.stack.borrow_mut().push(FxHashMap::default());
    }

    /// Pop the top frame; the base frame is never popped.
    pub fn pop(&self) {
        let mut stack = self.stack.borrow_mut();
        if stack.len() > 1 {
            stack.pop();
        }
    }
}

impl Default for IntrinsicRegistry {
    fn default() -> Self {
        IntrinsicRegistry::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use std::rc::Rc;

    fn constant(value: i64) -> IntrinsicFn {
        Rc::new(move |_, _| Object::Integer(value))
    }

    #[test]
    fn test_push_pop_shadowing() {
        let registry = IntrinsicRegistry::new();
        registry.register("p.f", constant(1));
        registry.push();
        registry.register("p.f", constant(2));
        assert!(registry.lookup("p.f").is_some());
        registry.pop();
        assert!(registry.lookup("p.f").is_some());
        registry.pop(); // base frame survives
        assert!(registry.lookup("p.f").is_some());
        assert!(registry.lookup("p.g").is_none());
    }
}
