//! Lexical scope chain.
//!
//! An `Env` is a stack of scopes; functions capture the whole chain at
//! definition time by cloning the `Rc`s. Because scopes are shared, a
//! returned closure observes rebindings its call frame made to captured
//! names — the closure-rebinding rule — without an explicit merge step.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{exception::Exception, value::Value};

/// One scope: ordered bindings plus the scope-declaration markers.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    bindings: IndexMap<String, Value>,
    globals_decl: AHashSet<String>,
    nonlocals_decl: AHashSet<String>,
}

impl Scope {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.bindings.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.shift_remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.bindings.keys()
    }
}

/// The scope stack threaded through evaluation.
///
/// Index 0 is always the module (root) scope; `global` declarations write
/// there. `nonlocal` writes to the nearest enclosing non-root scope binding
/// the name.
#[derive(Debug)]
pub(crate) struct Env {
    scopes: Vec<Rc<RefCell<Scope>>>,
}

impl Env {
    /// A fresh environment with only a module scope.
    pub fn new_module() -> Self {
        Self {
            scopes: vec![Rc::new(RefCell::new(Scope::default()))],
        }
    }

    /// An environment for a function call: the captured chain plus a new
    /// local scope on top.
    pub fn from_closure(closure: &[Rc<RefCell<Scope>>]) -> Self {
        let mut scopes = closure.to_vec();
        scopes.push(Rc::new(RefCell::new(Scope::default())));
        Self { scopes }
    }

    /// Snapshot of the chain for closure capture at definition time.
    pub fn capture(&self) -> Vec<Rc<RefCell<Scope>>> {
        self.scopes.clone()
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Rc::new(RefCell::new(Scope::default())));
    }

    pub fn pop_scope(&mut self) -> Option<Rc<RefCell<Scope>>> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    fn top(&self) -> &Rc<RefCell<Scope>> {
        self.scopes.last().unwrap_or(&self.scopes[0])
    }

    fn root(&self) -> &Rc<RefCell<Scope>> {
        &self.scopes[0]
    }

    /// Looks a name up, honoring the top scope's declarations, then walking
    /// the chain top-down.
    pub fn get(&self, name: &str) -> Option<Value> {
        {
            let top = self.top().borrow();
            if top.globals_decl.contains(name) {
                return self.root().borrow().get(name);
            }
            if top.nonlocals_decl.contains(name) {
                return self.enclosing_binding(name).and_then(|s| s.borrow().get(name));
            }
        }
        for scope in self.scopes.iter().rev() {
            if let Some(v) = scope.borrow().get(name) {
                return Some(v);
            }
        }
        None
    }

    /// Binds a name, honoring the top scope's declarations.
    pub fn put(&mut self, name: &str, value: Value) {
        {
            let top = self.top().borrow();
            if top.globals_decl.contains(name) {
                drop(top);
                self.root().borrow_mut().set(name, value);
                return;
            }
            if top.nonlocals_decl.contains(name) {
                drop(top);
                if let Some(scope) = self.enclosing_binding(name) {
                    scope.borrow_mut().set(name, value);
                    return;
                }
            }
        }
        self.top().borrow_mut().set(name, value);
    }

    /// Rebinds a name where it is already bound, falling back to the top
    /// scope. Used by augmented assignment so `x += 1` writes through the
    /// scope that defined `x`.
    pub fn put_at_source(&mut self, name: &str, value: Value) {
        {
            let top = self.top().borrow();
            if top.globals_decl.contains(name) || top.nonlocals_decl.contains(name) {
                drop(top);
                self.put(name, value);
                return;
            }
        }
        for scope in self.scopes.iter().rev() {
            if scope.borrow().contains(name) {
                scope.borrow_mut().set(name, value);
                return;
            }
        }
        self.top().borrow_mut().set(name, value);
    }

    /// Removes a binding (the `del` statement). `NameError` when unbound.
    pub fn delete(&mut self, name: &str) -> Result<(), Exception> {
        for scope in self.scopes.iter().rev() {
            if scope.borrow().contains(name) {
                scope.borrow_mut().remove(name);
                return Ok(());
            }
        }
        Err(Exception::name_error(format!("name '{name}' is not defined")))
    }

    /// Marks names in the top scope as writing to the module scope.
    pub fn declare_global(&mut self, names: &[String]) {
        let top = self.top();
        let mut top = top.borrow_mut();
        for name in names {
            top.globals_decl.insert(name.clone());
        }
    }

    /// Marks names as writing to the nearest enclosing binding scope.
    ///
    /// Raises `SyntaxError` when no enclosing non-root scope binds the name,
    /// matching Python's compile-time rule.
    pub fn declare_nonlocal(&mut self, names: &[String]) -> Result<(), Exception> {
        for name in names {
            if self.enclosing_binding(name).is_none() {
                return Err(Exception::syntax_error(format!(
                    "no binding for nonlocal '{name}' found"
                )));
            }
            self.top().borrow_mut().nonlocals_decl.insert(name.clone());
        }
        Ok(())
    }

    /// The nearest enclosing non-root scope that binds `name` (excludes the
    /// top scope itself).
    fn enclosing_binding(&self, name: &str) -> Option<Rc<RefCell<Scope>>> {
        let top_index = self.scopes.len().saturating_sub(1);
        for scope in self.scopes[1..top_index].iter().rev() {
            if scope.borrow().contains(name) {
                return Some(scope.clone());
            }
        }
        None
    }

    /// Flattened view of all bindings, later scopes overriding earlier ones.
    /// Used to export a module body's names after evaluation.
    pub fn all_bindings(&self) -> IndexMap<String, Value> {
        let mut out = IndexMap::new();
        for scope in &self.scopes {
            for (name, value) in &scope.borrow().bindings {
                out.insert(name.clone(), value.clone());
            }
        }
        out
    }

    /// Bindings of the top scope only (class-body collection).
    pub fn top_bindings(&self) -> IndexMap<String, Value> {
        self.top().borrow().bindings.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_scopes() {
        let mut env = Env::new_module();
        env.put("x", Value::Int(1));
        env.push_scope();
        assert!(matches!(env.get("x"), Some(Value::Int(1))));
        env.put("x", Value::Int(2));
        assert!(matches!(env.get("x"), Some(Value::Int(2))));
        env.pop_scope();
        assert!(matches!(env.get("x"), Some(Value::Int(1))));
    }

    #[test]
    fn global_declaration_writes_to_root() {
        let mut env = Env::new_module();
        env.put("count", Value::Int(0));
        env.push_scope();
        env.declare_global(&["count".to_string()]);
        env.put("count", Value::Int(5));
        env.pop_scope();
        assert!(matches!(env.get("count"), Some(Value::Int(5))));
    }

    #[test]
    fn nonlocal_requires_enclosing_binding() {
        let mut env = Env::new_module();
        env.push_scope();
        let err = env.declare_nonlocal(&["missing".to_string()]).unwrap_err();
        assert!(err.to_string().contains("no binding for nonlocal"));
    }

    #[test]
    fn closure_sees_rebinding_through_shared_scope() {
        let mut env = Env::new_module();
        env.push_scope();
        env.put("n", Value::Int(1));
        let captured = env.capture();
        env.put("n", Value::Int(2));
        let call_env = Env::from_closure(&captured);
        assert!(matches!(call_env.get("n"), Some(Value::Int(2))));
    }
}
