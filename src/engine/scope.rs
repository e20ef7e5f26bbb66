//! Path-prefix scopes for one file traversal.
//!
//! The stack models lexically nested prefix blocks (`web::scope`, class-level
//! mappings, inline `nest` calls). The binding table models router values held
//! in variables: a name is bound to the prefix that was resolved when the
//! binding happened and keeps it regardless of what the stack does later.

use log::debug;
use std::collections::HashMap;

/// Opaque marker returned by [`ScopeContext::push`], consumed by [`ScopeContext::pop`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pushed scope must be popped with its handle"]
pub struct ScopeHandle {
    depth: usize,
}

#[derive(Debug, Default, Clone)]
pub struct ScopeContext {
    stack: Vec<String>,
    bindings: HashMap<String, String>,
}

impl ScopeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a nested prefix block
    pub fn push(&mut self, fragment: &str) -> ScopeHandle {
        let handle = ScopeHandle {
            depth: self.stack.len(),
        };
        self.stack.push(fragment.to_string());
        handle
    }

    /// Leave the block opened by `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is not the innermost open scope.
    pub fn pop(&mut self, handle: ScopeHandle) {
        assert_eq!(
            handle.depth + 1,
            self.stack.len(),
            "scope popped out of order (handle depth {}, stack depth {})",
            handle.depth,
            self.stack.len()
        );
        self.stack.truncate(handle.depth);
    }

    /// Concatenation of every fragment currently on the stack
    pub fn current_prefix(&self) -> String {
        self.stack
            .iter()
            .fold(String::new(), |acc, fragment| join_paths(&acc, fragment))
    }

    /// Record `name` as holding a router mounted at `resolved_prefix`.
    ///
    /// The last binding for a name wins.
    pub fn bind(&mut self, name: &str, resolved_prefix: &str) {
        debug!("Binding {} -> {}", name, resolved_prefix);
        self.bindings
            .insert(name.to_string(), resolved_prefix.to_string());
    }

    /// Bind `name` to the current stack prefix followed by `fragment`
    pub fn bind_here(&mut self, name: &str, fragment: &str) {
        let resolved = join_paths(&self.current_prefix(), fragment);
        self.bind(name, &resolved);
    }

    /// Prefix bound to `name`, or an empty prefix for names never bound
    pub fn resolve(&self, name: &str) -> String {
        self.bindings.get(name).cloned().unwrap_or_default()
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Prefix for a declaration made through `receiver` inside the current stack
    pub fn prefix_for(&self, receiver: &str) -> String {
        join_paths(&self.current_prefix(), &self.resolve(receiver))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Copy of the binding table, for callers that scope bindings to a block
    pub fn save_bindings(&self) -> HashMap<String, String> {
        self.bindings.clone()
    }

    /// Replace the binding table with one taken by [`ScopeContext::save_bindings`]
    pub fn restore_bindings(&mut self, saved: HashMap<String, String>) {
        self.bindings = saved;
    }
}

/// Join two path pieces with exactly one separator between them.
///
/// Separator clean-up inside the pieces is left to the path normalizer.
pub fn join_paths(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    if path.is_empty() {
        return prefix.to_string();
    }

    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');

    if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}
