//! Variable scopes
//!
//! A subshell must see every variable of its parent but must never change
//! them. Instead of copying the whole table, a child scope keeps a frozen
//! snapshot of its parent and records its own writes on top. Unsetting a
//! variable that only the parent defines leaves a tombstone.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Variable table with an optional read-only parent.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// `None` marks a variable unset in this scope
    vars: HashMap<String, Option<Vec<String>>>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields of `name`, looking through parents.
    pub fn get(&self, name: &str) -> Option<&Vec<String>> {
        match self.vars.get(name) {
            Some(Some(fields)) => Some(fields),
            Some(None) => None,
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set(&mut self, name: impl Into<String>, fields: Vec<String>) {
        self.vars.insert(name.into(), Some(fields));
    }

    pub fn unset(&mut self, name: &str) {
        let inherited = self.parent.as_ref().is_some_and(|p| p.contains(name));
        if inherited {
            self.vars.insert(name.to_string(), None);
        } else {
            self.vars.remove(name);
        }
    }

    /// A scope whose reads fall through to a snapshot of this one.
    pub fn child(&self) -> Scope {
        Scope {
            vars: HashMap::new(),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Names of all visible variables, sorted.
    pub fn names(&self) -> BTreeSet<String> {
        let mut names = self
            .parent
            .as_ref()
            .map(|p| p.names())
            .unwrap_or_default();
        for (name, value) in &self.vars {
            if value.is_some() {
                names.insert(name.clone());
            } else {
                names.remove(name);
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn test_set_get_unset() {
        let mut scope = Scope::new();
        scope.set("a", v("1"));
        assert_eq!(scope.get("a"), Some(&v("1")));
        scope.unset("a");
        assert_eq!(scope.get("a"), None);
    }

    #[test]
    fn test_child_does_not_touch_parent() {
        let mut parent = Scope::new();
        parent.set("a", v("1"));
        parent.set("b", v("2"));

        let mut child = parent.child();
        assert_eq!(child.get("a"), Some(&v("1")));
        child.set("a", v("changed"));
        child.unset("b");
        child.set("c", v("3"));

        assert_eq!(child.get("a"), Some(&v("changed")));
        assert_eq!(child.get("b"), None);
        assert_eq!(parent.get("a"), Some(&v("1")));
        assert_eq!(parent.get("b"), Some(&v("2")));
        assert_eq!(parent.get("c"), None);
    }

    #[test]
    fn test_names_hide_tombstones() {
        let mut parent = Scope::new();
        parent.set("x", v("1"));
        parent.set("y", v("2"));
        let mut child = parent.child();
        child.unset("x");
        child.set("z", v("3"));
        let names: Vec<String> = child.names().into_iter().collect();
        assert_eq!(names, vec!["y", "z"]);
    }
}
