//! Explicit per-route switch for the URL-permission check.

use std::collections::HashSet;

/// The set of `(method, path)` pairs that must pass the authorization engine.
///
/// Routes not listed here are served without a permission check. Paths are
/// matched exactly; a method of `*` covers every method for that path.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashSet<(String, String)>,
}

const ANY_METHOD: &str = "*";

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, method: &str, path: &str) -> Self {
        self.insert(method, path);
        self
    }

    /// Guard every method on `path`.
    pub fn guard_all(self, path: &str) -> Self {
        self.guard(ANY_METHOD, path)
    }

    pub fn insert(&mut self, method: &str, path: &str) {
        self.routes
            .insert((method.trim().to_ascii_uppercase(), normalize(path)));
    }

    pub fn requires_check(&self, method: &str, path: &str) -> bool {
        let path = normalize(path);
        let method = method.trim().to_ascii_uppercase();
        self.routes.contains(&(method, path.clone()))
            || self.routes.contains(&(ANY_METHOD.to_string(), path))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn normalize(path: &str) -> String {
    let path = path.trim();
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => path.to_string(),
    }
}
