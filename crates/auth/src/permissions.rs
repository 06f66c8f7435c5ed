use serde::{Deserialize, Serialize};

/// One URL a role is allowed to call, optionally scoped to an HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlGrant {
    pub id: Option<String>,
    pub url: String,
    #[serde(rename = "methodType", default)]
    pub method: Option<String>,
}

impl UrlGrant {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: None,
            url: url.into(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Substring containment on the URL; exact (case-insensitive) match on
    /// the method when the grant carries one. Blank grant URLs never match.
    pub fn permits(&self, request_url: &str, request_method: &str) -> bool {
        if self.url.trim().is_empty() || !request_url.contains(self.url.as_str()) {
            return false;
        }
        match self.method.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(m) => m.eq_ignore_ascii_case(request_method.trim()),
        }
    }
}

/// Whether `request_url` falls under a public `pattern`.
///
/// Patterns ending in `/**` match their prefix and everything below it; any
/// other non-blank pattern matches when contained in the request URL.
pub fn matches_public_pattern(pattern: &str, request_url: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    match pattern.strip_suffix("/**") {
        Some(prefix) => {
            request_url == prefix
                || request_url
                    .strip_prefix(prefix)
                    .is_some_and(|rest| prefix.is_empty() || rest.starts_with('/'))
        }
        None => request_url.contains(pattern),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_matches_by_containment_and_method() {
        let g = UrlGrant::new("/api/user/v1/roles/add-role").with_method("POST");
        assert!(g.permits("/api/user/v1/roles/add-role", "POST"));
        assert!(g.permits("/api/user/v1/roles/add-role", "post"));
        assert!(g.permits("/gw/api/user/v1/roles/add-role?x=1", "POST"));
        assert!(!g.permits("/api/user/v1/roles/add-role", "GET"));
        assert!(!g.permits("/api/user/v1/roles", "POST"));
    }

    #[test]
    fn method_agnostic_and_blank_grants() {
        assert!(UrlGrant::new("/api/x").permits("/api/x/1", "DELETE"));
        assert!(UrlGrant::new("/api/x").with_method(" ").permits("/api/x", "GET"));
        assert!(!UrlGrant::new("  ").permits("/api/x", "GET"));
    }

    #[test]
    fn public_patterns() {
        assert!(matches_public_pattern("/api/user/v1/classifications/page", "/api/user/v1/classifications/page"));
        assert!(matches_public_pattern("/health", "/health"));
        assert!(matches_public_pattern("/public/**", "/public/a/b"));
        assert!(matches_public_pattern("/public/**", "/public"));
        assert!(!matches_public_pattern("/public/**", "/publicity"));
        assert!(!matches_public_pattern("", "/anything"));
        assert!(!matches_public_pattern("/api/user/v1/classifications/page", "/api/user/v1/classifications"));
    }
}
