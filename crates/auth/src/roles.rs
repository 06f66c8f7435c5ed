use serde::{Deserialize, Serialize};

/// Role identifier as handed out by the permission store.
///
/// Opaque at this layer: the admin side stores numeric ids, remote permission
/// services may use anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `None` for blank ids; a blank role is the same as no role.
    pub fn parse_present(id: Option<&str>) -> Option<Self> {
        id.map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
