//! Permission identifiers and resource kinds

use serde::{Deserialize, Serialize};

/// Kind of resource a permission applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Workspace,
    Application,
    Datasource,
}

impl ResourceKind {
    /// Kinds scoped to a workspace whose policies are derived from it
    pub const DEPENDENTS: [ResourceKind; 2] = [ResourceKind::Application, ResourceKind::Datasource];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Workspace => "workspace",
            ResourceKind::Application => "application",
            ResourceKind::Datasource => "datasource",
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "workspace" => Ok(ResourceKind::Workspace),
            "application" => Ok(ResourceKind::Application),
            "datasource" => Ok(ResourceKind::Datasource),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permission identifier of the form `action:kind[:qualifier]`
/// (e.g., "manage:workspace", "read:application", "manage:workspace:applications").
///
/// The second segment names the resource kind the permission is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Parse and validate a permission code
    pub fn parse(code: &str) -> std::result::Result<Self, String> {
        if !PERMISSION_CODE_REGEX.is_match(code) {
            return Err(format!("Invalid permission code: '{}'", code));
        }
        let permission = Permission(code.to_string());
        permission.kind()?;
        Ok(permission)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn action(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    /// Resource kind encoded in the second segment
    pub fn kind(&self) -> std::result::Result<ResourceKind, String> {
        self.0
            .split(':')
            .nth(1)
            .ok_or_else(|| format!("Permission '{}' has no resource kind", self.0))?
            .parse()
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Permission {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Permission::parse(&value)
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.0
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Permission::parse(s)
    }
}

// Regex for permission code validation
lazy_static::lazy_static! {
    pub static ref PERMISSION_CODE_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-z][a-z0-9]*(?::[a-z][a-z0-9]*)+$").unwrap();
}
