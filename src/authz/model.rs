use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Actions a caller can request on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Create,
    Read,
    Update,
    Delete,
    /// Supremacy action: implies every other action on the same resource.
    Manage,
}

/// Resources the admin application guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Pov,
    Dashboard,
    User,
    Site,
    Credential,
}

impl Action {
    fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        }
    }
}

impl Resource {
    fn as_str(&self) -> &'static str {
        match self {
            Resource::Pov => "pov",
            Resource::Dashboard => "dashboard",
            Resource::User => "user",
            Resource::Site => "site",
            Resource::Credential => "credential",
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            "manage" => Ok(Action::Manage),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pov" => Ok(Resource::Pov),
            "dashboard" => Ok(Resource::Dashboard),
            "user" => Ok(Resource::User),
            "site" => Ok(Resource::Site),
            "credential" => Ok(Resource::Credential),
            other => Err(format!("unknown resource: {other}")),
        }
    }
}

/// A requestable capability: one action on one resource.
///
/// Permissions are declared at call sites and carried in session claims as
/// `"action:resource"` strings; they are never persisted by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission {
    pub action: Action,
    pub resource: Resource,
}

impl Permission {
    pub const fn new(action: Action, resource: Resource) -> Self {
        Self { action, resource }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action.as_str(), self.resource.as_str())
    }
}

impl FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (action, resource) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed permission: {s}"))?;
        Ok(Permission {
            action: action.parse()?,
            resource: resource.parse()?,
        })
    }
}

// Serde carries permissions in their "action:resource" string form.
impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Core decision function.
///
/// Evaluation order:
/// 1. requested permission held verbatim -> allow
/// 2. requested action is not `manage` -> re-test manage on the same resource
/// 3. deny
pub fn allowed(held: &HashSet<Permission>, requested: Permission) -> bool {
    if held.contains(&requested) {
        return true;
    }

    if requested.action != Action::Manage {
        return held.contains(&Permission::new(Action::Manage, requested.resource));
    }

    false
}

/// Allow if any of the listed permissions passes [`allowed`].
pub fn any_of(held: &HashSet<Permission>, requested: &[Permission]) -> bool {
    requested.iter().any(|perm| allowed(held, *perm))
}

/// Allow only if every listed permission passes [`allowed`].
pub fn all_of(held: &HashSet<Permission>, requested: &[Permission]) -> bool {
    requested.iter().all(|perm| allowed(held, *perm))
}
