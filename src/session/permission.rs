//! Effective permission of the local user.

use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Access level granted for the open document.
///
/// Levels are ordered from most to least permissive. Server messages may
/// only narrow the effective level; see [`Permission::narrow`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Full editing.
    #[default]
    Edit,
    /// Viewing, with the option to switch to editing if the document allows.
    View,
    /// Viewing only, permanently for this document.
    #[serde(alias = "read-only")]
    ReadOnly,
}

impl Permission {
    /// Wire name of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Edit => "edit",
            Permission::View => "view",
            Permission::ReadOnly => "readonly",
        }
    }

    /// Whether the level permits editing.
    #[must_use]
    pub fn can_edit(self) -> bool { matches!(self, Permission::Edit) }

    /// Whether the level is the terminal read-only state.
    #[must_use]
    pub fn is_read_only(self) -> bool { matches!(self, Permission::ReadOnly) }

    /// Combine `self` with a server-requested level without widening.
    ///
    /// ```
    /// use docwire::Permission;
    ///
    /// assert_eq!(Permission::Edit.narrow(Permission::View), Permission::View);
    /// assert_eq!(Permission::ReadOnly.narrow(Permission::Edit), Permission::ReadOnly);
    /// ```
    #[must_use]
    pub fn narrow(self, requested: Permission) -> Permission { self.max(requested) }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Error returned when a permission name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission {0:?}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "edit" => Ok(Permission::Edit),
            "view" => Ok(Permission::View),
            "readonly" | "read-only" => Ok(Permission::ReadOnly),
            other => Err(UnknownPermission(other.to_owned())),
        }
    }
}
