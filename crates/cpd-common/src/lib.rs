use serde::{Deserialize, Serialize};
use std::fmt;

pub mod logging;

// ============================================================================
// Directory Records
// ============================================================================

/// The account-level customer record.
///
/// There is exactly one per Workspace account; the migration reads it once
/// at start and mutates it at most once (the primary domain swap).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub primary_domain: String,
}

/// Which directory collection a principal lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrincipalKind {
    User,
    Group,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            PrincipalKind::User => "users",
            PrincipalKind::Group => "groups",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or group with a primary email address and its aliases.
///
/// `aliases` keeps the order returned by the directory listing; uniqueness
/// is by exact string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub kind: PrincipalKind,
    pub primary_email: String,
    /// Full name for users, group name for groups
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Principal {
    pub fn user(id: impl Into<String>, primary_email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: PrincipalKind::User,
            primary_email: primary_email.into(),
            display_name: String::new(),
            aliases: Vec::new(),
        }
    }

    pub fn group(id: impl Into<String>, primary_email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: PrincipalKind::Group,
            primary_email: primary_email.into(),
            display_name: String::new(),
            aliases: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_alias(&self, address: &str) -> bool {
        self.aliases.iter().any(|a| a == address)
    }

    /// True when the address is the primary email or one of the aliases.
    pub fn is_reachable_at(&self, address: &str) -> bool {
        self.primary_email == address || self.has_alias(address)
    }

    /// Name used in progress output, falling back to the primary email.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.primary_email
        } else {
            &self.display_name
        }
    }
}
