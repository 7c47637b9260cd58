//! Organization context and roles.
//!
//! Every queue operation receives an explicit [`OrgContext`] instead of
//! reading the active organization from ambient state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GlasError;

/// Member role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    Office,
    Planner,
    Technician,
    Viewer,
}

impl Role {
    /// Numeric rank; higher ranks include the rights of lower ones.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Owner => 5,
            Self::Admin => 4,
            Self::Office | Self::Planner => 3,
            Self::Technician => 2,
            Self::Viewer => 1,
        }
    }

    /// Check whether this role satisfies any of the required roles.
    #[must_use]
    pub fn can(self, required: &[Self]) -> bool {
        required.iter().any(|r| self.rank() >= r.rank())
    }

    /// Lowercase name as stored and sent to the backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Office => "office",
            Self::Planner => "planner",
            Self::Technician => "technician",
            Self::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GlasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "office" => Ok(Self::Office),
            "planner" => Ok(Self::Planner),
            "technician" => Ok(Self::Technician),
            "viewer" => Ok(Self::Viewer),
            other => Err(GlasError::Config(format!("Unknown role: {other}"))),
        }
    }
}

/// The active organization and the caller's role in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgContext {
    pub org_id: String,
    pub role: Role,
}

impl OrgContext {
    #[must_use]
    pub fn new(org_id: impl Into<String>, role: Role) -> Self {
        Self {
            org_id: org_id.into(),
            role,
        }
    }

    /// Fail with `PermissionDenied` unless the role satisfies `required`.
    ///
    /// # Errors
    ///
    /// Returns `GlasError::PermissionDenied` naming the action.
    pub fn require(&self, required: &[Role], action: &str) -> Result<(), GlasError> {
        if self.role.can(required) {
            Ok(())
        } else {
            Err(GlasError::PermissionDenied(format!(
                "role '{}' may not {action} in org {}",
                self.role, self.org_id
            )))
        }
    }
}
