/// User roles
///
/// Roles are stored as lowercase text (`admin`, `coach`, `captain`, `mentor`,
/// `member`). Parsing is case-insensitive and accepts the legacy labels
/// `competitor` (member) and `team-captain` / `team_captain` (captain).
///
/// # Example
///
/// ```
/// use runbook_core::models::role::Role;
///
/// let role: Role = "Competitor".parse().unwrap();
/// assert_eq!(role, Role::Member);
/// assert!(!role.default_approval());
/// assert!(Role::Admin.default_approval());
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Closed set of user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages everything, approved on signup
    Admin,

    /// Creates teams and approves their members
    Coach,

    /// Team lead; may approve members when enabled by policy
    Captain,

    /// Advisor attached to a team
    Mentor,

    /// Regular competitor
    Member,
}

impl Role {
    /// All roles, most privileged first
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Coach,
        Role::Captain,
        Role::Mentor,
        Role::Member,
    ];

    /// Converts role to its stored string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Coach => "coach",
            Role::Captain => "captain",
            Role::Mentor => "mentor",
            Role::Member => "member",
        }
    }

    /// Whether a new account with this role starts out approved
    ///
    /// Only admins are approved on signup.
    pub fn default_approval(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Roles a coach may hand out
    pub fn assignable_by_coach(&self) -> bool {
        matches!(self, Role::Captain | Role::Mentor | Role::Member)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "coach" => Ok(Role::Coach),
            "captain" | "team-captain" | "team_captain" => Ok(Role::Captain),
            "mentor" => Ok(Role::Mentor),
            "member" | "competitor" => Ok(Role::Member),
            other => Err(Error::invalid("role", format!("Unknown role '{}'", other))),
        }
    }
}
