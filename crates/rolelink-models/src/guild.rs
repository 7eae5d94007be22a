//! Guild-side views used by the role notifier, and the chat connection
//! state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ExternalUserId, GuildId, RoleId};

/// A user's membership in a guild, as resolved through the chat connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GuildMember {
    /// Guild the membership belongs to.
    pub guild_id: GuildId,
    /// The member's user id.
    pub user_id: ExternalUserId,
    /// Nickname if set, otherwise the username.
    pub display_name: String,
    /// Roles the member currently holds.
    pub roles: Vec<RoleId>,
}

impl GuildMember {
    /// Whether the member already holds `role`.
    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// A role defined in a guild.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GuildRole {
    /// Role id.
    pub id: RoleId,
    /// Role name, for logging.
    pub name: String,
}

/// Lifecycle of the long-lived chat platform connection.
///
/// ```text
/// Disconnected ──► Connecting ──► Ready
///       ▲                           │
///       └───────────────────────────┘  (fatal error or shutdown)
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No gateway session.
    #[default]
    Disconnected,
    /// Gateway session is being established.
    Connecting,
    /// Session established; events are flowing and lookups are allowed.
    Ready,
}

impl ConnectionState {
    /// Whether member and role lookups may be served.
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ready_serves_lookups() {
        assert!(!ConnectionState::Disconnected.is_ready());
        assert!(!ConnectionState::Connecting.is_ready());
        assert!(ConnectionState::Ready.is_ready());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn member_role_membership() {
        let member = GuildMember {
            guild_id: GuildId::new(1).unwrap(),
            user_id: ExternalUserId::new("2").unwrap(),
            display_name: "alice".into(),
            roles: vec![RoleId::new(10).unwrap()],
        };
        assert!(member.has_role(RoleId::new(10).unwrap()));
        assert!(!member.has_role(RoleId::new(11).unwrap()));
    }
}
