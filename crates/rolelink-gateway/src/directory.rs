//! Guild lookups and role assignment behind a capability trait.
//!
//! The role-grant worker only sees [`ChatDirectory`]; the Discord-backed
//! implementation answers through serenity's REST client and refuses to
//! serve lookups until the chat connection has reached
//! [`ConnectionState::Ready`].

use std::sync::Arc;

use async_trait::async_trait;
use rolelink_models::{ConnectionState, ExternalUserId, GuildId, GuildMember, GuildRole, RoleId};
use serenity::http::Http;
use serenity::model::id as discord;
use tokio::sync::watch;
use tracing::debug;

/// Failure of a role assignment call.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The chat connection is not ready.
    #[error("chat connection is {0}")]
    NotReady(ConnectionState),

    /// The member's user id is not a Discord snowflake.
    #[error("user id {0} is not a Discord user id")]
    NotDiscordUser(ExternalUserId),

    /// Discord rejected the call or could not be reached.
    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),
}

/// Guild membership and role operations needed to grant the login role.
///
/// Lookups return `None` for anything that cannot be resolved (unknown
/// guild, user id that is not a Discord id, user not in the guild, unknown
/// role, connection not ready); the caller treats all of those alike.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// Find `user` among the members of `guild`.
    async fn resolve_member(&self, guild: GuildId, user: &ExternalUserId) -> Option<GuildMember>;

    /// Find `role` among the roles of `guild`.
    async fn resolve_role(&self, guild: GuildId, role: RoleId) -> Option<GuildRole>;

    /// Add `role` to `member`.
    async fn grant_role(&self, member: &GuildMember, role: &GuildRole) -> Result<(), DirectoryError>;
}

/// [`ChatDirectory`] backed by the Discord REST API.
pub struct DiscordDirectory {
    http: Arc<Http>,
    connection: watch::Receiver<ConnectionState>,
}

impl DiscordDirectory {
    /// Create a directory that serves lookups while `connection` reports
    /// [`ConnectionState::Ready`].
    pub fn new(http: Arc<Http>, connection: watch::Receiver<ConnectionState>) -> Self {
        Self { http, connection }
    }

    fn state(&self) -> ConnectionState {
        *self.connection.borrow()
    }
}

#[async_trait]
impl ChatDirectory for DiscordDirectory {
    async fn resolve_member(&self, guild: GuildId, user: &ExternalUserId) -> Option<GuildMember> {
        if !self.state().is_ready() {
            debug!(state = %self.state(), "member lookup skipped");
            return None;
        }
        let Some(snowflake) = user.snowflake() else {
            debug!(user = %user, "not a Discord user id, member lookup skipped");
            return None;
        };

        let member = discord::GuildId::new(guild.get())
            .member(&*self.http, discord::UserId::from(snowflake))
            .await
            .map_err(|e| debug!(guild = %guild, user = %user, error = %e, "member lookup failed"))
            .ok()?;

        Some(GuildMember {
            guild_id: guild,
            user_id: user.clone(),
            display_name: member.display_name().to_string(),
            roles: member
                .roles
                .iter()
                .filter_map(|role| RoleId::new(role.get()))
                .collect(),
        })
    }

    async fn resolve_role(&self, guild: GuildId, role: RoleId) -> Option<GuildRole> {
        if !self.state().is_ready() {
            return None;
        }

        let roles = discord::GuildId::new(guild.get())
            .roles(&self.http)
            .await
            .map_err(|e| debug!(guild = %guild, error = %e, "role lookup failed"))
            .ok()?;

        roles
            .get(&discord::RoleId::new(role.get()))
            .map(|found| GuildRole {
                id: role,
                name: found.name.clone(),
            })
    }

    async fn grant_role(&self, member: &GuildMember, role: &GuildRole) -> Result<(), DirectoryError> {
        let state = self.state();
        if !state.is_ready() {
            return Err(DirectoryError::NotReady(state));
        }
        let user = member
            .user_id
            .snowflake()
            .ok_or_else(|| DirectoryError::NotDiscordUser(member.user_id.clone()))?;

        self.http
            .add_member_role(
                discord::GuildId::new(member.guild_id.get()),
                discord::UserId::from(user),
                discord::RoleId::new(role.id.get()),
                Some("completed game account login"),
            )
            .await?;
        Ok(())
    }
}
