//! Fire-and-forget role granting.
//!
//! The HTTP handler holds a [`RoleNotifier`] and drops [`RoleGrant`] requests
//! into an unbounded queue.  A [`RoleGrantWorker`] running alongside the chat
//! connection drains the queue, resolves member and role through a
//! [`ChatDirectory`] and assigns the role.  Nothing flows back: a grant that
//! cannot be resolved or fails is logged and dropped.

use std::sync::Arc;

use rolelink_models::{ExternalUserId, GuildId, RoleGrant, RoleId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::directory::ChatDirectory;

/// Sending half of the role-grant queue, owned by the HTTP context.
#[derive(Clone)]
pub struct RoleNotifier {
    tx: mpsc::UnboundedSender<RoleGrant>,
}

impl RoleNotifier {
    /// Create a notifier and the receiving end for the worker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RoleGrant>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Request the login role for `user_id`.  Never blocks and never fails
    /// from the caller's point of view.
    pub fn notify(&self, user_id: ExternalUserId) {
        if let Err(mpsc::error::SendError(grant)) = self.tx.send(RoleGrant { user_id }) {
            debug!(user = %grant.user_id, "role grant worker stopped, grant dropped");
        }
    }
}

/// What happened to one grant request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// The role assignment call succeeded.
    Granted,
    /// The member already held the role; no call was made.
    AlreadyHeld,
    /// Guild unknown, user not a Discord user or not in the guild, or
    /// connection not ready.
    MemberNotFound,
    /// The configured role does not exist in the guild.
    RoleNotFound,
    /// The assignment call failed.
    Failed,
}

/// Drains the role-grant queue in the chat context.
pub struct RoleGrantWorker {
    directory: Arc<dyn ChatDirectory>,
    guild_id: GuildId,
    role_id: RoleId,
    rx: mpsc::UnboundedReceiver<RoleGrant>,
}

impl RoleGrantWorker {
    /// Create a worker granting `role_id` in `guild_id`.
    pub fn new(
        directory: Arc<dyn ChatDirectory>,
        guild_id: GuildId,
        role_id: RoleId,
        rx: mpsc::UnboundedReceiver<RoleGrant>,
    ) -> Self {
        Self {
            directory,
            guild_id,
            role_id,
            rx,
        }
    }

    /// Process grants one at a time until every notifier is dropped.
    pub async fn run(mut self) {
        info!(guild = %self.guild_id, role = %self.role_id, "role grant worker started");
        while let Some(grant) = self.rx.recv().await {
            self.process(grant).await;
        }
        info!("role grant worker stopped");
    }

    /// Resolve and apply a single grant.
    pub async fn process(&self, grant: RoleGrant) -> GrantOutcome {
        let Some(member) = self
            .directory
            .resolve_member(self.guild_id, &grant.user_id)
            .await
        else {
            debug!(user = %grant.user_id, "member not found, skipping role grant");
            return GrantOutcome::MemberNotFound;
        };

        let Some(role) = self.directory.resolve_role(self.guild_id, self.role_id).await else {
            debug!(role = %self.role_id, "role not found, skipping role grant");
            return GrantOutcome::RoleNotFound;
        };

        if member.has_role(role.id) {
            return GrantOutcome::AlreadyHeld;
        }

        match self.directory.grant_role(&member, &role).await {
            Ok(()) => {
                info!(user = %member.user_id, member = %member.display_name, role = %role.name, "role granted");
                GrantOutcome::Granted
            }
            Err(e) => {
                warn!(user = %member.user_id, role = %role.name, error = %e, "role grant failed");
                GrantOutcome::Failed
            }
        }
    }
}
