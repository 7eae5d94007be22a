//! Long-lived Discord connection.
//!
//! Watches the login channel for the `!login` trigger and answers with a
//! message carrying a single link button to the gateway's `/login` route.
//! The connection state is published on a `watch` channel so the role-grant
//! directory knows when lookups may be served; shard reconnects and resumes
//! move it back through `Connecting`.

use rolelink_models::{ChannelId, ConnectionState};
use serenity::all::{
    ConnectionStage, Context, CreateActionRow, CreateButton, CreateMessage, EventHandler,
    GatewayIntents, Message, Ready, ShardStageUpdateEvent,
};
use serenity::async_trait;
use serenity::Client;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AppConfig;

/// Text that triggers the login prompt, compared case-insensitively.
pub const TRIGGER: &str = "!login";

const PROMPT_TEXT: &str = "Click the button below to log in!";
const BUTTON_LABEL: &str = "Log in with Discord";

/// Errors that end the chat connection.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The gateway client could not be built or the session ended with an
    /// error.
    #[error("Discord gateway error: {0}")]
    Gateway(#[from] serenity::Error),
}

/// The message posted in answer to a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPrompt {
    /// Message body.
    pub text: String,
    /// Button label.
    pub label: String,
    /// Button target.
    pub url: String,
}

impl LoginPrompt {
    fn to_message(&self) -> CreateMessage {
        let button = CreateButton::new_link(self.url.clone()).label(self.label.clone());
        CreateMessage::new()
            .content(self.text.clone())
            .components(vec![CreateActionRow::Buttons(vec![button])])
    }
}

/// Decides which incoming messages get a login prompt.
#[derive(Debug, Clone)]
pub struct PromptPolicy {
    login_channel: ChannelId,
    login_url: Url,
}

impl PromptPolicy {
    /// Prompt in `login_channel`, pointing at `login_url`.
    pub fn new(login_channel: ChannelId, login_url: Url) -> Self {
        Self {
            login_channel,
            login_url,
        }
    }

    /// The prompt to send for a message with `content` posted in `channel`,
    /// if any.
    pub fn prompt_for(&self, channel: u64, content: &str) -> Option<LoginPrompt> {
        if channel != self.login_channel.get() || content.to_lowercase() != TRIGGER {
            return None;
        }
        Some(LoginPrompt {
            text: PROMPT_TEXT.to_string(),
            label: BUTTON_LABEL.to_string(),
            url: self.login_url.to_string(),
        })
    }
}

/// Connection state reported for a shard stage.
fn state_for_stage(stage: ConnectionStage) -> ConnectionState {
    match stage {
        ConnectionStage::Connected => ConnectionState::Ready,
        ConnectionStage::Disconnected => ConnectionState::Disconnected,
        _ => ConnectionState::Connecting,
    }
}

struct Handler {
    policy: PromptPolicy,
    state: watch::Sender<ConnectionState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(bot = %ready.user.name, guilds = ready.guilds.len(), "Discord connection ready");
        self.state.send_replace(ConnectionState::Ready);
    }

    async fn shard_stage_update(&self, _ctx: Context, event: ShardStageUpdateEvent) {
        let state = state_for_stage(event.new);
        debug!(shard = %event.shard_id, from = %event.old, to = %event.new, "shard stage changed");
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(prompt) = self.policy.prompt_for(msg.channel_id.get(), &msg.content) else {
            return;
        };

        info!(channel = %msg.channel_id, author = %msg.author.name, "login prompt requested");
        if let Err(e) = msg.channel_id.send_message(&ctx, prompt.to_message()).await {
            warn!(channel = %msg.channel_id, error = %e, "failed to send login prompt");
        }
    }
}

/// Discord gateway client for the login bot.
pub struct ChatClient {
    token: String,
    policy: PromptPolicy,
    state: watch::Sender<ConnectionState>,
}

impl ChatClient {
    /// Create the client; `state` receives every connection state change.
    pub fn new(config: &AppConfig, state: watch::Sender<ConnectionState>) -> Self {
        Self {
            token: config.bot_token.clone(),
            policy: PromptPolicy::new(config.login_channel_id, config.public_login_url.clone()),
            state,
        }
    }

    /// Intents needed to read trigger messages and look up guild members.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MEMBERS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    /// Connect and process events until the session ends.
    pub async fn run(self) -> Result<(), ChatError> {
        self.state.send_replace(ConnectionState::Connecting);
        info!("connecting to Discord");

        let handler = Handler {
            policy: self.policy,
            state: self.state.clone(),
        };
        let result = match Client::builder(&self.token, Self::intents())
            .event_handler(handler)
            .await
        {
            Ok(mut client) => client.start().await,
            Err(e) => Err(e),
        };

        self.state.send_replace(ConnectionState::Disconnected);
        match &result {
            Ok(()) => info!("Discord connection closed"),
            Err(e) => warn!(error = %e, "Discord connection lost"),
        }
        result.map_err(ChatError::from)
    }
}
