#![deny(missing_docs)]

//! # rolelink models
//!
//! Core data types shared by the rolelink login gateway and its tooling.
//!
//! ## Login flow
//!
//! ```text
//! Discord OAuth ──► ExternalIdentity ──► BridgedAccount (PlayFab)
//!                          │
//!                          └──► RoleGrant ──► GuildMember + GuildRole
//! ```
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`ids`] | Discord snowflake identifiers (`GuildId`, `ChannelId`, `RoleId`) and the opaque `ExternalUserId` |
//! | [`identity`] | External identity, bridged account credential, role grant request |
//! | [`guild`] | Guild member / role views and chat connection state |
//! | [`error`] | [`ModelError`] |

pub mod error;
pub mod guild;
pub mod identity;
pub mod ids;

// Re-export all public types at crate root for convenience.
// Downstream crates can use `rolelink_models::GuildId` directly.
pub use error::*;
pub use guild::*;
pub use identity::*;
pub use ids::*;
