//! # Audio Module
//!
//! Per-guild voice playback for Open Music Bot.
//!
//! ## Architecture
//!
//! ### [`track`] - Tracks
//! - Immutable resolved media plus the user who requested it
//!
//! ### [`queue`] - Queue Management
//! - FIFO queue per guild, safe for concurrent producers and one consumer
//! - Blocking dequeue with a deadline, random-access removal, paging
//!
//! ### [`session`] - Playback Sessions
//! - One playback loop task per guild, suspended on the queue or on the
//!   "track finished" signal, never polling
//! - Idle timeout, connection loss and `stop` all end in the same teardown
//!
//! ### [`registry`] - Session Registry
//! - Guild id to live session, sharded so guilds never serialize
//!
//! ### [`sink`] - Audio Sink
//! - Trait seam between the loop and songbird voice connections
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use serenity::all::{ChannelId, GuildId};
//! # use crate::audio::{
//! #     registry::SessionRegistry,
//! #     session::{GuildPlaybackSession, SessionSettings},
//! #     sink::SinkConnector,
//! #     track::Track,
//! # };
//! # use crate::error::CommandError;
//! # async fn example(connector: &dyn SinkConnector, track: Track) -> Result<(), CommandError> {
//! let registry = Arc::new(SessionRegistry::new());
//! let guild_id = GuildId::new(123456789);
//!
//! let session = registry.get_or_create(guild_id, || {
//!     Arc::new(GuildPlaybackSession::new(
//!         guild_id,
//!         SessionSettings::default(),
//!         Arc::downgrade(&registry),
//!         None,
//!     ))
//! });
//! session.connect(connector, ChannelId::new(987654321)).await?;
//! session.enqueue(track)?;
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;
#[cfg(test)]
pub mod testing;
pub mod track;
