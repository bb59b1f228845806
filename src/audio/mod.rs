//! # Audio Module
//!
//! Per-guild speech playback for Yappington.
//!
//! ## Architecture
//!
//! ### [`player`] - Session Registry
//! - One [`queue::GuildAudioSession`] per guild with a voice connection
//! - Strict FIFO playback, one clip at a time
//! - A single teardown path (`leave`) shared by every disconnect trigger
//!
//! ### [`queue`] - Clips and Sessions
//! - [`queue::Clip`]: a synthesized file owned by its session until deleted
//!
//! ### [`voice`] - Voice Backend
//! - Capability traits the registry talks to
//! - Songbird implementation; track completion is sent back as a
//!   [`voice::PlaybackEvent`] instead of touching session state
//!
//! ### [`presence`] - Presence Monitor
//! - Periodic sweep and event-driven check for empty voice channels
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! # async fn example(manager: std::sync::Arc<songbird::Songbird>) -> anyhow::Result<()> {
//! use serenity::all::{ChannelId, GuildId};
//!
//! let (mut registry, events) = SessionRegistry::new(SongbirdGateway::new(manager));
//! let guild_id = GuildId::new(123456789);
//!
//! registry.join(guild_id, ChannelId::new(987654321)).await?;
//! registry.enqueue(guild_id, queue::Clip::new("/tmp/clip.mp3")).await?;
//! # Ok(())
//! # }
//! ```

pub mod player;
pub mod presence;
pub mod queue;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use player::SessionRegistry;
pub use voice::SongbirdGateway;

/// Registry type the running bot uses.
pub type Sessions = std::sync::Arc<tokio::sync::Mutex<SessionRegistry<SongbirdGateway>>>;
