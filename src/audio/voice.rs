//! Capability interface between the playback queue and the voice backend,
//! plus its songbird implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{File, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::queue::{Clip, ClipId};

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("could not join voice channel: {0}")]
    Join(#[from] songbird::error::JoinError),

    #[error("track control failed: {0}")]
    Track(String),
}

/// Messages the voice backend sends back to the playback loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished { guild_id: GuildId, clip_id: ClipId },
}

/// Handed to the backend with every clip; fires once the clip ends or fails.
///
/// Only enqueues a [`PlaybackEvent`]; it never touches session state.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    guild_id: GuildId,
    clip_id: ClipId,
    tx: mpsc::UnboundedSender<PlaybackEvent>,
}

impl CompletionNotifier {
    pub(crate) fn new(
        guild_id: GuildId,
        clip_id: ClipId,
        tx: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Self {
        Self {
            guild_id,
            clip_id,
            tx,
        }
    }

    pub fn notify(&self) {
        let event = PlaybackEvent::Finished {
            guild_id: self.guild_id,
            clip_id: self.clip_id,
        };
        if self.tx.send(event).is_err() {
            debug!("Playback loop closed, dropping {:?}", event);
        }
    }
}

/// Opens voice connections.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    type Connection: VoiceConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Connection, VoiceError>;
}

/// One live voice connection.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Starts playing `clip`. Songbird mixes it with any other live track, so
    /// callers start a clip only once the previous one has finished or stopped.
    async fn play(&self, clip: &Clip, notifier: CompletionNotifier) -> Result<(), VoiceError>;

    fn stop(&self);

    async fn is_playing(&self) -> bool;

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError>;

    async fn disconnect(&self) -> Result<(), VoiceError>;
}

/// [`VoiceGateway`] backed by the songbird manager registered with serenity.
#[derive(Clone)]
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    type Connection = SongbirdConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Connection, VoiceError> {
        let call = self.manager.join(guild_id, channel_id).await?;
        info!("🔊 Connected to voice channel {} in guild {}", channel_id, guild_id);

        Ok(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            call,
            current: Mutex::new(None),
        })
    }
}

pub struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<tokio::sync::Mutex<Call>>,
    current: Mutex<Option<TrackHandle>>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, clip: &Clip, notifier: CompletionNotifier) -> Result<(), VoiceError> {
        let input: Input = File::new(clip.path().to_path_buf()).into();

        let track = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        // A failing track raises both events; the queue drops the duplicate.
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    ClipEndHandler {
                        notifier: notifier.clone(),
                    },
                )
                .map_err(|e| VoiceError::Track(e.to_string()))?;
        }

        *self.current.lock() = Some(track);
        Ok(())
    }

    fn stop(&self) {
        if let Some(track) = self.current.lock().take() {
            let _ = track.stop();
        }
    }

    async fn is_playing(&self) -> bool {
        let track = self.current.lock().clone();
        match track {
            Some(track) => match track.get_info().await {
                Ok(info) => matches!(info.playing, PlayMode::Play | PlayMode::Pause),
                Err(_) => false,
            },
            None => false,
        }
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        self.manager.join(self.guild_id, channel_id).await?;
        info!("🔀 Moved to voice channel {} in guild {}", channel_id, self.guild_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        self.current.lock().take();
        self.manager.remove(self.guild_id).await?;
        Ok(())
    }
}

/// Songbird track event handler forwarding to a [`CompletionNotifier`].
struct ClipEndHandler {
    notifier: CompletionNotifier,
}

#[async_trait]
impl VoiceEventHandler for ClipEndHandler {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _handle) in *tracks {
                debug!("Clip track ended with {:?}", state.playing);
            }
        }

        self.notifier.notify();

        None
    }
}
