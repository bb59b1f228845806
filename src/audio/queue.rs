use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::debug;

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one clip for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClipId(u64);

/// A rendered audio file waiting for, or in, playback.
#[derive(Debug, PartialEq, Eq)]
pub struct Clip {
    id: ClipId,
    path: PathBuf,
}

impl Clip {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            id: ClipId(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed)),
            path: path.into(),
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the backing file. Failures are logged and otherwise ignored.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!("Could not delete clip {}: {}", self.path.display(), e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Playing,
}

/// Live binding between a guild, its voice connection and its clips.
pub struct GuildAudioSession<C> {
    pub(crate) guild_id: GuildId,
    pub(crate) channel_id: ChannelId,
    pub(crate) connection: C,
    pub(crate) queue: VecDeque<Clip>,
    pub(crate) current: Option<Clip>,
}

impl<C> GuildAudioSession<C> {
    pub fn new(guild_id: GuildId, channel_id: ChannelId, connection: C) -> Self {
        Self {
            guild_id,
            channel_id,
            connection,
            queue: VecDeque::new(),
            current: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.current.is_some() {
            SessionState::Playing
        } else {
            SessionState::Idle
        }
    }

    /// Takes the current clip and every queued clip out of the session.
    pub(crate) fn drain(&mut self) -> Vec<Clip> {
        self.current.take().into_iter().chain(self.queue.drain(..)).collect()
    }
}
