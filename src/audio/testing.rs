//! Recording voice backend for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{
    queue::Clip,
    voice::{CompletionNotifier, VoiceConnection, VoiceError, VoiceGateway},
};

/// Writes a placeholder file and wraps it in a [`Clip`].
pub fn clip_in(path: impl AsRef<Path>) -> Clip {
    std::fs::write(path.as_ref(), b"ID3").unwrap();
    Clip::new(path.as_ref())
}

#[derive(Default)]
struct Log {
    connects: usize,
    disconnects: usize,
    stops: usize,
    moves: Vec<ChannelId>,
    played: Vec<PathBuf>,
    notifiers: Vec<CompletionNotifier>,
    playing: bool,
    refused: HashSet<PathBuf>,
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    log: Arc<Mutex<Log>>,
}

impl FakeGateway {
    pub fn played(&self) -> Vec<PathBuf> {
        self.log.lock().played.clone()
    }

    pub fn connects(&self) -> usize {
        self.log.lock().connects
    }

    pub fn disconnects(&self) -> usize {
        self.log.lock().disconnects
    }

    pub fn stops(&self) -> usize {
        self.log.lock().stops
    }

    pub fn moves(&self) -> Vec<ChannelId> {
        self.log.lock().moves.clone()
    }

    /// Makes `play` fail for this path.
    pub fn refuse(&self, path: &Path) {
        self.log.lock().refused.insert(path.to_path_buf());
    }

    /// Fires the completion notifier of the most recently started clip.
    pub fn finish_last(&self) {
        let notifier = {
            let mut log = self.log.lock();
            log.playing = false;
            log.notifiers.last().cloned()
        };
        if let Some(notifier) = notifier {
            notifier.notify();
        }
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    type Connection = FakeConnection;

    async fn connect(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<Self::Connection, VoiceError> {
        self.log.lock().connects += 1;
        Ok(FakeConnection {
            log: self.log.clone(),
        })
    }
}

pub struct FakeConnection {
    log: Arc<Mutex<Log>>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(&self, clip: &Clip, notifier: CompletionNotifier) -> Result<(), VoiceError> {
        let mut log = self.log.lock();
        if log.refused.contains(clip.path()) {
            return Err(VoiceError::Track("refused".to_string()));
        }
        log.played.push(clip.path().to_path_buf());
        log.notifiers.push(notifier);
        log.playing = true;
        Ok(())
    }

    fn stop(&self) {
        let mut log = self.log.lock();
        log.stops += 1;
        log.playing = false;
    }

    async fn is_playing(&self) -> bool {
        self.log.lock().playing
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), VoiceError> {
        self.log.lock().moves.push(channel_id);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceError> {
        let mut log = self.log.lock();
        log.disconnects += 1;
        log.playing = false;
        Ok(())
    }
}
