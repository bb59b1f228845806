use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::{speak, SpeakError, Synthesizer};
use crate::{
    audio::{player::EnqueueOutcome, player::SessionRegistry, voice::VoiceGateway},
    storage::ShortcutStore,
    transform::{transform, NicknameTable, SpeakerState, SpokenMessage},
};

/// Reads chat messages into a guild's session, one message at a time per guild.
///
/// Each guild has a lane held from transform to enqueue, so clips are queued
/// in the order their messages arrived even when synthesis latency varies.
pub struct Narrator<G: VoiceGateway> {
    sessions: Arc<Mutex<SessionRegistry<G>>>,
    synth: Arc<dyn Synthesizer>,
    shortcuts: Arc<Mutex<ShortcutStore>>,
    nicknames: Arc<NicknameTable>,
    speakers: parking_lot::Mutex<SpeakerState>,
    lanes: DashMap<GuildId, Arc<Mutex<()>>>,
    language: String,
}

impl<G: VoiceGateway> Narrator<G> {
    pub fn new(
        sessions: Arc<Mutex<SessionRegistry<G>>>,
        synth: Arc<dyn Synthesizer>,
        shortcuts: Arc<Mutex<ShortcutStore>>,
        nicknames: Arc<NicknameTable>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            synth,
            shortcuts,
            nicknames,
            speakers: parking_lot::Mutex::new(SpeakerState::default()),
            lanes: DashMap::new(),
            language: language.into(),
        }
    }

    fn lane(&self, guild_id: GuildId) -> Arc<Mutex<()>> {
        self.lanes.entry(guild_id).or_default().clone()
    }

    /// Speaks `message` if it was posted in the chat of the guild's bound
    /// voice channel. Returns `None` when the message is not spoken.
    pub async fn narrate(
        &self,
        guild_id: GuildId,
        message: &SpokenMessage,
    ) -> Result<Option<EnqueueOutcome>, SpeakError> {
        let lane = self.lane(guild_id);
        let _turn = lane.lock().await;

        if self.sessions.lock().await.bound_channel(guild_id) != Some(message.channel_id) {
            return Ok(None);
        }

        let utterance = {
            let store = self.shortcuts.lock().await;
            let speakers = self.speakers.lock();
            transform(message, store.shortcuts(guild_id), &speakers, &self.nicknames)
        };

        if utterance.text.trim().is_empty() {
            return Ok(None);
        }

        let outcome = speak(
            &*self.sessions,
            self.synth.as_ref(),
            guild_id,
            &utterance.text,
            &self.language,
        )
        .await?;

        if utterance.new_speaker {
            self.speakers
                .lock()
                .record(message.channel_id, message.author_id);
        }

        debug!("🗣️ {:?} in guild {}", outcome, guild_id);
        Ok(Some(outcome))
    }
}
