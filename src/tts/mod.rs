//! Speech synthesis: rendering text into playable clips.

pub mod google;
pub mod narrator;

use async_trait::async_trait;
use serenity::model::id::GuildId;
use tokio::sync::Mutex;
use tracing::debug;

use crate::audio::{
    player::{EnqueueOutcome, QueueError, SessionRegistry},
    queue::Clip,
    voice::VoiceGateway,
};

pub use google::GoogleTts;
pub use narrator::Narrator;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("nothing to synthesize")]
    EmptyText,

    #[error("speech request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid speech endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not write clip: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not keep clip file: {0}")]
    Persist(#[from] tempfile::PathPersistError),
}

#[derive(Debug, thiserror::Error)]
pub enum SpeakError {
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Renders text into an audio file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Clip, SynthesisError>;
}

/// Synthesizes `text` and queues it for playback in `guild_id`.
///
/// The registry lock is only taken once the clip exists.
pub async fn speak<G: VoiceGateway>(
    sessions: &Mutex<SessionRegistry<G>>,
    synth: &dyn Synthesizer,
    guild_id: GuildId,
    text: &str,
    language: &str,
) -> Result<EnqueueOutcome, SpeakError> {
    let clip = synth.synthesize(text, language).await?;
    debug!("🗣️ Synthesized {} for guild {}", clip.path().display(), guild_id);

    let outcome = sessions.lock().await.enqueue(guild_id, clip).await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{clip_in, FakeGateway};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use serenity::model::id::ChannelId;

    const GUILD: GuildId = GuildId::new(42);

    #[tokio::test]
    async fn test_speak_enqueues_synthesized_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        let clip_path = path.clone();

        let gateway = FakeGateway::default();
        let (mut registry, _rx) = SessionRegistry::new(gateway.clone());
        registry.join(GUILD, ChannelId::new(100)).await.unwrap();
        let sessions = Mutex::new(registry);

        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .with(eq("hello there"), eq("en"))
            .times(1)
            .returning(move |_, _| Ok(clip_in(&clip_path)));

        let outcome = speak(&sessions, &synth, GUILD, "hello there", "en").await.unwrap();

        assert_eq!(outcome, EnqueueOutcome::Started);
        assert_eq!(gateway.played(), vec![path]);
    }

    #[tokio::test]
    async fn test_speak_without_session_discards_clip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        let clip_path = path.clone();
        let (registry, _rx) = SessionRegistry::new(FakeGateway::default());
        let sessions = Mutex::new(registry);

        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .returning(move |_, _| Ok(clip_in(&clip_path)));

        let result = speak(&sessions, &synth, GUILD, "anyone?", "en").await;

        assert!(matches!(result, Err(SpeakError::Queue(QueueError::NotConnected(_)))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_synthesis_failure_enqueues_nothing() {
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = SessionRegistry::new(gateway.clone());
        registry.join(GUILD, ChannelId::new(100)).await.unwrap();
        let sessions = Mutex::new(registry);

        let mut synth = MockSynthesizer::new();
        synth
            .expect_synthesize()
            .returning(|_, _| Err(SynthesisError::EmptyText));

        let result = speak(&sessions, &synth, GUILD, "", "en").await;

        assert!(matches!(result, Err(SpeakError::Synthesis(SynthesisError::EmptyText))));
        assert!(gateway.played().is_empty());
        assert!(sessions.lock().await.now_playing(GUILD).is_none());
    }
}
