use serenity::model::id::{ChannelId, GuildId};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{
    queue::{Clip, ClipId, GuildAudioSession, SessionState},
    voice::{CompletionNotifier, PlaybackEvent, VoiceConnection, VoiceError, VoiceGateway},
};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("not connected to a voice channel in guild {0}")]
    NotConnected(GuildId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Connected,
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Started,
    Queued { position: usize },
}

/// Owns every guild's audio session.
///
/// All mutation goes through `&mut self`; the bot keeps the registry behind a
/// single [`Mutex`] and playback completions arrive as [`PlaybackEvent`]s on
/// the channel returned by [`SessionRegistry::new`].
pub struct SessionRegistry<G: VoiceGateway> {
    gateway: G,
    sessions: HashMap<GuildId, GuildAudioSession<G::Connection>>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl<G: VoiceGateway> SessionRegistry<G> {
    pub fn new(gateway: G) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            gateway,
            sessions: HashMap::new(),
            events,
        };
        (registry, rx)
    }

    /// Connects to `channel_id`, or moves the existing connection there.
    pub async fn join(
        &mut self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<JoinOutcome, VoiceError> {
        if let Some(session) = self.sessions.get_mut(&guild_id) {
            session.connection.move_to(channel_id).await?;
            session.channel_id = channel_id;
            return Ok(JoinOutcome::Moved);
        }

        let connection = self.gateway.connect(guild_id, channel_id).await?;
        self.sessions.insert(
            guild_id,
            GuildAudioSession::new(guild_id, channel_id, connection),
        );
        Ok(JoinOutcome::Connected)
    }

    /// Destroys the guild's session: clears it, then releases the connection.
    ///
    /// Returns `false` if there was no session.
    pub async fn leave(&mut self, guild_id: GuildId) -> bool {
        let Some(mut session) = self.sessions.remove(&guild_id) else {
            return false;
        };

        clear_session(&mut session).await;

        if let Err(e) = session.connection.disconnect().await {
            warn!("Error disconnecting in guild {}: {}", guild_id, e);
        }

        info!("👋 Left voice channel {} in guild {}", session.channel_id, guild_id);
        true
    }

    /// Leaves every guild, used on shutdown.
    pub async fn leave_all(&mut self) {
        let guilds: Vec<GuildId> = self.sessions.keys().copied().collect();
        for guild_id in guilds {
            self.leave(guild_id).await;
        }
    }

    /// Plays `clip` now if the session is idle, otherwise appends it.
    ///
    /// Without a session the clip is discarded and an error returned.
    pub async fn enqueue(
        &mut self,
        guild_id: GuildId,
        clip: Clip,
    ) -> Result<EnqueueOutcome, QueueError> {
        let Some(session) = self.sessions.get_mut(&guild_id) else {
            clip.discard().await;
            return Err(QueueError::NotConnected(guild_id));
        };

        if session.state() == SessionState::Playing {
            session.queue.push_back(clip);
            let position = session.queue.len();
            debug!("➕ Clip queued at position {} in guild {}", position, guild_id);
            return Ok(EnqueueOutcome::Queued { position });
        }

        start_playback(session, clip, &self.events).await;
        Ok(EnqueueOutcome::Started)
    }

    /// Retires the finished clip and starts the next queued one.
    ///
    /// Completions for clips that are no longer current are ignored.
    pub async fn on_playback_complete(&mut self, guild_id: GuildId, clip_id: ClipId) {
        let Some(session) = self.sessions.get_mut(&guild_id) else {
            debug!("Completion for guild {} without session", guild_id);
            return;
        };

        match session.current.take() {
            Some(current) if current.id() == clip_id => current.discard().await,
            other => {
                session.current = other;
                debug!("Stale completion {:?} in guild {}", clip_id, guild_id);
                return;
            }
        }

        if let Some(next) = session.queue.pop_front() {
            start_playback(session, next, &self.events).await;
        } else {
            debug!("📭 Queue empty in guild {}", guild_id);
        }
    }

    pub async fn handle_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Finished { guild_id, clip_id } => {
                self.on_playback_complete(guild_id, clip_id).await
            }
        }
    }

    /// Stops playback and deletes every clip of the guild.
    ///
    /// Returns whether anything was discarded.
    pub async fn stop_and_clear(&mut self, guild_id: GuildId) -> bool {
        match self.sessions.get_mut(&guild_id) {
            Some(session) => clear_session(session).await,
            None => false,
        }
    }

    /// Points the session at `channel_id` after the bot was moved externally.
    ///
    /// The connection already follows the bot; only the binding changes.
    /// Returns whether the binding changed.
    pub fn rebind(&mut self, guild_id: GuildId, channel_id: ChannelId) -> bool {
        match self.sessions.get_mut(&guild_id) {
            Some(session) if session.channel_id != channel_id => {
                info!(
                    "🔀 Rebound guild {} from {} to {}",
                    guild_id, session.channel_id, channel_id
                );
                session.channel_id = channel_id;
                true
            }
            _ => false,
        }
    }

    pub fn bound_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.sessions.get(&guild_id).map(|s| s.channel_id)
    }

    pub fn bindings(&self) -> Vec<(GuildId, ChannelId)> {
        self.sessions
            .values()
            .map(|s| (s.guild_id, s.channel_id))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn state(&self, guild_id: GuildId) -> Option<SessionState> {
        self.sessions.get(&guild_id).map(|s| s.state())
    }

    #[cfg(test)]
    pub(crate) fn now_playing(&self, guild_id: GuildId) -> Option<&Clip> {
        self.sessions.get(&guild_id)?.current.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn pending(&self, guild_id: GuildId) -> usize {
        self.sessions.get(&guild_id).map_or(0, |s| s.queue.len())
    }
}

/// Plays `clip`, falling through the queue while the backend refuses clips.
async fn start_playback<C: VoiceConnection>(
    session: &mut GuildAudioSession<C>,
    clip: Clip,
    events: &mpsc::UnboundedSender<PlaybackEvent>,
) {
    let mut next = Some(clip);

    while let Some(clip) = next.take() {
        let notifier = CompletionNotifier::new(session.guild_id, clip.id(), events.clone());
        match session.connection.play(&clip, notifier).await {
            Ok(()) => {
                debug!("▶️ Playing {} in guild {}", clip.path().display(), session.guild_id);
                session.current = Some(clip);
            }
            Err(e) => {
                warn!("Could not play clip in guild {}: {}", session.guild_id, e);
                clip.discard().await;
                next = session.queue.pop_front();
            }
        }
    }
}

async fn clear_session<C: VoiceConnection>(session: &mut GuildAudioSession<C>) -> bool {
    if session.connection.is_playing().await {
        session.connection.stop();
    }

    let clips = session.drain();
    let discarded = !clips.is_empty();
    for clip in clips {
        clip.discard().await;
    }

    if discarded {
        info!("🗑️ Queue cleared in guild {}", session.guild_id);
    }
    discarded
}

/// Applies playback events to the registry until every sender is gone.
pub async fn run_playback_loop<G: VoiceGateway>(
    sessions: Arc<Mutex<SessionRegistry<G>>>,
    mut events: mpsc::UnboundedReceiver<PlaybackEvent>,
) {
    while let Some(event) = events.recv().await {
        sessions.lock().await.handle_event(event).await;
    }
    debug!("Playback loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::{clip_in, FakeGateway};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    const GUILD: GuildId = GuildId::new(42);
    const VOICE: ChannelId = ChannelId::new(100);

    async fn joined(gateway: &FakeGateway) -> (SessionRegistry<FakeGateway>, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (mut registry, rx) = SessionRegistry::new(gateway.clone());
        assert_eq!(registry.join(GUILD, VOICE).await.unwrap(), JoinOutcome::Connected);
        (registry, rx)
    }

    async fn finish_current(registry: &mut SessionRegistry<FakeGateway>, guild_id: GuildId) {
        let id = registry.now_playing(guild_id).unwrap().id();
        registry.on_playback_complete(guild_id, id).await;
    }

    #[tokio::test]
    async fn test_clips_play_in_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;

        let paths: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("{i}.mp3"))).collect();
        for path in &paths {
            registry.enqueue(GUILD, clip_in(path)).await.unwrap();
        }

        assert_eq!(gateway.played(), vec![paths[0].clone()]);
        assert_eq!(registry.pending(GUILD), 3);

        for _ in 0..4 {
            finish_current(&mut registry, GUILD).await;
        }

        assert_eq!(gateway.played(), paths);
        assert_eq!(registry.state(GUILD), Some(SessionState::Idle));
        assert!(paths.iter().all(|p| !p.exists()));
    }

    #[tokio::test]
    async fn test_enqueue_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;

        let first = registry.enqueue(GUILD, clip_in(dir.path().join("a.mp3"))).await;
        let second = registry.enqueue(GUILD, clip_in(dir.path().join("b.mp3"))).await;
        let third = registry.enqueue(GUILD, clip_in(dir.path().join("c.mp3"))).await;

        assert_eq!(first.unwrap(), EnqueueOutcome::Started);
        assert_eq!(second.unwrap(), EnqueueOutcome::Queued { position: 1 });
        assert_eq!(third.unwrap(), EnqueueOutcome::Queued { position: 2 });
    }

    #[tokio::test]
    async fn test_enqueue_without_session_fails_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.mp3");
        let (mut registry, _rx) = SessionRegistry::new(FakeGateway::default());

        let result = registry.enqueue(GUILD, clip_in(&path)).await;

        assert!(matches!(result, Err(QueueError::NotConnected(g)) if g == GUILD));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_completion_deletes_file_and_advances() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let first = dir.path().join("first.mp3");
        let second = dir.path().join("second.mp3");

        registry.enqueue(GUILD, clip_in(&first)).await.unwrap();
        registry.enqueue(GUILD, clip_in(&second)).await.unwrap();
        finish_current(&mut registry, GUILD).await;

        assert!(!first.exists());
        assert!(second.exists());
        assert_eq!(registry.now_playing(GUILD).unwrap().path(), second.as_path());
        assert_eq!(registry.pending(GUILD), 0);

        finish_current(&mut registry, GUILD).await;
        assert!(registry.now_playing(GUILD).is_none());
    }

    #[tokio::test]
    async fn test_completion_survives_already_deleted_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let first = dir.path().join("first.mp3");
        let second = dir.path().join("second.mp3");

        registry.enqueue(GUILD, clip_in(&first)).await.unwrap();
        registry.enqueue(GUILD, clip_in(&second)).await.unwrap();
        std::fs::remove_file(&first).unwrap();
        finish_current(&mut registry, GUILD).await;

        assert_eq!(registry.now_playing(GUILD).unwrap().path(), second.as_path());
    }

    #[tokio::test]
    async fn test_stale_completion_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;

        let stale = clip_in(dir.path().join("old.mp3"));
        let stale_id = stale.id();
        registry.enqueue(GUILD, stale).await.unwrap();
        registry.stop_and_clear(GUILD).await;

        let fresh = dir.path().join("new.mp3");
        registry.enqueue(GUILD, clip_in(&fresh)).await.unwrap();
        registry.on_playback_complete(GUILD, stale_id).await;

        assert!(fresh.exists());
        assert_eq!(registry.now_playing(GUILD).unwrap().path(), fresh.as_path());
    }

    #[tokio::test]
    async fn test_notifier_events_drive_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, mut rx) = joined(&gateway).await;
        let second = dir.path().join("2.mp3");

        registry.enqueue(GUILD, clip_in(dir.path().join("1.mp3"))).await.unwrap();
        registry.enqueue(GUILD, clip_in(&second)).await.unwrap();

        gateway.finish_last();
        let event = rx.recv().await.unwrap();
        registry.handle_event(event).await;

        assert_eq!(registry.now_playing(GUILD).unwrap().path(), second.as_path());
    }

    #[tokio::test]
    async fn test_stop_and_clear_on_idle_session_returns_false() {
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;

        assert!(!registry.stop_and_clear(GUILD).await);
        assert!(!registry.stop_and_clear(GuildId::new(7)).await);
        assert_eq!(gateway.stops(), 0);
    }

    #[tokio::test]
    async fn test_stop_and_clear_discards_everything() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let paths: Vec<PathBuf> = (0..3).map(|i| dir.path().join(format!("{i}.mp3"))).collect();
        for path in &paths {
            registry.enqueue(GUILD, clip_in(path)).await.unwrap();
        }

        assert!(registry.stop_and_clear(GUILD).await);

        assert_eq!(gateway.stops(), 1);
        assert_eq!(registry.pending(GUILD), 0);
        assert!(registry.now_playing(GUILD).is_none());
        assert!(paths.iter().all(|p| !p.exists()));
        assert!(!registry.stop_and_clear(GUILD).await);
    }

    #[tokio::test]
    async fn test_failed_start_falls_through_to_next_clip() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let first = dir.path().join("1.mp3");
        let broken = dir.path().join("broken.mp3");
        let last = dir.path().join("3.mp3");
        gateway.refuse(&broken);

        registry.enqueue(GUILD, clip_in(&first)).await.unwrap();
        registry.enqueue(GUILD, clip_in(&broken)).await.unwrap();
        registry.enqueue(GUILD, clip_in(&last)).await.unwrap();
        finish_current(&mut registry, GUILD).await;

        assert!(!broken.exists());
        assert_eq!(registry.now_playing(GUILD).unwrap().path(), last.as_path());
    }

    #[tokio::test]
    async fn test_join_twice_moves_and_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        registry.enqueue(GUILD, clip_in(dir.path().join("1.mp3"))).await.unwrap();
        registry.enqueue(GUILD, clip_in(dir.path().join("2.mp3"))).await.unwrap();

        let other = ChannelId::new(200);
        assert_eq!(registry.join(GUILD, other).await.unwrap(), JoinOutcome::Moved);

        assert_eq!(registry.bound_channel(GUILD), Some(other));
        assert_eq!(registry.pending(GUILD), 1);
        assert_eq!(gateway.connects(), 1);
        assert_eq!(gateway.moves(), vec![other]);
    }

    #[tokio::test]
    async fn test_rebind_follows_external_move_and_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        registry.enqueue(GUILD, clip_in(dir.path().join("1.mp3"))).await.unwrap();
        let dragged_to = ChannelId::new(250);

        assert!(registry.rebind(GUILD, dragged_to));
        assert!(!registry.rebind(GUILD, dragged_to));
        assert!(!registry.rebind(GuildId::new(7), dragged_to));

        assert_eq!(registry.bound_channel(GUILD), Some(dragged_to));
        assert_eq!(registry.state(GUILD), Some(SessionState::Playing));
        assert!(gateway.moves().is_empty());
    }

    #[tokio::test]
    async fn test_leave_destroys_session_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let paths: Vec<PathBuf> = (0..2).map(|i| dir.path().join(format!("{i}.mp3"))).collect();
        for path in &paths {
            registry.enqueue(GUILD, clip_in(path)).await.unwrap();
        }

        assert!(registry.leave(GUILD).await);

        assert_eq!(gateway.disconnects(), 1);
        assert!(registry.bound_channel(GUILD).is_none());
        assert!(paths.iter().all(|p| !p.exists()));
        assert!(!registry.leave(GUILD).await);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (mut registry, _rx) = joined(&gateway).await;
        let other_guild = GuildId::new(43);
        registry.join(other_guild, ChannelId::new(300)).await.unwrap();

        registry.enqueue(GUILD, clip_in(dir.path().join("a1.mp3"))).await.unwrap();
        registry.enqueue(GUILD, clip_in(dir.path().join("a2.mp3"))).await.unwrap();
        let b1 = dir.path().join("b1.mp3");
        registry.enqueue(other_guild, clip_in(&b1)).await.unwrap();

        assert!(registry.stop_and_clear(GUILD).await);

        assert_eq!(registry.now_playing(other_guild).unwrap().path(), b1.as_path());
        assert!(b1.exists());

        registry.leave_all().await;
        assert!(registry.bindings().is_empty());
    }

    #[tokio::test]
    async fn test_playback_loop_applies_events() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = FakeGateway::default();
        let (registry, rx) = joined(&gateway).await;
        let sessions = Arc::new(Mutex::new(registry));
        let first = dir.path().join("1.mp3");
        let second = dir.path().join("2.mp3");

        {
            let mut registry = sessions.lock().await;
            registry.enqueue(GUILD, clip_in(&first)).await.unwrap();
            registry.enqueue(GUILD, clip_in(&second)).await.unwrap();
        }
        let task = tokio::spawn(run_playback_loop(sessions.clone(), rx));

        gateway.finish_last();
        for _ in 0..50 {
            if !first.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert!(!first.exists());
        assert_eq!(
            sessions.lock().await.now_playing(GUILD).unwrap().path(),
            second.as_path()
        );
        task.abort();
    }
}
