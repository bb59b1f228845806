use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId, UserId},
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};

use super::{player::SessionRegistry, voice::VoiceGateway};

/// Who is sitting in a voice channel.
pub trait Roster: Send + Sync {
    /// Non-bot members of the channel, or `None` when the guild is unknown.
    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<Vec<UserId>>;
}

/// Roster read from serenity's cache.
pub struct CacheRoster {
    cache: Arc<Cache>,
}

impl CacheRoster {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }
}

impl Roster for CacheRoster {
    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<Vec<UserId>> {
        let guild = self.cache.guild(guild_id)?;

        let states = guild.voice_states.values().map(|state| {
            let is_bot = state.member.as_ref().map(|member| member.user.bot);
            (state.user_id, state.channel_id, is_bot)
        });

        Some(non_bot_listeners(states, channel_id, |user_id| {
            guild.members.get(&user_id).map(|member| member.user.bot)
        }))
    }
}

/// Users in `channel_id` that are not bots.
///
/// Each entry is `(user, channel, is_bot)` where `is_bot` is `None` when the
/// voice state carried no member; `member_is_bot` is asked then. Users whose
/// bot flag is unknown count as listeners.
fn non_bot_listeners(
    states: impl Iterator<Item = (UserId, Option<ChannelId>, Option<bool>)>,
    channel_id: ChannelId,
    member_is_bot: impl Fn(UserId) -> Option<bool>,
) -> Vec<UserId> {
    states
        .filter(|&(_, channel, _)| channel == Some(channel_id))
        .filter(|&(user_id, _, is_bot)| {
            !is_bot.or_else(|| member_is_bot(user_id)).unwrap_or(false)
        })
        .map(|(user_id, _, _)| user_id)
        .collect()
}

/// What a voice state update means for the guild's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceUpdate {
    Ignore,
    /// The bot lost its voice channel.
    Leave,
    /// The bot was moved to another channel.
    Rebind(ChannelId),
    /// A member left this channel.
    Departure(ChannelId),
}

impl VoiceUpdate {
    pub fn classify(
        old_channel: Option<ChannelId>,
        new_channel: Option<ChannelId>,
        is_self: bool,
        is_bot: bool,
    ) -> Self {
        if is_self {
            return match new_channel {
                Some(channel_id) => VoiceUpdate::Rebind(channel_id),
                None => VoiceUpdate::Leave,
            };
        }

        if is_bot {
            return VoiceUpdate::Ignore;
        }

        match old_channel {
            Some(left) if new_channel != Some(left) => VoiceUpdate::Departure(left),
            _ => VoiceUpdate::Ignore,
        }
    }
}

/// Applies a classified voice update; returns whether the session was left.
pub async fn apply_voice_update<G: VoiceGateway>(
    sessions: &Mutex<SessionRegistry<G>>,
    roster: &dyn Roster,
    guild_id: GuildId,
    update: VoiceUpdate,
) -> bool {
    match update {
        VoiceUpdate::Ignore => false,
        VoiceUpdate::Leave => {
            let left = sessions.lock().await.leave(guild_id).await;
            if left {
                info!("🔌 Bot was disconnected in guild {}", guild_id);
            }
            left
        }
        VoiceUpdate::Rebind(channel_id) => {
            sessions.lock().await.rebind(guild_id, channel_id);
            false
        }
        VoiceUpdate::Departure(channel_id) => {
            check_departure(sessions, roster, guild_id, channel_id).await
        }
    }
}

fn is_abandoned(roster: &dyn Roster, guild_id: GuildId, channel_id: ChannelId) -> bool {
    roster
        .listeners(guild_id, channel_id)
        .is_some_and(|listeners| listeners.is_empty())
}

/// Leaves every guild whose bound channel has no listeners left.
pub async fn sweep<G: VoiceGateway>(
    sessions: &Mutex<SessionRegistry<G>>,
    roster: &dyn Roster,
) -> Vec<GuildId> {
    let mut registry = sessions.lock().await;
    let mut left = Vec::new();

    for (guild_id, channel_id) in registry.bindings() {
        if is_abandoned(roster, guild_id, channel_id) && registry.leave(guild_id).await {
            info!("🚪 Auto-disconnected from guild {} due to inactivity", guild_id);
            left.push(guild_id);
        }
    }

    left
}

/// Reacts to a member leaving `channel_id`; leaves at once if nobody remains.
pub async fn check_departure<G: VoiceGateway>(
    sessions: &Mutex<SessionRegistry<G>>,
    roster: &dyn Roster,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> bool {
    let mut registry = sessions.lock().await;

    if registry.bound_channel(guild_id) != Some(channel_id) {
        return false;
    }

    if !is_abandoned(roster, guild_id, channel_id) {
        return false;
    }

    let left = registry.leave(guild_id).await;
    if left {
        info!("🚪 Disconnected from {} as no users remain", channel_id);
    }
    left
}

/// Runs [`sweep`] on a fixed interval.
pub fn spawn_sweeper<G, R>(
    sessions: Arc<Mutex<SessionRegistry<G>>>,
    roster: R,
    period: Duration,
) -> JoinHandle<()>
where
    G: VoiceGateway + 'static,
    R: Roster + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let left = sweep(&sessions, &roster).await;
            debug!("Presence sweep done, {} sessions closed", left.len());
        }
    })
}
