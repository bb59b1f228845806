//! # Bot Module
//!
//! Discord event wiring for Yappington.
//!
//! The bot is built around [`YappingtonBot`], which implements Serenity's
//! [`EventHandler`] trait and connects gateway events to the rest of the crate:
//!
//! - Slash commands are answered by [`handlers`] with embed responses
//! - Chat messages in a bound voice channel's text chat are spoken through [`events`]
//! - Voice state updates are classified and handed to the presence monitor
//!
//! ## Example
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # async fn example(sessions: yappington::audio::Sessions) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let shortcuts = ShortcutStore::load(config.shortcuts_path()).await?;
//! let synth = Arc::new(GoogleTts::new(&config)?);
//! let bot = YappingtonBot::new(config, sessions, shortcuts, synth);
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serenity::{
    all::{ActivityData, Context, EventHandler, GuildId, Interaction, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{
    audio::{
        presence::{self, CacheRoster, VoiceUpdate},
        Sessions, SongbirdGateway,
    },
    config::Config,
    storage::ShortcutStore,
    transform::NicknameTable,
    tts::{Narrator, Synthesizer},
};

/// Main Discord event handler.
///
/// ## Thread Safety
///
/// Serenity dispatches events concurrently, so shared state is guarded:
/// - [`tokio::sync::Mutex`] for the session registry and the shortcut store
/// - a per-guild lane inside [`Narrator`], so messages are read one at a time
/// - a [`dashmap::DashMap`] inside [`NicknameTable`]
pub struct YappingtonBot {
    config: Arc<Config>,
    /// Voice sessions of every guild
    pub sessions: Sessions,
    /// Per-guild shortcut tables
    pub shortcuts: Arc<tokio::sync::Mutex<ShortcutStore>>,
    pub nicknames: Arc<NicknameTable>,
    pub narrator: Narrator<SongbirdGateway>,
    sweeper_started: AtomicBool,
}

impl YappingtonBot {
    pub fn new(
        config: Config,
        sessions: Sessions,
        shortcuts: ShortcutStore,
        synth: Arc<dyn Synthesizer>,
    ) -> Self {
        let shortcuts = Arc::new(tokio::sync::Mutex::new(shortcuts));
        let nicknames = Arc::new(NicknameTable::default());
        let narrator = Narrator::new(
            sessions.clone(),
            synth,
            shortcuts.clone(),
            nicknames.clone(),
            config.tts_language.clone(),
        );

        Self {
            config: Arc::new(config),
            sessions,
            shortcuts,
            nicknames,
            narrator,
            sweeper_started: AtomicBool::new(false),
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Guild commands update within seconds, global commands can take up to an
    /// hour to propagate, so `GUILD_ID` is meant for development.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Commands registered for guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }

    /// Starts the presence sweeper the first time the bot becomes ready.
    fn start_sweeper(&self, ctx: &Context) {
        if self.sweeper_started.swap(true, Ordering::SeqCst) {
            return;
        }

        presence::spawn_sweeper(
            self.sessions.clone(),
            CacheRoster::new(ctx.cache.clone()),
            self.config.presence_sweep_interval,
        );
        info!(
            "⏱️ Presence sweep every {}",
            humantime::format_duration(self.config.presence_sweep_interval)
        );
    }
}

#[async_trait]
impl EventHandler for YappingtonBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        ctx.set_activity(Some(ActivityData::listening("People Yapping!")));

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }

        self.start_sweeper(&ctx);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = events::handle_message(&ctx, &msg, self).await {
            error!("Error handling message: {:?}", e);
        }
    }

    /// Tears sessions down when the bot is disconnected externally or when the
    /// last listener walks out of the bound channel, and follows the bot when
    /// it is moved to another channel.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        let is_self = new.user_id == ctx.cache.current_user().id;
        let is_bot = new
            .member
            .as_ref()
            .map(|member| member.user.bot)
            .or_else(|| ctx.cache.user(new.user_id).map(|user| user.bot))
            .unwrap_or(false);

        let update = VoiceUpdate::classify(
            old.and_then(|state| state.channel_id),
            new.channel_id,
            is_self,
            is_bot,
        );

        let roster = CacheRoster::new(ctx.cache.clone());
        presence::apply_voice_update(&*self.sessions, &roster, guild_id, update).await;
    }
}
