use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod storage;
mod transform;
mod tts;
mod ui;

use crate::audio::{player::run_playback_loop, SessionRegistry, Sessions, SongbirdGateway};
use crate::bot::YappingtonBot;
use crate::config::Config;
use crate::storage::ShortcutStore;
use crate::tts::GoogleTts;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("yappington=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🗣️ Starting Yappington v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let shortcuts = ShortcutStore::load(config.shortcuts_path()).await?;

    // Voice sessions and the loop applying playback completions
    let manager = Songbird::serenity();
    let (registry, playback_events) = SessionRegistry::new(SongbirdGateway::new(manager.clone()));
    let sessions: Sessions = Arc::new(Mutex::new(registry));
    tokio::spawn(run_playback_loop(sessions.clone(), playback_events));

    let synth = Arc::new(GoogleTts::new(&config)?);

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MEMBERS;

    let handler = YappingtonBot::new(config.clone(), sessions.clone(), shortcuts, synth);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Leave every voice channel before the shards go down
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, leaving voice channels...");
        sessions.lock().await.leave_all().await;
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
