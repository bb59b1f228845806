use anyhow::{Context as _, Result};
use serenity::{
    builder::{CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage},
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
        mention::Mentionable,
    },
    prelude::Context,
};
use tracing::{error, info};

use crate::{
    audio::player::JoinOutcome,
    bot::YappingtonBot,
    ui::embeds::{self, colors},
};

/// Dispatches a slash command
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &YappingtonBot,
) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        let embed = embeds::create_error_embed("Error", "Commands only work inside a server.");
        return respond(ctx, &command, embed).await;
    };

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let embed = match command.data.name.as_str() {
        "join" => handle_join(ctx, &command, bot, guild_id).await,
        "leave" => handle_leave(bot, guild_id).await,
        "add_shortcut" => handle_add_shortcut(&command, bot, guild_id).await?,
        "remove_shortcut" => handle_remove_shortcut(&command, bot, guild_id).await?,
        "list_shortcuts" => handle_list_shortcuts(bot, guild_id).await,
        "clear_queue" => handle_clear_queue(bot, guild_id).await,
        "nickname" => handle_nickname(&command, bot)?,
        "reset_nickname" => handle_reset_nickname(&command, bot),
        _ => embeds::create_error_embed("Error", "Unknown command"),
    };

    respond(ctx, &command, embed).await
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Result<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
        .with_context(|| format!("Missing option `{}`", name))
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &YappingtonBot,
    guild_id: GuildId,
) -> CreateEmbed {
    let Some(channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        return embeds::create_error_embed("Error", "You need to be in a voice channel first!");
    };

    let outcome = bot.sessions.lock().await.join(guild_id, channel_id).await;

    match outcome {
        Ok(outcome) => {
            if outcome == JoinOutcome::Moved {
                info!("🔀 Moved to {} on request in guild {}", channel_id, guild_id);
            }
            embeds::create_embed(
                "Yappington Connected Successfully!",
                &format!("Connected to {}", channel_id.mention()),
                colors::WARNING_ORANGE,
            )
        }
        Err(e) => {
            error!("Error joining voice in guild {}: {}", guild_id, e);
            embeds::create_error_embed("Error", "I couldn't join your voice channel.")
        }
    }
}

async fn handle_leave(bot: &YappingtonBot, guild_id: GuildId) -> CreateEmbed {
    if bot.sessions.lock().await.leave(guild_id).await {
        embeds::create_embed(
            "Yappington Disconnected!",
            "Successfully Disconnected from voice channel",
            colors::INFO_BLUE,
        )
    } else {
        embeds::create_error_embed("Error", "I'm not in a voice channel!")
    }
}

async fn handle_add_shortcut(
    command: &CommandInteraction,
    bot: &YappingtonBot,
    guild_id: GuildId,
) -> Result<CreateEmbed> {
    let shortcut = string_option(command, "shortcut")?;
    let full_text = string_option(command, "full_text")?;

    if shortcut.split_whitespace().count() != 1 {
        return Ok(embeds::create_error_embed(
            "Error",
            "A shortcut must be a single word.",
        ));
    }

    bot.shortcuts
        .lock()
        .await
        .add(guild_id, shortcut.trim(), full_text)
        .await?;

    Ok(embeds::create_embed(
        "Shortcut Added",
        &format!("Added shortcut for this server: {} = {}", shortcut.trim(), full_text),
        colors::INFO_BLUE,
    ))
}

async fn handle_remove_shortcut(
    command: &CommandInteraction,
    bot: &YappingtonBot,
    guild_id: GuildId,
) -> Result<CreateEmbed> {
    let shortcut = string_option(command, "shortcut")?;

    let removed = bot.shortcuts.lock().await.remove(guild_id, shortcut).await?;

    Ok(if removed {
        embeds::create_embed(
            "Shortcut Removed",
            &format!("Removed shortcut: {}", shortcut),
            colors::INFO_BLUE,
        )
    } else {
        embeds::create_error_embed("Error", "Shortcut not found for this server.")
    })
}

async fn handle_list_shortcuts(bot: &YappingtonBot, guild_id: GuildId) -> CreateEmbed {
    let shortcuts = bot.shortcuts.lock().await.list(guild_id);
    embeds::create_shortcuts_embed(&shortcuts)
}

async fn handle_clear_queue(bot: &YappingtonBot, guild_id: GuildId) -> CreateEmbed {
    if bot.sessions.lock().await.stop_and_clear(guild_id).await {
        embeds::create_embed(
            "Queue Cleared",
            "Stopped current playback and cleared all pending messages",
            colors::SUCCESS_GREEN,
        )
    } else {
        embeds::create_embed(
            "Queue Empty",
            "No messages were in the queue",
            colors::WARNING_ORANGE,
        )
    }
}

fn handle_nickname(command: &CommandInteraction, bot: &YappingtonBot) -> Result<CreateEmbed> {
    let nickname = string_option(command, "nickname")?.trim();

    if nickname.is_empty() {
        return Ok(embeds::create_error_embed("Error", "Your nickname can't be empty."));
    }

    bot.nicknames.set(command.user.id, nickname);

    Ok(embeds::create_embed(
        "Nickname Set",
        &format!("Your Yappington nickname has been set to: {}", nickname),
        colors::INFO_BLUE,
    ))
}

fn handle_reset_nickname(command: &CommandInteraction, bot: &YappingtonBot) -> CreateEmbed {
    if bot.nicknames.reset(command.user.id) {
        embeds::create_embed(
            "Nickname Reset",
            "Your Yappington nickname has been reset to your display name",
            colors::INFO_BLUE,
        )
    } else {
        embeds::create_embed(
            "No Nickname",
            "You don't have a custom nickname set",
            colors::INFO_BLUE,
        )
    }
}

/// Voice channel `user_id` currently sits in, from the cache.
pub fn get_user_voice_channel(
    ctx: &Context,
    guild_id: GuildId,
    user_id: UserId,
) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
