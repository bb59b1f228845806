use anyhow::Result;
use serenity::{
    builder::CreateMessage,
    model::{channel::Message, id::GuildId},
    prelude::Context,
};
use tracing::{debug, warn};

use crate::{
    bot::YappingtonBot,
    transform::{channel_mention_ids, SpokenMessage},
    tts::SpeakError,
    ui::embeds,
};

/// Hands `msg` to the narrator, which speaks it if it was posted in the text
/// chat of the guild's bound voice channel.
pub async fn handle_message(ctx: &Context, msg: &Message, bot: &YappingtonBot) -> Result<()> {
    if msg.author.id == ctx.cache.current_user().id {
        return Ok(());
    }

    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let spoken = spoken_message(ctx, msg, guild_id);

    match bot.narrator.narrate(guild_id, &spoken).await {
        Ok(_) => {}
        Err(SpeakError::Queue(e)) => debug!("Dropped message: {}", e),
        Err(SpeakError::Synthesis(e)) => {
            warn!("Speech synthesis failed in guild {}: {}", guild_id, e);
            let embed = embeds::create_error_embed("Error", "I couldn't read that message aloud.");
            msg.channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await?;
        }
    }

    Ok(())
}

/// Copies what the transformer needs out of `msg` and the guild cache.
fn spoken_message(ctx: &Context, msg: &Message, guild_id: GuildId) -> SpokenMessage {
    let guild = ctx.cache.guild(guild_id);

    let author_display_name = msg
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .unwrap_or_else(|| msg.author.display_name().to_string());

    let user_mentions = msg
        .mentions
        .iter()
        .map(|user| {
            let name = guild
                .as_ref()
                .and_then(|g| g.members.get(&user.id))
                .map(|member| member.display_name().to_string())
                .unwrap_or_else(|| user.display_name().to_string());
            (user.id, name)
        })
        .collect();

    let channel_mentions = channel_mention_ids(&msg.content)
        .into_iter()
        .filter_map(|channel_id| {
            let name = guild.as_ref()?.channels.get(&channel_id)?.name.clone();
            Some((channel_id, name))
        })
        .collect();

    SpokenMessage {
        channel_id: msg.channel_id,
        author_id: msg.author.id,
        author_display_name,
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|attachment| attachment.content_type.clone())
            .collect(),
        user_mentions,
        channel_mentions,
    }
}
