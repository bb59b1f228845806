use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{
        application::{Command, CommandOptionType},
        id::GuildId,
    },
    prelude::Context,
};

/// Registers the commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    Command::set_global_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

/// Registers the commands for one guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        add_shortcut_command(),
        remove_shortcut_command(),
        list_shortcuts_command(),
        clear_queue_command(),
        nickname_command(),
        reset_nickname_command(),
    ]
}

// Voice

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Joins the user's current voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leaves the current voice channel")
}

fn clear_queue_command() -> CreateCommand {
    CreateCommand::new("clear_queue").description("Clears the text-to-speech message queue")
}

// Shortcuts

fn add_shortcut_command() -> CreateCommand {
    CreateCommand::new("add_shortcut")
        .description("Adds a new shortcut for text-to-speech")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "shortcut", "Word to replace")
                .required(true),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "full_text", "Text to speak instead")
                .required(true),
        )
}

fn remove_shortcut_command() -> CreateCommand {
    CreateCommand::new("remove_shortcut")
        .description("Removes an existing shortcut")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "shortcut", "Shortcut to remove")
                .required(true),
        )
}

fn list_shortcuts_command() -> CreateCommand {
    CreateCommand::new("list_shortcuts").description("Lists all shortcuts for this server")
}

// Nicknames

fn nickname_command() -> CreateCommand {
    CreateCommand::new("nickname")
        .description("Sets a custom nickname for text-to-speech")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "nickname", "Name to be announced as")
                .required(true)
                .max_length(32),
        )
}

fn reset_nickname_command() -> CreateCommand {
    CreateCommand::new("reset_nickname")
        .description("Resets your nickname to the default display name")
}
