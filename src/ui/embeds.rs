use serenity::{
    all::{Colour, Timestamp},
    builder::{CreateEmbed, CreateEmbedFooter},
};

/// Bot colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
}

/// Footer shared by every embed
pub const STANDARD_FOOTER: &str = "Thanks for using Yappington!";

/// Base embed: title, description, colour, timestamp and footer.
pub fn create_embed(title: &str, description: &str, colour: Colour) -> CreateEmbed {
    CreateEmbed::default()
        .title(title)
        .description(description)
        .color(colour)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    create_embed(&format!("❌ {}", title), description, colors::ERROR_RED)
}

/// Lists a guild's shortcuts as `shortcut = text` lines.
pub fn create_shortcuts_embed(shortcuts: &[(String, String)]) -> CreateEmbed {
    if shortcuts.is_empty() {
        return create_embed(
            "No Shortcuts",
            "No shortcuts are set for this server.",
            colors::INFO_BLUE,
        );
    }

    let lines: Vec<String> = shortcuts
        .iter()
        .map(|(shortcut, text)| format!("{} = {}", shortcut, text))
        .collect();

    create_embed(
        "Server Shortcuts",
        &format!("Current shortcuts for this server:\n{}", lines.join("\n")),
        colors::INFO_BLUE,
    )
}
