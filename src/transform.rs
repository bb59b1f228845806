//! Turns chat messages into the text that gets spoken.

use dashmap::DashMap;
use regex::Regex;
use serenity::model::id::{ChannelId, UserId};
use std::{collections::HashMap, sync::LazyLock};

use crate::storage::ShortcutTable;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s<>]+").expect("URL pattern is valid")
});

static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#(\d+)>").expect("channel mention pattern is valid"));

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".webp"];

/// Platform-independent view of an incoming message.
#[derive(Debug, Clone)]
pub struct SpokenMessage {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_display_name: String,
    pub content: String,
    /// Content type of each attachment, if the platform reported one.
    pub attachments: Vec<Option<String>>,
    pub user_mentions: Vec<(UserId, String)>,
    pub channel_mentions: Vec<(ChannelId, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Gif,
    Attachment,
    Link,
}

impl MediaKind {
    pub fn describe(self, speaker: &str) -> String {
        let what = match self {
            MediaKind::Image => "an image",
            MediaKind::Gif => "a gif",
            MediaKind::Attachment => "an attachment",
            MediaKind::Link => "a link",
        };
        format!("{} sent {}", speaker, what)
    }
}

pub fn classify_attachments(content_types: &[Option<String>]) -> Option<MediaKind> {
    if content_types.is_empty() {
        return None;
    }

    let has = |needle: &str| {
        content_types
            .iter()
            .flatten()
            .any(|content_type| content_type.contains(needle))
    };

    Some(if has("image") {
        MediaKind::Image
    } else if has("gif") {
        MediaKind::Gif
    } else {
        MediaKind::Attachment
    })
}

pub fn classify_link(content: &str) -> Option<MediaKind> {
    if !URL_PATTERN.is_match(content) {
        return None;
    }

    let lower = content.to_lowercase();
    Some(if lower.contains("gif") {
        MediaKind::Gif
    } else if IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
        MediaKind::Image
    } else {
        MediaKind::Link
    })
}

/// Ids of `<#id>` channel mentions in `content`, in order of appearance.
pub fn channel_mention_ids(content: &str) -> Vec<ChannelId> {
    CHANNEL_MENTION
        .captures_iter(content)
        .filter_map(|caps| caps[1].parse::<u64>().ok())
        .filter(|&id| id != 0)
        .map(ChannelId::new)
        .collect()
}

/// Last speaker per text channel.
#[derive(Debug, Default)]
pub struct SpeakerState {
    last: HashMap<ChannelId, UserId>,
}

impl SpeakerState {
    pub fn is_current(&self, channel_id: ChannelId, speaker: UserId) -> bool {
        self.last.get(&channel_id) == Some(&speaker)
    }

    pub fn record(&mut self, channel_id: ChannelId, speaker: UserId) {
        self.last.insert(channel_id, speaker);
    }
}

/// Spoken-name overrides, kept for the lifetime of the process.
#[derive(Debug, Default)]
pub struct NicknameTable {
    names: DashMap<UserId, String>,
}

impl NicknameTable {
    pub fn set(&self, user_id: UserId, nickname: impl Into<String>) {
        self.names.insert(user_id, nickname.into());
    }

    /// Returns whether a nickname was set.
    pub fn reset(&self, user_id: UserId) -> bool {
        self.names.remove(&user_id).is_some()
    }

    pub fn resolve(&self, user_id: UserId, display_name: &str) -> String {
        self.names
            .get(&user_id)
            .map(|name| name.value().clone())
            .unwrap_or_else(|| display_name.to_string())
    }
}

/// Text to synthesize for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// The text announces its speaker; record them once it has been queued.
    pub new_speaker: bool,
}

impl Utterance {
    fn plain(text: String) -> Self {
        Self {
            text,
            new_speaker: false,
        }
    }
}

/// Builds the text to synthesize for `message`. `speakers` is only read.
pub fn transform(
    message: &SpokenMessage,
    shortcuts: Option<&ShortcutTable>,
    speakers: &SpeakerState,
    nicknames: &NicknameTable,
) -> Utterance {
    let speaker = nicknames.resolve(message.author_id, &message.author_display_name);

    if let Some(kind) = classify_attachments(&message.attachments) {
        return Utterance::plain(kind.describe(&speaker));
    }

    if let Some(kind) = classify_link(&message.content) {
        return Utterance::plain(kind.describe(&speaker));
    }

    let words: Vec<String> = message
        .content
        .split_whitespace()
        .map(|word| {
            let word = shortcuts
                .and_then(|table| table.get(&word.to_lowercase()))
                .cloned()
                .unwrap_or_else(|| word.to_string());
            replace_mentions(word, message)
        })
        .collect();
    let text = words.join(" ");

    if text.is_empty() {
        return Utterance::plain(text);
    }

    if speakers.is_current(message.channel_id, message.author_id) {
        Utterance::plain(text)
    } else {
        Utterance {
            text: format!("{} says: {}", speaker, text),
            new_speaker: true,
        }
    }
}

fn replace_mentions(mut word: String, message: &SpokenMessage) -> String {
    for (user_id, name) in &message.user_mentions {
        for pattern in [format!("<@{}>", user_id), format!("<@!{}>", user_id)] {
            if word.contains(&pattern) {
                word = word.replace(&pattern, name);
            }
        }
    }

    for (channel_id, name) in &message.channel_mentions {
        let pattern = format!("<#{}>", channel_id);
        if word.contains(&pattern) {
            word = word.replace(&pattern, &format!("channel {}", name));
        }
    }

    word
}
