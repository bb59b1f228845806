use anyhow::{Context, Result};
use serenity::model::id::GuildId;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Shortcut token (lowercase) to replacement text for one guild.
pub type ShortcutTable = BTreeMap<String, String>;

/// Per-guild shortcut tables backed by a single JSON file.
///
/// The whole store is rewritten on every mutation; there is no batching.
#[derive(Debug)]
pub struct ShortcutStore {
    path: PathBuf,
    guilds: BTreeMap<String, ShortcutTable>,
}

impl ShortcutStore {
    /// Loads the store, creating an empty file if none exists.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let guilds = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid shortcut file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, "{}").await?;
                info!("📝 Created empty shortcut file at {}", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", path.display()));
            }
        };

        let store = Self { path, guilds };
        info!(
            "📂 Loaded shortcuts for {} servers from {}",
            store.guilds.len(),
            store.path.display()
        );
        Ok(store)
    }

    /// Shortcuts of one guild, if it has ever defined any.
    pub fn shortcuts(&self, guild_id: GuildId) -> Option<&ShortcutTable> {
        self.guilds.get(&guild_id.to_string())
    }

    /// Adds or overwrites a shortcut. The token is stored lowercase.
    pub async fn add(&mut self, guild_id: GuildId, shortcut: &str, text: &str) -> Result<()> {
        let table = self.guilds.entry(guild_id.to_string()).or_default();
        table.insert(shortcut.to_lowercase(), text.to_string());
        self.save().await?;

        debug!("➕ Shortcut {} added in guild {}", shortcut, guild_id);
        Ok(())
    }

    /// Removes a shortcut; returns whether it existed.
    pub async fn remove(&mut self, guild_id: GuildId, shortcut: &str) -> Result<bool> {
        let removed = self
            .guilds
            .get_mut(&guild_id.to_string())
            .and_then(|table| table.remove(&shortcut.to_lowercase()))
            .is_some();

        if removed {
            self.save().await?;
            debug!("🗑️ Shortcut {} removed in guild {}", shortcut, guild_id);
        }

        Ok(removed)
    }

    /// `(shortcut, text)` pairs of one guild, sorted by shortcut.
    pub fn list(&self, guild_id: GuildId) -> Vec<(String, String)> {
        self.shortcuts(guild_id)
            .map(|table| {
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.guilds)?;
        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Cannot write {}", self.path.display()))?;
        Ok(())
    }
}
