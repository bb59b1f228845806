use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // For development command registration

    // Speech
    pub tts_language: String,
    pub tts_endpoint: String,
    pub tts_timeout: Duration,

    // Presence
    pub presence_sweep_interval: Duration,

    // Paths
    pub data_dir: PathBuf,
    pub clip_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Create directories if they don't exist
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Cannot create {}", config.data_dir.display()))?;
        std::fs::create_dir_all(&config.clip_dir)
            .with_context(|| format!("Cannot create {}", config.clip_dir.display()))?;

        Ok(config)
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// [`Config::load`] feeds this from the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: match lookup("GUILD_ID") {
                Some(id) if !id.trim().is_empty() => {
                    Some(id.trim().parse().context("GUILD_ID must be a numeric id")?)
                }
                _ => None,
            },

            tts_language: var("TTS_LANGUAGE", "en"),
            tts_endpoint: var("TTS_ENDPOINT", "https://translate.google.com/translate_tts"),
            tts_timeout: humantime::parse_duration(&var("TTS_TIMEOUT", "15s"))
                .context("TTS_TIMEOUT must be a duration such as `15s`")?,

            presence_sweep_interval: humantime::parse_duration(&var(
                "PRESENCE_SWEEP_INTERVAL",
                "30s",
            ))
            .context("PRESENCE_SWEEP_INTERVAL must be a duration such as `30s`")?,

            data_dir: var("DATA_DIR", "./data").into(),
            clip_dir: lookup("CLIP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("yappington")),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Token and language must be non-empty
    /// - The speech endpoint must be an absolute URL
    /// - The presence sweep runs at most once per second
    /// - The speech request timeout is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }

        if self.tts_language.trim().is_empty() {
            anyhow::bail!("TTS_LANGUAGE is empty");
        }

        url::Url::parse(&self.tts_endpoint)
            .with_context(|| format!("TTS_ENDPOINT is not a valid URL: {}", self.tts_endpoint))?;

        if self.presence_sweep_interval < Duration::from_secs(1) {
            anyhow::bail!(
                "Presence sweep interval must be at least 1s, got: {:?}",
                self.presence_sweep_interval
            );
        }

        if self.tts_timeout.is_zero() {
            anyhow::bail!("TTS timeout must be greater than 0");
        }

        Ok(())
    }

    /// Location of the shortcut store.
    pub fn shortcuts_path(&self) -> PathBuf {
        self.data_dir.join("shortcuts.json")
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Speech: language {}, endpoint {}, timeout {}\n  \
            Presence: sweep every {}\n  \
            Paths: data {}, clips {}",
            self.guild_id
                .map_or("global".to_string(), |id| format!("in guild {}", id)),
            self.tts_language,
            self.tts_endpoint,
            humantime::format_duration(self.tts_timeout),
            humantime::format_duration(self.presence_sweep_interval),
            self.data_dir.display(),
            self.clip_dir.display(),
        )
    }
}
