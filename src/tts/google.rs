use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{debug, warn};
use url::Url;

use super::{SynthesisError, Synthesizer};
use crate::{audio::queue::Clip, config::Config};

/// Longest text the translate endpoint accepts per request.
pub const MAX_CHUNK_CHARS: usize = 200;

/// Google Translate's text-to-speech endpoint.
pub struct GoogleTts {
    client: Client,
    endpoint: Url,
    clip_dir: PathBuf,
}

impl GoogleTts {
    pub fn new(config: &Config) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(config.tts_timeout)
            .user_agent(concat!("yappington/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: Url::parse(&config.tts_endpoint)?,
            clip_dir: config.clip_dir.clone(),
        })
    }

    fn request_url(&self, chunk: &str, language: &str, idx: usize, total: usize) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ie", "UTF-8")
            .append_pair("client", "tw-ob")
            .append_pair("tl", language)
            .append_pair("q", chunk)
            .append_pair("total", &total.to_string())
            .append_pair("idx", &idx.to_string())
            .append_pair("textlen", &chunk.chars().count().to_string());
        url
    }

    async fn fetch(&self, text: &str, language: &str) -> Result<Vec<u8>, SynthesisError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.request_url(chunk, language, idx, total);
            let response = self.client.get(url).send().await?.error_for_status()?;
            let bytes = response.bytes().await?;
            debug!("TTS chunk {}/{}: {} bytes", idx + 1, total, bytes.len());
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }
}

#[async_trait]
impl Synthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: &str) -> Result<Clip, SynthesisError> {
        let audio = self.fetch(text, language).await?;

        let path = tempfile::Builder::new()
            .prefix("clip-")
            .suffix(".mp3")
            .tempfile_in(&self.clip_dir)?
            .into_temp_path()
            .keep()?;

        if let Err(e) = tokio::fs::write(&path, &audio).await {
            warn!("Failed writing clip {}: {}", path.display(), e);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }

        Ok(Clip::new(path))
    }
}

/// Splits `text` at whitespace into chunks of at most `max_chars` characters.
///
/// Words longer than `max_chars` are cut into pieces.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
