//! Audio output for spoken replies and word pronunciations

use std::io::Cursor;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Platform audio output
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Start playing encoded audio (mp3, wav, ...). Returns once playback began.
    async fn play_bytes(&self, audio: Vec<u8>) -> Result<()>;

    /// Fetch and play audio from a URL
    async fn play_url(&self, url: &str) -> Result<()>;
}

/// Decode the base64 `audioContent` of a text-to-speech response
pub fn decode_audio_content(audio_content: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(audio_content.trim())
        .map_err(|e| Error::Audio(format!("Invalid base64 audio content: {e}")))
}

/// Output that discards everything, for hosts without a sound device
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

#[async_trait]
impl AudioOutput for NullOutput {
    async fn play_bytes(&self, audio: Vec<u8>) -> Result<()> {
        debug!("Discarding {} bytes of audio", audio.len());
        Ok(())
    }

    async fn play_url(&self, url: &str) -> Result<()> {
        debug!("Discarding audio from {}", url);
        Ok(())
    }
}

/// Plays audio on the default output device with rodio
pub struct RodioOutput {
    client: Client,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for RodioOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for RodioOutput {
    async fn play_bytes(&self, audio: Vec<u8>) -> Result<()> {
        let (started_tx, started_rx) = oneshot::channel();

        // rodio's output stream is not Send; it lives and dies on this thread
        std::thread::Builder::new()
            .name("lingo-playback".to_string())
            .spawn(move || play_blocking(audio, started_tx))?;

        started_rx
            .await
            .map_err(|_| Error::Audio("Playback thread exited before starting".to_string()))?
    }

    async fn play_url(&self, url: &str) -> Result<()> {
        debug!("Fetching audio from {}", url);
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        self.play_bytes(bytes.to_vec()).await
    }
}

fn play_blocking(audio: Vec<u8>, started: oneshot::Sender<Result<()>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            let _ = started.send(Err(Error::Audio(format!("No audio output device: {e}"))));
            return;
        }
    };

    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            let _ = started.send(Err(Error::Audio(format!("Failed to create sink: {e}"))));
            return;
        }
    };

    let source = match Decoder::new(Cursor::new(audio)) {
        Ok(source) => source,
        Err(e) => {
            let _ = started.send(Err(Error::Audio(format!("Failed to decode audio: {e}"))));
            return;
        }
    };

    sink.append(source);
    if started.send(Ok(())).is_err() {
        warn!("Playback requester went away");
    }
    sink.sleep_until_end();
}
