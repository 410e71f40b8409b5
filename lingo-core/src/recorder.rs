//! Recording controller: microphone capture handed off to speech-to-text

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::api::PracticeApi;
use crate::audio::{CaptureDevice, ChunkBuffer, encode_wav};
use crate::error::Result;
use crate::types::{AudioBlob, SpeechToTextResponse};

/// Sample rate assumed until a device reports its own
const DEFAULT_SAMPLE_RATE: u32 = 48000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderState {
    #[default]
    Idle,
    Capturing,
}

/// Drives one [`CaptureDevice`] through `Idle -> Capturing -> Idle`
pub struct RecordingController {
    device: Box<dyn CaptureDevice>,
    api: Arc<dyn PracticeApi>,
    chunks: ChunkBuffer,
    sample_rate: u32,
    state: RecorderState,
}

impl RecordingController {
    pub fn new(device: Box<dyn CaptureDevice>, api: Arc<dyn PracticeApi>) -> Self {
        Self {
            device,
            api,
            chunks: Arc::new(Mutex::new(Vec::new())),
            sample_rate: DEFAULT_SAMPLE_RATE,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == RecorderState::Capturing
    }

    /// Number of chunks buffered since capture started
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Acquire the microphone and start buffering chunks.
    ///
    /// On failure the controller stays idle and holds nothing.
    pub async fn start_recording(&mut self) -> Result<()> {
        if self.is_capturing() {
            debug!("Recording already in progress");
            return Ok(());
        }

        self.chunks.lock().clear();

        match self.device.open(Arc::clone(&self.chunks)).await {
            Ok(sample_rate) => {
                self.sample_rate = sample_rate;
                self.state = RecorderState::Capturing;
                info!("Recording started");
                Ok(())
            }
            Err(e) => {
                error!("Failed to start recording: {e}");
                Err(e)
            }
        }
    }

    /// Stop capture, release the microphone and transcribe what was recorded.
    ///
    /// Returns `None` when nothing was captured or the controller was idle; no
    /// request is made in either case.
    pub async fn stop_recording(&mut self) -> Result<Option<SpeechToTextResponse>> {
        if !self.is_capturing() {
            debug!("Stop requested while idle");
            return Ok(None);
        }

        // the microphone is released before the upload so a failed request cannot hold it
        self.device.close().await;
        self.state = RecorderState::Idle;

        let chunks = std::mem::take(&mut *self.chunks.lock());
        let sample_count: usize = chunks.iter().map(Vec::len).sum();
        if sample_count == 0 {
            info!("Recording stopped with no audio captured");
            return Ok(None);
        }

        let blob = AudioBlob::wav(encode_wav(&chunks, self.sample_rate)?);
        info!(
            "Recording stopped, {} chunks ({:.1}s) encoded into {} bytes",
            chunks.len(),
            sample_count as f32 / self.sample_rate as f32,
            blob.len()
        );

        let response = self.api.speech_to_text(blob).await?;
        Ok(Some(response))
    }
}
