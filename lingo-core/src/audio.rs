//! Microphone capture using CPAL
//!
//! Capture is hidden behind [`CaptureDevice`] so the recording controller can
//! be driven by a fake device in tests. The cpal stream is owned by a
//! dedicated thread, which keeps [`MicrophoneCapture`] `Send` on every
//! platform and ties the microphone's lifetime to that thread.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::mpsc;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// One buffer delivered by the capture callback (mono f32 samples)
pub type AudioChunk = Vec<f32>;

/// Ordered chunk buffer shared between the device and the recorder
pub type ChunkBuffer = Arc<Mutex<Vec<AudioChunk>>>;

/// A microphone that streams chunks into a shared buffer
#[async_trait]
pub trait CaptureDevice: Send {
    /// Acquire the microphone and start appending chunks to `buffer`.
    ///
    /// Returns the capture sample rate. Fails with [`Error::Permission`] when
    /// the microphone cannot be acquired; nothing is held in that case.
    async fn open(&mut self, buffer: ChunkBuffer) -> Result<u32>;

    /// Stop streaming and wait until the microphone is released.
    /// Calling it while closed is a no-op.
    async fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioCaptureConfig {
    /// Preferred sample rate in Hz; the device default is used when unsupported
    pub sample_rate: u32,
}

impl Default for AudioCaptureConfig {
    fn default() -> Self {
        Self { sample_rate: 48000 }
    }
}

struct CaptureWorker {
    stop_tx: mpsc::Sender<()>,
    released_rx: oneshot::Receiver<()>,
}

/// The default cpal input device
pub struct MicrophoneCapture {
    config: AudioCaptureConfig,
    worker: Option<CaptureWorker>,
}

impl MicrophoneCapture {
    pub fn new() -> Self {
        Self::with_config(AudioCaptureConfig::default())
    }

    pub fn with_config(config: AudioCaptureConfig) -> Self {
        Self {
            config,
            worker: None,
        }
    }
}

impl Default for MicrophoneCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for MicrophoneCapture {
    async fn open(&mut self, buffer: ChunkBuffer) -> Result<u32> {
        if self.worker.is_some() {
            return Err(Error::Audio("Microphone is already open".to_string()));
        }

        let (ready_tx, ready_rx) = oneshot::channel::<Result<u32>>();
        let (released_tx, released_rx) = oneshot::channel::<()>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let preferred_rate = self.config.sample_rate;

        std::thread::Builder::new()
            .name("lingo-capture".to_string())
            .spawn(move || {
                let stream = match start_input_stream(preferred_rate, buffer) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // a closed channel also means the handle went away
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Capture stream released");
                let _ = released_tx.send(());
            })?;

        match ready_rx.await {
            Ok(Ok(sample_rate)) => {
                self.worker = Some(CaptureWorker {
                    stop_tx,
                    released_rx,
                });
                info!("Audio capture started at {} Hz", sample_rate);
                Ok(sample_rate)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Audio(
                "Capture thread exited before starting".to_string(),
            )),
        }
    }

    async fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.released_rx.await.is_err() {
                error!("Capture thread exited without releasing the stream");
            }
            info!("Audio capture stopped");
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        // the capture thread drops the stream once signalled
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
        }
    }
}

fn start_input_stream(preferred_rate: u32, buffer: ChunkBuffer) -> Result<(Stream, u32)> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Permission("No input device available".to_string()))?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using input device: {}", device_name);

    let supported = select_input_config(&device, preferred_rate)?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let stream_config: StreamConfig = supported.into();

    debug!(
        "Stream config: {:?} (format: {:?})",
        stream_config, sample_format
    );

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, buffer)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, buffer)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, buffer)?,
        SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, channels, buffer)?,
        SampleFormat::U32 => build_stream::<u32>(&device, &stream_config, channels, buffer)?,
        SampleFormat::I8 => build_stream::<i8>(&device, &stream_config, channels, buffer)?,
        SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, channels, buffer)?,
        SampleFormat::F64 => build_stream::<f64>(&device, &stream_config, channels, buffer)?,
        other => {
            return Err(Error::Audio(format!(
                "Unsupported sample format: {other:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::Permission(format!("Failed to start stream: {e}")))?;

    Ok((stream, sample_rate))
}

/// Prefer a config covering `preferred_rate`, else the device default
fn select_input_config(
    device: &cpal::Device,
    preferred_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<_> = device
        .supported_input_configs()
        .map_err(|e| Error::Permission(format!("Failed to get supported configs: {e}")))?
        .collect();

    let preferred = cpal::SampleRate(preferred_rate);
    if let Some(range) = ranges.into_iter().find(|range| {
        range.sample_format() == SampleFormat::F32
            && range.min_sample_rate() <= preferred
            && range.max_sample_rate() >= preferred
    }) {
        return Ok(range.with_sample_rate(preferred));
    }

    device
        .default_input_config()
        .map_err(|e| Error::Permission(format!("Failed to get default input config: {e}")))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    channels: usize,
    buffer: ChunkBuffer,
) -> Result<Stream>
where
    T: Sample + SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let chunk = downmix(data, channels);
                if !chunk.is_empty() {
                    buffer.lock().push(chunk);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| Error::Permission(format!("Failed to build stream: {e}")))
}

/// Average interleaved frames into mono f32
fn downmix<T>(data: &[T], channels: usize) -> AudioChunk
where
    T: Sample,
    f32: FromSample<T>,
{
    if channels <= 1 {
        return data.iter().map(|&s| s.to_sample::<f32>()).collect();
    }

    data.chunks_exact(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| s.to_sample::<f32>()).sum();
            sum / channels as f32
        })
        .collect()
}

/// Join chunks in arrival order and encode them as 16-bit mono WAV
pub fn encode_wav(chunks: &[AudioChunk], sample_rate: u32) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| Error::Audio(format!("Failed to start WAV encoding: {e}")))?;
    for &sample in chunks.iter().flatten() {
        let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(pcm)
            .map_err(|e| Error::Audio(format!("Failed to encode sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Audio(format!("Failed to finalize WAV: {e}")))?;

    Ok(cursor.into_inner())
}
