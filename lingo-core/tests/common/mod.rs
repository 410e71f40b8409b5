//! Shared fakes for integration tests
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use lingo::audio::{AudioChunk, CaptureDevice, ChunkBuffer};
use lingo::{
    AppStore, AudioBlob, AudioOutput, Config, ConversationReply, DictionaryResult, Error,
    Message, PracticeApi, PronunciationResponse, Result, Services, SpeechToTextResponse,
    Storage, TextToSpeechResponse,
};

/// A request observed by [`MockApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    SendMessage {
        message: String,
        conversation_id: Option<String>,
    },
    History(String),
    SpeechToText {
        bytes: usize,
        mime_type: String,
    },
    TextToSpeech {
        text: String,
        voice: Option<String>,
    },
    Lookup(String),
    Pronunciation(String),
}

fn service_failure(message: &str) -> Error {
    Error::Service {
        status: Some(500),
        message: message.to_string(),
    }
}

/// Scriptable in-process backend
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<ApiCall>>,
    replies: Mutex<VecDeque<std::result::Result<ConversationReply, String>>>,
    send_gate: Mutex<Option<oneshot::Receiver<()>>>,
    transcript_gate: Mutex<Option<oneshot::Receiver<()>>>,
    uploads: Mutex<Vec<AudioBlob>>,
    history: Mutex<HashMap<String, Vec<Message>>>,
    dictionary: Mutex<HashMap<String, DictionaryResult>>,
    transcript: Mutex<Option<SpeechToTextResponse>>,
    speech_audio: Mutex<Option<Vec<u8>>>,
    pronunciation_url: Mutex<String>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, conversation_id: &str, response: &str, follow_ups: &str) {
        self.replies.lock().push_back(Ok(ConversationReply {
            success: true,
            conversation_id: conversation_id.to_string(),
            response: response.to_string(),
            suggested_follow_ups: follow_ups.to_string(),
        }));
    }

    pub fn fail_next_send(&self, message: &str) {
        self.replies.lock().push_back(Err(message.to_string()));
    }

    /// Hold the next send until the returned sender fires
    pub fn gate_next_send(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.send_gate.lock() = Some(rx);
        tx
    }

    /// Hold the next transcription until the returned sender fires
    pub fn gate_next_transcript(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.transcript_gate.lock() = Some(rx);
        tx
    }

    pub fn set_history(&self, conversation_id: &str, history: Vec<Message>) {
        self.history
            .lock()
            .insert(conversation_id.to_string(), history);
    }

    pub fn define(&self, result: DictionaryResult) {
        self.dictionary.lock().insert(result.word.clone(), result);
    }

    pub fn set_transcript(&self, success: bool, text: &str) {
        *self.transcript.lock() = Some(SpeechToTextResponse {
            success,
            text: text.to_string(),
        });
    }

    pub fn set_speech_audio(&self, audio: &[u8]) {
        *self.speech_audio.lock() = Some(audio.to_vec());
    }

    pub fn set_pronunciation_url(&self, url: &str) {
        *self.pronunciation_url.lock() = url.to_string();
    }

    /// Audio received by speech-to-text, in upload order
    pub fn uploads(&self) -> Vec<AudioBlob> {
        self.uploads.lock().clone()
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PracticeApi for MockApi {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ConversationReply> {
        self.record(ApiCall::SendMessage {
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        });

        let gate = self.send_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let next = self.replies.lock().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(service_failure(&message)),
            None => Err(service_failure("no scripted reply")),
        }
    }

    async fn conversation_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.record(ApiCall::History(conversation_id.to_string()));
        self.history
            .lock()
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| service_failure("Conversation not found"))
    }

    async fn speech_to_text(&self, audio: AudioBlob) -> Result<SpeechToTextResponse> {
        self.record(ApiCall::SpeechToText {
            bytes: audio.len(),
            mime_type: audio.mime_type.clone(),
        });
        self.uploads.lock().push(audio);

        let gate = self.transcript_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        self.transcript
            .lock()
            .clone()
            .ok_or_else(|| service_failure("Speech service unavailable"))
    }

    async fn text_to_speech(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<TextToSpeechResponse> {
        self.record(ApiCall::TextToSpeech {
            text: text.to_string(),
            voice: voice.map(str::to_string),
        });
        match self.speech_audio.lock().as_ref() {
            Some(audio) => Ok(TextToSpeechResponse {
                success: true,
                audio_content: STANDARD.encode(audio),
            }),
            None => Err(service_failure("Text-to-speech unavailable")),
        }
    }

    async fn lookup_word(&self, word: &str) -> Result<DictionaryResult> {
        self.record(ApiCall::Lookup(word.to_string()));
        self.dictionary
            .lock()
            .get(word)
            .cloned()
            .ok_or_else(|| service_failure("Word not found"))
    }

    async fn pronunciation(&self, word: &str) -> Result<PronunciationResponse> {
        self.record(ApiCall::Pronunciation(word.to_string()));
        Ok(PronunciationResponse {
            success: true,
            word: word.to_string(),
            ipa: String::new(),
            audio_url: self.pronunciation_url.lock().clone(),
        })
    }
}

/// What a [`FakeMicrophone`] has been asked to do
#[derive(Debug, Default)]
pub struct MicLog {
    pub opens: usize,
    pub closes: usize,
    pub open: bool,
}

/// Capture device that emits scripted chunks on open
pub struct FakeMicrophone {
    chunks: Vec<AudioChunk>,
    deny: bool,
    open_gate: Option<oneshot::Receiver<()>>,
    log: Arc<Mutex<MicLog>>,
}

impl FakeMicrophone {
    pub fn with_chunks(chunks: Vec<AudioChunk>) -> (Self, Arc<Mutex<MicLog>>) {
        let log = Arc::new(Mutex::new(MicLog::default()));
        (
            Self {
                chunks,
                deny: false,
                open_gate: None,
                log: Arc::clone(&log),
            },
            log,
        )
    }

    pub fn denied() -> (Self, Arc<Mutex<MicLog>>) {
        let (mut mic, log) = Self::with_chunks(Vec::new());
        mic.deny = true;
        (mic, log)
    }

    /// Keep the next open pending until the returned sender fires
    pub fn gate_open(&mut self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.open_gate = Some(rx);
        tx
    }
}

#[async_trait]
impl CaptureDevice for FakeMicrophone {
    async fn open(&mut self, buffer: ChunkBuffer) -> Result<u32> {
        if let Some(gate) = self.open_gate.take() {
            let _ = gate.await;
        }
        if self.deny {
            return Err(Error::Permission("Permission denied".to_string()));
        }
        let mut log = self.log.lock();
        log.opens += 1;
        log.open = true;
        buffer.lock().extend(self.chunks.iter().cloned());
        Ok(48000)
    }

    async fn close(&mut self) {
        let mut log = self.log.lock();
        if log.open {
            log.open = false;
            log.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.log.lock().open
    }
}

/// Something handed to [`RecordingOutput`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Played {
    Bytes(Vec<u8>),
    Url(String),
}

/// Output that remembers what it was asked to play
#[derive(Default)]
pub struct RecordingOutput {
    played: Mutex<Vec<Played>>,
}

impl RecordingOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played(&self) -> Vec<Played> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl AudioOutput for RecordingOutput {
    async fn play_bytes(&self, audio: Vec<u8>) -> Result<()> {
        self.played.lock().push(Played::Bytes(audio));
        Ok(())
    }

    async fn play_url(&self, url: &str) -> Result<()> {
        self.played.lock().push(Played::Url(url.to_string()));
        Ok(())
    }
}

/// Everything a store test needs to inspect afterwards
pub struct Harness {
    pub api: Arc<MockApi>,
    pub storage: Arc<Storage>,
    pub output: Arc<RecordingOutput>,
    pub mic: Arc<Mutex<MicLog>>,
}

impl Harness {
    pub fn new() -> Self {
        let (_, mic) = FakeMicrophone::with_chunks(Vec::new());
        Self {
            api: MockApi::new(),
            storage: Arc::new(Storage::in_memory().expect("in-memory storage")),
            output: RecordingOutput::new(),
            mic,
        }
    }

    fn services(&mut self, microphone: FakeMicrophone, mic: Arc<Mutex<MicLog>>) -> Services {
        self.mic = mic;
        Services {
            api: self.api.clone(),
            storage: Arc::clone(&self.storage),
            output: self.output.clone(),
            microphone: Box::new(microphone),
        }
    }

    /// Open a store with autoplay off and a microphone emitting two short chunks
    pub async fn open(&mut self) -> AppStore {
        let (mic, log) = FakeMicrophone::with_chunks(vec![vec![0.1; 160], vec![0.2; 160]]);
        self.open_with(mic, log, &Config::default().with_autoplay(false))
            .await
    }

    pub async fn open_with(
        &mut self,
        microphone: FakeMicrophone,
        mic: Arc<Mutex<MicLog>>,
        config: &Config,
    ) -> AppStore {
        let services = self.services(microphone, mic);
        AppStore::open(services, config).await
    }
}
