//! Application state store
//!
//! [`AppStore`] is the single owner of the chat session state. The presentation
//! layer reads snapshots via [`AppStore::state`] and forwards user intents to
//! the async operations below, each of which is an ordered sequence of state
//! mutations around at most one backend call.
//!
//! Loading is tracked per operation: every network-backed operation registers
//! an [`Operation`] tag for exactly as long as its request is in flight, so
//! overlapping operations cannot clear each other's indicator. Failures are
//! logged, recorded in [`AppState::last_error`] and returned; state is never
//! left mid-operation.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{HttpPracticeApi, PracticeApi};
use crate::audio::{CaptureDevice, MicrophoneCapture};
use crate::config::Config;
use crate::dictionary::DictionaryResult;
use crate::error::{Error, Result};
use crate::playback::{AudioOutput, RodioOutput, decode_audio_content};
use crate::recorder::RecordingController;
use crate::storage::Storage;
use crate::types::{Conversation, Message};
use crate::words;

/// Network-backed operations that show a loading indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LoadHistory,
    SendMessage,
    Transcribe,
    LookupWord,
}

/// Snapshot of everything the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub conversation: Option<Conversation>,
    /// Displayed messages; may lead `conversation` after a failed send
    pub messages: Vec<Message>,
    pub input_text: String,
    pub is_recording: bool,
    pub suggested_questions: Vec<String>,
    pub dictionary_result: Option<DictionaryResult>,
    pub dictionary_visible: bool,
    /// Most recent failure of a store operation
    pub last_error: Option<String>,
    in_flight: Vec<Operation>,
}

impl AppState {
    /// True while any operation is waiting on the backend
    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_busy(&self, operation: Operation) -> bool {
        self.in_flight.contains(&operation)
    }

    pub fn in_flight(&self) -> &[Operation] {
        &self.in_flight
    }
}

/// Registration of one in-flight operation, removed on drop
struct InFlight<'a> {
    state: &'a Mutex<AppState>,
    operation: Operation,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a Mutex<AppState>, operation: Operation) -> Self {
        Self::register(state, &mut state.lock(), operation)
    }

    /// Register while the caller already holds the lock
    fn register(state: &'a Mutex<AppState>, locked: &mut AppState, operation: Operation) -> Self {
        locked.in_flight.push(operation);
        Self { state, operation }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(pos) = state.in_flight.iter().position(|op| *op == self.operation) {
            state.in_flight.remove(pos);
        }
    }
}

/// Collaborators injected into the store
pub struct Services {
    pub api: Arc<dyn PracticeApi>,
    pub storage: Arc<Storage>,
    pub output: Arc<dyn AudioOutput>,
    pub microphone: Box<dyn CaptureDevice>,
}

/// Outcome of a successful [`AppStore::send_message`]
#[derive(Debug)]
pub struct SentMessage {
    pub conversation_id: String,
    pub response: String,
    /// Detached playback of the response, `None` when autoplay is off
    pub playback: Option<JoinHandle<()>>,
}

pub struct AppStore {
    state: Mutex<AppState>,
    api: Arc<dyn PracticeApi>,
    storage: Arc<Storage>,
    output: Arc<dyn AudioOutput>,
    recorder: tokio::sync::Mutex<RecordingController>,
    voice: Option<String>,
    autoplay: bool,
}

impl AppStore {
    /// Build the store without touching the network
    pub fn new(services: Services, config: &Config) -> Self {
        let Services {
            api,
            storage,
            output,
            microphone,
        } = services;

        Self {
            state: Mutex::new(AppState::default()),
            recorder: tokio::sync::Mutex::new(RecordingController::new(
                microphone,
                Arc::clone(&api),
            )),
            api,
            storage,
            output,
            voice: config.voice.clone(),
            autoplay: config.autoplay_responses,
        }
    }

    /// Build the store and restore the previous session, if any
    pub async fn open(services: Services, config: &Config) -> Self {
        let store = Self::new(services, config);
        store.restore_session().await;
        store
    }

    /// Wire the HTTP client, SQLite settings, cpal microphone and rodio output
    pub async fn from_config(config: &Config) -> Result<Self> {
        let services = Services {
            api: Arc::new(HttpPracticeApi::from_config(config)?),
            storage: Arc::new(Storage::open(&config.database_path)?),
            output: Arc::new(RodioOutput::new()),
            microphone: Box::new(MicrophoneCapture::new()),
        };
        Ok(Self::open(services, config).await)
    }

    async fn restore_session(&self) {
        match self.storage.conversation_id() {
            Ok(Some(conversation_id)) => {
                info!("Restoring conversation {}", conversation_id);
                // failure is already logged and recorded in last_error
                let _ = self.load_conversation_history(&conversation_id).await;
            }
            Ok(None) => debug!("No stored conversation"),
            Err(e) => warn!("Failed to read stored conversation id: {e}"),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> AppState {
        self.state.lock().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().is_loading()
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().is_recording
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    pub fn input_text(&self) -> String {
        self.state.lock().input_text.clone()
    }

    pub fn suggested_questions(&self) -> Vec<String> {
        self.state.lock().suggested_questions.clone()
    }

    pub fn conversation(&self) -> Option<Conversation> {
        self.state.lock().conversation.clone()
    }

    pub fn dictionary_result(&self) -> Option<DictionaryResult> {
        self.state.lock().dictionary_result.clone()
    }

    pub fn set_input_text(&self, text: impl Into<String>) {
        self.state.lock().input_text = text.into();
    }

    /// Copy a suggested question into the input. Out-of-range indices are ignored.
    pub fn select_suggestion(&self, index: usize) -> bool {
        let mut state = self.state.lock();
        match state.suggested_questions.get(index).cloned() {
            Some(question) => {
                state.input_text = question;
                true
            }
            None => false,
        }
    }

    pub fn close_dictionary(&self) {
        self.state.lock().dictionary_visible = false;
    }

    fn fail(&self, context: &str, err: Error) -> Error {
        error!("{context}: {err}");
        self.state.lock().last_error = Some(format!("{context}: {err}"));
        err
    }

    /// Replace messages and conversation identity with the server's history
    pub async fn load_conversation_history(&self, conversation_id: &str) -> Result<()> {
        let _loading = InFlight::begin(&self.state, Operation::LoadHistory);

        match self.api.conversation_history(conversation_id).await {
            Ok(history) => {
                info!("Loaded {} messages", history.len());
                let mut state = self.state.lock();
                state.messages = history.clone();
                state.conversation = Some(Conversation::new(conversation_id, history));
                Ok(())
            }
            Err(e) => Err(self.fail("Error loading conversation history", e)),
        }
    }

    /// Send the current input text.
    ///
    /// Returns `Ok(None)` without touching state when the input is blank or
    /// another operation is loading. The user message is appended before the
    /// request and stays in place if the request fails.
    pub async fn send_message(&self) -> Result<Option<SentMessage>> {
        let (loading, text, conversation_id) = {
            let mut state = self.state.lock();
            if state.input_text.trim().is_empty() {
                debug!("Ignoring send of empty input");
                return Ok(None);
            }
            if state.is_loading() {
                debug!("Ignoring send while {:?} in flight", state.in_flight);
                return Ok(None);
            }

            let loading = InFlight::register(&self.state, &mut state, Operation::SendMessage);
            let text = state.input_text.clone();
            state.messages.push(Message::user(text.clone()));
            state.last_error = None;
            let conversation_id = state.conversation.as_ref().map(|c| c.id.clone());
            (loading, text, conversation_id)
        };

        let reply = match self
            .api
            .send_message(&text, conversation_id.as_deref())
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail("Error sending message", e)),
        };

        let user_message = Message::user(text);
        let assistant_message = Message::assistant(reply.response.clone());

        let (conversation_id, established) = {
            let mut state = self.state.lock();
            let established = match state.conversation.as_mut() {
                Some(conversation) => {
                    conversation.messages.push(user_message);
                    conversation.messages.push(assistant_message.clone());
                    false
                }
                None => {
                    state.conversation = Some(Conversation::new(
                        reply.conversation_id.clone(),
                        vec![user_message, assistant_message.clone()],
                    ));
                    true
                }
            };
            state.messages.push(assistant_message);
            state.suggested_questions = reply.follow_ups();
            state.input_text.clear();
            let id = state
                .conversation
                .as_ref()
                .map(|c| c.id.clone())
                .unwrap_or_default();
            (id, established)
        };

        if established {
            info!("Started conversation {}", conversation_id);
            if let Err(e) = self.storage.set_conversation_id(&conversation_id) {
                warn!("Failed to persist conversation id: {e}");
            }
        }

        drop(loading);

        let playback = self
            .autoplay
            .then(|| self.spawn_playback(reply.response.clone()));

        Ok(Some(SentMessage {
            conversation_id,
            response: reply.response,
            playback,
        }))
    }

    /// Look up a word and replace the dictionary result wholesale
    pub async fn lookup_word(&self, word: &str) -> Result<()> {
        let _loading = InFlight::begin(&self.state, Operation::LookupWord);

        match self.api.lookup_word(word).await {
            Ok(result) => {
                let mut state = self.state.lock();
                state.dictionary_result = Some(result);
                state.dictionary_visible = true;
                Ok(())
            }
            Err(e) => Err(self.fail("Error looking up word", e)),
        }
    }

    /// Look up a token clicked in a message; punctuation-only tokens are ignored
    pub async fn lookup_clicked_word(&self, token: &str) -> Result<bool> {
        match words::lookup_key(token) {
            Some(word) => {
                self.lookup_word(&word).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Play the dictionary pronunciation of `word`
    pub async fn play_pronunciation(&self, word: &str) -> Result<()> {
        let result = async {
            let pronunciation = self.api.pronunciation(word).await?;
            if pronunciation.audio_url.is_empty() {
                debug!("No pronunciation audio for {}", word);
                return Ok(());
            }
            self.output.play_url(&pronunciation.audio_url).await
        }
        .await;

        if let Err(e) = &result {
            error!("Error playing pronunciation: {e}");
        }
        result
    }

    /// Speak `text` through text-to-speech
    pub async fn play_response(&self, text: &str) -> Result<()> {
        let result = speak(
            self.api.as_ref(),
            self.output.as_ref(),
            text,
            self.voice.as_deref(),
        )
        .await;

        if let Err(e) = &result {
            error!("Error playing response: {e}");
        }
        result
    }

    fn spawn_playback(&self, text: String) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let output = Arc::clone(&self.output);
        let voice = self.voice.clone();

        tokio::spawn(async move {
            if let Err(e) = speak(api.as_ref(), output.as_ref(), &text, voice.as_deref()).await {
                warn!("Error playing response: {e}");
            }
        })
    }

    /// Start capturing from the microphone
    pub async fn start_recording(&self) -> Result<()> {
        let mut recorder = self.recorder.lock().await;
        match recorder.start_recording().await {
            Ok(()) => {
                self.state.lock().is_recording = true;
                Ok(())
            }
            Err(e) => Err(self.fail("Error starting recording", e)),
        }
    }

    /// Stop capturing and put the transcript into the input text.
    ///
    /// A no-op while not recording. Returns the transcript when one was applied.
    pub async fn stop_recording(&self) -> Result<Option<String>> {
        let mut recorder = self.recorder.lock().await;
        if !recorder.is_capturing() {
            debug!("Not recording");
            return Ok(None);
        }

        let _loading = {
            let mut state = self.state.lock();
            state.is_recording = false;
            InFlight::register(&self.state, &mut state, Operation::Transcribe)
        };

        match recorder.stop_recording().await {
            Ok(Some(response)) if response.success && !response.text.is_empty() => {
                self.state.lock().input_text = response.text.clone();
                Ok(Some(response.text))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(self.fail("Error processing audio", e)),
        }
    }
}

async fn speak(
    api: &dyn PracticeApi,
    output: &dyn AudioOutput,
    text: &str,
    voice: Option<&str>,
) -> Result<()> {
    let speech = api.text_to_speech(text, voice).await?;
    if speech.audio_content.is_empty() {
        debug!("Text-to-speech returned no audio");
        return Ok(());
    }
    let audio = decode_audio_content(&speech.audio_content)?;
    output.play_bytes(audio).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_removes_one_registration() {
        let state = Mutex::new(AppState::default());
        let first = InFlight::begin(&state, Operation::LookupWord);
        let second = InFlight::begin(&state, Operation::LookupWord);
        let send = InFlight::begin(&state, Operation::SendMessage);
        assert_eq!(state.lock().in_flight().len(), 3);

        drop(first);
        assert!(state.lock().is_busy(Operation::LookupWord));
        drop(send);
        assert!(!state.lock().is_busy(Operation::SendMessage));
        assert!(state.lock().is_loading());
        drop(second);
        assert!(!state.lock().is_loading());
    }

    #[test]
    fn test_default_state_is_idle() {
        let state = AppState::default();
        assert!(!state.is_loading());
        assert!(!state.is_recording);
        assert!(state.messages.is_empty());
        assert!(state.conversation.is_none());
    }
}
