//! Client abstraction over the practice backend
//!
//! One method per remote capability. The store and the recorder only see
//! [`PracticeApi`], so tests can swap the HTTP client for an in-process fake.
mod http;

use async_trait::async_trait;

use crate::dictionary::DictionaryResult;
use crate::error::Result;
use crate::types::{
    AudioBlob, ConversationReply, Message, PronunciationResponse, SpeechToTextResponse,
    TextToSpeechResponse,
};

pub use http::HttpPracticeApi;

/// Request/response contract of the practice backend.
///
/// Implementations do not retry, cache or validate beyond deserialization.
#[async_trait]
pub trait PracticeApi: Send + Sync {
    /// Send a chat message, continuing `conversation_id` when given
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ConversationReply>;

    /// Fetch every message of a conversation
    async fn conversation_history(&self, conversation_id: &str) -> Result<Vec<Message>>;

    /// Transcribe a recording (uploaded as multipart form data)
    async fn speech_to_text(&self, audio: AudioBlob) -> Result<SpeechToTextResponse>;

    /// Synthesize speech; the response carries base64 audio
    async fn text_to_speech(&self, text: &str, voice: Option<&str>)
    -> Result<TextToSpeechResponse>;

    async fn lookup_word(&self, word: &str) -> Result<DictionaryResult>;

    async fn pronunciation(&self, word: &str) -> Result<PronunciationResponse>;
}
