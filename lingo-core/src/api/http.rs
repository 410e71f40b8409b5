//! HTTP+JSON implementation of the practice backend client

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::Config;
use crate::dictionary::DictionaryResult;
use crate::error::{Error, Result};
use crate::types::{
    AudioBlob, ConversationReply, HistoryResponse, Message, PronunciationResponse,
    SpeechToTextResponse, TextToSpeechResponse,
};

use super::PracticeApi;

/// reqwest-backed client; every path is resolved against the base URL
pub struct HttpPracticeApi {
    client: Client,
    base_url: Url,
}

impl HttpPracticeApi {
    /// Create a client for the given base URL (trailing slash optional)
    pub fn new(base_url: &str) -> Result<Self> {
        Self::from_config(&Config::default().with_api_base_url(base_url))
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.validate()?;
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Failed to build URL for {path}: {e}")))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

/// Shape of the backend's failure responses
#[derive(Debug, Default, Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl FailureBody {
    fn describe(self) -> Option<String> {
        match (self.message, self.error) {
            (Some(message), Some(error)) => Some(format!("{message}: {error}")),
            (Some(message), None) => Some(message),
            (None, Some(error)) => Some(error),
            (None, None) => None,
        }
    }
}

/// Build a service error from a failure body, falling back to the raw text
fn service_error(status: Option<u16>, body: &str) -> Error {
    let message = serde_json::from_str::<FailureBody>(body)
        .ok()
        .and_then(FailureBody::describe)
        .unwrap_or_else(|| body.trim().to_string());

    let message = if message.is_empty() {
        "request failed".to_string()
    } else {
        message
    };

    Error::Service { status, message }
}

/// Decode a response, mapping error statuses and `success: false` bodies
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        error!("Practice API error: {} - {}", status, body);
        return Err(service_error(Some(status.as_u16()), &body));
    }

    decode_body(&body)
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body)?;

    if value.get("success").and_then(serde_json::Value::as_bool) == Some(false) {
        error!("Practice API reported failure: {}", body);
        return Err(service_error(None, body));
    }

    Ok(serde_json::from_value(value)?)
}

#[async_trait]
impl PracticeApi for HttpPracticeApi {
    async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ConversationReply> {
        let request = SendMessageRequest {
            message,
            conversation_id,
        };

        debug!(?conversation_id, "Sending chat message");

        let response = self
            .client
            .post(self.endpoint("conversation")?)
            .json(&request)
            .send()
            .await?;

        read_json(response).await
    }

    async fn conversation_history(&self, conversation_id: &str) -> Result<Vec<Message>> {
        debug!(conversation_id, "Fetching conversation history");

        let response = self
            .client
            .get(self.endpoint("conversation/history")?)
            .query(&[("conversationId", conversation_id)])
            .send()
            .await?;

        let history: HistoryResponse = read_json(response).await?;
        Ok(history.history)
    }

    async fn speech_to_text(&self, audio: AudioBlob) -> Result<SpeechToTextResponse> {
        debug!("Uploading {} bytes of {} for transcription", audio.len(), audio.mime_type);

        let part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(|e| Error::Audio(format!("Failed to create form part: {e}")))?;
        let form = reqwest::multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(self.endpoint("speech/speech-to-text")?)
            .multipart(form)
            .send()
            .await?;

        read_json(response).await
    }

    async fn text_to_speech(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<TextToSpeechResponse> {
        debug!("Requesting speech for {} chars", text.len());

        let response = self
            .client
            .post(self.endpoint("speech/text-to-speech")?)
            .json(&TextToSpeechRequest { text, voice })
            .send()
            .await?;

        read_json(response).await
    }

    async fn lookup_word(&self, word: &str) -> Result<DictionaryResult> {
        debug!(word, "Looking up word");

        let response = self
            .client
            .get(self.endpoint("dictionary/lookup")?)
            .query(&[("word", word)])
            .send()
            .await?;

        read_json(response).await
    }

    async fn pronunciation(&self, word: &str) -> Result<PronunciationResponse> {
        debug!(word, "Fetching pronunciation");

        let response = self
            .client
            .get(self.endpoint("dictionary/pronunciation")?)
            .query(&[("word", word)])
            .send()
            .await?;

        read_json(response).await
    }
}
