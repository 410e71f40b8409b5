//! Lingo - client core for spoken English conversation practice
//!
//! Orchestrates a chat session against the practice backend: typed API client,
//! microphone recording handed off to speech-to-text, spoken replies, and
//! dictionary lookups, all coordinated by a single application state store.

pub mod api;
pub mod audio;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod playback;
pub mod recorder;
pub mod storage;
pub mod store;
pub mod types;
pub mod words;

pub use error::{Error, Result};
pub use types::*;

/// Re-export the main components for convenience
pub use api::{HttpPracticeApi, PracticeApi};
pub use audio::{CaptureDevice, MicrophoneCapture};
pub use config::Config;
pub use dictionary::{DictionaryResult, DictionaryView};
pub use playback::{AudioOutput, NullOutput, RodioOutput};
pub use recorder::{RecorderState, RecordingController};
pub use storage::Storage;
pub use store::{AppState, AppStore, Operation, SentMessage, Services};
