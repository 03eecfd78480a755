//! Top-level error aggregation
//!
//! Mirrors the error taxonomy of each component, wrapped into a single type for the
//! engine's fatal-error boundary. Component-local errors that are recoverable (decode
//! failures, extract failures, transcribe failures) never reach here — they are absorbed
//! into `FailedMatch` or silently skipped per their component's contract.

use crate::audio_chunker::ExtractError;
use crate::engine::EngineError;
use crate::subtitle_provider::SubtitleProviderError;
use crate::subtitle_reader::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EpisodeMatcherError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("ASR backend unavailable: {0}")]
    AsrUnavailable(String),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    SubtitleProvider(#[from] SubtitleProviderError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
