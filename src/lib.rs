//! episode_matcher - identifies unlabeled video files against reference subtitles and
//! renames them to their canonical `"{Series} - SxxEyy - Title.ext"` form.
//!
//! The pipeline samples a handful of audio checkpoints from each video, transcribes
//! them with Whisper, and fuzzy-scores the transcript against candidate subtitle
//! windows until a single episode stands out unambiguously (or a cross-checkpoint
//! vote breaks the tie). See [`engine::MatchEngine`] for the orchestration entry point.

pub mod asr;
pub mod audio_chunker;
pub mod cache;
pub mod chunk_scheduler;
pub mod config;
pub mod engine;
pub mod error;
pub mod filename_context;
pub mod matcher;
pub mod model_downloader;
pub mod models;
pub mod renamer;
pub mod subtitle_provider;
pub mod subtitle_reader;
mod temp;
pub mod text_normalizer;

pub use asr::{AsrError, AsrProvider, Segment, Transcript, WhisperAsrProvider};
pub use audio_chunker::ExtractError;
pub use cache::{Cache, EstimateSize};
pub use chunk_scheduler::checkpoints;
pub use config::{Config, SubProviderKind};
pub use engine::{EngineError, MatchEngine, Phase, ProcessOptions};
pub use error::EpisodeMatcherError;
pub use filename_context::detect as detect_filename_context;
pub use matcher::MultiSegmentMatcher;
pub use models::{
    AudioChunk, EpisodeInfo, FailedMatch, MatchCandidate, MatchResult, MatcherConfig,
    SubtitleFile,
};
pub use renamer::{RenameError, finalize as finalize_rename, sanitize_filename};
pub use subtitle_provider::{
    CompositeProvider, LocalProvider, RemoteProvider, SubtitleProvider, SubtitleProviderError,
};
pub use subtitle_reader::DecodeError;
pub use text_normalizer::normalize;
