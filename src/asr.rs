//! Transcribes an audio chunk to text and scores a transcript against a reference string.
//!
//! `score()` has a single default implementation shared by every backend, so
//! `min_confidence` means the same thing regardless of which model produced the
//! transcript.

use crate::text_normalizer::normalize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("failed to load model from {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },
    #[error("failed to read audio file {path}: {message}")]
    AudioRead { path: PathBuf, message: String },
    #[error("audio at {path} is not 16kHz mono: {reason}")]
    InvalidAudioFormat { path: PathBuf, reason: String },
    #[error("transcription failed: {0}")]
    Transcribe(String),
}

/// One contiguous span of recognized speech within a chunk.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The result of transcribing one audio chunk. `text` is the concatenation of all
/// segments, already run through [`normalize`]; `raw_text` preserves the model's
/// untouched output for diagnostics.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub raw_text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

/// A speech-to-text backend capable of transcribing a 16kHz mono PCM chunk and scoring
/// the result against reference dialogue.
pub trait AsrProvider: Send + Sync {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript, AsrError>;

    /// `0.7 * token_sort_ratio + 0.3 * partial_ratio`, both in `[0, 1]` and computed on
    /// normalized text. Shared by every backend; do not override unless a backend truly
    /// needs a different scoring contract.
    fn score(&self, transcript: &str, reference: &str) -> f64 {
        let a = normalize(transcript);
        let b = normalize(reference);
        0.7 * token_sort_ratio(&a, &b) + 0.3 * partial_ratio(&a, &b)
    }
}

/// fuzzywuzzy-style token sort ratio: sort each string's whitespace-separated tokens,
/// rejoin, then compare with normalized Levenshtein similarity.
fn token_sort_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// fuzzywuzzy-style partial ratio: slide the shorter string across the longer one and
/// keep the best normalized-Levenshtein similarity over any equal-length window.
fn partial_ratio(a: &str, b: &str) -> f64 {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    if shorter.is_empty() {
        return if longer.is_empty() { 1.0 } else { 0.0 };
    }
    if shorter.len() >= longer.len() {
        return strsim::normalized_levenshtein(shorter, longer);
    }

    let longer_bytes = longer.as_bytes();
    let window = shorter.len();
    let mut best = 0.0f64;

    for start in 0..=(longer_bytes.len() - window) {
        // Windows may split a UTF-8 char boundary; skip those rather than panic.
        let Some(slice) = longer.get(start..start + window) else {
            continue;
        };
        let score = strsim::normalized_levenshtein(shorter, slice);
        if score > best {
            best = score;
        }
    }

    best
}

/// Whisper.cpp-backed [`AsrProvider`], wrapping the same `whisper-rs` bindings the
/// teacher used for its own speech-to-text step.
pub struct WhisperAsrProvider {
    context: WhisperContext,
}

impl WhisperAsrProvider {
    pub fn load(model_path: &Path) -> Result<Self, AsrError> {
        whisper_rs::install_logging_hooks();

        let mut params = WhisperContextParameters::default();
        params.use_gpu(true);

        let context = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| AsrError::ModelLoad {
                    path: model_path.to_path_buf(),
                    message: "invalid UTF-8 in model path".to_string(),
                })?,
            params,
        )
        .map_err(|e| AsrError::ModelLoad {
            path: model_path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self { context })
    }
}

impl AsrProvider for WhisperAsrProvider {
    fn transcribe(&self, audio_path: &Path) -> Result<Transcript, AsrError> {
        let reader = hound::WavReader::open(audio_path).map_err(|e| AsrError::AudioRead {
            path: audio_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let spec = reader.spec();
        if spec.sample_rate != 16000 {
            return Err(AsrError::InvalidAudioFormat {
                path: audio_path.to_path_buf(),
                reason: format!("expected 16kHz sample rate, got {} Hz", spec.sample_rate),
            });
        }
        if spec.channels != 1 {
            return Err(AsrError::InvalidAudioFormat {
                path: audio_path.to_path_buf(),
                reason: format!("expected mono audio, got {} channels", spec.channels),
            });
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<i16>, _>>()
            .map_err(|e| AsrError::AudioRead {
                path: audio_path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut audio_data = vec![0.0f32; samples.len()];
        whisper_rs::convert_integer_to_float_audio(&samples, &mut audio_data)
            .map_err(|e| AsrError::InvalidAudioFormat {
                path: audio_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        drop(samples);

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self
            .context
            .create_state()
            .map_err(|e| AsrError::Transcribe(format!("failed to create state: {e}")))?;

        state
            .full(params, &audio_data[..])
            .map_err(|e| AsrError::Transcribe(e.to_string()))?;
        drop(audio_data);

        let lang_id = state.full_lang_id_from_state();
        let language = whisper_rs::get_lang_str(lang_id)
            .unwrap_or("unknown")
            .to_string();

        let mut segments = Vec::new();
        let mut raw_text = String::new();
        for segment in state.as_iter() {
            let text = segment.to_string();
            raw_text.push_str(&text);
            segments.push(Segment {
                start: segment.start_timestamp() as f64 / 100.0,
                end: segment.end_timestamp() as f64 / 100.0,
                text,
            });
        }

        Ok(Transcript {
            text: normalize(&raw_text),
            raw_text: raw_text.trim().to_string(),
            segments,
            language,
        })
    }
}

/// Key identifying a loaded model instance for the process-wide singleton cache: one
/// model is loaded per distinct `(backend, model_name, device)` triple, no matter how
/// many times it's requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModelKey {
    backend: String,
    model_name: String,
    device: String,
}

type ModelCache = Mutex<HashMap<ModelKey, Arc<WhisperAsrProvider>>>;

fn model_cache() -> &'static ModelCache {
    static CACHE: OnceLock<ModelCache> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the process-wide singleton Whisper provider for `(model_name, device)`,
/// loading it on first request and reusing it afterwards.
pub fn whisper_provider(
    model_path: &Path,
    model_name: &str,
    device: &str,
) -> Result<Arc<WhisperAsrProvider>, AsrError> {
    let key = ModelKey {
        backend: "whisper".to_string(),
        model_name: model_name.to_string(),
        device: device.to_string(),
    };

    let mut cache = model_cache().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(existing) = cache.get(&key) {
        return Ok(Arc::clone(existing));
    }

    let provider = Arc::new(WhisperAsrProvider::load(model_path)?);
    cache.insert(key, Arc::clone(&provider));
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_sort_ratio_ignores_word_order() {
        let score = token_sort_ratio("walter white cooks", "cooks walter white");
        assert!(score > 0.99);
    }

    #[test]
    fn partial_ratio_finds_substring_match() {
        let score = partial_ratio("walter", "say my name walter white");
        assert!(score > 0.99);
    }

    #[test]
    fn partial_ratio_handles_empty_strings() {
        assert_eq!(partial_ratio("", ""), 1.0);
        assert_eq!(partial_ratio("", "hello"), 0.0);
    }

    #[test]
    fn score_blends_both_ratios() {
        struct Dummy;
        impl AsrProvider for Dummy {
            fn transcribe(&self, _: &Path) -> Result<Transcript, AsrError> {
                unreachable!()
            }
        }
        let dummy = Dummy;
        let score = dummy.score("say my name", "say my name");
        assert!(score > 0.99);
    }

    #[test]
    fn score_is_low_for_unrelated_text() {
        struct Dummy;
        impl AsrProvider for Dummy {
            fn transcribe(&self, _: &Path) -> Result<Transcript, AsrError> {
                unreachable!()
            }
        }
        let dummy = Dummy;
        let score = dummy.score("completely different sentence here", "xyz qqq zzz");
        assert!(score < 0.5);
    }
}
