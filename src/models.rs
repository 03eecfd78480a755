//! Core data model shared across components.

use crate::cache::EstimateSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifies a single episode of a series. Two `EpisodeInfo` values are equal iff
/// `(series_name, season, episode)` match; `title` is decorative only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub series_name: String,
    pub season: u32,
    pub episode: u32,
    pub title: Option<String>,
}

impl EpisodeInfo {
    pub fn new(series_name: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            series_name: series_name.into(),
            season,
            episode,
            title: None,
        }
    }

    /// `"S{season:02}E{episode:02}"`.
    pub fn s_e_format(&self) -> String {
        format!("S{:02}E{:02}", self.season, self.episode)
    }
}

impl PartialEq for EpisodeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.series_name == other.series_name
            && self.season == other.season
            && self.episode == other.episode
    }
}

impl Eq for EpisodeInfo {}

/// A reference subtitle file believed to belong to a given series/season.
///
/// `content` is lazily populated by the matcher on first use and then treated as
/// immutable for the lifetime of this value.
#[derive(Debug, Clone)]
pub struct SubtitleFile {
    pub path: PathBuf,
    pub language: String,
    pub episode_info: EpisodeInfo,
    pub content: Option<String>,
}

impl SubtitleFile {
    pub fn new(path: PathBuf, episode_info: EpisodeInfo) -> Self {
        Self {
            path,
            language: "en".to_string(),
            episode_info,
            content: None,
        }
    }
}

impl EstimateSize for SubtitleFile {
    fn estimated_size(&self) -> usize {
        self.path.as_os_str().len()
            + self.language.len()
            + self.episode_info.series_name.len()
            + self.content.as_ref().map_or(0, |c| c.len())
            + 64
    }
}

/// A temporary 16kHz mono PCM slice of a video. Owned by the matcher; the caller that
/// creates one is responsible for removing it on every exit path.
#[derive(Debug)]
pub struct AudioChunk {
    pub path: PathBuf,
    pub start_time: f64,
    pub duration: f64,
}

/// One `(episode, score)` pair produced by scoring a single chunk against a single
/// reference window.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub episode_info: EpisodeInfo,
    pub confidence: f64,
    pub reference_file: PathBuf,
}

/// The outcome of matching one video against a reference set. `chunk_index == -1`
/// signals a consensus result (a vote across checkpoints) rather than a single
/// decisive chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub episode_info: EpisodeInfo,
    pub confidence: f64,
    pub matched_file: PathBuf,
    pub matched_time: f64,
    pub chunk_index: i32,
    pub model_name: String,
    pub original_file: PathBuf,
}

/// Tunable thresholds for [`crate::matcher::MultiSegmentMatcher`], exposed as
/// configuration surface rather than hardcoded literals.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    /// Minimum video duration to attempt a match at all.
    pub min_duration: f64,
    /// A candidate must clear this score to be counted in the vote at all.
    pub score_floor: f64,
    /// Early-exit fires only when the top candidate's score exceeds this.
    pub early_exit_top: f64,
    /// Early-exit is withheld if any runner-up's score exceeds this.
    pub early_exit_runner_up: f64,
    /// A normalized transcript shorter than this many characters is unusable.
    pub min_transcript_chars: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_duration: 60.0,
            score_floor: 0.6,
            early_exit_top: 0.92,
            early_exit_runner_up: 0.80,
            min_transcript_chars: 10,
        }
    }
}

/// One input video that did not produce a usable match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedMatch {
    pub original_file: PathBuf,
    pub reason: String,
    pub confidence: f64,
    pub series_name: Option<String>,
    pub season: Option<u32>,
}

impl FailedMatch {
    pub fn new(original_file: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            original_file,
            reason: reason.into(),
            confidence: 0.0,
            series_name: None,
            season: None,
        }
    }
}
