//! The checkpoint walk, early-exit rule, and cross-segment vote that decide which
//! episode a video is.
//!
//! Walks checkpoints from [`crate::chunk_scheduler`], scoring each against every
//! reference. An unambiguous high-confidence checkpoint can return a decisive result
//! immediately; otherwise candidates accumulate across checkpoints and the winner is
//! decided by a vote once scheduling ends.

use crate::asr::AsrProvider;
use crate::audio_chunker;
use crate::chunk_scheduler::{self, CHUNK_DURATION};
use crate::models::{MatchCandidate, MatchResult, MatcherConfig, SubtitleFile};
use crate::subtitle_reader;
use crate::temp::create_temp_file;
use crate::text_normalizer::normalize;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MultiSegmentMatcher {
    asr: std::sync::Arc<dyn AsrProvider>,
    model_name: String,
    config: MatcherConfig,
}

impl MultiSegmentMatcher {
    pub fn new(asr: std::sync::Arc<dyn AsrProvider>, model_name: impl Into<String>) -> Self {
        Self {
            asr,
            model_name: model_name.into(),
            config: MatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Matches `video` (of known `duration` seconds) against `references`. Returns `None`
    /// if the video is too short to sample, or if no checkpoint produced any candidate
    /// above the score floor.
    pub fn match_video(
        &self,
        video: &Path,
        duration: f64,
        references: &[SubtitleFile],
    ) -> Option<MatchResult> {
        if duration < self.config.min_duration {
            return None;
        }

        let checkpoints = chunk_scheduler::checkpoints(duration);
        let mut content_cache: HashMap<PathBuf, String> = HashMap::new();
        let mut accumulated: Vec<MatchCandidate> = Vec::new();
        let mut empty_segments = 0u32;
        let mut successful_segments = 0u32;

        for (i, &t) in checkpoints.iter().enumerate() {
            let segment_candidates =
                self.score_checkpoint(video, t, references, &mut content_cache);

            if segment_candidates.is_empty() {
                empty_segments += 1;
                debug!(
                    "checkpoint {i} at {t:.1}s produced no candidates ({empty_segments} empty so far)"
                );

                if i >= chunk_scheduler::PRIMARY_COUNT && successful_segments > 0 {
                    break;
                }
            } else {
                successful_segments += 1;

                if i > 0 {
                    if let Some(result) =
                        self.try_early_exit(video, i, t, &segment_candidates)
                    {
                        return Some(result);
                    }
                }

                accumulated.extend(segment_candidates);
            }
        }

        if accumulated.is_empty() {
            return None;
        }

        Some(self.vote(video, accumulated))
    }

    /// Extracts and transcribes the chunk at `t`, scores it against every reference
    /// whose window overlaps `[t, t + CHUNK_DURATION]`, and keeps candidates whose score
    /// clears the configured score floor. Any extraction/transcription failure yields an
    /// empty result rather than propagating.
    fn score_checkpoint(
        &self,
        video: &Path,
        t: f64,
        references: &[SubtitleFile],
        content_cache: &mut HashMap<PathBuf, String>,
    ) -> Vec<MatchCandidate> {
        let stem = video
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("chunk");
        let prefix = format!("{stem}_{t:.0}");

        let guard = match create_temp_file(&prefix, "wav") {
            Ok(guard) => guard,
            Err(e) => {
                warn!("could not allocate temp chunk file for {}: {e}", video.display());
                return Vec::new();
            }
        };

        if let Err(e) = audio_chunker::extract(video, t, CHUNK_DURATION, &guard) {
            warn!("chunk extraction failed at {t:.1}s for {}: {e}", video.display());
            return Vec::new();
        }

        let transcript = match self.asr.transcribe(&guard) {
            Ok(t) => t,
            Err(e) => {
                warn!("transcription failed at {t:.1}s for {}: {e}", video.display());
                return Vec::new();
            }
        };

        let normalized = normalize(&transcript.text);
        if normalized.chars().count() < self.config.min_transcript_chars {
            return Vec::new();
        }

        references
            .iter()
            .filter_map(|reference| {
                let content = load_content(content_cache, reference)?;
                let slices = subtitle_reader::slice(content, t, t + CHUNK_DURATION);
                if slices.is_empty() {
                    return None;
                }
                let reference_text = normalize(&slices.join(" "));
                if reference_text.is_empty() {
                    return None;
                }

                let score = self.asr.score(&normalized, &reference_text);
                (score > self.config.score_floor).then_some(MatchCandidate {
                    episode_info: reference.episode_info.clone(),
                    confidence: score,
                    reference_file: reference.path.clone(),
                })
            })
            .collect()
    }

    /// Never trusts the first primary checkpoint alone (it may land on intro music
    /// shared across episodes). From the second checkpoint on: if the top score clears
    /// 0.92 and no runner-up clears 0.80, the result is unambiguous enough to return
    /// immediately.
    fn try_early_exit(
        &self,
        video: &Path,
        chunk_index: usize,
        t: f64,
        candidates: &[MatchCandidate],
    ) -> Option<MatchResult> {
        let mut sorted: Vec<&MatchCandidate> = candidates.iter().collect();
        sorted.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap());

        let top = sorted.first()?;
        if top.confidence <= self.config.early_exit_top {
            return None;
        }
        let ambiguous = sorted
            .get(1)
            .map(|runner_up| runner_up.confidence > self.config.early_exit_runner_up)
            .unwrap_or(false);
        if ambiguous {
            return None;
        }

        Some(MatchResult {
            episode_info: top.episode_info.clone(),
            confidence: top.confidence,
            matched_file: video.to_path_buf(),
            matched_time: t,
            chunk_index: chunk_index as i32,
            model_name: self.model_name.clone(),
            original_file: video.to_path_buf(),
        })
    }

    /// Groups all accumulated candidates by `s_e_format`, picks the key with the most
    /// votes (ties broken by summed confidence, persistent ties by first appearance),
    /// then returns that key's single highest-confidence candidate as the consensus.
    fn vote(&self, video: &Path, accumulated: Vec<MatchCandidate>) -> MatchResult {
        let mut order: Vec<String> = Vec::new();
        let mut votes: HashMap<String, u32> = HashMap::new();
        let mut score_sum: HashMap<String, f64> = HashMap::new();
        let mut best_per_key: HashMap<String, MatchCandidate> = HashMap::new();

        for candidate in accumulated {
            let key = candidate.episode_info.s_e_format();
            if !votes.contains_key(&key) {
                order.push(key.clone());
            }
            *votes.entry(key.clone()).or_insert(0) += 1;
            *score_sum.entry(key.clone()).or_insert(0.0) += candidate.confidence;

            best_per_key
                .entry(key)
                .and_modify(|existing| {
                    if candidate.confidence > existing.confidence {
                        *existing = candidate.clone();
                    }
                })
                .or_insert(candidate);
        }

        let winner_key = order
            .into_iter()
            .max_by(|a, b| {
                votes[a]
                    .cmp(&votes[b])
                    .then_with(|| score_sum[a].partial_cmp(&score_sum[b]).unwrap())
            })
            .expect("accumulated is non-empty");

        let winner = best_per_key.remove(&winner_key).expect("winner key exists");

        MatchResult {
            episode_info: winner.episode_info,
            confidence: winner.confidence,
            matched_file: video.to_path_buf(),
            matched_time: 0.0,
            chunk_index: -1,
            model_name: "consensus".to_string(),
            original_file: video.to_path_buf(),
        }
    }
}

fn load_content<'a>(
    cache: &'a mut HashMap<PathBuf, String>,
    file: &SubtitleFile,
) -> Option<&'a str> {
    if !cache.contains_key(&file.path) {
        let text = match &file.content {
            Some(content) => content.clone(),
            None => subtitle_reader::read(&file.path).ok()?,
        };
        cache.insert(file.path.clone(), text);
    }
    cache.get(&file.path).map(|s| s.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asr::{AsrError, Transcript};
    use crate::models::EpisodeInfo;

    struct StubAsr;
    impl AsrProvider for StubAsr {
        fn transcribe(&self, _: &Path) -> Result<Transcript, AsrError> {
            unreachable!("not exercised by these unit tests")
        }
    }

    fn candidate(series: &str, season: u32, episode: u32, confidence: f64) -> MatchCandidate {
        MatchCandidate {
            episode_info: EpisodeInfo::new(series.to_string(), season, episode),
            confidence,
            reference_file: PathBuf::from(format!("{series} S{season:02}E{episode:02}.srt")),
        }
    }

    fn matcher() -> MultiSegmentMatcher {
        MultiSegmentMatcher::new(std::sync::Arc::new(StubAsr), "whisper-base")
    }

    #[test]
    fn too_short_video_returns_none() {
        let m = matcher();
        assert!(m.match_video(Path::new("short.mkv"), 30.0, &[]).is_none());
    }

    #[test]
    fn vote_picks_highest_vote_count() {
        let m = matcher();
        let accumulated = vec![
            candidate("Show", 1, 1, 0.7),
            candidate("Show", 1, 1, 0.75),
            candidate("Show", 1, 2, 0.9),
        ];
        let result = m.vote(Path::new("video.mkv"), accumulated);
        assert_eq!(result.episode_info.episode, 1);
        assert_eq!(result.chunk_index, -1);
        assert_eq!(result.model_name, "consensus");
    }

    #[test]
    fn vote_breaks_ties_by_summed_confidence() {
        let m = matcher();
        let accumulated = vec![candidate("Show", 1, 1, 0.65), candidate("Show", 1, 2, 0.95)];
        let result = m.vote(Path::new("video.mkv"), accumulated);
        assert_eq!(result.episode_info.episode, 2);
    }

    #[test]
    fn vote_representative_is_highest_confidence_in_winning_group() {
        let m = matcher();
        let accumulated = vec![
            candidate("Show", 1, 1, 0.65),
            candidate("Show", 1, 1, 0.99),
        ];
        let result = m.vote(Path::new("video.mkv"), accumulated);
        assert_eq!(result.confidence, 0.99);
    }

    #[test]
    fn early_exit_fires_when_unambiguous() {
        let m = matcher();
        let candidates = vec![candidate("Show", 1, 1, 0.95)];
        let result = m.try_early_exit(Path::new("video.mkv"), 1, 500.0, &candidates);
        assert!(result.is_some());
        assert_eq!(result.unwrap().chunk_index, 1);
    }

    #[test]
    fn early_exit_withholds_when_runner_up_is_close() {
        let m = matcher();
        let candidates = vec![candidate("Show", 1, 1, 0.95), candidate("Show", 1, 2, 0.85)];
        assert!(m
            .try_early_exit(Path::new("video.mkv"), 1, 500.0, &candidates)
            .is_none());
    }

    #[test]
    fn early_exit_withholds_when_top_below_threshold() {
        let m = matcher();
        let candidates = vec![candidate("Show", 1, 1, 0.85)];
        assert!(m
            .try_early_exit(Path::new("video.mkv"), 1, 500.0, &candidates)
            .is_none());
    }
}
