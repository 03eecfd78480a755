//! Orchestrates the whole pipeline over a path: scan, group, acquire subs, match, rename.

use crate::asr::AsrProvider;
use crate::audio_chunker;
use crate::cache::Cache;
use crate::filename_context;
use crate::matcher::MultiSegmentMatcher;
use crate::models::{FailedMatch, MatchResult, MatcherConfig, SubtitleFile};
use crate::renamer;
use crate::subtitle_provider::SubtitleProvider;
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Options controlling one [`MatchEngine::process_path`] invocation.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub season_override: Option<u32>,
    pub recursive: bool,
    pub dry_run: bool,
    pub output_dir: Option<PathBuf>,
    pub min_confidence: Option<f64>,
    pub show_dir: Option<PathBuf>,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            season_override: None,
            recursive: true,
            dry_run: false,
            output_dir: None,
            min_confidence: None,
            show_dir: None,
        }
    }
}

/// Major phase transitions, fired via `phase_cb` at each point the pipeline moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Scanning,
    Grouping,
    AcquiringSubtitles { series: String, season: u32 },
    Matching { series: String, season: u32 },
    Done,
}

/// Orchestrates the whole pipeline over a path: scans for videos, groups them by
/// `(series, season)`, fetches references once per group, matches each video, and
/// optionally renames the result.
pub struct MatchEngine {
    asr: Arc<dyn AsrProvider>,
    model_name: String,
    subtitles: Box<dyn SubtitleProvider>,
    matcher_config: MatcherConfig,
    min_confidence: f64,
    subtitle_cache: Cache<Vec<SubtitleFile>>,
}

impl MatchEngine {
    pub fn new(
        asr: Arc<dyn AsrProvider>,
        model_name: impl Into<String>,
        subtitles: Box<dyn SubtitleProvider>,
        min_confidence: f64,
        cache_max_items: usize,
        cache_max_memory_bytes: usize,
    ) -> Self {
        Self {
            asr,
            model_name: model_name.into(),
            subtitles,
            matcher_config: MatcherConfig::default(),
            min_confidence,
            subtitle_cache: Cache::new(cache_max_items, cache_max_memory_bytes),
        }
    }

    pub fn with_matcher_config(mut self, config: MatcherConfig) -> Self {
        self.matcher_config = config;
        self
    }

    /// Runs the full pipeline over `path` (a single video, a season folder, or a whole
    /// library), honoring `options`. Calls `progress_cb(current, total, path)` after
    /// every video that entered the pipeline (success or failure) and `phase_cb(phase)`
    /// at each major transition.
    pub fn process_path<F1, F2>(
        &self,
        path: &Path,
        options: &ProcessOptions,
        mut progress_cb: F1,
        mut phase_cb: F2,
    ) -> Result<(Vec<MatchResult>, Vec<FailedMatch>), EngineError>
    where
        F1: FnMut(usize, usize, &Path),
        F2: FnMut(Phase),
    {
        phase_cb(Phase::Scanning);
        let videos = scan(path, options.recursive).map_err(|e| EngineError::Scan {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("scanned {}: {} candidate video(s)", path.display(), videos.len());

        phase_cb(Phase::Grouping);
        let mut results = Vec::new();
        let mut failures = Vec::new();
        let mut groups: HashMap<(String, u32), Vec<PathBuf>> = HashMap::new();
        let mut group_order: Vec<(String, u32)> = Vec::new();

        for video in videos {
            if filename_context::is_processed(&video) {
                continue;
            }

            let (series, season) = filename_context::detect(&video, options.show_dir.as_deref());
            let season = options.season_override.or(season);

            match (series, season) {
                (Some(series), Some(season)) => {
                    let key = (series, season);
                    if !groups.contains_key(&key) {
                        group_order.push(key.clone());
                    }
                    groups.entry(key).or_default().push(video);
                }
                _ => {
                    failures.push(FailedMatch::new(
                        video,
                        "could not determine series/season from path",
                    ));
                }
            }
        }

        let total: usize = failures.len() + groups.values().map(Vec::len).sum::<usize>();
        let mut current = 0usize;
        for f in &failures {
            current += 1;
            progress_cb(current, total, &f.original_file);
        }

        for (series, season) in group_order {
            let videos = groups.remove(&(series.clone(), season)).unwrap_or_default();

            phase_cb(Phase::AcquiringSubtitles {
                series: series.clone(),
                season,
            });
            let references = self.acquire_subtitles(&series, season, &videos);

            if references.is_empty() {
                for video in videos {
                    current += 1;
                    failures.push(FailedMatch::new(
                        video.clone(),
                        format!("No subtitles found for {series} S{season:02}"),
                    ));
                    progress_cb(current, total, &video);
                }
                continue;
            }

            phase_cb(Phase::Matching {
                series: series.clone(),
                season,
            });
            let matcher = MultiSegmentMatcher::new(Arc::clone(&self.asr), self.model_name.clone())
                .with_config(self.matcher_config);

            for video in videos {
                current += 1;
                self.match_one(
                    &video,
                    &series,
                    season,
                    &references,
                    &matcher,
                    options,
                    &mut results,
                    &mut failures,
                );
                progress_cb(current, total, &video);
            }
        }

        phase_cb(Phase::Done);
        Ok((results, failures))
    }

    fn acquire_subtitles(
        &self,
        series: &str,
        season: u32,
        videos: &[PathBuf],
    ) -> Vec<SubtitleFile> {
        let cache_key = format!("subtitles_{series}_{season:02}");
        if let Some(cached) = self.subtitle_cache.get(&cache_key) {
            return cached;
        }

        let fetched = match self.subtitles.get(series, season, Some(videos)) {
            Ok(files) => files,
            Err(e) => {
                warn!("subtitle acquisition failed for {series} S{season:02}: {e}");
                Vec::new()
            }
        };

        self.subtitle_cache.set(cache_key, fetched.clone());
        fetched
    }

    #[allow(clippy::too_many_arguments)]
    fn match_one(
        &self,
        video: &Path,
        series: &str,
        season: u32,
        references: &[SubtitleFile],
        matcher: &MultiSegmentMatcher,
        options: &ProcessOptions,
        results: &mut Vec<MatchResult>,
        failures: &mut Vec<FailedMatch>,
    ) {
        let duration = match audio_chunker::duration(video) {
            Ok(d) => d,
            Err(e) => {
                failures.push(FailedMatch::new(
                    video.to_path_buf(),
                    format!("could not determine video duration: {e}"),
                ));
                return;
            }
        };

        let Some(mut result) = matcher.match_video(video, duration, references) else {
            failures.push(FailedMatch::new(video.to_path_buf(), "no match found"));
            return;
        };

        let min_confidence = options.min_confidence.unwrap_or(self.min_confidence);
        if result.confidence < min_confidence {
            failures.push(FailedMatch {
                original_file: video.to_path_buf(),
                reason: "low confidence".to_string(),
                confidence: result.confidence,
                series_name: Some(series.to_string()),
                season: Some(season),
            });
            return;
        }

        if !options.dry_run {
            match renamer::finalize(video, &result.episode_info, options.output_dir.as_deref()) {
                Ok(Some(final_path)) => result.matched_file = final_path,
                Ok(None) => { /* collision: renamer already logged, keep original path */ }
                Err(e) => warn!("finalizing match for {}: {e}", video.display()),
            }
        }

        results.push(result);
    }
}

/// Scans `path` for `.mkv` files (case-insensitive). A single matching file yields
/// itself; a directory recurses when `recursive`, otherwise lists one level deep.
fn scan(path: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(if is_mkv(path) {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut out = Vec::new();
    scan_dir(path, recursive, &mut out)?;
    out.sort();
    Ok(out)
}

fn scan_dir(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            if recursive {
                scan_dir(&entry_path, recursive, out)?;
            }
        } else if is_mkv(&entry_path) {
            out.push(entry_path);
        }
    }
    Ok(())
}

fn is_mkv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("mkv"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scan_finds_single_mkv_file() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("episode.mkv");
        fs::write(&video, b"fake").unwrap();

        let found = scan(&video, true).unwrap();
        assert_eq!(found, vec![video]);
    }

    #[test]
    fn scan_ignores_non_mkv_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), b"fake").unwrap();
        fs::write(dir.path().join("episode.mkv"), b"fake").unwrap();

        let found = scan(dir.path(), true).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn scan_non_recursive_ignores_subdirectories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("Season 01");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("episode.mkv"), b"fake").unwrap();
        fs::write(dir.path().join("top.mkv"), b"fake").unwrap();

        let found = scan(dir.path(), false).unwrap();
        assert_eq!(found, vec![dir.path().join("top.mkv")]);
    }

    #[test]
    fn scan_recursive_descends_into_subdirectories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("Season 01");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("episode.mkv"), b"fake").unwrap();

        let found = scan(dir.path(), true).unwrap();
        assert_eq!(found, vec![sub.join("episode.mkv")]);
    }
}
