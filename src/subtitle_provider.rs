//! Locates reference subtitles for a `(series, season)` pair, locally and/or from a
//! remote service.

use crate::models::{EpisodeInfo, SubtitleFile};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubtitleProviderError {
    #[error("failed to read directory {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("remote subtitle search failed after retries: {0}")]
    SearchFailed(String),
    #[error("remote subtitle download failed after retries: {0}")]
    DownloadFailed(String),
    #[error("request to remote subtitle service timed out")]
    Timeout,
}

/// Shared contract implemented by every subtitle source.
pub trait SubtitleProvider: Send + Sync {
    fn get(
        &self,
        series: &str,
        season: u32,
        videos: Option<&[PathBuf]>,
    ) -> Result<Vec<SubtitleFile>, SubtitleProviderError>;
}

static SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d{1,2})E(\d{1,2})").unwrap());
static SEASON_EPISODE_X: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})x(\d{1,2})").unwrap());

fn parse_season_episode(stem: &str) -> Option<(u32, u32)> {
    if let Some(caps) = SEASON_EPISODE.captures(stem) {
        return Some((caps[1].parse().ok()?, caps[2].parse().ok()?));
    }
    if let Some(caps) = SEASON_EPISODE_X.captures(stem) {
        return Some((caps[1].parse().ok()?, caps[2].parse().ok()?));
    }
    None
}

/// Reads `{cache_dir}/data/{series}/*.srt` (case-insensitive extension), keeping only
/// files whose filename encodes the requested season.
pub struct LocalProvider {
    pub cache_dir: PathBuf,
}

impl LocalProvider {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn series_dir(&self, series: &str) -> PathBuf {
        self.cache_dir.join("data").join(series)
    }
}

impl SubtitleProvider for LocalProvider {
    fn get(
        &self,
        series: &str,
        season: u32,
        _videos: Option<&[PathBuf]>,
    ) -> Result<Vec<SubtitleFile>, SubtitleProviderError> {
        let dir = self.series_dir(series);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SubtitleProviderError::Io {
                    path: dir,
                    source: e,
                });
            }
        };

        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| SubtitleProviderError::Io {
                path: dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            let is_srt = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("srt"))
                .unwrap_or(false);
            if !is_srt {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Some((s, e)) = parse_season_episode(stem) else {
                continue;
            };
            if s != season {
                continue;
            }
            if !seen.insert(path.clone()) {
                continue;
            }
            results.push(SubtitleFile::new(
                path,
                EpisodeInfo::new(series.to_string(), s, e),
            ));
        }

        Ok(results)
    }
}

/// One candidate result from a remote search, before its content is downloaded.
struct RemoteCandidate {
    season: u32,
    episode: u32,
    download_url: String,
}

/// Queries a remote subtitle API for `(series, season)`, downloading one file per
/// distinct episode number (first successful download per episode wins), and writes
/// it to the canonical local path so subsequent `LocalProvider` lookups see it.
pub struct RemoteProvider {
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub api_key: String,
    client: reqwest::blocking::Client,
}

const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SEARCH_MAX_ATTEMPTS: u32 = 3;
const DOWNLOAD_MAX_ATTEMPTS: u32 = 5;

impl RemoteProvider {
    pub fn new(cache_dir: PathBuf, base_url: String, api_key: String) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            cache_dir,
            base_url,
            api_key,
            client,
        }
    }

    fn search(&self, series: &str, season: u32) -> Result<Vec<RemoteCandidate>, SubtitleProviderError> {
        retry_with_backoff(SEARCH_MAX_ATTEMPTS, || self.search_once(series, season))
            .map_err(SubtitleProviderError::SearchFailed)
    }

    fn search_once(&self, series: &str, season: u32) -> Result<Vec<RemoteCandidate>, String> {
        #[derive(serde::Deserialize)]
        struct SearchResponseItem {
            season_number: Option<u32>,
            episode_number: Option<u32>,
            download_url: String,
        }
        #[derive(serde::Deserialize)]
        struct SearchResponse {
            results: Vec<SearchResponseItem>,
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[
                ("query", series.to_string()),
                ("season_number", season.to_string()),
                ("type", "episode".to_string()),
            ])
            .send()
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let parsed: SearchResponse = response.json().map_err(|e| e.to_string())?;

        Ok(parsed
            .results
            .into_iter()
            .filter_map(|item| {
                Some(RemoteCandidate {
                    season: item.season_number.unwrap_or(season),
                    episode: item.episode_number?,
                    download_url: item.download_url,
                })
            })
            .collect())
    }

    fn download(
        &self,
        series: &str,
        candidate: &RemoteCandidate,
    ) -> Result<PathBuf, SubtitleProviderError> {
        retry_with_backoff(DOWNLOAD_MAX_ATTEMPTS, || self.download_once(series, candidate))
            .map_err(SubtitleProviderError::DownloadFailed)
    }

    fn download_once(
        &self,
        series: &str,
        candidate: &RemoteCandidate,
    ) -> Result<PathBuf, String> {
        let response = self
            .client
            .get(&candidate.download_url)
            .bearer_auth(&self.api_key)
            .send()
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let bytes = response.bytes().map_err(|e| e.to_string())?;

        let series_dir = self.cache_dir.join("data").join(series);
        std::fs::create_dir_all(&series_dir).map_err(|e| e.to_string())?;
        let filename = format!(
            "{} - S{:02}E{:02}.srt",
            series, candidate.season, candidate.episode
        );
        let path = series_dir.join(filename);
        std::fs::write(&path, &bytes).map_err(|e| e.to_string())?;

        Ok(path)
    }
}

impl SubtitleProvider for RemoteProvider {
    fn get(
        &self,
        series: &str,
        season: u32,
        _videos: Option<&[PathBuf]>,
    ) -> Result<Vec<SubtitleFile>, SubtitleProviderError> {
        let candidates = self.search(series, season)?;

        let mut seen_episodes = std::collections::HashSet::new();
        let mut results = Vec::new();

        for candidate in candidates {
            if !seen_episodes.insert(candidate.episode) {
                continue;
            }
            match self.download(series, &candidate) {
                Ok(path) => results.push(SubtitleFile::new(
                    path,
                    EpisodeInfo::new(series.to_string(), candidate.season, candidate.episode),
                )),
                Err(_) => continue,
            }
        }

        Ok(results)
    }
}

/// Runs `local` first; if it finds at least 3 subtitles, returns immediately. Otherwise
/// concatenates the local results with whichever single subsequent provider produces
/// something first. Final results are deduped by `(season, episode)`, local wins ties.
pub struct CompositeProvider {
    providers: Vec<Box<dyn SubtitleProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Box<dyn SubtitleProvider>>) -> Self {
        Self { providers }
    }
}

impl SubtitleProvider for CompositeProvider {
    fn get(
        &self,
        series: &str,
        season: u32,
        videos: Option<&[PathBuf]>,
    ) -> Result<Vec<SubtitleFile>, SubtitleProviderError> {
        let mut results = Vec::new();

        for (i, provider) in self.providers.iter().enumerate() {
            let found = provider.get(series, season, videos)?;

            if i == 0 {
                results.extend(found);
                if results.len() >= 3 {
                    break;
                }
                continue;
            }

            if results.is_empty() {
                results.extend(found);
                if !results.is_empty() {
                    break;
                }
                continue;
            }
            break;
        }

        Ok(dedupe_by_episode(results))
    }
}

fn dedupe_by_episode(files: Vec<SubtitleFile>) -> Vec<SubtitleFile> {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for file in files {
        let key = (file.episode_info.season, file.episode_info.episode);
        if seen.insert(key, ()).is_none() {
            out.push(file);
        }
    }
    out
}

/// Retries `f` up to `max_attempts` times total, sleeping `base * 2^(attempt-1)` capped
/// at 60s between attempts. The first attempt runs immediately with no delay.
fn retry_with_backoff<T>(
    max_attempts: u32,
    mut f: impl FnMut() -> Result<T, String>,
) -> Result<T, String> {
    let mut last_err = String::new();
    for attempt in 0..max_attempts {
        if attempt > 0 {
            let delay = RETRY_BASE_DELAY.saturating_mul(1 << (attempt - 1));
            std::thread::sleep(delay.min(RETRY_MAX_DELAY));
        }
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubtitleFile;

    fn sub(series: &str, season: u32, episode: u32) -> SubtitleFile {
        SubtitleFile::new(
            PathBuf::from(format!("{series} S{season:02}E{episode:02}.srt")),
            EpisodeInfo::new(series.to_string(), season, episode),
        )
    }

    #[test]
    fn parses_standard_season_episode_pattern() {
        assert_eq!(parse_season_episode("Show - S02E05"), Some((2, 5)));
    }

    #[test]
    fn parses_x_separated_pattern() {
        assert_eq!(parse_season_episode("Show - 2x05"), Some((2, 5)));
    }

    #[test]
    fn returns_none_for_unrecognized_filename() {
        assert_eq!(parse_season_episode("Show - extras"), None);
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let files = vec![sub("Show", 1, 1), sub("Show", 1, 1), sub("Show", 1, 2)];
        let deduped = dedupe_by_episode(files);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn local_provider_returns_empty_for_missing_directory() {
        let provider = LocalProvider::new(PathBuf::from("/nonexistent/path/for/test"));
        let result = provider.get("Some Show", 1, None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn retry_with_backoff_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), String> = retry_with_backoff(3, || {
            calls += 1;
            Err("fail".to_string())
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_with_backoff_returns_first_success() {
        let mut calls = 0;
        let result = retry_with_backoff(5, || {
            calls += 1;
            if calls < 2 {
                Err("fail".to_string())
            } else {
                Ok(42)
            }
        });
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 2);
    }

    struct StubProvider(Vec<SubtitleFile>);
    impl SubtitleProvider for StubProvider {
        fn get(
            &self,
            _series: &str,
            _season: u32,
            _videos: Option<&[PathBuf]>,
        ) -> Result<Vec<SubtitleFile>, SubtitleProviderError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn composite_skips_empty_providers_until_one_produces_results() {
        let composite = CompositeProvider::new(vec![
            Box::new(StubProvider(Vec::new())),
            Box::new(StubProvider(Vec::new())),
            Box::new(StubProvider(vec![sub("Show", 1, 1)])),
        ]);
        let result = composite.get("Show", 1, None).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn composite_stops_at_first_fallback_provider_that_produces_results() {
        let composite = CompositeProvider::new(vec![
            Box::new(StubProvider(Vec::new())),
            Box::new(StubProvider(vec![sub("Show", 1, 1)])),
            Box::new(StubProvider(vec![sub("Show", 1, 2)])),
        ]);
        let result = composite.get("Show", 1, None).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].episode_info.episode, 1);
    }
}
