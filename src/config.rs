//! Configuration layer.
//!
//! `Config` is constructed directly by library consumers, or via [`Config::from_env`] for
//! the binary. No config *file* format is parsed here — shaping an on-disk schema is
//! outside this crate's scope.

use std::path::PathBuf;

/// Which `SubtitleProvider` chain the engine should assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubProviderKind {
    Local,
    Remote,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub min_confidence: f64,
    pub asr_provider: String,
    pub sub_provider: SubProviderKind,
    pub remote_base_url: String,
    pub remote_api_key: Option<String>,
    pub show_dir: Option<PathBuf>,
    pub cache_max_items: usize,
    pub cache_max_memory_bytes: usize,
}

const DEFAULT_REMOTE_BASE_URL: &str = "https://api.opensubtitles.com/api/v1";

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            min_confidence: 0.7,
            asr_provider: "whisper".to_string(),
            sub_provider: SubProviderKind::Local,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            remote_api_key: None,
            show_dir: None,
            cache_max_items: 100,
            cache_max_memory_bytes: 512 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Builds a `Config` from `EPISODE_MATCHER_*` environment variables, falling back to
    /// defaults for anything unset. Malformed numeric/enum values fall back silently to
    /// the default rather than erroring, matching the teacher's "sensible default over
    /// hard failure" posture for optional ambient configuration.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("EPISODE_MATCHER_CACHE_DIR") {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_MIN_CONFIDENCE") {
            if let Ok(parsed) = val.parse::<f64>() {
                config.min_confidence = parsed;
            }
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_ASR_PROVIDER") {
            config.asr_provider = val;
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_SUB_PROVIDER") {
            config.sub_provider = match val.as_str() {
                "remote" => SubProviderKind::Remote,
                _ => SubProviderKind::Local,
            };
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_REMOTE_API_KEY") {
            config.remote_api_key = Some(val);
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_REMOTE_BASE_URL") {
            config.remote_base_url = val;
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_SHOW_DIR") {
            config.show_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_CACHE_MAX_ITEMS") {
            if let Ok(parsed) = val.parse::<usize>() {
                config.cache_max_items = parsed;
            }
        }
        if let Ok(val) = std::env::var("EPISODE_MATCHER_CACHE_MAX_MEMORY_BYTES") {
            if let Ok(parsed) = val.parse::<usize>() {
                config.cache_max_memory_bytes = parsed;
            }
        }

        config
    }

    /// Subtitle data directory for a given series: `{cache_dir}/data/{series_name}/`.
    pub fn series_data_dir(&self, series_name: &str) -> PathBuf {
        self.cache_dir.join("data").join(series_name)
    }
}

fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("de", "westhoffswelt", "episodematcher")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_min_confidence_is_seven_tenths() {
        assert_eq!(Config::default().min_confidence, 0.7);
    }

    #[test]
    fn series_data_dir_matches_canonical_layout() {
        let config = Config {
            cache_dir: PathBuf::from("/tmp/cache"),
            ..Config::default()
        };
        assert_eq!(
            config.series_data_dir("Breaking Bad"),
            PathBuf::from("/tmp/cache/data/Breaking Bad")
        );
    }

    #[test]
    fn from_env_reads_cache_memory_bound() {
        // SAFETY: this process does not otherwise read/write this var concurrently.
        unsafe {
            std::env::set_var("EPISODE_MATCHER_CACHE_MAX_MEMORY_BYTES", "1048576");
        }
        let config = Config::from_env();
        unsafe {
            std::env::remove_var("EPISODE_MATCHER_CACHE_MAX_MEMORY_BYTES");
        }
        assert_eq!(config.cache_max_memory_bytes, 1_048_576);
    }
}
