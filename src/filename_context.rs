//! Infers `(series, season)` from a video's path and directory structure, and recognizes
//! filenames that already carry an explicit episode tag.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static SEASON_DIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)[Ss](\d{1,2})").unwrap());
static SEASON_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})").unwrap());
static FILENAME_SE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[Ss](\d{1,2})[Ee]\d{1,2}").unwrap());
static FILENAME_X: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{1,2})x\d{1,2}").unwrap());
static FILENAME_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)season[\s.]*(\d{1,2})").unwrap());
static NOT_ALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 _-]").unwrap());
static PROCESSED_SE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[Ss]\d{1,2}[Ee]\d{1,2}").unwrap());
static PROCESSED_X: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}x\d{1,2}").unwrap());

/// Infers `(series, season)` from `video_path`, trying four heuristics in order and
/// returning on the first one that matches:
///
/// 1. parent directory name contains "season" and a number → season = number, series =
///    grandparent directory name.
/// 2. parent directory matches `S\d{1,2}` → same.
/// 3. `show_dir` is an ancestor of `video_path` → series = first path component under
///    it, season = next component's number if that component looks like a season dir.
/// 4. filename itself matches a season/episode pattern → season only, series is `None`.
pub fn detect(video_path: &Path, show_dir: Option<&Path>) -> (Option<String>, Option<u32>) {
    if let Some(parent) = video_path.parent() {
        if let Some(parent_name) = parent.file_name().and_then(|s| s.to_str()) {
            if parent_name.to_lowercase().contains("season") {
                if let Some(season) = extract_number(parent_name) {
                    return (grandparent_series(parent), Some(season));
                }
            }
            if let Some(caps) = SEASON_DIR.captures(parent_name) {
                if let Some(season) = caps[1].parse::<u32>().ok() {
                    return (grandparent_series(parent), Some(season));
                }
            }
        }
    }

    let mut series_from_show_dir = None;
    if let Some(show_dir) = show_dir {
        if let Ok(rel) = video_path.strip_prefix(show_dir) {
            let mut components = rel.components();
            if let Some(series_component) = components.next() {
                let series = series_component
                    .as_os_str()
                    .to_str()
                    .map(sanitize_series_name);
                let season = components
                    .next()
                    .and_then(|c| c.as_os_str().to_str())
                    .filter(|s| s.to_lowercase().contains("season"))
                    .and_then(extract_number);
                if series.is_some() {
                    // Season still missing: keep the series and fall through to the
                    // filename heuristic below instead of returning early, so it can
                    // fill the season field independently.
                    if season.is_some() {
                        return (series, season);
                    }
                    series_from_show_dir = series;
                }
            }
        }
    }

    if let Some(stem) = video_path.file_stem().and_then(|s| s.to_str()) {
        if let Some(caps) = FILENAME_SE.captures(stem) {
            return (series_from_show_dir, caps[1].parse().ok());
        }
        if let Some(caps) = FILENAME_X.captures(stem) {
            return (series_from_show_dir, caps[1].parse().ok());
        }
        if let Some(caps) = FILENAME_SEASON.captures(stem) {
            return (series_from_show_dir, caps[1].parse().ok());
        }
    }

    (series_from_show_dir, None)
}

/// True iff `video_path`'s stem already carries an explicit `S##E##` or `##x##` tag.
/// Such files are treated as already processed and skipped by the engine.
pub fn is_processed(video_path: &Path) -> bool {
    let Some(stem) = video_path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    PROCESSED_SE.is_match(stem) || PROCESSED_X.is_match(stem)
}

fn grandparent_series(parent: &Path) -> Option<String> {
    parent
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|s| s.to_str())
        .map(sanitize_series_name)
}

fn extract_number(s: &str) -> Option<u32> {
    SEASON_NUMBER.find(s).and_then(|m| m.as_str().parse().ok())
}

fn sanitize_series_name(name: &str) -> String {
    NOT_ALLOWED.replace_all(name, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn detects_season_directory_by_keyword() {
        let path = PathBuf::from("/shows/Breaking Bad/Season 02/episode1.mkv");
        let (series, season) = detect(&path, None);
        assert_eq!(series.as_deref(), Some("Breaking Bad"));
        assert_eq!(season, Some(2));
    }

    #[test]
    fn detects_season_directory_by_s_prefix() {
        let path = PathBuf::from("/shows/The Wire/S03/ep.mkv");
        let (series, season) = detect(&path, None);
        assert_eq!(series.as_deref(), Some("The Wire"));
        assert_eq!(season, Some(3));
    }

    #[test]
    fn falls_back_to_show_dir_relative_layout() {
        // Neither heuristic 1 nor 2 fires here: the immediate parent directory name
        // ("weird stuff") matches neither "season" nor an `S\d+` prefix.
        let show_dir = PathBuf::from("/library");
        let path = PathBuf::from("/library/Fringe/weird stuff/weird.mkv");
        let (series, season) = detect(&path, Some(&show_dir));
        assert_eq!(series.as_deref(), Some("Fringe"));
        assert_eq!(season, None);
    }

    #[test]
    fn show_dir_series_combines_with_filename_season() {
        // Series is resolved via show_dir (heuristic 3), but its season component
        // ("extras") doesn't look like a season directory, so the season must come
        // from the filename pattern (heuristic 4) instead, per-field resolution.
        let show_dir = PathBuf::from("/library");
        let path = PathBuf::from("/library/Show/extras/Show.S03E05.mkv");
        let (series, season) = detect(&path, Some(&show_dir));
        assert_eq!(series.as_deref(), Some("Show"));
        assert_eq!(season, Some(3));
    }

    #[test]
    fn falls_back_to_filename_season_episode_pattern() {
        let path = PathBuf::from("/dump/random.S04E12.mkv");
        let (series, season) = detect(&path, None);
        assert_eq!(series, None);
        assert_eq!(season, Some(4));
    }

    #[test]
    fn falls_back_to_filename_x_pattern() {
        let path = PathBuf::from("/dump/random.4x12.mkv");
        let (series, season) = detect(&path, None);
        assert_eq!(series, None);
        assert_eq!(season, Some(4));
    }

    #[test]
    fn returns_none_none_when_nothing_matches() {
        let path = PathBuf::from("/dump/mystery_video.mkv");
        let (series, season) = detect(&path, None);
        assert_eq!(series, None);
        assert_eq!(season, None);
    }

    #[test]
    fn sanitizes_series_name_characters() {
        let path = PathBuf::from("/shows/Breaking:Bad!/Season 2/ep.mkv");
        let (series, _) = detect(&path, None);
        assert_eq!(series.as_deref(), Some("BreakingBad"));
    }

    #[test]
    fn is_processed_recognizes_standard_tag() {
        assert!(is_processed(Path::new("Show - S02E05.mkv")));
    }

    #[test]
    fn is_processed_recognizes_x_tag() {
        assert!(is_processed(Path::new("Show - 2x05.mkv")));
    }

    #[test]
    fn is_processed_false_for_untagged_file() {
        assert!(!is_processed(Path::new("Show - episode.mkv")));
    }
}
