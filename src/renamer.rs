//! Computes the canonical target path for a matched video, sanitizes it, and either
//! renames it in place or copies it into an output tree.

use crate::models::EpisodeInfo;
use log::warn;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {source_path} to {dest}: {source}")]
    Copy {
        source_path: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to rename {source_path} to {dest}: {source}")]
    Rename {
        source_path: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },
}

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Strips characters forbidden in filenames across common filesystems and trims
/// surrounding whitespace.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Builds the canonical target filename: `"{series} - {SxxEyy}{ - title}{.ext}"`.
pub fn target_filename(episode_info: &EpisodeInfo, original_extension: Option<&str>) -> String {
    let title_suffix = episode_info
        .title
        .as_deref()
        .map(|t| format!(" - {t}"))
        .unwrap_or_default();
    let orig_suffix = original_extension
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    sanitize_filename(&format!(
        "{} - {}{}{}",
        episode_info.series_name,
        episode_info.s_e_format(),
        title_suffix,
        orig_suffix
    ))
}

/// Finalizes a match by either renaming `source` in place or copying it into
/// `output_dir`. Returns the final path on success.
///
/// - If the computed destination equals `source`, this is a no-op and `source` is
///   returned unchanged.
/// - If the destination already exists (and isn't `source`), nothing is touched: a
///   warning is logged and `None` is returned so the caller can keep the original path
///   on the `MatchResult`.
pub fn finalize(
    source: &Path,
    episode_info: &EpisodeInfo,
    output_dir: Option<&Path>,
) -> Result<Option<PathBuf>, RenameError> {
    let extension = source.extension().and_then(|e| e.to_str());
    let filename = target_filename(episode_info, extension);

    let dest_dir = match output_dir {
        Some(dir) => {
            if !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| RenameError::CreateDir {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
            }
            dir.to_path_buf()
        }
        None => source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let destination = dest_dir.join(&filename);

    if destination == source {
        return Ok(Some(destination));
    }

    if destination.exists() {
        warn!(
            "rename collision: {} already exists, leaving {} untouched",
            destination.display(),
            source.display()
        );
        return Ok(None);
    }

    if output_dir.is_some() {
        std::fs::copy(source, &destination).map_err(|e| RenameError::Copy {
            source_path: source.to_path_buf(),
            dest: destination.clone(),
            source: e,
        })?;
    } else {
        std::fs::rename(source, &destination).map_err(|e| RenameError::Rename {
            source_path: source.to_path_buf(),
            dest: destination.clone(),
            source: e,
        })?;
    }

    Ok(Some(destination))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn episode(title: Option<&str>) -> EpisodeInfo {
        let mut info = EpisodeInfo::new("Breaking Bad", 1, 2);
        info.title = title.map(str::to_string);
        info
    }

    #[test]
    fn sanitize_strips_forbidden_characters() {
        assert_eq!(sanitize_filename("Who: What?"), "Who What");
    }

    #[test]
    fn target_filename_without_title() {
        assert_eq!(
            target_filename(&episode(None), Some("mkv")),
            "Breaking Bad - S01E02.mkv"
        );
    }

    #[test]
    fn target_filename_with_title() {
        assert_eq!(
            target_filename(&episode(Some("Cat's in the Bag...")), Some("mkv")),
            "Breaking Bad - S01E02 - Cats in the Bag.mkv"
        );
    }

    #[test]
    fn finalize_renames_in_place() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("random_video.mkv");
        std::fs::write(&source, b"fake").unwrap();

        let result = finalize(&source, &episode(None), None).unwrap();
        let expected = dir.path().join("Breaking Bad - S01E02.mkv");
        assert_eq!(result, Some(expected.clone()));
        assert!(expected.exists());
        assert!(!source.exists());
    }

    #[test]
    fn finalize_copies_into_output_dir() {
        let source_dir = tempdir().unwrap();
        let output_dir = tempdir().unwrap();
        let source = source_dir.path().join("random_video.mkv");
        std::fs::write(&source, b"fake").unwrap();

        let result = finalize(&source, &episode(None), Some(output_dir.path())).unwrap();
        let expected = output_dir.path().join("Breaking Bad - S01E02.mkv");
        assert_eq!(result, Some(expected.clone()));
        assert!(expected.exists());
        assert!(source.exists(), "copy mode must leave the source intact");
    }

    #[test]
    fn finalize_is_noop_when_destination_equals_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("Breaking Bad - S01E02.mkv");
        std::fs::write(&source, b"fake").unwrap();

        let result = finalize(&source, &episode(None), None).unwrap();
        assert_eq!(result, Some(source));
    }

    #[test]
    fn finalize_refuses_to_overwrite_existing_destination() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("random_video.mkv");
        let existing = dir.path().join("Breaking Bad - S01E02.mkv");
        std::fs::write(&source, b"fake").unwrap();
        std::fs::write(&existing, b"already here").unwrap();

        let result = finalize(&source, &episode(None), None).unwrap();
        assert_eq!(result, None);
        assert!(source.exists(), "source must be left untouched on collision");
        assert_eq!(std::fs::read(&existing).unwrap(), b"already here");
    }
}
