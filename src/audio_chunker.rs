//! Probes a video's duration and extracts 16kHz mono PCM chunks from it for transcription.

use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegDuration, FfmpegEvent};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

const DURATION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_OUTPUT_BYTES: u64 = 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to spawn ffmpeg for {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ffmpeg did not report a duration for {0}")]
    NoDuration(PathBuf),
    #[error("ffmpeg timed out probing/extracting {path} after {seconds}s")]
    Timeout { path: PathBuf, seconds: u64 },
    #[error("ffmpeg produced no usable output for {path}: {reason}")]
    BadOutput { path: PathBuf, reason: String },
    #[error("ffmpeg exited with {status} while extracting {path}: {stderr}")]
    ExitStatus {
        path: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Probes `video`'s duration in seconds, within a 10s deadline.
pub fn duration(video: &Path) -> Result<f64, ExtractError> {
    let mut child = FfmpegCommand::new()
        .input(video.to_string_lossy())
        .overwrite()
        .spawn()
        .map_err(|e| ExtractError::Spawn {
            path: video.to_path_buf(),
            source: e,
        })?;

    let events = child.iter().map_err(|e| ExtractError::Spawn {
        path: video.to_path_buf(),
        source: e,
    })?;

    let deadline = Instant::now() + DURATION_PROBE_TIMEOUT;
    let mut found = None;

    for event in events {
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ExtractError::Timeout {
                path: video.to_path_buf(),
                seconds: DURATION_PROBE_TIMEOUT.as_secs(),
            });
        }
        if let FfmpegEvent::ParsedDuration(FfmpegDuration { duration, .. }) = event {
            found = Some(duration);
        }
    }

    let _ = child.kill();
    let _ = child.wait();

    found.ok_or_else(|| ExtractError::NoDuration(video.to_path_buf()))
}

/// Extracts `duration_secs` seconds of audio starting at `start_secs` from `video` into
/// `output` as 16kHz mono PCM S16LE, within a 30s deadline. Removes a partial/truncated
/// output file before returning an error.
pub fn extract(
    video: &Path,
    start_secs: f64,
    duration_secs: f64,
    output: &Path,
) -> Result<PathBuf, ExtractError> {
    let mut child = FfmpegCommand::new()
        .input(video.to_string_lossy())
        .seek(format!("{start_secs:.3}"))
        .duration(format!("{duration_secs:.3}"))
        .args(["-vn", "-sn", "-dn"])
        .args(["-acodec", "pcm_s16le"])
        .args(["-ar", "16000"])
        .args(["-ac", "1"])
        .overwrite()
        .output(output.to_string_lossy())
        .spawn()
        .map_err(|e| ExtractError::Spawn {
            path: video.to_path_buf(),
            source: e,
        })?;

    let events = child.iter().map_err(|e| ExtractError::Spawn {
        path: video.to_path_buf(),
        source: e,
    })?;

    let deadline = Instant::now() + EXTRACT_TIMEOUT;
    let mut timed_out = false;
    let mut stderr = String::new();

    for event in events {
        if Instant::now() >= deadline {
            timed_out = true;
            break;
        }
        if let FfmpegEvent::Log(_, line) = event {
            stderr.push_str(&line);
            stderr.push('\n');
        }
    }

    if timed_out {
        let _ = child.kill();
        let _ = child.wait();
        remove_partial(output);
        return Err(ExtractError::Timeout {
            path: video.to_path_buf(),
            seconds: EXTRACT_TIMEOUT.as_secs(),
        });
    }

    let status = child.wait().map_err(|e| ExtractError::Io {
        path: video.to_path_buf(),
        source: e,
    })?;

    if !status.success() {
        remove_partial(output);
        return Err(ExtractError::ExitStatus {
            path: video.to_path_buf(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    match std::fs::metadata(output) {
        Ok(meta) if meta.len() >= MIN_OUTPUT_BYTES => Ok(output.to_path_buf()),
        Ok(_) => {
            remove_partial(output);
            Err(ExtractError::BadOutput {
                path: video.to_path_buf(),
                reason: "output file too small".to_string(),
            })
        }
        Err(_) => Err(ExtractError::BadOutput {
            path: video.to_path_buf(),
            reason: "output file missing".to_string(),
        }),
    }
}

fn remove_partial(output: &Path) {
    let _ = std::fs::remove_file(output);
}
