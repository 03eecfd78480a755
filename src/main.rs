use clap::{Parser, ValueEnum};
use episode_matcher::{
    AsrProvider, CompositeProvider, Config, LocalProvider, MatchEngine, Phase, ProcessOptions,
    RemoteProvider, SubProviderKind, SubtitleProvider, asr, model_downloader,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// episode_matcher - identify unlabeled TV episode files by matching their spoken
/// dialogue against reference subtitles, then rename them into canonical form.
#[derive(Parser)]
#[command(name = "episode_matcher")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "💡 TIP: pass --season when you already know it, to skip filename detection entirely."
)]
struct Cli {
    /// Video file or directory to process
    path: PathBuf,

    /// Whisper model to use; auto-downloaded into the cache directory if missing
    #[arg(short = 'm', long, default_value = "base.en")]
    model: String,

    /// Explicit path to a Whisper ggml model file, bypassing auto-download
    #[arg(long, value_name = "FILE")]
    model_path: Option<PathBuf>,

    /// Device identifier used to key the in-process model cache
    #[arg(long, default_value = "default")]
    device: String,

    /// Directory to treat as the show root when filename detection needs a hint
    #[arg(long, value_name = "DIR")]
    show_dir: Option<PathBuf>,

    /// Force every matched video into this season, skipping filename detection
    #[arg(long, value_name = "N")]
    season: Option<u32>,

    /// Only scan the given directory's immediate children, not subdirectories
    #[arg(long)]
    no_recursive: bool,

    /// Operation mode: what to do after matching
    #[arg(long, value_enum, default_value_t = Mode::DryRun)]
    mode: Mode,

    /// Output directory for copy mode (required when --mode copy)
    #[arg(short = 'o', long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Minimum confidence required to accept a match (overrides the configured default)
    #[arg(long)]
    min_confidence: Option<f64>,

    /// Also query a remote subtitle service when local references are too sparse
    #[arg(long)]
    remote: bool,

    /// Emit the final result list as JSON instead of the themed summary
    #[arg(long)]
    json: bool,
}

/// JSON-serializable view of the whole run, using `MatchResult`/`FailedMatch`'s field
/// names verbatim.
#[derive(serde::Serialize)]
struct JsonOutput {
    matches: Vec<episode_matcher::MatchResult>,
    failed: Vec<episode_matcher::FailedMatch>,
}

/// Operation mode
#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Show what would happen without making changes (default)
    DryRun,
    /// Rename files in place
    Rename,
    /// Copy files to output directory with new names
    Copy,
}

fn handle_phase(phase: Phase) {
    match phase {
        Phase::Scanning => {
            print!("🔎 Scanning... ");
            std::io::Write::flush(&mut std::io::stdout()).ok();
        }
        Phase::Grouping => println!("✓"),
        Phase::AcquiringSubtitles { series, season } => {
            print!("📖 Fetching subtitles for {series} S{season:02}... ");
            std::io::Write::flush(&mut std::io::stdout()).ok();
        }
        Phase::Matching { series, season } => {
            println!("✓");
            println!("🎬 Matching {series} S{season:02}...");
        }
        Phase::Done => println!(),
    }
}

fn handle_progress(current: usize, total: usize, path: &std::path::Path) {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    println!("   [{current}/{total}] {filename}");
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if !cli.path.exists() {
        eprintln!("❌ Error: path does not exist: {}", cli.path.display());
        process::exit(1);
    }

    if matches!(cli.mode, Mode::Copy) && cli.output_dir.is_none() {
        eprintln!("❌ Error: --output-dir is required when using --mode copy");
        process::exit(1);
    }

    let mut config = Config::from_env();
    if let Some(min_confidence) = cli.min_confidence {
        config.min_confidence = min_confidence;
    }
    if cli.remote {
        config.sub_provider = SubProviderKind::Remote;
    }
    if let Some(show_dir) = &cli.show_dir {
        config.show_dir = Some(show_dir.clone());
    }

    let model_path = match &cli.model_path {
        Some(path) => path.clone(),
        None => match model_downloader::ensure_model_available(&cli.model) {
            Ok(path) => path,
            Err(e) => {
                eprintln!(
                    "❌ Error: could not obtain Whisper model '{}': {e}",
                    cli.model
                );
                process::exit(1);
            }
        },
    };

    let asr_provider = match asr::whisper_provider(&model_path, &cli.model, &cli.device) {
        Ok(provider) => provider as Arc<dyn AsrProvider>,
        Err(e) => {
            eprintln!("❌ Error: failed to load Whisper model: {e}");
            process::exit(1);
        }
    };

    let mut providers: Vec<Box<dyn SubtitleProvider>> =
        vec![Box::new(LocalProvider::new(config.cache_dir.clone()))];
    if matches!(config.sub_provider, SubProviderKind::Remote) {
        match &config.remote_api_key {
            Some(api_key) => providers.push(Box::new(RemoteProvider::new(
                config.cache_dir.clone(),
                config.remote_base_url.clone(),
                api_key.clone(),
            ))),
            None => {
                eprintln!(
                    "⚠️  --remote requested but EPISODE_MATCHER_REMOTE_API_KEY is not set; continuing with local subtitles only"
                );
            }
        }
    }
    let subtitle_provider = Box::new(CompositeProvider::new(providers));

    let engine = MatchEngine::new(
        asr_provider,
        cli.model.clone(),
        subtitle_provider,
        config.min_confidence,
        config.cache_max_items,
        config.cache_max_memory_bytes,
    );

    let options = ProcessOptions {
        season_override: cli.season,
        recursive: !cli.no_recursive,
        dry_run: matches!(cli.mode, Mode::DryRun),
        output_dir: cli.output_dir.clone(),
        min_confidence: None,
        show_dir: config.show_dir.clone(),
    };

    if !cli.json {
        println!("🔍 episode_matcher");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let progress_cb = |current: usize, total: usize, path: &std::path::Path| {
        if !cli.json {
            handle_progress(current, total, path);
        }
    };
    let phase_cb = |phase: Phase| {
        if !cli.json {
            handle_phase(phase);
        }
    };

    let (results, failures) = match engine.process_path(&cli.path, &options, progress_cb, phase_cb)
    {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("\n❌ Processing failed: {e}");
            process::exit(1);
        }
    };

    if cli.json {
        let output = JsonOutput {
            matches: results,
            failed: failures,
        };
        let has_failures = !output.failed.is_empty();
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("❌ Error: failed to serialize results: {e}");
                process::exit(1);
            }
        }
        if has_failures {
            process::exit(1);
        }
        return;
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if results.is_empty() {
        println!("❌ No matches found");
    } else {
        let verb = match cli.mode {
            Mode::DryRun => "would rename",
            Mode::Rename => "renamed",
            Mode::Copy => "copied",
        };
        println!("✅ {} {} file(s):", results.len(), verb);
        for result in &results {
            let source_name = result
                .original_file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");
            println!(
                "  ✓ {} → {} ({}, confidence {:.2})",
                source_name,
                result.episode_info.s_e_format(),
                result.episode_info.series_name,
                result.confidence
            );
        }
    }

    if !failures.is_empty() {
        println!();
        println!("⚠️  {} file(s) could not be matched:", failures.len());
        for failure in &failures {
            let source_name = failure
                .original_file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");
            println!("  ✗ {source_name} - {}", failure.reason);
        }
        process::exit(1);
    }
}
