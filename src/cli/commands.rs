//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::engine::export::{export_mix, sanitize_file_name, ExportFormat, ExportReport};
use crate::engine::io::{is_audio_path, AudioSource};
use crate::error::{MixError, Result};
use crate::mix::{select, FailurePolicy, MixConfig, MixOrder, MixReport, MixSession, TrackOverride};

/// Options of the `mix` command after parsing
#[derive(Debug, Clone, Default)]
pub struct MixArgs {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub drums: Vec<PathBuf>,
    pub drum_for: Vec<String>,
    pub auto_drums: bool,
    pub config: Option<PathBuf>,
    pub format: Option<ExportFormat>,
    pub crossfade: Option<f64>,
    pub duration: Option<f64>,
    pub order: Option<MixOrder>,
    pub retry_from_start: bool,
    pub report: Option<PathBuf>,
}

// ============================================================================
// Inputs
// ============================================================================

/// macOS resource-fork companions (`._name.mp3`) are not audio
fn is_resource_fork(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("._"))
        .unwrap_or(false)
}

/// Expand files and directories into a list of audio files
///
/// Directories are walked recursively in file-name order.
///
/// # Errors
/// `FileNotFound` when an input does not exist.
pub fn collect_audio_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let walked = WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_audio_path(path) && !is_resource_fork(path));
            files.extend(walked);
        } else if input.is_file() {
            if is_audio_path(input) && !is_resource_fork(input) {
                files.push(input.clone());
            } else {
                warn!("Skipping non-audio file: {}", input.display());
            }
        } else {
            return Err(MixError::FileNotFound {
                path: input.display().to_string(),
            });
        }
    }

    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn drum_name(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Output path with a safe file name; the directory part is kept
pub fn safe_output_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| sanitize_file_name(&n.to_string_lossy()))
        .unwrap_or_else(|| "mix".to_string());
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Split a `TRACK=DRUM` assignment
pub fn parse_drum_assignment(assignment: &str) -> Result<(String, String)> {
    match assignment.split_once('=') {
        Some((track, drum)) if !track.trim().is_empty() && !drum.trim().is_empty() => {
            Ok((track.trim().to_string(), drum.trim().to_string()))
        }
        _ => Err(MixError::InvalidConfig {
            reason: format!("drum assignment '{}' is not TRACK=DRUM", assignment),
        }),
    }
}

/// Load the configuration file, or the defaults
pub fn load_config(path: Option<&Path>) -> Result<MixConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration: {}", path.display());
            MixConfig::from_file(path)
        }
        None => Ok(MixConfig::default()),
    }
}

fn build_session(inputs: &[PathBuf], drums: &[PathBuf]) -> Result<MixSession> {
    let mut session = MixSession::new();

    for path in collect_audio_files(inputs)? {
        session.add_track(display_name(&path), AudioSource::file(path));
    }
    for path in collect_audio_files(drums)? {
        session.add_drum(drum_name(&path), AudioSource::file(path));
    }

    info!(
        "Registered {} tracks and {} drum loops",
        session.tracks().len(),
        session.drums().len()
    );
    Ok(session)
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Serialize)]
struct AnalysisRow<'a> {
    track: &'a str,
    bpm: Option<f64>,
    voice_start_secs: Option<f64>,
    drop_start_secs: Option<f64>,
    start_secs: f64,
    duration_secs: f64,
    error: Option<&'a str>,
}

/// Analyze tracks and print the table
pub fn analyze(inputs: &[PathBuf], config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mut session = build_session(inputs, &[])?;
    session.analyze(&config);

    let rows: Vec<AnalysisRow> = session
        .tracks()
        .iter()
        .map(|track| {
            let selection = select(track.analysis.as_ref(), &track.overrides, &config);
            AnalysisRow {
                track: &track.name,
                bpm: track.bpm(),
                voice_start_secs: track.analysis.as_ref().map(|a| a.voice_start_secs),
                drop_start_secs: track.analysis.as_ref().map(|a| a.drop_start_secs),
                start_secs: selection.start_secs,
                duration_secs: selection.duration_secs,
                error: track.analysis_error.as_deref(),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let fmt_secs = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());

    println!(
        "{:<40} {:>7} {:>8} {:>8} {:>8} {:>8}",
        "Track", "BPM", "Voice", "Drop", "Start", "Length"
    );
    println!("{:-<84}", "");
    for row in &rows {
        println!(
            "{:<40} {:>7} {:>8} {:>8} {:>8.2} {:>8.1}",
            row.track,
            row.bpm.map(|b| format!("{:.1}", b)).unwrap_or_else(|| "-".to_string()),
            fmt_secs(row.voice_start_secs),
            fmt_secs(row.drop_start_secs),
            row.start_secs,
            row.duration_secs
        );
        if let Some(error) = row.error {
            println!("    {}", error);
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct RunReport<'a> {
    mix: &'a MixReport,
    export: &'a ExportReport,
}

/// Analyze tracks, render the mix and export it
pub fn mix(args: &MixArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(format) = args.format {
        config.export.format = format;
    }
    if let Some(crossfade) = args.crossfade {
        config.crossfade_secs = crossfade;
    }
    if args.duration.is_some() {
        config.default_duration_secs = args.duration;
    }
    if let Some(order) = args.order {
        config.order = order;
    }
    if args.retry_from_start {
        config.failure_policy = FailurePolicy::RetryFromStart;
    }
    config.validate()?;

    let mut session = build_session(&args.inputs, &args.drums)?;
    session.analyze(&config);

    for assignment in &args.drum_for {
        let (track_name, drum) = parse_drum_assignment(assignment)?;
        let track = session
            .tracks()
            .iter()
            .find(|t| t.name == track_name)
            .ok_or_else(|| MixError::UnknownTrack { id: track_name.clone() })?;
        let id = track.id;
        let overrides = TrackOverride {
            drum: Some(drum.as_str().into()),
            ..track.overrides.clone()
        };
        session.set_override(id, overrides)?;
    }
    if args.auto_drums {
        let assigned = session.assign_nearest_drums();
        info!("Assigned drum loops to {} tracks", assigned);
    }

    let output = session.generate(&config)?;
    for failure in &output.report.failures {
        warn!("Left out '{}': {}", failure.track, failure.reason);
    }

    let export = export_mix(&output.buffer, &config.export, &safe_output_path(&args.output))?;
    println!(
        "Mix written: {} ({:.1}s, {} tracks, {} skipped)",
        export.output_path.display(),
        output.report.duration_secs,
        output.report.included.len(),
        output.report.failures.len()
    );

    if let Some(report_path) = &args.report {
        let run = RunReport {
            mix: &output.report,
            export: &export,
        };
        fs::write(report_path, serde_json::to_string_pretty(&run)?)?;
        info!("Report written: {}", report_path.display());
    }

    Ok(())
}

/// Print the (validated) configuration as JSON
pub fn print_config(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    println!("{}", config.to_json()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_audio_files_walks_and_filters() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("set");
        fs::create_dir(&nested).unwrap();
        for name in ["b.wav", "a.mp3", "._a.mp3", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(nested.join("c.flac"), b"").unwrap();

        let files = collect_audio_files(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, ["a.mp3", "b.wav", "c.flac"]);
    }

    #[test]
    fn test_collect_audio_files_explicit_files() {
        let dir = tempdir().unwrap();
        let song = dir.path().join("song.wav");
        let fork = dir.path().join("._song.wav");
        fs::write(&song, b"").unwrap();
        fs::write(&fork, b"").unwrap();

        let files = collect_audio_files(&[song.clone(), fork]).unwrap();
        assert_eq!(files, [song]);

        let missing = collect_audio_files(&[dir.path().join("gone.wav")]);
        assert!(matches!(missing, Err(MixError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_drum_assignment() {
        assert_eq!(
            parse_drum_assignment("intro.wav=kick").unwrap(),
            ("intro.wav".to_string(), "kick".to_string())
        );
        assert!(parse_drum_assignment("intro.wav").is_err());
        assert!(parse_drum_assignment("=kick").is_err());
    }

    #[test]
    fn test_safe_output_path() {
        assert_eq!(
            safe_output_path(Path::new("out/My Mix.wav")),
            PathBuf::from("out/My_Mix.wav")
        );
        assert_eq!(safe_output_path(Path::new("mix.mp3")), PathBuf::from("mix.mp3"));
    }

    #[test]
    fn test_load_config_defaults() {
        assert_eq!(load_config(None).unwrap(), MixConfig::default());
    }
}
