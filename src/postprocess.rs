//! Offline re-transcription of a recorded session.
//!
//! Every response WAV in a session folder is sent to a [`Transcriber`] again
//! and the results are written to `transcriptions.csv` beside them. Useful when
//! the speech service was down during the session or a better model is
//! available afterwards.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::AudioClip;
use crate::session::{Transcriber, TRANSCRIPTION_FAILED};
use crate::telemetry::{CsvLog, LogRecord};

pub const TRANSCRIPTIONS_FILE: &str = "transcriptions.csv";

/// One row of `transcriptions.csv`
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionRecord {
    pub wav_file: String,
    pub transcription: String,
}

impl LogRecord for TranscriptionRecord {
    const SCHEMA: &'static str = "transcriptions";
    const VERSION: u32 = 1;
    const FIELDS: &'static [&'static str] = &["wav_file", "transcription"];

    fn values(&self) -> Vec<String> {
        vec![self.wav_file.clone(), self.transcription.clone()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessSummary {
    pub output: PathBuf,
    pub transcribed: usize,
    pub failed: usize,
}

/// WAV files directly inside `dir`, sorted by name
pub fn response_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let listing = fs::read_dir(dir)
        .with_context(|| format!("Failed to list session folder {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in listing {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_wav && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Transcribe every response in `session_dir`.
///
/// The output (default `<session_dir>/transcriptions.csv`) is replaced, not
/// appended to. Unreadable files and failed transcriptions get the `[ERROR]`
/// sentinel and the run carries on. Nothing is written when the folder holds
/// no WAV files.
pub async fn transcribe_session(
    session_dir: &Path,
    out_file: Option<&Path>,
    transcriber: &dyn Transcriber,
) -> Result<PostprocessSummary> {
    let output = out_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| session_dir.join(TRANSCRIPTIONS_FILE));
    let files = response_files(session_dir)?;

    let mut summary = PostprocessSummary {
        output: output.clone(),
        transcribed: 0,
        failed: 0,
    };
    if files.is_empty() {
        warn!("No WAV files in {}", session_dir.display());
        return Ok(summary);
    }

    if output.exists() {
        fs::remove_file(&output)
            .with_context(|| format!("Failed to replace {}", output.display()))?;
    }
    let mut log = CsvLog::<TranscriptionRecord>::open(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    for (i, path) in files.iter().enumerate() {
        let wav_file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let outcome = match AudioClip::open_wav(path) {
            Ok(clip) => transcriber.transcribe(clip).await.map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        let transcription = match outcome {
            Ok(text) => {
                summary.transcribed += 1;
                text
            }
            Err(e) => {
                warn!("Could not transcribe {}: {:#}", wav_file, e);
                summary.failed += 1;
                TRANSCRIPTION_FAILED.to_string()
            }
        };

        info!("[{}/{}] {}: {}", i + 1, files.len(), wav_file, transcription);
        log.write(&TranscriptionRecord {
            wav_file,
            transcription,
        })?;
    }
    log.close()?;

    info!(
        "Wrote {} ({} transcribed, {} failed)",
        output.display(),
        summary.transcribed,
        summary.failed
    );
    Ok(summary)
}
