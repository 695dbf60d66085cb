use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which shelf of the catalogue a video lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VideoKind {
    Masking,
    Speech,
    Idle,
}

impl VideoKind {
    pub const ALL: [VideoKind; 3] = [VideoKind::Masking, VideoKind::Speech, VideoKind::Idle];

    /// Directory name and `/video/names/{type}` suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoKind::Masking => "masking",
            VideoKind::Speech => "speech",
            VideoKind::Idle => "idle",
        }
    }
}

impl fmt::Display for VideoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct VideoEntry {
    pub name: String,
    pub kind: VideoKind,
    pub path: PathBuf,
    /// Clip length in seconds, when known
    pub duration_secs: Option<f64>,
}

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v", "mkv"];

/// Repository of the videos a session script may reference.
///
/// Built once per process and shared by `Arc` with whatever needs lookups
/// (script validation, the remote controller, the outbound sender).
#[derive(Debug, Default, Clone)]
pub struct VideoCatalogue {
    entries: BTreeMap<String, VideoEntry>,
}

impl VideoCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan `<root>/masking`, `<root>/speech` and `<root>/idle` for video files.
    ///
    /// Missing shelves are skipped with a warning; the video name is the file stem.
    pub fn from_directory(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut catalogue = Self::new();

        for kind in VideoKind::ALL {
            let dir = root.join(kind.as_str());
            if !dir.is_dir() {
                warn!("Catalogue directory {} does not exist", dir.display());
                continue;
            }

            let listing = fs::read_dir(&dir)
                .with_context(|| format!("Failed to list catalogue directory {:?}", dir))?;
            for entry in listing {
                let path = entry?.path();
                let is_video = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                    .unwrap_or(false);
                if !is_video {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    let name = stem.to_string();
                    catalogue.insert(VideoEntry {
                        name,
                        kind,
                        path: path.clone(),
                        duration_secs: None,
                    });
                }
            }
        }

        info!(
            "Video catalogue loaded from {}: {} videos",
            root.display(),
            catalogue.len()
        );

        Ok(catalogue)
    }

    pub fn insert(&mut self, entry: VideoEntry) {
        if let Some(previous) = self.entries.insert(entry.name.clone(), entry) {
            warn!(
                "Video name {} appears more than once; keeping the last one",
                previous.name
            );
        }
    }

    /// Convenience for building catalogues in code
    pub fn with_video(mut self, kind: VideoKind, name: &str, duration_secs: Option<f64>) -> Self {
        self.insert(VideoEntry {
            name: name.to_string(),
            kind,
            path: PathBuf::from(format!("{}/{}.mp4", kind, name)),
            duration_secs,
        });
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&VideoEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted names per kind; every kind is present, possibly empty
    pub fn names_by_kind(&self) -> BTreeMap<VideoKind, Vec<String>> {
        let mut names: BTreeMap<VideoKind, Vec<String>> =
            VideoKind::ALL.iter().map(|k| (*k, Vec::new())).collect();
        for entry in self.entries.values() {
            names.entry(entry.kind).or_default().push(entry.name.clone());
        }
        names
    }

    pub fn log_names(&self) {
        for (kind, names) in self.names_by_kind() {
            info!("Catalogue {} videos: {}", kind, names.join(", "));
        }
    }
}
