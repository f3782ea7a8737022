use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use storyboard::{Shot, Storyboard, StyleTag};
use thiserror::Error;
use tracing::{info, warn};

pub mod layout;
pub use layout::{layout_page, PageLayout, PageSpec, Rect};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
    #[error("storyboard is empty")]
    Empty,
    #[error("shots still generating: {0:?}")]
    GenerationInFlight(Vec<u32>),
    #[error("shots without an image: {0:?}")]
    MissingImages(Vec<u32>),
}

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Single JSON file with images embedded as data URIs
    Json,
    /// Directory with `storyboard.json` and one image file per page
    Bundle,
}

/// Export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub output_path: PathBuf,
    pub title: String,
    #[serde(default)]
    pub page: PageSpec,
}

impl ExportConfig {
    pub fn new(format: ExportFormat, output_path: PathBuf) -> Self {
        Self {
            format,
            output_path,
            title: "Storyboard".to_string(),
            page: PageSpec::default(),
        }
    }
}

/// `Storyboard_{N}_Shots_{unix millis}`
pub fn default_file_stem(shot_count: usize, at: DateTime<Utc>) -> String {
    format!("Storyboard_{}_Shots_{}", shot_count, at.timestamp_millis())
}

/// Checks that every shot has a finished image.
pub fn check_ready(board: &Storyboard) -> Result<(), ExportError> {
    if board.is_empty() {
        return Err(ExportError::Empty);
    }
    let in_flight: Vec<u32> = board
        .shots()
        .iter()
        .filter(|s| s.generation_in_flight)
        .map(|s| s.sequence_number)
        .collect();
    if !in_flight.is_empty() {
        return Err(ExportError::GenerationInFlight(in_flight));
    }
    let missing: Vec<u32> = board
        .shots()
        .iter()
        .filter(|s| !s.has_image())
        .map(|s| s.sequence_number)
        .collect();
    if !missing.is_empty() {
        return Err(ExportError::MissingImages(missing));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryboardPage {
    pub sequence_number: u32,
    pub summary: String,
    pub visual_prompt: String,
    pub style: StyleTag,
    pub duration_secs: u32,
    pub shot_type: String,
    pub aspect_ratio: String,
    pub layout: PageLayout,
    /// Data URI (json) or file name relative to the bundle (bundle).
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryboardDocument {
    pub title: String,
    pub page: PageSpec,
    pub pages: Vec<StoryboardPage>,
    pub metadata: ExportMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub exported_at: DateTime<Utc>,
    pub exporter_version: String,
    pub shot_count: usize,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub pages: usize,
    pub written: Vec<PathBuf>,
}

/// Main exporter struct
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export the storyboard, one page per shot in order.
    pub fn export_storyboard(&self, board: &Storyboard) -> Result<ExportSummary> {
        check_ready(board)?;
        let summary = match self.config.format {
            ExportFormat::Json => self.export_json(board)?,
            ExportFormat::Bundle => self.export_bundle(board)?,
        };
        info!(
            pages = summary.pages,
            path = %self.config.output_path.display(),
            "storyboard exported"
        );
        Ok(summary)
    }

    fn page(&self, shot: &Shot, image: String) -> StoryboardPage {
        StoryboardPage {
            sequence_number: shot.sequence_number,
            summary: shot.summary.clone(),
            visual_prompt: shot.visual_prompt.clone(),
            style: shot.style,
            duration_secs: shot.duration_secs,
            shot_type: shot.shot_type.clone(),
            aspect_ratio: shot.aspect_ratio.to_string(),
            layout: layout_page(&self.config.page, shot.aspect_ratio),
            image,
        }
    }

    fn document(&self, pages: Vec<StoryboardPage>) -> StoryboardDocument {
        StoryboardDocument {
            title: self.config.title.clone(),
            page: self.config.page,
            metadata: ExportMetadata {
                exported_at: Utc::now(),
                exporter_version: env!("CARGO_PKG_VERSION").to_string(),
                shot_count: pages.len(),
            },
            pages,
        }
    }

    fn export_json(&self, board: &Storyboard) -> Result<ExportSummary> {
        let pages: Vec<StoryboardPage> = board
            .shots()
            .iter()
            .filter_map(|shot| {
                let image = shot.generated_image.as_ref()?;
                Some(self.page(shot, image.to_data_uri()))
            })
            .collect();
        let count = pages.len();
        let json = serde_json::to_vec_pretty(&self.document(pages))?;
        write_atomic(&self.config.output_path, &json)?;
        Ok(ExportSummary {
            pages: count,
            written: vec![self.config.output_path.clone()],
        })
    }

    fn export_bundle(&self, board: &Storyboard) -> Result<ExportSummary> {
        let dir = &self.config.output_path;
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        let mut pages = Vec::with_capacity(board.len());
        for shot in board.shots() {
            let Some(image) = shot.generated_image.as_ref() else {
                continue;
            };
            let file_name = format!("shot_{:03}.{}", shot.sequence_number, image.extension());
            let path = dir.join(&file_name);
            write_atomic(&path, &image.data)?;
            written.push(path);
            pages.push(self.page(shot, file_name));
        }

        let count = pages.len();
        let manifest = dir.join("storyboard.json");
        let json = serde_json::to_vec_pretty(&self.document(pages))?;
        write_atomic(&manifest, &json)?;
        written.push(manifest);

        Ok(ExportSummary {
            pages: count,
            written,
        })
    }
}

/// Writes through a temp file in the target directory so a failed export
/// never leaves a truncated file behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "export write failed");
        ExportError::Io(err.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_file_stem() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            default_file_stem(12, at),
            "Storyboard_12_Shots_1700000000123"
        );
    }

    #[test]
    fn test_export_format_serde() {
        assert_eq!(
            serde_json::to_string(&ExportFormat::Bundle).unwrap(),
            "\"bundle\""
        );
    }

    #[test]
    fn test_write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
