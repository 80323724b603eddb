use crate::config::ExportConfig;
use crate::error::Error;
use crate::rows::{TrackingDocument, TrackingRow};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// State handed to a writer by [`TrackingMap::persist`](crate::TrackingMap::persist).
#[derive(Debug, Clone)]
pub struct Snapshot<'a> {
    pub rows: Vec<TrackingRow>,
    pub identity_names: &'a [String],
    pub username: &'a str,
    pub config: &'a ExportConfig,
}

impl<'a> Snapshot<'a> {
    pub fn to_document(&self) -> TrackingDocument {
        TrackingDocument {
            username: self.username.to_string(),
            edited_at: Utc::now(),
            identity_names: self.identity_names.to_vec(),
            rows: self.rows.clone(),
        }
    }
}

/// Persistence collaborator. Returns an identifier for what was written.
pub trait TrackWriter {
    fn write(&mut self, snapshot: &Snapshot<'_>) -> Result<String, Error>;
}

/// Writes delimited tracking files to a fixed path.
#[derive(Debug, Clone)]
pub struct DelimitedFileWriter {
    path: PathBuf,
}

impl DelimitedFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TrackWriter for DelimitedFileWriter {
    fn write(&mut self, snapshot: &Snapshot<'_>) -> Result<String, Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let text = snapshot.to_document().format(snapshot.config);
        fs::write(&self.path, text)?;

        tracing::info!(
            path = %self.path.display(),
            rows = snapshot.rows.len(),
            "tracking file written"
        );

        Ok(self.path.display().to_string())
    }
}
