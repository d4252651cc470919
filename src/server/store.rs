//! Generated report storage.
//!
//! Each analysis writes its PDF to `<report_dir>/<id>.pdf`. Only the newest
//! `capacity` reports are kept; older files are deleted as new ones arrive.
//! The index lives in memory, so reports from a previous process are not
//! served again.

use crate::analyze::write_atomic;
use crate::error::AnalyzerError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StoredReport {
    pub id: String,
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: usize,
    pub created_at: DateTime<Utc>,
}

pub struct ReportStore {
    dir: PathBuf,
    capacity: usize,
    entries: Mutex<VecDeque<StoredReport>>,
}

impl ReportStore {
    /// Create `dir` if needed.
    pub async fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self, AnalyzerError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AnalyzerError::OutputWriteFailed {
                path: dir.clone(),
                source: e,
            })?;
        Ok(Self {
            dir,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a PDF under a fresh id, evicting the oldest report when full.
    pub async fn save(&self, pdf: &[u8]) -> Result<StoredReport, AnalyzerError> {
        let id = Uuid::new_v4().simple().to_string();
        let path = self.dir.join(format!("{}.pdf", id));
        write_atomic(&path, pdf).await?;

        let report = StoredReport {
            id,
            path,
            size_bytes: pdf.len(),
            created_at: Utc::now(),
        };

        let evicted: Vec<StoredReport> = {
            let mut entries = self.entries.lock().await;
            entries.push_back(report.clone());
            let excess = entries.len().saturating_sub(self.capacity);
            entries.drain(..excess).collect()
        };

        for old in evicted {
            debug!("Evicting report {}", old.id);
            if let Err(e) = tokio::fs::remove_file(&old.path).await {
                warn!("Could not delete {}: {}", old.path.display(), e);
            }
        }

        Ok(report)
    }

    pub async fn get(&self, id: &str) -> Option<StoredReport> {
        self.entries.lock().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn latest(&self) -> Option<StoredReport> {
        self.entries.lock().await.back().cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Read the PDF for `id`, or the newest one when `id` is `None`.
    pub async fn read(&self, id: Option<&str>) -> Result<Vec<u8>, AnalyzerError> {
        let entry = match id {
            Some(id) => self.get(id).await,
            None => self.latest().await,
        };
        let not_found = || AnalyzerError::ReportNotFound {
            id: id.unwrap_or("latest").to_string(),
        };
        let entry = entry.ok_or_else(not_found)?;
        tokio::fs::read(&entry.path).await.map_err(|_| not_found())
    }
}
