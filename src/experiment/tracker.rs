//! File-backed experiment tracker: params, metrics, tags and artifacts per run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

/// Sink for experiment records.
pub trait ExperimentTracker {
    fn log_param(&mut self, key: &str, value: &str);
    fn log_metric(&mut self, key: &str, value: f64);
    fn set_tag(&mut self, key: &str, value: &str);
    fn log_artifact(&mut self, path: &Path) -> Result<()>;
    fn end_run(&mut self, status: RunStatus) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub experiment: String,
    pub run_name: String,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub params: IndexMap<String, String>,
    pub metrics: IndexMap<String, f64>,
    pub tags: IndexMap<String, String>,
    pub artifacts: Vec<String>,
}

/// Writes each run to `<root>/<experiment>/<run_id>/run.json`.
pub struct FileTracker {
    run_dir: PathBuf,
    record: RunRecord,
}

impl FileTracker {
    pub fn start(root: &Path, experiment: &str, run_name: &str) -> Result<Self> {
        let started_at = Utc::now();
        let stamp = format!("{run_name}-{}", started_at.format("%Y%m%dT%H%M%S%3f"));
        let experiment_dir = root.join(sanitize(experiment));
        let (run_id, run_dir) = (0..)
            .map(|n| if n == 0 { stamp.clone() } else { format!("{stamp}-{n}") })
            .map(|id| {
                let dir = experiment_dir.join(sanitize(&id));
                (id, dir)
            })
            .find(|(_, dir)| !dir.exists())
            .unwrap_or_default();
        fs::create_dir_all(run_dir.join("artifacts"))
            .with_context(|| format!("creating run dir {}", run_dir.display()))?;
        info!(run_id, path = %run_dir.display(), "started run");
        Ok(Self {
            run_dir,
            record: RunRecord {
                experiment: experiment.to_string(),
                run_name: run_name.to_string(),
                run_id,
                started_at,
                ended_at: None,
                status: RunStatus::Running,
                params: IndexMap::new(),
                metrics: IndexMap::new(),
                tags: IndexMap::new(),
                artifacts: Vec::new(),
            },
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    fn flush(&self) -> Result<()> {
        let path = self.run_dir.join("run.json");
        let raw = serde_json::to_string_pretty(&self.record)?;
        fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))
    }
}

impl ExperimentTracker for FileTracker {
    fn log_param(&mut self, key: &str, value: &str) {
        self.record.params.insert(key.to_string(), value.to_string());
    }

    fn log_metric(&mut self, key: &str, value: f64) {
        self.record.metrics.insert(key.to_string(), value);
    }

    fn set_tag(&mut self, key: &str, value: &str) {
        self.record.tags.insert(key.to_string(), value.to_string());
    }

    fn log_artifact(&mut self, path: &Path) -> Result<()> {
        let Some(name) = path.file_name() else {
            warn!(path = %path.display(), "artifact has no file name");
            return Ok(());
        };
        let target = self.run_dir.join("artifacts").join(name);
        fs::copy(path, &target).with_context(|| format!("copying artifact {}", path.display()))?;
        self.record
            .artifacts
            .push(name.to_string_lossy().into_owned());
        Ok(())
    }

    fn end_run(&mut self, status: RunStatus) -> Result<()> {
        self.record.status = status;
        self.record.ended_at = Some(Utc::now());
        self.flush()?;
        info!(run_id = %self.record.run_id, ?status, "ended run");
        Ok(())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
