pub mod extract;
pub mod fetch;
pub mod merge;
pub mod parse;
pub mod status;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{RunManifest, RunStateManifest, SourceHash};
use crate::util::{
    CacheLayout, ensure_directory, now_utc_string, utc_compact_string, write_json_pretty,
};

const MANIFEST_VERSION: u32 = 1;

/// What a command hands back to be recorded in its run manifest.
#[derive(Debug, Clone)]
pub struct RunReport<C> {
    pub paths: BTreeMap<String, String>,
    pub source_hashes: Vec<SourceHash>,
    pub counts: C,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

impl<C> RunReport<C> {
    pub fn new(counts: C) -> Self {
        Self {
            paths: BTreeMap::new(),
            source_hashes: Vec::new(),
            counts,
            warnings: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn path(&mut self, key: &str, path: &Path) {
        self.paths.insert(key.to_string(), path.display().to_string());
    }

    pub fn warn(&mut self, warning: String) {
        warn!(warning = %warning, "run warning");
        self.warnings.push(warning);
    }
}

#[derive(Debug, Clone)]
pub struct RunContext {
    pub command: String,
    pub run_id: String,
    pub started_at: String,
    pub layout: CacheLayout,
    pub manifest_path: PathBuf,
}

impl RunContext {
    pub fn start(command: &str, cache_root: &Path) -> Result<Self> {
        let started_ts = Utc::now();
        let stamp = utc_compact_string(started_ts);
        let layout = CacheLayout::new(cache_root);
        ensure_directory(&layout.manifest_dir())?;

        let context = Self {
            command: command.to_string(),
            run_id: format!("run-{stamp}"),
            started_at: now_utc_string(),
            manifest_path: layout
                .manifest_dir()
                .join(format!("{command}_run_{stamp}.json")),
            layout,
        };

        context.write_run_state("running", None)?;
        info!(
            command = %context.command,
            run_id = %context.run_id,
            cache_root = %cache_root.display(),
            "starting run"
        );

        Ok(context)
    }

    /// Runs `body` inside a started context: a completed body writes its run
    /// manifest, a failing one marks the run state failed and returns the error.
    pub fn drive<C, F>(command: &str, cache_root: &Path, body: F) -> Result<()>
    where
        C: Serialize,
        F: FnOnce(&RunContext) -> Result<RunReport<C>>,
    {
        let context = Self::start(command, cache_root)?;

        match body(&context) {
            Ok(report) => context.finish(report),
            Err(err) => {
                if let Err(state_err) = context.write_run_state("failed", None) {
                    warn!(error = %state_err, "failed to record failed run state");
                }
                Err(err)
            }
        }
    }

    pub fn finish<C: Serialize>(&self, report: RunReport<C>) -> Result<()> {
        let warning_count = report.warnings.len();
        let mut paths = report.paths;
        paths.insert(
            "cache_root".to_string(),
            self.layout.root().display().to_string(),
        );

        let manifest = RunManifest {
            manifest_version: MANIFEST_VERSION,
            run_id: self.run_id.clone(),
            command: self.command.clone(),
            invocation: std::env::args().collect::<Vec<String>>().join(" "),
            status: "completed".to_string(),
            started_at: self.started_at.clone(),
            updated_at: now_utc_string(),
            paths,
            source_hashes: report.source_hashes,
            counts: report.counts,
            warnings: report.warnings,
            notes: report.notes,
        };

        write_json_pretty(&self.manifest_path, &manifest)?;
        self.write_run_state("completed", Some(warning_count))?;

        info!(
            path = %self.manifest_path.display(),
            warnings = warning_count,
            "wrote run manifest"
        );
        Ok(())
    }

    fn write_run_state(&self, status: &str, warning_count: Option<usize>) -> Result<()> {
        let state = RunStateManifest {
            last_command: Some(self.command.clone()),
            last_run_id: Some(self.run_id.clone()),
            status: Some(status.to_string()),
            started_at: Some(self.started_at.clone()),
            updated_at: Some(now_utc_string()),
            last_manifest_path: (status == "completed")
                .then(|| self.manifest_path.display().to_string()),
            warning_count,
        };

        write_json_pretty(&self.layout.run_state_path(), &state)
    }
}
