//! JSON run reports on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ConvoyError, Result};
use crate::runner::{DeploymentRun, RunId};

/// A directory of run reports, one `<run id>.json` per run.
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `~/.convoy/runs`
    pub fn default_dir() -> Result<PathBuf> {
        Self::runs_under(dirs::home_dir())
    }

    fn runs_under(home: Option<PathBuf>) -> Result<PathBuf> {
        home.map(|home| home.join(".convoy").join("runs"))
            .ok_or_else(|| ConvoyError::HistoryError {
                path: PathBuf::from(".convoy/runs"),
                message: "no home directory; set settings.history_dir".to_string(),
            })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn error(path: &Path, e: impl ToString) -> ConvoyError {
        ConvoyError::HistoryError {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    }

    fn path_for(&self, id: &RunId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write a run report.
    ///
    /// Uses the write-to-temp-then-rename pattern so a crash never leaves a
    /// half-written report behind.
    pub fn save(&self, run: &DeploymentRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::error(&self.dir, e))?;

        let path = self.path_for(run.id());
        let json = run.to_json().map_err(|e| Self::error(&path, e))?;

        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json).map_err(|e| Self::error(&temp_path, e))?;
        fs::rename(&temp_path, &path).map_err(|e| Self::error(&path, e))?;

        debug!("saved run report to {}", path.display());
        Ok(path)
    }

    /// Load one run by id.
    pub fn load(&self, id: &RunId) -> Result<DeploymentRun> {
        Self::read(&self.path_for(id))
    }

    fn read(path: &Path) -> Result<DeploymentRun> {
        let content = fs::read_to_string(path).map_err(|e| Self::error(path, e))?;
        serde_json::from_str(&content).map_err(|e| Self::error(path, e))
    }

    /// Report files, newest first.
    fn entries(&self) -> Result<Vec<(RunId, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<_> = fs::read_dir(&self.dir)
            .map_err(|e| Self::error(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let id = RunId::parse(path.file_stem()?.to_str()?)?;
                (path.extension()? == "json").then_some((id, path))
            })
            .collect();

        entries.sort_by(|(a, pa), (b, pb)| b.timestamp().cmp(&a.timestamp()).then(pb.cmp(pa)));
        Ok(entries)
    }

    /// Up to `limit` runs, newest first. Unreadable reports are skipped.
    pub fn list(&self, limit: usize) -> Result<Vec<DeploymentRun>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter_map(|(_, path)| match Self::read(&path) {
                Ok(run) => Some(run),
                Err(e) => {
                    warn!("skipping unreadable run report: {}", e);
                    None
                }
            })
            .take(limit)
            .collect())
    }

    /// The most recent run, if any.
    pub fn latest(&self) -> Result<Option<DeploymentRun>> {
        Ok(self.list(1)?.into_iter().next())
    }

    /// Delete all but the newest `retention` reports. Returns how many were removed.
    pub fn prune(&self, retention: usize) -> Result<usize> {
        let mut removed = 0;
        for (_, path) in self.entries()?.into_iter().skip(retention) {
            fs::remove_file(&path).map_err(|e| Self::error(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{HostReport, HostState};
    use chrono::{Duration, Utc};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn default_dir_needs_a_home_directory() {
        let err = RunStore::runs_under(None).unwrap_err();
        assert!(matches!(err, ConvoyError::HistoryError { .. }));
        assert!(err.to_string().contains("history_dir"));

        let dir = RunStore::runs_under(Some(PathBuf::from("/home/deploy"))).unwrap();
        assert_eq!(dir, PathBuf::from("/home/deploy/.convoy/runs"));
    }

    fn run_at(offset_secs: i64, state: HostState) -> DeploymentRun {
        let started = Utc::now() - Duration::seconds(offset_secs);
        let mut report = HostReport::pending("web1", "10.0.0.1");
        report.state = state;
        let id_text = format!("run_{}_00112233445566{:02x}", started.timestamp_millis(), offset_secs);
        let id = RunId::parse(&id_text).unwrap();
        DeploymentRun::new(
            id,
            started,
            BTreeMap::from([("web1".to_string(), report)]),
            false,
            None,
        )
    }

    #[test]
    fn save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path().join("runs"));
        let run = run_at(0, HostState::Succeeded);

        let path = store.save(&run).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(store.load(run.id()).unwrap(), run);
    }

    #[test]
    fn latest_is_newest() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        store.save(&run_at(30, HostState::Succeeded)).unwrap();
        let newest = run_at(1, HostState::RolledBack);
        store.save(&newest).unwrap();
        store.save(&run_at(20, HostState::Failed)).unwrap();

        assert_eq!(store.latest().unwrap().unwrap().id(), newest.id());
        let listed = store.list(10).unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].started_at() > listed[1].started_at());
    }

    #[test]
    fn empty_or_missing_dir_has_no_runs() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path().join("nope"));
        assert!(store.latest().unwrap().is_none());
        assert_eq!(store.prune(1).unwrap(), 0);
    }

    #[test]
    fn prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        for offset in [50, 40, 30, 20, 10] {
            store.save(&run_at(offset, HostState::Succeeded)).unwrap();
        }

        assert_eq!(store.prune(2).unwrap(), 3);
        let left = store.list(10).unwrap();
        assert_eq!(left.len(), 2);
        assert!(left.iter().all(|r| r.started_at() > Utc::now() - Duration::seconds(25)));
    }

    #[test]
    fn corrupt_reports_are_skipped() {
        let temp = TempDir::new().unwrap();
        let store = RunStore::new(temp.path());
        let good = run_at(10, HostState::Succeeded);
        store.save(&good).unwrap();
        let bad = RunId::new();
        fs::write(temp.path().join(format!("{}.json", bad)), "{not json").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignore me").unwrap();

        let runs = store.list(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id(), good.id());
    }
}
