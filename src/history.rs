use crate::errors::*;
use std::fs;
use std::path::{Path, PathBuf};

pub const GO_MOD: &str = "go.mod";
pub const GO_SUM: &str = "go.sum";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub go_mod: String,
    pub go_sum: String,
    pub action: String,
}

/// Snapshots of `go.mod` and `go.sum`, oldest first.
///
/// Index 0 is the state found before anything was touched. While a history
/// exists it is the only thing that writes those two files.
#[derive(Debug)]
pub struct History {
    revisions: Vec<Revision>,
    dir: PathBuf,
}

impl History {
    pub fn build(dir: &Path) -> Result<Self> {
        let mut history = Self {
            revisions: Vec::new(),
            dir: dir.to_path_buf(),
        };
        history.push_revision("initial")?;
        Ok(history)
    }

    pub fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    fn read(&self, file: &str) -> Result<String> {
        let path = self.dir.join(file);
        fs::read_to_string(&path).with_context(|| anyhow!("Failed to read {:?}", path))
    }

    fn write(&self, file: &str, content: &str) -> Result<()> {
        let path = self.dir.join(file);
        fs::write(&path, content).with_context(|| anyhow!("Failed to write {:?}", path))
    }

    /// Captures the current files and returns the index of the new revision.
    pub fn push_revision(&mut self, action: impl Into<String>) -> Result<usize> {
        let revision = Revision {
            go_mod: self.read(GO_MOD)?,
            go_sum: self.read(GO_SUM)?,
            action: action.into(),
        };
        trace!("Pushing revision {}: {:?}", self.revisions.len(), revision.action);
        self.revisions.push(revision);
        Ok(self.revisions.len() - 1)
    }

    fn apply_revision(&self) -> Result<()> {
        let revision = self
            .revisions
            .last()
            .context("History has no revisions to apply")?;
        self.write(GO_MOD, &revision.go_mod)?;
        self.write(GO_SUM, &revision.go_sum)?;
        Ok(())
    }

    /// Drops the newest revision and restores the one below it.
    pub fn undo(&mut self) -> Result<()> {
        if self.revisions.len() < 2 {
            return Err(HistoryError::InvalidRevision {
                index: 0,
                len: self.revisions.len(),
            }
            .into());
        }
        self.revisions.pop();
        self.apply_revision()
    }

    /// Discards every revision above `index` and restores `index` to disk.
    pub fn goto_revision(&mut self, index: usize) -> Result<()> {
        let len = self.revisions.len();
        if index >= len {
            return Err(HistoryError::InvalidRevision { index, len }.into());
        }
        debug!(
            "Restoring revision {} ({:?})",
            index, self.revisions[index].action
        );
        self.revisions.truncate(index + 1);
        self.apply_revision()
    }

    /// Restores `index` after `cause` interrupted a change. If that fails
    /// too, both errors are returned together.
    pub fn rollback_after_error(&mut self, index: usize, cause: Error) -> Error {
        match self.goto_revision(index) {
            Ok(()) => cause,
            Err(rollback) => RollbackError { cause, rollback }.into(),
        }
    }
}
