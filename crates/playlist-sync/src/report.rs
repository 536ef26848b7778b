use std::fmt;

use crate::engine::VersionCheck;

/// What happened to one component file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Local copy differed and was replaced.
    Updated,
    /// Digests matched; local copy left alone.
    Unchanged,
    /// No local copy existed; the remote copy was installed.
    NewlyInstalled,
    /// The remote copy could not be fetched; skipped this run.
    FetchFailed(String),
    /// Fetched and found different, but the replacement failed.  The old
    /// local copy is still in place.
    PromoteFailed(String),
    /// The version file was not replaced because another file failed.  The
    /// old descriptor stays so the next run still offers the update.
    Deferred,
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, FileOutcome::FetchFailed(_) | FileOutcome::PromoteFailed(_))
    }

    pub fn changed_local(&self) -> bool {
        matches!(self, FileOutcome::Updated | FileOutcome::NewlyInstalled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The confirmation was declined; nothing was touched.
    Declined,
    /// Every file in the set was processed (some may have failed).
    Completed,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub check: VersionCheck,
    pub outcome: SyncOutcome,
    pub files: Vec<FileReport>,
}

impl SyncReport {
    pub fn declined(check: VersionCheck) -> Self {
        Self {
            check,
            outcome: SyncOutcome::Declined,
            files: Vec::new(),
        }
    }

    pub fn outcome_of(&self, name: &str) -> Option<&FileOutcome> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.outcome)
    }

    pub fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| *o == FileOutcome::Updated)
    }

    pub fn changed(&self) -> usize {
        self.count(FileOutcome::changed_local)
    }

    /// True when the run completed and no file failed.
    pub fn is_fully_synced(&self) -> bool {
        self.outcome == SyncOutcome::Completed && self.count(FileOutcome::is_failure) == 0
    }
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            FileOutcome::Updated => write!(f, "[Update] {} has changed, replaced", self.name),
            FileOutcome::Unchanged => write!(f, "[Info] {} is up to date", self.name),
            FileOutcome::NewlyInstalled => write!(f, "[Update] {} installed", self.name),
            FileOutcome::FetchFailed(reason) => {
                write!(f, "[Error] {} could not be fetched: {}", self.name, reason)
            }
            FileOutcome::PromoteFailed(reason) => {
                write!(f, "[Error] {} could not be replaced: {}", self.name, reason)
            }
            FileOutcome::Deferred => write!(
                f,
                "[Warning] {} kept at the old version until every file syncs",
                self.name
            ),
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.outcome == SyncOutcome::Declined {
            return write!(f, "[Info] Update skipped, no files changed.");
        }
        for file in &self.files {
            writeln!(f, "{}", file)?;
        }
        if self.is_fully_synced() {
            write!(
                f,
                "[Success] Verification complete. {} of {} files changed.",
                self.changed(),
                self.files.len()
            )
        } else {
            write!(
                f,
                "[Warning] Verification finished with {} failed file(s).",
                self.count(FileOutcome::is_failure)
            )
        }
    }
}
