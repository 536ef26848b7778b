//! Version check, confirmation, then a staged, digest-verified replacement
//! of the installed component files.
//!
//! ```text
//!   CheckVersion ─▶ AwaitConfirmation ─▶ Stage ─▶ Verify ─▶ Promote ─▶ Cleanup ─▶ Done
//!                          │ declined                                     ▲
//!                          └──────────────────────────────▶ Done (no changes)
//!   any step ─▶ Failed   (only when the staging area cannot be created/removed)
//! ```
//!
//! Per-file problems never abort the run: a file that cannot be fetched is
//! skipped and reported, everything else still syncs.  The version file is
//! the exception: it is promoted last and only when nothing else failed, so
//! the local descriptor never claims a release that is half installed.
//! Two runs must not target the same install directory at the same time;
//! nothing here locks.

use playlist_proto::settings::SyncSettings;
use playlist_proto::version::VersionDescriptor;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::digest::file_digest;
use crate::remote::RemoteSource;
use crate::report::{FileOutcome, FileReport, SyncOutcome, SyncReport};
use crate::staging::{self, StagingArea, SyncError};

/// Result of comparing local and remote descriptors; this is what the user
/// is asked to confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// Same version token on both sides.  Confirming runs a deep check.
    VersionsMatch { version: VersionDescriptor },
    /// Remote differs, or the local version is unknown.
    UpdateAvailable {
        remote: VersionDescriptor,
        local: Option<VersionDescriptor>,
    },
    /// The remote descriptor could not be fetched.
    RemoteUnknown {
        local: Option<VersionDescriptor>,
        reason: String,
    },
}

impl VersionCheck {
    /// A missing local descriptor never matches, whatever the remote says.
    pub fn classify(
        remote: Result<VersionDescriptor, String>,
        local: Option<VersionDescriptor>,
    ) -> Self {
        match (remote, local) {
            (Err(reason), local) => VersionCheck::RemoteUnknown { local, reason },
            (Ok(remote), Some(local)) if remote == local => {
                VersionCheck::VersionsMatch { version: local }
            }
            (Ok(remote), local) => VersionCheck::UpdateAvailable { remote, local },
        }
    }
}

impl fmt::Display for VersionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionCheck::VersionsMatch { version } => write!(
                f,
                "[Info] Versions match (v{}). Run deep file integrity check?",
                version
            ),
            VersionCheck::UpdateAvailable { remote, local } => {
                let current = local
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                write!(
                    f,
                    "[Update] New version available: {} (current: {}). Install?",
                    remote, current
                )
            }
            VersionCheck::RemoteUnknown { reason, .. } => write!(
                f,
                "[Error] Failed to fetch server version: {}. Run deep file integrity check anyway?",
                reason
            ),
        }
    }
}

/// Decides whether a run proceeds past the version check.
pub trait Confirm {
    fn confirm(&mut self, check: &VersionCheck) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&VersionCheck) -> bool,
{
    fn confirm(&mut self, check: &VersionCheck) -> bool {
        self(check)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    CheckVersion,
    AwaitConfirmation,
    Stage,
    Verify,
    Promote,
    Cleanup,
    Done,
}

/// Paths and file set for one installation.
#[derive(Debug, Clone)]
pub struct SyncLayout {
    pub install_dir: PathBuf,
    pub staging_root: PathBuf,
    pub version_file: String,
    pub components: Vec<String>,
}

impl SyncLayout {
    pub fn from_settings(install_dir: impl Into<PathBuf>, settings: &SyncSettings) -> Self {
        Self {
            install_dir: install_dir.into(),
            staging_root: settings.staging_root.clone(),
            version_file: settings.version_file.clone(),
            components: settings.components.clone(),
        }
    }

    pub fn local_version_path(&self) -> PathBuf {
        self.install_dir.join(&self.version_file)
    }

    pub fn local_path(&self, name: &str) -> PathBuf {
        self.install_dir.join(name)
    }
}

/// Component names must stay inside the install directory.
fn is_plain_relative(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

enum Verdict {
    Unchanged,
    Changed,
    New,
}

pub struct SyncEngine<S> {
    source: S,
    layout: SyncLayout,
}

impl<S: RemoteSource> SyncEngine<S> {
    pub fn new(source: S, layout: SyncLayout) -> Self {
        Self { source, layout }
    }

    pub fn layout(&self) -> &SyncLayout {
        &self.layout
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Missing or unreadable local descriptor reads as `None`.
    pub fn read_local_version(&self) -> Option<VersionDescriptor> {
        let path = self.layout.local_version_path();
        match VersionDescriptor::read_from(&path) {
            Ok(desc) => Some(desc),
            Err(e) => {
                warn!("sync: local version {} unavailable: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn check_version(&self) -> VersionCheck {
        let remote = self.source.fetch_version().await.map_err(|e| {
            warn!("sync: remote version unavailable: {}", e);
            e.to_string()
        });
        let check = VersionCheck::classify(remote, self.read_local_version());
        info!("sync: version check: {:?}", check);
        check
    }

    pub async fn sync<C: Confirm>(&self, confirm: &mut C) -> Result<SyncReport, SyncError> {
        enter(SyncPhase::CheckVersion);
        let check = self.check_version().await;

        enter(SyncPhase::AwaitConfirmation);
        if !confirm.confirm(&check) {
            info!("sync: declined, nothing changed");
            enter(SyncPhase::Done);
            return Ok(SyncReport::declined(check));
        }

        enter(SyncPhase::Stage);
        let staging = StagingArea::create(&self.layout.staging_root).await?;
        let files = self.stage_verify_promote(&staging).await;

        enter(SyncPhase::Cleanup);
        staging.remove().await?;

        enter(SyncPhase::Done);
        let report = SyncReport {
            check,
            outcome: SyncOutcome::Completed,
            files,
        };
        info!(
            "sync: done, {} changed, fully synced: {}",
            report.changed(),
            report.is_fully_synced()
        );
        Ok(report)
    }

    /// Runs Stage, Verify and Promote over the whole file set.  Reports come
    /// back in file-set order.
    async fn stage_verify_promote(&self, staging: &StagingArea) -> Vec<FileReport> {
        let staged = self.stage(staging).await;

        enter(SyncPhase::Verify);
        let mut pending = Vec::with_capacity(staged.len());
        for (name, result) in staged {
            let verdict = match result {
                Ok(path) => self.verify(&name, path).await,
                Err(reason) => Err(FileOutcome::FetchFailed(reason)),
            };
            pending.push((name, verdict));
        }

        enter(SyncPhase::Promote);
        let version_at = pending
            .iter()
            .position(|(name, _)| *name == self.layout.version_file);
        let mut reports: Vec<Option<FileReport>> = vec![None; pending.len()];
        let mut held_back = None;
        for (i, (name, verdict)) in pending.into_iter().enumerate() {
            if Some(i) == version_at {
                held_back = Some((i, name, verdict));
                continue;
            }
            let outcome = self.promote_one(&name, verdict).await;
            reports[i] = Some(FileReport { name, outcome });
        }

        // The version file goes last, and only over a fully synced set, so a
        // partial run is still seen as outdated next time.
        if let Some((i, name, verdict)) = held_back {
            let failed = reports
                .iter()
                .flatten()
                .filter(|r| r.outcome.is_failure())
                .count();
            let outcome = match verdict {
                Ok((Verdict::Changed | Verdict::New, _)) if failed > 0 => {
                    warn!("sync: {} held back, {} file(s) failed", name, failed);
                    FileOutcome::Deferred
                }
                verdict => self.promote_one(&name, verdict).await,
            };
            reports[i] = Some(FileReport { name, outcome });
        }
        reports.into_iter().flatten().collect()
    }

    async fn promote_one(
        &self,
        name: &str,
        verdict: Result<(Verdict, PathBuf), FileOutcome>,
    ) -> FileOutcome {
        let (verdict, staged_path) = match verdict {
            Ok((Verdict::Unchanged, _)) => {
                info!("sync: {} is up to date", name);
                return FileOutcome::Unchanged;
            }
            Ok(staged) => staged,
            Err(outcome) => return outcome,
        };
        let target = self.layout.local_path(name);
        match staging::promote(staged_path, target).await {
            Ok(()) if matches!(verdict, Verdict::New) => {
                info!("sync: {} installed", name);
                FileOutcome::NewlyInstalled
            }
            Ok(()) => {
                info!("sync: {} updated", name);
                FileOutcome::Updated
            }
            Err(e) => {
                warn!("sync: {} could not be replaced: {}", name, e);
                FileOutcome::PromoteFailed(e.to_string())
            }
        }
    }

    async fn stage(&self, staging: &StagingArea) -> Vec<(String, Result<PathBuf, String>)> {
        let mut staged = Vec::with_capacity(self.layout.components.len());
        for name in &self.layout.components {
            let result = self.stage_one(staging, name).await;
            if let Err(reason) = &result {
                warn!("sync: {} skipped: {}", name, reason);
            }
            staged.push((name.clone(), result));
        }
        staged
    }

    async fn stage_one(&self, staging: &StagingArea, name: &str) -> Result<PathBuf, String> {
        if !is_plain_relative(name) {
            return Err(format!("'{}' is not a relative file name", name));
        }
        let bytes = self
            .source
            .fetch_file(name)
            .await
            .map_err(|e| e.to_string())?;
        debug!("sync: staged {} ({} bytes)", name, bytes.len());
        staging
            .put(name, &bytes)
            .await
            .map_err(|e| format!("staging write failed: {}", e))
    }

    /// Compare the staged copy with the installed one by digest.  An
    /// unreadable local copy counts as changed.
    async fn verify(
        &self,
        name: &str,
        staged: PathBuf,
    ) -> Result<(Verdict, PathBuf), FileOutcome> {
        let staged_digest = file_digest(&staged)
            .await
            .map_err(|e| FileOutcome::FetchFailed(format!("staged copy unreadable: {}", e)))?;

        let local = self.layout.local_path(name);
        if !local.exists() {
            debug!("sync: {} has no local copy", name);
            return Ok((Verdict::New, staged));
        }
        let verdict = match file_digest(&local).await {
            Ok(local_digest) if local_digest == staged_digest => Verdict::Unchanged,
            Ok(local_digest) => {
                debug!(
                    "sync: {} differs (local {} remote {})",
                    name, local_digest, staged_digest
                );
                Verdict::Changed
            }
            Err(e) => {
                warn!("sync: cannot hash local {}: {}", local.display(), e);
                Verdict::Changed
            }
        };
        Ok((verdict, staged))
    }
}

fn enter(phase: SyncPhase) {
    debug!("sync: phase {:?}", phase);
}
