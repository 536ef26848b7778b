//! End-to-end sync runs against an in-memory remote and a temp install dir.

use playlist_proto::version::VersionDescriptor;
use playlist_sync::remote::{FetchError, RemoteSource};
use playlist_sync::staging::{StagingArea, STAGING_PREFIX};
use playlist_sync::{FileOutcome, SyncEngine, SyncError, SyncLayout, VersionCheck};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

const COMPONENTS: [&str; 4] = ["gui_config.py", "run_mpv.py", "playlistupd.py", "version.json"];

#[derive(Default)]
struct FakeRemote {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    offline_version: Mutex<bool>,
}

impl FakeRemote {
    fn with_release(version: &str) -> Self {
        let remote = FakeRemote::default();
        remote.publish(version, "v1");
        remote
    }

    /// Publish every component with content tagged by `tag`.
    fn publish(&self, version: &str, tag: &str) {
        let mut files = self.files.lock().unwrap();
        for name in COMPONENTS {
            let body = if name == "version.json" {
                format!("{{\"version\": \"{}\"}}", version).into_bytes()
            } else {
                format!("# {} {}\n", name, tag).into_bytes()
            };
            files.insert(name.to_string(), body);
        }
    }

    fn set_file(&self, name: &str, body: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), body.to_vec());
    }

    fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    fn go_offline_for_version(&self) {
        *self.offline_version.lock().unwrap() = true;
    }

    fn not_found(name: &str) -> FetchError {
        FetchError::Status {
            url: format!("https://fake.invalid/{}", name),
            status: 404,
        }
    }
}

impl RemoteSource for FakeRemote {
    async fn fetch_version(&self) -> Result<VersionDescriptor, FetchError> {
        if *self.offline_version.lock().unwrap() {
            return Err(Self::not_found("version.json"));
        }
        let bytes = self.fetch_file("version.json").await?;
        Ok(VersionDescriptor::from_slice(&bytes)?)
    }

    async fn fetch_file(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(Self::not_found(name));
        }
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))
    }
}

fn layout(root: &Path) -> SyncLayout {
    SyncLayout {
        install_dir: root.join("install"),
        staging_root: root.join("staging"),
        version_file: "version.json".into(),
        components: COMPONENTS.iter().map(|s| s.to_string()).collect(),
    }
}

fn snapshot(dir: &Path) -> HashMap<String, Vec<u8>> {
    COMPONENTS
        .iter()
        .filter_map(|name| {
            std::fs::read(dir.join(name))
                .ok()
                .map(|bytes| (name.to_string(), bytes))
        })
        .collect()
}

/// Every staging directory under the root has been removed.
fn assert_no_staging_left(layout: &SyncLayout) {
    let left: Vec<_> = std::fs::read_dir(&layout.staging_root)
        .map(|entries| entries.map(|e| e.unwrap().file_name()).collect())
        .unwrap_or_default();
    assert!(left.is_empty(), "staging leftovers: {:?}", left);
}

fn always_yes(_: &VersionCheck) -> bool {
    true
}

#[tokio::test]
async fn first_run_installs_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());

    let mut seen = Vec::new();
    let report = engine
        .sync(&mut |check: &VersionCheck| {
            seen.push(check.clone());
            true
        })
        .await
        .unwrap();

    assert_eq!(seen.len(), 1);
    assert!(matches!(
        &seen[0],
        VersionCheck::UpdateAvailable { local: None, remote } if remote.version == "1.0"
    ));
    assert!(report.is_fully_synced());
    assert_eq!(report.files.len(), COMPONENTS.len());
    for name in COMPONENTS {
        assert_eq!(report.outcome_of(name), Some(&FileOutcome::NewlyInstalled));
    }
    assert_eq!(
        std::fs::read(layout.install_dir.join("run_mpv.py")).unwrap(),
        b"# run_mpv.py v1\n"
    );
    assert_no_staging_left(&layout);

    // The synced version file now matches the remote one.
    let local = VersionDescriptor::read_from(&layout.local_version_path()).unwrap();
    assert_eq!(local, VersionDescriptor::new("1.0"));
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());

    engine.sync(&mut always_yes).await.unwrap();
    let after_first = snapshot(&layout.install_dir);

    let mut seen = Vec::new();
    let second = engine
        .sync(&mut |check: &VersionCheck| {
            seen.push(check.clone());
            true
        })
        .await
        .unwrap();

    assert!(matches!(&seen[0], VersionCheck::VersionsMatch { .. }));
    assert_eq!(second.updated(), 0);
    assert_eq!(second.changed(), 0);
    for name in COMPONENTS {
        assert_eq!(second.outcome_of(name), Some(&FileOutcome::Unchanged));
    }
    assert_eq!(snapshot(&layout.install_dir), after_first);
    assert_no_staging_left(&layout);
}

#[tokio::test]
async fn only_changed_files_are_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let remote = FakeRemote::with_release("1.0");
    remote.set_file("run_mpv.py", b"# patched\n");
    let engine = SyncEngine::new(remote, layout.clone());

    // Install an older copy of everything first.
    std::fs::create_dir_all(&layout.install_dir).unwrap();
    for name in ["gui_config.py", "playlistupd.py"] {
        std::fs::write(
            layout.install_dir.join(name),
            format!("# {} v1\n", name),
        )
        .unwrap();
    }
    std::fs::write(layout.install_dir.join("run_mpv.py"), b"# original\n").unwrap();
    VersionDescriptor::new("0.9")
        .write_to(&layout.local_version_path())
        .unwrap();

    let report = engine.sync(&mut always_yes).await.unwrap();

    assert_eq!(report.outcome_of("run_mpv.py"), Some(&FileOutcome::Updated));
    assert_eq!(report.outcome_of("version.json"), Some(&FileOutcome::Updated));
    assert_eq!(report.outcome_of("gui_config.py"), Some(&FileOutcome::Unchanged));
    assert_eq!(report.outcome_of("playlistupd.py"), Some(&FileOutcome::Unchanged));
    assert_eq!(
        std::fs::read(layout.install_dir.join("run_mpv.py")).unwrap(),
        b"# patched\n"
    );
}

#[tokio::test]
async fn one_failed_fetch_does_not_stop_the_rest() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    std::fs::create_dir_all(&layout.install_dir).unwrap();
    std::fs::write(layout.install_dir.join("gui_config.py"), b"# keep me\n").unwrap();

    let remote = FakeRemote::with_release("2.0");
    remote.fail("gui_config.py");
    let engine = SyncEngine::new(remote, layout.clone());

    let report = engine.sync(&mut always_yes).await.unwrap();

    assert!(!report.is_fully_synced());
    assert!(matches!(
        report.outcome_of("gui_config.py"),
        Some(FileOutcome::FetchFailed(reason)) if reason.contains("404")
    ));
    for name in ["run_mpv.py", "playlistupd.py"] {
        assert_eq!(report.outcome_of(name), Some(&FileOutcome::NewlyInstalled));
    }
    assert_eq!(report.outcome_of("version.json"), Some(&FileOutcome::Deferred));
    assert!(!layout.local_version_path().exists());
    assert_eq!(
        std::fs::read(layout.install_dir.join("gui_config.py")).unwrap(),
        b"# keep me\n"
    );
    assert_no_staging_left(&layout);
}

#[tokio::test]
async fn declining_changes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let engine = SyncEngine::new(FakeRemote::with_release("3.0"), layout.clone());

    let report = engine.sync(&mut |_: &VersionCheck| false).await.unwrap();

    assert_eq!(report.outcome, playlist_sync::report::SyncOutcome::Declined);
    assert!(report.files.is_empty());
    assert!(!layout.install_dir.exists());
    assert_no_staging_left(&layout);
}

#[tokio::test]
async fn unreachable_version_still_allows_a_deep_check() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let remote = FakeRemote::with_release("1.0");
    remote.go_offline_for_version();
    let engine = SyncEngine::new(remote, layout.clone());

    let mut seen = Vec::new();
    let report = engine
        .sync(&mut |check: &VersionCheck| {
            seen.push(check.clone());
            true
        })
        .await
        .unwrap();

    assert!(matches!(
        &seen[0],
        VersionCheck::RemoteUnknown { local: None, .. }
    ));
    assert!(report.is_fully_synced());
    assert_eq!(report.changed(), COMPONENTS.len());
}

#[tokio::test]
async fn stale_staging_leftovers_are_cleared() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let stale = layout
        .staging_root
        .join(format!("{}interrupted", STAGING_PREFIX));
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("run_mpv.py"), b"half a downl").unwrap();

    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());
    let report = engine.sync(&mut always_yes).await.unwrap();

    assert_eq!(report.outcome_of("run_mpv.py"), Some(&FileOutcome::NewlyInstalled));
    assert_eq!(
        std::fs::read(layout.install_dir.join("run_mpv.py")).unwrap(),
        b"# run_mpv.py v1\n"
    );
    assert_no_staging_left(&layout);
}

#[tokio::test]
async fn staging_failure_is_fatal_and_touches_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let mut layout = layout(tmp.path());
    let blocker = tmp.path().join("blocker");
    std::fs::write(&blocker, b"file, not dir").unwrap();
    layout.staging_root = blocker.join("staging");

    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());
    let err = engine.sync(&mut always_yes).await.unwrap_err();

    assert!(matches!(err, SyncError::Staging { .. }));
    assert!(!layout.install_dir.exists());
}

#[tokio::test]
async fn interrupted_before_promote_leaves_old_files() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    let installed = layout.install_dir.join("run_mpv.py");
    std::fs::create_dir_all(&layout.install_dir).unwrap();
    std::fs::write(&installed, b"# old but complete\n").unwrap();

    {
        let staging = StagingArea::create(&layout.staging_root).await.unwrap();
        staging
            .put("run_mpv.py", b"# new content that never gets promoted\n")
            .await
            .unwrap();
        // Run is abandoned here: the staging area goes out of scope unpromoted.
    }

    assert_eq!(std::fs::read(&installed).unwrap(), b"# old but complete\n");
    assert_no_staging_left(&layout);
    let entries: Vec<_> = std::fs::read_dir(&layout.install_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("run_mpv.py")]);
}

/// Installs release 1.0 of every component.
async fn install_release(layout: &SyncLayout) {
    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());
    let report = engine.sync(&mut always_yes).await.unwrap();
    assert!(report.is_fully_synced());
}

#[tokio::test]
async fn partial_update_keeps_old_version_descriptor() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    install_release(&layout).await;

    let remote = FakeRemote::default();
    remote.publish("2.0", "v2");
    remote.fail("run_mpv.py");
    let engine = SyncEngine::new(remote, layout.clone());
    let report = engine.sync(&mut always_yes).await.unwrap();

    assert!(matches!(
        report.outcome_of("run_mpv.py"),
        Some(FileOutcome::FetchFailed(_))
    ));
    assert_eq!(report.outcome_of("gui_config.py"), Some(&FileOutcome::Updated));
    assert_eq!(report.outcome_of("version.json"), Some(&FileOutcome::Deferred));
    let local = VersionDescriptor::read_from(&layout.local_version_path()).unwrap();
    assert_eq!(local.version, "1.0");
    assert_eq!(
        std::fs::read(layout.install_dir.join("run_mpv.py")).unwrap(),
        b"# run_mpv.py v1\n"
    );

    // Once the missing file is reachable the update is still offered.
    engine.source().failing.lock().unwrap().clear();
    let mut seen = Vec::new();
    let retry = engine
        .sync(&mut |check: &VersionCheck| {
            seen.push(check.clone());
            true
        })
        .await
        .unwrap();
    assert!(matches!(
        &seen[0],
        VersionCheck::UpdateAvailable { local: Some(l), .. } if l.version == "1.0"
    ));
    assert!(retry.is_fully_synced());
    assert_eq!(retry.outcome_of("run_mpv.py"), Some(&FileOutcome::Updated));
    assert_eq!(retry.outcome_of("version.json"), Some(&FileOutcome::Updated));
}

#[tokio::test]
async fn failed_replacement_is_reported_and_leaves_target() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    // A directory where a file should be: hashing fails and the rename over
    // it fails too.
    let blocked = layout.install_dir.join("run_mpv.py");
    std::fs::create_dir_all(&blocked).unwrap();
    std::fs::write(blocked.join("inner"), b"old").unwrap();

    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());
    let report = engine.sync(&mut always_yes).await.unwrap();

    assert!(matches!(
        report.outcome_of("run_mpv.py"),
        Some(FileOutcome::PromoteFailed(_))
    ));
    assert!(!report.is_fully_synced());
    assert_eq!(report.outcome_of("gui_config.py"), Some(&FileOutcome::NewlyInstalled));
    assert_eq!(report.outcome_of("version.json"), Some(&FileOutcome::Deferred));
    assert!(blocked.is_dir());
    assert_eq!(std::fs::read(blocked.join("inner")).unwrap(), b"old");
    let stray: Vec<_> = std::fs::read_dir(&layout.install_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with('.'))
        .collect();
    assert!(stray.is_empty(), "temp files left: {:?}", stray);
    assert_no_staging_left(&layout);
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_local_copy_is_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = layout(tmp.path());
    install_release(&layout).await;

    // A symlink to a directory exists but cannot be hashed.
    let target = layout.install_dir.join("gui_config.py");
    std::fs::remove_file(&target).unwrap();
    let elsewhere = tmp.path().join("elsewhere");
    std::fs::create_dir_all(&elsewhere).unwrap();
    std::os::unix::fs::symlink(&elsewhere, &target).unwrap();

    let engine = SyncEngine::new(FakeRemote::with_release("1.0"), layout.clone());
    let report = engine.sync(&mut always_yes).await.unwrap();

    assert_eq!(report.outcome_of("gui_config.py"), Some(&FileOutcome::Updated));
    assert_eq!(report.outcome_of("run_mpv.py"), Some(&FileOutcome::Unchanged));
    assert!(report.is_fully_synced());
    assert!(std::fs::symlink_metadata(&target).unwrap().is_file());
    assert_eq!(std::fs::read(&target).unwrap(), b"# gui_config.py v1\n");
    assert!(elsewhere.is_dir());
}
