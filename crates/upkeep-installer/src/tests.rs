use super::*;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use upkeep_core::{ArchiveType, InstallMode};
use upkeep_security::{sha256_hex, verify_artifact, VerifiedArtifact};
use upkeep_store::SettingsStore;

use crate::dispatch::{dispatch_install_with_extractor, installer_command};
use crate::extract::extract_archive_with_runner;

#[derive(Default)]
struct RecordingLauncher {
    launches: Vec<(PathBuf, Vec<OsString>)>,
    fail: bool,
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&mut self, program: &Path, args: &[OsString]) -> anyhow::Result<u32> {
        if self.fail {
            return Err(anyhow!("spawn refused"));
        }
        self.launches.push((program.to_path_buf(), args.to_vec()));
        Ok(4242)
    }
}

struct Fixture {
    root: PathBuf,
    layout: UpdateLayout,
    store: SettingsStore,
    target: InstallTarget,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let root = test_root(name);
        let layout = UpdateLayout::new(root.join("data"));
        layout.ensure_base_dirs().expect("must create layout");
        let store = SettingsStore::open_in_memory().expect("must open store");
        store.initialize().expect("must init store");

        let updater_path = root.join("bin").join("updater");
        fs::create_dir_all(updater_path.parent().expect("parent")).expect("must create bin");
        fs::write(&updater_path, b"#!/bin/sh\n").expect("must write updater");

        let target = InstallTarget {
            install_dir: root.join("app"),
            updater_path,
            exit_after_installer: true,
        };
        Self {
            root,
            layout,
            store,
            target,
        }
    }

    fn artifact(&self, archive_type: ArchiveType, contents: &[u8]) -> VerifiedArtifact {
        let path = self.layout.artifact_path("2.0.0", archive_type);
        fs::create_dir_all(path.parent().expect("parent")).expect("must create download dir");
        fs::write(&path, contents).expect("must write artifact");
        verify_artifact(&path, &[sha256_hex(contents)]).expect("must verify")
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn fake_extract(
    _archive: &Path,
    _archive_type: ArchiveType,
    staging: &Path,
    _tmp: &Path,
) -> anyhow::Result<usize> {
    fs::create_dir_all(staging)?;
    fs::write(staging.join("app.bin"), b"new build")?;
    Ok(1)
}

#[test]
fn archive_install_stages_records_and_launches_updater() {
    let fixture = Fixture::new("archive-install");
    let artifact = fixture.artifact(ArchiveType::Zip, b"zip bytes");
    let mut launcher = RecordingLauncher::default();

    let outcome = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Archive,
            artifact: &artifact,
            archive_type: ArchiveType::Zip,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect("archive install must succeed");

    let staging = fixture.layout.staging_dir("2.0.0");
    assert_eq!(
        outcome,
        InstallOutcome::UpdaterLaunched {
            staging_dir: staging.clone(),
            pid: 4242
        }
    );
    assert!(outcome.exit_host());
    assert!(staging.join("app.bin").is_file());
    assert_eq!(
        fixture.store.pending_update().expect("must read pending"),
        Some(staging.clone())
    );

    assert_eq!(launcher.launches.len(), 1);
    let (program, args) = &launcher.launches[0];
    assert_eq!(program, &fixture.target.updater_path);
    assert_eq!(
        args,
        &vec![
            OsString::from(staging.as_os_str()),
            OsString::from(fixture.target.install_dir.as_os_str())
        ]
    );
}

#[test]
fn archive_install_reuses_pending_staging_directory() {
    let fixture = Fixture::new("archive-reuse");
    let previous = fixture.layout.staging_dir("1.9.0");
    fixture
        .store
        .set_pending_update(&previous)
        .expect("must record pending");
    let artifact = fixture.artifact(ArchiveType::TarGz, b"tarball");
    let mut launcher = RecordingLauncher::default();

    let outcome = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Archive,
            artifact: &artifact,
            archive_type: ArchiveType::TarGz,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect("archive install must succeed");

    match outcome {
        InstallOutcome::UpdaterLaunched { staging_dir, .. } => assert_eq!(staging_dir, previous),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(previous.join("app.bin").is_file());
    assert!(!fixture.layout.staging_dir("2.0.0").exists());
}

#[test]
fn archive_install_requires_updater_executable() {
    let fixture = Fixture::new("archive-missing-updater");
    fs::remove_file(&fixture.target.updater_path).expect("must remove updater");
    let artifact = fixture.artifact(ArchiveType::Zip, b"zip bytes");
    let mut launcher = RecordingLauncher::default();

    let err = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Archive,
            artifact: &artifact,
            archive_type: ArchiveType::Zip,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect_err("missing updater must fail");

    assert!(matches!(err, InstallError::MissingUpdater(_)));
    assert!(launcher.launches.is_empty());
    assert!(artifact.path().is_file(), "artifact must survive failure");
    assert_eq!(fixture.store.pending_update().expect("pending"), None);
}

#[test]
fn archive_mode_rejects_non_archive_artifacts() {
    let fixture = Fixture::new("archive-not-archive");
    let artifact = fixture.artifact(ArchiveType::Exe, b"MZ");
    let mut launcher = RecordingLauncher::default();

    let err = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Archive,
            artifact: &artifact,
            archive_type: ArchiveType::Exe,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect_err("exe is not an archive");
    assert!(matches!(err, InstallError::NotAnArchive("exe")));
}

#[test]
fn extraction_failure_keeps_artifact_and_skips_launch() {
    let fixture = Fixture::new("archive-extract-fail");
    let artifact = fixture.artifact(ArchiveType::Zip, b"corrupt");
    let mut launcher = RecordingLauncher::default();

    let err = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Archive,
            artifact: &artifact,
            archive_type: ArchiveType::Zip,
            version: "2.0.0",
        },
        &mut launcher,
        |_: &Path, _: ArchiveType, _: &Path, _: &Path| -> anyhow::Result<usize> {
            Err(anyhow!("unzip exited with status 9"))
        },
    )
    .expect_err("extraction failure must surface");

    assert!(matches!(err, InstallError::Extraction(_)));
    assert!(err.to_string().contains("status 9"));
    assert!(launcher.launches.is_empty());
    assert!(artifact.path().is_file());
    assert_eq!(fixture.store.pending_update().expect("pending"), None);
}

#[test]
fn installer_mode_launches_and_marks_artifact_for_cleanup() {
    let fixture = Fixture::new("installer-launch");
    let artifact = fixture.artifact(ArchiveType::Bin, b"installer payload");
    let mut launcher = RecordingLauncher::default();

    let outcome = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Installer,
            artifact: &artifact,
            archive_type: ArchiveType::Bin,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect("installer launch must succeed");

    assert_eq!(
        outcome,
        InstallOutcome::InstallerLaunched {
            installer: artifact.path().to_path_buf(),
            pid: 4242,
            exit_host: true,
        }
    );
    assert_eq!(launcher.launches[0].0, artifact.path());
    assert!(launcher.launches[0].1.is_empty());
    assert_eq!(
        fixture
            .store
            .pending_artifact_cleanup()
            .expect("must read cleanup marker"),
        Some(artifact.path().to_path_buf())
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(artifact.path())
            .expect("must stat")
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0, "installer must be executable");
    }
}

#[test]
fn installer_launch_failure_leaves_no_cleanup_marker() {
    let fixture = Fixture::new("installer-fail");
    let artifact = fixture.artifact(ArchiveType::Bin, b"installer payload");
    let mut launcher = RecordingLauncher {
        fail: true,
        ..RecordingLauncher::default()
    };

    let err = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Installer,
            artifact: &artifact,
            archive_type: ArchiveType::Bin,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect_err("launch failure must surface");

    assert!(matches!(err, InstallError::Launch { .. }));
    assert!(err.to_string().contains("spawn refused"));
    assert!(artifact.path().is_file());
    assert_eq!(fixture.store.pending_artifact_cleanup().expect("marker"), None);
}

#[test]
fn unknown_mode_is_rejected_without_side_effects() {
    let fixture = Fixture::new("unknown-mode");
    let artifact = fixture.artifact(ArchiveType::Zip, b"zip bytes");
    let mut launcher = RecordingLauncher::default();

    let err = dispatch_install_with_extractor(
        &fixture.layout,
        &fixture.store,
        &fixture.target,
        InstallRequest {
            mode: &InstallMode::Unknown("delta".to_string()),
            artifact: &artifact,
            archive_type: ArchiveType::Zip,
            version: "2.0.0",
        },
        &mut launcher,
        fake_extract,
    )
    .expect_err("unknown mode must fail");

    assert!(matches!(err, InstallError::UnknownMode(ref raw) if raw == "delta"));
    assert!(launcher.launches.is_empty());
    assert!(!fixture.layout.staging_dir("2.0.0").exists());
}

#[test]
fn installer_command_routes_platform_packages() {
    let installer = Path::new("/tmp/update.msi");
    let (program, args) = installer_command(installer, ArchiveType::Msi);
    assert_eq!(program, PathBuf::from("msiexec"));
    assert_eq!(args, vec![OsString::from("/i"), OsString::from(installer)]);

    let pkg = Path::new("/tmp/update.pkg");
    let (program, args) = installer_command(pkg, ArchiveType::Pkg);
    assert_eq!(program, PathBuf::from("open"));
    assert_eq!(args, vec![OsString::from(pkg)]);

    let exe = Path::new("/tmp/update.exe");
    let (program, args) = installer_command(exe, ArchiveType::Exe);
    assert_eq!(program, exe);
    assert!(args.is_empty());
}

#[cfg(unix)]
#[test]
fn extract_overlays_runner_output_onto_existing_staging() {
    let root = test_root("extract-overlay");
    let staging = root.join("staging");
    fs::create_dir_all(&staging).expect("must create staging");
    fs::write(staging.join("app.bin"), b"stale").expect("must write stale file");
    fs::write(staging.join("keep.txt"), b"left alone").expect("must write keep file");
    let archive = root.join("update.zip");
    fs::write(&archive, b"zip").expect("must write archive");

    let mut invoked = Vec::new();
    let copied = extract_archive_with_runner(
        &archive,
        ArchiveType::Zip,
        &staging,
        &root.join("tmp"),
        |command: &mut Command, _context: &str| {
            invoked.push(command.get_program().to_string_lossy().into_owned());
            let dest = destination_arg(command).expect("command must name a destination");
            fs::create_dir_all(dest.join("lib"))?;
            fs::write(dest.join("app.bin"), b"fresh")?;
            fs::write(dest.join("lib").join("core.so"), b"lib")?;
            Ok(())
        },
    )
    .expect("extraction must succeed");

    assert_eq!(copied, 2);
    assert_eq!(invoked.len(), 1);
    assert_eq!(fs::read(staging.join("app.bin")).expect("read"), b"fresh");
    assert_eq!(fs::read(staging.join("keep.txt")).expect("read"), b"left alone");
    assert!(staging.join("lib").join("core.so").is_file());
    assert!(
        fs::read_dir(root.join("tmp")).expect("tmp").next().is_none(),
        "scratch directory must be removed"
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn extract_fails_when_archive_is_empty() {
    let root = test_root("extract-empty");
    let archive = root.join("update.tar.gz");
    fs::write(&archive, b"tgz").expect("must write archive");

    let err = extract_archive_with_runner(
        &archive,
        ArchiveType::TarGz,
        &root.join("staging"),
        &root.join("tmp"),
        |_: &mut Command, _: &str| Ok(()),
    )
    .expect_err("empty archive must fail");
    assert!(err.to_string().contains("produced no files"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn layout_places_artifacts_by_version() {
    let layout = UpdateLayout::new("/data/upkeep");
    assert_eq!(
        layout.artifact_path("2.1.0", ArchiveType::TarGz),
        PathBuf::from("/data/upkeep/downloads/2.1.0/update.tar.gz")
    );
    assert_eq!(
        layout.staging_dir("../evil"),
        PathBuf::from("/data/upkeep/staging/.._evil")
    );
    assert_eq!(
        layout.settings_db_path(),
        PathBuf::from("/data/upkeep/settings.db")
    );
}

#[test]
fn remove_helpers_ignore_missing_paths() {
    let root = test_root("remove-missing");
    remove_file_if_exists(&root.join("nope")).expect("missing file is fine");
    remove_dir_if_exists(&root.join("nope-dir")).expect("missing dir is fine");
    let _ = fs::remove_dir_all(&root);
}

// unzip takes `-d <dir>`, tar takes `-C <dir>`.
fn destination_arg(command: &Command) -> Option<PathBuf> {
    let args = command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>();
    let index = args.iter().position(|arg| arg == "-d" || arg == "-C")?;
    args.get(index + 1).map(PathBuf::from)
}

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let path = std::env::temp_dir().join(format!(
        "upkeep-installer-{name}-{}-{nanos}-{}",
        std::process::id(),
        TEST_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&path).expect("must create test root");
    path
}
