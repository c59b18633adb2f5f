use super::*;

const MANIFEST: &str = r#"{
  "latest_version": "1.3.0",
  "current_version": "1.2.0",
  "last_update": "2025-01-01",
  "release_notes": "Faster startup.",
  "download_size": 2048,
  "modes": [
    {
      "mode": "archive",
      "url": "https://example.test/app-1.3.0.zip",
      "size": 2048,
      "checksums": ["AAAA", "bbbb"],
      "mandatory": false
    },
    {
      "mode": "installer",
      "url": "https://example.test/app-1.3.0-setup.exe?channel=stable",
      "size": 4096,
      "checksums": ["cccc"],
      "mandatory": true
    }
  ]
}"#;

fn version(input: &str) -> AppVersion {
    parse_app_version(input).expect("version should parse")
}

#[test]
fn parse_manifest() {
    let manifest = UpdateManifest::from_json_str(MANIFEST).expect("manifest should parse");
    assert_eq!(manifest.latest_version, "1.3.0");
    assert_eq!(manifest.current_version.as_deref(), Some("1.2.0"));
    assert_eq!(manifest.download_size, Some(2048));
    assert_eq!(manifest.modes.len(), 2);
    assert_eq!(manifest.modes[0].mode, InstallMode::Archive);
    assert_eq!(manifest.modes[0].checksums, vec!["AAAA", "bbbb"]);
    assert_eq!(manifest.modes[1].mode, InstallMode::Installer);
    assert!(manifest.is_mandatory());
}

#[test]
fn unknown_mode_is_resolved_once_and_kept_verbatim() {
    let content = r#"{
      "latest_version": "2.0.0",
      "modes": [{ "mode": "Torrent", "url": "magnet:?xt=abc", "checksums": [] }]
    }"#;
    let manifest = UpdateManifest::from_json_str(content).expect("manifest should parse");
    assert_eq!(
        manifest.modes[0].mode,
        InstallMode::Unknown("Torrent".to_string())
    );
    let selected = manifest
        .select_artifact(Some(&InstallMode::Archive))
        .expect("unknown-only manifest still yields its entry");
    assert!(!selected.mode.is_known());
}

#[test]
fn select_artifact_prefers_requested_mode_then_first_known() {
    let manifest = UpdateManifest::from_json_str(MANIFEST).expect("manifest should parse");
    let installer = manifest
        .select_artifact(Some(&InstallMode::Installer))
        .expect("installer mode is listed");
    assert_eq!(installer.mode, InstallMode::Installer);

    let fallback = manifest.select_artifact(None).expect("some mode is listed");
    assert_eq!(fallback.mode, InstallMode::Archive);
}

#[test]
fn manifest_rejects_known_mode_without_checksums() {
    let content = r#"{
      "latest_version": "1.0.0",
      "modes": [{ "mode": "archive", "url": "https://example.test/a.zip", "checksums": [] }]
    }"#;
    let err = UpdateManifest::from_json_str(content).expect_err("checksums are required");
    assert!(
        err.to_string().contains("must publish at least one checksum"),
        "unexpected error: {err}"
    );
}

#[test]
fn manifest_rejects_empty_mode_list_and_bad_version() {
    let empty = r#"{ "latest_version": "1.0.0", "modes": [] }"#;
    assert!(UpdateManifest::from_json_str(empty).is_err());

    let bad_version = r#"{
      "latest_version": "one",
      "modes": [{ "mode": "archive", "url": "https://example.test/a.zip", "checksums": ["aa"] }]
    }"#;
    assert!(UpdateManifest::from_json_str(bad_version).is_err());
}

#[test]
fn manifest_round_trips_through_cache_json() {
    let manifest = UpdateManifest::from_json_str(MANIFEST).expect("manifest should parse");
    let cached = manifest.to_json_string().expect("manifest should serialize");
    let restored = UpdateManifest::from_json_str(&cached).expect("cache should parse");
    assert_eq!(restored, manifest);
}

#[test]
fn archive_type_inference_ignores_query_and_fragment() {
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/app.zip"),
        Some(ArchiveType::Zip)
    );
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/app.TGZ#frag"),
        Some(ArchiveType::TarGz)
    );
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/setup.exe?channel=stable"),
        Some(ArchiveType::Exe)
    );
    assert_eq!(
        ArchiveType::infer_from_url("https://example.test/updater"),
        Some(ArchiveType::Bin)
    );
    assert_eq!(ArchiveType::infer_from_url("https://example.test/a.rar"), None);
}

#[test]
fn delivery_artifact_file_name_uses_cache_extension() {
    let manifest = UpdateManifest::from_json_str(MANIFEST).expect("manifest should parse");
    assert_eq!(
        manifest.modes[0].file_name().expect("zip name"),
        "update.zip"
    );
    assert_eq!(
        manifest.modes[1].file_name().expect("exe name"),
        "update.exe"
    );
}

#[test]
fn version_comparison_distinguishes_all_three_outcomes() {
    assert_eq!(
        compare_versions(&version("1.2.0"), &version("1.3.0")),
        VersionStatus::UpdateAvailable
    );
    assert_eq!(
        compare_versions(&version("1.3.0"), &version("1.2.0")),
        VersionStatus::AheadOfRemote
    );
    assert_eq!(
        compare_versions(&version("1.2.0"), &version("1.2.0")),
        VersionStatus::UpToDate
    );
}

#[test]
fn build_metadata_does_not_affect_version_comparison() {
    for (local, remote) in [
        ("1.2.0", "1.2.0+ci.3"),
        ("1.2.0+build.7", "1.2.0"),
        ("1.2.0+a", "1.2.0+b"),
    ] {
        assert_eq!(
            compare_versions(&version(local), &version(remote)),
            VersionStatus::UpToDate,
            "{local} vs {remote}"
        );
    }
    assert_eq!(
        compare_versions(&version("1.2.0+ci.3"), &version("1.2.1")),
        VersionStatus::UpdateAvailable
    );
}

#[test]
fn version_status_messages_are_distinct() {
    let messages = [
        VersionStatus::UpdateAvailable.message(),
        VersionStatus::AheadOfRemote.message(),
        VersionStatus::UpToDate.message(),
    ];
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);
    assert_ne!(messages[0], messages[2]);
}

#[test]
fn lenient_versions_pad_and_order_numerically() {
    let newer = |a: &str, b: &str| version(a).cmp_precedence(&version(b)).is_gt();
    assert_eq!(version("v1.2").to_string(), "1.2.0");
    assert_eq!(version("3").to_string(), "3.0.0");
    assert_eq!(version("1.2.0.7").to_string(), "1.2.0.7");
    assert_eq!(version("1.2.0.7").revision, 7);
    assert!(newer("1.10.0", "1.9.9"));
    assert!(newer("1.2.0.1", "1.2.0"));
    assert!(newer("1.2.0.10", "1.2.0.9"));
    assert!(newer("1.2.1", "1.2.0.9"));
    assert_eq!(version("1.2.0.0"), version("1.2.0"));
    assert!(newer("1.2.0", "1.2.0-beta"));
    assert!(parse_app_version("1.2.x").is_err());
    assert!(parse_app_version("1.2.3.4.5").is_err());
    assert!(parse_app_version("").is_err());
}

#[test]
fn update_log_keeps_valid_entries_and_reports_malformed_ones() {
    let content = r#"{
      "schema_version": 1,
      "entries": [
        { "version": "1.3.0", "update_time": "2025-01-01", "changes": ["a", "b"] },
        { "version": 13 },
        { "version": "", "changes": [] },
        { "version": "1.2.0", "changes": ["c"] }
      ]
    }"#;
    let log = UpdateLog::from_json_str(content).expect("log should parse");
    assert_eq!(log.entries.len(), 2);
    assert_eq!(log.entries[0].version, "1.3.0");
    assert_eq!(log.entries[0].changes, vec!["a", "b"]);
    assert_eq!(log.entries[1].version, "1.2.0");
    assert_eq!(log.rejected.len(), 2);
    assert!(log.rejected[0].starts_with("entry 1:"));
}

#[test]
fn update_log_rejects_newer_schema() {
    let content = r#"{ "schema_version": 99, "entries": [] }"#;
    let err = UpdateLog::from_json_str(content).expect_err("future schema must fail");
    assert!(err.to_string().contains("unsupported update log schema_version 99"));
}
