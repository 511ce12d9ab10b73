//! Integration tests for the skillkit-skills crate.
//!
//! These run the subprocess layer against real coreutils, exercise bundle
//! manifest generation and synchronization on disk, and feed the telemetry
//! filter mixed-format fixtures.

use std::path::Path;

use skillkit_skills::exec;
use skillkit_skills::manifest::{self, MANIFEST_FILE, Manifest};
use skillkit_skills::media::QualityPreset;
use skillkit_skills::media::convert::build_video_command;
use skillkit_skills::telemetry;
use skillkit_skills::thought::{Thought, ThoughtFormat, format_thought};

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════
//  Subprocess layer
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn exec_runs_real_commands() {
    let argv = vec!["echo".to_string(), "hello world".to_string()];
    let output = exec::run(&argv, 10).await.unwrap();
    assert!(output.success());
    assert_eq!(output.stdout.trim(), "hello world");
    assert!(!output.stdout_truncated);
}

#[tokio::test]
async fn exec_surfaces_missing_binaries() {
    let argv = vec!["skillkit-no-such-binary".to_string()];
    let err = exec::run(&argv, 10).await.unwrap_err();
    assert!(err.to_string().contains("skillkit-no-such-binary"));
}

#[tokio::test]
async fn check_command_distinguishes_present_and_absent() {
    assert!(exec::check_command("echo", "hello").await);
    assert!(!exec::check_command("skillkit-no-such-binary", "--version").await);
}

// ═══════════════════════════════════════════════════════════════════════
//  Bundle manifests
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn manifest_generate_then_update_synchronizes_bundles() {
    let source = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();

    // Source bundle: one shared file, one new file, nested layout.
    write_file(&source.path().join("skills/media/SKILL.md"), "v2");
    write_file(&source.path().join("settings.json"), "{}");
    let source_manifest = manifest::generate(source.path()).unwrap();
    assert_eq!(
        source_manifest.files,
        ["settings.json", "skills/media/SKILL.md"]
    );

    // Destination bundle: stale copy plus a file the new version dropped.
    write_file(&dest.path().join("skills/media/SKILL.md"), "v1");
    write_file(&dest.path().join("skills/legacy/SKILL.md"), "old");
    manifest::generate(dest.path()).unwrap();

    let report = manifest::update(source.path(), dest.path()).unwrap();
    assert_eq!(report.added, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);

    // Shared file overwritten, dropped file removed, directory pruned.
    let shared =
        std::fs::read_to_string(dest.path().join("skills/media/SKILL.md")).unwrap();
    assert_eq!(shared, "v2");
    assert!(!dest.path().join("skills/legacy").exists());

    // Destination manifest now matches the source.
    let dest_manifest = Manifest::load(&dest.path().join(MANIFEST_FILE)).unwrap();
    assert_eq!(dest_manifest.files, source_manifest.files);
}

#[test]
fn manifest_update_is_rerunnable() {
    let source = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();

    write_file(&source.path().join("a.md"), "a");
    manifest::generate(source.path()).unwrap();

    manifest::update(source.path(), dest.path()).unwrap();
    let second = manifest::update(source.path(), dest.path()).unwrap();
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(second.deleted, 0);
}

// ═══════════════════════════════════════════════════════════════════════
//  Telemetry parsing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn telemetry_handles_all_three_formats() {
    let array = r#"[{"key": "gemini_cli.tool_call"}, {"noise": true}]"#;
    assert_eq!(telemetry::parse_log_content(array).len(), 2);

    let jsonl = "{\"a\": 1}\n{\"b\": 2}";
    assert_eq!(telemetry::parse_log_content(jsonl).len(), 2);

    let concatenated = "{\n  \"a\": 1\n}\n{\n  \"b\": 2\n}";
    assert_eq!(telemetry::parse_log_content(concatenated).len(), 2);
}

#[test]
fn telemetry_filter_keeps_only_curated_events() {
    let items = telemetry::parse_log_content(
        r#"[
            {"attributes": [{"key": "gemini_cli.user_prompt", "value": "hi"}]},
            {"attributes": [{"key": "heartbeat", "value": 1}]},
            {"gemini_cli.api_response": {"payload": "{\"tokens\": 3}"}}
        ]"#,
    );
    let kept: Vec<_> = items.into_iter().filter(telemetry::is_interesting).collect();
    assert_eq!(kept.len(), 2);

    // Stringified JSON payloads are expanded during filtering.
    let expanded = telemetry::unstringify(kept[1].clone());
    assert_eq!(expanded["gemini_cli.api_response"]["payload"]["tokens"], 3);
}

// ═══════════════════════════════════════════════════════════════════════
//  Command construction and formatting
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn video_convert_command_uses_preset_parameters() {
    let cmd = build_video_command(
        Path::new("in.avi"),
        Path::new("out.mp4"),
        QualityPreset::Archive,
    );
    assert_eq!(cmd[0], "ffmpeg");
    assert!(cmd.contains(&"libx264".to_string()));
    assert!(cmd.contains(&"18".to_string()));
    assert!(cmd.contains(&"+faststart".to_string()));
}

#[test]
fn thought_formats_are_distinct() {
    let thought = Thought {
        text: "Check the inputs first".into(),
        number: 2,
        total: 4,
        revises: Some(1),
        ..Thought::default()
    };
    let simple = format_thought(&thought, ThoughtFormat::Simple);
    let markdown = format_thought(&thought, ThoughtFormat::Markdown);
    let boxed = format_thought(&thought, ThoughtFormat::Box);

    assert!(simple.contains("[REVISION of Thought 1]"));
    assert!(markdown.contains("**[REVISION of Thought 1]**"));
    assert!(boxed.contains("REVISION 2/4"));
}
