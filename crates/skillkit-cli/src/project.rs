//! Handlers for the project-level subcommands: search, log, manifest,
//! thought, and doctor.

use std::path::PathBuf;

use anyhow::{Result, bail};

use skillkit_skills::thought::{Thought, ThoughtFormat, format_thought};
use skillkit_skills::{config, doctor, manifest, search, telemetry};

use crate::cli::{ManifestAction, ThoughtArgs};

pub async fn run_search(pattern: &str, include_external: bool) -> Result<()> {
    let result = search::search(pattern, include_external).await?;
    if result.is_empty() {
        println!("No matches found.");
    } else {
        println!("{}", result.matches);
    }
    Ok(())
}

pub fn run_log(output: Option<PathBuf>) -> Result<()> {
    let (path, report) = telemetry::filter_log(output.as_deref())?;
    println!(
        "Processed {} items. Wrote {} items to {}",
        report.total,
        report.kept,
        path.display()
    );
    Ok(())
}

pub fn run_manifest(action: ManifestAction) -> Result<()> {
    match action {
        ManifestAction::Generate { dir } => {
            let bundle = dir.unwrap_or_else(|| config::bundle_dir(&config::project_root()));
            let generated = manifest::generate(&bundle)?;
            println!(
                "Manifest generated at {} with {} files.",
                bundle.join(manifest::MANIFEST_FILE).display(),
                generated.files.len()
            );
            Ok(())
        }
        ManifestAction::Update { source, dest } => {
            let dest = dest.unwrap_or_else(|| config::bundle_dir(&config::project_root()));
            let report = manifest::update(&source, &dest)?;
            println!("Update complete!");
            println!("  Added:   {}", report.added);
            println!("  Updated: {}", report.updated);
            println!("  Deleted: {}", report.deleted);
            Ok(())
        }
    }
}

pub fn run_thought(args: ThoughtArgs) -> Result<()> {
    let format: ThoughtFormat = args
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let thought = Thought {
        text: args.thought,
        number: args.number,
        total: args.total,
        revises: args.revision,
        branch_from: args.branch,
        branch_id: args.branch_id,
    };
    println!("{}", format_thought(&thought, format));
    Ok(())
}

pub async fn run_doctor() -> Result<()> {
    println!("skillkit doctor\n");

    let results = doctor::run_checks().await?;
    for result in &results {
        let mark = if result.passed { "ok " } else { "FAIL" };
        match &result.details {
            Some(details) => println!("[{mark}] {} ({details})", result.name),
            None => println!("[{mark}] {}", result.name),
        }
    }

    println!();
    if doctor::all_passed(&results) {
        println!("Everything looks good.");
        Ok(())
    } else {
        bail!("some checks failed");
    }
}
