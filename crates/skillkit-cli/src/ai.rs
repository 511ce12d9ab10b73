//! `skillkit ai` subcommand handlers.

use anyhow::{Result, bail};

use skillkit_skills::analysis;
use skillkit_skills::multimodal::{
    FileReport, GenAiClient, GenAiConfig, OutputFormat, Task,
};

use crate::cli::AiAction;

pub async fn run(action: AiAction) -> Result<()> {
    match action {
        AiAction::Process {
            files,
            task,
            prompt,
            model,
            format,
            output,
        } => {
            let task: Task = task.parse().map_err(|e: String| anyhow::anyhow!(e))?;
            let format: OutputFormat =
                format.parse().map_err(|e: String| anyhow::anyhow!(e))?;

            let prompt = match prompt {
                Some(p) => p,
                None if task == Task::Generate => {
                    bail!("--prompt is required for the generate task")
                }
                None => task.default_prompt().to_owned(),
            };

            let config = GenAiConfig::from_env(Some(model))?;
            let client = GenAiClient::new(config)?;

            let results: Vec<FileReport> = if task == Task::Generate {
                let report = match client.generate_text(&prompt, format).await {
                    Ok(response) => FileReport {
                        status: "success".into(),
                        file: "generated".into(),
                        response: Some(response),
                        error: None,
                    },
                    Err(e) => FileReport {
                        status: "error".into(),
                        file: "generated".into(),
                        response: None,
                        error: Some(e.to_string()),
                    },
                };
                vec![report]
            } else {
                if files.is_empty() {
                    bail!("--files is required for the {task:?} task");
                }
                client.process_batch(&files, &prompt, format).await
            };

            let rendered = serde_json::to_string_pretty(&results)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &rendered)?;
                    println!("Results saved to {}", path.display());
                }
                None => println!("{rendered}"),
            }

            let failures = results.iter().filter(|r| r.status == "error").count();
            if failures > 0 {
                bail!("{failures} of {} file(s) failed", results.len());
            }
            Ok(())
        }

        AiAction::Inspect {
            input,
            model,
            output_dir,
        } => {
            let config = GenAiConfig::from_env(Some(model))?;
            let client = GenAiClient::new(config)?;
            let report =
                analysis::inspect_screens(&client, &input, output_dir.as_deref()).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.failed.is_empty() {
                bail!(
                    "{} of {} screen(s) failed",
                    report.failed.len(),
                    report.failed.len() + report.analyzed.len()
                );
            }
            Ok(())
        }

        AiAction::Diagnose {
            recording,
            prompt,
            model,
            output_dir,
        } => {
            let config = GenAiConfig::from_env(Some(model))?;
            let client = GenAiClient::new(config)?;
            let report = analysis::diagnose_recording(
                &client,
                &recording,
                prompt.as_deref(),
                output_dir.as_deref(),
            )
            .await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            println!("Report written to {}", report.report_path.display());
            Ok(())
        }
    }
}
