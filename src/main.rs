use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::info;

use phrase_pipeline::config::Config;
use phrase_pipeline::db::Database;
use phrase_pipeline::metrics::PipelineMetrics;
use phrase_pipeline::provider::{OpenAiProvider, OpenAiSettings};
use phrase_pipeline::store::{Project, ProjectDirectory};
use phrase_pipeline::transfer::{ExportOptions, ImportOptions};
use phrase_pipeline::PhraseService;

const USAGE: &str = "Usage:
  phrase-pipeline stats <project-key>
  phrase-pipeline export <project-key> <json|csv|xlsx> [out-dir]
  phrase-pipeline import <project-key> <file> [--overwrite]
  phrase-pipeline translate <project-key> <locale>";

enum Command {
    Stats { project: String },
    Export { project: String, format: String, out_dir: PathBuf },
    Import { project: String, file: PathBuf, overwrite: bool },
    Translate { project: String, locale: String },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let arg = |i: usize| -> Result<String> {
        args.get(i)
            .cloned()
            .with_context(|| format!("missing argument\n\n{}", USAGE))
    };

    match args.first().map(String::as_str) {
        Some("stats") => Ok(Command::Stats { project: arg(1)? }),
        Some("export") => Ok(Command::Export {
            project: arg(1)?,
            format: arg(2)?,
            out_dir: args.get(3).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
        }),
        Some("import") => Ok(Command::Import {
            project: arg(1)?,
            file: PathBuf::from(arg(2)?),
            overwrite: args.iter().skip(3).any(|a| a == "--overwrite"),
        }),
        Some("translate") => Ok(Command::Translate {
            project: arg(1)?,
            locale: arg(2)?,
        }),
        Some(other) => bail!("unknown command: {}\n\n{}", other, USAGE),
        None => bail!("{}", USAGE),
    }
}

async fn find_project(db: &Database, key: &str) -> Result<Project> {
    db.find_project_by_key(key)
        .await?
        .with_context(|| format!("project '{}' not found", key))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored when variables come from the environment)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("phrase_pipeline=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = Config::from_env()?;
    let db = Database::new(&config.database_url).await?;
    let service = PhraseService::from_store(db.clone(), config.pipeline_settings());

    match command {
        Command::Stats { project } => {
            let project = find_project(&db, &project).await?;
            let stats = service.get_project_phrase_stats(project.id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Export {
            project,
            format,
            out_dir,
        } => {
            let project = find_project(&db, &project).await?;
            let payload = service
                .export_phrases(project.id, &format, ExportOptions::default())
                .await?;
            let path = out_dir.join(&payload.filename);
            tokio::fs::write(&path, &payload.bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} ({} bytes)", path.display(), payload.bytes.len());
        }
        Command::Import {
            project,
            file,
            overwrite,
        } => {
            let project = find_project(&db, &project).await?;
            let summary = service
                .import_phrases(project.id, &file, ImportOptions { overwrite })
                .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Translate { project, locale } => {
            let project = find_project(&db, &project).await?;
            let provider = OpenAiProvider::new(OpenAiSettings::from_config(&config))
                .context("Failed to build translation client")?;
            let result = service
                .translate_untranslated(&provider, project.id, &locale)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            info!(
                "Provider metrics: {}",
                serde_json::to_string(&PipelineMetrics::global().report())?
            );
        }
    }

    Ok(())
}
