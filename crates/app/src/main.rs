use clap::{Parser, Subcommand};
use chrono::Utc;
use resume_intake_core::{
    BucketObjectStore, CatalogStore, ChatModel, ExtractionEngine, IntakeCoordinator, LlmClient,
    OcrEngine, RestStore, Settings, TagCatalog, UniversityClassifier,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "resume-intake", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the inbox directory and process incoming resumes until ctrl-c.
    Watch,
    /// Parse a single resume file and print the extracted row as JSON.
    Parse {
        /// Path to a .pdf, .txt or .md resume.
        #[arg(long)]
        file: String,
    },
    /// Classify one university name against the catalog.
    ClassifySchool {
        /// University name, Chinese or English.
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    let store = Arc::new(RestStore::new(&settings.store_url, &settings.store_key)?);

    let llm: Option<Arc<dyn ChatModel>> = LlmClient::from_env()
        .map(|client| Arc::new(client) as Arc<dyn ChatModel>);
    if llm.is_none() {
        warn!("OPENAI_API_KEY not set, extraction runs rule-based only");
    }

    let tags = TagCatalog {
        entries: store.load_tags().await.unwrap_or_else(|error| {
            warn!(%error, "tag catalog unavailable, continuing without tags");
            Vec::new()
        }),
    };
    let universities = store.load_universities().await.unwrap_or_else(|error| {
        warn!(%error, "university catalog unavailable, tiers degrade to heuristics");
        Default::default()
    });
    let classifier = UniversityClassifier::new(universities, llm.clone());

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "resume-intake boot"
    );

    match cli.command {
        Command::Watch => {
            let engine =
                ExtractionEngine::new(llm, classifier, tags, settings.strict_extraction);
            let ocr = OcrEngine::new(
                &settings.ocr_command,
                std::env::temp_dir().join("resume-intake-ocr"),
                settings.ocr_timeout_secs,
            );
            if !ocr.is_available().await {
                warn!(command = %settings.ocr_command, "ocr binary unavailable, pdf intake will fail");
            }

            let objects = settings
                .storage_bucket
                .as_deref()
                .map(|bucket| BucketObjectStore::new(&settings.store_url, &settings.store_key, bucket))
                .transpose()?
                .map(Arc::new);

            let claims = Arc::new(Mutex::new(HashSet::new()));
            let coordinator = Arc::new(IntakeCoordinator::new(
                store, objects, engine, ocr, settings, claims,
            ));

            let (shutdown_sender, shutdown_receiver) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown requested");
                    let _ = shutdown_sender.send(true);
                }
            });

            coordinator.run(shutdown_receiver).await?;
        }
        Command::Parse { file } => {
            let engine =
                ExtractionEngine::new(llm, classifier, tags, settings.strict_extraction);
            let path = Path::new(&file);
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow::anyhow!("path has no file name: {file}"))?;

            let text = if path.extension().and_then(|ext| ext.to_str())
                == Some("pdf")
            {
                let ocr = OcrEngine::new(
                    &settings.ocr_command,
                    std::env::temp_dir().join("resume-intake-ocr"),
                    settings.ocr_timeout_secs,
                );
                let extracted = ocr.extract_text(path).await;
                ocr.cleanup(path).await;
                extracted?
            } else {
                tokio::fs::read_to_string(path).await?
            };

            let resume = engine.parse_resume(&text, file_name).await?;
            println!("{}", serde_json::to_string_pretty(&resume.to_row())?);
        }
        Command::ClassifySchool { name } => {
            let tier = classifier.classify_university(&name).await;
            println!("{} -> {} ({})", name, tier.code(), tier.label_zh());
        }
    }

    Ok(())
}
