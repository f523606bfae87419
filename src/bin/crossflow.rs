//! # Crossflow CLI
//!
//! Runs the orchestrator against the in-memory adapters: useful for trying
//! operations, checking effective configuration and smoke-testing a
//! deployment's settings.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossflow_core::config::load_settings;
use crossflow_core::logging::init_structured_logging;
use crossflow_core::services::memory::InMemoryServices;
use crossflow_core::services::{AiTask, Document, Workflow};
use crossflow_core::Orchestrator;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "crossflow")]
#[command(about = "Cross-service orchestration core")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment variables
    /// prefixed with CROSSFLOW_ override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config,

    /// Probe every service once and print the aggregate health
    Health,

    /// Execute a registered operation with a JSON input
    Run {
        operation: String,
        /// JSON input, e.g. '{"email": "john@example.com", "password": "password123"}'
        #[arg(short, long, default_value = "{}")]
        input: String,
    },

    /// Run every built-in operation against demo data and print metrics
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let settings = load_settings(cli.config.as_deref()).context("failed to load settings")?;
    if let Commands::Config = cli.command {
        print_json(&serde_json::to_value(&settings)?)?;
        return Ok(());
    }

    let services = demo_services();
    let orchestrator = Orchestrator::new(services.adapters(), settings)
        .context("failed to build orchestrator")?;
    info!(operations = ?orchestrator.operation_names(), "Orchestrator ready");

    match cli.command {
        Commands::Config => {}
        Commands::Health => {
            let health = orchestrator.health_check().await;
            print_json(&serde_json::to_value(&health)?)?;
        }
        Commands::Run { operation, input } => {
            let input: Value =
                serde_json::from_str(&input).context("--input is not valid JSON")?;
            let result = orchestrator.execute(&operation, input).await;
            print_json(&serde_json::to_value(&result)?)?;
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Demo => run_demo(&orchestrator).await?,
    }

    orchestrator.dispose().await;
    Ok(())
}

/// Default wiring: in-memory adapters seeded with a small demo data set.
fn demo_services() -> InMemoryServices {
    let services = InMemoryServices::new();

    for (id, title, tags) in [
        ("doc_q3_report", "Q3 Revenue Report", vec!["finance", "report"]),
        ("doc_roadmap", "Product Roadmap 2025", vec!["product", "planning"]),
        ("doc_onboarding", "Onboarding Guide", vec!["hr", "guide"]),
    ] {
        services.content.insert_document(Document {
            id: id.to_string(),
            title: title.to_string(),
            owner_id: "user_john".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 48_213,
            tags: tags.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
        });
    }

    services.workflow.add_workflow(Workflow {
        id: "wf_report_digest".to_string(),
        name: "Report digest".to_string(),
        status: "active".to_string(),
        triggers: vec!["search_results".to_string()],
    });
    services.workflow.add_workflow(Workflow {
        id: "wf_archive".to_string(),
        name: "Archive stale documents".to_string(),
        status: "inactive".to_string(),
        triggers: vec!["search_results".to_string()],
    });
    services.workflow.add_ai_task(AiTask {
        id: "ai_summarize".to_string(),
        name: "Summarize document".to_string(),
        task_type: "summarization".to_string(),
    });

    services
}

async fn run_demo(orchestrator: &Orchestrator) -> Result<()> {
    let health = orchestrator.health_check().await;
    info!(overall = %health.overall, "Initial health check");

    let steps = [
        (
            "onboarding",
            json!({"email": "john@example.com", "password": "password123"}),
        ),
        (
            "document_processing",
            json!({
                "file": {
                    "file_name": "notes.txt",
                    "content_type": "text/plain",
                    "owner_id": "user_john",
                    "content": "Quarterly planning notes"
                },
                "ai_task_id": "ai_summarize"
            }),
        ),
        (
            "search_and_trigger",
            json!({"query": "report", "notify_users": ["user_john"]}),
        ),
        (
            "collaboration_setup",
            json!({
                "name": "Q3 review",
                "participants": ["user_jane", "user_omar"],
                "initial_message": "Kicking off the Q3 review"
            }),
        ),
    ];

    for (operation, input) in steps {
        let result = orchestrator.execute(operation, input).await;
        println!("== {operation}");
        print_json(&serde_json::to_value(&result)?)?;
    }

    println!("== metrics");
    print_json(&serde_json::to_value(orchestrator.metrics())?)?;
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
