use clap::{Parser, Subcommand};
use gtm_tracker::compiler::{compile_container, CompileOutcome};
use gtm_tracker::config::EventData;
use gtm_tracker::engine::UniversalEngine;
use gtm_tracker::export::ContainerExport;
use gtm_tracker::logging;
use gtm_tracker::senders::senders_from_env;
use gtm_tracker::storage::{FileStorage, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gtm_tracker")]
#[command(about = "GTM config compiler and universal conversion tracking engine")]
#[command(version = "0.1.0")]
struct Cli {
    /// Directory holding compiled configs and the event log
    #[arg(long, default_value = "data", global = true)]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a GTM container export into a customer config
    Compile {
        /// Customer identifier the config is compiled for
        #[arg(long)]
        customer: String,
        /// Path to the GTM container export JSON
        #[arg(long)]
        export: PathBuf,
    },
    /// Process a live event snapshot against a stored customer config
    Process {
        /// Customer identifier to load the config for
        #[arg(long)]
        customer: String,
        /// Path to an event JSON file ({"eventName": ..., "dataLayer": ...})
        #[arg(long)]
        event: PathBuf,
    },
    /// Compile an export and immediately process an event against it
    Run {
        #[arg(long)]
        customer: String,
        #[arg(long)]
        export: PathBuf,
        #[arg(long)]
        event: PathBuf,
    },
}

fn print_compile_summary(customer: &str, outcome: &CompileOutcome) {
    println!("\n📊 Compile results for {}:", customer);
    println!("   Tags scanned: {}", outcome.tags_scanned);
    println!("   Variables referenced: {}", outcome.variables_found);
    println!("   Macro bindings: {}", outcome.macro_bindings);
    println!("   Heuristic bindings: {}", outcome.heuristic_bindings);
    println!("   Event patterns: {}", outcome.config.events.len());

    if !outcome.unmapped.is_empty() {
        println!("\n⚠️  Variables needing manual mapping:");
        for name in &outcome.unmapped {
            println!("   - {}", name);
        }
    }
}

async fn compile_command(
    customer: &str,
    export_path: &PathBuf,
    storage: &FileStorage,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔄 Compiling container export for {}...", customer);

    let text = std::fs::read_to_string(export_path)?;
    let export = ContainerExport::from_json(&text);
    let outcome = compile_container(customer, &export);

    storage.put_config(&outcome.config).await?;
    info!("Stored config for customer {}", customer);

    print_compile_summary(customer, &outcome);
    println!("✅ Config written for {}", customer);
    Ok(())
}

async fn process_command(
    customer: &str,
    event_path: &PathBuf,
    storage: Arc<FileStorage>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 Processing event for {}...", customer);

    let text = std::fs::read_to_string(event_path)?;
    let event: EventData = serde_json::from_str(&text)?;

    let engine = UniversalEngine::new(storage, senders_from_env());
    match engine.process_event(customer, &event).await {
        Ok(results) => {
            println!("\n📊 Per-platform results for '{}':", event.event_name);
            for (platform, result) in &results {
                let status = if result.success { "✅" } else { "❌" };
                println!("   {} {}: {}", status, platform, result.message);
                println!("      payload: {}", result.payload);
            }
        }
        Err(e) => {
            error!("Event processing failed: {}", e);
            println!("❌ Event processing failed: {}", e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let storage = Arc::new(FileStorage::new(&cli.data_dir)?);

    match cli.command {
        Commands::Compile { customer, export } => {
            compile_command(&customer, &export, &storage).await?;
        }
        Commands::Process { customer, event } => {
            process_command(&customer, &event, storage.clone()).await?;
        }
        Commands::Run {
            customer,
            export,
            event,
        } => {
            println!("🚀 Running full pipeline (compile + process)...");

            println!("\n📥 Step 1: Compiling export...");
            compile_command(&customer, &export, &storage).await?;

            println!("\n📤 Step 2: Processing event...");
            process_command(&customer, &event, storage.clone()).await?;
        }
    }
    Ok(())
}
