//! xflow CLI - save and execute xgen canvas workflows

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use xflow::coordinator::{ConfirmGate, ExecuteOptions, PresetGate, PromptGate, WorkflowCoordinator};
use xflow::error::{FixSuggestion, FlowError, Result};
use xflow::graph::{self, WorkflowGraph};
use xflow::notify::TermNotifier;
use xflow::session::ExecutionOutput;
use xflow::storage::WorkspaceStore;
use xflow::validate::strip_json_ext;
use xflow::{FlowConfig, HttpWorkflowService, WorkflowService};

#[derive(Parser)]
#[command(name = "xflow")]
#[command(about = "xflow - save and execute xgen canvas workflows")]
#[command(version)]
struct Cli {
    /// Workspace directory (defaults to the platform data dir)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the current workflow to the backend
    Save {
        /// Workflow name (defaults to the workspace's current name)
        name: Option<String>,

        /// Overwrite an existing workflow without prompting
        #[arg(short, long)]
        yes: bool,
    },

    /// Execute the current workflow (saves it first)
    Run {
        /// Workflow name (defaults to the workspace's current name)
        name: Option<String>,

        /// Input text passed to the workflow
        #[arg(short, long, default_value = "")]
        input: String,

        /// Correlation id for the execution
        #[arg(long)]
        interaction_id: Option<String>,

        /// Knowledge-base collection (repeatable)
        #[arg(short, long = "collection")]
        collections: Vec<String>,
    },

    /// List workflows stored on the backend
    List,

    /// Load a stored workflow into the workspace
    Load {
        /// Workflow name (with or without .json)
        name: String,
    },

    /// Delete a stored workflow from the backend
    Delete {
        /// Workflow name (with or without .json)
        name: String,
    },

    /// Write the current workflow as JSON ("-" for stdout)
    Export {
        /// Output path
        path: String,
    },

    /// Read a workflow JSON file into the workspace
    Import {
        /// Input path
        path: PathBuf,
    },

    /// Show or update backend configuration
    Config {
        /// Set the backend base URL
        #[arg(long)]
        api_url: Option<String>,

        /// Set the API key sent as a bearer token
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Start a fresh workflow (clears the workspace)
    New,

    /// Show the current workspace state
    Show,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let store = match &cli.workspace {
        Some(dir) => WorkspaceStore::at(dir.clone()),
        None => WorkspaceStore::default_location(),
    };

    let result = match cli.command {
        Commands::Save { name, yes } => save(&store, name, yes).await,
        Commands::Run {
            name,
            input,
            interaction_id,
            collections,
        } => run(&store, name, input, interaction_id, collections).await,
        Commands::List => list().await,
        Commands::Load { name } => load(&store, &name).await,
        Commands::Delete { name } => delete(&name).await,
        Commands::Export { path } => export(&store, &path),
        Commands::Import { path } => import(&store, &path),
        Commands::Config { api_url, api_key } => configure(api_url, api_key),
        Commands::New => {
            store.start_new_workflow();
            println!("{} Workspace reset", "✓".green());
            Ok(())
        }
        Commands::Show => show(&store),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn service() -> Result<HttpWorkflowService> {
    let config = FlowConfig::load()?.with_env();
    HttpWorkflowService::from_config(&config)
}

fn current_graph(store: &WorkspaceStore) -> Result<WorkflowGraph> {
    store.workflow_state().ok_or_else(|| {
        FlowError::validation("No workflow in the workspace; import or load one first")
    })
}

async fn save(store: &WorkspaceStore, name: Option<String>, yes: bool) -> Result<()> {
    let graph = current_graph(store)?;
    let name = name.unwrap_or_else(|| store.workflow_name());

    let gate: Arc<dyn ConfirmGate> = if yes {
        Arc::new(PresetGate::allow())
    } else {
        Arc::new(PromptGate)
    };
    let coordinator =
        WorkflowCoordinator::new(Arc::new(service()?), Arc::new(TermNotifier), gate);
    coordinator.save(&graph, &name).await?;
    store.save_workflow_name(&name);
    Ok(())
}

async fn run(
    store: &WorkspaceStore,
    name: Option<String>,
    input: String,
    interaction_id: Option<String>,
    collections: Vec<String>,
) -> Result<()> {
    let graph = current_graph(store)?;
    let name = name.unwrap_or_else(|| store.workflow_name());

    // Ctrl-C aborts a streaming execution between chunks
    let cancel = CancellationToken::new();
    let abort = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.cancel();
        }
    });

    let coordinator = WorkflowCoordinator::new(
        Arc::new(service()?),
        Arc::new(TermNotifier),
        Arc::new(PromptGate),
    );
    let options = ExecuteOptions {
        input,
        interaction_id,
        collections,
    };
    coordinator.execute(&graph, &name, options, cancel).await?;

    // Streamed chunks were already printed live
    if let Some(output @ ExecutionOutput::Buffered(_)) = coordinator.state().last_output {
        println!("{}", output.render());
    }
    store.save_workflow_name(&name);
    Ok(())
}

async fn list() -> Result<()> {
    let workflows = service()?.list_workflows().await?;
    if workflows.is_empty() {
        println!("No workflows stored");
        return Ok(());
    }
    for filename in workflows {
        println!("{}", strip_json_ext(&filename));
    }
    Ok(())
}

async fn load(store: &WorkspaceStore, name: &str) -> Result<()> {
    let value = service()?.load_workflow(name).await?;
    let graph = WorkflowGraph::ensure_valid(&value)
        .ok_or_else(|| FlowError::validation("Stored workflow is not a valid graph"))?;
    store.save_workflow_state(&graph);
    store.save_workflow_name(strip_json_ext(name));
    println!(
        "{} Loaded '{}' ({} nodes, {} edges)",
        "✓".green(),
        strip_json_ext(name),
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(())
}

async fn delete(name: &str) -> Result<()> {
    service()?.delete_workflow(name).await?;
    println!("{} Deleted '{}'", "✓".green(), strip_json_ext(name));
    Ok(())
}

fn export(store: &WorkspaceStore, path: &str) -> Result<()> {
    let graph = current_graph(store)?;
    let name = store.workflow_name();
    let id = xflow::hash::workflow_id(&graph);
    let payload = graph.to_payload(&id, &name);
    let json = serde_json::to_string_pretty(&payload)?;

    if path == "-" {
        println!("{}", json);
    } else {
        std::fs::write(path, json)?;
        println!("{} Exported '{}' to {}", "✓".green(), name, path);
    }
    Ok(())
}

fn import(store: &WorkspaceStore, path: &PathBuf) -> Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let graph = WorkflowGraph::ensure_valid(&value)
        .ok_or_else(|| FlowError::validation("File is not a valid workflow graph"))?;
    store.save_workflow_state(&graph);
    // The filename names the workflow; an embedded field is the fallback
    let stem = path.file_stem().and_then(|s| s.to_str());
    let embedded = value.get("workflow_name").and_then(|v| v.as_str());
    if let Some(name) = stem.or(embedded) {
        store.save_workflow_name(name);
    }
    println!(
        "{} Imported {} nodes, {} edges",
        "✓".green(),
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(())
}

fn configure(api_url: Option<String>, api_key: Option<String>) -> Result<()> {
    let mut config = FlowConfig::load()?;

    if api_url.is_none() && api_key.is_none() {
        println!("{} {}", "config:".bold(), FlowConfig::config_path().display());
        println!("  api_url: {}", config.base_url()?);
        match config.api_key() {
            Some(_) => println!("  api_key: (set)"),
            None => println!("  api_key: (not set)"),
        }
        return Ok(());
    }

    if let Some(url) = api_url {
        config.api_url = Some(url);
        // Reject malformed URLs before they land in the file
        config.base_url()?;
    }
    if let Some(key) = api_key {
        config.api_key = Some(key);
    }
    config.save()?;
    println!("{} Config written to {}", "✓".green(), FlowConfig::config_path().display());
    Ok(())
}

fn show(store: &WorkspaceStore) -> Result<()> {
    let name = store.workflow_name();
    println!("{} {}", "Workflow:".bold(), name);
    match store.workflow_state() {
        Some(graph) => {
            let mode = if graph::is_streaming_workflow(&graph) {
                "streaming"
            } else {
                "buffered"
            };
            println!("  nodes: {}", graph.nodes.len());
            println!("  edges: {}", graph.edges.len());
            println!("  execution: {}", mode);
            println!("  id: {}", xflow::hash::workflow_id(&graph));
        }
        None => println!("  (no workflow state)"),
    }
    Ok(())
}
