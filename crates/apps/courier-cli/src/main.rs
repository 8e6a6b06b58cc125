mod demo;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use courier::{
    ActionHandler, BridgeClient, GraphClient, GraphCredentials, LocalMailClient, Operation,
    RemoteMailClient, ResultItem, SearchOrchestrator, SearchRequest, SearchSettings,
};
use futures::StreamExt;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Search mail and calendar across the desktop client and the online mailbox")]
#[command(version)]
struct Cli {
    /// Use built-in sample backends
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search with a tag (e.g. outlook, email, calendar)
    Search {
        tag: String,
        text: Vec<String>,
        /// Print one JSON object per result
        #[arg(long)]
        json: bool,
    },
    /// Run the default operation of the n-th result (1-based) of a search
    Run {
        index: usize,
        tag: String,
        text: Vec<String>,
    },
    /// Sign in to the online mailbox
    SignIn,
    /// Sign out of the online mailbox
    SignOut,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let settings = SearchSettings::load().unwrap_or_else(|e| {
        warn!("Using default settings: {:#}", e);
        SearchSettings::default()
    });
    let orchestrator = if cli.demo {
        demo::orchestrator()
    } else {
        build_orchestrator(&settings)?
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Command::Search { tag, text, json } => {
            let items = run_search(&orchestrator, &settings, tag, &text, &cancel).await;
            for item in &items {
                if json {
                    println!("{}", serde_json::to_string(item)?);
                } else {
                    print_item(item);
                }
            }
        }
        Command::Run { index, tag, text } => {
            let items = run_search(&orchestrator, &settings, tag, &text, &cancel).await;
            let Some(item) = index.checked_sub(1).and_then(|i| items.get(i)) else {
                bail!("No result #{} ({} results)", index, items.len());
            };
            let operation = item
                .default_operation()
                .with_context(|| format!("\"{}\" has no operations", item.display_name))?;
            ActionHandler::with_system_launcher(orchestrator)
                .invoke(operation, &cancel)
                .await?;
            println!("{}: {}", operation.name(), item.display_name);
        }
        Command::SignIn => {
            ActionHandler::with_system_launcher(orchestrator)
                .invoke(&Operation::SignIn, &cancel)
                .await?;
            println!("Signed in");
        }
        Command::SignOut => {
            ActionHandler::with_system_launcher(orchestrator)
                .invoke(&Operation::SignOut, &cancel)
                .await?;
            println!("Signed out");
        }
    }

    Ok(())
}

fn build_orchestrator(settings: &SearchSettings) -> Result<SearchOrchestrator> {
    let local = settings
        .local_host_command
        .clone()
        .map(|command| Arc::new(BridgeClient::new(command)) as Arc<dyn LocalMailClient>);

    let remote = match GraphCredentials::load() {
        Ok(credentials) => Some(
            Arc::new(GraphClient::from_credentials(&credentials)?) as Arc<dyn RemoteMailClient>
        ),
        Err(e) => {
            warn!("Online mailbox not configured: {:#}", e);
            None
        }
    };

    Ok(SearchOrchestrator::new(local, remote))
}

async fn run_search(
    orchestrator: &SearchOrchestrator,
    settings: &SearchSettings,
    tag: String,
    text: &[String],
    cancel: &CancellationToken,
) -> Vec<ResultItem> {
    let request = SearchRequest::new(text.join(" "), tag);
    orchestrator.search(request, settings, cancel).collect().await
}

fn print_item(item: &ResultItem) {
    let operations: Vec<&str> = item.operations.iter().map(Operation::name).collect();
    println!("{:>6.0}  {}", item.score, item.display_name);
    println!("        {}  [{}]", item.subtitle, operations.join(", "));
}
