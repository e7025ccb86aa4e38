use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use markload_core::{ContentKind, EnqueueRequest, QueueError, QueueState, ReadyItem};
use markload_engine::{ArtifactWriter, JsonFileStore, Orchestrator};
use markload_logging::{markload_debug, markload_info, markload_warn};

use crate::cli::{AddArgs, Command};
use crate::config::CliConfig;

pub async fn execute(command: Command, config: &CliConfig) -> Result<()> {
    let store = Arc::new(JsonFileStore::new(&config.state_path));
    markload_debug!("Queue state file {}", store.path().display());
    let orchestrator = Orchestrator::from_config(store, &config.engine_config())
        .context("setting up the conversion client")?;
    let writer = ArtifactWriter::new(config.output_dir.clone());

    match command {
        Command::Add(args) => {
            let no_wait = args.no_wait;
            let request = build_request(args)?;
            if no_wait {
                // Every claimed item has its job id on disk before the runtime
                // shuts down; the next `run` resumes polling.
                let id = orchestrator.enqueue_deferred(request)?;
                orchestrator.drain().await?;
                println!("queued {id}");
            } else {
                let id = orchestrator.enqueue(request).await?;
                println!("queued {id}");
                run_until_idle(&orchestrator, &writer).await?;
            }
        }
        Command::Run => {
            orchestrator.drain().await?;
            run_until_idle(&orchestrator, &writer).await?;
        }
        Command::List => print_state(&orchestrator.snapshot()?),
        Command::Retry { id } => {
            orchestrator.retry(id).await?;
            run_until_idle(&orchestrator, &writer).await?;
        }
        Command::Remove { id } => {
            let item = orchestrator.remove(id)?;
            println!("removed {} ({})", item.id, item.url);
        }
        Command::Deliver { id } => {
            let item = orchestrator
                .snapshot()?
                .ready_item(id)
                .cloned()
                .ok_or(QueueError::ReadyNotFound(id))?;
            let path = deliver(&orchestrator, &writer, item)?;
            println!("{}", path.display());
        }
        Command::Discard { id } => {
            let item = orchestrator.remove_ready(id)?;
            println!("discarded {} ({})", item.id, item.filename);
        }
    }
    Ok(())
}

fn build_request(args: AddArgs) -> Result<EnqueueRequest> {
    let kind = match (args.kind, &args.file) {
        (Some(kind), _) => kind,
        (None, Some(_)) => ContentKind::LocalPdf,
        (None, None) => ContentKind::Article,
    };
    let html = args
        .html_file
        .map(|path| {
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        })
        .transpose()?;
    let cookies = (!args.cookies.is_empty()).then(|| args.cookies.into_iter().collect());

    Ok(EnqueueRequest {
        url: args.url,
        kind,
        filename: args.filename,
        cookies,
        html,
        file_path: args.file,
    })
}

/// Waits for every drain and poller to finish, then writes all ready items.
async fn run_until_idle(orchestrator: &Orchestrator, writer: &ArtifactWriter) -> Result<()> {
    orchestrator.wait_idle().await;

    let state = orchestrator.snapshot()?;
    for item in state.ready {
        let path = deliver(orchestrator, writer, item)?;
        println!("{}", path.display());
    }
    for item in state.queue.iter().filter(|item| item.error.is_some()) {
        markload_warn!(
            "Item {} ({}) failed: {}",
            item.id,
            item.url,
            item.error.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

/// Writes the artifact, then takes it off the ready list. A failed write leaves
/// it on the list.
fn deliver(
    orchestrator: &Orchestrator,
    writer: &ArtifactWriter,
    item: ReadyItem,
) -> Result<PathBuf> {
    let path = writer
        .write(&item.filename, &item.markdown)
        .with_context(|| format!("writing {} to {}", item.filename, writer.dir().display()))?;
    orchestrator.deliver(item.id)?;
    markload_info!("Delivered item {} to {}", item.id, path.display());
    Ok(path)
}

fn print_state(state: &QueueState) {
    if state.queue.is_empty() && state.ready.is_empty() {
        println!("queue is empty");
        return;
    }
    for item in &state.queue {
        let detail = item
            .error
            .as_deref()
            .or(item.job_status.as_deref())
            .unwrap_or("");
        println!(
            "{:>14}  {:<10}  {:<9}  {}  {}",
            item.id,
            item.status.to_string(),
            item.content_type.as_str(),
            item.url,
            detail
        );
    }
    for item in &state.ready {
        println!("{:>14}  {:<10}  {}", item.id, "ready", item.filename);
    }
}
