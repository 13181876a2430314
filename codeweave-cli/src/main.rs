mod apply;
mod args;

use anyhow::Context;
use args::Args;
use clap::Parser;
use codeweave_core::config;
use codeweave_core::protocol::ProjectSnapshot;
use codeweave_core::{CompletionOrchestrator, CompletionRequest, Outcome, SinkEvent, StreamEvent};
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only model output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = config::load_from_path(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let orchestrator = Arc::new(CompletionOrchestrator::from_config(&config)?);

    let snapshot = load_snapshot(&args)?;
    let request = build_request(&args, &snapshot);

    tracing::info!(
        config_path = %args.config.display(),
        providers = ?orchestrator.chain().provider_ids(),
        "starting request"
    );

    let (mut events, handle) = orchestrator.orchestrate_stream(request);
    let mut stdout = std::io::stdout();
    let mut streamed_text = false;

    while let Some(event) = events.recv().await {
        match event {
            SinkEvent::ProviderStart { provider, position } => {
                if streamed_text {
                    // A failover discards what the previous provider printed
                    writeln!(stdout)?;
                    streamed_text = false;
                }
                tracing::info!(provider = %provider, position, "provider responding");
            }
            SinkEvent::Event {
                event: StreamEvent::TextDelta(text),
            } if !args.structured => {
                write!(stdout, "{}", text)?;
                stdout.flush()?;
                streamed_text = true;
            }
            SinkEvent::Event { .. } => {}
        }
    }
    if streamed_text {
        writeln!(stdout)?;
    }

    let outcome = handle.await.context("request task failed")??;
    match outcome {
        Outcome::ChatMessage { tool_calls, .. } => {
            for call in tool_calls {
                println!("tool call {} {}", call.name, call.arguments);
            }
        }
        Outcome::StructuredResult { files } => {
            println!("{}", serde_json::to_string_pretty(&files)?);
            if args.apply {
                let root = std::env::current_dir().context("resolving working directory")?;
                let report = apply::write_edits(&root, &files)?;
                tracing::info!(
                    created = ?report.created,
                    updated = ?report.updated,
                    "applied edits"
                );
            }
        }
    }

    Ok(())
}

fn load_snapshot(args: &Args) -> anyhow::Result<ProjectSnapshot> {
    let mut snapshot = ProjectSnapshot::new();
    for path in &args.files {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        snapshot.insert(path.to_string_lossy(), content);
    }
    Ok(snapshot)
}

fn build_request(args: &Args, snapshot: &ProjectSnapshot) -> CompletionRequest {
    let mut request = if args.structured {
        CompletionRequest::structured(&args.prompt)
    } else {
        CompletionRequest::chat(&args.prompt)
    };
    if let Some(system) = &args.system {
        request = request.with_system_instruction(system);
    }
    if args.deterministic {
        request = request.deterministic();
    }
    request.with_project(snapshot)
}
