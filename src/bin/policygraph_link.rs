use std::env;

use policygraph::core::services::LinkerEvent;
use policygraph::{PolicyGraphConfig, PolicyGraphEngine};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<String> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--verbose" | "-v" => verbose = true,
            "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let default_level = if verbose { "policygraph=info" } else { "policygraph=warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .init();

    let config = PolicyGraphConfig::load_from(config_path.as_deref())?;
    eprintln!("Linking complaints ({} backend, top_k={})", config.store_backend, config.link_top_k);

    let engine = PolicyGraphEngine::new(config).await?;
    engine.initialize().await?;

    let (tx, mut rx) = mpsc::channel::<LinkerEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let LinkerEvent::LinkCreated(link) = event {
                eprintln!(
                    "   {} -> {} (rank {}, score {:.3})",
                    link.complaint_id, link.document_id, link.rank, link.score
                );
            }
        }
    });

    let result = engine.link_complaints_with_events(tx).await;
    let _ = printer.await;
    engine.shutdown().await?;

    let report = result?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.complaints_failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_help() {
    println!("policygraph-link: rebuild RELATED_TO edges between complaints and documents");
    println!();
    println!("USAGE:");
    println!("    policygraph-link [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>   Config file (default: policygraph.toml, then POLICYGRAPH_* env)");
    println!("    -v, --verbose         Log linker progress to stderr");
    println!("        --help            Print this help");
}
