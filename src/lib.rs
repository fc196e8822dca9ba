// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod files;
pub mod logging;
pub mod pipeline;
pub mod reload;
pub mod serve;
pub mod tasks;
pub mod watch;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, Mode};
use crate::engine::BuildResult;
use crate::watch::WatchBindings;

pub use crate::pipeline::Pipeline;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - the build session (graph, cache, reloader)
/// - the subcommand: build, watch, clean, serve, or the default
///   clean + build + serve + watch flow
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let pipeline = Pipeline::new(cfg, Mode::from_flag(args.production))?;

    if args.dry_run {
        let bindings = pipeline.standard_bindings()?;
        print_dry_run(&pipeline, &bindings);
        return Ok(());
    }

    match args.command {
        Some(Command::Build) => {
            let result = pipeline.build().await?;
            ensure_success(&result)
        }
        Some(Command::Watch) => pipeline.watch(pipeline.standard_bindings()?).await,
        Some(Command::Clean) => pipeline.clean(),
        Some(Command::Serve { open }) => {
            let settings = pipeline.config().server.clone();
            let server = serve::serve(&settings, pipeline.output_root(), pipeline.reloader().clone());
            if open {
                open_browser(&settings.url());
            }
            tokio::select! {
                res = server => res,
                _ = tokio::signal::ctrl_c() => {
                    info!("stopping dev server");
                    Ok(())
                }
            }
        }
        None => default_flow(&pipeline, args.open).await,
    }
}

/// Clean, build everything, then serve and watch until Ctrl-C.
async fn default_flow(pipeline: &Pipeline, open: bool) -> Result<()> {
    let result = pipeline.build().await?;
    ensure_success(&result)?;

    let settings = pipeline.config().server.clone();
    let root = pipeline.output_root();
    let reloader = pipeline.reloader().clone();
    let server = tokio::spawn(async move {
        if let Err(e) = serve::serve(&settings, root, reloader).await {
            warn!("dev server stopped: {e:#}");
        }
    });

    if open {
        open_browser(&pipeline.config().server.url());
    }

    let watched = pipeline.watch(pipeline.standard_bindings()?).await;
    server.abort();
    watched
}

/// Turn a run with a fatal failure into an error carrying the first one.
fn ensure_success(result: &BuildResult) -> Result<()> {
    if result.is_success() {
        return Ok(());
    }
    let task = result.first_fatal.as_deref().unwrap_or("<unknown>");
    match result.first_fatal_error() {
        Some(err) => Err(anyhow!("build failed: {err}")),
        None => Err(anyhow!("build failed in task '{task}'")),
    }
}

fn open_browser(url: &str) {
    match open::that_detached(url) {
        Ok(()) => info!(url, "opened browser"),
        Err(e) => warn!(url, "could not open browser: {e}"),
    }
}

/// Dry-run output: mode, output root, tasks with deps and units, bindings.
fn print_dry_run(pipeline: &Pipeline, bindings: &WatchBindings) {
    let graph = pipeline.graph();

    println!("assetflow dry-run");
    println!("  mode = {}", pipeline.mode());
    println!("  output root = {}", pipeline.output_root().display());
    println!(
        "  watch.triggered_while_running_behaviour = {:?}",
        pipeline.config().watch.triggered_while_running_behaviour
    );
    println!("  watch.queue_length = {}", pipeline.config().watch.queue_length);
    println!();

    println!("tasks ({}):", graph.topological_order().len());
    for name in graph.topological_order() {
        println!("  - {name}");
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
        if let Some(node) = graph.node(name) {
            let labels: Vec<String> = node.units.iter().map(|u| u.label()).collect();
            println!("      units: {labels:?}");
        }
    }
    println!();

    println!("watch bindings ({}):", bindings.len());
    for binding in bindings.iter() {
        println!("  - {:?} -> {:?}", binding.patterns(), binding.tasks());
    }

    debug!("dry-run complete (no execution)");
}
