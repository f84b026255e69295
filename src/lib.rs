// src/lib.rs

pub mod cli;
pub mod config;
pub mod display;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod subscription;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_and_validate, resolve_runner_script};
use crate::display::{ConsoleSurface, DisplayAggregator, DisplaySurface};
use crate::engine::stdin::spawn_stdin_transport;
use crate::engine::{Dispatcher, InboundEvent, Router, Runtime};
use crate::exec::{CommandRunner, ExecSettings, ProcessRunner, TaskExecutor, spawn_queue_worker};
use crate::registry::{RegistrySettings, TaskRegistry};
use crate::subscription::{HttpSubscriptionClient, SubscriptionApi};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and runner resolution
/// - registry + queue worker + executor
/// - console display surface and stdin transport
/// - (optional) subscription client
/// - Ctrl-C handling and orderly shutdown
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let script = resolve_runner_script(args.runner.as_deref(), cfg.runner.script.as_deref());

    if args.dry_run {
        print_dry_run(&cfg, &script);
        return Ok(());
    }

    if !script.is_file() {
        bail!("runner script not found: {}", script.display());
    }
    info!(
        script = %script.display(),
        interpreter = %cfg.runner.interpreter,
        allowed_users = cfg.allowed_user_count(),
        "starting taskrelay"
    );

    let runner: Arc<dyn ProcessRunner> = Arc::new(CommandRunner::new(&cfg.runner.interpreter, &script));
    let (registry, queue) = TaskRegistry::new(RegistrySettings::from(&cfg), Arc::clone(&runner));

    let console = Arc::new(ConsoleSurface::new());
    let surface: Arc<dyn DisplaySurface> = console.clone();
    let display = Arc::new(DisplayAggregator::new(Arc::clone(&registry), surface));

    let executor = TaskExecutor::new(
        Arc::clone(&registry),
        Arc::clone(&runner),
        Arc::clone(&display),
        ExecSettings::from(&cfg),
    );
    let shutdown = CancellationToken::new();
    let worker = spawn_queue_worker(executor, queue, shutdown.clone());

    let mut dispatcher = Dispatcher::new(Router::from_config(&cfg), Arc::clone(&registry), display)
        .with_runner_script(script);
    if let Some(settings) = cfg.subscription.clone() {
        let client: Arc<dyn SubscriptionApi> = Arc::new(HttpSubscriptionClient::new(settings)?);
        dispatcher = dispatcher.with_subscription(client);
    }

    let (event_tx, event_rx) = mpsc::channel::<InboundEvent>(64);

    // Ctrl-C → graceful shutdown.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(InboundEvent::ShutdownRequested).await;
        });
    }
    let _transport = spawn_stdin_transport(args.user, console, event_tx);

    Runtime::new(event_rx, Arc::new(dispatcher)).run().await?;

    // Stop taking new items, cancel what is running, let it render.
    shutdown.cancel();
    registry.cancel_all().await;
    if let Err(e) = worker.await {
        warn!(error = %e, "queue worker ended abnormally");
    }
    info!("taskrelay stopped");
    Ok(())
}

/// Print the effective configuration without starting anything.
fn print_dry_run(cfg: &ConfigFile, script: &Path) {
    println!("taskrelay dry-run");
    println!();
    println!("runner:");
    println!(
        "  script: {} ({})",
        script.display(),
        if script.is_file() { "found" } else { "missing" }
    );
    println!("  interpreter: {}", cfg.runner.interpreter);
    println!("  timeout: {:?}", cfg.runner.timeout);
    println!("  kill_grace: {:?}", cfg.runner.kill_grace);
    println!("  cleanup_grace: {:?}", cfg.runner.cleanup_grace);
    println!("  status_interval: {:?}", cfg.runner.status_interval);
    println!();
    println!("queue:");
    println!("  capacity: {}", cfg.queue.capacity);
    println!("  when_full: {:?}", cfg.queue.when_full);
    println!();
    if cfg.access.allowed_users.is_empty() {
        println!("access: open to everyone");
    } else {
        println!("access: {} allowed user(s)", cfg.allowed_user_count());
    }
    println!("targets: {}", cfg.target_pattern.as_str());
    println!("subscription links: {}", cfg.link_pattern.as_str());
    match &cfg.subscription {
        Some(sub) => println!("subscription: {} (timeout {:?})", sub.endpoint, sub.timeout),
        None => println!("subscription: disabled"),
    }
}
