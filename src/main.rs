use std::process;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use queue_autoscaler::adapters::{HttpQueueDepth, KubernetesScaler};
use queue_autoscaler::cli::{format_dry_run, Args, CliError};
use queue_autoscaler::config::AppConfig;
use queue_autoscaler::scaling::{spawn_controller, Controller};
use queue_autoscaler::server::{create_router, StatusState};

#[tokio::main]
async fn main() {
    // The env file has to be in place before clap reads AUTOSCALER_* fallbacks
    let args = match Args::parse_with_env_file(std::env::args_os()) {
        Ok(args) => args,
        Err(CliError::Args(e)) => e.exit(),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    // Initialize logging
    let filter = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    // Load and validate configuration
    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // Dry-run mode: print effective configuration and exit
    if args.dry_run {
        println!("{}", format_dry_run(&config, &args));
        return;
    }

    if let Err(e) = run(config, args.status_addr.as_deref()).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(config: AppConfig, status_addr: Option<&str>) -> anyhow::Result<()> {
    let name = config.workload_name();
    let queue = HttpQueueDepth::from_settings(&config.queue).context("Failed to set up queue client")?;
    let workload = KubernetesScaler::from_settings(&config.workload)
        .await
        .context("Failed to set up Kubernetes client")?;

    info!(
        "Starting queue-autoscaler for deployment {} (queue: {})",
        name,
        queue.url()
    );

    let controller = Controller::new(
        name.clone(),
        config.scaling.clone(),
        Arc::new(queue),
        Arc::new(workload),
    )?;

    if let Some(addr) = status_addr {
        let state = StatusState::new(config.scaling.clone(), controller.status());
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind status server to {}", addr))?;

        info!("Status server listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, create_router(state)).await {
                error!("Status server error: {}", e);
            }
        });
    }

    let (shutdown, mut handle) = spawn_controller(controller);

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received ctrl-c, stopping {}", name),
                Err(e) => warn!("Failed to listen for ctrl-c, stopping {}: {}", name, e),
            }
            let _ = shutdown.send(true);
            (&mut handle).await.context("Autoscaler task failed")?;
        }
        result = &mut handle => {
            result.context("Autoscaler task failed")?;
        }
    }

    Ok(())
}
