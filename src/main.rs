use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubegrab::output::ConsoleSink;
use tubegrab::{deps, interactive, Cli, Config, Orchestrator, PipelineError, Request};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not failures
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize tracing; stdout is reserved for progress and results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            println!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(secs) = cli.timeout {
        config.app.engine_timeout_secs = Some(secs);
    }

    if cli.show_config {
        config.display();
        return Ok(true);
    }

    if cli.interactive {
        tokio::task::spawn_blocking(move || interactive::run(&config)).await??;
        return Ok(true);
    }

    let Some(url) = cli.url else {
        anyhow::bail!("A video URL is required");
    };
    let output_dir = cli
        .output
        .unwrap_or_else(|| config.app.default_output_dir.clone());
    let request = Request::new(url, output_dir)
        .video(!cli.no_video)
        .audio(!cli.no_audio);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping download");
            on_interrupt.cancel();
        }
    });

    tracing::info!("Starting download for URL: {}", request.locator);

    let orchestrator = Orchestrator::from_config(&config);
    let sink = Arc::new(ConsoleSink::new(cli.quiet));

    match orchestrator.run(request, sink, cancel).await {
        Ok(_) => Ok(true),
        Err(PipelineError::MissingDependencies(tools)) => {
            println!();
            println!("{}", deps::install_hint(&tools));
            Ok(false)
        }
        Err(_) => Ok(false),
    }
}
