use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use epicevents::cli::app::App;
use epicevents::cli::prompt::StdinPrompter;
use epicevents::cli::{Boundary, Cli};
use epicevents::core::config::AppConfig;
use epicevents::core::telemetry::{FileReporter, Reporters, TracingReporter};

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    let mut app = App::from_config(&config).context("Failed to start epicevents")?;

    let mut reporters = Reporters::new().with(TracingReporter);
    if let Some(path) = &config.error_log {
        reporters = reporters.with(FileReporter::new(path));
    }
    let arguments: Vec<String> = std::env::args().skip(1).collect();
    let boundary = Boundary {
        reporter: &reporters,
        arguments: &arguments,
    };

    let outcome = boundary.execute(
        &mut app,
        &cli.command,
        &mut StdinPrompter::stdio(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    );
    Ok(outcome.exit_status(config.strict_exit_codes))
}
