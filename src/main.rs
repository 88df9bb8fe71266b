//! convoy CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use convoy::cli::{Cli, CommandDispatcher};
use convoy::config::find_project_root;
use convoy::runner::CancellationToken;
use convoy::ui::{ConvoyTheme, OutputMode, TerminalUI, UserInterface};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO, written to stderr
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("convoy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("convoy=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!("convoy starting with args: {:?}", cli);

    let mut ui = TerminalUI::new(OutputMode::from_flags(cli.verbose, cli.quiet, cli.silent));
    if cli.no_color {
        ui = ui.with_theme(ConvoyTheme::plain());
    }

    // Without --project, use the nearest directory holding convoy.yml.
    let project_root = cli.project.clone().unwrap_or_else(|| {
        let cwd = std::env::current_dir().unwrap_or_default();
        find_project_root(&cwd).unwrap_or(cwd)
    });

    // First Ctrl-C stops new steps from starting; hosts that already changed
    // something are still rolled back.
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel("interrupted")) {
        tracing::warn!("could not install Ctrl-C handler: {}", e);
    }

    let dispatcher = CommandDispatcher::new(project_root)
        .with_config(cli.config.clone())
        .with_cancellation(cancel);

    match dispatcher.dispatch(&cli, &mut ui) {
        Ok(result) => ExitCode::from(result.exit_code as u8),
        Err(e) => {
            ui.error(&format!("Error: {}", e));
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
