//! sage CLI entry point.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use sage::cli::{self, Cli, EXIT_OK, OkEnvelope, exit_code_for, render_error};
use sage::commands::{self, Context};
use sage::tracing::{TracingConfig, TracingFormat, init_tracing};
use tokio_util::sync::CancellationToken;

fn main() {
    // NOTE: tracing may be unusable during a panic, so print directly.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = rt.block_on(run(cli));
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    let config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            cli.log_format
        },
        level: cli.level.into(),
        ..Default::default()
    };
    if let Err(e) = init_tracing(config) {
        eprintln!("{e:?}");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping running commands");
            on_signal.cancel();
        }
    });

    let result = match Context::discover(cli.force_refetch, cancel) {
        Ok(ctx) => commands::execute(&cli.command, &ctx).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(outcome) => {
            if cli.json {
                match serde_json::to_string(&OkEnvelope::new(&outcome)) {
                    Ok(json) => println!("{json}"),
                    Err(e) => eprintln!("Error serializing response: {e}"),
                }
            } else {
                print!("{}", outcome.render_text());
            }
            EXIT_OK
        }
        Err(err) => {
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    }
}
