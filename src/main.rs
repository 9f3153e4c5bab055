mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::Commands;
use commands::{run_diff, run_matrix, DiffArgs, RunArgs};
use settings::RunOverrides;

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> ExitCode {
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Run {
            page,
            viewport,
            workers,
            output_dir,
            pass_threshold,
            output,
        } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received; finishing in-flight tasks");
                    on_signal.cancel();
                }
            });

            run_matrix(
                RunArgs {
                    config: args.config,
                    page,
                    viewport,
                    overrides: RunOverrides {
                        workers,
                        output_dir,
                        pass_threshold,
                    },
                    format: args.format,
                    output,
                },
                cancel,
            )
            .await
        }
        Commands::Diff {
            captured,
            reference,
            threshold,
            include_aa,
            pass_threshold,
            diff_output,
            output,
        } => run_diff(DiffArgs {
            captured,
            reference,
            threshold,
            include_aa,
            pass_threshold,
            diff_output,
            format: args.format,
            output,
        }),
    }
}
