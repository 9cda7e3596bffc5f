use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use upkg::cli::{self, Cli, EXIT_FAILURE, EXIT_OK, exit_code_for, render_error};
use upkg::commands::{self, CommandContext};
use upkg::tracing::{TracingConfig, TracingFormat};

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    #[allow(clippy::print_stderr)]
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    // Argument errors exit with clap's status (2) before anything else runs
    let cli = cli::parse();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            }
            std::process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = rt.block_on(run(cli));
    std::process::exit(exit_code);
}

#[instrument(name = "upkg_run", skip_all)]
async fn run(cli: Cli) -> i32 {
    let tracing_config = TracingConfig {
        format: TracingFormat::from_json_flag(cli.json),
        level: cli.level.into(),
    };
    if let Err(e) = upkg::tracing::init_tracing(tracing_config) {
        render_error(&e);
        return EXIT_FAILURE;
    }

    // Ctrl-C cancels the in-flight transfer; the orchestrator then cleans up
    // its staging directory and reports the cancellation.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, cancelling");
            on_interrupt.cancel();
        }
    });

    let ctx = CommandContext::from_cli(&cli, cancel);
    match commands::execute(cli.command, &ctx).await {
        Ok(summary) => {
            #[allow(clippy::print_stdout)]
            {
                println!("{summary}");
            }
            EXIT_OK
        }
        Err(report) => {
            render_error(&report);
            exit_code_for(&report)
        }
    }
}
