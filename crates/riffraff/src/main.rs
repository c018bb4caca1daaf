//! riffraff-artefact binary.
//!
//! Packages a project into a RiffRaff artifact and, on CI, publishes the
//! bundle and its build manifest to S3.

// CLI binary needs to output to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use riffraff::cli::{self, CliError, EXIT_OK, exit_code_for, render_error};
use riffraff::commands::{self, CommandContext};
use riffraff::tracing::{TracingConfig, init_tracing};

fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();

    let tracing_config = TracingConfig {
        format: cli.log_format(),
        level: cli.level.into(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let exit_code = match run_with_tokio(&cli) {
        Ok(()) => EXIT_OK,
        Err(err) => {
            ::tracing::error!(error = %err, "riffraff-artefact failed");
            render_error(&err, cli.json);
            exit_code_for(&err)
        }
    };
    std::process::exit(exit_code);
}

/// Create tokio runtime and run the selected command
fn run_with_tokio(cli: &cli::Cli) -> Result<(), CliError> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::other(format!("Failed to create tokio runtime: {e}")))?;

    let ctx = CommandContext::new(cli.root.clone(), commands::working_dir()?);
    let output = rt.block_on(commands::execute(cli.command(), &ctx))?;
    println!("{}", output.render(cli.json)?);
    Ok(())
}
