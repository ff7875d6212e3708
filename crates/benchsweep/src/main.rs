//! benchsweep: resumable N-run benchmark sweeps.

use std::process::ExitCode;

use benchsweep_cli::ui;
use benchsweep_core::exit_codes;
use benchsweep_lib::{app, config, errors};

fn main() -> ExitCode {
    let config = match config::AppConfig::try_parse_args() {
        Ok(config) => config,
        Err(e) => {
            let code = if e.use_stderr() {
                exit_codes::ERROR_INVALID
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            return exit_code(code);
        }
    };

    let default_level = if config.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    match app::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = errors::exit_code(&err);
            if code == exit_codes::ERROR_CANCELED {
                ui::print_warning("cancelled; progress is saved, rerun the same command to resume");
            } else {
                ui::print_error(&format!("{err:#}"));
            }
            exit_code(code)
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
