use std::io::Write;
use std::process::ExitCode;

use backprop_oracle::{GeneratorConfig, GradCheckConfig, Oracle, emit, verify_oracle};
use tracing_subscriber::EnvFilter;

fn run() -> backprop_oracle::Result<String> {
    let config = GeneratorConfig::default();
    config.validate()?;

    let oracle = Oracle::evaluate(config.shape, config.seed)?;

    verify_oracle(&oracle, &GradCheckConfig::default())?;

    Ok(emit(&oracle, &config)?.into_string())
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the generated C.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(text) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|()| stdout.flush()) {
                tracing::error!(error = %e, "failed to write fixture");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "generation failed");
            ExitCode::FAILURE
        }
    }
}
