use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use serde_json::Value;
use target_jsonl::{json_text, persist_messages, TargetConfig, TargetError, TracingDiagnostics};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "target-jsonl")]
#[command(about = "Validate tap output and write it to JSONL files or S3", version)]
struct Cli {
    /// JSON config file; every setting has a default.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), "{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), TargetError> {
    let config = TargetConfig::load(cli.config.as_deref())?;
    let stdin = io::stdin().lock();
    let state = persist_messages(&config, stdin, None, Box::new(TracingDiagnostics)).await?;
    if let Some(state) = state {
        emit_state(&state)?;
    }
    Ok(())
}

fn emit_state(state: &Value) -> Result<(), TargetError> {
    let line = json_text::to_text(state)?;
    tracing::debug!(state = %line, "emitting state");

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")
        .and_then(|()| stdout.flush())
        .map_err(|source| TargetError::Io {
            path: PathBuf::from("<stdout>"),
            source,
        })
}
