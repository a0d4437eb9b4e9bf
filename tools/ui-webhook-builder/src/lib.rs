pub mod cancellation;
pub mod config;
pub mod elicitation;
pub mod errors;
pub mod fields;
pub mod log_retention;
pub mod logging;
pub mod payload;
pub mod prompt;
pub mod recording;
pub mod runtime;
pub mod script;
pub mod step_identity;

use cancellation::{race_cancellation, shutdown_signal, RaceOutcome};
use clap::{error::ErrorKind, Parser};
use config::{load_config, CliOverrides};
use elicitation::{elicit, ElicitationOutcome};
use errors::BuilderError;
use logging::{append_run_log, init_run_log, JsonlLogger};
use payload::{assemble, render_payload, summarize, write_payload, CredentialSummary};
use recording::read_recording;
use runtime::{ProductionRuntime, Terminal};
use script::{generate_script, write_script};
use serde_json::json;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Parser)]
#[command(name = "ui-webhook-builder")]
#[command(version)]
#[command(about = "A CLI tool to build Akeyless UI webhooks from Chrome DevTools recordings")]
pub struct Cli {
    /// Path to the recording JSON file
    #[arg(short = 'f', long = "file")]
    pub file: PathBuf,
    /// Optional TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory for custom_logic.sh and payload.json (defaults to the current directory)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Entry point for the binary: runs the interactive flow on a blocking task
/// and races it against SIGINT/SIGTERM.
pub fn run() -> Result<i32, BuilderError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| BuilderError::Io(e.to_string()))?;
    let runtime = Arc::new(ProductionRuntime::new());

    let executor = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .map_err(|e| BuilderError::Internal(e.to_string()))?;

    let outcome = executor.block_on(async move {
        let work = tokio::task::spawn_blocking(move || run_with_runtime(&args, &cwd, &runtime));
        race_cancellation(work, shutdown_signal()).await
    });

    match outcome {
        RaceOutcome::Completed(Ok(result)) => result,
        RaceOutcome::Completed(Err(join_error)) => {
            Err(BuilderError::Internal(join_error.to_string()))
        }
        RaceOutcome::Cancelled => {
            prompt::restore_terminal();
            append_run_log("info", "run.cancelled", json!({ "source": "signal" }));
            // The prompt thread is still parked on terminal input.
            executor.shutdown_background();
            Ok(0)
        }
    }
}

pub fn run_with_runtime(
    args: &[OsString],
    cwd: &Path,
    runtime: &ProductionRuntime,
) -> Result<i32, BuilderError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(BuilderError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        output_dir: cli.output_dir.clone(),
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;
    init_run_log(JsonlLogger::from_config(&cfg.logging, &cfg.output.dir));

    let recording_path = if cli.file.is_absolute() {
        cli.file.clone()
    } else {
        cwd.join(&cli.file)
    };
    append_run_log(
        "info",
        "run.started",
        json!({
            "recording": recording_path.display().to_string(),
            "output_dir": cfg.output.dir.display().to_string()
        }),
    );

    let recording = read_recording(runtime.file_system.as_ref(), &recording_path)?;
    append_run_log(
        "info",
        "recording.loaded",
        json!({
            "steps": recording.steps.len(),
            "change_steps": recording.change_steps().count()
        }),
    );

    if !runtime.terminal.stdin_is_tty() {
        return Err(BuilderError::Cli(
            "field mapping requires an interactive terminal".to_string(),
        ));
    }

    let mapping = match elicit(
        runtime.prompter.as_ref(),
        runtime.terminal.as_ref(),
        &recording.steps,
    )? {
        ElicitationOutcome::Completed(mapping) => mapping,
        ElicitationOutcome::Cancelled => return Ok(0),
    };

    for field in mapping.missing_required() {
        append_run_log(
            "warn",
            "mapping.required.empty",
            json!({ "field": field.as_str() }),
        );
    }

    let script = generate_script(&mapping, &cfg.generator)?;
    write_script(
        runtime.file_system.as_ref(),
        &cfg.output.script_path(),
        &script,
    )?;
    runtime.terminal.write_line(&format!(
        "Bash script generated: {}",
        cfg.output.script_file
    ))?;

    let summary = summarize(&mapping, &recording);
    let payload = render_payload(&assemble(&summary, &recording))?;
    write_payload(
        runtime.file_system.as_ref(),
        &cfg.output.payload_path(),
        &payload,
    )?;

    report_outputs(
        runtime.terminal.as_ref(),
        &cfg.output.script_file,
        &cfg.output.payload_file,
        &summary,
    )?;
    append_run_log("info", "run.completed", json!({}));
    Ok(0)
}

fn report_outputs(
    terminal: &dyn Terminal,
    script_file: &str,
    payload_file: &str,
    summary: &CredentialSummary,
) -> Result<(), BuilderError> {
    terminal.write_line("")?;
    terminal.write_line("Output files generated successfully:")?;
    terminal.write_line(&format!(
        "1. {script_file} - The bash script for credential rotation"
    ))?;
    terminal.write_line(&format!(
        "2. {payload_file} - The initial payload for the rotation process"
    ))?;
    terminal.write_line("")?;
    terminal.write_line("Password change summary:")?;
    terminal.write_line(&format!("Username: {}", summary.username))?;
    terminal.write_line(&format!("Old password: {}", summary.old_password))?;
    terminal.write_line(&format!(
        "New password field value: {}",
        summary.new_password
    ))?;
    terminal.write_line("")?;
    terminal.write_line(&format!(
        "Note: The 'password' field in {payload_file} contains the new password for the NEXT rotation."
    ))
}
