//! procwatch CLI entry point
//!
//! Usage:
//!   procwatch run [-t MS] -- <command> [args...]   Run one command
//!   procwatch batch <manifest.toml>                 Run a manifest concurrently
//!   procwatch config                                Show configuration

use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tokio::sync::{mpsc, oneshot};

use procwatch::cli::{
    commands::{BatchArgs, ConfigArgs, OutputFormat, RunArgs},
    Cli, Commands,
};
use procwatch::config::{find_config_files, load_config, load_manifest, Config};
use procwatch::error::ErrorInfo;
use procwatch::executor::{Completion, CompletionReport, ProcessRunner, RunnerOptions};
use procwatch::logging::init_logging;

/// Exit code when the command was killed for exceeding its timeout
const EXIT_TIMED_OUT: u8 = 124;

/// Exit code when the command could not be started
const EXIT_SPAWN_FAILED: u8 = 127;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.log_level.as_deref(), &config.logging)?;

    match cli.command {
        Commands::Run(args) => run_command(args, &config, cli.verbose).await,
        Commands::Batch(args) => run_batch(args, &config, cli.verbose).await,
        Commands::Config(args) => {
            show_config(args, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run a single command and mirror its result
async fn run_command(args: RunArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let runner = ProcessRunner::with_options(RunnerOptions::from(&config.defaults))?;
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(config.defaults.timeout_ms));
    let (tx, rx) = oneshot::channel();

    let started = runner.run(
        &args.command,
        &args.args,
        timeout,
        (),
        move |completion: Completion<()>| {
            let _ = tx.send(completion);
        },
    );

    match started {
        Ok(id) => {
            if verbose {
                eprintln!(
                    "{}: {} {} (timeout {}ms)",
                    "started".cyan(),
                    id,
                    args.command,
                    timeout.as_millis()
                );
            }
        }
        Err(err) if err.is_spawn_failure() => {
            print_error(&ErrorInfo::from(&err), args.format)?;
            return Ok(ExitCode::from(EXIT_SPAWN_FAILED));
        }
        Err(err) => return Err(err.into()),
    }

    let completion = rx.await.context("Process finished without reporting")?;

    match args.format {
        OutputFormat::Json => {
            let report = CompletionReport::new(display_command(&args), &completion);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Plain => {
            std::io::stdout().write_all(&completion.stdout)?;
            std::io::stderr().write_all(&completion.stderr)?;
        }
        OutputFormat::Table => {
            print_summary_line(&display_command(&args), &completion);
            if !completion.stdout.is_empty() {
                println!("{}:", "stdout".cyan());
                print!("{}", completion.stdout_lossy());
            }
            if !completion.stderr.is_empty() {
                println!("{}:", "stderr".cyan());
                print!("{}", completion.stderr_lossy());
            }
        }
    }

    if verbose {
        eprintln!(
            "{}: {} in {}ms",
            "finished".cyan(),
            completion.id,
            completion.duration.as_millis()
        );
    }

    Ok(exit_code_for(&completion))
}

/// Run every manifest entry concurrently, reporting completions as they arrive
async fn run_batch(args: BatchArgs, config: &Config, verbose: bool) -> Result<ExitCode> {
    let manifest = load_manifest(&args.manifest)
        .with_context(|| format!("Failed to load manifest {}", args.manifest.display()))?;
    let runner = ProcessRunner::with_options(RunnerOptions::from(&config.defaults))?;
    let default_timeout =
        Duration::from_millis(args.timeout_ms.unwrap_or(config.defaults.timeout_ms));

    let (tx, mut rx) = mpsc::unbounded_channel::<Completion<String>>();
    let mut not_started: Vec<(String, ErrorInfo)> = Vec::new();

    for spec in &manifest.commands {
        let tx = tx.clone();
        let result = runner.start(
            spec.to_invocation(default_timeout),
            spec.name.clone(),
            move |completion: Completion<String>| {
                let _ = tx.send(completion);
            },
        );

        match result {
            Ok(id) => {
                if verbose {
                    eprintln!("{}: {} {}", "started".cyan(), id, spec.name);
                }
            }
            Err(err) if err.is_spawn_failure() => {
                if matches!(args.format, OutputFormat::Table) {
                    println!("{} {}: {}", "✗".red(), spec.name, err);
                }
                not_started.push((spec.name.clone(), ErrorInfo::from(&err)));
            }
            Err(err) => return Err(err.into()),
        }
    }
    // Only the handlers hold senders now; the loop ends when all have fired
    drop(tx);

    let mut reports = Vec::with_capacity(manifest.commands.len());
    while let Some(completion) = rx.recv().await {
        match args.format {
            OutputFormat::Table => print_summary_line(&completion.context, &completion),
            OutputFormat::Plain => {
                std::io::stdout().write_all(&completion.stdout)?;
                std::io::stderr().write_all(&completion.stderr)?;
            }
            OutputFormat::Json => {}
        }
        reports.push(CompletionReport::new(completion.context.clone(), &completion));
    }

    // Present results in manifest order regardless of completion order
    let position = |name: &str| manifest.commands.iter().position(|c| c.name == name);
    reports.sort_by_key(|r| position(&r.name));

    let failed = reports.iter().filter(|r| !r.success).count();

    match args.format {
        OutputFormat::Json => {
            let not_started: Vec<_> = not_started
                .iter()
                .map(|(name, info)| serde_json::json!({ "name": name, "error": info }))
                .collect();
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "completed": reports,
                "not_started": not_started,
                "failed": failed,
            }))?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!();
            println!(
                "{}: {} completed, {} failed, {} not started",
                "Summary".cyan(),
                reports.len(),
                failed,
                not_started.len()
            );
        }
        OutputFormat::Plain => {}
    }

    if failed == 0 && not_started.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Show resolved configuration
fn show_config(args: ConfigArgs, config: &Config) -> Result<()> {
    let files = find_config_files();

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "config": config,
                "files": files,
            }))?;
            println!("{}", json);
        }
        OutputFormat::Plain => {
            print!("{}", toml::to_string(config)?);
        }
        OutputFormat::Table => {
            println!("{}:", "Config Files".cyan());
            if files.is_empty() {
                println!("  None (using defaults)");
            } else {
                for file in &files {
                    println!("  - {}", file.display());
                }
            }
            println!();
            println!("{}: {}ms", "Timeout".cyan(), config.defaults.timeout_ms);
            println!(
                "{}: {:?}",
                "Zero Timeout".cyan(),
                config.defaults.zero_timeout
            );
            println!("{}: {}ms", "Drain Grace".cyan(), config.defaults.drain_grace_ms);
            println!(
                "{}: {} ({:?})",
                "Logging".cyan(),
                config.logging.level,
                config.logging.format
            );
        }
    }

    Ok(())
}

fn display_command(args: &RunArgs) -> String {
    std::iter::once(args.command.as_str())
        .chain(args.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_summary_line<C>(name: &str, completion: &Completion<C>) {
    let status = if completion.timed_out {
        "timed out".yellow()
    } else if completion.success() {
        "ok".green()
    } else {
        "failed".red()
    };

    let code = match (completion.exit_code, completion.signal) {
        (Some(code), _) => format!("exit {}", code),
        (None, Some(signal)) => format!("signal {}", signal),
        (None, None) => "no status".to_string(),
    };

    println!(
        "{} {} [{}, {}ms]",
        status,
        name,
        code,
        completion.duration.as_millis()
    );
}

fn print_error(info: &ErrorInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        _ => {
            eprintln!("{}: {}", "error".red().bold(), info.message);
            if let Some(ref suggestion) = info.suggestion {
                eprintln!("{}: {}", "hint".yellow(), suggestion);
            }
        }
    }
    Ok(())
}

/// Map a completion to the process exit code, following `timeout(1)`
fn exit_code_for<C>(completion: &Completion<C>) -> ExitCode {
    if completion.timed_out {
        return ExitCode::from(EXIT_TIMED_OUT);
    }
    match (completion.exit_code, completion.signal) {
        (Some(code), _) => ExitCode::from((code & 0xff) as u8),
        (None, Some(signal)) => ExitCode::from(128u8.saturating_add(signal as u8)),
        (None, None) => ExitCode::FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let args = RunArgs {
            timeout_ms: None,
            format: OutputFormat::Plain,
            command: "echo".to_string(),
            args: vec!["a".to_string(), "b c".to_string()],
        };
        assert_eq!(display_command(&args), "echo a b c");
    }
}
