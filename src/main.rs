use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use goatd_installer::collector::{collect_plan, ConfigCollector, TerminalCollector};
use goatd_installer::config::answers::load_answer_file;
use goatd_installer::config::loader::resolve_settings;
use goatd_installer::hardware::{DeviceProbe, LsblkProbe};
use goatd_installer::orchestrator::phases::preflight;
use goatd_installer::orchestrator::{load_checkpoint, Orchestrator, Outcome};
use goatd_installer::{
    AppError, CollectionError, InstallPlan, InstallState, InstallerSettings, LogCollector, LogLine,
    Redactor, SystemRunner,
};

/// Exit code for a run that reached a failed step.
const EXIT_INSTALL_FAILED: u8 = 1;
/// Exit code for input, settings or preflight problems (nothing was changed).
const EXIT_NOT_STARTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "goatd-installer", version, about = "Unattended Arch Linux installer")]
struct Cli {
    /// Settings file (TOML); defaults to ~/.config/goatd-installer/settings.toml
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log every command instead of running it
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect a plan and install
    Install {
        /// Answer file for an unattended run; prompts interactively when absent
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Validate an answer file and print the resulting plan
    Plan {
        #[arg(long)]
        answers: PathBuf,
    },
    /// Print the last recorded installation state
    Status,
    /// List candidate installation disks
    Probe,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            return ExitCode::from(EXIT_NOT_STARTED);
        }
    };

    match runtime.block_on(dispatch(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_NOT_STARTED)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut settings =
        resolve_settings(cli.settings.as_deref()).context("failed to load installer settings")?;
    settings.dry_run |= cli.dry_run;

    match cli.command {
        Command::Install { answers, yes } => install(settings, answers.as_deref(), yes).await,
        Command::Plan { answers } => {
            let plan = plan_from_answers(&answers, &LsblkProbe::new())?;
            println!("{}", plan.summary());
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let state = load_checkpoint(&settings.state_file)
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            print_report(&state);
            Ok(ExitCode::SUCCESS)
        }
        Command::Probe => {
            let disks = LsblkProbe::new().list_disks()?;
            if disks.is_empty() {
                println!("No disks found");
            }
            for disk in disks {
                println!("{}", disk);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn install(
    settings: InstallerSettings,
    answers: Option<&Path>,
    assume_yes: bool,
) -> anyhow::Result<ExitCode> {
    let redactor = Redactor::new();
    let collector = init_logging(&settings, redactor.clone())?;
    log::info!("GOATd Installer {} logging initialized", goatd_installer::VERSION);
    if settings.dry_run {
        log::warn!("Dry run: commands are logged, not executed");
    }

    let probe = LsblkProbe::new();
    let plan = match gather_plan(answers, assume_yes, &probe) {
        Ok(plan) => plan,
        Err(CollectionError::Aborted) => {
            println!("Installation aborted, nothing was changed.");
            let _ = collector.wait_for_empty();
            return Ok(ExitCode::from(EXIT_NOT_STARTED));
        }
        Err(e) => {
            log::error!("Plan collection failed: {}", e);
            let _ = collector.wait_for_empty();
            return Err(anyhow::Error::new(e).context("invalid installation plan"));
        }
    };

    for secret in plan.secrets() {
        redactor.register(secret);
    }

    if let Err(e) = preflight(&plan, &settings) {
        log::error!("{}", e);
        let _ = collector.wait_for_empty();
        eprintln!("{}", e.user_message());
        return Ok(ExitCode::from(EXIT_NOT_STARTED));
    }

    let runner = Arc::new(SystemRunner::new(settings.dry_run));
    let checkpoint = Some(settings.state_file.clone());
    let orchestrator =
        Orchestrator::new(runner, settings, redactor).with_checkpoint(checkpoint);

    let result = orchestrator.run(&plan).await;
    if let Err(ref e) = result {
        log::error!("[Orchestrator] run aborted: {}", e);
    }

    if let Err(e) = collector.wait_for_empty() {
        eprintln!("Warning: log flush incomplete: {}", e);
    }
    // let the console task print what is already queued
    tokio::task::yield_now().await;

    match result {
        Ok(ref state) => print_report(state),
        Err(ref e) => eprintln!(
            "{}; steps may have run, manual recovery is required",
            e.user_message()
        ),
    }
    println!("Full log: {}", collector.full_log_path().display());

    Ok(ExitCode::from(run_exit_code(&result)))
}

/// Exit code once the orchestrator has been started.
fn run_exit_code(result: &Result<InstallState, AppError>) -> u8 {
    match result {
        Ok(state) if state.outcome == Outcome::Succeeded => 0,
        // An orchestrator error can follow executed steps
        _ => EXIT_INSTALL_FAILED,
    }
}

fn gather_plan(
    answers: Option<&Path>,
    assume_yes: bool,
    probe: &dyn DeviceProbe,
) -> Result<InstallPlan, CollectionError> {
    match answers {
        Some(path) => {
            let plan = plan_from_answers(path, probe)?;
            if assume_yes {
                println!("{}", plan.summary());
                return Ok(plan);
            }
            let mut terminal = TerminalCollector::stdio();
            if terminal.confirm(&plan)? {
                Ok(plan)
            } else {
                Err(CollectionError::Aborted)
            }
        }
        None => {
            let mut terminal = TerminalCollector::stdio();
            collect_plan(&mut terminal, probe)
        }
    }
}

fn plan_from_answers(path: &Path, probe: &dyn DeviceProbe) -> Result<InstallPlan, CollectionError> {
    let disks = probe.list_disks()?;
    if disks.is_empty() {
        return Err(CollectionError::NoDisks);
    }
    load_answer_file(path)?.into_builder().build(&disks)
}

/// Install the LogCollector as the global logger and echo parsed lines.
fn init_logging(settings: &InstallerSettings, redactor: Redactor) -> anyhow::Result<LogCollector> {
    let (console_tx, mut console_rx) = mpsc::channel::<LogLine>(1024);
    let collector = LogCollector::new(settings.log_dir.clone(), console_tx, redactor)
        .map_err(|e| anyhow::anyhow!("LogCollector initialization failed: {}", e))?;

    if let Err(e) = log::set_boxed_logger(Box::new(collector.clone()))
        .map(|()| log::set_max_level(log::LevelFilter::Info))
    {
        eprintln!("Warning: failed to register global logger: {}", e);
    }

    tokio::spawn(async move {
        while let Some(line) = console_rx.recv().await {
            if line.is_parsed() {
                println!("[{}] {}", line.timestamp, line.message);
            }
        }
    });

    Ok(collector)
}

fn print_report(state: &InstallState) {
    println!("Run {}: {}", state.run_id, state.outcome);
    let numbers = |steps: &[goatd_installer::StepId]| {
        steps
            .iter()
            .map(|s| s.number().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  completed: [{}]", numbers(&state.completed_steps));
    println!("  skipped:   [{}]", numbers(&state.skipped_steps));
    for (role, path) in &state.derived_paths {
        println!("  {:<15} {}", role.as_str(), path);
    }
    if let Outcome::FailedAt { step, cause } = &state.outcome {
        println!("Step {} failed ({}). Manual recovery is required.", step, cause.kind());
    }
}
