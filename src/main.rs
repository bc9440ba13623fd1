//! Muxwright CLI entry point.
//!
//! This binary provides the `muxwright` command for building and managing
//! tmux workspaces described in workspace files.

use clap::Parser;
use env_logger::Env;
use muxwright::cli::{Action, Cli};
use muxwright::dispatch::DispatchHandle;
use muxwright::error::Result;
use muxwright::memory::MemoryMux;
use muxwright::mux::{Multiplexer, SharedMux};
use muxwright::orchestrator::{BuildReport, KillOutcome, Orchestrator, Restarted};
use muxwright::poll::FakeClock;
use muxwright::prompt::TerminalPrompt;
use muxwright::runtime::RuntimeFiles;
use muxwright::tmux::Tmux;
use muxwright::{MuxError, MuxwrightError, loader, register};
use std::sync::Arc;

/// Oldest tmux with every command and flag the backend uses.
const MIN_TMUX: (u32, u32) = (3, 0);

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(Env::default().filter_or("MUXWRIGHT_LOG", cli.log_filter()))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: &Cli) -> Result<()> {
    let config_dir = loader::config_dir()?;
    let settings = loader::load_settings(&config_dir)?;

    if let Some(ref file) = cli.register {
        let exe = std::env::current_exe()?;
        let wrapper = register::register(file, &settings.bin_dir()?, &exe)?;
        println!("Registered {}", wrapper.display());
        return Ok(());
    }

    let action = cli.action()?;
    let arg = cli
        .workspace
        .as_deref()
        .ok_or_else(|| MuxwrightError::Usage("no workspace given".into()))?;
    let path = loader::resolve_workspace(arg, &settings.workspaces_dir(&config_dir))?;
    let loaded = loader::load_workspace(&path, cli.parse_mode())?;
    log::info!("loaded {} from {}", loaded.config.name, loaded.path.display());
    let defaults = settings.default_options()?;
    let name = loaded.config.name.clone();

    let memory = cli.dry_run.then(|| Arc::new(MemoryMux::new()));
    let mux: SharedMux = match &memory {
        Some(memory) => Arc::clone(memory) as SharedMux,
        None => {
            let tmux = Tmux::new(&settings.tmux);
            check_version(&tmux)?;
            Arc::new(tmux)
        }
    };

    let mut orchestrator = Orchestrator::new(loaded.config, mux)
        .with_poll_policy(settings.poll_policy())
        .with_restart_grace(settings.restart_grace())
        .with_default_options(defaults);
    orchestrator = if cli.dry_run {
        orchestrator.with_clock(Arc::new(FakeClock::new()))
    } else {
        orchestrator.with_runtime(RuntimeFiles::for_workspace(&name)?)
    };

    let result = run_action(cli, action, &orchestrator);
    if let Some(memory) = memory {
        for line in memory.commands() {
            println!("tmux {}", line);
        }
    }
    result
}

/// Fail early when tmux is missing or too old.
fn check_version(tmux: &Tmux) -> Result<()> {
    let version = match tmux.version() {
        Ok(version) => version,
        Err(MuxError::Spawn(message)) => return Err(MuxwrightError::TmuxNotFound(message)),
        Err(e) => return Err(e.into()),
    };
    log::debug!("tmux version {}", version.raw);
    if !version.at_least(MIN_TMUX.0, MIN_TMUX.1) {
        return Err(MuxwrightError::UnsupportedVersion {
            found: version.raw,
            required: format!("{}.{}", MIN_TMUX.0, MIN_TMUX.1),
        });
    }
    Ok(())
}

fn run_action(cli: &Cli, action: Action, orchestrator: &Orchestrator) -> Result<()> {
    let name = orchestrator.config().name.clone();
    match action {
        Action::Start => {
            let report = orchestrator.start()?;
            summarize(&name, &report);
            finish(cli, orchestrator, &name, report.dispatches)
        }
        Action::Subsession(sub) => {
            let opened = orchestrator.open_subsession(&sub)?;
            finish(cli, orchestrator, &opened.session, opened.dispatch.into_iter().collect())
        }
        Action::Status => {
            for status in orchestrator.status() {
                println!("{}", status);
            }
            Ok(())
        }
        Action::Stop => {
            if orchestrator.stop()? {
                println!("Stopped {}", name);
            } else {
                println!("{} is not running", name);
            }
            Ok(())
        }
        Action::Kill => {
            let prompt = TerminalPrompt { assume_yes: cli.yes };
            match orchestrator.kill(&prompt)? {
                KillOutcome::Killed(sessions) if sessions.is_empty() => {
                    println!("Nothing to kill for {}", name)
                }
                KillOutcome::Killed(sessions) => {
                    for session in sessions {
                        println!("Killed {}", session);
                    }
                }
                KillOutcome::Declined => println!("Aborted"),
                KillOutcome::NotConfirmed => {
                    eprintln!("Not killing {}: cannot ask for confirmation, pass --yes", name)
                }
            }
            Ok(())
        }
        Action::Restart(target) => match orchestrator.restart(target.as_deref())? {
            Restarted::Session(report) => {
                summarize(&name, &report);
                finish(cli, orchestrator, &name, report.dispatches)
            }
            Restarted::Subsession { outcome, discrepancies } => {
                if let Some(target) = target {
                    println!("Restarted {}", target);
                }
                if !discrepancies.is_empty() {
                    eprintln!("{} pane(s) could not be re-attached", discrepancies.len());
                }
                drain(outcome.into_handle().into_iter().collect());
                Ok(())
            }
        },
        Action::Refresh => {
            let report = orchestrator.refresh()?;
            summarize(&name, &report);
            println!("Refreshed {}", name);
            Ok(())
        }
    }
}

fn summarize(name: &str, report: &BuildReport) {
    if !report.is_clean() {
        eprintln!(
            "{} built with {} problem(s); see warnings above",
            name,
            report.discrepancies.len()
        );
    }
}

/// Attach unless headless, then wait for delayed commands.
fn finish(
    cli: &Cli,
    orchestrator: &Orchestrator,
    session: &str,
    dispatches: Vec<DispatchHandle>,
) -> Result<()> {
    let attached = if cli.headless {
        Ok(())
    } else {
        orchestrator.attach(session)
    };
    drain(dispatches);
    attached
}

fn drain(dispatches: Vec<DispatchHandle>) {
    if !dispatches.is_empty() {
        log::info!("waiting for {} delayed command(s)", dispatches.len());
    }
    for handle in dispatches {
        let label = handle.label().to_string();
        log::debug!("{}: {:?}", label, handle.wait());
    }
}
