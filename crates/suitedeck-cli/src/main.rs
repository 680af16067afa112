use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::Parser;
use clap::Subcommand;
use suitedeck_core::Config;
use suitedeck_core::EnvironmentCheck;
use suitedeck_core::LoggingConfig;
use suitedeck_core::Notice;
use suitedeck_core::PanelAction;
use suitedeck_core::PanelEffect;
use suitedeck_core::PanelState;
use suitedeck_core::RuntimeAction;
use suitedeck_core::StreamKind;
use suitedeck_core::StreamPhase;
use suitedeck_core::UserAction;
use suitedeck_exec::ConsoleBackend;
use suitedeck_exec::Controller;
use suitedeck_exec::HttpBackend;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod ui;

#[derive(Parser)]
#[command(name = "suitedeck")]
#[command(version, about = "Browse an allow-listed test project and run its suites")]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base url, overriding the config file
    #[arg(long, global = true, env = "SUITEDECK_BACKEND_URL")]
    backend: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List project roots
    Roots,
    /// List one directory
    Tree { path: Option<String> },
    /// Show runnability and available tags of a file
    Tags { file: String },
    /// Print the text of a project file
    Show { file: String },
    /// Check whether the backend machine can run the suites
    Check,
    /// Run one allow-listed suite with one tag
    Run {
        file: String,
        #[arg(short, long)]
        tag: Option<String>,
    },
    /// Run every suite tagged `regression`, streaming its console
    Regression,
    /// Install the project requirements, streaming pip output
    Install,
    /// Print the log url of the most recent run
    Log,
    /// Delete stored run outputs on the backend
    ClearRuns,
    /// Interactive console (default)
    Tui,
}

fn main() {
    match run() {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Returns the process exit code; `run` passes the suite's return code through.
fn run() -> Result<i32, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(url) = cli.backend {
        config.backend.base_url = url;
    }
    let command = cli.command.unwrap_or(Command::Tui);
    let interactive = matches!(command, Command::Tui);
    init_tracing(&config.logging, cli.verbose, !interactive)?;
    tracing::debug!(backend = %config.backend.base_url, "configuration resolved");

    let backend = HttpBackend::new(&config.backend)?;
    let state = PanelState::new(config.gate.build_gate());
    let chunk_bytes = config.backend.stream_chunk_bytes;

    match command {
        Command::Roots => {
            for root in backend.roots()? {
                let marker = if root.is_extra { "file" } else { "root" };
                println!("{marker}\t{}", root.rel);
            }
            Ok(0)
        }
        Command::Tree { path } => {
            let dir = suitedeck_core::normalize_path(path.as_deref().unwrap_or_default());
            for entry in backend.list_directory(&dir)?.entries {
                let kind = match entry.kind {
                    suitedeck_core::EntryKind::Directory => "dir",
                    suitedeck_core::EntryKind::File => "file",
                };
                println!("{kind}\t{}", entry.rel);
            }
            Ok(0)
        }
        Command::Tags { file } => {
            let mut controller = Controller::new(backend, state, chunk_bytes);
            controller.boot();
            controller.dispatch(PanelAction::User(UserAction::FileSelected(file)));
            let selection = &controller.state().selection;
            println!("phase\t{}", selection.phase.label());
            for tag in selection.available_tags.iter() {
                let marker = if selection.selected_tag.as_deref() == Some(tag) {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {tag}");
            }
            report_notice(controller.state().notice.as_ref());
            Ok(0)
        }
        Command::Show { file } => {
            let content = backend.file_content(&suitedeck_core::normalize_path(&file))?;
            print!("{content}");
            if !content.ends_with('\n') {
                println!();
            }
            Ok(0)
        }
        Command::Check => {
            let mut controller = Controller::new(backend, state, chunk_bytes);
            controller.dispatch(PanelAction::User(UserAction::CheckEnvironmentRequested));
            match &controller.state().environment {
                Some(EnvironmentCheck::Ready(report)) => {
                    for line in report.lines() {
                        println!("{line}");
                    }
                    Ok(if report.ok { 0 } else { 1 })
                }
                _ => Err(notice_error(controller.state().notice.as_ref())),
            }
        }
        Command::Run { file, tag } => {
            let mut controller = Controller::new(backend, state, chunk_bytes);
            controller.boot();
            controller.dispatch(PanelAction::User(UserAction::FileSelected(file)));
            if let Some(tag) = tag {
                controller.dispatch(PanelAction::User(UserAction::TagChanged(tag)));
            }
            let before = controller.state().last_run.clone();
            controller.dispatch(PanelAction::User(UserAction::RunRequested));

            let state = controller.state();
            match &state.last_run {
                Some(record) if state.last_run != before => {
                    if let Some(tail) = record.stdout_tail.as_deref() {
                        println!("{tail}");
                    }
                    if let Some(tail) = record.stderr_tail.as_deref().filter(|t| !t.is_empty()) {
                        eprintln!("{tail}");
                    }
                    if let Some(locator) = record.locator() {
                        println!("log\t{}", controller.backend().resolve_locator(locator));
                    }
                    match record.returncode {
                        Some(rc) => Ok(rc),
                        None => Err("backend did not report a return code".into()),
                    }
                }
                _ => Err(notice_error(state.notice.as_ref())),
            }
        }
        Command::Regression => {
            stream_command(backend, state, chunk_bytes, StreamKind::Regression).map(|_| 0)
        }
        Command::Install => {
            stream_command(backend, state, chunk_bytes, StreamKind::InstallRequirements).map(|_| 0)
        }
        Command::Log => {
            let mut controller = Controller::new(backend, state, chunk_bytes);
            let effects = controller.dispatch(PanelAction::User(UserAction::OpenLastLog));
            match effects.iter().find_map(|effect| match effect {
                PanelEffect::OpenLog { locator } => Some(locator.clone()),
                _ => None,
            }) {
                Some(locator) => {
                    println!("{}", controller.backend().resolve_locator(&locator));
                    Ok(0)
                }
                None => Err(notice_error(controller.state().notice.as_ref())),
            }
        }
        Command::ClearRuns => {
            let removed = backend.clear_runs()?;
            println!("removed {removed} run(s)");
            Ok(0)
        }
        Command::Tui => ui::run(backend, state, chunk_bytes).map(|_| 0),
    }
}

/// Streams one bulk action to stdout as lines arrive.
fn stream_command(
    backend: HttpBackend,
    state: PanelState,
    chunk_bytes: usize,
    kind: StreamKind,
) -> Result<(), Box<dyn std::error::Error>> {
    let action = match kind {
        StreamKind::Regression => UserAction::RegressionRequested,
        StreamKind::InstallRequirements => UserAction::InstallRequested,
    };
    let mut controller = Controller::new(backend, state, chunk_bytes);
    let mut printed = 0_usize;
    let effects = controller.dispatch_observed(PanelAction::User(action), |state, runtime| {
        let Some(console) = state.console.as_ref() else {
            return;
        };
        if let RuntimeAction::RegressionCountLoaded(Some(count)) = runtime {
            eprintln!("{count} suite(s) tagged regression");
        }
        for line in console.buffer.iter().skip(printed) {
            println!("{}", line.text);
        }
        printed = console.buffer.len();
    });

    let state = controller.state();
    report_notice(state.notice.as_ref());
    for effect in effects {
        if let PanelEffect::OpenLog { locator } = effect {
            println!("log\t{}", controller.backend().resolve_locator(&locator));
        }
    }
    match state.console.as_ref().map(|console| &console.phase) {
        Some(StreamPhase::Closed { .. }) => Ok(()),
        Some(StreamPhase::Failed { message }) => Err(message.clone().into()),
        _ => Err(notice_error(state.notice.as_ref())),
    }
}

fn report_notice(notice: Option<&Notice>) {
    if let Some(notice) = notice {
        eprintln!("{}: {}", notice.level.label(), notice.message);
    }
}

fn notice_error(notice: Option<&Notice>) -> Box<dyn std::error::Error> {
    notice
        .map(|notice| notice.message.clone())
        .unwrap_or_else(|| "request did not complete".to_string())
        .into()
}

/// The TUI owns the terminal, so it only logs when a file is configured.
fn init_tracing(
    config: &LoggingConfig,
    verbose: bool,
    to_stderr: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
    };

    let writer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None if to_stderr => BoxMakeWriter::new(io::stderr),
        None => BoxMakeWriter::new(io::sink),
    };

    let layer = if config.json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_ansi(config.file.is_none())
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry().with(layer).with(filter).init();
    Ok(())
}
