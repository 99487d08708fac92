use std::error::Error;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pyscope_core::config::InspectorConfig;
use pyscope_core::stack::{detect_interpreter, StackInspector};
use pyscope_core::target::{StaticTarget, Target};
use pyscope_core::types::{ThreadId, ThreadStack};
use pyscope_utils::{info, init_logging_with_settings, LogFormat, LogLevel, LogSettings, LoggingGuard};

mod snapshot;

use snapshot::Snapshot;

/// Rebuild Python call stacks from a captured process snapshot.
#[derive(Parser, Debug)]
#[command(name = "pyscope")]
#[command(version)]
#[command(about = "Rebuild Python call stacks from a captured process snapshot", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
    /// Log format: pretty or json (overrides PYSCOPE_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Print the Python stack of every attached thread
    Stacks
    {
        /// Path to the snapshot document
        snapshot: PathBuf,
        /// Only print this OS thread
        #[arg(long)]
        thread: Option<u64>,
        /// Stop a walk after this many frames (overrides PYSCOPE_MAX_FRAME_DEPTH)
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Print the detected interpreter module and version family
    Version
    {
        /// Path to the snapshot document
        snapshot: PathBuf,
    },
}

fn main() -> ExitCode
{
    let cli = Cli::parse();

    // The guard has to outlive the command so the file writer can flush
    let _guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run_command(cli, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) -> Result<LoggingGuard, Box<dyn Error>>
{
    let mut settings = LogSettings::from_env()?;
    if let Some(level) = cli.log_level {
        settings = settings.with_level(level);
    }
    if let Some(format) = cli.log_format {
        settings = settings.with_format(format);
    }
    Ok(init_logging_with_settings(&settings)?)
}

fn run_command(cli: Cli, out: &mut impl Write) -> Result<(), Box<dyn Error>>
{
    match cli.command {
        Commands::Stacks {
            snapshot,
            thread,
            max_depth,
        } => {
            let mut config = InspectorConfig::from_env()?;
            if let Some(depth) = max_depth {
                config = config.with_max_frame_depth(depth);
            }
            let inspector = StackInspector::attach(load_target(&snapshot)?, config)?;

            match thread {
                Some(tid) => print_thread(&inspector, ThreadId(tid), out),
                None => {
                    for stack in inspector.resolve_all_threads()? {
                        print_stack(&stack, out)?;
                    }
                    Ok(())
                }
            }
        }
        Commands::Version { snapshot } => {
            let module = detect_interpreter(&load_target(&snapshot)?)?;
            writeln!(out, "{module}")?;
            Ok(())
        }
    }
}

fn load_target(path: &Path) -> Result<StaticTarget, Box<dyn Error>>
{
    info!("Loading snapshot {}", path.display());
    Ok(Snapshot::load(path)?.into_target()?)
}

fn print_thread(
    inspector: &StackInspector<StaticTarget>,
    tid: ThreadId,
    out: &mut impl Write,
) -> Result<(), Box<dyn Error>>
{
    let threads = inspector.target().threads()?;
    let thread = threads
        .iter()
        .find(|thread| thread.id == tid)
        .ok_or_else(|| format!("Thread {tid} is not in the snapshot"))?;

    match inspector.resolve_thread(thread)? {
        Some(stack) => print_stack(&stack, out)?,
        None => writeln!(out, "[x] Not python thread")?,
    }
    Ok(())
}

fn print_stack(stack: &ThreadStack, out: &mut impl Write) -> io::Result<()>
{
    writeln!(out, "Thread {} (thread state {})", stack.thread, stack.thread_state)?;
    for frame in &stack.frames {
        writeln!(out, "    {frame}")?;
    }
    Ok(())
}
