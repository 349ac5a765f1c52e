use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use mediavault::compressor::FfmpegCompressor;
use mediavault::label::FinderLabelAnnotator;
use mediavault::orchestrator::{ProgressEvent, ProjectOrchestrator};
use mediavault::prober::FfprobeProber;
use mediavault::utils::{format_duration, format_file_size, init_logging};
use mediavault::{AppConfig, scan};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "mediavault", about = "Queued media compression with verification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a project from video files or folders
    Add {
        /// Project name
        name: String,
        /// Video files or directories to scan
        inputs: Vec<PathBuf>,
        /// Where to place compressed files (default: next to the inputs)
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Scan directories recursively
        #[arg(long, default_value_t = true)]
        recursive: bool,
    },
    /// List all projects in the queue
    List,
    /// Process every pending project
    Start,
    /// Show queue counters and aggregate results
    Status,
    /// Compare two directory trees without touching the queue
    Verify {
        original: PathBuf,
        converted: PathBuf,
    },
    /// Remove a project from the queue
    Remove { id: String },
    /// Move a project to a new position
    Reorder { id: String, index: usize },
    /// Remove all projects
    Clear,
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();
    let cli = Cli::parse();

    let config = AppConfig::load();
    let orchestrator = ProjectOrchestrator::new(
        config,
        Arc::new(FfmpegCompressor::new()),
        Arc::new(FfprobeProber::new()),
        Arc::new(FinderLabelAnnotator),
    );

    match cli.command {
        Command::Add {
            name,
            inputs,
            output_dir,
            recursive,
        } => add_project(&orchestrator, name, inputs, output_dir, recursive),
        Command::List => {
            list_projects(&orchestrator);
            Ok(())
        }
        Command::Start => run_queue(&orchestrator),
        Command::Status => {
            print_status(&orchestrator);
            Ok(())
        }
        Command::Verify {
            original,
            converted,
        } => run_verify(&orchestrator, &original, &converted),
        Command::Remove { id } => {
            if !orchestrator.remove_project(&id) {
                bail!("could not remove project {id}");
            }
            println!("Removed {id}");
            Ok(())
        }
        Command::Reorder { id, index } => {
            if !orchestrator.reorder_project(&id, index) {
                bail!("could not move project {id} to position {index}");
            }
            println!("Moved {id} to position {index}");
            Ok(())
        }
        Command::Clear => {
            if !orchestrator.clear_queue() {
                bail!("cannot clear the queue while it is processing");
            }
            println!("Queue cleared");
            Ok(())
        }
    }
}

fn add_project(
    orchestrator: &ProjectOrchestrator,
    name: String,
    inputs: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    recursive: bool,
) -> anyhow::Result<()> {
    if inputs.is_empty() {
        bail!("no inputs given");
    }

    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(scan::scan_directory(&input, recursive));
        } else if input.is_file() {
            files.push(input);
        } else {
            bail!("input not found: {}", input.display());
        }
    }
    if files.is_empty() {
        bail!("no video files found in the given inputs");
    }

    let count = files.len();
    let id = orchestrator.create_project(
        name,
        files,
        output_dir.unwrap_or_default(),
        None,
        BTreeMap::new(),
    );
    println!("Created project {id} with {count} file(s)");
    Ok(())
}

fn list_projects(orchestrator: &ProjectOrchestrator) {
    let entries = orchestrator.list_projects();
    if entries.is_empty() {
        println!("Queue is empty");
        return;
    }

    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{:>3}. [{:^19}] {} ({}) - {} file(s)",
            index,
            entry.status,
            entry.project.name,
            entry.project.id,
            entry.project.input_files.len()
        );
        if let Some(stats) = &entry.results {
            println!(
                "     {} -> {} ({:.1}% smaller) in {}",
                format_file_size(stats.total_input_size),
                format_file_size(stats.total_output_size),
                stats.average_reduction_percent,
                format_duration(stats.processing_secs)
            );
            if let Some(error) = &stats.error {
                println!("     error: {error}");
            }
            if let Some(verification) = &stats.verification {
                match &verification.skip_reason {
                    Some(reason) => println!("     verification: {reason}"),
                    None => println!(
                        "     verification: {}/{} matched, originals deleted",
                        verification.matches, verification.total
                    ),
                }
            }
        }
    }
}

fn run_queue(orchestrator: &ProjectOrchestrator) -> anyhow::Result<()> {
    let started = orchestrator.start(Box::new(|event| match event {
        ProgressEvent::File {
            file,
            file_progress,
            project_progress,
            ..
        } => {
            // One line per finished file; sub-file ticks stay in the log
            if (file_progress - 1.0).abs() < f32::EPSILON {
                println!(
                    "  {} done ({:.0}% of project)",
                    file.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| file.display().to_string()),
                    f64::from(project_progress) * 100.0
                );
            }
        }
        ProgressEvent::Project {
            project_id,
            status,
            run_progress,
        } => {
            println!(
                "Project {project_id}: {status} ({:.0}% of run)",
                run_progress * 100.0
            );
        }
    }));
    if !started {
        bail!("nothing to process: queue is empty, already running, or has no pending projects");
    }

    while orchestrator.is_processing() {
        std::thread::sleep(Duration::from_millis(200));
    }

    print_status(orchestrator);
    Ok(())
}

fn print_status(orchestrator: &ProjectOrchestrator) {
    let counts = orchestrator.queue_status();
    println!(
        "Projects: {} total | {} pending, {} processing, {} verifying, {} completed, {} failed, {} canceled, {} verification failed",
        counts.total,
        counts.pending,
        counts.processing,
        counts.verifying,
        counts.completed,
        counts.failed,
        counts.canceled,
        counts.verification_failed
    );

    let summary = orchestrator.results_summary();
    if summary.completed_projects > 0 {
        println!(
            "Completed: {} project(s), {} file(s), {} -> {} ({:.1}% smaller), total time {}",
            summary.completed_projects,
            summary.total_files_processed,
            format_file_size(summary.total_input_size),
            format_file_size(summary.total_output_size),
            summary.average_reduction_percent,
            format_duration(summary.total_processing_secs)
        );
    }
}

fn run_verify(
    orchestrator: &ProjectOrchestrator,
    original: &std::path::Path,
    converted: &std::path::Path,
) -> anyhow::Result<()> {
    let report = orchestrator.verify_trees(original, converted);
    if report.is_empty() {
        println!("No media files found to verify");
        return Ok(());
    }

    let mut matches = 0usize;
    for record in &report {
        let name = record
            .original_file
            .as_deref()
            .or(record.converted_file.as_deref())
            .context("verification record without any path")?;
        println!("[{}] {}", record.status, name.display());
        for mismatch in &record.mismatches {
            println!("    - {mismatch}");
        }
        if record.is_match() {
            matches += 1;
        }
    }

    println!("{matches}/{} matched", report.len());
    if matches != report.len() {
        bail!("verification found issues");
    }
    Ok(())
}
