//! Operator CLI for the Bio Patrol task runtime.
//!
//! Exposes exactly the submission surface the runtime crate offers —
//! `submit`, `cancel`, `get` — over an in-process [`Runtime`] built from
//! a small set of standalone fleets. There is no config-file loader and
//! no HTTP server here; this binary exists so the runtime is runnable
//! and inspectable standalone, the same role `gator-cli` plays for
//! gator's orchestrator core.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use biopatrol_core::engine::EngineConfig;
use biopatrol_core::external::{AlwaysValidBioSensor, InMemoryScanRecorder, LoggingNotifier};
use biopatrol_core::fleet::FleetRegistry;
use biopatrol_core::runtime::{Runtime, RuntimeDeps};
use biopatrol_core::task::TaskSpec;

mod standalone_fleet;

use standalone_fleet::StandaloneFleet;

#[derive(Parser)]
#[command(name = "biopatrol", about = "Bio Patrol task runtime CLI")]
struct Cli {
    /// Robot ids this process has a standalone fleet connection for.
    #[arg(long, global = true, default_value = "R1", value_delimiter = ',')]
    robots: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a task read from a JSON file and print its final snapshot.
    Submit {
        /// Path to a JSON-encoded `TaskSpec`.
        task_file: PathBuf,
    },
    /// Request cancellation of a task by id.
    Cancel { task_id: String },
    /// Print the current snapshot of a task by id.
    Get { task_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut fleets = FleetRegistry::new();
    for robot_id in &cli.robots {
        fleets.register(robot_id.clone(), Arc::new(StandaloneFleet::new(robot_id.clone())));
    }

    let scan_recorder = Arc::new(InMemoryScanRecorder::new());
    let deps = RuntimeDeps {
        bio_sensor: Arc::new(AlwaysValidBioSensor::new(scan_recorder.clone())),
        scan_recorder,
        notifier: Arc::new(LoggingNotifier),
        config: EngineConfig::default(),
    };
    let runtime = Runtime::new(fleets, deps);

    let result = run_command(&runtime, cli.command).await;
    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run_command(runtime: &Runtime, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Submit { task_file } => {
            let contents = std::fs::read_to_string(&task_file)
                .with_context(|| format!("reading task spec from {}", task_file.display()))?;
            let spec: TaskSpec = serde_json::from_str(&contents)
                .with_context(|| format!("parsing task spec from {}", task_file.display()))?;
            let task_id = runtime.submit(spec).await;

            // Poll until terminal; this CLI is a thin inspection tool, not
            // a long-running client, so a simple poll loop is enough.
            loop {
                let task = runtime
                    .get(&task_id)
                    .await
                    .context("task vanished after submission")?;
                if task.status.is_terminal() {
                    println!("{}", serde_json::to_string_pretty(&task)?);
                    return Ok(());
                }
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
        Commands::Cancel { task_id } => {
            match runtime.cancel(&task_id).await {
                Ok(()) => println!("task {task_id} cancellation requested"),
                Err(e) => println!("task {task_id} cancel failed: {e}"),
            }
            Ok(())
        }
        Commands::Get { task_id } => {
            let task = runtime.get(&task_id).await.context("task not found")?;
            println!("{}", serde_json::to_string_pretty(&task)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use biopatrol_core::task::TaskStatus;

    fn make_runtime() -> Arc<Runtime> {
        let mut fleets = FleetRegistry::new();
        fleets.register("R1", Arc::new(StandaloneFleet::new("R1".to_string())));

        let scan_recorder = Arc::new(InMemoryScanRecorder::new());
        let deps = RuntimeDeps {
            bio_sensor: Arc::new(AlwaysValidBioSensor::new(scan_recorder.clone())),
            scan_recorder,
            notifier: Arc::new(LoggingNotifier),
            config: EngineConfig::default(),
        };
        Runtime::new(fleets, deps)
    }

    #[tokio::test]
    async fn submit_reads_task_file_and_runs_to_completion() {
        let runtime = make_runtime();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"task_id":"cli-t1","robot_id":"R1","steps":[{{"step_id":"s1","action":"return_home","params":null}}]}}"#
        )
        .unwrap();

        run_command(&runtime, Commands::Submit { task_file: file.path().to_path_buf() })
            .await
            .unwrap();

        let task = runtime.get("cli-t1").await.unwrap();
        assert_eq!(task.status, TaskStatus::Done);
    }

    #[tokio::test]
    async fn get_unknown_task_is_an_error() {
        let runtime = make_runtime();
        let result = run_command(&runtime, Commands::Get { task_id: "ghost".to_string() }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cancel_unknown_task_reports_failure_without_bubbling_an_error() {
        let runtime = make_runtime();
        let result = run_command(&runtime, Commands::Cancel { task_id: "ghost".to_string() }).await;
        assert!(result.is_ok());
    }
}
