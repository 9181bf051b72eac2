//! Command-line interface for deepthink
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! deepthink run NVDA AMD --max-iterations 6
//! deepthink show NVDA
//! deepthink export NVDA --output nvda.json
//! deepthink reset NVDA
//! ```

mod progress;

use anyhow::Context as _;
use chrono::Utc;
use clap::{Parser, Subcommand};
use deepthink_agents::{AgentSuite, AgentsConfig};
use deepthink_core::{Result as CoreResult, SubjectId};
use deepthink_memory::{MemoryStore, SessionDefaults, export_file_name};
use deepthink_policy::{DecisionPolicy, PolicyConfig};
use deepthink_utils::{AppConfig, init_tracing};
use deepthink_workflow::{CycleExecutor, FinalResult, write_summary};
use progress::{ProgressPrinter, iterations_table, session_overview};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "deepthink")]
#[command(about = "Iterative investment research driven by a decision policy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Research one or more subjects until they are summarized
    Run {
        /// Ticker symbols, e.g. NVDA
        #[arg(required = true)]
        subjects: Vec<String>,

        /// Iteration cap for this run
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Minimum confidence for a focus area to count as covered
        #[arg(long)]
        confidence_threshold: Option<f64>,

        /// Required focus areas for new sessions, comma separated
        #[arg(long)]
        focuses: Option<String>,

        /// Do not write the summary report to the results directory
        #[arg(long)]
        no_report: bool,
    },
    /// Show the stored session of a subject
    Show { subject: String },
    /// Discard the stored session of a subject
    Reset { subject: String },
    /// Copy the stored session of a subject to a file
    Export {
        subject: String,

        /// Destination file, defaults to the exports directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.log);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            subjects,
            max_iterations,
            confidence_threshold,
            focuses,
            no_report,
        } => {
            let subjects = parse_subjects(&subjects)?;

            let mut policy = PolicyConfig::builder();
            if let Some(max) = max_iterations {
                policy = policy.max_iterations(max);
            }
            if let Some(threshold) = confidence_threshold {
                policy = policy.confidence_threshold(threshold);
            }
            let policy = policy.build()?;
            let max_iterations = policy.max_iterations;

            let defaults = focuses
                .as_deref()
                .map_or_else(SessionDefaults::default, SessionDefaults::from_list);
            let store = MemoryStore::open(&config.memory_dir, defaults).await?;
            let agents = AgentSuite::openai_from_env(AgentsConfig::default().with_env())
                .context("failed to set up research agents")?;

            let executor = CycleExecutor::new(
                store,
                DecisionPolicy::new(policy),
                agents.fetcher,
                agents.analyzer,
                agents.summarizer,
            )
            .with_advisor(agents.advisor)
            .with_event_handler(Arc::new(ProgressPrinter));

            info!(subjects = subjects.len(), max_iterations, "Starting research");
            let results = executor.run_many(&subjects, max_iterations).await;

            let all_complete = report_all(&config, results, no_report).await;

            Ok(if all_complete {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Show { subject } => {
            let subject = SubjectId::new(&subject)?;
            let store = MemoryStore::open(&config.memory_dir, SessionDefaults::default()).await?;
            let session = store.load(&subject).await?;

            println!("{}", session_overview(&session));
            if session.iterations.is_empty() {
                println!("\nNo iterations recorded.");
            } else {
                println!("\n{}", iterations_table(&session));
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Reset { subject } => {
            let subject = SubjectId::new(&subject)?;
            let store = MemoryStore::open(&config.memory_dir, SessionDefaults::default()).await?;
            store.reset(&subject).await?;
            println!("Session for {subject} reset.");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Export { subject, output } => {
            let subject = SubjectId::new(&subject)?;
            let store = MemoryStore::open(&config.memory_dir, SessionDefaults::default()).await?;
            let path = output.unwrap_or_else(|| {
                config
                    .exports_dir
                    .join(export_file_name(&subject, Utc::now()))
            });
            let path = store.export(&subject, &path).await?;
            println!("Session for {subject} exported to {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn parse_subjects(raw: &[String]) -> CoreResult<Vec<SubjectId>> {
    raw.iter().map(SubjectId::new).collect()
}

/// Report every run; returns whether all of them completed and were reported
///
/// A summary that cannot be written is printed instead, so it is not lost
/// when the session is already COMPLETE.
async fn report_all(
    config: &AppConfig,
    results: Vec<(SubjectId, CoreResult<FinalResult>)>,
    no_report: bool,
) -> bool {
    let mut all_complete = true;
    for (subject, result) in results {
        match result {
            Ok(result) => {
                all_complete &= result.is_complete();
                if let Err(e) = report(config, &subject, &result, no_report).await {
                    all_complete = false;
                    error!(subject = %subject, error = %e, "Failed to write summary report");
                    eprintln!("[{subject}] could not write summary report: {e}");
                    if let Some(summary) = &result.summary_text {
                        println!("\n{summary}");
                    }
                }
            }
            Err(e) => {
                all_complete = false;
                error!(subject = %subject, error = %e, "Run failed");
                eprintln!("[{subject}] error: {e}");
            }
        }
    }
    all_complete
}

/// Print the outcome of one run and write its summary report
async fn report(
    config: &AppConfig,
    subject: &SubjectId,
    result: &FinalResult,
    no_report: bool,
) -> anyhow::Result<()> {
    let Some(summary) = &result.summary_text else {
        match &result.session.failure_reason {
            Some(reason) => println!("[{subject}] {}: {reason}", result.session.status),
            None => println!(
                "[{subject}] session is already {}; run `deepthink reset {subject}` to start over",
                result.session.status
            ),
        }
        return Ok(());
    };

    if no_report {
        println!("\n{summary}");
    } else {
        let path = write_summary(&config.results_dir, subject, summary).await?;
        println!("[{subject}] summary written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "deepthink",
            "run",
            "nvda",
            "amd",
            "--max-iterations",
            "3",
            "--no-report",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                subjects,
                max_iterations,
                confidence_threshold,
                no_report,
                ..
            } => {
                assert_eq!(subjects, vec!["nvda", "amd"]);
                assert_eq!(max_iterations, Some(3));
                assert_eq!(confidence_threshold, None);
                assert!(no_report);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_requires_subject() {
        assert!(Cli::try_parse_from(["deepthink", "run"]).is_err());
    }

    #[test]
    fn test_parse_subjects_normalizes() {
        let subjects = parse_subjects(&["brk.b".to_string(), "tsla".to_string()]).unwrap();
        assert_eq!(subjects[0].as_str(), "BRK.B");
        assert_eq!(subjects[1].as_str(), "TSLA");
        assert!(parse_subjects(&["../etc".to_string()]).is_err());
    }

    fn complete(subject: &SubjectId) -> FinalResult {
        let mut session = deepthink_core::Session::new(subject.clone(), vec![]);
        session.status = deepthink_core::SessionStatus::Complete;
        FinalResult {
            session,
            summary_text: Some(format!("# Investment Summary for {subject}\n")),
        }
    }

    #[tokio::test]
    async fn test_report_all_continues_after_write_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            results_dir: tmp.path().to_path_buf(),
            ..AppConfig::default()
        };
        let amd = SubjectId::new("AMD").unwrap();
        let nvda = SubjectId::new("NVDA").unwrap();
        // a directory in place of the report file makes the AMD write fail
        std::fs::create_dir(tmp.path().join("AMD_summary.md")).unwrap();

        let all_complete = report_all(
            &config,
            vec![(amd.clone(), Ok(complete(&amd))), (nvda.clone(), Ok(complete(&nvda)))],
            false,
        )
        .await;

        assert!(!all_complete);
        let written = std::fs::read_to_string(tmp.path().join("NVDA_summary.md")).unwrap();
        assert!(written.starts_with("# Investment Summary for NVDA"));
    }

    #[tokio::test]
    async fn test_report_all_unwritable_results_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("results");
        std::fs::write(&blocker, "not a directory").unwrap();
        let config = AppConfig {
            results_dir: blocker,
            ..AppConfig::default()
        };
        let subject = SubjectId::new("TSLA").unwrap();

        assert!(
            !report_all(&config, vec![(subject.clone(), Ok(complete(&subject)))], false).await
        );
        assert!(report_all(&config, vec![(subject.clone(), Ok(complete(&subject)))], true).await);
    }

    #[tokio::test]
    async fn test_report_writes_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            results_dir: tmp.path().to_path_buf(),
            ..AppConfig::default()
        };
        let subject = SubjectId::new("AMD").unwrap();
        let mut session = deepthink_core::Session::new(subject.clone(), vec![]);
        session.status = deepthink_core::SessionStatus::Complete;
        let result = FinalResult {
            session,
            summary_text: Some("# Investment Summary for AMD\n".to_string()),
        };

        report(&config, &subject, &result, false).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join("AMD_summary.md"))
            .await
            .unwrap();
        assert!(written.starts_with("# Investment Summary for AMD"));
    }
}
