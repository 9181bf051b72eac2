//! Terminal output for runs and stored sessions

use async_trait::async_trait;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use deepthink_core::{Action, FocusArea, Iteration, PlanningDecision, Session, SubjectId};
use deepthink_workflow::CycleEventHandler;

/// Prints one line per executor event
pub struct ProgressPrinter;

#[async_trait]
impl CycleEventHandler for ProgressPrinter {
    async fn on_iteration_start(&self, subject: &SubjectId, index: usize, focus: &FocusArea) {
        println!("[{subject}] iteration {}: {}", index + 1, focus.title());
    }

    async fn on_iteration_recorded(&self, subject: &SubjectId, iteration: &Iteration) {
        println!("[{subject}]   {}", outcome(iteration));
    }

    async fn on_decision(&self, subject: &SubjectId, decision: &PlanningDecision) {
        println!("[{subject}]   -> {}", describe_decision(decision));
    }

    async fn on_run_complete(&self, session: &Session) {
        println!(
            "[{}] {} after {} iterations ({:.0}% covered)",
            session.subject_id,
            session.status,
            session.iterations.len(),
            session.completion_pct
        );
    }
}

/// Short result of an iteration, e.g. `positive, confidence 0.80`
pub fn outcome(iteration: &Iteration) -> String {
    match &iteration.failure {
        Some(failure) => format!("degraded: {}", failure.message),
        None => format!(
            "{}, confidence {:.2}",
            iteration.analysis_record.sentiment, iteration.analysis_record.confidence
        ),
    }
}

pub fn describe_decision(decision: &PlanningDecision) -> String {
    match (&decision.action, &decision.next_focus) {
        (Action::Continue, Some(focus)) => {
            format!("continue with {} ({})", focus.title(), decision.reasoning)
        }
        _ => format!("{} ({})", decision.action, decision.reasoning),
    }
}

/// Iteration history of a stored session
pub fn iterations_table(session: &Session) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Focus", "Result", "Decision"]);

    for iteration in &session.iterations {
        let decision = iteration
            .planning_decision
            .as_ref()
            .map_or_else(|| "pending".to_string(), describe_decision);
        table.add_row(vec![
            iteration.index.to_string(),
            iteration.focus.title(),
            outcome(iteration),
            decision,
        ]);
    }

    table
}

/// Header lines printed above the iteration table
pub fn session_overview(session: &Session) -> String {
    let state = &session.focus_state;
    let completed: Vec<&str> = state.completed_focuses.iter().map(FocusArea::as_str).collect();
    let required: Vec<&str> = state.required_focuses.iter().map(FocusArea::as_str).collect();

    let mut out = format!(
        "Subject:   {}\nStatus:    {}\nCoverage:  {:.0}%\nRequired:  {}\nCompleted: {}\nUpdated:   {}",
        session.subject_id,
        session.status,
        session.completion_pct,
        required.join(", "),
        if completed.is_empty() {
            "-".to_string()
        } else {
            completed.join(", ")
        },
        session.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if let Some(reason) = &session.failure_reason {
        out.push_str(&format!("\nFailure:   {reason}"));
    }
    out
}
