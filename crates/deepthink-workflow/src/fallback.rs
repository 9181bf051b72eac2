//! Summary used when the summarizer fails

use deepthink_core::{Iteration, SubjectId};

/// Deterministic markdown summary of the recorded iterations
pub fn fallback_summary(subject: &SubjectId, iterations: &[Iteration], error: &str) -> String {
    let mut out = format!(
        "# Investment Summary for {subject}\n\n\
         **Note:** An error occurred during summarization: {error}\n\n\
         Below is a basic summary of the available analyses:\n"
    );

    if iterations.is_empty() {
        out.push_str("\nNo analyses were recorded.\n");
        return out;
    }

    for (i, iteration) in iterations.iter().enumerate() {
        let record = &iteration.analysis_record;
        out.push_str(&format!("\n## Analysis {}: {}\n\n", i + 1, iteration.focus.title()));

        if let Some(failure) = &iteration.failure {
            out.push_str(&format!(
                "- **Status:** degraded ({:?} failed: {})\n",
                failure.stage, failure.message
            ));
            continue;
        }

        out.push_str(&format!("- **Sentiment:** {}\n", record.sentiment));
        out.push_str(&format!("- **Confidence:** {:.2}\n", record.confidence));

        if !record.insights.is_empty() {
            out.push_str("\n### Key Points:\n\n");
            for point in &record.insights {
                out.push_str(&format!("- {point}\n"));
            }
        }
    }

    out
}
