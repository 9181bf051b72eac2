//! Versioned persisted form of a session
//!
//! ```json
//! { "schema_version": 1, "session": { "subject_id": "AAPL", ... } }
//! ```
//!
//! Decoding never repairs anything. A document that does not parse, carries
//! an unknown version, or violates a session invariant is reported as
//! [`Error::CorruptState`].

use deepthink_core::{Error, Result, Session, SessionStatus, SubjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// Tolerance when comparing the stored completion percentage
const PCT_TOLERANCE: f64 = 1e-9;

/// Envelope around the serialized session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub schema_version: u32,
    pub session: Session,
}

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: Option<u32>,
}

/// Encode a session as a pretty-printed versioned document
pub fn encode(session: &Session) -> Result<Vec<u8>> {
    let document = SessionDocumentRef {
        schema_version: SCHEMA_VERSION,
        session,
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

#[derive(Serialize)]
struct SessionDocumentRef<'a> {
    schema_version: u32,
    session: &'a Session,
}

/// Decode and validate the stored document of `subject`
pub fn decode(subject: &SubjectId, bytes: &[u8]) -> Result<Session> {
    let probe: VersionProbe = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt(subject.as_str(), format!("unreadable document: {e}")))?;

    match probe.schema_version {
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(Error::corrupt(
                subject.as_str(),
                format!("unsupported schema version {other} (expected {SCHEMA_VERSION})"),
            ));
        }
        None => {
            return Err(Error::corrupt(
                subject.as_str(),
                "missing schema_version tag",
            ));
        }
    }

    let document: SessionDocument = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt(subject.as_str(), e.to_string()))?;

    validate(subject, &document.session)?;
    Ok(document.session)
}

/// Check the structural invariants of a session loaded for `subject`
pub fn validate(subject: &SubjectId, session: &Session) -> Result<()> {
    let corrupt = |reason: String| Err(Error::corrupt(subject.as_str(), reason));

    if &session.subject_id != subject {
        return corrupt(format!(
            "document belongs to subject {}",
            session.subject_id
        ));
    }

    for (position, iteration) in session.iterations.iter().enumerate() {
        if iteration.index != position {
            return corrupt(format!(
                "iteration at position {position} has index {}",
                iteration.index
            ));
        }
    }

    let last = session.iterations.len().saturating_sub(1);
    if let Some(pending) = session
        .iterations
        .iter()
        .find(|iteration| iteration.planning_decision.is_none() && iteration.index != last)
    {
        return corrupt(format!(
            "iteration {} has no planning decision but is not the latest",
            pending.index
        ));
    }

    let state = &session.focus_state;
    if has_duplicates(&state.required_focuses) {
        return corrupt("required focuses contain duplicates".to_string());
    }
    if has_duplicates(&state.completed_focuses) {
        return corrupt("completed focuses contain duplicates".to_string());
    }

    let expected_pct = state.completion_pct();
    if (session.completion_pct - expected_pct).abs() > PCT_TOLERANCE {
        return corrupt(format!(
            "completion_pct {} does not match focus coverage {expected_pct}",
            session.completion_pct
        ));
    }

    if session.status == SessionStatus::Complete {
        let summarized = session
            .latest_iteration()
            .and_then(|iteration| iteration.planning_decision.as_ref())
            .is_some_and(|decision| decision.is_summarize());
        if !summarized {
            return corrupt("COMPLETE session without a final SUMMARIZE decision".to_string());
        }
    }

    Ok(())
}

fn has_duplicates<T: Eq + std::hash::Hash>(items: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(items.len());
    !items.iter().all(|item| seen.insert(item))
}
