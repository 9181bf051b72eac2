//! Subject identifiers

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SUBJECT_LEN: usize = 32;

/// Identifier of the entity being researched, e.g. a ticker symbol
///
/// Identifiers are trimmed and upper-cased on construction, so `"nvda "` and
/// `"NVDA"` address the same session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Validate and normalize a subject identifier
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let value = raw.as_ref().trim().to_ascii_uppercase();

        if value.is_empty() {
            return Err(Error::InvalidSubject("subject is empty".to_string()));
        }
        if value.len() > MAX_SUBJECT_LEN {
            return Err(Error::InvalidSubject(format!(
                "subject longer than {MAX_SUBJECT_LEN} characters: {value}"
            )));
        }
        if let Some(bad) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')))
        {
            return Err(Error::InvalidSubject(format!(
                "unsupported character {bad:?} in {value}"
            )));
        }

        Ok(Self(value))
    }

    /// The normalized identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl std::str::FromStr for SubjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}
