//! Defaults applied to freshly created sessions

use deepthink_core::FocusArea;
use serde::{Deserialize, Serialize};

/// Settings used when the store has to create a session from scratch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDefaults {
    /// Required focus areas in priority order
    pub required_focuses: Vec<FocusArea>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            required_focuses: FocusArea::default_required(),
        }
    }
}

impl SessionDefaults {
    pub fn new(required_focuses: Vec<FocusArea>) -> Self {
        Self { required_focuses }
    }

    /// Parse a comma separated list such as `"financial, risk, esg"`
    pub fn from_list(list: &str) -> Self {
        let required_focuses = list
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(FocusArea::parse)
            .collect();
        Self { required_focuses }
    }
}
