//! Decision policy for deepthink
//!
//! After every iteration the policy looks at the session and the latest
//! analysis record and answers one question: run another iteration (and on
//! which focus), or stop and summarize.
//!
//! The rule evaluation itself ([`DecisionPolicy::evaluate`]) is a pure
//! function. The only external input, an optional [`FocusAdvisor`], is
//! consulted by [`DecisionPolicy::decide`] when the latest analysis leaves
//! open questions.
//!
//! [`FocusAdvisor`]: deepthink_core::FocusAdvisor

pub mod config;
pub mod policy;
pub mod uncertainty;

pub use config::{PolicyConfig, PolicyConfigBuilder};
pub use policy::{DecisionPolicy, Verdict, reasoning};
pub use uncertainty::{KeywordUncertainty, UncertaintySignal};
