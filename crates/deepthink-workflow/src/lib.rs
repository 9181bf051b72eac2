//! Cycle execution for deepthink
//!
//! [`CycleExecutor`] runs the research loop for a subject on top of the memory
//! store and the decision policy. Every step is persisted before the next one
//! starts, so an interrupted run resumes from the last recorded iteration.
//!
//! ```text
//! load ─▶ fetch ─▶ analyze ─▶ append + persist ─▶ decide + persist
//!            ▲                                          │
//!            └──────────────── CONTINUE ◀───────────────┤
//!                                                       ▼
//!                                 summarize ─▶ finalize + persist
//! ```

pub mod events;
pub mod executor;
pub mod fallback;
pub mod report;

pub use events::{CycleEventHandler, NoOpEventHandler};
pub use executor::{CycleExecutor, FinalResult};
pub use fallback::fallback_summary;
pub use report::{summary_path, write_summary};
