//! Structured logging for WARDEN runs.
//!
//! - `writer`: the in-memory `StructuredLogWriter`
//! - `session`: process-wide log sessions with one directory per session
//! - `persist`: save and load the trace JSON form

pub mod persist;
pub mod session;
pub mod writer;

pub use session::{LogSession, SessionSummary};
pub use writer::{StepBatch, StructuredLogWriter};
