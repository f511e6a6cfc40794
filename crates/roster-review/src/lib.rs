//! Roster Review
//!
//! Command-line front end for the roster consensus engine. Loads a roster
//! fixture and proposals from JSON, runs the engine and prints JSON on stdout.
//! Audit records can be appended to a JSON-lines log.

pub mod audit_log;
pub mod commands;
pub mod config;
pub mod fixture;

pub use audit_log::JsonlAuditSink;
pub use commands::{CommandOutput, EvaluateOptions, Verdict};
