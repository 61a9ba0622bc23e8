//! # warden-contracts
//!
//! Shared types for the WARDEN multi-agent monitoring harness.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, message-shape normalization and error
//! types.

pub mod agent;
pub mod alert;
pub mod error;
pub mod judge;
pub mod message;
pub mod trace;
pub mod workflow;
