//! Client-side engine for a timed, multi-section multiple-choice mock
//! exam. Owns the session state machine (setup → active → finished),
//! the dual-timer reconciliation against an authoritative remote
//! clock, the answer ledger with its per-subsection attempt cap, and
//! the deterministic post-session scoring. Question rendering and the
//! remote service transport live outside; the engine sees them only
//! through the collaborator traits in [`remote`].

pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod remote;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::EngineError;
pub use services::engine::{EngineHandle, SessionEngine};
pub use services::Collaborators;
