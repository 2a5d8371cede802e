//! Codelab · experiment progress backend.
//!
//! Learners work through teacher-authored coding experiments step by step.
//! This crate owns the experiment model, the step gate, the progress store and
//! the per-learner session controller, and exposes them over HTTP + WebSocket.

pub mod config;
pub mod domain;
pub mod draft;
pub mod error;
pub mod gate;
pub mod protocol;
pub mod repository;
pub mod routes;
pub mod runner;
pub mod seeds;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;

pub use error::{LabError, Result};
