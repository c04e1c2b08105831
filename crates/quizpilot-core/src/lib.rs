//! # quizpilot-core
//!
//! Core types for the Quizpilot answer resolution engine.
//!
//! Quizpilot reads a quiz question from a page, asks a language model for the
//! answer, turns whatever text comes back into a validated answer, and plays
//! that answer back through simulated interactions.
//!
//! ## Core Paradigm
//!
//! - A question is an immutable snapshot taken once per cycle
//! - Options are keyed by letter; sort items and rows by 1-based index
//! - Every provider reply is normalized into one answer shape before use
//! - Settings are read-only to the engine

mod config;
mod error;
mod types;

pub use config::{
    Credentials, EndpointConfig, HybridConfig, ProviderSelection, Settings, TimingConfig,
    MAX_DELAY_SECS,
};
pub use error::{QuizError, Result};
pub use types::*;
