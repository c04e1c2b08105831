//! # quizpilot-engine
//!
//! Answer resolution engine for Quizpilot.
//!
//! This crate provides:
//! - Question classification from page structure
//! - Prompt construction with exact-count detection
//! - Provider routing, including hybrid vision/text routing
//! - Reply normalization through an ordered strategy chain
//! - Answer bounds checks and the sabotage policy
//! - The answer actuator and the automation controller
//! - A scripted quiz page for offline runs

mod actuator;
mod bounds;
mod classifier;
mod controller;
mod normalizer;
mod page;
mod prompt;
mod router;
mod sabotage;
mod scripted;
mod session;
mod stop;

pub use actuator::{ActuationReport, Actuator};
pub use bounds::check_bounds;
pub use classifier::classify;
pub use controller::{AutomationController, RunOutcome, RunSummary};
pub use normalizer::{
    balanced_json, dedupe_pairs, fenced_json, heuristic, normalize, reconcile_letters, strict_json,
    AnswerMode, Extracted, Strategy, STRATEGIES,
};
pub use page::{
    FileSettings, FixedCapture, PageSignals, QuizPage, ScreenCapture, SettingsSource,
    StaticSettings,
};
pub use prompt::{build_prompt, build_sort_prompt, detect_exact_count, plan_prompt, PromptPlan};
pub use router::{choose_provider, required_provider};
pub use sabotage::{sabotage_answer, SabotagePolicy, SABOTAGE_PROBABILITY};
pub use scripted::{Interaction, QuizScript, ScriptedQuestion, ScriptedQuiz};
pub use session::{
    transition, Action, AutomationSession, Event, HaltReason, Phase, RetryDelay,
};
pub use stop::StopHandle;
