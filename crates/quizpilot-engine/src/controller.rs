//! Automation controller
//!
//! Runs one question per cycle: classify, scrape, route, ask, normalize,
//! apply, wait, submit, advance. Decisions about retrying and halting are
//! made by the pure session state machine; this module performs the I/O and
//! checks the stop flag after every suspension point.

use quizpilot_core::{
    AutomationStatus, InlineImage, NormalizedAnswer, QuestionKind, QuestionSnapshot, QuizError,
    QuizInfo, Settings,
};
use quizpilot_providers::{ProviderClient, ProviderRequest};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::actuator::{ActuationReport, Actuator};
use crate::bounds::check_bounds;
use crate::classifier::classify;
use crate::normalizer::normalize;
use crate::page::{QuizPage, ScreenCapture, SettingsSource};
use crate::prompt::plan_prompt;
use crate::router::{choose_provider, required_provider};
use crate::sabotage::{sabotage_answer, SabotagePolicy};
use crate::session::{transition, Action, AutomationSession, Event, HaltReason, RetryDelay};
use crate::stop::StopHandle;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// No question left on the page
    QuizEnded,
    Stopped,
    GivenUp { attempts: u32 },
    ConfigError(String),
    /// `start` was called while a run was in progress
    AlreadyRunning,
}

/// Result of one `start` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    /// Questions submitted
    pub answered: u32,
    /// Incorrect feedback observed
    pub incorrect: u32,
    /// Questions answered wrong on purpose
    pub sabotaged: u32,
    pub provider_calls: u32,
}

impl RunSummary {
    fn new(outcome: RunOutcome) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            outcome,
            answered: 0,
            incorrect: 0,
            sabotaged: 0,
            provider_calls: 0,
        }
    }
}

enum Step {
    Proceed,
    Retry(RetryDelay),
    Halt(HaltReason),
}

/// Owns one automation session over a quiz page
pub struct AutomationController<P: QuizPage, C: ProviderClient> {
    page: P,
    provider: C,
    settings: Box<dyn SettingsSource>,
    capture: Option<Box<dyn ScreenCapture>>,
    rng: StdRng,
    stop: StopHandle,
    session: AutomationSession,
}

impl<P: QuizPage, C: ProviderClient> AutomationController<P, C> {
    pub fn new(page: P, provider: C, settings: Box<dyn SettingsSource>) -> Self {
        Self {
            page,
            provider,
            settings,
            capture: None,
            rng: StdRng::from_os_rng(),
            stop: StopHandle::new(),
            session: AutomationSession::default(),
        }
    }

    /// Screen capture used when a question shows inline media
    pub fn with_capture(mut self, capture: Box<dyn ScreenCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Deterministic sabotage draws
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Handle for stopping the run from another task
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a cooperative stop
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn session(&self) -> AutomationSession {
        self.session
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    /// Running flag plus quiz name and position from the page chrome
    pub async fn status(&self) -> AutomationStatus {
        let name = self.page.quiz_name().await.unwrap_or_default();
        let progress = self.page.progress().await.unwrap_or_default();
        let completed = self.page.is_completed().await.unwrap_or(false);
        AutomationStatus {
            running: self.stop.is_running(),
            quiz_info: QuizInfo {
                name,
                current_question: progress.current,
                total_questions: progress.total,
                completed,
            },
        }
    }

    /// Run until the quiz ends, a stop is requested, or the session halts
    pub async fn start(&mut self) -> RunSummary {
        if self.session.is_running() || self.stop.is_running() {
            return RunSummary::new(RunOutcome::AlreadyRunning);
        }

        let mut summary = RunSummary::new(RunOutcome::QuizEnded);
        self.stop.clear();
        self.stop.set_running(true);
        self.apply(&summary, Event::Start);

        let outcome = match self.load_settings().await {
            Ok(settings) => self.run(&settings, &mut summary).await,
            Err(e) => {
                let message = e.to_string();
                self.apply(&summary, Event::ConfigError { message: message.clone() });
                RunOutcome::ConfigError(message)
            }
        };

        self.stop.set_running(false);
        summary.outcome = outcome;
        summary.incorrect = self.session.incorrect_so_far;
        info!(
            run_id = %summary.run_id,
            outcome = ?summary.outcome,
            answered = summary.answered,
            incorrect = summary.incorrect,
            "Automation finished"
        );
        summary
    }

    async fn load_settings(&self) -> quizpilot_core::Result<Settings> {
        let settings = self.settings.load().await?;
        settings.validate()?;
        if let Some(provider) = required_provider(&settings) {
            if settings.credential_for(provider).is_none() {
                return Err(QuizError::MissingCredential(provider));
            }
        }
        Ok(settings)
    }

    async fn run(&mut self, settings: &Settings, summary: &mut RunSummary) -> RunOutcome {
        loop {
            let step = self.cycle(settings, summary).await;
            let step = match step {
                Step::Retry(delay) => {
                    let wait = match delay {
                        RetryDelay::Short => settings.timing.empty_retry(),
                        RetryDelay::Backoff => settings.timing.error_backoff(),
                    };
                    debug!(?delay, ?wait, "Retrying question");
                    if self.stop.wait(wait, settings.timing.cancel_poll()).await {
                        Step::Proceed
                    } else {
                        self.apply(summary, Event::StopRequested)
                    }
                }
                other => other,
            };

            if let Step::Halt(reason) = step {
                return match reason {
                    HaltReason::StopRequested => RunOutcome::Stopped,
                    HaltReason::QuizEnded => RunOutcome::QuizEnded,
                    HaltReason::AttemptsExhausted { attempts } => RunOutcome::GivenUp { attempts },
                    HaltReason::Config { message } => RunOutcome::ConfigError(message),
                };
            }
        }
    }

    /// Feed an event to the session and turn its actions into a step
    fn apply(&mut self, summary: &RunSummary, event: Event) -> Step {
        let (next, actions) = transition(self.session, event);
        self.session = next;

        let mut step = Step::Proceed;
        for action in actions {
            match action {
                Action::LogActivity { message } => info!(run_id = %summary.run_id, "{}", message),
                Action::Proceed => {}
                Action::Retry { delay } => step = Step::Retry(delay),
                Action::Halt { reason } => step = Step::Halt(reason),
            }
        }
        step
    }

    fn fail(&mut self, summary: &RunSummary, error: QuizError) -> Step {
        if error.is_fatal() {
            self.apply(summary, Event::ConfigError { message: error.to_string() })
        } else {
            self.apply(summary, Event::CycleFailed { message: error.to_string() })
        }
    }

    fn checkpoint(&mut self, summary: &RunSummary) -> Option<Step> {
        self.stop
            .is_stop_requested()
            .then(|| self.apply(summary, Event::StopRequested))
    }

    async fn cycle(&mut self, settings: &Settings, summary: &mut RunSummary) -> Step {
        if let step @ (Step::Halt(_) | Step::Retry(_)) = self.apply(
            summary,
            Event::CycleStarted {
                max_attempts: settings.max_attempts,
            },
        ) {
            return step;
        }
        if let Some(step) = self.checkpoint(summary) {
            return step;
        }

        // End of quiz comes from the chrome, not from a failed scrape
        match self.page.is_completed().await {
            Ok(true) => return self.apply(summary, Event::QuizEnded),
            Ok(false) => {}
            Err(e) => return self.fail(summary, e),
        }

        let signals = match self.page.signals().await {
            Ok(signals) => signals,
            Err(e) => return self.fail(summary, e),
        };
        let kind = classify(&signals);
        let snapshot = match self.page.question_snapshot(kind).await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.fail(summary, e),
        };
        if snapshot.is_blank() {
            info!("No question found on the page");
            return self.apply(summary, Event::QuizEnded);
        }
        debug!(%kind, stem = %snapshot.stem, "Classified question");

        if let Some(step) = self.checkpoint(summary) {
            return step;
        }

        let has_media = settings.process_images && self.detect_media().await;
        let images = if has_media { self.capture_images().await } else { vec![] };

        let plan = plan_prompt(&snapshot, kind, !images.is_empty());
        let choice = match choose_provider(settings, has_media) {
            Ok(choice) => choice,
            Err(e) => return self.fail(summary, e),
        };
        info!(provider = %choice.provider, model = %choice.model, %kind, "Asking provider");

        let request = ProviderRequest {
            prompt: plan.text,
            images,
            hints: plan.hints,
        };
        summary.provider_calls += 1;
        let reply = match self.provider.call(&choice, &request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(provider = %choice.provider, error = %e, "Provider call failed");
                return self.fail(summary, e);
            }
        };

        // A stop during the call discards its result
        if let Some(step) = self.checkpoint(summary) {
            return step;
        }

        let answer = match normalize(&reply.text, kind, &snapshot) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(
                    provider = %reply.provider,
                    finish_reason = reply.finish_reason.as_deref().unwrap_or("unknown"),
                    fragments = reply.fragment_count,
                    safety = %reply.safety_summary(),
                    prompt_feedback = ?reply.prompt_feedback,
                    snippet = %reply.snippet(400),
                    "Could not parse provider reply"
                );
                return self.fail(summary, e);
            }
        };

        if let Some(step) = self.checkpoint(summary) {
            return step;
        }

        if answer.is_empty() {
            return self.apply(
                summary,
                Event::EmptyAnswer {
                    reason: "reply held no usable letters or pairs".to_string(),
                },
            );
        }
        if let Err(e) = check_bounds(&answer, &snapshot, &request.hints) {
            warn!(error = %e, "Answer rejected");
            return self.apply(summary, Event::EmptyAnswer { reason: e.to_string() });
        }
        if let Some(explanation) = answer.explanation() {
            debug!(%explanation, "Model explanation");
        }
        self.apply(summary, Event::AnswerAccepted);

        let answer = self.maybe_sabotage(settings, answer, kind, &snapshot, summary).await;

        let report = self.actuate(settings, &answer, kind, &snapshot).await;
        if report.cancelled {
            return self.apply(summary, Event::StopRequested);
        }
        if report.failed > 0 {
            warn!(applied = report.applied, failed = report.failed, "Answer applied partially");
        }

        if !self.stop.wait(settings.delay(), settings.timing.cancel_poll()).await {
            return self.apply(summary, Event::StopRequested);
        }
        if let Some(step) = self.checkpoint(summary) {
            return step;
        }

        if let Err(e) = self.page.submit().await {
            return self.fail(summary, e);
        }
        summary.answered += 1;
        info!(answered = summary.answered, "Submitted answer");

        if !self.stop.wait(settings.timing.post_submit(), settings.timing.cancel_poll()).await {
            return self.apply(summary, Event::StopRequested);
        }

        match self.page.feedback().await {
            Ok(quizpilot_core::Feedback::Incorrect) => {
                self.apply(summary, Event::IncorrectObserved);
                debug!(incorrect = self.session.incorrect_so_far, "Submission graded incorrect");
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "No feedback available"),
        }

        if let Some(step) = self.checkpoint(summary) {
            return step;
        }
        if let Err(e) = self.page.advance().await {
            return self.fail(summary, e);
        }
        if !self.stop.wait(settings.timing.post_submit(), settings.timing.cancel_poll()).await {
            return self.apply(summary, Event::StopRequested);
        }
        Step::Proceed
    }

    async fn detect_media(&self) -> bool {
        match self.page.has_inline_media().await {
            Ok(has_media) => has_media,
            Err(e) => {
                debug!(error = %e, "Media detection failed, treating question as text-only");
                false
            }
        }
    }

    async fn capture_images(&self) -> Vec<InlineImage> {
        let Some(capture) = &self.capture else {
            debug!("Question has media but no screen capture is configured");
            return vec![];
        };
        match capture.capture().await {
            Ok(image) => image.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "Screen capture failed, asking without images");
                vec![]
            }
        }
    }

    async fn maybe_sabotage(
        &mut self,
        settings: &Settings,
        answer: NormalizedAnswer,
        kind: QuestionKind,
        snapshot: &QuestionSnapshot,
        summary: &mut RunSummary,
    ) -> NormalizedAnswer {
        if kind == QuestionKind::Sort {
            return answer;
        }
        let policy = SabotagePolicy::new(settings.sabotage, settings.incorrect_budget);
        let total = self.page.progress().await.map(|p| p.total).unwrap_or(0);
        if !policy.should_sabotage(total, self.session.incorrect_so_far, &mut self.rng) {
            return answer;
        }

        let wrong = sabotage_answer(&answer, kind, snapshot);
        if wrong != answer {
            summary.sabotaged += 1;
            info!(
                incorrect_so_far = self.session.incorrect_so_far,
                budget = policy.incorrect_budget,
                "Answering this question wrong on purpose"
            );
        }
        wrong
    }

    async fn actuate(
        &self,
        settings: &Settings,
        answer: &NormalizedAnswer,
        kind: QuestionKind,
        snapshot: &QuestionSnapshot,
    ) -> ActuationReport {
        let actuator = Actuator::new(&self.page, &settings.timing, &self.stop);
        match answer {
            NormalizedAnswer::Letters { letters, .. } => {
                actuator
                    .apply_letters(letters, snapshot, kind == QuestionKind::Multiple)
                    .await
            }
            NormalizedAnswer::Pairs { pairs, .. } => actuator.apply_pairs(pairs).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::StaticSettings;
    use crate::scripted::{QuizScript, ScriptedQuiz};
    use crate::session::Phase;
    use quizpilot_core::{ProviderId, ProviderSelection};
    use quizpilot_providers::MockProvider;

    fn settings() -> Settings {
        let mut settings = Settings {
            provider: ProviderSelection::Cerebras,
            model: ProviderId::Cerebras.default_model().to_string(),
            sabotage: false,
            delay_secs: 0.0,
            ..Default::default()
        };
        settings.credentials.set(ProviderId::Cerebras, "csk-test");
        settings
    }

    fn quiz() -> ScriptedQuiz {
        let script: QuizScript = serde_json::from_str(
            r#"{"name": "Capitals", "questions": [
                {"kind": "single", "stem": "Capital of France?", "options": ["Rome", "Paris", "Oslo"], "correct": ["B"]}
            ]}"#,
        )
        .unwrap();
        ScriptedQuiz::new(script)
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_reflects_page_and_run() {
        let mut controller = AutomationController::new(
            quiz(),
            MockProvider::new().with_reply(r#"{"letters": ["B"]}"#),
            Box::new(StaticSettings(settings())),
        );

        let before = controller.status().await;
        assert!(!before.running);
        assert_eq!(before.quiz_info.name, "Capitals");
        assert_eq!(before.quiz_info.current_question, 1);
        assert!(!before.quiz_info.completed);

        let summary = controller.start().await;
        assert_eq!(summary.outcome, RunOutcome::QuizEnded);
        assert_eq!(summary.answered, 1);

        let after = controller.status().await;
        assert!(!after.running);
        assert!(after.quiz_info.completed);
        assert_eq!(controller.session().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_settings_halt_before_any_call() {
        let mut bad = settings();
        bad.max_attempts = 0;
        let provider = MockProvider::new();
        let mut controller =
            AutomationController::new(quiz(), provider.clone(), Box::new(StaticSettings(bad)));

        let summary = controller.start().await;
        assert!(matches!(summary.outcome, RunOutcome::ConfigError(_)));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(controller.session().phase, Phase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_backs_off_then_recovers() {
        let provider = MockProvider::new()
            .with_transport_error("connection reset")
            .with_reply(r#"{"letters": ["B"]}"#);
        let page = quiz();
        let mut controller =
            AutomationController::new(page.clone(), provider.clone(), Box::new(StaticSettings(settings())));

        let start = tokio::time::Instant::now();
        let summary = controller.start().await;

        assert_eq!(summary.outcome, RunOutcome::QuizEnded);
        assert_eq!(provider.call_count(), 2);
        assert_eq!(page.submitted_answers(), vec![vec!['B']]);
        assert!(start.elapsed() >= settings().timing.error_backoff());
    }
}
