//! End-to-end controller runs against a scripted quiz and a mock provider

use async_trait::async_trait;
use quizpilot_core::{
    AnswerShapeHints, Feedback, InlineImage, OptionHandle, Progress, ProviderId,
    ProviderSelection, QuestionKind, QuestionSnapshot, Result, Settings,
};
use quizpilot_engine::{
    AutomationController, FixedCapture, Interaction, PageSignals, Phase, QuizPage, QuizScript,
    RunOutcome, ScriptedQuiz, StaticSettings, StopHandle,
};
use quizpilot_providers::MockProvider;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

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

fn quiz(json: &str) -> ScriptedQuiz {
    let script: QuizScript = serde_json::from_str(json).unwrap();
    ScriptedQuiz::new(script)
}

fn controller(
    page: &ScriptedQuiz,
    provider: &MockProvider,
    settings: Settings,
) -> AutomationController<ScriptedQuiz, MockProvider> {
    AutomationController::new(page.clone(), provider.clone(), Box::new(StaticSettings(settings)))
        .with_seed(7)
}

const CAPITAL: &str = r#"{"name": "Geography", "questions": [
    {"kind": "single", "stem": "What is the capital of France?",
     "options": ["Rome", "Paris", "Oslo", "Bern"], "correct": ["B"]}
]}"#;

#[tokio::test(start_paused = true)]
async fn test_single_choice_submits_model_letter() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new().with_reply(r#"{"letters": ["B"], "explanation": "Paris"}"#);

    let summary = controller(&page, &provider, settings()).start().await;

    assert_eq!(summary.outcome, RunOutcome::QuizEnded);
    assert_eq!(summary.answered, 1);
    assert_eq!(provider.call_count(), 1);
    assert_eq!(page.submitted_answers(), vec![vec!['B']]);
    assert_eq!(page.results(), vec![Feedback::Correct]);

    let call = &provider.calls()[0];
    assert_eq!(call.provider, ProviderId::Cerebras);
    assert!(call.prompt.contains("B. Paris"));
}

#[tokio::test(start_paused = true)]
async fn test_exact_count_rejects_wrong_size_then_retries() {
    let page = quiz(
        r#"{"name": "Primes", "questions": [
            {"kind": "multiple", "stem": "Select the two correct answers",
             "options": ["2", "4", "5", "6", "8"], "correct": ["A", "C"]}
        ]}"#,
    );
    let provider = MockProvider::new()
        .with_reply(r#"{"letters": ["A", "B", "C"]}"#)
        .with_reply(r#"{"letters": ["C", "A"]}"#);

    let summary = controller(&page, &provider, settings()).start().await;

    assert_eq!(summary.outcome, RunOutcome::QuizEnded);
    assert_eq!(provider.call_count(), 2);
    assert_eq!(page.submitted_answers(), vec![vec!['C', 'A']]);
    assert_eq!(page.results(), vec![Feedback::Correct]);

    match &provider.calls()[0].hints {
        AnswerShapeHints::Letters { exact_count, multiple, .. } => {
            assert_eq!(*exact_count, Some(2));
            assert!(*multiple);
        }
        other => panic!("unexpected hints: {:?}", other),
    }
}

const SORT: &str = r#"{"name": "Biology", "questions": [
    {"kind": "sort", "stem": "Match each organism to its group",
     "items": ["Oak", "Salmon", "Eagle", "Frog"],
     "rows": ["Fish", "Plant", "Amphibian", "Bird"],
     "pairs": [{"row": 1, "item": 2}, {"row": 2, "item": 1}, {"row": 3, "item": 4}, {"row": 4, "item": 3}]}
]}"#;

const SORT_REPLY: &str = "1-2, 2-1, 3-4, 4-3";

#[tokio::test(start_paused = true)]
async fn test_sort_reply_without_json_is_applied() {
    let page = quiz(SORT);
    let provider = MockProvider::new().with_reply(SORT_REPLY);

    let summary = controller(&page, &provider, settings()).start().await;

    assert_eq!(summary.outcome, RunOutcome::QuizEnded);
    assert_eq!(page.results(), vec![Feedback::Correct]);
    let drags = page
        .interactions()
        .into_iter()
        .filter(|i| matches!(i, Interaction::Drag { .. }))
        .count();
    assert_eq!(drags, 4);
    assert_eq!(
        provider.calls()[0].hints,
        AnswerShapeHints::Pairs { rows: 4, items: 4 }
    );
}

#[tokio::test(start_paused = true)]
async fn test_sort_falls_back_to_clicks_when_drop_does_not_register() {
    let page = quiz(SORT).with_broken_drag();
    let provider = MockProvider::new().with_reply(SORT_REPLY);

    controller(&page, &provider, settings()).start().await;

    assert_eq!(page.results(), vec![Feedback::Correct]);
    let log = page.interactions();
    assert!(log.contains(&Interaction::ClickSlot(1)));
    assert!(log.contains(&Interaction::ClickItem(2)));
}

#[tokio::test(start_paused = true)]
async fn test_always_empty_answer_gives_up_after_cap() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new().with_fallback(r#"{"letters": []}"#);
    let mut controller = controller(&page, &provider, settings());

    let summary = controller.start().await;

    assert_eq!(summary.outcome, RunOutcome::GivenUp { attempts: 3 });
    assert_eq!(provider.call_count(), 3);
    assert_eq!(page.submissions(), 0);
    assert_eq!(controller.session().phase, Phase::GivenUp);
    assert!(!controller.status().await.running);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_transport_errors_give_up() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new();

    let summary = controller(&page, &provider, settings()).start().await;

    assert_eq!(summary.outcome, RunOutcome::GivenUp { attempts: 3 });
    assert_eq!(provider.call_count(), 3);
    assert_eq!(page.submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_delay_prevents_submit() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new().with_reply(r#"{"letters": ["B"]}"#);
    let mut slow = settings();
    slow.delay_secs = 5.0;
    let mut controller = controller(&page, &provider, slow);
    let stopper = controller.stop_handle();

    let (summary, _) = tokio::join!(controller.start(), async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        stopper.stop();
    });

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(page.submissions(), 0);
    assert!(page.interactions().contains(&Interaction::Select('B')));
    assert!(!page.interactions().contains(&Interaction::Submit));
    assert_eq!(controller.session().phase, Phase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_provider_call_discards_reply() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new()
        .with_reply(r#"{"letters": ["B"]}"#)
        .with_latency(Duration::from_secs(5));
    let mut controller = controller(&page, &provider, settings());
    let stopper = controller.stop_handle();

    let (summary, _) = tokio::join!(controller.start(), async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        stopper.stop();
    });

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(provider.call_count(), 1);
    assert!(!page.interactions().contains(&Interaction::Select('B')));
    assert_eq!(page.submissions(), 0);
    assert_eq!(controller.session().phase, Phase::Stopped);
}

/// Requests a stop while the page reports feedback
struct StopOnFeedback {
    inner: ScriptedQuiz,
    stop: Arc<OnceLock<StopHandle>>,
}

#[async_trait]
impl QuizPage for StopOnFeedback {
    async fn signals(&self) -> Result<PageSignals> {
        self.inner.signals().await
    }
    async fn question_snapshot(&self, kind: QuestionKind) -> Result<QuestionSnapshot> {
        self.inner.question_snapshot(kind).await
    }
    async fn has_inline_media(&self) -> Result<bool> {
        self.inner.has_inline_media().await
    }
    async fn progress(&self) -> Result<Progress> {
        self.inner.progress().await
    }
    async fn is_completed(&self) -> Result<bool> {
        self.inner.is_completed().await
    }
    async fn quiz_name(&self) -> Result<String> {
        self.inner.quiz_name().await
    }
    async fn select_option(&self, handle: OptionHandle) -> Result<()> {
        self.inner.select_option(handle).await
    }
    async fn select_option_at(&self, position: usize) -> Result<()> {
        self.inner.select_option_at(position).await
    }
    async fn drag_item_to_slot(&self, item: usize, slot: usize) -> Result<()> {
        self.inner.drag_item_to_slot(item, slot).await
    }
    async fn click_item(&self, item: usize) -> Result<()> {
        self.inner.click_item(item).await
    }
    async fn click_slot(&self, slot: usize) -> Result<()> {
        self.inner.click_slot(slot).await
    }
    async fn slot_populated(&self, slot: usize) -> Result<bool> {
        self.inner.slot_populated(slot).await
    }
    async fn submit(&self) -> Result<()> {
        self.inner.submit().await
    }
    async fn feedback(&self) -> Result<Feedback> {
        if let Some(stop) = self.stop.get() {
            stop.stop();
        }
        self.inner.feedback().await
    }
    async fn advance(&self) -> Result<()> {
        self.inner.advance().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_submit_does_not_advance() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new().with_reply(r#"{"letters": ["B"]}"#);
    let slot = Arc::new(OnceLock::new());
    let mut controller = AutomationController::new(
        StopOnFeedback {
            inner: page.clone(),
            stop: slot.clone(),
        },
        provider,
        Box::new(StaticSettings(settings())),
    );
    assert!(slot.set(controller.stop_handle()).is_ok());

    let summary = controller.start().await;

    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert_eq!(page.submissions(), 1);
    assert!(!page.interactions().contains(&Interaction::Advance));
    assert_eq!(page.position(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hybrid_routes_media_to_vision_provider() {
    let page = quiz(
        r#"{"name": "Mixed", "questions": [
            {"kind": "single", "stem": "What does the chart show?", "options": ["Growth", "Decline"],
             "correct": ["A"], "media": true},
            {"kind": "single", "stem": "2 + 2 = ?", "options": ["3", "4"], "correct": ["B"]}
        ]}"#,
    );
    let provider = MockProvider::new()
        .with_reply(r#"{"letters": ["A"]}"#)
        .with_reply(r#"{"letters": ["B"]}"#);
    let mut hybrid = settings();
    hybrid.provider = ProviderSelection::Hybrid;
    hybrid.credentials.set(ProviderId::Gemini, "gm-test");

    let summary = controller(&page, &provider, hybrid)
        .with_capture(Box::new(FixedCapture(InlineImage::png("iVBORw0KGgo="))))
        .start()
        .await;

    assert_eq!(summary.outcome, RunOutcome::QuizEnded);
    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].provider, ProviderId::Gemini);
    assert_eq!(calls[0].model, "gemini-2.5-flash");
    assert_eq!(calls[0].image_count, 1);
    assert!(calls[0].prompt.contains("image of the entire screen"));
    assert_eq!(calls[1].provider, ProviderId::Cerebras);
    assert_eq!(calls[1].image_count, 0);
    assert_eq!(page.results(), vec![Feedback::Correct, Feedback::Correct]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_credential_is_fatal() {
    let page = quiz(CAPITAL);
    let provider = MockProvider::new().with_fallback(r#"{"letters": ["B"]}"#);

    let mut no_key = settings();
    no_key.credentials.cerebras = None;
    let summary = controller(&page, &provider, no_key).start().await;
    assert!(matches!(summary.outcome, RunOutcome::ConfigError(_)));

    // Hybrid checks per question: the media question needs a Gemini key
    let media = quiz(
        r#"{"name": "Charts", "questions": [
            {"kind": "single", "stem": "Read the chart", "options": ["Up", "Down"], "correct": ["A"], "media": true}
        ]}"#,
    );
    let mut hybrid = settings();
    hybrid.provider = ProviderSelection::Hybrid;
    let summary = controller(&media, &provider, hybrid).start().await;
    assert!(matches!(summary.outcome, RunOutcome::ConfigError(_)));

    assert_eq!(provider.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_positional_selection_without_option_handles() {
    let page = quiz(CAPITAL).without_option_handles();
    let provider = MockProvider::new().with_reply(r#"{"letters": ["B"]}"#);

    controller(&page, &provider, settings()).start().await;

    assert_eq!(page.results(), vec![Feedback::Correct]);
}

#[tokio::test(start_paused = true)]
async fn test_sabotage_stays_within_incorrect_budget() {
    let questions: Vec<String> = (0..8)
        .map(|i| {
            format!(
                r#"{{"kind": "single", "stem": "Question {i}", "options": ["right", "wrong"], "correct": ["A"]}}"#
            )
        })
        .collect();
    let json = format!(r#"{{"name": "Long", "questions": [{}]}}"#, questions.join(","));

    for seed in 0..5 {
        let page = quiz(&json);
        let provider = MockProvider::new().with_fallback(r#"{"letters": ["A"]}"#);
        let mut sabotaging = settings();
        sabotaging.sabotage = true;
        sabotaging.incorrect_budget = 2;

        let summary = controller(&page, &provider, sabotaging)
            .with_seed(seed)
            .start()
            .await;

        let incorrect = page
            .results()
            .iter()
            .filter(|f| **f == Feedback::Incorrect)
            .count();
        assert_eq!(summary.answered, 8);
        assert!(incorrect <= 2, "seed {seed}: {incorrect} incorrect");
        assert_eq!(summary.incorrect as usize, incorrect);
    }
}
