//! Pure state machine for the automation session
//!
//! `transition(session, event) -> (session, actions)` holds every decision the
//! controller makes about running, retrying, and giving up. No async, no I/O.
//! Events that make no sense in the current phase are ignored, so this
//! function never panics.

/// Lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Not started, or the quiz ended
    #[default]
    Idle,
    Running,
    /// Stopped on request or by a configuration error
    Stopped,
    /// Attempt cap reached on one question
    GivenUp,
}

/// Session counters plus phase; owned by one controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutomationSession {
    pub phase: Phase,
    /// Cycles spent on the current question without an accepted answer
    pub attempts_this_question: u32,
    /// Incorrect feedback seen so far in this run
    pub incorrect_so_far: u32,
}

impl AutomationSession {
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

/// Events reported by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    /// A cycle is about to scrape and ask
    CycleStarted { max_attempts: u32 },
    /// A usable, in-bounds answer came back
    AnswerAccepted,
    /// The page graded the submission incorrect
    IncorrectObserved,
    /// The answer was empty or out of bounds
    EmptyAnswer { reason: String },
    /// Transport, API, or parse failure
    CycleFailed { message: String },
    /// Missing credential or invalid settings
    ConfigError { message: String },
    StopRequested,
    /// No question left on the page
    QuizEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDelay {
    /// Empty or rejected answer
    Short,
    /// Error backoff
    Backoff,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    StopRequested,
    AttemptsExhausted { attempts: u32 },
    Config { message: String },
    QuizEnded,
}

/// Side effects for the controller to carry out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Continue the cycle
    Proceed,
    /// Wait, then rerun the cycle on the same question
    Retry { delay: RetryDelay },
    Halt { reason: HaltReason },
    LogActivity { message: String },
}

/// Pure state transition function
///
/// Every failed cycle costs one attempt: the counter moves when the cycle
/// starts and is reset only by an accepted answer. Empty answers and errors
/// differ only in their retry delay.
pub fn transition(session: AutomationSession, event: Event) -> (AutomationSession, Vec<Action>) {
    use Phase::*;

    match (session.phase, event) {
        (Running, Event::Start) => (session, vec![]),
        (_, Event::Start) => (
            AutomationSession {
                phase: Running,
                attempts_this_question: 0,
                incorrect_so_far: 0,
            },
            vec![Action::LogActivity {
                message: "Automation started".to_string(),
            }],
        ),

        (Running, Event::CycleStarted { max_attempts }) => {
            if session.attempts_this_question >= max_attempts {
                let attempts = session.attempts_this_question;
                (
                    AutomationSession { phase: GivenUp, ..session },
                    vec![
                        Action::LogActivity {
                            message: format!("Giving up after {} attempts on one question", attempts),
                        },
                        Action::Halt {
                            reason: HaltReason::AttemptsExhausted { attempts },
                        },
                    ],
                )
            } else {
                (
                    AutomationSession {
                        attempts_this_question: session.attempts_this_question + 1,
                        ..session
                    },
                    vec![Action::Proceed],
                )
            }
        }

        (Running, Event::AnswerAccepted) => (
            AutomationSession {
                attempts_this_question: 0,
                ..session
            },
            vec![Action::Proceed],
        ),

        (Running, Event::IncorrectObserved) => (
            AutomationSession {
                incorrect_so_far: session.incorrect_so_far + 1,
                ..session
            },
            vec![Action::Proceed],
        ),

        (Running, Event::EmptyAnswer { reason }) => (
            session,
            vec![
                Action::LogActivity {
                    message: format!("No usable answer: {}", reason),
                },
                Action::Retry {
                    delay: RetryDelay::Short,
                },
            ],
        ),

        (Running, Event::CycleFailed { message }) => (
            session,
            vec![
                Action::LogActivity {
                    message: format!("Cycle failed: {}", message),
                },
                Action::Retry {
                    delay: RetryDelay::Backoff,
                },
            ],
        ),

        (Running, Event::ConfigError { message }) => (
            AutomationSession { phase: Stopped, ..session },
            vec![
                Action::LogActivity {
                    message: format!("Configuration error: {}", message),
                },
                Action::Halt {
                    reason: HaltReason::Config { message },
                },
            ],
        ),

        (Running, Event::StopRequested) => (
            AutomationSession { phase: Stopped, ..session },
            vec![Action::Halt {
                reason: HaltReason::StopRequested,
            }],
        ),

        (Running, Event::QuizEnded) => (
            AutomationSession { phase: Idle, ..session },
            vec![
                Action::LogActivity {
                    message: "Quiz ended".to_string(),
                },
                Action::Halt {
                    reason: HaltReason::QuizEnded,
                },
            ],
        ),

        // Not running: nothing to do
        (_, _) => (session, vec![]),
    }
}
