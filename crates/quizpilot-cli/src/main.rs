//! Quizpilot CLI - quiz answer resolution from the terminal
//!
//! Usage:
//!   quizpilot init                          Write a default .quizpilot/config.toml
//!   quizpilot prompt <quiz>                 Print the prompt for a fixture question
//!   quizpilot normalize <quiz> <reply>      Normalize a saved provider reply
//!   quizpilot ask <quiz>                    Ask the configured provider one question
//!   quizpilot test-provider                 Check that a provider accepts the credential
//!   quizpilot simulate <quiz>               Run the full automation over a fixture

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quizpilot_core::{
    InlineImage, ProviderChoice, ProviderId, ProviderSelection, QuestionKind, QuestionSnapshot,
    Settings,
};
use quizpilot_engine::{
    choose_provider, classify, normalize, plan_prompt, AutomationController, FileSettings,
    FixedCapture, QuizPage, RunSummary, ScriptedQuiz, SettingsSource, StaticSettings,
};
use quizpilot_providers::{HttpProviders, MockProvider, ProviderClient, ProviderRequest};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "quizpilot")]
#[command(author, version, about = "Resolve quiz answers with language models")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Directory holding .quizpilot/config.toml
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Print the prompt and answer shape for one fixture question
    Prompt {
        /// Quiz fixture (JSON)
        quiz: PathBuf,

        /// 0-based question index
        #[arg(short, long, default_value = "0")]
        question: usize,
    },

    /// Normalize a saved provider reply against one fixture question
    Normalize {
        /// Quiz fixture (JSON)
        quiz: PathBuf,

        /// File holding the raw reply text
        reply: PathBuf,

        /// 0-based question index
        #[arg(short, long, default_value = "0")]
        question: usize,
    },

    /// Send one fixture question to the configured provider
    Ask {
        /// Quiz fixture (JSON)
        quiz: PathBuf,

        /// 0-based question index
        #[arg(short, long, default_value = "0")]
        question: usize,

        /// Override the configured provider (gemini, cerebras, openrouter, hybrid)
        #[arg(long)]
        provider: Option<ProviderSelection>,

        /// Screenshot to attach: a base64 data URL or a file holding one
        #[arg(long)]
        image: Option<String>,
    },

    /// Probe a provider with the configured credential
    TestProvider {
        /// Provider to probe (defaults to the configured one)
        #[arg(long)]
        provider: Option<ProviderId>,

        /// Model to probe (defaults to the provider's default model)
        #[arg(long)]
        model: Option<String>,
    },

    /// Run the automation controller over a scripted quiz
    Simulate {
        /// Quiz fixture (JSON)
        quiz: PathBuf,

        /// Replay these replies instead of calling a provider; the last repeats
        #[arg(long = "reply")]
        replies: Vec<String>,

        /// Seed for sabotage draws
        #[arg(long)]
        seed: Option<u64>,

        /// Override the submit delay in seconds
        #[arg(long)]
        delay: Option<f64>,

        /// Screen capture for media questions: a base64 data URL or a file holding one
        #[arg(long)]
        image: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init => cmd_init(&cli.root),
        Commands::Prompt { quiz, question } => cmd_prompt(&quiz, question).await,
        Commands::Normalize {
            quiz,
            reply,
            question,
        } => cmd_normalize(&quiz, &reply, question).await,
        Commands::Ask {
            quiz,
            question,
            provider,
            image,
        } => {
            let image = image.as_deref().map(load_image).transpose()?;
            cmd_ask(&cli.root, &quiz, question, provider, image).await
        }
        Commands::TestProvider { provider, model } => cmd_test_provider(&cli.root, provider, model).await,
        Commands::Simulate {
            quiz,
            replies,
            seed,
            delay,
            image,
        } => {
            let image = image.as_deref().map(load_image).transpose()?;
            cmd_simulate(&cli.root, &quiz, replies, seed, delay, image).await
        }
    }
}

/// A fixture question as the controller would see it
struct LoadedQuestion {
    kind: QuestionKind,
    snapshot: QuestionSnapshot,
    has_media: bool,
}

async fn load_question(quiz: &Path, index: usize) -> Result<LoadedQuestion> {
    let page = ScriptedQuiz::from_file(quiz)
        .with_context(|| format!("Failed to load quiz fixture {:?}", quiz))?;
    for _ in 0..index {
        page.advance().await?;
    }
    if page.is_completed().await? {
        bail!("Quiz {:?} has no question {}", quiz, index);
    }

    let kind = classify(&page.signals().await?);
    let snapshot = page.question_snapshot(kind).await?;
    let has_media = page.has_inline_media().await?;
    Ok(LoadedQuestion {
        kind,
        snapshot,
        has_media,
    })
}

/// Parse an `--image` argument: a data URL, or a file whose contents are one
fn load_image(arg: &str) -> Result<InlineImage> {
    let url = if arg.starts_with("data:") {
        arg.to_string()
    } else {
        std::fs::read_to_string(arg)
            .with_context(|| format!("Failed to read image {:?}", arg))?
            .trim()
            .to_string()
    };
    InlineImage::from_data_url(&url)
        .with_context(|| format!("{:?} is not a base64 data URL", arg))
}

async fn load_settings(root: &Path) -> Result<Settings> {
    FileSettings::new(root)
        .load()
        .await
        .with_context(|| format!("Failed to load settings from {:?}", root))
}

fn cmd_init(root: &Path) -> Result<()> {
    info!("Initializing Quizpilot in {:?}", root);
    Settings::write_default(root).context("Failed to write configuration")?;

    println!("Initialized Quizpilot in {:?}", root);
    println!("Created:");
    println!("  .quizpilot/config.toml");
    println!();
    println!("Set GEMINI_API_KEY, CEREBRAS_API_KEY or OPENROUTER_API_KEY, or edit [credentials].");
    Ok(())
}

async fn cmd_prompt(quiz: &Path, index: usize) -> Result<()> {
    let question = load_question(quiz, index).await?;
    let plan = plan_prompt(&question.snapshot, question.kind, false);

    println!("Kind: {}", question.kind);
    println!("Hints: {}", serde_json::to_string(&plan.hints)?);
    println!();
    println!("{}", plan.text);
    Ok(())
}

async fn cmd_normalize(quiz: &Path, reply: &Path, index: usize) -> Result<()> {
    let question = load_question(quiz, index).await?;
    let text = std::fs::read_to_string(reply)
        .with_context(|| format!("Failed to read reply {:?}", reply))?;

    let answer = normalize(&text, question.kind, &question.snapshot)?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

async fn cmd_ask(
    root: &Path,
    quiz: &Path,
    index: usize,
    provider: Option<ProviderSelection>,
    image: Option<InlineImage>,
) -> Result<()> {
    let mut settings = load_settings(root).await?;
    if let Some(provider) = provider {
        settings.provider = provider;
        if let Some(concrete) = provider.concrete() {
            settings.model = concrete.default_model().to_string();
        }
    }

    let question = load_question(quiz, index).await?;
    let images: Vec<InlineImage> = image.into_iter().collect();
    let plan = plan_prompt(&question.snapshot, question.kind, !images.is_empty());
    let choice = choose_provider(&settings, question.has_media || !images.is_empty())?;
    info!("Asking {} ({})", choice.provider, choice.model);

    let client = HttpProviders::new(settings.endpoints.clone())?;
    let request = ProviderRequest {
        prompt: plan.text,
        images,
        hints: plan.hints,
    };
    let reply = client.call(&choice, &request).await?;
    if reply.degraded {
        info!("{} refused the strict schema; reply came from JSON mode", reply.provider);
    }

    let answer = normalize(&reply.text, question.kind, &question.snapshot)
        .with_context(|| format!("Reply could not be parsed: {}", reply.snippet(400)))?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}

async fn cmd_test_provider(root: &Path, provider: Option<ProviderId>, model: Option<String>) -> Result<()> {
    let settings = load_settings(root).await?;
    let provider = match provider.or_else(|| settings.provider.concrete()) {
        Some(provider) => provider,
        None => bail!("Hybrid mode has no single provider; pass --provider"),
    };
    let model = model.unwrap_or_else(|| {
        if settings.provider.concrete() == Some(provider) {
            settings.model.clone()
        } else {
            provider.default_model().to_string()
        }
    });
    let credential = settings
        .credential_for(provider)
        .with_context(|| format!("No credential for {}; set {}", provider, provider.credential_env()))?;

    let client = HttpProviders::new(settings.endpoints.clone())?;
    let choice = ProviderChoice::new(provider, model, credential);
    if client.probe(&choice).await? {
        println!("{} ({}) is reachable", choice.provider, choice.model);
        Ok(())
    } else {
        bail!("{} rejected model {} or the credential", choice.provider, choice.model)
    }
}

async fn cmd_simulate(
    root: &Path,
    quiz: &Path,
    replies: Vec<String>,
    seed: Option<u64>,
    delay: Option<f64>,
    image: Option<InlineImage>,
) -> Result<()> {
    let page = ScriptedQuiz::from_file(quiz)
        .with_context(|| format!("Failed to load quiz fixture {:?}", quiz))?;
    let mut settings = load_settings(root).await?;
    if let Some(delay) = delay {
        settings.delay_secs = delay;
    }

    let summary = match replies.split_last() {
        None => {
            let client = HttpProviders::new(settings.endpoints.clone())?;
            run_controller(page.clone(), client, settings, seed, image).await
        }
        Some((last, queued)) => {
            // Scripted replies stand in for the network; any credential will do
            for provider in ProviderId::ALL {
                if settings.credential_for(provider).is_none() {
                    settings.credentials.set(provider, "offline");
                }
            }
            let mock = queued
                .iter()
                .fold(MockProvider::new(), |mock, reply| mock.with_reply(reply.as_str()))
                .with_fallback(last.as_str());
            run_controller(page.clone(), mock, settings, seed, image).await
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!("Results: {:?}", page.results());
    Ok(())
}

async fn run_controller<C: ProviderClient>(
    page: ScriptedQuiz,
    client: C,
    settings: Settings,
    seed: Option<u64>,
    image: Option<InlineImage>,
) -> RunSummary {
    let mut controller = AutomationController::new(page, client, Box::new(StaticSettings(settings)));
    if let Some(seed) = seed {
        controller = controller.with_seed(seed);
    }
    if let Some(image) = image {
        controller = controller.with_capture(Box::new(FixedCapture(image)));
    }
    controller.start().await
}
