//! Provider routing

use quizpilot_core::{ProviderChoice, ProviderId, QuizError, Result, Settings};

/// Pick provider, model, and credential for one question
///
/// An explicit provider uses `settings.model`. Hybrid sends questions with
/// inline media to the configured vision provider and everything else to
/// the text provider, each with its own model; `settings.model` is ignored.
pub fn choose_provider(settings: &Settings, has_inline_media: bool) -> Result<ProviderChoice> {
    let (provider, model) = match settings.provider.concrete() {
        Some(provider) => (provider, settings.model.clone()),
        None if has_inline_media => (
            settings.hybrid.media_provider,
            settings.hybrid.media_model.clone(),
        ),
        None => (
            settings.hybrid.text_provider,
            settings.hybrid.text_model.clone(),
        ),
    };

    let credential = settings
        .credential_for(provider)
        .ok_or(QuizError::MissingCredential(provider))?;

    Ok(ProviderChoice::new(provider, model, credential))
}

/// Provider whose credential `start` must check up front, if any
///
/// Hybrid defers the check to each cycle since the provider depends on the
/// question.
pub fn required_provider(settings: &Settings) -> Option<ProviderId> {
    settings.provider.concrete()
}
