use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ProviderStatus, TextKind, TranslationMethod};

use super::providers::{DeepLTranslator, HuggingFaceTranslator, OpenAiTranslator, TogetherTranslator};

/// Upper bound on characters sent to a provider in one request.
pub const CHUNK_SIZE: usize = 3000;

/// A Danish to English translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;

    fn has_credentials(&self) -> bool;

    async fn translate(&self, text: &str, kind: TextKind) -> Result<String>;
}

/// Maps a `TranslationMethod` to its provider and applies the shared rules:
/// pass-through for `none`, chunking of long content and the title length check.
pub struct TranslationDispatcher {
    providers: HashMap<TranslationMethod, Arc<dyn Translator>>,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl TranslationDispatcher {
    pub fn new(chunk_delay: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            chunk_size: CHUNK_SIZE,
            chunk_delay,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut dispatcher = Self::new(Duration::from_millis(config.translation_delay_ms));
        dispatcher.register(
            TranslationMethod::DeepL,
            Arc::new(DeepLTranslator::new(config.deepl_api_key.clone())?),
        );
        dispatcher.register(
            TranslationMethod::OpenAi,
            Arc::new(OpenAiTranslator::new(config.openai_api_key.clone())?),
        );
        dispatcher.register(
            TranslationMethod::HuggingFace,
            Arc::new(HuggingFaceTranslator::new(config.huggingface_api_key.clone())?),
        );
        dispatcher.register(
            TranslationMethod::TogetherAi,
            Arc::new(TogetherTranslator::new(config.together_api_key.clone())?),
        );
        Ok(dispatcher)
    }

    pub fn register(&mut self, method: TranslationMethod, translator: Arc<dyn Translator>) {
        self.providers.insert(method, translator);
    }

    pub fn status(&self, method: TranslationMethod) -> ProviderStatus {
        match self.providers.get(&method) {
            _ if method == TranslationMethod::None => ProviderStatus::Disabled,
            None => ProviderStatus::Disabled,
            Some(provider) if provider.has_credentials() => ProviderStatus::Ready,
            Some(_) => ProviderStatus::NoApiKey,
        }
    }

    /// Translate `text`, surfacing provider problems as errors.
    pub async fn try_translate(
        &self,
        text: &str,
        method: TranslationMethod,
        kind: TextKind,
    ) -> Result<String> {
        if method == TranslationMethod::None || text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let Some(provider) = self.providers.get(&method) else {
            return Ok(text.to_string());
        };

        if !provider.has_credentials() {
            return Err(AppError::MissingCredential(provider.name()));
        }

        match kind {
            TextKind::Title => {
                let translated = provider.translate(text, TextKind::Title).await?;
                Ok(limit_title(text, translated))
            }
            TextKind::Content => {
                let chunks = split_into_chunks(text, self.chunk_size);
                let mut translated = Vec::with_capacity(chunks.len());
                for (i, chunk) in chunks.iter().enumerate() {
                    if i > 0 {
                        tokio::time::sleep(self.chunk_delay).await;
                    }
                    tracing::debug!(
                        "Translating chunk {}/{} with {}",
                        i + 1,
                        chunks.len(),
                        provider.name()
                    );
                    translated.push(provider.translate(chunk, TextKind::Content).await?);
                }
                Ok(translated.join("\n\n"))
            }
        }
    }

    /// Translate `text`, falling back to the original on any failure.
    pub async fn translate(&self, text: &str, method: TranslationMethod, kind: TextKind) -> String {
        match self.try_translate(text, method, kind).await {
            Ok(translated) => translated,
            Err(AppError::MissingCredential(provider)) => {
                tracing::debug!("{} API key not configured, keeping original text", provider);
                text.to_string()
            }
            Err(e) => {
                tracing::warn!("Translation with {} failed: {}", method, e);
                text.to_string()
            }
        }
    }
}

/// Titles that come back more than twice as long as the input usually carry
/// notes from the model; keep only the first line.
fn limit_title(original: &str, translated: String) -> String {
    let original_len = original.chars().count();
    if translated.chars().count() > original_len * 2 {
        translated
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    } else {
        translated
    }
}

/// Split on word boundaries into chunks of at most `max_chars` characters.
/// A single word longer than the limit becomes its own chunk.
pub fn split_into_chunks(content: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for word in content.split_whitespace() {
        let word_len = word.chars().count();
        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };

        if needed > max_chars && !current.is_empty() {
            chunks.push(current.join(" "));
            current = vec![word];
            current_len = word_len;
        } else {
            current.push(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for EchoTranslator {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn has_credentials(&self) -> bool {
            true
        }

        async fn translate(&self, text: &str, _kind: TextKind) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(text.to_string())
        }
    }

    struct FixedTranslator(Result<String>);

    #[async_trait]
    impl Translator for FixedTranslator {
        fn name(&self) -> &'static str {
            "Fixed"
        }

        fn has_credentials(&self) -> bool {
            true
        }

        async fn translate(&self, _text: &str, _kind: TextKind) -> Result<String> {
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(AppError::TranslationApi(e.to_string())),
            }
        }
    }

    fn long_danish_text() -> String {
        "Nationalbanken   holder renten uændret,\n\tmens aktiemarkedet stiger igen. "
            .repeat(120)
    }

    fn normalized(text: &str) -> String {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn dispatcher_without_keys() -> TranslationDispatcher {
        let config = Config {
            deepl_api_key: None,
            openai_api_key: None,
            huggingface_api_key: None,
            together_api_key: None,
            translation_delay_ms: 0,
            ..Config::default()
        };
        TranslationDispatcher::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn none_returns_input_unchanged() {
        let dispatcher = dispatcher_without_keys();
        let text = "Aktierne steg i dag";

        assert_eq!(
            dispatcher.translate(text, TranslationMethod::None, TextKind::Content).await,
            text
        );
        assert_eq!(dispatcher.status(TranslationMethod::None), ProviderStatus::Disabled);
    }

    #[tokio::test]
    async fn providers_without_keys_pass_text_through() {
        let dispatcher = dispatcher_without_keys();
        let text = "Aktierne steg i dag";

        for method in TranslationMethod::ALL {
            assert_eq!(dispatcher.translate(text, method, TextKind::Title).await, text);
        }

        let result = dispatcher
            .try_translate(text, TranslationMethod::TogetherAi, TextKind::Content)
            .await;
        assert!(matches!(result, Err(AppError::MissingCredential("Together AI"))));
        assert_eq!(dispatcher.status(TranslationMethod::DeepL), ProviderStatus::NoApiKey);
    }

    #[tokio::test]
    async fn blank_input_is_not_sent() {
        let mut dispatcher = TranslationDispatcher::new(Duration::ZERO);
        let echo = Arc::new(EchoTranslator { calls: AtomicUsize::new(0) });
        dispatcher.register(TranslationMethod::OpenAi, echo.clone());

        let out = dispatcher
            .translate("   \n ", TranslationMethod::OpenAi, TextKind::Content)
            .await;

        assert_eq!(out, "   \n ");
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn chunks_respect_limit_and_word_boundaries() {
        let text = long_danish_text();
        let chunks = split_into_chunks(&text, CHUNK_SIZE);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= CHUNK_SIZE);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        assert_eq!(chunks.join(" "), normalized(&text));
    }

    #[test]
    fn oversized_word_gets_its_own_chunk() {
        let chunks = split_into_chunks("kort ordforrådsudvidelsesprojekt kort", 10);
        assert_eq!(chunks, vec!["kort", "ordforrådsudvidelsesprojekt", "kort"]);
    }

    #[tokio::test]
    async fn content_is_chunked_and_rejoined_in_order() {
        let mut dispatcher = TranslationDispatcher::new(Duration::ZERO);
        let echo = Arc::new(EchoTranslator { calls: AtomicUsize::new(0) });
        dispatcher.register(TranslationMethod::TogetherAi, echo.clone());
        let text = long_danish_text();

        let out = dispatcher
            .translate(&text, TranslationMethod::TogetherAi, TextKind::Content)
            .await;

        let expected_chunks = split_into_chunks(&text, CHUNK_SIZE).len();
        assert_eq!(echo.calls.load(Ordering::SeqCst), expected_chunks);
        assert_eq!(out.matches("\n\n").count(), expected_chunks - 1);
        assert_eq!(normalized(&out), normalized(&text));
    }

    #[tokio::test]
    async fn verbose_title_is_cut_to_first_line() {
        let mut dispatcher = TranslationDispatcher::new(Duration::ZERO);
        dispatcher.register(
            TranslationMethod::TogetherAi,
            Arc::new(FixedTranslator(Ok(
                "Shares rose\nNote: this translation keeps the informal tone of the original."
                    .to_string(),
            ))),
        );

        let out = dispatcher
            .translate("Aktier steg", TranslationMethod::TogetherAi, TextKind::Title)
            .await;

        assert_eq!(out, "Shares rose");
    }

    #[tokio::test]
    async fn provider_error_falls_back_to_original() {
        let mut dispatcher = TranslationDispatcher::new(Duration::ZERO);
        dispatcher.register(
            TranslationMethod::DeepL,
            Arc::new(FixedTranslator(Err(AppError::TranslationApi("quota".to_string())))),
        );

        let text = "Aktierne steg i dag";
        assert_eq!(
            dispatcher.translate(text, TranslationMethod::DeepL, TextKind::Content).await,
            text
        );
        assert!(dispatcher
            .try_translate(text, TranslationMethod::DeepL, TextKind::Content)
            .await
            .is_err());
    }
}
