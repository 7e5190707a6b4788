use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::TextKind;

use super::Translator;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DEEPL_API_URL: &str = "https://api-free.deepl.com/v2/translate";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";
const HUGGINGFACE_API_URL: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.1";
const TOGETHER_API_URL: &str = "https://api.together.xyz/v1/chat/completions";
const TOGETHER_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.2";

const TITLE_MAX_TOKENS: u32 = 50;
const CONTENT_MAX_TOKENS: u32 = 8400;

const PLAIN_PROMPT: &str =
    "Translate the following Danish text to English. Only return the translation:\n\n";

fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

fn title_prompt(text: &str) -> String {
    format!(
        "You are a highly skilled and concise professional translator. \
         When you receive a sentence in Danish, your task is to translate \
         it into English. VERY IMPORTANT: Do not output any notes, \
         explanations, alternatives or comments after or before the \
         translation.\n\nDanish sentence: {}\n\nEnglish translation:",
        text
    )
}

fn article_prompt(text: &str) -> String {
    format!(
        r#"You are a highly skilled professional translator.

Here are your instructions:
- When you receive an article in Danish, your critical task is to translate it into English.
- You do not output any html, but the actual text of the article.
- You do not add any notes or explanations.
- The article to translate will be inside the <article> tags.
- Once prompted, just output the English translation.
- Do not output the title of the article, only the content.
- Make sure the translation is well formatted and easy to read (no useless line breaks, no extra spaces, etc.)

<article>

{}

</article>

Here is the best English translation of the article above:"#,
        text
    )
}

async fn api_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    AppError::TranslationApi(format!("HTTP {}: {}", status, body))
}

// Chat completions (OpenAI and Together AI share the wire format)

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

impl Message {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

async fn chat_completion(
    client: &Client,
    url: &str,
    api_key: &str,
    request: &ChatRequest<'_>,
) -> Result<String> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    let chat: ChatResponse = response.json().await?;
    chat.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| AppError::TranslationApi("No choices returned from API".to_string()))
}

// Together AI

pub struct TogetherTranslator {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl TogetherTranslator {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            endpoint: TOGETHER_API_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for TogetherTranslator {
    fn name(&self) -> &'static str {
        "Together AI"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, kind: TextKind) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("Together AI"))?;

        let (prompt, max_tokens) = match kind {
            TextKind::Title => (title_prompt(text), TITLE_MAX_TOKENS),
            TextKind::Content => (article_prompt(text), CONTENT_MAX_TOKENS),
        };

        let request = ChatRequest {
            model: TOGETHER_MODEL,
            max_tokens: Some(max_tokens),
            temperature: Some(0.0),
            stop: vec!["</s>", "[/INST]"],
            messages: vec![Message::new("user", prompt)],
        };

        chat_completion(&self.client, &self.endpoint, api_key, &request).await
    }
}

// OpenAI

pub struct OpenAiTranslator {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            endpoint: OPENAI_API_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn name(&self) -> &'static str {
        "OpenAI"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, kind: TextKind) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("OpenAI"))?;

        let (system, max_tokens) = match kind {
            TextKind::Title => (
                "Translate this Danish headline to English. Output only the translation.",
                Some(TITLE_MAX_TOKENS),
            ),
            TextKind::Content => ("Translate from Danish to English", None),
        };

        let request = ChatRequest {
            model: OPENAI_MODEL,
            max_tokens,
            temperature: None,
            stop: Vec::new(),
            messages: vec![Message::new("system", system), Message::new("user", text)],
        };

        chat_completion(&self.client, &self.endpoint, api_key, &request).await
    }
}

// DeepL

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}

pub struct DeepLTranslator {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl DeepLTranslator {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            endpoint: DEEPL_API_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for DeepLTranslator {
    fn name(&self) -> &'static str {
        "DeepL"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, _kind: TextKind) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("DeepL"))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("DeepL-Auth-Key {}", api_key))
            .form(&[("text", text), ("source_lang", "DA"), ("target_lang", "EN")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let deepl: DeepLResponse = response.json().await?;
        deepl
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| AppError::TranslationApi("No translation returned from API".to_string()))
    }
}

// Hugging Face inference API (Mistral 7B)

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: String,
}

pub struct HuggingFaceTranslator {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
}

impl HuggingFaceTranslator {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
            endpoint: HUGGINGFACE_API_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Translator for HuggingFaceTranslator {
    fn name(&self) -> &'static str {
        "Hugging Face"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn translate(&self, text: &str, kind: TextKind) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AppError::MissingCredential("Hugging Face"))?;

        let prompt = format!("{}{}", PLAIN_PROMPT, text);
        let request = InferenceRequest {
            inputs: prompt.clone(),
            parameters: InferenceParameters {
                max_new_tokens: match kind {
                    TextKind::Title => TITLE_MAX_TOKENS,
                    TextKind::Content => 1024,
                },
                temperature: 0.1,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let generated: Vec<GeneratedText> = response.json().await?;
        generated
            .into_iter()
            .next()
            .map(|g| extract_generated_translation(&g.generated_text, &prompt))
            .ok_or_else(|| AppError::TranslationApi("Empty response from API".to_string()))
    }
}

/// The inference API echoes the prompt; keep only what follows it.
fn extract_generated_translation(generated: &str, prompt: &str) -> String {
    for label in ["English:", "Translation:"] {
        if let Some((_, tail)) = generated.rsplit_once(label) {
            return tail.trim().to_string();
        }
    }
    generated.replace(prompt, "").trim().to_string()
}
