use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranslationMethod {
    #[default]
    None,
    DeepL,
    OpenAi,
    HuggingFace,
    TogetherAi,
}

impl TranslationMethod {
    pub const ALL: [TranslationMethod; 5] = [
        TranslationMethod::None,
        TranslationMethod::DeepL,
        TranslationMethod::OpenAi,
        TranslationMethod::HuggingFace,
        TranslationMethod::TogetherAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationMethod::None => "none",
            TranslationMethod::DeepL => "deepl",
            TranslationMethod::OpenAi => "openai",
            TranslationMethod::HuggingFace => "huggingface",
            TranslationMethod::TogetherAi => "togetherai",
        }
    }
}

/// Unknown tags parse as `None`.
impl FromStr for TranslationMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s.trim().to_lowercase().as_str() {
            "deepl" => TranslationMethod::DeepL,
            "openai" => TranslationMethod::OpenAi,
            "huggingface" | "mistral7b" => TranslationMethod::HuggingFace,
            "togetherai" | "together" => TranslationMethod::TogetherAi,
            _ => TranslationMethod::None,
        };
        Ok(method)
    }
}

impl From<String> for TranslationMethod {
    fn from(s: String) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl From<TranslationMethod> for String {
    fn from(method: TranslationMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for TranslationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Titles get a short prompt and a length sanity check; content is chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Title,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderStatus {
    #[default]
    Disabled,
    Ready,
    NoApiKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_and_legacy_tags() {
        assert_eq!("deepl".parse::<TranslationMethod>().unwrap(), TranslationMethod::DeepL);
        assert_eq!("OpenAI".parse::<TranslationMethod>().unwrap(), TranslationMethod::OpenAi);
        assert_eq!(
            "mistral7b".parse::<TranslationMethod>().unwrap(),
            TranslationMethod::HuggingFace
        );
        assert_eq!(
            "togetherai".parse::<TranslationMethod>().unwrap(),
            TranslationMethod::TogetherAi
        );
    }

    #[test]
    fn unknown_tag_behaves_as_none() {
        assert_eq!(TranslationMethod::from("babelfish".to_string()), TranslationMethod::None);
    }

    #[test]
    fn round_trips_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            method: TranslationMethod,
        }

        let text = toml::to_string(&Wrapper { method: TranslationMethod::TogetherAi }).unwrap();
        assert_eq!(text.trim(), r#"method = "togetherai""#);

        let parsed: Wrapper = toml::from_str(r#"method = "nonsense""#).unwrap();
        assert_eq!(parsed.method, TranslationMethod::None);
    }
}
