mod providers;
mod translator;

pub use providers::{DeepLTranslator, HuggingFaceTranslator, OpenAiTranslator, TogetherTranslator};
pub use translator::{split_into_chunks, TranslationDispatcher, Translator, CHUNK_SIZE};
