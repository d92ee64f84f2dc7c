use sentinel_classifier::{detect_language, InferenceClient};
use sentinel_core::types::Language;
use tracing::warn;

use crate::free_client::FreeTranslateClient;

/// Produces an English rendering of a message body when policy requires one.
/// Never raises: every failure degrades to returning the original text
/// untranslated, per SPEC_FULL.md §4.5.
pub struct Translator {
    free_client: FreeTranslateClient,
}

impl Translator {
    pub fn new(free_base_url: String) -> Self {
        Self {
            free_client: FreeTranslateClient::new(free_base_url),
        }
    }

    /// Translate `text` to English. `use_ai` selects the inference-backed
    /// backend over the free service for countries with
    /// `use_ai_for_translation` enabled; `ai` may be `None` even when
    /// `use_ai` is true if no inference client was configured, in which case
    /// the free backend is used instead.
    pub async fn translate(
        &self,
        text: &str,
        use_ai: bool,
        ai: Option<&InferenceClient>,
    ) -> (Language, String, bool) {
        let language = detect_language(text);

        // Heuristic short-circuit: already English with no non-Latin
        // characters needs no round trip at all.
        if language == Language::En && text.chars().all(|c| c.is_ascii()) {
            return (language, text.to_string(), false);
        }

        if use_ai {
            if let Some(ai) = ai {
                match ai.translate(text, "en").await {
                    Ok(translated) => return (language, translated, true),
                    Err(e) => {
                        warn!(error = %e, "AI translation failed, falling back to free backend");
                    }
                }
            }
        }

        match self.free_client.translate(text, "auto", "en").await {
            Ok(translated) => (language, translated, true),
            Err(e) => {
                warn!(error = %e, "translation unavailable, passing through original text");
                (language, text.to_string(), false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn english_ascii_body_skips_translation_entirely() {
        let translator = Translator::new("http://localhost:5000".to_string());
        let (lang, text, was_translated) = translator.translate("plain english text", false, None).await;
        assert_eq!(lang, Language::En);
        assert_eq!(text, "plain english text");
        assert!(!was_translated);
    }
}
