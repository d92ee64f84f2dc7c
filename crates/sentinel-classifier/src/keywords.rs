use sentinel_core::config::KeywordPair;
use sentinel_core::types::Language;
use unicode_segmentation::UnicodeSegmentation;

fn tokenize(s: &str) -> Vec<String> {
    s.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// True if `keyword` (possibly a multi-word phrase) appears in `body_tokens`
/// on exact Unicode word boundaries — `unicode_words()` already excludes
/// partial matches inside a longer word, so no extra boundary checking is
/// needed beyond comparing token windows.
fn whole_word_contains(body_tokens: &[String], keyword: &str) -> bool {
    let kw_tokens = tokenize(keyword);
    if kw_tokens.is_empty() {
        return false;
    }
    body_tokens
        .windows(kw_tokens.len())
        .any(|window| window == kw_tokens.as_slice())
}

/// Which keyword form(s) to test for a given detected language, per
/// SPEC_FULL.md §4.4: native form for Arabic, English form for English,
/// both forms when the language is ambiguous.
fn forms_for<'a>(pair: &'a KeywordPair, lang: Language) -> Vec<&'a str> {
    match lang {
        Language::En => vec![pair.english.as_str()],
        Language::Ar => vec![pair.native.as_str()],
        Language::Other => vec![pair.english.as_str(), pair.native.as_str()],
    }
}

/// Return the English-normalized forms of every keyword pair in `pairs`
/// that matches `body` on a whole-word basis for the detected language.
pub fn match_keywords(body: &str, lang: Language, pairs: &[KeywordPair]) -> Vec<String> {
    let tokens = tokenize(body);
    pairs
        .iter()
        .filter(|pair| {
            forms_for(pair, lang)
                .iter()
                .any(|form| whole_word_contains(&tokens, form))
        })
        .map(|pair| pair.english.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(english: &str, native: &str) -> KeywordPair {
        KeywordPair {
            english: english.to_string(),
            native: native.to_string(),
        }
    }

    #[test]
    fn matches_single_word_english() {
        let pairs = vec![pair("protest", "protest")];
        let matched = match_keywords("a protest broke out downtown", Language::En, &pairs);
        assert_eq!(matched, vec!["protest".to_string()]);
    }

    #[test]
    fn does_not_match_substring_inside_longer_word() {
        let pairs = vec![pair("cat", "cat")];
        let matched = match_keywords("the category was wrong", Language::En, &pairs);
        assert!(matched.is_empty());
    }

    #[test]
    fn matches_native_arabic_form() {
        let pairs = vec![pair("protest", "احتجاج")];
        let matched = match_keywords("عاجل احتجاج في بغداد", Language::Ar, &pairs);
        assert_eq!(matched, vec!["protest".to_string()]);
    }

    #[test]
    fn matches_multi_word_phrase() {
        let pairs = vec![pair("social media", "social media")];
        let matched = match_keywords("a post went viral on social media today", Language::En, &pairs);
        assert_eq!(matched, vec!["social media".to_string()]);
    }

    #[test]
    fn other_language_checks_both_forms() {
        let pairs = vec![pair("urgent", "عاجل")];
        let matched = match_keywords("12345 عاجل", Language::Other, &pairs);
        assert_eq!(matched, vec!["urgent".to_string()]);
    }
}
