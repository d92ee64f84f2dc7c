use sentinel_core::types::Language;

fn is_arabic(c: char) -> bool {
    matches!(c as u32, 0x0600..=0x06FF | 0x0750..=0x077F)
}

/// Heuristic language detector: compares the count of Arabic-block
/// characters against Latin-alphabet characters and decides by whichever is
/// larger. Ties (including the all-punctuation/empty case) fall back to
/// script presence rather than a vocabulary lookup, per SPEC_FULL.md §4.4.
pub fn detect_language(body: &str) -> Language {
    let arabic_chars = body.chars().filter(|c| is_arabic(*c)).count();
    let latin_chars = body.chars().filter(|c| c.is_ascii_alphabetic()).count();

    if arabic_chars == 0 && latin_chars == 0 {
        return Language::Other;
    }
    match arabic_chars.cmp(&latin_chars) {
        std::cmp::Ordering::Greater => Language::Ar,
        std::cmp::Ordering::Less => Language::En,
        std::cmp::Ordering::Equal => {
            if arabic_chars > 0 {
                Language::Ar
            } else {
                Language::En
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_english() {
        assert_eq!(detect_language("Breaking news from the capital today"), Language::En);
    }

    #[test]
    fn detects_arabic() {
        assert_eq!(detect_language("عاجل: احتجاجات في بغداد اليوم"), Language::Ar);
    }

    #[test]
    fn detects_other_for_no_letters() {
        assert_eq!(detect_language("12345 !!! ###"), Language::Other);
    }

    #[test]
    fn mixed_body_decided_by_majority_script() {
        // Mostly Arabic with one English loanword embedded.
        assert_eq!(detect_language("عاجل: مظاهرة كبرى في بغداد واشنطن"), Language::Ar);
    }
}
