use whatlang::{detect, Lang};

const MIN_CONFIDENCE: f64 = 0.25;
const MIN_TEXT_LENGTH: usize = 50;

/// Detects the language of extracted text as a two-letter code
///
/// Short or ambiguous text yields `None` rather than a guess.
pub fn detect_language(text: &str) -> Option<String> {
    if text.trim().chars().count() < MIN_TEXT_LENGTH {
        return None;
    }

    let info = detect(text)?;
    if info.confidence() < MIN_CONFIDENCE {
        return None;
    }
    Some(lang_to_code(info.lang()))
}

/// Reduces an HTML `lang` attribute such as `sv-SE` to `sv`
pub fn primary_subtag(lang_attr: &str) -> Option<String> {
    let primary = lang_attr.split(['-', '_']).next()?.trim().to_lowercase();
    (primary.len() == 2 && primary.chars().all(|c| c.is_ascii_alphabetic())).then_some(primary)
}

fn lang_to_code(lang: Lang) -> String {
    match lang {
        Lang::Eng => "en",
        Lang::Swe => "sv",
        Lang::Nob => "no",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Deu => "de",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Ita => "it",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Por => "pt",
        Lang::Rus => "ru",
        Lang::Est => "et",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        other => return other.code().to_string(),
    }
    .to_string()
}
