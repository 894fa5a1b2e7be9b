use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use url::Url;

/// What a document is, as far as URL and title reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    About,
    Press,
    Report,
    Interim,
    Governance,
    Unknown,
}

impl DocumentKind {
    /// Converts to the string stored in the database
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::About => "about",
            Self::Press => "press",
            Self::Report => "report",
            Self::Interim => "interim",
            Self::Governance => "governance",
            Self::Unknown => "unknown",
        }
    }

    /// Parses from database string
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "about" => Some(Self::About),
            "press" => Some(Self::Press),
            "report" => Some(Self::Report),
            "interim" => Some(Self::Interim),
            "governance" => Some(Self::Governance),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

static QUARTER_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:q[1-4]|h1|h2)\b").unwrap());

const INTERIM_WORDS: &[&str] = &[
    "interim",
    "quarterly",
    "half-year",
    "half year",
    "delårsrapport",
    "delarsrapport",
    "delårs",
    "kvartalsrapport",
    "bokslutskommunik",
    "year-end report",
];

const REPORT_WORDS: &[&str] = &[
    "annual-report",
    "annual report",
    "annualreport",
    "årsredovisning",
    "arsredovisning",
    "financial-reports",
    "reports",
    "report",
    "rapporter",
    "rapport",
    "hållbarhetsrapport",
    "sustainability",
];

const GOVERNANCE_WORDS: &[&str] = &[
    "governance",
    "bolagsstyrning",
    "board-of-directors",
    "board of directors",
    "styrelse",
    "årsstämma",
    "arsstamma",
    "general meeting",
    "general-meeting",
    "bolagsordning",
    "articles of association",
    "remuneration",
    "ersättning",
];

const PRESS_WORDS: &[&str] = &[
    "press",
    "pressmeddelande",
    "news",
    "nyhet",
    "nyheter",
    "media",
    "release",
    "announcement",
];

const ABOUT_WORDS: &[&str] = &[
    "about",
    "om-oss",
    "om oss",
    "om-bolaget",
    "company",
    "history",
    "historia",
    "who-we-are",
    "management",
    "ledning",
];

/// Infers the document kind from URL path and title keywords
///
/// Interim is checked before report since interim reports are reports too.
pub fn infer_kind(url: &Url, title: Option<&str>) -> DocumentKind {
    let haystack = format!(
        "{} {}",
        url.path().to_lowercase(),
        title.unwrap_or("").to_lowercase()
    );

    let has = |words: &[&str]| words.iter().any(|w| haystack.contains(w));

    if has(INTERIM_WORDS) || QUARTER_TOKEN.is_match(&haystack) {
        DocumentKind::Interim
    } else if has(REPORT_WORDS) {
        DocumentKind::Report
    } else if has(GOVERNANCE_WORDS) {
        DocumentKind::Governance
    } else if has(PRESS_WORDS) {
        DocumentKind::Press
    } else if has(ABOUT_WORDS) {
        DocumentKind::About
    } else {
        DocumentKind::Unknown
    }
}
