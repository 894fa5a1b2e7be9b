//! Contact fact extraction
//!
//! Pure functions over plain text. Nothing here fails: text without
//! contacts yields an empty list.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,}\b").unwrap()
});

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\(?\d[\d \t().-]{5,}\d").unwrap());

static DATE_SHAPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\d{4}[-./]\d{1,2}[-./]\d{1,2}|\d{1,2}[-./]\d{1,2}[-./]\d{2,4}|\d{4}\s*[-.]\s*\d{4})$",
    )
    .unwrap()
});

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}[\p{Ll}'-]+(?:[ \t]+\p{Lu}[\p{Ll}'-]+){1,3}\b").unwrap()
});

/// Words that open a capitalised run without being part of a name
const NAME_STOP_WORDS: &[&str] = &[
    "contact", "contacts", "kontakt", "kontakta", "press", "media", "phone", "telefon", "tel",
    "mobile", "mobil", "email", "e-mail", "e-post", "mail", "for", "för", "the", "our", "vår",
    "dear", "please", "mr", "mrs", "ms", "dr",
];

/// Maximum gap, in characters, between a role keyword and a name
const ROLE_WINDOW: usize = 40;

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// One contact detail found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContactFact {
    Person {
        name: String,
        role: Option<String>,
        email: Option<String>,
    },
    Email {
        address: String,
    },
    Phone {
        raw: String,
        normalized: String,
    },
}

impl ContactFact {
    /// Storage discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Person { .. } => "person",
            Self::Email { .. } => "email",
            Self::Phone { .. } => "phone",
        }
    }

    /// The value facts are deduplicated on
    pub fn normalized_value(&self) -> String {
        match self {
            Self::Person { name, .. } => name.to_lowercase(),
            Self::Email { address } => address.to_lowercase(),
            Self::Phone { normalized, .. } => normalized.clone(),
        }
    }

    /// Human-readable value as found in the text
    pub fn display_value(&self) -> &str {
        match self {
            Self::Person { name, .. } => name,
            Self::Email { address } => address,
            Self::Phone { raw, .. } => raw,
        }
    }
}

/// The role keywords that mark a nearby capitalised run as a person
#[derive(Debug, Clone)]
pub struct RoleLexicon {
    roles: Vec<String>,
    pattern: Regex,
}

impl RoleLexicon {
    /// Builds a lexicon from role labels, matched case-insensitively
    pub fn new<I, S>(roles: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        // Longest first so "Head of Investor Relations" beats "Investor Relations"
        roles.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = roles
            .iter()
            .map(|r| regex::escape(r))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))?;
        Ok(Self { roles, pattern })
    }

    fn canonical(&self, matched: &str) -> String {
        self.roles
            .iter()
            .find(|r| r.eq_ignore_ascii_case(matched) || r.to_lowercase() == matched.to_lowercase())
            .cloned()
            .unwrap_or_else(|| matched.to_string())
    }
}

impl Default for RoleLexicon {
    fn default() -> Self {
        let roles = [
            "CEO",
            "CFO",
            "COO",
            "CTO",
            "Chief Executive Officer",
            "Chief Financial Officer",
            "President",
            "Chairman",
            "Chair of the Board",
            "Investor Relations",
            "Head of Investor Relations",
            "IR Manager",
            "IR Director",
            "Head of Communications",
            "Communications Director",
            "Press Contact",
            "Media Relations",
            "General Counsel",
            "VD",
            "vice VD",
            "Verkställande direktör",
            "Finanschef",
            "Ekonomichef",
            "Styrelseordförande",
            "Ordförande",
            "IR-ansvarig",
            "IR-chef",
            "Kommunikationschef",
            "Presskontakt",
            "Presschef",
        ];
        Self::new(roles).expect("built-in role lexicon is a valid pattern")
    }
}

/// Extracts emails, phone numbers and labelled people from text
///
/// Emails are lower-cased and deduplicated. Phones keep their raw form
/// and carry a digits-only normalized form. People are reported only
/// when a role keyword from the lexicon sits next to a capitalised name
/// on the same line; the nearest email that follows the name on that
/// line is attached.
pub fn extract_contacts(text: &str, lexicon: &RoleLexicon) -> Vec<ContactFact> {
    let mut facts = Vec::new();

    for person in extract_people(text, lexicon) {
        push_unique(&mut facts, person);
    }
    for address in extract_emails(text) {
        push_unique(&mut facts, ContactFact::Email { address });
    }
    for (raw, normalized) in extract_phones(text) {
        push_unique(&mut facts, ContactFact::Phone { raw, normalized });
    }

    facts
}

fn push_unique(facts: &mut Vec<ContactFact>, fact: ContactFact) {
    let key = (fact.kind(), fact.normalized_value());
    if !facts
        .iter()
        .any(|f| (f.kind(), f.normalized_value()) == key)
    {
        facts.push(fact);
    }
}

/// All distinct email addresses, lower-cased, in order of appearance
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for m in EMAIL_REGEX.find_iter(text) {
        let address = m.as_str().to_lowercase();
        if !seen.contains(&address) {
            seen.push(address);
        }
    }
    seen
}

/// Phone-like runs as `(raw, digits)` pairs
pub fn extract_phones(text: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in text.lines() {
        for m in PHONE_REGEX.find_iter(line) {
            let raw = m.as_str().trim();
            if let Some(normalized) = accept_phone(raw) {
                if !out.iter().any(|(_, n)| *n == normalized) {
                    out.push((raw.to_string(), normalized));
                }
            }
        }
    }
    out
}

fn accept_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_PHONE_DIGITS || digits.len() > MAX_PHONE_DIGITS {
        return None;
    }
    if DATE_SHAPE_REGEX.is_match(raw) {
        return None;
    }
    // Bare digit groups are more often amounts than phone numbers
    let looks_dialled = raw.starts_with('+')
        || raw.starts_with('(')
        || raw.starts_with('0')
        || raw.contains('-')
        || raw.contains(')');
    looks_dialled.then_some(digits)
}

struct Span {
    start: usize,
    end: usize,
    text: String,
}

fn extract_people(text: &str, lexicon: &RoleLexicon) -> Vec<ContactFact> {
    let mut people = Vec::new();

    for line in text.lines() {
        let roles: Vec<Span> = lexicon
            .pattern
            .find_iter(line)
            .map(|m| Span {
                start: m.start(),
                end: m.end(),
                text: lexicon.canonical(m.as_str()),
            })
            .collect();
        if roles.is_empty() {
            continue;
        }

        let names: Vec<Span> = NAME_REGEX
            .find_iter(line)
            .filter_map(|m| trim_name(m.start(), m.as_str()))
            .filter(|n| !roles.iter().any(|r| n.start < r.end && r.start < n.end))
            .collect();

        for role in &roles {
            let nearest = names
                .iter()
                .filter_map(|n| gap(role, n).map(|g| (g, n)))
                .filter(|(g, _)| *g <= ROLE_WINDOW)
                .min_by_key(|(g, _)| *g)
                .map(|(_, n)| n);

            if let Some(name) = nearest {
                let email = EMAIL_REGEX
                    .find_iter(line)
                    .find(|m| m.start() >= name.end)
                    .map(|m| m.as_str().to_lowercase());
                people.push(ContactFact::Person {
                    name: name.text.clone(),
                    role: Some(role.text.clone()),
                    email,
                });
            }
        }
    }

    people
}

/// Drops leading stop words from a capitalised run
fn trim_name(start: usize, candidate: &str) -> Option<Span> {
    let mut offset = 0;
    let mut rest = candidate;
    loop {
        let word_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_end];
        if !NAME_STOP_WORDS.contains(&word.to_lowercase().as_str()) {
            break;
        }
        let after = rest[word_end..].trim_start();
        offset += rest.len() - after.len();
        rest = after;
        if rest.is_empty() {
            return None;
        }
    }

    if rest.split_whitespace().count() < 2 {
        return None;
    }
    Some(Span {
        start: start + offset,
        end: start + candidate.len(),
        text: rest.to_string(),
    })
}

/// Characters between two non-overlapping spans on one line
fn gap(a: &Span, b: &Span) -> Option<usize> {
    if b.start >= a.end {
        Some(b.start - a.end)
    } else if a.start >= b.end {
        Some(a.start - b.end)
    } else {
        None
    }
}
