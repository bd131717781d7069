//! Pure text normalization: dates, slugs, excerpts and tags.
//!
//! Nothing in this module performs I/O or fails. Every function has a
//! documented fallback value, and the date parser additionally reports
//! *why* it fell back so callers can log it.

use chrono::NaiveDate;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Default excerpt length in characters.
pub const EXCERPT_LEN: usize = 160;

/// Default number of tags per article.
pub const TAG_LIMIT: usize = 5;

/// Slug returned when a title has no transliterable characters.
pub const FALLBACK_SLUG: &str = "untitled";

const MIN_TAG_LEN: usize = 4;

static LOCALIZED_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{1,2})\s+(\w+).*?([0-9]{4})").unwrap());

static ISO_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})").unwrap());

static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w'’]+").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "та", "і", "й", "в", "у", "з", "зі", "до", "на", "про", "за", "як", "що", "це", "але",
        "the", "and", "for", "with", "from", "this", "that", "а", "по", "від", "o", "або",
        "який", "яка", "яке", "буде", "було", "став", "стала", "року", "році",
    ]
    .into_iter()
    .collect()
});

/// Genitive month names (Russian and Ukrainian) to month number.
fn month_number(name: &str) -> Option<u32> {
    let month = match name {
        "января" | "січня" => 1,
        "февраля" | "лютого" => 2,
        "марта" | "березня" => 3,
        "апреля" | "квітня" => 4,
        "мая" | "травня" => 5,
        "июня" | "червня" => 6,
        "июля" | "липня" => 7,
        "августа" | "серпня" => 8,
        "сентября" | "вересня" => 9,
        "октября" | "жовтня" => 10,
        "ноября" | "листопада" => 11,
        "декабря" | "грудня" => 12,
        _ => return None,
    };
    Some(month)
}

/// Why [`parse_date`] kept the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFallback {
    /// No `<day> <month>, <year>` pattern and no ISO prefix.
    NoPattern,
    /// The month word is not in the month table.
    UnknownMonth,
    /// Day/month/year matched but do not form a real date.
    InvalidCalendarDate,
}

/// Result of date normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// `YYYY-MM-DD`.
    Normalized(String),
    /// Trimmed input, unchanged.
    Fallback { raw: String, reason: DateFallback },
}

impl DateOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, DateOutcome::Fallback { .. })
    }

    pub fn into_value(self) -> String {
        match self {
            DateOutcome::Normalized(iso) => iso,
            DateOutcome::Fallback { raw, .. } => raw,
        }
    }
}

/// Parse a publication date such as `14 лютого, 2025` or `2025-02-14T10:00:00`.
///
/// Localized dates are matched anywhere in the string, so prefixes like
/// `Опубліковано:` are tolerated. Anything else is returned trimmed and
/// tagged with the reason it was not normalized.
pub fn parse_date(raw: &str) -> DateOutcome {
    let trimmed = raw.trim();
    let fallback = |reason| DateOutcome::Fallback {
        raw: trimmed.to_string(),
        reason,
    };

    if let Some(caps) = ISO_PREFIX_RE.captures(trimmed) {
        let year = caps[1].parse::<i32>().ok();
        let month = caps[2].parse::<u32>().ok();
        let day = caps[3].parse::<u32>().ok();
        return match (year, month, day) {
            (Some(y), Some(m), Some(d)) => calendar_date(y, m, d)
                .map(DateOutcome::Normalized)
                .unwrap_or_else(|| fallback(DateFallback::InvalidCalendarDate)),
            _ => fallback(DateFallback::InvalidCalendarDate),
        };
    }

    let Some(caps) = LOCALIZED_DATE_RE.captures(trimmed) else {
        return fallback(DateFallback::NoPattern);
    };

    let Some(month) = month_number(&caps[2].to_lowercase()) else {
        return fallback(DateFallback::UnknownMonth);
    };

    let day = caps[1].parse::<u32>().ok();
    let year = caps[3].parse::<i32>().ok();
    match (year, day) {
        (Some(y), Some(d)) => calendar_date(y, month, d)
            .map(DateOutcome::Normalized)
            .unwrap_or_else(|| fallback(DateFallback::InvalidCalendarDate)),
        _ => fallback(DateFallback::InvalidCalendarDate),
    }
}

fn calendar_date(year: i32, month: u32, day: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y-%m-%d").to_string())
}

/// Convert `14 лютого, 2025` into `2025-02-14`; unparseable input comes back trimmed.
///
/// String-only form of [`parse_date`] for callers that don't log the fallback reason.
#[allow(dead_code)]
pub fn normalize_date(raw: &str) -> String {
    parse_date(raw).into_value()
}

/// Latin transliteration for Ukrainian and Russian lowercase letters.
fn transliterate(ch: char) -> Option<&'static str> {
    let latin = match ch {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "h",
        'ґ' => "g",
        'д' => "d",
        'е' => "e",
        'є' => "ye",
        'ё' => "yo",
        'ж' => "zh",
        'з' => "z",
        'и' => "y",
        'і' => "i",
        'ї' => "yi",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ь' | 'ъ' => "",
        'ы' => "y",
        'э' => "e",
        'ю' => "yu",
        'я' => "ya",
        _ => return None,
    };
    Some(latin)
}

/// Convert a title to a lowercase Latin slug (`[a-z0-9-]`).
///
/// Composed normalization runs first so letters like `й` and `ї` hit the
/// transliteration table as single characters; remaining Latin diacritics
/// are then decomposed and dropped (`café` → `cafe`).
pub fn slugify(title: &str) -> String {
    let composed = title.nfkc().collect::<String>().to_lowercase();

    let mut latin = String::with_capacity(composed.len());
    for ch in composed.chars() {
        match transliterate(ch) {
            Some(mapped) => latin.push_str(mapped),
            None => latin.push(ch),
        }
    }

    let folded: String = latin.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let slug = NON_ALNUM_RE.replace_all(&folded, "-");
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Plain-text preview no longer than `max_len` characters plus an ellipsis.
pub fn extract_excerpt(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let end = text
        .char_indices()
        .nth(max_len)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..end];
    let cut = match head.rfind(' ') {
        Some(idx) => &head[..idx],
        None => head,
    };
    format!("{}…", cut.trim_end())
}

/// Up to `limit` lowercase keywords from the title followed by the body.
pub fn extract_tags(title: &str, text: &str, limit: usize) -> Vec<String> {
    let combined = format!("{title} {text}");
    WORD_RE
        .find_iter(&combined)
        .map(|m| {
            m.as_str()
                .trim_matches(|c| c == '\'' || c == '’')
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= MIN_TAG_LEN && !STOP_WORDS.contains(word.as_str()))
        .unique()
        .take(limit)
        .collect()
}
