use crate::error::ExtractError;
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// A closed time interval with month granularity. Only used internally by
/// work-year computation; never persisted.
pub type Period = (NaiveDate, NaiveDate);

static YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[\.\-/](\d{1,2})").expect("valid regex"));
static CJK_YEAR_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\s*年\s*(\d{1,2})\s*月").expect("valid regex"));
static ENGLISH_MONTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{3,9})\s+(\d{4})").expect("valid regex"));
static BARE_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})\b").expect("valid regex"));

static PERIOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    let token = r"\d{4}(?:[\.\-/]\d{1,2})?|\d{4}年\d{1,2}月|[A-Za-z]{3,9}\s+\d{4}";
    let separator = r"\s*(?:-|–|—|~|to|至)\s*";
    Regex::new(&format!(
        r"(?i)((?:{token})){separator}((?:{token})|至今|present|now)"
    ))
    .expect("valid regex")
});

static OPEN_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(至今|present|now)$").expect("valid regex"));

fn english_month(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse one date token into `(year, month)`. Accepts `YYYY.MM` (also `-`
/// and `/` separators), `YYYY年MM月`, `EnglishMonth YYYY`, and a bare `YYYY`
/// which defaults the month to June.
pub fn parse_year_month(token: &str) -> Result<(i32, u32), ExtractError> {
    let token = token.trim();

    if let Some(captures) = YEAR_MONTH_RE.captures(token) {
        let year: i32 = captures[1].parse().unwrap_or_default();
        let month: u32 = captures[2].parse().unwrap_or_default();
        return Ok((year, month.clamp(1, 12)));
    }
    if let Some(captures) = CJK_YEAR_MONTH_RE.captures(token) {
        let year: i32 = captures[1].parse().unwrap_or_default();
        let month: u32 = captures[2].parse().unwrap_or_default();
        return Ok((year, month.clamp(1, 12)));
    }
    if let Some(captures) = ENGLISH_MONTH_RE.captures(token) {
        if let Some(month) = english_month(&captures[1]) {
            let year: i32 = captures[2].parse().unwrap_or_default();
            return Ok((year, month));
        }
    }
    if let Some(captures) = BARE_YEAR_RE.captures(token) {
        let year: i32 = captures[1].parse().unwrap_or_default();
        return Ok((year, 6));
    }

    Err(ExtractError::MalformedDateToken(token.to_string()))
}

fn parse_month_start(token: &str) -> Result<NaiveDate, ExtractError> {
    let (year, month) = parse_year_month(token)?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ExtractError::MalformedDateToken(token.to_string()))
}

/// Scan text for `<start> <separator> <end>` ranges. Open-ended markers
/// resolve to `today`; ranges with end before start are dropped as malformed.
pub fn extract_periods(text: &str, today: NaiveDate) -> Vec<Period> {
    let text = text.replace("至 今", "至今");
    let mut periods = Vec::new();

    for captures in PERIOD_RE.captures_iter(&text) {
        let start = match parse_month_start(&captures[1]) {
            Ok(date) => date,
            Err(_) => continue,
        };
        let end_token = &captures[2];
        let end = if OPEN_END_RE.is_match(end_token.trim()) {
            today
        } else {
            match parse_month_start(end_token) {
                Ok(date) => date,
                Err(_) => continue,
            }
        };
        if end < start {
            continue;
        }
        periods.push((start, end));
    }

    periods
}

/// A time range located inside free text. `end` is `None` for open-ended
/// ranges ("至今"/"present"/"now").
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRangeMatch {
    pub span: std::ops::Range<usize>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

/// First well-formed `<start> <separator> <end>` range in the text.
pub fn find_time_range(text: &str) -> Option<TimeRangeMatch> {
    for captures in PERIOD_RE.captures_iter(text) {
        let Ok(start) = parse_month_start(&captures[1]) else {
            continue;
        };
        let end_token = captures[2].trim().to_string();
        let end = if OPEN_END_RE.is_match(&end_token) {
            None
        } else {
            match parse_month_start(&end_token) {
                Ok(date) if date >= start => Some(date),
                _ => continue,
            }
        };
        let Some(whole) = captures.get(0) else {
            continue;
        };
        return Some(TimeRangeMatch {
            span: whole.range(),
            start,
            end,
        });
    }
    None
}

/// Union overlapping and adjacent periods after sorting by start. The result
/// is the minimal set of disjoint intervals covering the input.
pub fn merge_periods(mut periods: Vec<Period>) -> Vec<Period> {
    if periods.is_empty() {
        return periods;
    }
    periods.sort_by_key(|period| period.0);

    let mut merged: Vec<Period> = Vec::with_capacity(periods.len());
    for (start, end) in periods {
        match merged.last_mut() {
            Some(last) if start <= last.1 => {
                if end > last.1 {
                    last.1 = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Inclusive of both endpoint months.
pub fn months_between(a: NaiveDate, b: NaiveDate) -> i64 {
    i64::from(b.year() - a.year()) * 12 + i64::from(b.month() as i32 - a.month() as i32) + 1
}

fn cjk_numeral(ch: char) -> Option<i64> {
    let value = match ch {
        '零' => 0,
        '一' => 1,
        '二' | '两' => 2,
        '三' => 3,
        '四' => 4,
        '五' => 5,
        '六' => 6,
        '七' => 7,
        '八' => 8,
        '九' => 9,
        '十' => 10,
        _ => return None,
    };
    Some(value)
}

fn cjk_number(text: &str) -> i64 {
    if text == "十" {
        return 10;
    }
    if let Some(position) = text.find('十') {
        let (left, right) = text.split_at(position);
        let right = &right['十'.len_utf8()..];
        let tens = left
            .chars()
            .next()
            .and_then(cjk_numeral)
            .filter(|_| !left.is_empty())
            .unwrap_or(1);
        let ones = right.chars().next().and_then(cjk_numeral).unwrap_or(0);
        return tens * 10 + ones;
    }
    text.chars()
        .filter_map(cjk_numeral)
        .fold(0, |total, digit| total * 10 + digit)
}

static ARABIC_YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Bare "N年" would swallow dates like 2018年, so the number must be
    // followed by an experience marker (经验/开发/研发/从业), possibly after a
    // short domain word as in "8+年Java开发".
    Regex::new(
        r"(?i)(\d+(?:\.\d+)?)(?:\s*\+?\s*年(?:以上|多|余|\+)?(?:的)?[\x{4e00}-\x{9fa5}A-Za-z]{0,8}?(?:经验|开发|研发|从业)|\+?\s*(?:years?|yrs?)(?:\s+of)?\s+experience)",
    )
    .expect("valid regex")
});
static CJK_YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"([一二三四五六七八九十两]+)年(半)?(?:以上|多|余|\+)?(?:的)?[\x{4e00}-\x{9fa5}A-Za-z]{0,8}?(?:经验|开发|研发|从业)",
    )
    .expect("valid regex")
});

/// Mine explicit "N years" phrases and return the median of all mentions.
pub fn years_from_phrases(text: &str) -> Option<f64> {
    let mut values: Vec<f64> = Vec::new();

    for captures in ARABIC_YEARS_RE.captures_iter(text) {
        if let Ok(value) = captures[1].parse::<f64>() {
            // Four-digit matches are calendar years, not tenure.
            if value <= 60.0 {
                values.push(value);
            }
        }
    }
    for captures in CJK_YEARS_RE.captures_iter(text) {
        let base = cjk_number(&captures[1]) as f64;
        let half = if captures.get(2).is_some() { 0.5 } else { 0.0 };
        if base + half <= 60.0 {
            values.push(base + half);
        }
    }

    if values.is_empty() {
        return None;
    }
    values.sort_by(|left, right| left.total_cmp(right));
    Some(values[values.len() / 2])
}

/// Deterministic work-year estimate: merged-period tenure combined with the
/// self-reported estimate, keeping the smaller when both exist, clamped to
/// [0, 60] and floored.
pub fn compute_work_years_at(text: &str, today: NaiveDate) -> Option<i64> {
    let merged = merge_periods(extract_periods(text, today));
    let total_months: i64 = merged
        .iter()
        .map(|(start, end)| months_between(*start, *end))
        .sum();

    let years_from_periods = if total_months > 0 {
        Some((total_months as f64 / 12.0 * 10.0).round() / 10.0)
    } else {
        None
    };
    let years_from_text = years_from_phrases(text);

    let years = match (years_from_periods, years_from_text) {
        (Some(periods), Some(text)) => Some(periods.min(text)),
        (Some(periods), None) => Some(periods),
        (None, text) => text,
    }?;

    Some(years.clamp(0.0, 60.0).floor() as i64)
}

pub fn compute_work_years(text: &str) -> Option<i64> {
    compute_work_years_at(text, Utc::now().date_naive())
}
