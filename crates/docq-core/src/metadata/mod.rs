//! Pattern-based metadata extraction
//!
//! Pure function over extracted text. Every regex hit must also pass a
//! format validator before it counts as a match: precision over recall.
//! Fields with no validated match are absent from the result.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

lazy_static! {
    static ref CNPJ_RE: Regex = Regex::new(r"\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}").unwrap();
    static ref CPF_RE: Regex = Regex::new(r"\d{3}\.?\d{3}\.?\d{3}-?\d{2}").unwrap();
    static ref DATE_RE: Regex = Regex::new(r"\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}").unwrap();
    static ref VALOR_RE: Regex = Regex::new(r"R\$?\s*\d{1,3}(?:\.\d{3})*(?:,\d{2})?").unwrap();
    static ref VALOR_FORMAT: Regex = Regex::new(r"^\d{1,3}(?:\.\d{3})*(?:,\d{2})?$").unwrap();
    static ref EMAIL_RE: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();
    static ref TELEFONE_RE: Regex = Regex::new(r"\(?\d{2}\)?\s*\d{4,5}-?\d{4}").unwrap();
}

/// Extract structured fields from text
///
/// Matches are deduplicated by exact string, first-seen order preserved.
pub fn extract_metadata(text: &str) -> BTreeMap<String, Vec<String>> {
    let mut metadata = BTreeMap::new();

    collect(&mut metadata, "cnpj", CNPJ_RE.find_iter(text), |m| {
        valid_cnpj(m).then(|| m.to_string())
    });
    collect(&mut metadata, "cpf", CPF_RE.find_iter(text), |m| {
        valid_cpf(m).then(|| m.to_string())
    });
    collect(&mut metadata, "data", DATE_RE.find_iter(text), |m| {
        valid_date(m).then(|| m.to_string())
    });
    collect(&mut metadata, "valor", VALOR_RE.find_iter(text), |m| {
        let cleaned: String = m.chars().filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.').collect();
        VALOR_FORMAT.is_match(&cleaned).then_some(cleaned)
    });
    collect(&mut metadata, "email", EMAIL_RE.find_iter(text), |m| {
        Some(m.to_string())
    });
    collect(&mut metadata, "telefone", TELEFONE_RE.find_iter(text), |m| {
        let digits = m.chars().filter(char::is_ascii_digit).count();
        (10..=11).contains(&digits).then(|| m.to_string())
    });

    metadata
}

fn collect<'t>(
    metadata: &mut BTreeMap<String, Vec<String>>,
    field: &str,
    matches: regex::Matches<'_, 't>,
    validate: impl Fn(&str) -> Option<String>,
) {
    let mut values: Vec<String> = Vec::new();
    for m in matches {
        if let Some(value) = validate(m.as_str()) {
            if !values.contains(&value) {
                values.push(value);
            }
        }
    }
    if !values.is_empty() {
        metadata.insert(field.to_string(), values);
    }
}

fn digits_of(s: &str) -> Vec<u32> {
    s.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// CNPJ check-digit validation
fn valid_cnpj(s: &str) -> bool {
    let digits = digits_of(s);
    if digits.len() != 14 {
        return false;
    }
    let weights1 = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    let weights2 = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    digits[12] == cnpj_check_digit(&digits[..12], &weights1)
        && digits[13] == cnpj_check_digit(&digits[..13], &weights2)
}

fn cnpj_check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        rem => 11 - rem,
    }
}

/// CPF check-digit validation
fn valid_cpf(s: &str) -> bool {
    let digits = digits_of(s);
    if digits.len() != 11 {
        return false;
    }
    // All-equal sequences pass the checksum but are not valid documents
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }
    digits[9] == cpf_check_digit(&digits[..9], 10) && digits[10] == cpf_check_digit(&digits[..10], 11)
}

fn cpf_check_digit(digits: &[u32], start_weight: u32) -> u32 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| d * (start_weight - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        rem => rem,
    }
}

/// Calendar validation for day-first dates, 2- or 4-digit years
fn valid_date(s: &str) -> bool {
    let parts: Vec<&str> = s.split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return false;
    }
    let (day, month, year) = match (
        parts[0].parse::<u32>(),
        parts[1].parse::<u32>(),
        parts[2].parse::<i32>(),
    ) {
        (Ok(d), Ok(m), Ok(y)) => (d, m, y),
        _ => return false,
    };
    let year = if parts[2].len() == 2 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(year, month, day).is_some()
}
