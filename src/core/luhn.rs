//! Check-digit engine for 14-digit device identifier bodies.
//!
//! Digits at even indices (the 1st, 3rd, ... characters) are summed as they
//! are; digits at odd indices are doubled and, when the result has two
//! digits, reduced by adding those digits. The check digit brings the total
//! up to the next multiple of ten.

use crate::domain::model::{
    BatchResult, CheckDigit, CorrectedIdentifier, IdentifierBody, RowFailure, BODY_LEN,
};
use crate::utils::error::InvalidIdentifier;

/// Luhn weighting of a single digit at `index`.
fn luhn_term(index: usize, digit: u8) -> u32 {
    let digit = u32::from(digit);
    if index % 2 == 0 {
        digit
    } else {
        let doubled = digit * 2;
        if doubled >= 10 {
            doubled / 10 + doubled % 10
        } else {
            doubled
        }
    }
}

/// Sum of Luhn terms over `digits`, indexed from the left starting at 0.
pub fn luhn_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(index, &digit)| luhn_term(index, digit))
        .sum()
}

pub fn compute_check_digit(body: &IdentifierBody) -> CheckDigit {
    let total = luhn_sum(body.digits());
    CheckDigit::from_mod10(10 - total % 10)
}

/// Validates `body` and computes its check digit in one step.
pub fn check_digit_for(body: &str) -> Result<CheckDigit, InvalidIdentifier> {
    IdentifierBody::parse(body).map(|body| compute_check_digit(&body))
}

/// Keeps the first fourteen characters of `raw` and appends a freshly
/// computed check digit. Anything after the fourteenth character is dropped.
pub fn correct_identifier(raw: &str) -> Result<CorrectedIdentifier, InvalidIdentifier> {
    let actual = raw.chars().count();
    if actual < BODY_LEN {
        return Err(InvalidIdentifier::TooShort {
            value: raw.to_string(),
            expected: BODY_LEN,
            actual,
        });
    }

    let prefix: String = raw.chars().take(BODY_LEN).collect();
    let body = IdentifierBody::parse(&prefix).map_err(|e| e.with_value(raw))?;
    Ok(CorrectedIdentifier::new(&body, compute_check_digit(&body)))
}

/// Corrects every identifier, isolating failures per row.
///
/// A malformed row never discards the others: successes and failures are
/// both returned in input order, failures tagged with their batch index.
pub fn apply_batch<I, S>(raws: I) -> BatchResult
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = BatchResult::default();
    for (index, raw) in raws.into_iter().enumerate() {
        match correct_identifier(raw.as_ref()) {
            Ok(corrected) => result.corrected.push(corrected),
            Err(error) => result.failures.push(RowFailure { index, error }),
        }
    }
    result
}

/// True when `value` is a non-empty digit string whose Luhn sum is a multiple of ten.
pub fn is_luhn_valid(value: &str) -> bool {
    let digits: Option<Vec<u8>> = value
        .chars()
        .map(|ch| ch.to_digit(10).map(|d| d as u8))
        .collect();
    match digits {
        Some(digits) if !digits.is_empty() => luhn_sum(&digits) % 10 == 0,
        _ => false,
    }
}
