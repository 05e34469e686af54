use crate::utils::error::InvalidIdentifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits preceding the check digit.
pub const BODY_LEN: usize = 14;

/// Fourteen validated ASCII digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentifierBody([u8; BODY_LEN]);

impl IdentifierBody {
    /// Validates `body` as exactly fourteen decimal digits.
    pub fn parse(body: &str) -> Result<Self, InvalidIdentifier> {
        let actual = body.chars().count();
        if actual != BODY_LEN {
            return Err(InvalidIdentifier::WrongLength {
                value: body.to_string(),
                expected: BODY_LEN,
                actual,
            });
        }

        let mut digits = [0u8; BODY_LEN];
        for (position, ch) in body.chars().enumerate() {
            let digit = ch.to_digit(10).ok_or_else(|| {
                InvalidIdentifier::NonDigit {
                    value: body.to_string(),
                    position,
                    found: ch,
                }
            })?;
            digits[position] = digit as u8;
        }
        Ok(Self(digits))
    }

    /// Digit values, most significant first.
    pub fn digits(&self) -> &[u8; BODY_LEN] {
        &self.0
    }
}

impl fmt::Display for IdentifierBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.0 {
            write!(f, "{}", digit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckDigit(u8);

impl CheckDigit {
    /// Reduces `value` modulo 10.
    pub(crate) fn from_mod10(value: u32) -> Self {
        Self((value % 10) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        char::from(b'0' + self.0)
    }
}

impl fmt::Display for CheckDigit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A body followed by its check digit: always fifteen ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectedIdentifier(String);

impl CorrectedIdentifier {
    pub fn new(body: &IdentifierBody, check: CheckDigit) -> Self {
        let mut value = body.to_string();
        value.push(check.as_char());
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

}

impl fmt::Display for CorrectedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrectedIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A rejected row: its position in the batch and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub index: usize,
    pub error: InvalidIdentifier,
}

/// Outcome of a batch: successes and failures, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub corrected: Vec<CorrectedIdentifier>,
    pub failures: Vec<RowFailure>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.corrected.len() + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One raw identifier as read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based row in the source file; the header occupies row 1.
    pub row_number: usize,
    pub value: String,
}

/// A failure report line, resolved back to its source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub row: usize,
    pub index: usize,
    pub value: String,
    pub reason: String,
}

/// One row of a verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCheck {
    pub row: usize,
    pub value: String,
    pub valid: bool,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub corrected: Vec<CorrectedIdentifier>,
    pub failed: Vec<FailedRecord>,
    pub total_rows: usize,
    /// Rows whose input already carried the correct check digit.
    pub unchanged_rows: usize,
}

/// Counts stored next to bundled outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub source: String,
    pub total_rows: usize,
    pub corrected_rows: usize,
    pub failed_rows: usize,
    pub unchanged_rows: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}
