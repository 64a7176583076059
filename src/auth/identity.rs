use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::AuthError;

/// `D`, a work-area letter, a dash, six digits.
///
/// Work-area letters: A admin, B bar, C cleaners, F functions, G guest
/// services, H housekeeping, K kitchen, M maintenance, O operations,
/// R restaurant, S store room, V venue.
static PAYROLL_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^D[ABCFGHKMORSV]-\d{6}$").expect("payroll id pattern is valid")
});

/// A login identifier that has passed the structural check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PayrollId(String);

impl PayrollId {
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        if PAYROLL_ID_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AuthError::InvalidFormat)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayrollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
