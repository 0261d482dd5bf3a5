use crate::error::{BrokerError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_CODE_DIGITS: u8 = 4;
pub const MAX_CODE_DIGITS: u8 = 6;

/// One-time numeric code handed over in person at fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Exact string comparison; no trimming or numeric coercion.
    pub fn matches(&self, submitted: &str) -> bool {
        self.0 == submitted
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Draws fixed-length codes uniformly from `[10^(n-1), 10^n)`.
#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    digits: u8,
}

impl CodeGenerator {
    pub fn new(digits: u8) -> Result<Self> {
        if !(MIN_CODE_DIGITS..=MAX_CODE_DIGITS).contains(&digits) {
            return Err(BrokerError::ValidationError(format!(
                "code length must be between {MIN_CODE_DIGITS} and {MAX_CODE_DIGITS} digits, got {digits}"
            )));
        }
        Ok(Self { digits })
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    pub fn generate(&self) -> VerificationCode {
        let low = 10u32.pow(u32::from(self.digits) - 1);
        let high = low * 10;
        let value = rand::thread_rng().gen_range(low..high);
        VerificationCode(value.to_string())
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self {
            digits: MIN_CODE_DIGITS,
        }
    }
}
