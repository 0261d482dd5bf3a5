use crate::domain::code::{CodeGenerator, MIN_CODE_DIGITS};
use crate::error::Result;

/// Tunables for [`RequestCoordinator`](super::coordinator::RequestCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Length of the verification code handed over at fulfillment (4 to 6).
    pub code_digits: u8,
}

impl CoordinatorConfig {
    pub fn code_generator(&self) -> Result<CodeGenerator> {
        CodeGenerator::new(self.code_digits)
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            code_digits: MIN_CODE_DIGITS,
        }
    }
}
