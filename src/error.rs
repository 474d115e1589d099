use thiserror::Error;

/// Errors raised at the call boundary of the simulation kernel.
///
/// Liquidation and refused resizes are recorded outcomes, not errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "initial state violates the minimum collateral ratio: \
         collateral value {collateral_value} < required {required_value}"
    )]
    InvariantViolationAtCreation {
        collateral_value: f64,
        required_value: f64,
    },

    #[error("rejection sampling gave up after {attempts} attempts")]
    SamplingExhausted { attempts: usize },
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
