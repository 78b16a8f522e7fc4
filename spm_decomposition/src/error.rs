use polars::prelude::PolarsError;
use thiserror::Error;

/// Error type for the `spm_decomposition` library.
#[derive(Error, Debug)]
pub enum DecompositionError {
    /// The provider has no variable with this name.
    #[error("Unknown variable: {variable}")]
    UnknownVariable { variable: String },
    /// The provider returned no records for a variable.
    #[error("Empty result for variable: {variable}")]
    EmptyResult { variable: String },
    /// The provider returned unusable values: nulls, non-finite numbers or
    /// non-integral ids.
    #[error("Invalid values for variable {variable}: {reason}")]
    InvalidValues { variable: String, reason: String },
    /// The sample does not cover the requested period.
    #[error("Period {requested} unavailable (sample covers {available})")]
    PeriodUnavailable { requested: u32, available: u32 },
    /// A person references a unit id that is absent from the unit table.
    #[error("Unit lookup failed: unit id {unit_id} is not in the unit table")]
    UnitLookup { unit_id: String },
    /// The same id appears twice in a unit table.
    #[error("Duplicate unit id: {unit_id}")]
    DuplicateUnitId { unit_id: String },
    /// Two parallel arrays disagree in length.
    #[error("Length mismatch in {context}: expected {expected}, found {found}")]
    LengthMismatch {
        context: String,
        expected: usize,
        found: usize,
    },
    /// A sample could not be loaded from its locator.
    #[error("Failed to load sample {locator}: {reason}")]
    SampleLoad { locator: String, reason: String },
    /// The configuration was rejected.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecompositionError {
    /// True when the provider simply does not know the variable. Assemblers
    /// swallow this for optional items and nothing else.
    pub fn is_missing_variable(&self) -> bool {
        matches!(self, DecompositionError::UnknownVariable { .. })
    }

    pub(crate) fn length_mismatch(context: &str, expected: usize, found: usize) -> Self {
        DecompositionError::LengthMismatch {
            context: context.to_string(),
            expected,
            found,
        }
    }
}
