use serde::Serialize;

use crate::database::validation::ValidationErrors;

/// One rejected entry of a batch create
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Position of the entry in the input list
    pub index: usize,
    pub errors: ValidationErrors,
}

/// Result of a best-effort batch create: created DTOs in input order plus
/// one failure per rejected entry.
#[derive(Debug, Clone)]
pub struct BatchOutcome<D> {
    pub created: Vec<D>,
    pub failures: Vec<BatchFailure>,
}

impl<D> BatchOutcome<D> {
    pub(crate) fn new() -> Self {
        Self { created: Vec::new(), failures: Vec::new() }
    }

    /// Every entry was created
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_indexes(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}
