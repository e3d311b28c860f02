//! Build errors.

use crate::chain::ChainState;
use arbor_core::{Diagnostic, Diagnostics, ErrorCategory};
use std::fmt;
use thiserror::Error;

/// The deployment could not be built.
///
/// Carries every fatal problem found, in detection order, together with the
/// warnings collected along the way.
#[derive(Debug, Clone)]
pub struct DeploymentError {
    problems: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl DeploymentError {
    /// Splits diagnostics into problems and warnings.
    #[must_use]
    pub fn new(diagnostics: Diagnostics) -> Self {
        let (problems, warnings) = diagnostics.into_iter().partition(Diagnostic::is_fatal);
        Self { problems, warnings }
    }

    /// Returns the fatal problems.
    #[must_use]
    pub fn problems(&self) -> &[Diagnostic] {
        &self.problems
    }

    /// Returns the warnings reported alongside the problems.
    #[must_use]
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    /// Returns the number of problems of a category.
    #[must_use]
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.problems.iter().filter(|p| p.category == category).count()
    }

    /// Returns the category of the first problem.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.problems
            .first()
            .map_or(ErrorCategory::Deployment, |p| p.category)
    }
}

impl fmt::Display for DeploymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.problems.as_slice() {
            [] => f.write_str("Deployment failed"),
            [single] => write!(f, "{single}"),
            problems => {
                write!(f, "Found {} deployment problems:", problems.len())?;
                for (i, problem) in problems.iter().enumerate() {
                    write!(f, "\n[{}] {problem}", i + 1)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DeploymentError {}

/// An interception chain was driven through an illegal lifecycle transition.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal interception chain transition from {from:?} to {to:?}")]
pub struct ChainStateError {
    /// State before the transition.
    pub from: ChainState,
    /// Requested state.
    pub to: ChainState,
}
