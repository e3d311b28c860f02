//! Structured build diagnostics.
//!
//! Every problem found while building the bean graph is recorded as a
//! [`Diagnostic`] instead of aborting, so that a failed build reports the
//! complete set of problems at once.

use crate::error::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Fails the build.
    Error,
    /// Reported, does not fail the build unless warnings are promoted.
    Warning,
}

impl Severity {
    /// Returns the lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// A single build problem.
///
/// # Example
///
/// ```
/// use arbor_core::diagnostic::Diagnostic;
///
/// let diagnostic = Diagnostic::definition("Multiple disposer methods found")
///     .with_target("acme.Factory#close()");
/// assert!(diagnostic.is_fatal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Classification of the problem.
    pub category: ErrorCategory,
    /// Severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// The declaration the problem concerns (bean, injection point, method).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Who reported the problem when not the container itself (an extension name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            severity: Severity::Error,
            message: message.into(),
            target: None,
            source: None,
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(category, message)
        }
    }

    /// Creates a definition error.
    pub fn definition(message: impl Into<String>) -> Self {
        Self::error(ErrorCategory::Definition, message)
    }

    /// Creates a deployment error.
    pub fn deployment(message: impl Into<String>) -> Self {
        Self::error(ErrorCategory::Deployment, message)
    }

    /// Creates an unsatisfied resolution error.
    pub fn unsatisfied(message: impl Into<String>) -> Self {
        Self::error(ErrorCategory::UnsatisfiedResolution, message)
    }

    /// Creates an ambiguous resolution error.
    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::error(ErrorCategory::AmbiguousResolution, message)
    }

    /// Sets the target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the reporting source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns `true` if the diagnostic fails the build.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "[{source}] ")?;
        }
        f.write_str(&self.message)?;
        if let Some(target) = &self.target {
            write!(f, "\n\t- target: {target}")?;
        }
        Ok(())
    }
}

/// An ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Appends every diagnostic of another collection.
    pub fn append(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no diagnostics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the diagnostics.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    /// Returns `true` if any diagnostic fails the build.
    #[must_use]
    pub fn has_fatal(&self) -> bool {
        self.items.iter().any(Diagnostic::is_fatal)
    }

    /// Returns the fatal diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_fatal())
    }

    /// Returns the non-fatal diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_fatal())
    }

    /// Returns the number of diagnostics of a category.
    #[must_use]
    pub fn count(&self, category: ErrorCategory) -> usize {
        self.items.iter().filter(|d| d.category == category).count()
    }

    /// Turns every warning into an error.
    pub fn promote_warnings(&mut self) {
        for item in &mut self.items {
            item.severity = Severity::Error;
        }
    }

    /// Labels every diagnostic without a source.
    pub fn label_source(&mut self, source: &str) {
        for item in self.items.iter_mut().filter(|d| d.source.is_none()) {
            item.source = Some(source.to_string());
        }
    }

    /// Consumes the collection.
    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
