//! Diagnostics
//!
//! Non-fatal findings collected while resolving, naming and synthesizing.
//! Fatal problems are `TypeModelError`s instead; a diagnostic only becomes
//! fatal when strict mode escalates it to `Severity::Error`.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Document ===
    /// Same (name, location) parameter defined twice in one list; first wins
    DuplicateParameter,

    // === Composition ===
    /// allOf branches define the same property; last branch wins
    PropertyOverride,
    /// Union has no cheap dispatch and is decoded by trying each branch
    TrialUnion,

    // === Naming ===
    /// Base name was taken; a numeric suffix was appended
    NameSuffixed,

    // === Validation ===
    /// `pattern` does not compile as a regular expression
    InvalidPattern,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateParameter => "W001",
            Self::PropertyOverride => "W002",
            Self::InvalidPattern => "W003",
            Self::TrialUnion => "I001",
            Self::NameSuffixed => "I002",
        }
    }

    /// Severity when not escalated
    pub fn severity(&self) -> Severity {
        match self {
            Self::DuplicateParameter | Self::PropertyOverride | Self::InvalidPattern => {
                Severity::Warning
            }
            Self::TrialUnion | Self::NameSuffixed => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Where it was found (component, operation, or type name)
    pub location: String,
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(location: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            code,
            severity: code.severity(),
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn escalated(mut self) -> Self {
        self.severity = Severity::Error;
        self
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({})",
            self.code, self.severity, self.message, self.location
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Add an item at error severity regardless of its code
    pub fn error(&mut self, location: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(location, code, message).escalated());
    }

    /// Add an item at its code's own severity
    pub fn report(&mut self, location: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(location, code, message));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if self.warning_count() > 0 {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Extend<DiagnosticItem> for Diagnostics {
    fn extend<I: IntoIterator<Item = DiagnosticItem>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_severity() {
        assert_eq!(DiagnosticCode::PropertyOverride.severity(), Severity::Warning);
        assert_eq!(DiagnosticCode::TrialUnion.severity(), Severity::Info);
    }

    #[test]
    fn test_diagnostics_collection() {
        let mut diags = Diagnostics::new();
        diags.error("Pet", DiagnosticCode::PropertyOverride, "name redefined");
        diags.report("listPets", DiagnosticCode::DuplicateParameter, "limit twice");
        diags.report("Pet", DiagnosticCode::NameSuffixed, "Pet0");

        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert!(diags.has_errors());
        assert_eq!(diags.with_code(DiagnosticCode::NameSuffixed).count(), 1);

        let suffixed = diags.with_code(DiagnosticCode::NameSuffixed).next().unwrap();
        assert_eq!(suffixed.severity, Severity::Info);
    }

    #[test]
    fn test_display() {
        let item = DiagnosticItem::new("Pet", DiagnosticCode::InvalidPattern, "bad pattern")
            .with_context("pattern: [a-");
        assert_eq!(item.to_string(), "[W003] warning: bad pattern (Pet)\n  - pattern: [a-");
    }
}
