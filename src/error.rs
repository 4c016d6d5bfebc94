//! Step errors
//!
//! Two error surfaces live here:
//!
//! - [`StepError`] — errors raised by the crate itself (configuration
//!   problems, unresolved directive grammar), carrying step/line context.
//! - [`StepFailure`] — the failure a host's step invoker reports back to the
//!   engine, tagged with a declared [`FailureKind`]. The engine consumes the
//!   tag as-is; it never infers hard/soft from the underlying error type.

use std::fmt;

/// The kind of error raised by the crate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A step body failed and the failure halts ordinary execution
    HardFailure,
    /// A step body failed but execution continues
    SoftFailure,
    /// Invalid configuration (empty delimiter set, bad runner setup)
    Configuration,
    /// Step text matches a directive stem but its modifier clause is invalid
    UnresolvedDirective,
}

/// An error with step/line context
#[derive(Debug)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
    pub step: Option<String>,
    pub line: Option<usize>,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            step: None,
            line: None,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg)
    }

    pub fn unresolved_directive(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedDirective, msg)
    }

    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_configuration(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Configuration | ErrorKind::UnresolvedDirective
        )
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        if let Some(ref step) = self.step {
            write!(f, "step '{}': ", step)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StepError {}

/// Declared severity of a step-body failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Halts all non-exempt steps for the rest of the scenario
    Hard,
    /// Recorded; traversal continues
    Soft,
}

/// A failure reported by the host's step invoker.
///
/// The invoker declares the kind explicitly via [`StepFailure::hard`] or
/// [`StepFailure::soft`]; an optional source error preserves host-side
/// context for reporting.
#[derive(Debug)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
    pub source: Option<anyhow::Error>,
}

impl StepFailure {
    /// A failure that aborts remaining non-exempt steps in the scenario
    pub fn hard(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Hard,
            message: message.into(),
            source: None,
        }
    }

    /// A recoverable failure — the scenario is marked soft-failed and continues
    pub fn soft(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Soft,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying host error
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_hard(&self) -> bool {
        self.kind == FailureKind::Hard
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for StepFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_display_with_context() {
        let err = StepError::unresolved_directive("bad modifier clause")
            .with_step("ALWAYS RUN AND WHATEVER")
            .with_line(7);
        assert_eq!(
            err.to_string(),
            "line 7: step 'ALWAYS RUN AND WHATEVER': bad modifier clause"
        );
    }

    #[test]
    fn test_configuration_covers_unresolved_directive() {
        assert!(StepError::configuration("x").is_configuration());
        assert!(StepError::unresolved_directive("x").is_configuration());
    }

    #[test]
    fn test_failure_kind_is_declared_not_inferred() {
        let io = anyhow::anyhow!("connection reset");
        let failure = StepFailure::soft("backend flaked").with_source(io);
        assert!(!failure.is_hard());
        assert_eq!(failure.to_string(), "backend flaked: connection reset");
    }
}
