//! Classification of failed `sdm` invocations.
//!
//! The strongDM CLI has no structured error channel, so failures are
//! recognised by matching known phrases in its human-readable output. The
//! phrases live in an ordered table: the first matching pattern decides the
//! kind, so more specific phrases must come before generic ones.

use std::fmt::{Display, Formatter};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::execution::CommandOutput;

/// Semantic kind of a failure reported by the wrapped tool.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The session expired or the user never logged in.
    Unauthorized,
    /// A login attempt was rejected.
    InvalidCredentials,
    /// The named resource is unknown to the tool.
    ResourceNotFound,
    /// Network-level failure reported by the tool.
    ConnectionFailed,
    PermissionDenied,
    /// No known pattern matched.
    Unknown,
}

impl Display for ErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::InvalidCredentials => "InvalidCredentials",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Unknown => "Unknown",
        };
        formatter.write_str(name)
    }
}

/// A failed `sdm` invocation together with its classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {} ({})", .kind, .output.trim(), .cause)]
pub struct SdmError {
    pub kind: ErrorKind,
    /// Captured stdout and stderr of the failed invocation.
    pub output: String,
    /// Description of the underlying failure, usually the exit status.
    pub cause: String,
}

impl SdmError {
    pub fn new(kind: ErrorKind, output: &str, cause: &str) -> Self {
        Self {
            kind,
            output: output.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// One row of the classification table.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorPattern {
    pub pattern: String,
    pub kind: ErrorKind,
}

impl ErrorPattern {
    pub fn new(pattern: &str, kind: ErrorKind) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind,
        }
    }
}

/// Known `sdm` output phrases, most specific first.
pub const DEFAULT_PATTERNS: &[(&str, ErrorKind)] = &[
    ("You are not authenticated", ErrorKind::Unauthorized),
    ("Authentication required", ErrorKind::Unauthorized),
    ("Cannot find datasource named", ErrorKind::ResourceNotFound),
    ("Resource not found", ErrorKind::ResourceNotFound),
    ("access denied", ErrorKind::InvalidCredentials),
    ("Invalid credentials", ErrorKind::InvalidCredentials),
    ("Permission denied", ErrorKind::PermissionDenied),
    ("Connection refused", ErrorKind::ConnectionFailed),
    ("Could not connect", ErrorKind::ConnectionFailed),
    ("Timed out", ErrorKind::ConnectionFailed),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorClassifier {
    patterns: Vec<ErrorPattern>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_PATTERNS
                .iter()
                .map(|(pattern, kind)| ErrorPattern::new(pattern, *kind))
                .collect(),
        )
    }
}

impl ErrorClassifier {
    pub fn new(patterns: Vec<ErrorPattern>) -> Self {
        Self { patterns }
    }

    /// Default table with `extra` patterns consulted first.
    pub fn with_extra_patterns(extra: &[ErrorPattern]) -> Self {
        let mut patterns = extra.to_vec();
        patterns.extend(Self::default().patterns);
        Self::new(patterns)
    }

    pub fn patterns(&self) -> &[ErrorPattern] {
        &self.patterns
    }

    /// Returns the kind of the first pattern found in `output`.
    pub fn kind_of(&self, output: &str) -> ErrorKind {
        self.patterns
            .iter()
            .find(|p| output.contains(p.pattern.as_str()))
            .map_or(ErrorKind::Unknown, |p| p.kind)
    }

    /// Classifies a failure given its output and cause.
    pub fn classify(&self, output: &str, cause: &str) -> SdmError {
        let kind = self.kind_of(output);
        debug!("Classified `sdm` failure as {kind} (cause: {cause}): {output:?}");
        SdmError::new(kind, output, cause)
    }

    /// Success passes through untouched; a non-zero exit is classified.
    ///
    /// # Errors
    ///
    /// Returns the classified error if the invocation did not succeed.
    pub fn check(&self, output: &CommandOutput) -> std::result::Result<(), SdmError> {
        if output.success() {
            return Ok(());
        }

        Err(self.classify(&output.combined(), &output.status.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_default_pattern_maps_to_its_kind() {
        let classifier = ErrorClassifier::default();

        for (pattern, kind) in DEFAULT_PATTERNS {
            let output = format!("sdm: {pattern}. Please try again.\n");
            assert_eq!(classifier.kind_of(&output), *kind, "pattern `{pattern}`");
        }
    }

    #[test]
    fn test_unmatched_output_is_unknown_and_keeps_text() {
        let classifier = ErrorClassifier::default();
        let error = classifier.classify("cannot ask for password", "exit status: 1");

        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.output, "cannot ask for password");
        assert_eq!(error.cause, "exit status: 1");
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let classifier = ErrorClassifier::default();
        let output = "You are not authenticated. Cannot find datasource named 'db'";

        assert_eq!(classifier.kind_of(output), ErrorKind::Unauthorized);
    }

    #[test]
    fn test_not_found_message_is_not_shadowed() {
        let classifier = ErrorClassifier::default();
        let output = "Cannot find datasource named 'prod-db'";

        assert_eq!(classifier.kind_of(output), ErrorKind::ResourceNotFound);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let classifier = ErrorClassifier::default();

        assert_eq!(classifier.kind_of("access denied\n"), ErrorKind::InvalidCredentials);
        assert_eq!(classifier.kind_of("Permission denied"), ErrorKind::PermissionDenied);
        assert_eq!(classifier.kind_of("permission denied"), ErrorKind::Unknown);
    }

    #[test]
    fn test_extra_patterns_take_priority() {
        let classifier = ErrorClassifier::with_extra_patterns(&[ErrorPattern::new(
            "Timed out waiting for login",
            ErrorKind::Unauthorized,
        )]);

        assert_eq!(
            classifier.kind_of("Timed out waiting for login"),
            ErrorKind::Unauthorized
        );
        assert_eq!(classifier.kind_of("Timed out"), ErrorKind::ConnectionFailed);
        assert_eq!(classifier.patterns().len(), DEFAULT_PATTERNS.len() + 1);
    }

    #[test]
    fn test_error_display_includes_kind_and_output() {
        let error = SdmError::new(
            ErrorKind::ResourceNotFound,
            "Cannot find datasource named 'x'\n",
            "exit status: 1",
        );

        assert_eq!(
            error.to_string(),
            "ResourceNotFound: Cannot find datasource named 'x' (exit status: 1)"
        );
    }
}
