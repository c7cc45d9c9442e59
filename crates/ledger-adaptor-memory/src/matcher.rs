//! Transport error recognition
//!
//! An [`ErrorMatcher`] is an ordered table of [`MatchRule`]s. The first rule
//! whose status and message pattern both fit a [`TransportError`] decides
//! its [`ErrorClass`]; errors no rule fits stay unclaimed.

use ledger_operation::{DomainError, OperationInfo, TransportError};
use regex::Regex;

use crate::{Error, Result};

/// Domain error a rule translates to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Duplicate,
    LedgerValidation,
    Authentication,
    Throttle,
}

impl ErrorClass {
    fn domain_error(self, error: &TransportError, operation: &OperationInfo) -> DomainError {
        let resource_type = operation.resource_type.clone();
        let message = error.message.clone();
        match self {
            ErrorClass::NotFound => DomainError::NotFound {
                resource_type,
                message,
            },
            ErrorClass::Duplicate => DomainError::Duplicate {
                resource_type,
                message,
            },
            ErrorClass::LedgerValidation => DomainError::LedgerValidation {
                resource_type,
                message,
            },
            ErrorClass::Authentication => DomainError::Authentication { message },
            ErrorClass::Throttle => DomainError::Throttle { message },
        }
    }
}

/// One row of the matcher table
#[derive(Debug, Clone)]
pub struct MatchRule {
    class: ErrorClass,
    status: Option<u16>,
    pattern: Option<Regex>,
}

impl MatchRule {
    #[must_use]
    pub fn new(class: ErrorClass) -> Self {
        Self {
            class,
            status: None,
            pattern: None,
        }
    }

    /// Only match errors carrying `status`.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Only match errors whose message matches `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if the pattern does not compile.
    pub fn message(mut self, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.class
    }

    #[must_use]
    pub fn matches(&self, error: &TransportError) -> bool {
        if self.status.is_some() && self.status != error.status {
            return false;
        }
        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(&error.message))
    }
}

/// Ordered rule table translating transport errors to domain errors
#[derive(Debug, Clone, Default)]
pub struct ErrorMatcher {
    rules: Vec<MatchRule>,
}

impl ErrorMatcher {
    /// Empty table; recognizes nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the messages [`MemoryStore`](crate::MemoryStore) produces.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pattern`] if a built-in pattern does not compile.
    pub fn builtin() -> Result<Self> {
        Ok(Self::new()
            .rule(
                MatchRule::new(ErrorClass::NotFound)
                    .status(404)
                    .message(r"(?i)not found")?,
            )
            .rule(
                MatchRule::new(ErrorClass::Duplicate)
                    .status(400)
                    .message(r"(?i)duplicate")?,
            )
            .rule(MatchRule::new(ErrorClass::Authentication).status(401))
            .rule(MatchRule::new(ErrorClass::Throttle).status(429))
            .rule(
                MatchRule::new(ErrorClass::LedgerValidation)
                    .status(400)
                    .message(r"(?i)\b(validation|invalid|required|stale)\b")?,
            ))
    }

    /// Append a rule; earlier rules win.
    #[must_use]
    pub fn rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    #[must_use]
    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    /// Class of the first rule matching `error`
    #[must_use]
    pub fn classify(&self, error: &TransportError) -> Option<ErrorClass> {
        self.rules
            .iter()
            .find(|rule| rule.matches(error))
            .map(MatchRule::class)
    }

    /// Translate `error` raised while performing `operation`, if recognized
    #[must_use]
    pub fn recognize(&self, error: &TransportError, operation: &OperationInfo) -> Option<DomainError> {
        let class = self.classify(error)?;
        tracing::debug!(?class, status = ?error.status, %operation, "recognized transport error");
        Some(class.domain_error(error, operation))
    }
}
