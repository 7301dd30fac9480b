//! Error types for the ruleweave engine.
//!
//! Uses `thiserror` for ergonomic error definition with rich context.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout ruleweave.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for ruleweave operations.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Creates an empty agenda error.
    #[must_use]
    pub fn empty_agenda() -> Self {
        Self::new(ErrorKind::EmptyAgenda)
    }

    /// Creates a malformed rule error.
    #[must_use]
    pub fn malformed_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRule {
            rule: rule.into(),
            reason: reason.into(),
        })
    }

    /// Creates a type redefinition error.
    #[must_use]
    pub fn type_redefinition(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeRedefinition(name.into()))
    }

    /// Creates a type cycle error.
    #[must_use]
    pub fn type_cycle(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeCycle(name.into()))
    }

    /// Creates an error for an operation that is invalid while rules are firing.
    #[must_use]
    pub fn engine_running(operation: &'static str) -> Self {
        Self::new(ErrorKind::EngineRunning(operation))
    }

    /// Creates an action failure error.
    ///
    /// Rule actions return this to abort the fire loop.
    #[must_use]
    pub fn action(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Action(message.into()))
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Returns true if this is the empty agenda condition.
    #[must_use]
    pub fn is_empty_agenda(&self) -> bool {
        matches!(self.kind, ErrorKind::EmptyAgenda)
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The conflict set has no instantiation left.
    #[error("empty agenda")]
    EmptyAgenda,

    /// Rule metadata cannot be wired into the matching network.
    #[error("malformed rule {rule}: {reason}")]
    MalformedRule {
        /// The rule name.
        rule: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A type was registered twice with different parents.
    #[error("type {0} is already registered with different parents")]
    TypeRedefinition(String),

    /// A type lists itself among its parents.
    #[error("type {0} cannot be its own parent")]
    TypeCycle(String),

    /// The operation is not allowed while the fire loop is active.
    #[error("cannot {0} while rules are firing")]
    EngineRunning(&'static str),

    /// A rule action failed.
    #[error("action failed: {0}")]
    Action(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Maximum rule firings per run exceeded.
    MaxFirings {
        /// The configured limit.
        limit: usize,
        /// The rule that was about to fire.
        rule: Option<String>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxFirings { limit, rule } => {
                write!(f, "max firings ({limit}) exceeded")?;
                if let Some(rule) = rule {
                    write!(f, " at rule {rule}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Rule that was firing, if any.
    pub rule: Option<String>,
    /// Ordinal of the firing within the run.
    pub firing: Option<usize>,
    /// Stack of enclosing operations.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule name.
    #[must_use]
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    /// Sets the firing ordinal.
    #[must_use]
    pub fn with_firing(mut self, firing: usize) -> Self {
        self.firing = Some(firing);
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "in rule {rule}")?;
            if let Some(firing) = self.firing {
                write!(f, " (firing #{firing})")?;
            }
        }
        if !self.stack.is_empty() {
            writeln!(f)?;
            for frame in &self.stack {
                writeln!(f, "  in {frame}")?;
            }
        }
        Ok(())
    }
}
