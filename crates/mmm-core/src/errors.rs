//! Structured error types shared across MMM crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MmmError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Diagnostic message describing the failing input.
    pub message: String,
    /// Contextual key value pairs (channel names, lengths, bounds, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the MMM engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MmmError {
    /// Structurally invalid input (ranges, lengths, channel ordering, empty sets).
    #[error("invalid input: {0}")]
    InvalidInput(ErrorInfo),
    /// Bound or budget constraints that cannot be satisfied together.
    #[error("infeasible constraint: {0}")]
    InfeasibleConstraint(ErrorInfo),
    /// Division-by-zero style degeneracy surfaced on request.
    #[error("numeric degeneracy: {0}")]
    NumericDegeneracy(ErrorInfo),
    /// Solver stopped at its iteration cap without meeting its tolerances.
    #[error("optimizer did not converge: {0}")]
    OptimizerNonConvergence(ErrorInfo),
    /// Serialization, configuration and file errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MmmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MmmError::InvalidInput(info)
            | MmmError::InfeasibleConstraint(info)
            | MmmError::NumericDegeneracy(info)
            | MmmError::OptimizerNonConvergence(info)
            | MmmError::Serde(info) => info,
        }
    }

    /// Shorthand for an [`MmmError::InvalidInput`] with the given code and message.
    pub fn invalid(code: &str, message: impl Into<String>) -> Self {
        MmmError::InvalidInput(ErrorInfo::new(code, message))
    }

    /// Shorthand for an [`MmmError::InfeasibleConstraint`] with the given code and message.
    pub fn infeasible(code: &str, message: impl Into<String>) -> Self {
        MmmError::InfeasibleConstraint(ErrorInfo::new(code, message))
    }

    /// Shorthand for an [`MmmError::Serde`] wrapping a foreign error.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        MmmError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Attaches a context entry to the payload of any variant.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            MmmError::InvalidInput(info) => MmmError::InvalidInput(info.with_context(key, value)),
            MmmError::InfeasibleConstraint(info) => {
                MmmError::InfeasibleConstraint(info.with_context(key, value))
            }
            MmmError::NumericDegeneracy(info) => {
                MmmError::NumericDegeneracy(info.with_context(key, value))
            }
            MmmError::OptimizerNonConvergence(info) => {
                MmmError::OptimizerNonConvergence(info.with_context(key, value))
            }
            MmmError::Serde(info) => MmmError::Serde(info.with_context(key, value)),
        }
    }

    /// Attaches a remediation hint to the payload of any variant.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            MmmError::InvalidInput(info) => MmmError::InvalidInput(info.with_hint(hint)),
            MmmError::InfeasibleConstraint(info) => {
                MmmError::InfeasibleConstraint(info.with_hint(hint))
            }
            MmmError::NumericDegeneracy(info) => MmmError::NumericDegeneracy(info.with_hint(hint)),
            MmmError::OptimizerNonConvergence(info) => {
                MmmError::OptimizerNonConvergence(info.with_hint(hint))
            }
            MmmError::Serde(info) => MmmError::Serde(info.with_hint(hint)),
        }
    }
}
