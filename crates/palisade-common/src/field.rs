//! Field paths and structured validation violations.
//!
//! Validation never fails with a single opaque error. Each finding is a
//! [`Violation`] naming the offending field, so callers can aggregate them
//! into an admission rejection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A dotted path to a field in an object, e.g. `spec.containers[0].hostPort`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// Create a path rooted at `name`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The empty path. Children of the root render without a leading dot.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Append a named child.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    /// Append a list index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    /// The path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The class of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// A required value is missing.
    Required,
    /// The value is present but not permitted.
    Invalid,
}

impl ViolationKind {
    /// Human readable label used when rendering.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "Required value",
            Self::Invalid => "Invalid value",
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Path of the offending field.
    pub field: FieldPath,
    /// Violation class.
    pub kind: ViolationKind,
    /// Rendered offending value, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Explanation.
    pub detail: String,
}

impl Violation {
    /// An `Invalid value` violation.
    pub fn invalid(field: FieldPath, value: impl fmt::Display, detail: impl Into<String>) -> Self {
        Self {
            field,
            kind: ViolationKind::Invalid,
            value: Some(value.to_string()),
            detail: detail.into(),
        }
    }

    /// A `Required value` violation.
    pub fn required(field: FieldPath, detail: impl Into<String>) -> Self {
        Self {
            field,
            kind: ViolationKind::Required,
            value: None,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind.as_str())?;
        if let Some(value) = &self.value {
            write!(f, ": {value:?}")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Render a list of violations as one line, Kubernetes aggregate style.
#[must_use]
pub fn aggregate(violations: &[Violation]) -> String {
    match violations {
        [] => String::new(),
        [only] => only.to_string(),
        many => {
            let parts: Vec<String> = many.iter().map(ToString::to_string).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}
