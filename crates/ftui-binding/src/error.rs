#![forbid(unsafe_code)]

//! Error taxonomy for binding construction and value flow.
//!
//! # Failure Modes
//!
//! | Failure | Raised when | Surfaces as |
//! |---------|-------------|-------------|
//! | [`BindError::InvalidPath`] | path rooted elsewhere, unknown member, non-constant index | `Err` from the binder call |
//! | [`BindError::AccessorNotFound`] | member has no getter / is read-only | `Err` from the binder call |
//! | [`BindError::InvalidOperation`] | target getter missing, null host invoked | `Err` from the binder call |
//! | [`BindError::Argument`] | no converter for a two-way direction | `Err` from the binder call |
//! | [`BindError::TypeMismatch`] | value or host of the wrong runtime type | stream error channel |
//! | [`BindError::SetterFailed`] | a validated setter rejected a value | stream error channel |
//!
//! Per-value conversion failures are not errors: the value is dropped.

use std::fmt;

/// Errors raised by the binding engine.
///
/// `Clone` so a single failure can be fanned out to every observer of a
/// multicast stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// The symbolic path cannot be turned into a member chain.
    #[error("invalid property path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A required getter or setter does not exist for the member.
    #[error("no {kind} for `{owner}.{member}`")]
    AccessorNotFound {
        owner: &'static str,
        member: String,
        kind: AccessorKind,
    },

    /// The binding can never function (e.g. target has no getter).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A binding argument is unusable, most often a missing converter.
    #[error("{0}")]
    Argument(String),

    /// A value or host did not have the expected runtime type.
    #[error("expected a value of type `{expected}`, got `{actual}`")]
    TypeMismatch {
        expected: &'static str,
        actual: String,
    },

    /// A host setter refused the value.
    #[error("setter for `{member}` failed: {message}")]
    SetterFailed { member: String, message: String },

    /// No observation strategy accepted the object/property pair.
    #[error("no observation adapter for `{owner}.{property}`")]
    NoObservationAdapter {
        owner: &'static str,
        property: String,
    },
}

/// Which half of an accessor pair was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorKind {
    Getter,
    Setter,
}

impl fmt::Display for AccessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Getter => f.write_str("public getter"),
            Self::Setter => f.write_str("setter"),
        }
    }
}

impl BindError {
    pub(crate) fn invalid_path(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn no_converter(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::Argument(format!(
            "can't convert `{from}` to `{to}`; register a binding type converter \
             or supply a conversion function"
        ))
    }

    /// Whether this error is raised only while a binding is being built.
    #[must_use]
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath { .. }
                | Self::AccessorNotFound { .. }
                | Self::InvalidOperation(_)
                | Self::Argument(_)
        )
    }
}

/// Crate-wide result alias.
pub type Result<T, E = BindError> = std::result::Result<T, E>;
