//! Provider errors

use crate::service::ServiceError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Missing key property or malformed property value; raised before any service call
    #[error("invalid resource: {0}")]
    Validation(String),

    #[error("resource `{0}` already exists")]
    Conflict(String),

    /// The resource no longer exists (possibly removed since it was read)
    #[error("resource `{0}` not found")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Some resources of a multi-resource operation failed; the others went through
    #[error("{operation} failed for {} resource(s): {}", .failures.len(), FailureList(.failures))]
    Batch {
        operation: &'static str,
        failures: Vec<ResourceFailure>,
    },
}

impl From<ServiceError> for ProviderError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::NotFound(name) => ProviderError::NotFound(name),
            ServiceError::Conflict(name) => ProviderError::Conflict(name),
            ServiceError::Unavailable(msg) => ProviderError::ServiceUnavailable(msg),
            ServiceError::InvalidResponse(msg) => {
                ProviderError::ServiceUnavailable(format!("invalid response: {}", msg))
            }
        }
    }
}

impl ProviderError {
    /// Failures of a batch, or this error alone
    pub fn failures(&self) -> Vec<ResourceFailure> {
        match self {
            ProviderError::Batch { failures, .. } => failures.clone(),
            other => vec![ResourceFailure {
                name: None,
                error: other.clone(),
            }],
        }
    }
}

/// Failure of one resource within a multi-resource operation
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFailure {
    /// Key of the failing resource, when it could be determined
    pub name: Option<String>,
    pub error: ProviderError,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

struct FailureList<'a>(&'a [ResourceFailure]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

/// Collapse per-resource failures into the operation's outcome.
///
/// No failure is success. When the operation addressed a single resource its
/// error is returned as-is, otherwise every failure is reported together.
pub(crate) fn into_outcome<T>(
    operation: &'static str,
    value: T,
    attempted: usize,
    mut failures: Vec<ResourceFailure>,
) -> Result<T, ProviderError> {
    match failures.len() {
        0 => Ok(value),
        1 if attempted == 1 => Err(failures.remove(0).error),
        _ => Err(ProviderError::Batch {
            operation,
            failures,
        }),
    }
}
