//! Error taxonomy for validation runs.
//!
//! Most of these never reach the caller of a full run: rule, call-site, and
//! property failures are logged and the run continues. Only
//! [`ValidationError::InvalidRunState`] and [`ValidationError::InvalidRemediation`]
//! are surfaced as hard failures.

use scenecheck_types::SourceInfo;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    /// A run was requested while the host is simulating and the graph can
    /// mutate under the validator.
    #[error("validation was started while the host is simulating; this is not supported")]
    InvalidRunState,

    /// An auto-fix was applied to a prefab that is only reached as a dependency.
    #[error(
        "auto-fix refused for {target}: prefabs reached only as dependencies are not open for editing"
    )]
    InvalidRemediation { target: String },

    /// The call-site resolver could not produce an expression for an assertion.
    #[error("unable to resolve assertion expression at {site}: {reason}")]
    MalformedCallSite { site: SourceInfo, reason: String },

    /// Attribute lookup for a field failed.
    #[error("failed to resolve attributes for {type_name}.{path}: {reason}")]
    PropertyResolution {
        type_name: String,
        path: String,
        reason: String,
    },

    /// A rule returned an error or panicked while checking one target.
    #[error("rule '{rule}' failed on {target}: {reason}")]
    RuleExecution {
        rule: String,
        target: String,
        reason: String,
    },

    /// An asynchronous run was requested outside a tokio runtime.
    #[error("asynchronous validation needs a tokio runtime")]
    NoRuntime,

    /// Engine or rule settings are unusable.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// A scene document could not be loaded into the in-memory host.
    #[error("invalid scene document: {reason}")]
    Document { reason: String },
}

impl ValidationError {
    pub fn document(reason: impl Into<String>) -> Self {
        ValidationError::Document {
            reason: reason.into(),
        }
    }

    /// True for errors that are recovered locally during a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ValidationError::MalformedCallSite { .. }
                | ValidationError::PropertyResolution { .. }
                | ValidationError::RuleExecution { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_split() {
        assert!(!ValidationError::InvalidRunState.is_recoverable());
        assert!(
            !ValidationError::InvalidRemediation {
                target: "Enemy".into()
            }
            .is_recoverable()
        );
        assert!(
            ValidationError::RuleExecution {
                rule: "null-reference".into(),
                target: "Door".into(),
                reason: "boom".into(),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn messages_name_the_site() {
        let err = ValidationError::MalformedCallSite {
            site: SourceInfo::new("rules/door.rs", 12),
            reason: "no argument list".into(),
        };
        assert!(err.to_string().contains("rules/door.rs:12"));
    }
}
