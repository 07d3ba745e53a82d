//! Error types for the HyperMetro client
//!
//! Provides structured error types for the session layer, the retrying
//! request executor, and the volume lifecycle orchestrator.

use std::time::Duration;
use thiserror::Error;

/// Object kinds addressed through the array management interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Lun,
    LunGroup,
    LunCopy,
    Snapshot,
    StoragePool,
    Host,
    HostGroup,
    PortGroup,
    Initiator,
    MappingView,
    HyperMetroPair,
    HyperMetroDomain,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Lun => "LUN",
            ResourceKind::LunGroup => "LUN group",
            ResourceKind::LunCopy => "LUN copy",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::StoragePool => "storage pool",
            ResourceKind::Host => "host",
            ResourceKind::HostGroup => "host group",
            ResourceKind::PortGroup => "port group",
            ResourceKind::Initiator => "initiator",
            ResourceKind::MappingView => "mapping view",
            ResourceKind::HyperMetroPair => "HyperMetro pair",
            ResourceKind::HyperMetroDomain => "HyperMetro domain",
        };
        f.write_str(name)
    }
}

/// Unified error type for the client
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed response envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Response for {path} carried no data")]
    EmptyData { path: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Login failed on all {tried} controller endpoints")]
    AllControllersFailed { tried: usize },

    #[error("Session rejected after {attempts} re-login attempts")]
    AuthRetriesExhausted { attempts: u32 },

    // =========================================================================
    // Domain Errors
    // =========================================================================
    #[error("Array error {code}: {description} (suggestion: {suggestion})")]
    Array {
        code: i64,
        description: String,
        suggestion: String,
    },

    #[error("{0} not found")]
    NotFound(ResourceKind),

    #[error("Multiple {kind} objects matched name {name:?}")]
    Ambiguous { kind: ResourceKind, name: String },

    // =========================================================================
    // Workflow Errors
    // =========================================================================
    #[error("Timed out after {waited:?} waiting for {what}")]
    WaitTimeout {
        what: &'static str,
        waited: Duration,
    },

    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error(
        "Mirror pair creation failed, orphan LUNs left behind \
         (local: {local_lun_id}, remote: {remote_lun_id}): {source}"
    )]
    PairOrphans {
        local_lun_id: i64,
        remote_lun_id: i64,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the name of the workflow step that produced it.
    pub(crate) fn wrap(step: &'static str) -> impl FnOnce(Error) -> Error {
        move |source| Error::Step {
            step,
            source: Box::new(source),
        }
    }

    /// Check whether this is a typed not-found result from a filtered lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check whether this error came back from the array as a domain error
    pub fn is_array_error(&self) -> bool {
        matches!(self, Error::Array { .. })
    }
}

/// Result type alias for the client
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_error_display() {
        let err = Error::Array {
            code: 1077674272,
            description: "The entered HyperMetro parameters are invalid.".into(),
            suggestion: "Enter valid parameters.".into(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("1077674272"));
        assert!(rendered.contains("parameters are invalid"));
    }

    #[test]
    fn test_step_wrapping_preserves_cause() {
        let err = Error::wrap("expand remote lun")(Error::NotFound(ResourceKind::Lun));
        assert_eq!(err.to_string(), "expand remote lun: LUN not found");

        match err {
            Error::Step { step, source } => {
                assert_eq!(step, "expand remote lun");
                assert!(source.is_not_found());
            }
            other => panic!("expected step wrapper, got {other:?}"),
        }
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::NotFound(ResourceKind::HostGroup).is_not_found());
        assert!(!Error::Configuration("bad".into()).is_not_found());
    }
}
