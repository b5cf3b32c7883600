use std::path::PathBuf;
use std::time::Duration;

use sfa_rspec::RSpecError;
use sfa_storage::StorageError;

use crate::auth::AuthError;
use crate::driver::DriverError;
use crate::policy::PolicyError;

/// AM API fault codes (`geni_code` in a response's `code` struct).
pub mod geni_code {
    pub const BADARGS: i32 = 1;
    pub const ERROR: i32 = 2;
    pub const FORBIDDEN: i32 = 3;
    pub const BADVERSION: i32 = 4;
    pub const REFUSED: i32 = 7;
    pub const TIMEDOUT: i32 = 8;
    pub const DBERROR: i32 = 9;
    pub const SEARCHFAILED: i32 = 12;
    pub const UNSUPPORTED: i32 = 13;
    pub const BUSY: i32 = 14;
    pub const ALREADYEXISTS: i32 = 17;
}

/// Errors raised while loading an [`AggregateConfig`](crate::AggregateConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// The single fault returned by an aggregate call.
#[derive(Debug, thiserror::Error)]
pub enum AmError {
    #[error("invalid rspec: {0}")]
    InvalidRSpec(String),

    #[error("unknown rspec version: {type_name} {version}")]
    UnknownRSpecVersion { type_name: String, version: String },

    #[error("bad arguments: {0}")]
    BadArgs(String),

    #[error("record not found: {0}")]
    RecordNotFound(String),

    #[error("sliver does not exist: {0}")]
    SliverDoesNotExist(String),

    #[error("rejected by policy: {0}")]
    PolicyRejected(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unsupported flavour: {0}")]
    UnsupportedFlavour(String),

    #[error("driver call {verb} timed out after {after:?}")]
    TimedOut { verb: &'static str, after: Duration },

    /// A driver fault, passed through unmodified.
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("allocation store: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AmError {
    pub fn geni_code(&self) -> i32 {
        match self {
            AmError::InvalidRSpec(_) | AmError::BadArgs(_) => geni_code::BADARGS,
            AmError::UnknownRSpecVersion { .. } => geni_code::BADVERSION,
            AmError::RecordNotFound(_) | AmError::SliverDoesNotExist(_) => {
                geni_code::SEARCHFAILED
            }
            AmError::PolicyRejected(_) => geni_code::REFUSED,
            AmError::Forbidden(_) => geni_code::FORBIDDEN,
            AmError::UnsupportedFlavour(_) => geni_code::UNSUPPORTED,
            AmError::TimedOut { .. } => geni_code::TIMEDOUT,
            AmError::Driver(e) => e.code,
            AmError::Storage(StorageError::AlreadyExists { .. }) => geni_code::ALREADYEXISTS,
            AmError::Storage(StorageError::ConcurrentConflict { .. }) => geni_code::BUSY,
            AmError::Storage(StorageError::RecordNotFound { .. }) => geni_code::SEARCHFAILED,
            AmError::Storage(StorageError::Backend(_)) => geni_code::DBERROR,
            AmError::Config(_) => geni_code::ERROR,
        }
    }
}

impl From<RSpecError> for AmError {
    fn from(e: RSpecError) -> Self {
        match e {
            RSpecError::UnknownRSpecVersion {
                type_name, version, ..
            } => AmError::UnknownRSpecVersion { type_name, version },
            RSpecError::InvalidRSpec(message) => AmError::InvalidRSpec(message),
            other => AmError::InvalidRSpec(other.to_string()),
        }
    }
}

impl From<AuthError> for AmError {
    fn from(e: AuthError) -> Self {
        AmError::Forbidden(e.to_string())
    }
}

impl From<PolicyError> for AmError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Rejected { chain, reason } => {
                AmError::PolicyRejected(format!("{chain}: {reason}"))
            }
            PolicyError::Failed(message) => AmError::InvalidRSpec(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_codes_follow_am_api() {
        assert_eq!(AmError::InvalidRSpec("x".into()).geni_code(), geni_code::BADARGS);
        assert_eq!(
            AmError::SliverDoesNotExist("urn".into()).geni_code(),
            geni_code::SEARCHFAILED
        );
        assert_eq!(
            AmError::Storage(StorageError::Backend("disk".into())).geni_code(),
            geni_code::DBERROR
        );
        let driver = DriverError::with_code(42, "testbed exploded");
        assert_eq!(AmError::Driver(driver).geni_code(), 42);
    }

    #[test]
    fn rspec_errors_map_onto_faults() {
        let unknown: AmError = RSpecError::unknown_version("GENI", "9", "*").into();
        assert!(matches!(unknown, AmError::UnknownRSpecVersion { ref version, .. } if version == "9"));
        let invalid: AmError = RSpecError::invalid("no slivers").into();
        assert_eq!(invalid.to_string(), "invalid rspec: no slivers");
    }

    #[test]
    fn driver_faults_display_unchanged() {
        let err: AmError = DriverError::new("node n1 is down").into();
        assert_eq!(err.to_string(), "node n1 is down");
    }
}
