//! Migration error types

use cpd_common::PrincipalKind;
use thiserror::Error;

use crate::confirm::ConfirmationError;

/// Result type alias for migration operations
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Conditions that end a migration run.
///
/// Per-record failures (one principal's rename, one alias insert, a
/// malformed address) are recorded in the report as a
/// [`crate::report::FailureKind`] instead.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid migration settings: {0}")]
    InvalidConfig(String),

    #[error("Unable to retrieve customer data: {0}")]
    CustomerLookup(#[source] cpd_directory::Error),

    #[error("Unable to update customer primary domain: {0}")]
    CustomerUpdate(#[source] cpd_directory::Error),

    #[error("Unable to retrieve {} in domain: {source}", .kind.plural())]
    Listing {
        kind: PrincipalKind,
        #[source]
        source: cpd_directory::Error,
    },

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    /// The operator declined at a confirmation gate. Not a crash.
    #[error("Aborted by operator at {gate}")]
    UserAbort { gate: &'static str },
}

impl MigrationError {
    pub fn is_user_abort(&self) -> bool {
        matches!(self, MigrationError::UserAbort { .. })
    }

    /// The customer record does not exist for the given key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, MigrationError::CustomerLookup(e) if e.is_not_found())
    }
}
