//! # Primary domain migration
//!
//! Moves a Google Workspace customer, and every user and group in it, from
//! one primary domain to another while keeping old addresses reachable as
//! aliases.
//!
//! The run has four phases:
//!
//! 1. **Domain check**: read the customer and compare its primary domain
//!    with the target
//! 2. **Domain update**: after operator confirmation, swap the primary domain
//! 3. **User pass**: rename each user's primary email and mirror its aliases
//! 4. **Group pass**: the same for groups
//!
//! Directory access goes through [`cpd_directory::DirectoryClient`] and
//! operator prompts through [`ConfirmationPort`], so the whole run can be
//! exercised against [`cpd_directory::InMemoryDirectory`].

pub mod address;
pub mod config;
pub mod confirm;
pub mod error;
pub mod orchestrator;
pub mod reconciler;
pub mod report;

pub use address::{replace_domain, split_address, MalformedAddress};
pub use config::MigrationConfig;
pub use confirm::{ConfirmationError, ConfirmationPort, Gate, LineConfirmation, ScriptedConfirmation};
pub use error::{MigrationError, Result};
pub use orchestrator::MigrationOrchestrator;
pub use reconciler::{plan_principal_rename, DomainReconciler, PrimaryChange, RenamePlan};
pub use report::{DomainOutcome, FailureKind, MigrationReport, PassReport, PrincipalFailure};
